//! Small text helpers shared by the config and gateway layers.

/// Longest slice of a response body quoted in an error message.
const ERROR_TEXT_LIMIT: usize = 180;

/// Trimmed owned text, or `None` when absent or blank.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

pub fn is_http_url(value: &str) -> bool {
    let value = value.trim_start();
    value.starts_with("https://") || value.starts_with("http://")
}

/// Trim a base URL and drop trailing slashes. `None` unless it is a
/// non-empty http(s) URL.
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    is_http_url(url).then(|| url.trim_end_matches('/').to_string())
}

/// Response body text cut down for use inside an error message.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(ERROR_TEXT_LIMIT).collect()
}
