//! REST document store gateway.
//!
//! Documents are addressed as `{base}/v1/users/{owner}/profile` and
//! `{base}/v1/users/{owner}/records[/{id}]`. Timestamps travel as epoch
//! milliseconds in query strings and RFC 3339 strings in bodies.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{
    stamp_for_create, DeleteOutcome, GatewayError, GatewayResult, RecordOrder, RemoteGateway,
};
use crate::models::{HealthRecord, OwnerKey, RecordId, RecordPatch, Timestamp, UserProfile};
use crate::util::{compact_text, normalize_text_option};

#[derive(Clone)]
pub struct HttpGateway {
    base_url: String,
    api_token: Option<String>,
    client: Client,
}

impl std::fmt::Debug for HttpGateway {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpGateway")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpGateway {
    /// Build a gateway for `base_url`.
    ///
    /// No request timeout is applied unless `timeout` is given.
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Option<Duration>,
    ) -> GatewayResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            base_url,
            api_token: normalize_text_option(api_token),
            client: builder.build()?,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn owner_url(&self, owner: &OwnerKey) -> String {
        format!("{}/v1/users/{}", self.base_url, owner.as_str())
    }

    fn record_url(&self, owner: &OwnerKey, record_id: &RecordId) -> String {
        format!(
            "{}/records/{}",
            self.owner_url(owner),
            urlencoding::encode(record_id.as_str())
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthenticated,
            StatusCode::NOT_FOUND => GatewayError::NotFound(parse_api_error(status, &body)),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
                GatewayError::Unavailable(parse_api_error(status, &body))
            }
            _ => GatewayError::Api(parse_api_error(status, &body)),
        })
    }

    /// Like [`Self::send`], but a 404 becomes `None`.
    async fn send_optional(&self, request: RequestBuilder) -> GatewayResult<Option<Response>> {
        match self.send(request).await {
            Ok(response) => Ok(Some(response)),
            Err(GatewayError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedDocument {
    id: Option<String>,
    name: Option<String>,
}

impl RemoteGateway for HttpGateway {
    async fn create_profile(&self, owner: &OwnerKey, profile: &UserProfile) -> GatewayResult<()> {
        let url = format!("{}/profile", self.owner_url(owner));
        self.send(self.client.patch(url).json(profile)).await?;
        Ok(())
    }

    async fn create_record(
        &self,
        owner: &OwnerKey,
        record: &HealthRecord,
    ) -> GatewayResult<RecordId> {
        let url = format!("{}/records", self.owner_url(owner));
        let response = self
            .send(self.client.post(url).json(&stamp_for_create(record)))
            .await?;
        let created = response
            .json::<CreatedDocument>()
            .await
            .map_err(|error| GatewayError::InvalidPayload(error.to_string()))?;

        // Document names look like ".../records/{id}"
        created
            .id
            .or_else(|| {
                created
                    .name
                    .and_then(|name| name.rsplit('/').next().map(ToString::to_string))
            })
            .and_then(|id| normalize_text_option(Some(id)))
            .map(RecordId::new)
            .ok_or_else(|| {
                GatewayError::InvalidPayload("create response did not include an id".to_string())
            })
    }

    async fn update_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
        patch: &RecordPatch,
    ) -> GatewayResult<()> {
        let url = self.record_url(owner, record_id);
        self.send(self.client.patch(url).json(patch)).await?;
        Ok(())
    }

    async fn delete_record(
        &self,
        owner: &OwnerKey,
        record_id: &RecordId,
    ) -> GatewayResult<DeleteOutcome> {
        let url = self.record_url(owner, record_id);
        Ok(match self.send_optional(self.client.delete(url)).await? {
            Some(_) => DeleteOutcome::Deleted,
            None => DeleteOutcome::AlreadyAbsent,
        })
    }

    async fn read_profile(&self, owner: &OwnerKey) -> GatewayResult<Option<UserProfile>> {
        let url = format!("{}/profile", self.owner_url(owner));
        let Some(response) = self.send_optional(self.client.get(url)).await? else {
            return Ok(None);
        };
        let profile = response
            .json::<UserProfile>()
            .await
            .map_err(|error| GatewayError::InvalidPayload(error.to_string()))?;
        Ok(Some(profile))
    }

    async fn read_records(
        &self,
        owner: &OwnerKey,
        from: Timestamp,
        to: Timestamp,
    ) -> GatewayResult<Vec<HealthRecord>> {
        let url = format!("{}/records", self.owner_url(owner));
        let request = self.client.get(url).query(&[
            ("from", from.as_millis().to_string()),
            ("to", to.as_millis().to_string()),
            ("order", RecordOrder::Newest.as_query().to_string()),
        ]);
        let response = self.send(request).await?;
        response
            .json::<Vec<HealthRecord>>()
            .await
            .map_err(|error| GatewayError::InvalidPayload(error.to_string()))
    }

    async fn read_extreme_record(
        &self,
        owner: &OwnerKey,
        order: RecordOrder,
    ) -> GatewayResult<Option<HealthRecord>> {
        let url = format!("{}/records", self.owner_url(owner));
        let request = self
            .client
            .get(url)
            .query(&[("order", order.as_query()), ("limit", "1")]);
        let response = self.send(request).await?;
        let mut records = response
            .json::<Vec<HealthRecord>>()
            .await
            .map_err(|error| GatewayError::InvalidPayload(error.to_string()))?;
        Ok(if records.is_empty() {
            None
        } else {
            Some(records.swap_remove(0))
        })
    }
}

fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_connect() || error.is_timeout() {
        GatewayError::Unavailable(error.to_string())
    } else {
        GatewayError::Http(error)
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_base_url(raw: String) -> GatewayResult<String> {
    if raw.trim().is_empty() {
        return Err(GatewayError::InvalidConfiguration(
            "base URL must not be empty".to_string(),
        ));
    }
    crate::util::normalize_base_url(&raw).ok_or_else(|| {
        GatewayError::InvalidConfiguration("base URL must include http:// or https://".to_string())
    })
}
