//! User profile document

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Clinical glucose thresholds read by charts and reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlucoseThresholds {
    pub very_high: f64,
    pub ideal_min: f64,
    pub ideal_max: f64,
    pub very_low: f64,
}

/// One profile document per user.
///
/// Kept as an open JSON object: this crate persists and reconciles profile
/// fields but does not validate them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(Map<String, Value>);

impl UserProfile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Profile values used when a field has never been set.
    #[must_use]
    pub fn defaults() -> Self {
        let value = json!({
            "tipoDiabetes": "Sin especificar",
            "anoDiagnostico": "",
            "sexo": "Sin especificar",
            "terapiaInsulina": "Sin especificar",
            "unidadGlucosa": "mg/dL",
            "unidadCarbohidratos": "Gramos",
            "medicamentos": [],
            "muyAlto": 180,
            "intervaloIdealMin": 70,
            "intervaloIdealMax": 140,
            "muyBajo": 54,
            "unidadPeso": "kg",
            "pesoDeseado": "",
            "unidadAltura": "cm",
            "altura": "",
            "unidadHbA1c": "%",
            "hba1c": ""
        });
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Overlay `other` on top of this profile, field by field.
    ///
    /// Nested objects are merged recursively; every other value in `other`
    /// replaces the existing one.
    pub fn merge_from(&mut self, other: &Self) {
        merge_objects(&mut self.0, &other.0);
    }

    /// Fill fields that were never set from [`UserProfile::defaults`].
    #[must_use]
    pub fn with_defaults(&self) -> Self {
        let mut merged = Self::defaults();
        merged.merge_from(self);
        merged
    }

    #[must_use]
    pub fn glucose_unit(&self) -> Option<&str> {
        self.str_field("unidadGlucosa")
    }

    #[must_use]
    pub fn carbohydrate_unit(&self) -> Option<&str> {
        self.str_field("unidadCarbohidratos")
    }

    #[must_use]
    pub fn diabetes_type(&self) -> Option<&str> {
        self.str_field("tipoDiabetes")
    }

    #[must_use]
    pub fn medications(&self) -> Vec<String> {
        self.0
            .get("medicamentos")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(name) => Some(name.clone()),
                        Value::Object(fields) => fields
                            .get("nombre")
                            .and_then(Value::as_str)
                            .map(ToString::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Thresholds, when all four are present and numeric.
    #[must_use]
    pub fn thresholds(&self) -> Option<GlucoseThresholds> {
        Some(GlucoseThresholds {
            very_high: self.number_field("muyAlto")?,
            ideal_min: self.number_field("intervaloIdealMin")?,
            ideal_max: self.number_field("intervaloIdealMax")?,
            very_low: self.number_field("muyBajo")?,
        })
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    // Form inputs sometimes persist numbers as strings.
    fn number_field(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(number) => number.as_f64(),
            Value::String(raw) => raw.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for UserProfile {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

fn merge_objects(target: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        if let (Some(Value::Object(existing)), Value::Object(incoming)) =
            (target.get_mut(key), value)
        {
            merge_objects(existing, incoming);
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_from_later_values_win() {
        let mut profile = UserProfile::new()
            .with("unidadGlucosa", "mg/dL")
            .with("muyAlto", 180);
        profile.merge_from(&UserProfile::new().with("unidadGlucosa", "mmol/L"));

        assert_eq!(profile.glucose_unit(), Some("mmol/L"));
        assert_eq!(profile.get("muyAlto"), Some(&json!(180)));
    }

    #[test]
    fn test_merge_from_recurses_into_objects() {
        let mut profile = UserProfile::new().with("dashboard", json!({ "layout": "grid", "cards": 4 }));
        profile.merge_from(&UserProfile::new().with("dashboard", json!({ "layout": "list" })));

        assert_eq!(
            profile.get("dashboard"),
            Some(&json!({ "layout": "list", "cards": 4 }))
        );
    }

    #[test]
    fn test_merge_from_replaces_arrays() {
        let mut profile = UserProfile::new().with("medicamentos", json!(["Metformina"]));
        profile.merge_from(&UserProfile::new().with("medicamentos", json!(["Insulina"])));
        assert_eq!(profile.medications(), vec!["Insulina"]);
    }

    #[test]
    fn test_with_defaults_keeps_user_values() {
        let profile = UserProfile::new().with("muyAlto", "200").with_defaults();
        let thresholds = profile.thresholds().unwrap();
        assert!((thresholds.very_high - 200.0).abs() < f64::EPSILON);
        assert!((thresholds.very_low - 54.0).abs() < f64::EPSILON);
        assert_eq!(profile.carbohydrate_unit(), Some("Gramos"));
        assert_eq!(profile.diabetes_type(), Some("Sin especificar"));
    }

    #[test]
    fn test_thresholds_require_all_fields() {
        assert!(UserProfile::new().with("muyAlto", 180).thresholds().is_none());
    }
}
