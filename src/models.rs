use serde::Serialize;
use serde_json::Value;

use crate::error::{Constraint, FieldError, ValidationErrors};

pub const FEATURE_COUNT: usize = 10;

pub const API_TITLE: &str = "Glucose Level Prediction API";
pub const API_DESCRIPTION: &str = "An API that predicts glucose levels using a trained ML model.";
pub const API_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Float,
}

/// Name, type and inclusive bounds of one request field.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub min: f64,
    pub max: f64,
    pub description: &'static str,
}

/// Request fields in the order the model was trained on.
pub const FEATURE_SPECS: [FieldSpec; FEATURE_COUNT] = [
    FieldSpec { name: "AGE", kind: FieldKind::Integer, min: 10.0, max: 100.0, description: "Age of the patient" },
    FieldSpec { name: "GENDER", kind: FieldKind::Integer, min: 0.0, max: 1.0, description: "0 = Female, 1 = Male" },
    FieldSpec { name: "WEIGHT", kind: FieldKind::Float, min: 20.0, max: 200.0, description: "Weight in kg" },
    FieldSpec { name: "SKIN_COLOR", kind: FieldKind::Integer, min: 1.0, max: 3.0, description: "Skin color code (1-3)" },
    FieldSpec { name: "NIR_Reading", kind: FieldKind::Float, min: 50.0, max: 1000.0, description: "Near Infrared Reading" },
    FieldSpec { name: "HEARTRATE", kind: FieldKind::Float, min: 20.0, max: 200.0, description: "Heart rate in bpm" },
    FieldSpec { name: "HEIGHT", kind: FieldKind::Float, min: 4.0, max: 7.5, description: "Height in feet" },
    FieldSpec { name: "LAST_EATEN", kind: FieldKind::Float, min: 0.0, max: 24.0, description: "Hours since last meal" },
    FieldSpec { name: "DIABETIC", kind: FieldKind::Integer, min: 0.0, max: 1.0, description: "0 = Non-diabetic, 1 = Diabetic" },
    FieldSpec { name: "HR_IR", kind: FieldKind::Float, min: 10000.0, max: 120000.0, description: "HR Infrared Reading" },
];

impl FieldSpec {
    /// Checks presence, type and range of a raw JSON value. No coercion from strings, booleans or null.
    pub fn check(&self, value: Option<&Value>) -> Result<f64, FieldError> {
        let value = value.ok_or_else(|| FieldError::new(self.name, Constraint::Missing, "Field required"))?;

        let number = match (self.kind, value.as_f64()) {
            (FieldKind::Integer, Some(n)) if n.fract() == 0.0 => n,
            (FieldKind::Integer, _) => {
                return Err(FieldError::new(
                    self.name,
                    Constraint::IntType,
                    format!("Input should be a valid integer, got {value}"),
                ))
            }
            (FieldKind::Float, Some(n)) => n,
            (FieldKind::Float, None) => {
                return Err(FieldError::new(
                    self.name,
                    Constraint::FloatType,
                    format!("Input should be a valid number, got {value}"),
                ))
            }
        };

        if number < self.min {
            return Err(FieldError::new(
                self.name,
                Constraint::GreaterThanEqual,
                format!("Input should be greater than or equal to {}", self.min),
            ));
        }
        if number > self.max {
            return Err(FieldError::new(
                self.name,
                Constraint::LessThanEqual,
                format!("Input should be less than or equal to {}", self.max),
            ));
        }

        Ok(number)
    }
}

/// A prediction request whose fields have all passed validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlucoseFeatures {
    #[serde(rename = "AGE")]
    pub age: i64,
    #[serde(rename = "GENDER")]
    pub gender: i64,
    #[serde(rename = "WEIGHT")]
    pub weight: f64,
    #[serde(rename = "SKIN_COLOR")]
    pub skin_color: i64,
    #[serde(rename = "NIR_Reading")]
    pub nir_reading: f64,
    #[serde(rename = "HEARTRATE")]
    pub heartrate: f64,
    #[serde(rename = "HEIGHT")]
    pub height: f64,
    #[serde(rename = "LAST_EATEN")]
    pub last_eaten: f64,
    #[serde(rename = "DIABETIC")]
    pub diabetic: i64,
    #[serde(rename = "HR_IR")]
    pub hr_ir: f64,
}

impl GlucoseFeatures {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.age as f64,
            self.gender as f64,
            self.weight,
            self.skin_color as f64,
            self.nir_reading,
            self.heartrate,
            self.height,
            self.last_eaten,
            self.diabetic as f64,
            self.hr_ir,
        ]
    }

    fn from_checked(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            age: values[0] as i64,
            gender: values[1] as i64,
            weight: values[2],
            skin_color: values[3] as i64,
            nir_reading: values[4],
            heartrate: values[5],
            height: values[6],
            last_eaten: values[7],
            diabetic: values[8] as i64,
            hr_ir: values[9],
        }
    }
}

impl TryFrom<&Value> for GlucoseFeatures {
    type Error = ValidationErrors;

    fn try_from(body: &Value) -> Result<Self, Self::Error> {
        let object = body.as_object().ok_or_else(|| {
            ValidationErrors::single(FieldError::new(
                "body",
                Constraint::ObjectType,
                "Input should be a valid JSON object",
            ))
        })?;

        let mut values = [0.0; FEATURE_COUNT];
        let mut detail = Vec::new();
        for (slot, spec) in values.iter_mut().zip(FEATURE_SPECS.iter()) {
            match spec.check(object.get(spec.name)) {
                Ok(number) => *slot = number,
                Err(e) => detail.push(e),
            }
        }

        if !detail.is_empty() {
            return Err(ValidationErrors { detail });
        }
        Ok(Self::from_checked(values))
    }
}

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
}

impl Default for RootResponse {
    fn default() -> Self {
        Self {
            message: format!("{API_TITLE} is running"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub scaler_loaded: bool,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub predicted_glucose_level: f64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub title: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub input_shape: [usize; 2],
    pub features: &'static [FieldSpec],
    pub model_loaded: bool,
    pub model_kind: Option<&'static str>,
    pub scaler_loaded: bool,
    pub scaler_kind: Option<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_body() -> Value {
        json!({
            "AGE": 45,
            "GENDER": 1,
            "WEIGHT": 80,
            "SKIN_COLOR": 2,
            "NIR_Reading": 500,
            "HEARTRATE": 75,
            "HEIGHT": 5.8,
            "LAST_EATEN": 3,
            "DIABETIC": 0,
            "HR_IR": 60000
        })
    }

    fn with_field(name: &str, value: Value) -> Value {
        let mut body = sample_body();
        body[name] = value;
        body
    }

    fn bound(spec: &FieldSpec, n: f64) -> Value {
        match spec.kind {
            FieldKind::Integer => json!(n as i64),
            FieldKind::Float => json!(n),
        }
    }

    #[test]
    fn sample_request_builds_vector_in_training_order() {
        let features = GlucoseFeatures::try_from(&sample_body()).unwrap();
        assert_eq!(
            features.to_array(),
            [45.0, 1.0, 80.0, 2.0, 500.0, 75.0, 5.8, 3.0, 0.0, 60000.0]
        );
    }

    #[test]
    fn every_field_accepts_inclusive_bounds() {
        for spec in FEATURE_SPECS.iter() {
            for n in [spec.min, spec.max] {
                let body = with_field(spec.name, bound(spec, n));
                assert!(
                    GlucoseFeatures::try_from(&body).is_ok(),
                    "{} should accept {}",
                    spec.name,
                    n
                );
            }
        }
    }

    #[test]
    fn every_field_rejects_one_unit_outside_bounds() {
        for spec in FEATURE_SPECS.iter() {
            let below = GlucoseFeatures::try_from(&with_field(spec.name, bound(spec, spec.min - 1.0))).unwrap_err();
            assert_eq!(below.detail.len(), 1);
            assert_eq!(below.detail[0].field, spec.name);
            assert_eq!(below.detail[0].constraint, Constraint::GreaterThanEqual);

            let above = GlucoseFeatures::try_from(&with_field(spec.name, bound(spec, spec.max + 1.0))).unwrap_err();
            assert_eq!(above.detail[0].field, spec.name);
            assert_eq!(above.detail[0].constraint, Constraint::LessThanEqual);
        }
    }

    #[test]
    fn age_below_minimum_names_age() {
        let err = GlucoseFeatures::try_from(&with_field("AGE", json!(5))).unwrap_err();
        assert!(err.mentions("AGE"));
        assert_eq!(err.detail[0].message, "Input should be greater than or equal to 10");
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let mut body = sample_body();
        let object = body.as_object_mut().unwrap();
        object.remove("WEIGHT");
        object.remove("HR_IR");

        let err = GlucoseFeatures::try_from(&body).unwrap_err();
        let fields: Vec<_> = err.detail.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["WEIGHT", "HR_IR"]);
        assert!(err.detail.iter().all(|e| e.constraint == Constraint::Missing));
    }

    #[test]
    fn types_are_not_coerced() {
        let err = GlucoseFeatures::try_from(&with_field("AGE", json!("45"))).unwrap_err();
        assert_eq!(err.detail[0].constraint, Constraint::IntType);

        let err = GlucoseFeatures::try_from(&with_field("AGE", json!(45.5))).unwrap_err();
        assert_eq!(err.detail[0].constraint, Constraint::IntType);

        let err = GlucoseFeatures::try_from(&with_field("WEIGHT", json!(null))).unwrap_err();
        assert_eq!(err.detail[0].constraint, Constraint::FloatType);

        let err = GlucoseFeatures::try_from(&with_field("DIABETIC", json!(true))).unwrap_err();
        assert_eq!(err.detail[0].constraint, Constraint::IntType);
    }

    #[test]
    fn integral_floats_are_accepted_for_integer_fields() {
        let features = GlucoseFeatures::try_from(&with_field("AGE", json!(45.0))).unwrap();
        assert_eq!(features.age, 45);
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = GlucoseFeatures::try_from(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.detail[0].field, "body");
        assert_eq!(err.detail[0].constraint, Constraint::ObjectType);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let features = GlucoseFeatures::try_from(&with_field("NOTE", json!("fasting"))).unwrap();
        assert_eq!(features.hr_ir, 60000.0);
    }
}
