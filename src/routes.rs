use actix_cors::Cors;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, HttpResponse, Responder};
use log::{error, info, warn};
use serde_json::Value;

use crate::error::{ApiError, Constraint, FieldError, PredictError, ValidationErrors};
use crate::inference::ModelInference;
use crate::models::{
    ErrorResponse, GlucoseFeatures, HealthResponse, ModelInfo, PredictionResponse, RootResponse,
    API_DESCRIPTION, API_TITLE, API_VERSION, FEATURE_COUNT, FEATURE_SPECS,
};

/// Request bodies are ten numbers; anything near this size is not a prediction request.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub async fn root() -> impl Responder {
    HttpResponse::Ok().json(RootResponse::default())
}

pub async fn health(inference: web::Data<ModelInference>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: inference.model_loaded(),
        scaler_loaded: inference.scaler_loaded(),
    })
}

pub async fn model_info(inference: web::Data<ModelInference>) -> impl Responder {
    HttpResponse::Ok().json(ModelInfo {
        title: API_TITLE,
        description: API_DESCRIPTION,
        version: API_VERSION,
        input_shape: [1, FEATURE_COUNT],
        features: &FEATURE_SPECS,
        model_loaded: inference.model_loaded(),
        model_kind: inference.model_kind(),
        scaler_loaded: inference.scaler_loaded(),
        scaler_kind: inference.scaler_kind(),
    })
}

pub async fn predict(
    inference: web::Data<ModelInference>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    let features = GlucoseFeatures::try_from(&body.into_inner()).map_err(|e| {
        warn!("Rejected prediction request: {}", e);
        e
    })?;

    // Unavailable model is a payload, not a failed request.
    if !inference.model_loaded() {
        warn!("Prediction requested but no model is loaded");
        return Ok(HttpResponse::Ok().json(ErrorResponse::new(PredictError::ModelNotLoaded.to_string())));
    }

    match web::block(move || inference.predict(&features)).await {
        Ok(Ok(level)) => {
            info!("Prediction succeeded: predicted_glucose_level={:.2}", level);
            Ok(HttpResponse::Ok().json(PredictionResponse {
                predicted_glucose_level: level,
            }))
        }
        Ok(Err(PredictError::ModelNotLoaded)) => {
            Ok(HttpResponse::Ok().json(ErrorResponse::new(PredictError::ModelNotLoaded.to_string())))
        }
        Ok(Err(e)) => {
            error!("Prediction error: {}", e);
            Err(e.into())
        }
        Err(e) => {
            error!("Blocking execution error: {}", e);
            Err(ApiError::Blocking(e.to_string()))
        }
    }
}

pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(ErrorResponse::new("Not Found"))
}

/// Malformed or oversized JSON is reported in the same shape as a field violation.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| {
            warn!("Rejected request body: {}", err);
            ApiError::from(ValidationErrors::single(FieldError::new(
                "body",
                Constraint::JsonInvalid,
                err.to_string(),
            )))
            .into()
        })
}

/// Wide open for prototyping clients: any origin, method and header, with credentials.
pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials()
        .max_age(3600)
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff"))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(root))
        .route("/health", web::get().to(health))
        .route("/model-info", web::get().to(model_info))
        .route("/predict", web::post().to(predict))
        .default_service(web::route().to(not_found));
}
