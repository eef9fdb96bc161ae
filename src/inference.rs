use std::fs;
use std::path::Path;

use anyhow::{anyhow, ensure};
use log::{error, info, warn};
use serde::Deserialize;
use tract_onnx::prelude::*;

use crate::error::{ArtifactError, PredictError};
use crate::models::{GlucoseFeatures, FEATURE_COUNT};
use crate::scaler::{load_scaler, FeatureScaler};

/// Anything that maps one feature vector to a vector of outputs.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> anyhow::Result<Vec<f64>>;

    /// Short label reported by `/model-info`.
    fn kind(&self) -> &'static str;
}

/// An optimized ONNX graph taking a `[1, n_features]` f32 input.
///
/// Callers work in f64; values are narrowed to f32 only at the graph boundary.
pub struct OnnxGraph {
    plan: TypedRunnableModel<TypedModel>,
    n_features: usize,
}

impl OnnxGraph {
    pub fn load<P: AsRef<Path>>(path: P, n_features: usize) -> TractResult<Self> {
        let plan = tract_onnx::onnx()
            .model_for_path(path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, n_features)),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { plan, n_features })
    }

    pub fn run(&self, features: &[f64]) -> TractResult<Vec<f64>> {
        ensure!(
            features.len() == self.n_features,
            "expected {} features, got {}",
            self.n_features,
            features.len()
        );

        let narrowed: Vec<f32> = features.iter().map(|x| *x as f32).collect();
        let input = Tensor::from_shape(&[1, self.n_features], &narrowed)?;
        let outputs = self.plan.run(tvec!(input.into()))?;
        let first = outputs.first().ok_or_else(|| anyhow!("graph produced no outputs"))?;

        Ok(first.to_array_view::<f32>()?.iter().map(|y| f64::from(*y)).collect())
    }
}

impl Regressor for OnnxGraph {
    fn predict(&self, features: &[f64]) -> anyhow::Result<Vec<f64>> {
        self.run(features)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// Ordinary least squares weights, as exported from scikit-learn's `coef_` / `intercept_`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearRegressor {
    #[serde(alias = "coef_")]
    pub coefficients: Vec<f64>,
    #[serde(alias = "intercept_")]
    pub intercept: f64,
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: &[f64]) -> anyhow::Result<Vec<f64>> {
        ensure!(
            features.len() == self.coefficients.len(),
            "expected {} features, got {}",
            self.coefficients.len(),
            features.len()
        );

        let dot: f64 = features
            .iter()
            .zip(&self.coefficients)
            .map(|(x, w)| x * w)
            .sum();
        Ok(vec![self.intercept + dot])
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let content = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn load_onnx(path: &Path, n_features: usize) -> Result<OnnxGraph, ArtifactError> {
    OnnxGraph::load(path, n_features).map_err(|e| ArtifactError::Onnx {
        path: path.to_path_buf(),
        message: format!("{e:#}"),
    })
}

pub(crate) fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Loads a model artifact, picking the runtime from the file extension.
pub fn load_regressor(path: &Path, n_features: usize) -> Result<Box<dyn Regressor>, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }

    match extension(path).as_deref() {
        Some("onnx") => Ok(Box::new(load_onnx(path, n_features)?)),
        Some("json") => {
            let model: LinearRegressor = read_json(path)?;
            if model.coefficients.len() != n_features {
                return Err(ArtifactError::Invalid {
                    path: path.to_path_buf(),
                    message: format!(
                        "expected {} coefficients, found {}",
                        n_features,
                        model.coefficients.len()
                    ),
                });
            }
            Ok(Box::new(model))
        }
        _ => Err(ArtifactError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Round to two decimal places, ties to even like Python's `round(x, 2)`.
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// The model and optional scaler, loaded once and shared read-only by every worker.
pub struct ModelInference {
    model: Option<Box<dyn Regressor>>,
    scaler: Option<Box<dyn FeatureScaler>>,
}

impl ModelInference {
    pub fn new(model: Option<Box<dyn Regressor>>, scaler: Option<Box<dyn FeatureScaler>>) -> Self {
        Self { model, scaler }
    }

    /// Never fails: an artifact that cannot be loaded is logged and left out.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(model_path: P, scaler_path: Q) -> Self {
        let model_path = model_path.as_ref();
        let model = match load_regressor(model_path, FEATURE_COUNT) {
            Ok(model) => {
                info!("Model loaded successfully from {}", model_path.display());
                Some(model)
            }
            Err(e) => {
                error!("Error loading model: {}", e);
                None
            }
        };

        let scaler_path = scaler_path.as_ref();
        let scaler = if scaler_path.exists() {
            match load_scaler(scaler_path, FEATURE_COUNT) {
                Ok(scaler) => {
                    info!("Scaler loaded successfully from {}", scaler_path.display());
                    Some(scaler)
                }
                Err(e) => {
                    error!("Error loading scaler: {}", e);
                    None
                }
            }
        } else {
            warn!(
                "Scaler file not found at {}, proceeding without scaling",
                scaler_path.display()
            );
            None
        };

        Self { model, scaler }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn scaler_loaded(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn model_kind(&self) -> Option<&'static str> {
        self.model.as_deref().map(|model| model.kind())
    }

    pub fn scaler_kind(&self) -> Option<&'static str> {
        self.scaler.as_deref().map(|scaler| scaler.kind())
    }

    /// One inference call per request, rounded to two decimals.
    pub fn predict(&self, features: &GlucoseFeatures) -> Result<f64, PredictError> {
        let model = self.model.as_deref().ok_or(PredictError::ModelNotLoaded)?;

        let raw = features.to_array();
        let input = match self.scaler.as_deref() {
            Some(scaler) => scaler
                .transform(&raw)
                .map_err(|e| PredictError::Scaling(format!("{e:#}")))?,
            None => raw.to_vec(),
        };

        let outputs = model
            .predict(&input)
            .map_err(|e| PredictError::Inference(format!("{e:#}")))?;
        let value = *outputs.first().ok_or(PredictError::EmptyOutput)?;
        if !value.is_finite() {
            return Err(PredictError::NonFinite(value));
        }

        Ok(round_to_cents(value))
    }
}
