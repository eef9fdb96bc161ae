use std::path::Path;

use anyhow::{bail, ensure};
use serde::Deserialize;

use crate::error::ArtifactError;
use crate::inference::{extension, load_onnx, read_json, OnnxGraph};

/// Normalizes a raw feature vector before inference.
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> anyhow::Result<Vec<f64>>;

    fn kind(&self) -> &'static str;
}

/// Per-feature standardization, `(x - mean) / scale`, with scikit-learn's `mean_` / `scale_`.
#[derive(Debug, Clone, Deserialize)]
pub struct StandardScaler {
    #[serde(alias = "mean_")]
    mean: Vec<f64>,
    #[serde(alias = "scale_")]
    scale: Vec<f64>,
}

impl StandardScaler {
    #[cfg(test)]
    pub(crate) fn new(mean: Vec<f64>, scale: Vec<f64>) -> anyhow::Result<Self> {
        let scaler = Self { mean, scale };
        scaler.check(scaler.mean.len())?;
        Ok(scaler)
    }

    fn check(&self, n_features: usize) -> anyhow::Result<()> {
        ensure!(
            self.mean.len() == n_features && self.scale.len() == n_features,
            "expected {} means and scales, found {} and {}",
            n_features,
            self.mean.len(),
            self.scale.len()
        );
        if let Some(i) = self.scale.iter().position(|s| *s == 0.0 || !s.is_finite()) {
            bail!("scale[{}] must be finite and non-zero", i);
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> anyhow::Result<Vec<f64>> {
        ensure!(
            features.len() == self.mean.len(),
            "expected {} features, got {}",
            self.mean.len(),
            features.len()
        );

        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    fn kind(&self) -> &'static str {
        "standard"
    }
}

impl FeatureScaler for OnnxGraph {
    fn transform(&self, features: &[f64]) -> anyhow::Result<Vec<f64>> {
        self.run(features)
    }

    fn kind(&self) -> &'static str {
        "onnx"
    }
}

/// Loads a scaler artifact, picking the format from the file extension.
pub fn load_scaler(path: &Path, n_features: usize) -> Result<Box<dyn FeatureScaler>, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }

    match extension(path).as_deref() {
        Some("onnx") => Ok(Box::new(load_onnx(path, n_features)?)),
        Some("json") => {
            let scaler: StandardScaler = read_json(path)?;
            scaler.check(n_features).map_err(|e| ArtifactError::Invalid {
                path: path.to_path_buf(),
                message: format!("{e:#}"),
            })?;
            Ok(Box::new(scaler))
        }
        _ => Err(ArtifactError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn standardizes_each_feature() {
        let scaler = StandardScaler::new(vec![10.0, 0.0, -2.0], vec![2.0, 1.0, 0.5]).unwrap();
        let scaled = scaler.transform(&[14.0, 3.0, -1.0]).unwrap();
        assert_eq!(scaled, vec![2.0, 3.0, 2.0]);
    }

    #[test]
    fn rejects_zero_or_mismatched_scale() {
        assert!(StandardScaler::new(vec![0.0, 0.0], vec![1.0]).is_err());
        let err = StandardScaler::new(vec![0.0, 0.0], vec![1.0, 0.0]).unwrap_err();
        assert_eq!(err.to_string(), "scale[1] must be finite and non-zero");
    }

    #[test]
    fn transform_checks_dimension() {
        let scaler = StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        assert!(scaler.transform(&[1.0]).is_err());
    }

    #[test]
    fn load_scaler_accepts_sklearn_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        fs::write(&path, r#"{"mean_": [1.0, 2.0], "scale_": [0.5, 4.0]}"#).unwrap();

        let scaler = load_scaler(&path, 2).unwrap();
        assert_eq!(scaler.kind(), "standard");
        assert_eq!(scaler.transform(&[2.0, 10.0]).unwrap(), vec![2.0, 2.0]);
    }

    #[test]
    fn load_scaler_rejects_wrong_feature_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        fs::write(&path, r#"{"mean": [1.0, 2.0], "scale": [0.5, 4.0]}"#).unwrap();

        assert!(matches!(
            load_scaler(&path, 10),
            Err(ArtifactError::Invalid { .. })
        ));
    }

    #[test]
    fn load_scaler_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_scaler(&dir.path().join("scaler.pkl"), 10),
            Err(ArtifactError::NotFound(_))
        ));
    }
}
