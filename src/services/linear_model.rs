// Linear Classifier
// Standardized binary linear model exported as JSON

use crate::models::Label;
use crate::services::nlp::{CapabilityError, Classifier};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearModel {
    /// `[negative, positive]` class labels.
    pub classes: [Label; 2],
    /// Per-feature standardization; empty means identity.
    #[serde(default)]
    pub mean: Vec<f64>,
    #[serde(default)]
    pub scale: Vec<f64>,
    pub coef: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn load(path: &Path) -> Result<Self, CapabilityError> {
        let content = fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&content)
            .map_err(|e| CapabilityError::InvalidModel(format!("{:?}: {}", path, e)))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), CapabilityError> {
        let n = self.coef.len();
        if n == 0 {
            return Err(CapabilityError::InvalidModel("empty coefficient vector".to_string()));
        }
        for (name, values) in [("mean", &self.mean), ("scale", &self.scale)] {
            if !values.is_empty() && values.len() != n {
                return Err(CapabilityError::InvalidModel(format!(
                    "{} has {} entries, coef has {}",
                    name,
                    values.len(),
                    n
                )));
            }
        }
        Ok(())
    }

    pub fn decision_function(&self, features: &[f64]) -> f64 {
        let mut score = self.intercept;
        for (i, (x, w)) in features.iter().zip(&self.coef).enumerate() {
            let mean = self.mean.get(i).copied().unwrap_or(0.0);
            // Zero-variance features were left unscaled at training time.
            let scale = self.scale.get(i).copied().filter(|s| *s != 0.0).unwrap_or(1.0);
            score += w * (x - mean) / scale;
        }
        score
    }
}

impl Classifier for LinearModel {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn predict(&self, features: &[f64]) -> Result<Label, CapabilityError> {
        if features.len() != self.coef.len() {
            return Err(CapabilityError::InvalidModel(format!(
                "model expects {} features, got {}",
                self.coef.len(),
                features.len()
            )));
        }
        let class = if self.decision_function(features) > 0.0 { 1 } else { 0 };
        Ok(self.classes[class])
    }
}
