// Unit Classifier
// Guards the injected classifier with the method's feature schema

use super::DetectError;
use crate::models::{FeatureVector, Label, Method};
use crate::services::nlp::Classifier;
use std::sync::Arc;

pub struct UnitClassifier {
    method: Method,
    model: Arc<dyn Classifier>,
}

impl UnitClassifier {
    /// Fails when the model was trained on a different feature count.
    pub fn new(method: Method, model: Arc<dyn Classifier>) -> Result<Self, DetectError> {
        let expected = method.feature_len();
        let actual = model.n_features();
        if actual != expected {
            return Err(DetectError::SchemaMismatch {
                method,
                expected,
                actual,
            });
        }
        Ok(Self { method, model })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Label, DetectError> {
        let expected = self.method.feature_len();
        if features.method != self.method || features.len() != expected {
            return Err(DetectError::SchemaMismatch {
                method: self.method,
                expected,
                actual: features.len(),
            });
        }
        Ok(self.model.predict(features.as_slice())?)
    }
}
