//! Prediction and response types

use crate::labels::{pretty_label, verdict_message};
use serde::{Deserialize, Serialize};

/// Top-1 output of an image classifier
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Winning class index in the model's label table
    pub index: usize,

    /// Raw label as stored in the label table
    pub label: String,

    /// Softmax probability of the winning class
    pub confidence: f32,
}

impl Prediction {
    pub fn new(index: usize, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            index,
            label: label.into(),
            confidence,
        }
    }
}

/// JSON body returned by a successful classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub filename: String,
    pub model_id: String,
    pub label: String,
    pub pretty_label: String,
    pub confidence: f32,
    pub message: String,
}

impl ClassificationResult {
    /// Build the response for one upload from the classifier's top-1 prediction
    pub fn from_prediction(
        filename: impl Into<String>,
        model_id: impl Into<String>,
        prediction: Prediction,
    ) -> Self {
        let confidence = if prediction.confidence.is_nan() {
            0.0
        } else {
            prediction.confidence.clamp(0.0, 1.0)
        };
        let pretty = pretty_label(&prediction.label);
        let message = verdict_message(&pretty, confidence);

        Self {
            filename: filename.into(),
            model_id: model_id.into(),
            label: prediction.label,
            pretty_label: pretty,
            confidence,
            message,
        }
    }
}
