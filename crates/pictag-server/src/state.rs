use metrics_exporter_prometheus::PrometheusHandle;
use pictag_vision::ImageClassifier;
use std::sync::Arc;

/// Shared application state, built once at startup and injected into handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded model, read-only and shared by all requests
    pub classifier: Arc<dyn ImageClassifier>,

    /// Prometheus exporter handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(classifier: Arc<dyn ImageClassifier>) -> Self {
        Self {
            classifier,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn model_id(&self) -> &str {
        self.classifier.model_id()
    }
}
