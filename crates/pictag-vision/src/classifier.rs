//! Classifier trait and the Candle-backed model bundle

use crate::config::{ConvNextConfig, LabelTable};
use crate::convnext::ConvNext;
use crate::device::{device_name, inference_dtype, select_device, DeviceSpec};
use crate::preprocess::{ImageProcessor, PreprocessorConfig};
use crate::source::{ModelSource, WeightsFormat};
use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::VarBuilder;
use image::RgbImage;
use pictag_core::{top1, Error, Prediction, Result};
use std::time::Instant;

/// Trait for top-1 image classifiers.
///
/// `classify` is blocking and CPU/GPU bound; async callers should run it on a
/// blocking thread.
pub trait ImageClassifier: Send + Sync {
    /// Identifier the model was loaded from
    fn model_id(&self) -> &str;

    /// Number of classes in the label table
    fn num_classes(&self) -> usize;

    /// Classify one decoded image
    fn classify(&self, image: &RgbImage) -> Result<Prediction>;
}

/// Options for loading a [`ModelBundle`]
#[derive(Debug, Clone)]
pub struct BundleConfig {
    /// Local directory or Hugging Face repository id
    pub model_id: String,

    /// Hub revision, ignored for local directories
    pub revision: String,

    /// Device to run inference on
    pub device: DeviceSpec,
}

impl BundleConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            revision: "main".to_string(),
            device: DeviceSpec::Auto,
        }
    }

    /// Set Hugging Face revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.device = device;
        self
    }
}

/// Preprocessing pipeline, network, and label table loaded once at startup
pub struct ModelBundle {
    model_id: String,
    processor: ImageProcessor,
    network: ConvNext,
    labels: LabelTable,
    device: Device,
    dtype: DType,
}

impl ModelBundle {
    /// Resolve, download if needed, and load a model
    pub fn load(config: BundleConfig) -> Result<Self> {
        let start = Instant::now();

        let files = ModelSource::from_identifier(&config.model_id, &config.revision).resolve()?;
        let device = select_device(config.device)?;
        let dtype = inference_dtype(&device);

        let net_config = ConvNextConfig::from_file(&files.config)?;

        let processor_config = match &files.preprocessor {
            Some(path) => PreprocessorConfig::from_file(path)?,
            None => {
                tracing::warn!(
                    "No preprocessor_config.json for '{}', using processor defaults",
                    config.model_id
                );
                PreprocessorConfig::default()
            }
        };
        let processor = ImageProcessor::new(processor_config)?;

        let vb = match files.format {
            WeightsFormat::SafeTensors => unsafe {
                VarBuilder::from_mmaped_safetensors(&[&files.weights], dtype, &device)
                    .map_err(|e| Error::model(format!("Failed to load SafeTensors: {}", e)))?
            },
            WeightsFormat::PyTorch => VarBuilder::from_pth(&files.weights, dtype, &device)
                .map_err(|e| Error::model(format!("Failed to load PyTorch weights: {}", e)))?,
        };

        let network = ConvNext::load(&net_config, vb)
            .map_err(|e| Error::model(format!("Failed to build ConvNeXt: {}", e)))?;

        tracing::info!(
            model_id = %config.model_id,
            device = device_name(&device),
            dtype = ?dtype,
            classes = net_config.num_labels(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Model loaded"
        );

        Ok(Self {
            model_id: config.model_id,
            processor,
            network,
            labels: net_config.labels,
            device,
            dtype,
        })
    }

    /// Softmax distribution over all classes for one image
    pub fn probabilities(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let pixel_values = self.processor.preprocess(image, &self.device, self.dtype)?;
        let logits = self
            .network
            .forward(&pixel_values)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))?;
        softmax_row(&logits)
    }
}

impl ImageClassifier for ModelBundle {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn num_classes(&self) -> usize {
        self.labels.len()
    }

    fn classify(&self, image: &RgbImage) -> Result<Prediction> {
        let probs = self.probabilities(image)?;
        let (index, confidence) =
            top1(&probs).ok_or_else(|| Error::inference("Model produced no class scores"))?;
        Ok(Prediction::new(index, self.labels.get(index), confidence))
    }
}

/// Softmax over the class dimension of `1×N` logits, computed in f32
fn softmax_row(logits: &Tensor) -> Result<Vec<f32>> {
    logits
        .to_dtype(DType::F32)
        .and_then(|l| candle_nn::ops::softmax(&l, D::Minus1))
        .and_then(|p| p.squeeze(0))
        .and_then(|p| p.to_vec1::<f32>())
        .map_err(|e| Error::inference(format!("Failed to read class scores: {}", e)))
}
