//! Hugging Face `config.json` parsing for ConvNeXt image classifiers

use pictag_core::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// ConvNeXt generation, which decides block layout and weight prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// ConvNeXt: layer scale after the pointwise projection
    V1,
    /// ConvNeXt V2: global response normalization, no layer scale
    V2,
}

impl Variant {
    /// Name prefix of backbone weights in the checkpoint
    pub fn weight_prefix(&self) -> &'static str {
        match self {
            Self::V1 => "convnext",
            Self::V2 => "convnextv2",
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    model_type: String,
    #[serde(default = "default_num_channels")]
    num_channels: usize,
    #[serde(default = "default_patch_size")]
    patch_size: usize,
    #[serde(default = "default_depths")]
    depths: Vec<usize>,
    #[serde(default = "default_hidden_sizes")]
    hidden_sizes: Vec<usize>,
    #[serde(default = "default_layer_norm_eps")]
    layer_norm_eps: f64,
    #[serde(default = "default_layer_scale_init_value")]
    layer_scale_init_value: f64,
    #[serde(default)]
    id2label: HashMap<String, String>,
}

/// Validated network configuration plus the model's label table
#[derive(Debug, Clone)]
pub struct ConvNextConfig {
    pub variant: Variant,
    pub num_channels: usize,
    pub patch_size: usize,
    pub depths: Vec<usize>,
    pub hidden_sizes: Vec<usize>,
    pub layer_norm_eps: f64,
    pub layer_scale_init_value: f64,
    pub labels: LabelTable,
}

impl ConvNextConfig {
    /// Read and validate a `config.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate `config.json` contents
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Failed to parse model config: {}", e)))?;

        let variant = match raw.model_type.as_str() {
            "convnext" => Variant::V1,
            "convnextv2" => Variant::V2,
            other => {
                return Err(Error::config(format!(
                    "Unsupported model_type '{}' (expected convnext or convnextv2)",
                    other
                )))
            }
        };

        if raw.depths.is_empty() || raw.depths.len() != raw.hidden_sizes.len() {
            return Err(Error::config(format!(
                "depths ({}) and hidden_sizes ({}) must be non-empty and the same length",
                raw.depths.len(),
                raw.hidden_sizes.len()
            )));
        }

        let labels = LabelTable::from_id2label(&raw.id2label)?;

        Ok(Self {
            variant,
            num_channels: raw.num_channels,
            patch_size: raw.patch_size,
            depths: raw.depths,
            hidden_sizes: raw.hidden_sizes,
            layer_norm_eps: raw.layer_norm_eps,
            layer_scale_init_value: raw.layer_scale_init_value,
            labels,
        })
    }

    /// Number of output classes
    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }
}

/// Class index to raw label lookup, dense over `0..len`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Build from a Hugging Face `id2label` map, filling gaps with `LABEL_{index}`
    pub fn from_id2label(id2label: &HashMap<String, String>) -> Result<Self> {
        if id2label.is_empty() {
            return Err(Error::config("Model config has an empty id2label table"));
        }

        // Keys may leave gaps but must stay below twice the entry count
        let max_index = id2label.len() * 2;
        let mut indexed = Vec::with_capacity(id2label.len());
        for (key, label) in id2label {
            let idx = key
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::config(format!("Non-numeric id2label key '{}'", key)))?;
            if idx >= max_index {
                return Err(Error::config(format!(
                    "id2label key {} is out of range for {} labels",
                    idx,
                    id2label.len()
                )));
            }
            indexed.push((idx, label.clone()));
        }

        let len = indexed.iter().map(|(idx, _)| idx + 1).max().unwrap_or(0);
        let mut labels: Vec<String> = (0..len).map(fallback_label).collect();
        for (idx, label) in indexed {
            labels[idx] = label;
        }

        Ok(Self { labels })
    }

    /// Raw label for a class index
    pub fn get(&self, index: usize) -> String {
        self.labels
            .get(index)
            .cloned()
            .unwrap_or_else(|| fallback_label(index))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn fallback_label(index: usize) -> String {
    format!("LABEL_{}", index)
}

fn default_num_channels() -> usize {
    3
}

fn default_patch_size() -> usize {
    4
}

fn default_depths() -> Vec<usize> {
    vec![3, 3, 9, 3]
}

fn default_hidden_sizes() -> Vec<usize> {
    vec![96, 192, 384, 768]
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

fn default_layer_scale_init_value() -> f64 {
    1e-6
}
