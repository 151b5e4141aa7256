//! pictag Vision
//!
//! Candle-based image classification for the pictag service.
//!
//! Loading happens once at startup: a model identifier resolves to a local
//! directory or a Hugging Face Hub repository, a device is selected, and the
//! preprocessing pipeline, ConvNeXt network, and label table are built into a
//! [`ModelBundle`]. Requests then go through [`decode_rgb`] and
//! [`ImageClassifier::classify`].

pub mod classifier;
pub mod config;
pub mod convnext;
pub mod decode;
pub mod device;
pub mod preprocess;
pub mod source;

pub use classifier::{BundleConfig, ImageClassifier, ModelBundle};
pub use config::{ConvNextConfig, LabelTable, Variant};
pub use convnext::ConvNext;
pub use decode::decode_rgb;
pub use device::{device_name, inference_dtype, select_device, DeviceSpec};
pub use preprocess::{ImageProcessor, PreprocessorConfig};
pub use source::{ModelFiles, ModelSource, WeightsFormat};

/// Re-exported so classifier implementations need not depend on `image` directly
pub use image::RgbImage;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{BundleConfig, ImageClassifier, ModelBundle};
    pub use crate::decode::decode_rgb;
    pub use crate::device::DeviceSpec;
}
