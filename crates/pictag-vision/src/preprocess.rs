//! Image preprocessing: resize, crop, rescale, normalize, channels-first
//!
//! Mirrors the ConvNeXt image processor contract described by a Hugging Face
//! `preprocessor_config.json`.

use candle_core::{DType, Device, Tensor};
use image::imageops::{self, FilterType};
use image::RgbImage;
use pictag_core::{Error, Result};
use serde::Deserialize;
use std::path::Path;

// ImageNet normalization constants
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Below this shortest edge the processor resizes then center-crops; at or above it warps
const CROP_BELOW_EDGE: u32 = 384;

/// Target size as written in `preprocessor_config.json`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SizeSpec {
    #[serde(default)]
    pub shortest_edge: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

/// Subset of `preprocessor_config.json` used by ConvNeXt processors
#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessorConfig {
    #[serde(default = "default_true")]
    pub do_resize: bool,

    #[serde(default = "default_size")]
    pub size: SizeSpec,

    /// Fraction of the resized image kept by the center crop
    #[serde(default)]
    pub crop_pct: Option<f64>,

    /// PIL resampling code
    #[serde(default = "default_resample")]
    pub resample: u8,

    #[serde(default = "default_true")]
    pub do_rescale: bool,

    #[serde(default = "default_rescale_factor")]
    pub rescale_factor: f32,

    #[serde(default = "default_true")]
    pub do_normalize: bool,

    #[serde(default = "default_mean")]
    pub image_mean: [f32; 3],

    #[serde(default = "default_std")]
    pub image_std: [f32; 3],
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: default_size(),
            crop_pct: None,
            resample: default_resample(),
            do_rescale: true,
            rescale_factor: default_rescale_factor(),
            do_normalize: true,
            image_mean: IMAGENET_MEAN,
            image_std: IMAGENET_STD,
        }
    }
}

impl PreprocessorConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse preprocessor config: {}", e)))
    }
}

/// How the image is brought to the network's input size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResizePlan {
    /// Keep the image as decoded
    None,
    /// Resize the shortest edge to `resize_to`, then center-crop `crop`×`crop`
    ShortestEdgeThenCrop { resize_to: u32, crop: u32 },
    /// Resize to exactly `width`×`height`, ignoring aspect ratio
    Exact { width: u32, height: u32 },
}

/// Transforms decoded RGB images into model-ready tensors
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: PreprocessorConfig,
    plan: ResizePlan,
    filter: FilterType,
}

impl ImageProcessor {
    pub fn new(config: PreprocessorConfig) -> Result<Self> {
        if config.image_std.iter().any(|s| *s == 0.0) {
            return Err(Error::config("image_std must not contain zeros"));
        }
        let plan = resize_plan(&config)?;
        let filter = filter_for(config.resample);
        Ok(Self {
            config,
            plan,
            filter,
        })
    }

    /// Resize and crop to the network input size
    pub fn prepare(&self, image: &RgbImage) -> RgbImage {
        match self.plan {
            ResizePlan::None => image.clone(),
            ResizePlan::Exact { width, height } => {
                imageops::resize(image, width, height, self.filter)
            }
            ResizePlan::ShortestEdgeThenCrop { resize_to, crop } => {
                let (left, top, side) =
                    crop_window(image.width(), image.height(), resize_to, crop);
                let window = imageops::crop_imm(image, left, top, side, side).to_image();
                imageops::resize(&window, crop, crop, self.filter)
            }
        }
    }

    /// Rescale and normalize into a planar `[R..., G..., B...]` buffer
    pub fn to_planar(&self, image: &RgbImage) -> Vec<f32> {
        let hw = (image.width() * image.height()) as usize;
        let scale = if self.config.do_rescale {
            self.config.rescale_factor
        } else {
            1.0
        };
        let (mean, std) = if self.config.do_normalize {
            (self.config.image_mean, self.config.image_std)
        } else {
            ([0.0; 3], [1.0; 3])
        };

        let mut data = vec![0f32; 3 * hw];
        for (i, pixel) in image.pixels().enumerate() {
            for c in 0..3 {
                data[c * hw + i] = (pixel.0[c] as f32 * scale - mean[c]) / std[c];
            }
        }
        data
    }

    /// Full pipeline to a `1×3×H×W` tensor on `device` in `dtype`
    pub fn preprocess(&self, image: &RgbImage, device: &Device, dtype: DType) -> Result<Tensor> {
        let prepared = self.prepare(image);
        let (width, height) = prepared.dimensions();
        let data = self.to_planar(&prepared);

        Tensor::from_vec(data, (1, 3, height as usize, width as usize), &Device::Cpu)
            .and_then(|t| t.to_device(device))
            .and_then(|t| t.to_dtype(dtype))
            .map_err(|e| Error::inference(format!("Failed to build input tensor: {}", e)))
    }
}

fn resize_plan(config: &PreprocessorConfig) -> Result<ResizePlan> {
    if !config.do_resize {
        return Ok(ResizePlan::None);
    }

    match &config.size {
        SizeSpec {
            shortest_edge: Some(edge),
            ..
        } => {
            let edge = *edge;
            if edge == 0 {
                return Err(Error::config("size.shortest_edge must be positive"));
            }
            if edge < CROP_BELOW_EDGE {
                let crop_pct = config.crop_pct.unwrap_or(224.0 / 256.0);
                if !(crop_pct > 0.0 && crop_pct <= 1.0) {
                    return Err(Error::config(format!("crop_pct {} out of range", crop_pct)));
                }
                Ok(ResizePlan::ShortestEdgeThenCrop {
                    resize_to: (edge as f64 / crop_pct) as u32,
                    crop: edge,
                })
            } else {
                Ok(ResizePlan::Exact {
                    width: edge,
                    height: edge,
                })
            }
        }
        SizeSpec {
            height: Some(height),
            width: Some(width),
            ..
        } if *height > 0 && *width > 0 => Ok(ResizePlan::Exact {
            width: *width,
            height: *height,
        }),
        other => Err(Error::config(format!("Unsupported size spec: {:?}", other))),
    }
}

/// Source region that lands in the `crop`×`crop` center window after the
/// shortest edge is resized to `resize_to`, as `(left, top, side)`.
///
/// The window is square and never exceeds the source's shortest edge.
fn crop_window(width: u32, height: u32, resize_to: u32, crop: u32) -> (u32, u32, u32) {
    let short = width.min(height);
    let side = (crop as f64 * short as f64 / resize_to as f64).round() as u32;
    let side = side.clamp(1, short.max(1));
    let left = width.saturating_sub(side) / 2;
    let top = height.saturating_sub(side) / 2;
    (left, top, side)
}

fn filter_for(resample: u8) -> FilterType {
    match resample {
        0 => FilterType::Nearest,
        1 => FilterType::Lanczos3,
        3 => FilterType::CatmullRom,
        _ => FilterType::Triangle,
    }
}

fn default_true() -> bool {
    true
}

fn default_size() -> SizeSpec {
    SizeSpec {
        shortest_edge: Some(384),
        ..Default::default()
    }
}

fn default_resample() -> u8 {
    2
}

fn default_rescale_factor() -> f32 {
    1.0 / 255.0
}

fn default_mean() -> [f32; 3] {
    IMAGENET_MEAN
}

fn default_std() -> [f32; 3] {
    IMAGENET_STD
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn convnext_224() -> PreprocessorConfig {
        serde_json::from_str(
            r#"{
                "crop_pct": 0.875,
                "do_normalize": true,
                "do_rescale": true,
                "do_resize": true,
                "image_mean": [0.485, 0.456, 0.406],
                "image_processor_type": "ConvNextImageProcessor",
                "image_std": [0.229, 0.224, 0.225],
                "resample": 3,
                "rescale_factor": 0.00392156862745098,
                "size": {"shortest_edge": 224}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resize_then_crop() {
        let processor = ImageProcessor::new(convnext_224()).unwrap();
        assert_eq!(
            processor.plan,
            ResizePlan::ShortestEdgeThenCrop {
                resize_to: 256,
                crop: 224
            }
        );

        let wide = RgbImage::new(640, 480);
        assert_eq!(processor.prepare(&wide).dimensions(), (224, 224));

        let tall = RgbImage::new(30, 100);
        assert_eq!(processor.prepare(&tall).dimensions(), (224, 224));
    }

    #[test]
    fn test_crop_window() {
        assert_eq!(crop_window(640, 480, 256, 224), (110, 30, 420));
        assert_eq!(crop_window(480, 640, 256, 224), (30, 110, 420));
        assert_eq!(crop_window(256, 256, 256, 224), (16, 16, 224));
        assert_eq!(crop_window(1, 100_000, 256, 224), (0, 49_999, 1));
    }

    #[test]
    fn test_extreme_aspect_ratio_stays_bounded() {
        let processor = ImageProcessor::new(convnext_224()).unwrap();

        let sliver = RgbImage::from_pixel(1, 100_000, Rgb([10, 200, 30]));
        let prepared = processor.prepare(&sliver);
        assert_eq!(prepared.dimensions(), (224, 224));
        assert_eq!(prepared.get_pixel(112, 112), &Rgb([10, 200, 30]));

        let strip = RgbImage::new(100_000, 1);
        assert_eq!(processor.prepare(&strip).dimensions(), (224, 224));
    }

    #[test]
    fn test_large_edge_warps() {
        let processor = ImageProcessor::new(PreprocessorConfig::default()).unwrap();
        assert_eq!(
            processor.plan,
            ResizePlan::Exact {
                width: 384,
                height: 384
            }
        );
        assert_eq!(processor.prepare(&RgbImage::new(50, 20)).dimensions(), (384, 384));
    }

    #[test]
    fn test_height_width_size() {
        let mut config = convnext_224();
        config.size = SizeSpec {
            shortest_edge: None,
            height: Some(32),
            width: Some(48),
        };
        let processor = ImageProcessor::new(config).unwrap();
        assert_eq!(processor.prepare(&RgbImage::new(10, 10)).dimensions(), (48, 32));
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut config = convnext_224();
        config.crop_pct = Some(0.0);
        assert!(ImageProcessor::new(config).is_err());

        let mut config = convnext_224();
        config.size = SizeSpec::default();
        assert!(ImageProcessor::new(config).is_err());

        let mut config = convnext_224();
        config.image_std = [0.0, 1.0, 1.0];
        assert!(ImageProcessor::new(config).is_err());
    }

    #[test]
    fn test_normalization_is_planar() {
        let processor = ImageProcessor::new(convnext_224()).unwrap();
        let image = RgbImage::from_pixel(2, 1, Rgb([255, 0, 0]));
        let data = processor.to_planar(&image);

        assert_eq!(data.len(), 6);
        let red = (1.0 - 0.485) / 0.229;
        let green = (0.0 - 0.456) / 0.224;
        assert!((data[0] - red).abs() < 1e-4);
        assert!((data[1] - red).abs() < 1e-4);
        assert!((data[2] - green).abs() < 1e-4);
    }

    #[test]
    fn test_preprocess_tensor_shape() {
        let processor = ImageProcessor::new(convnext_224()).unwrap();
        let tensor = processor
            .preprocess(&RgbImage::new(300, 200), &Device::Cpu, DType::F32)
            .unwrap();
        assert_eq!(tensor.dims(), &[1, 3, 224, 224]);
        assert_eq!(tensor.dtype(), DType::F32);
    }
}
