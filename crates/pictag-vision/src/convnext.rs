//! ConvNeXt and ConvNeXt V2 image classification network
//!
//! Weights are read under the Hugging Face checkpoint names
//! (`{convnext,convnextv2}.embeddings.*`, `...encoder.stages.N.*`,
//! `...layernorm.*`, `classifier.*`). Inference only: drop path is the identity.

use crate::config::{ConvNextConfig, Variant};
use candle_core::{DType, Module, Result, Tensor, D};
use candle_nn::{conv2d, layer_norm, linear, Conv2d, Conv2dConfig, LayerNorm, Linear, VarBuilder};

const BLOCK_LAYER_NORM_EPS: f64 = 1e-6;
const GRN_EPS: f64 = 1e-6;
const DEPTHWISE_KERNEL: usize = 7;
const DOWNSAMPLE_KERNEL: usize = 2;
const MLP_RATIO: usize = 4;

/// Layer norm over the channel axis of an NCHW tensor
#[derive(Debug, Clone)]
struct ChannelsFirstLayerNorm {
    inner: LayerNorm,
}

impl ChannelsFirstLayerNorm {
    fn load(dim: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            inner: layer_norm(dim, eps, vb)?,
        })
    }
}

impl Module for ChannelsFirstLayerNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        xs.permute((0, 2, 3, 1))?
            .contiguous()?
            .apply(&self.inner)?
            .permute((0, 3, 1, 2))
    }
}

/// Global response normalization over NHWC activations (V2 blocks)
#[derive(Debug, Clone)]
struct GlobalResponseNorm {
    gamma: Tensor,
    beta: Tensor,
}

impl GlobalResponseNorm {
    fn load(dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            gamma: vb.get((1, 1, 1, dim), "weight")?,
            beta: vb.get((1, 1, 1, dim), "bias")?,
        })
    }
}

impl Module for GlobalResponseNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let dtype = xs.dtype();
        let xs = xs.to_dtype(DType::F32)?;

        let spatial_norm = xs.sqr()?.sum_keepdim((1, 2))?.sqrt()?;
        let mean_norm = spatial_norm.mean_keepdim(D::Minus1)?.affine(1.0, GRN_EPS)?;
        let scale = spatial_norm.broadcast_div(&mean_norm)?;

        let gamma = self.gamma.to_dtype(DType::F32)?;
        let beta = self.beta.to_dtype(DType::F32)?;
        xs.broadcast_mul(&scale)?
            .broadcast_mul(&gamma)?
            .broadcast_add(&beta)?
            .add(&xs)?
            .to_dtype(dtype)
    }
}

#[derive(Debug, Clone)]
struct Block {
    dwconv: Conv2d,
    norm: LayerNorm,
    pwconv1: Linear,
    grn: Option<GlobalResponseNorm>,
    pwconv2: Linear,
    layer_scale: Option<Tensor>,
}

impl Block {
    fn load(dim: usize, config: &ConvNextConfig, vb: VarBuilder) -> Result<Self> {
        let dw_config = Conv2dConfig {
            padding: DEPTHWISE_KERNEL / 2,
            groups: dim,
            ..Default::default()
        };
        let hidden = MLP_RATIO * dim;

        let grn = match config.variant {
            Variant::V2 => Some(GlobalResponseNorm::load(hidden, vb.pp("grn"))?),
            Variant::V1 => None,
        };
        let layer_scale = match config.variant {
            Variant::V1 if config.layer_scale_init_value > 0.0 => {
                Some(vb.get(dim, "layer_scale_parameter")?)
            }
            _ => None,
        };

        Ok(Self {
            dwconv: conv2d(dim, dim, DEPTHWISE_KERNEL, dw_config, vb.pp("dwconv"))?,
            norm: layer_norm(dim, BLOCK_LAYER_NORM_EPS, vb.pp("layernorm"))?,
            pwconv1: linear(dim, hidden, vb.pp("pwconv1"))?,
            grn,
            pwconv2: linear(hidden, dim, vb.pp("pwconv2"))?,
            layer_scale,
        })
    }
}

impl Module for Block {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let residual = xs;
        let ys = xs.apply(&self.dwconv)?.permute((0, 2, 3, 1))?.contiguous()?;
        let ys = ys.apply(&self.norm)?.apply(&self.pwconv1)?.gelu_erf()?;
        let ys = match &self.grn {
            Some(grn) => ys.apply(grn)?,
            None => ys,
        };
        let ys = ys.apply(&self.pwconv2)?;
        let ys = match &self.layer_scale {
            Some(scale) => ys.broadcast_mul(scale)?,
            None => ys,
        };
        ys.permute((0, 3, 1, 2))?.add(residual)
    }
}

#[derive(Debug, Clone)]
struct Stage {
    downsample: Option<(ChannelsFirstLayerNorm, Conv2d)>,
    blocks: Vec<Block>,
}

impl Stage {
    fn load(
        in_dim: usize,
        out_dim: usize,
        stride: usize,
        depth: usize,
        config: &ConvNextConfig,
        vb: VarBuilder,
    ) -> Result<Self> {
        let downsample = if in_dim != out_dim || stride > 1 {
            let vb = vb.pp("downsampling_layer");
            let norm = ChannelsFirstLayerNorm::load(in_dim, BLOCK_LAYER_NORM_EPS, vb.pp(0))?;
            let conv_config = Conv2dConfig {
                stride,
                ..Default::default()
            };
            let conv = conv2d(in_dim, out_dim, DOWNSAMPLE_KERNEL, conv_config, vb.pp(1))?;
            Some((norm, conv))
        } else {
            None
        };

        let vb = vb.pp("layers");
        let blocks = (0..depth)
            .map(|i| Block::load(out_dim, config, vb.pp(i)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { downsample, blocks })
    }
}

impl Module for Stage {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = match &self.downsample {
            Some((norm, conv)) => xs.apply(norm)?.apply(conv)?,
            None => xs.clone(),
        };
        for block in &self.blocks {
            xs = xs.apply(block)?;
        }
        Ok(xs)
    }
}

/// ConvNeXt backbone with pooled layer norm and linear classification head
#[derive(Debug, Clone)]
pub struct ConvNext {
    patch_embed: Conv2d,
    stem_norm: ChannelsFirstLayerNorm,
    stages: Vec<Stage>,
    final_norm: LayerNorm,
    classifier: Linear,
}

impl ConvNext {
    /// Build the network from `vb`, which must be rooted at the checkpoint top level
    pub fn load(config: &ConvNextConfig, vb: VarBuilder) -> Result<Self> {
        let backbone = vb.pp(config.variant.weight_prefix());
        let first = config.hidden_sizes[0];
        let last = config.hidden_sizes[config.hidden_sizes.len() - 1];

        let embeddings = backbone.pp("embeddings");
        let patch_config = Conv2dConfig {
            stride: config.patch_size,
            ..Default::default()
        };
        let patch_embed = conv2d(
            config.num_channels,
            first,
            config.patch_size,
            patch_config,
            embeddings.pp("patch_embeddings"),
        )?;
        let stem_norm =
            ChannelsFirstLayerNorm::load(first, BLOCK_LAYER_NORM_EPS, embeddings.pp("layernorm"))?;

        let stages_vb = backbone.pp("encoder").pp("stages");
        let mut stages = Vec::with_capacity(config.depths.len());
        let mut in_dim = first;
        for (i, (&depth, &out_dim)) in config.depths.iter().zip(&config.hidden_sizes).enumerate() {
            let stride = if i == 0 { 1 } else { 2 };
            stages.push(Stage::load(in_dim, out_dim, stride, depth, config, stages_vb.pp(i))?);
            in_dim = out_dim;
        }

        let final_norm = layer_norm(last, config.layer_norm_eps, backbone.pp("layernorm"))?;
        let classifier = linear(last, config.num_labels(), vb.pp("classifier"))?;

        Ok(Self {
            patch_embed,
            stem_norm,
            stages,
            final_norm,
            classifier,
        })
    }
}

impl Module for ConvNext {
    /// `pixel_values` is `B×C×H×W`; returns logits `B×num_labels`
    fn forward(&self, pixel_values: &Tensor) -> Result<Tensor> {
        let mut xs = pixel_values.apply(&self.patch_embed)?.apply(&self.stem_norm)?;
        for stage in &self.stages {
            xs = xs.apply(stage)?;
        }
        xs.mean((2, 3))?
            .apply(&self.final_norm)?
            .apply(&self.classifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use candle_nn::VarMap;

    fn tiny_config(model_type: &str) -> ConvNextConfig {
        ConvNextConfig::from_json(&format!(
            r#"{{
                "model_type": "{}",
                "depths": [1, 1, 2, 1],
                "hidden_sizes": [4, 8, 8, 16],
                "id2label": {{"0": "cat", "1": "dog", "2": "bird"}}
            }}"#,
            model_type
        ))
        .unwrap()
    }

    #[test]
    fn test_forward_shape_with_zero_weights() {
        let config = tiny_config("convnextv2");
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = ConvNext::load(&config, vb).unwrap();

        let input = Tensor::ones((2, 3, 32, 32), DType::F32, &Device::Cpu).unwrap();
        let logits = model.forward(&input).unwrap();
        assert_eq!(logits.dims(), &[2, 3]);

        let probs = candle_nn::ops::softmax(&logits, D::Minus1).unwrap();
        let row = probs.get(0).unwrap().to_vec1::<f32>().unwrap();
        for p in row {
            assert!((p - 1.0 / 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_v2_weight_names() {
        let config = tiny_config("convnextv2");
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        ConvNext::load(&config, vb).unwrap();

        let data = varmap.data().lock().unwrap();
        for name in [
            "convnextv2.embeddings.patch_embeddings.weight",
            "convnextv2.embeddings.layernorm.weight",
            "convnextv2.encoder.stages.0.layers.0.dwconv.weight",
            "convnextv2.encoder.stages.0.layers.0.grn.weight",
            "convnextv2.encoder.stages.1.downsampling_layer.0.weight",
            "convnextv2.encoder.stages.1.downsampling_layer.1.weight",
            "convnextv2.encoder.stages.2.layers.1.pwconv2.bias",
            "convnextv2.layernorm.bias",
            "classifier.weight",
        ] {
            assert!(data.contains_key(name), "missing {}", name);
        }
        assert!(!data.contains_key("convnextv2.encoder.stages.0.downsampling_layer.0.weight"));
        assert!(!data.keys().any(|k| k.contains("layer_scale_parameter")));
        assert_eq!(data["classifier.weight"].as_tensor().dims(), &[3, 16]);
    }

    #[test]
    fn test_v1_uses_layer_scale() {
        let config = tiny_config("convnext");
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        ConvNext::load(&config, vb).unwrap();

        let data = varmap.data().lock().unwrap();
        assert!(data.contains_key("convnext.encoder.stages.3.layers.0.layer_scale_parameter"));
        assert!(!data.keys().any(|k| k.contains(".grn.")));
    }

    #[test]
    fn test_grn_identity_when_gamma_and_beta_are_zero() {
        let grn = GlobalResponseNorm {
            gamma: Tensor::zeros((1, 1, 1, 2), DType::F32, &Device::Cpu).unwrap(),
            beta: Tensor::zeros((1, 1, 1, 2), DType::F32, &Device::Cpu).unwrap(),
        };
        let xs = Tensor::new(&[[[[1f32, 2.], [3., 4.]]]], &Device::Cpu).unwrap();
        let ys = grn.forward(&xs).unwrap();
        assert_eq!(
            ys.flatten_all().unwrap().to_vec1::<f32>().unwrap(),
            vec![1., 2., 3., 4.]
        );
    }
}
