// src/models/autoencoder.rs
use crate::autograd::Tensor;
use crate::encoder::Encoder;
use crate::error::{BoxError, GlanceError, Result};
use crate::layers::{Linear, ReLU};
use crate::module::{Module, Sequential};
use ndarray::{Array1, Array2, ArrayView1, Ix1, Ix2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Architecture description persisted next to the weight blob.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AutoEncoderSpec {
    /// Flattened patch length (window_size^2).
    pub input_dim: usize,
    /// Widths of the ReLU layers; the last one is the code (bottleneck).
    pub hidden_layers: Vec<usize>,
}

impl AutoEncoderSpec {
    pub fn new(input_dim: usize, hidden_layers: Vec<usize>) -> Self {
        AutoEncoderSpec {
            input_dim,
            hidden_layers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(GlanceError::invalid("autoencoder input_dim must be positive"));
        }
        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            return Err(GlanceError::invalid(format!(
                "autoencoder hidden layers must be non-empty and positive, got {:?}",
                self.hidden_layers
            )));
        }
        Ok(())
    }

    pub fn code_dim(&self) -> usize {
        self.hidden_layers.last().copied().unwrap_or(self.input_dim)
    }
}

/// Which activations of the autoencoder are used as glance features.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureMode {
    /// Full reconstruction (output layer).
    #[default]
    Reconstruction,
    /// Code layer (last hidden ReLU layer).
    Bottleneck,
}

/// Dense autoencoder: ReLU hidden layers, linear reconstruction.
pub struct AutoEncoder {
    spec: AutoEncoderSpec,
    encoder: Sequential,
    decoder: Linear,
}

impl AutoEncoder {
    pub fn new<R: Rng + ?Sized>(spec: AutoEncoderSpec, rng: &mut R) -> Result<Self> {
        spec.validate()?;

        let mut layers: Vec<Box<dyn Module>> = Vec::new();
        let mut width = spec.input_dim;
        for &h in &spec.hidden_layers {
            layers.push(Box::new(Linear::new(width, h, rng)));
            layers.push(Box::new(ReLU::new()));
            width = h;
        }
        let decoder = Linear::new(width, spec.input_dim, rng);

        Ok(AutoEncoder {
            spec,
            encoder: Sequential::new(layers),
            decoder,
        })
    }

    pub fn spec(&self) -> &AutoEncoderSpec {
        &self.spec
    }

    /// Code layer activations `[Batch, code_dim]`.
    pub fn encode(&self, input: Tensor) -> Tensor {
        self.encoder.forward(input)
    }

    /// Inference-only copy of the current weights, shareable across threads.
    pub fn freeze(&self, mode: FeatureMode) -> Result<FrozenAutoEncoder> {
        let params = self.parameters();
        let layers = params
            .chunks(2)
            .map(|pair| -> Result<(Array2<f32>, Array1<f32>)> {
                match pair {
                    [w, b] => {
                        let weight = w
                            .data()
                            .into_dimensionality::<Ix2>()
                            .map_err(|e| GlanceError::Checkpoint(e.to_string()))?;
                        let bias = b
                            .data()
                            .into_dimensionality::<Ix1>()
                            .map_err(|e| GlanceError::Checkpoint(e.to_string()))?;
                        Ok((weight, bias))
                    }
                    _ => Err(GlanceError::Checkpoint(
                        "dense layer without bias".to_string(),
                    )),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(FrozenAutoEncoder {
            spec: self.spec.clone(),
            layers,
            mode,
        })
    }
}

impl Module for AutoEncoder {
    fn forward(&self, input: Tensor) -> Tensor {
        let code = self.encoder.forward(input);
        self.decoder.forward(code)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.encoder.parameters();
        params.extend(self.decoder.parameters());
        params
    }
}

/// Plain-`ndarray` snapshot of a trained [`AutoEncoder`].
pub struct FrozenAutoEncoder {
    spec: AutoEncoderSpec,
    layers: Vec<(Array2<f32>, Array1<f32>)>, // (weight [out, in], bias [out])
    mode: FeatureMode,
}

impl FrozenAutoEncoder {
    fn run(&self, input: ArrayView1<'_, f32>) -> Array1<f32> {
        let hidden = self.spec.hidden_layers.len();
        let stop = match self.mode {
            FeatureMode::Reconstruction => self.layers.len(),
            FeatureMode::Bottleneck => hidden,
        };

        let mut x = input.to_owned();
        for (i, (w, b)) in self.layers.iter().take(stop).enumerate() {
            x = w.dot(&x) + b;
            if i < hidden {
                x.mapv_inplace(|v| v.max(0.0));
            }
        }
        x
    }
}

impl Encoder for FrozenAutoEncoder {
    fn predict(&self, input: ArrayView1<'_, f32>) -> std::result::Result<Array1<f32>, BoxError> {
        if input.len() != self.spec.input_dim {
            return Err(format!(
                "autoencoder expects {} values, got {}",
                self.spec.input_dim,
                input.len()
            )
            .into());
        }
        Ok(self.run(input))
    }

    fn input_dim(&self) -> Option<usize> {
        Some(self.spec.input_dim)
    }

    fn output_dim(&self) -> Option<usize> {
        Some(match self.mode {
            FeatureMode::Reconstruction => self.spec.input_dim,
            FeatureMode::Bottleneck => self.spec.code_dim(),
        })
    }
}
