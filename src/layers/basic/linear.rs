// src/layers/basic/linear.rs
use crate::autograd::Tensor;
use crate::init::{tensor_init, InitType};
use crate::module::Module;
use crate::ops::matmul::matmul;
use rand::Rng;

pub struct Linear {
    pub weight: Tensor,       // shape: [out_features, in_features]
    pub bias: Option<Tensor>, // shape: [out_features]
}

impl Linear {
    /// Glorot-uniform 权重 + 零偏置
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        Linear::with_init(in_features, out_features, InitType::XavierUniform, rng)
    }

    pub fn with_init<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        init: InitType,
        rng: &mut R,
    ) -> Self {
        let weight = tensor_init(vec![out_features, in_features], init, rng);
        let bias = tensor_init(vec![out_features], InitType::Zeros, rng);

        Linear {
            weight,
            bias: Some(bias),
        }
    }

    pub fn new_no_bias<R: Rng + ?Sized>(
        in_features: usize,
        out_features: usize,
        init: InitType,
        rng: &mut R,
    ) -> Self {
        let weight = tensor_init(vec![out_features, in_features], init, rng);
        Linear { weight, bias: None }
    }
}

impl Module for Linear {
    fn forward(&self, input: Tensor) -> Tensor {
        let y = matmul(&input, &self.weight);

        if let Some(bias) = &self.bias {
            y + bias.clone() // bias: [out]
        } else {
            y
        }
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = vec![self.weight.clone()];
        if let Some(b) = &self.bias {
            params.push(b.clone());
        }
        params
    }
}
