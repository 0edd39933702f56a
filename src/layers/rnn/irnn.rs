// src/layers/rnn/irnn.rs
use crate::autograd::Tensor;
use crate::init::InitType;
use crate::layers::activation::ReLU;
use crate::layers::Linear;
use crate::module::Module;
use crate::ops::shape::index_axis;
use ndarray::ArrayD;
use rand::Rng;

/// Input-weight spread and recurrent diagonal of an IRNN (Le, Jaitly & Hinton 2015).
pub const IRNN_INPUT_STD: f32 = 0.001;
pub const IRNN_RECURRENT_SCALE: f32 = 1.0;

/// Simple recurrent layer of ReLU units with identity-initialised recurrence.
///
/// h_t = ReLU( x_t @ W_ih^T + b + h_{t-1} @ W_hh^T )
pub struct IRNN {
    hidden_size: usize,
    w_ih: Linear, // Input to Hidden (带 bias)
    w_hh: Linear, // Hidden to Hidden (无 bias)
    activation: ReLU,
}

impl IRNN {
    pub fn new<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        IRNN {
            hidden_size,
            w_ih: Linear::with_init(
                input_size,
                hidden_size,
                InitType::Normal {
                    std: IRNN_INPUT_STD,
                },
                rng,
            ),
            w_hh: Linear::new_no_bias(
                hidden_size,
                hidden_size,
                InitType::Identity {
                    scale: IRNN_RECURRENT_SCALE,
                },
                rng,
            ),
            activation: ReLU::new(),
        }
    }

    pub fn input_weight(&self) -> &Tensor {
        &self.w_ih.weight
    }

    pub fn recurrent_weight(&self) -> &Tensor {
        &self.w_hh.weight
    }

    pub fn forward_step(&self, input: &Tensor, h_prev: &Tensor) -> Tensor {
        let i_part = self.w_ih.forward(input.clone());
        let h_part = self.w_hh.forward(h_prev.clone());
        self.activation.forward(i_part + h_part)
    }

    /// 跑完整个序列 `[Batch, Time, Features]`，返回最后一个时间步的隐状态 `[Batch, Hidden]`
    pub fn forward_sequence(&self, input: &Tensor) -> Tensor {
        let shape = input.shape();
        assert_eq!(shape.len(), 3, "IRNN expects [Batch, Time, Features], got {:?}", shape);
        let (batch, steps) = (shape[0], shape[1]);

        let mut h = Tensor::from_data_no_grad(ArrayD::zeros(vec![batch, self.hidden_size]));
        for t in 0..steps {
            let x_t = index_axis(input, 1, t);
            h = self.forward_step(&x_t, &h);
        }
        h
    }
}

impl Module for IRNN {
    fn forward(&self, input: Tensor) -> Tensor {
        self.forward_sequence(&input)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.w_ih.parameters();
        params.extend(self.w_hh.parameters());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn initialisation_follows_irnn_recipe() {
        let mut rng = StdRng::seed_from_u64(1337);
        let rnn = IRNN::new(16, 8, &mut rng);

        assert_eq!(rnn.recurrent_weight().data(), Array2::<f32>::eye(8).into_dyn());
        let w_in = rnn.input_weight().data();
        assert_eq!(w_in.shape(), &[8, 16]);
        assert!(w_in.iter().all(|w| w.abs() < 0.01));
        assert_eq!(rnn.parameters().len(), 3);
    }

    #[test]
    fn zero_input_keeps_state_at_zero() {
        let mut rng = StdRng::seed_from_u64(0);
        let rnn = IRNN::new(4, 5, &mut rng);
        let x = Tensor::from_data_no_grad(Array3::<f32>::zeros((2, 7, 4)).into_dyn());
        let h = rnn.forward(x);
        assert_eq!(h.shape(), vec![2, 5]);
        assert!(h.data().iter().all(|&v| v == 0.0));
    }
}
