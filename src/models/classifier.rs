// src/models/classifier.rs
use crate::autograd::Tensor;
use crate::layers::{Linear, IRNN};
use crate::module::Module;
use rand::Rng;

/// IRNN over a glance sequence, then a dense layer to class logits.
///
/// Input `[Batch, Time, Features]`, output logits `[Batch, Classes]`.
/// Softmax is folded into `CrossEntropyLoss`.
pub struct GlanceClassifier {
    rnn: IRNN,
    head: Linear,
}

impl GlanceClassifier {
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        hidden_units: usize,
        nb_classes: usize,
        rng: &mut R,
    ) -> Self {
        GlanceClassifier {
            rnn: IRNN::new(input_size, hidden_units, rng),
            head: Linear::new(hidden_units, nb_classes, rng),
        }
    }
}

impl Module for GlanceClassifier {
    fn forward(&self, input: Tensor) -> Tensor {
        let h_last = self.rnn.forward_sequence(&input);
        self.head.forward(h_last)
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = self.rnn.parameters();
        params.extend(self.head.parameters());
        params
    }
}
