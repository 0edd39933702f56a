use crate::autograd::Tensor;
use crate::module::Module;
use ndarray::Zip;

// --- ReLU ---
pub struct ReLU;
impl ReLU {
    pub fn new() -> Self {
        ReLU
    }
}

impl Default for ReLU {
    fn default() -> Self {
        ReLU::new()
    }
}

impl Module for ReLU {
    fn forward(&self, input: Tensor) -> Tensor {
        // Forward: 并行计算 x.max(0.0)
        let data = Zip::from(&*input.data_ref()).par_map_collect(|&x| x.max(0.0));

        let input_clone = input.clone();
        Tensor::from_op(
            data,
            vec![input],
            Box::new(move |grad| {
                let input_d = input_clone.data_ref();
                let mut grad_input = grad.clone();

                // Backward: 原地把 x <= 0 处的梯度清零
                Zip::from(&mut grad_input)
                    .and(&*input_d)
                    .par_for_each(|g, &x| {
                        if x <= 0.0 {
                            *g = 0.0;
                        }
                    });
                drop(input_d);
                input_clone.add_grad(grad_input);
            }),
        )
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn relu_masks_negative_inputs_and_their_gradients() {
        let x = Tensor::parameter(arr1(&[-1.0f32, 0.0, 2.5]).into_dyn());
        let y = ReLU::new().forward(x.clone());
        assert_eq!(y.data(), arr1(&[0.0f32, 0.0, 2.5]).into_dyn());

        y.sum().backward();
        assert_eq!(x.grad().unwrap(), arr1(&[0.0f32, 0.0, 1.0]).into_dyn());
    }
}
