// src/ops/shape.rs
use crate::autograd::Tensor;
use ndarray::{ArrayD, Axis};

/// Picks slice `index` along `axis`, dropping that axis.
///
/// Used to walk a `[Batch, Time, Features]` sequence one step at a time.
pub fn index_axis(input: &Tensor, axis: usize, index: usize) -> Tensor {
    let full_shape = input.shape();
    let picked = input.data_ref().index_axis(Axis(axis), index).to_owned();

    let input_clone = input.clone();
    Tensor::from_op(
        picked,
        vec![input.clone()],
        Box::new(move |grad| {
            let mut full_grad = ArrayD::<f32>::zeros(full_shape.clone());
            full_grad.index_axis_mut(Axis(axis), index).assign(grad);
            input_clone.add_grad(full_grad);
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array3};

    #[test]
    fn gradient_lands_on_selected_step_only() {
        let seq = Tensor::parameter(Array3::<f32>::ones((2, 3, 2)).into_dyn());
        let step = index_axis(&seq, 1, 1);
        assert_eq!(step.shape(), vec![2, 2]);

        step.sum().backward();
        let grad = seq.grad().unwrap();
        assert_eq!(grad.index_axis(Axis(1), 1), arr2(&[[1.0f32, 1.0], [1.0, 1.0]]).into_dyn());
        assert_eq!(grad.index_axis(Axis(1), 0).sum(), 0.0);
        assert_eq!(grad.index_axis(Axis(1), 2).sum(), 0.0);
    }
}
