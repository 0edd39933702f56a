use crate::autograd::Tensor;
use ndarray::{arr0, Array2, ArrayView2, Axis, Ix2, Zip};
use rayon::prelude::*; // 引入并行迭代

// --- MSE Loss ---
pub struct MSELoss;
impl MSELoss {
    pub fn apply(output: &Tensor, target: &Tensor) -> Tensor {
        let loss_val = {
            let out_ref = output.data_ref();
            let tar_ref = target.data_ref();
            assert_eq!(
                out_ref.shape(),
                tar_ref.shape(),
                "MSELoss: output and target shapes differ"
            );
            // 直接 reduce，避免创建 diff 中间量
            let n = out_ref.len().max(1) as f32;
            let sum_sq: f32 = Zip::from(&*out_ref)
                .and(&*tar_ref)
                .par_map_collect(|&o, &t| (o - t).powi(2))
                .sum();
            sum_sq / n
        };

        let output_clone = output.clone();
        let target_clone = target.clone();

        Tensor::from_op(
            arr0(loss_val).into_dyn(),
            vec![output.clone(), target.clone()],
            Box::new(move |grad_output| {
                let grad_val = grad_output.first().copied().unwrap_or(0.0);
                let grad = {
                    let out_d = output_clone.data_ref();
                    let tar_d = target_clone.data_ref();
                    let factor = 2.0 / out_d.len().max(1) as f32 * grad_val;
                    // dL/dx = 2/N * (x - y) * g
                    Zip::from(&*out_d)
                        .and(&*tar_d)
                        .par_map_collect(|&o, &t| (o - t) * factor)
                };

                if target_clone.requires_grad() {
                    target_clone.add_grad(grad.mapv(|x| -x));
                }
                output_clone.add_grad(grad);
            }),
        )
    }
}

/// Row-wise softmax of `[Batch, Classes]` logits.
pub fn softmax_rows(logits: ArrayView2<'_, f32>) -> Array2<f32> {
    let mut out = logits.to_owned();
    out.axis_iter_mut(Axis(0))
        .into_par_iter()
        .for_each(|mut row| {
            let max_val = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
            row.mapv_inplace(|v| (v - max_val).exp());
            let sum_exp = row.sum();
            row.mapv_inplace(|v| v / sum_exp);
        });
    out
}

// --- Cross Entropy Loss ---
// 输入是 logits，softmax 在内部完成；target 为 one-hot
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    pub fn apply(input_logits: &Tensor, target_onehot: &Tensor) -> Tensor {
        let (loss_val, softmax_cache) = {
            let logits_ref = input_logits.data_ref();
            let targets_ref = target_onehot.data_ref();

            let logits_2d = logits_ref
                .view()
                .into_dimensionality::<Ix2>()
                .expect("CrossEntropyLoss expects [Batch, Classes] logits");
            let targets_2d = targets_ref
                .view()
                .into_dimensionality::<Ix2>()
                .expect("CrossEntropyLoss expects [Batch, Classes] targets");
            let batch_size = logits_2d.nrows().max(1);

            let probs = softmax_rows(logits_2d);
            let epsilon = 1e-9;

            // Loss: -t * log(p)，按行并行
            let total_loss: f32 = Zip::from(probs.rows())
                .and(targets_2d.rows())
                .into_par_iter()
                .map(|(p_row, t_row)| {
                    p_row
                        .iter()
                        .zip(t_row.iter())
                        .filter(|&(_, &t)| t > 0.0) // target 通常是 sparse 的 (One-hot)
                        .map(|(&p, &t)| -t * (p + epsilon).ln())
                        .sum::<f32>()
                })
                .sum();

            (total_loss / batch_size as f32, probs.into_dyn())
        };

        let input_clone = input_logits.clone();
        let target_clone = target_onehot.clone();

        Tensor::from_op(
            arr0(loss_val).into_dyn(),
            vec![input_logits.clone(), target_onehot.clone()],
            Box::new(move |grad_output| {
                let grad_val = grad_output.first().copied().unwrap_or(0.0);
                let grad = {
                    let targets_ref = target_clone.data_ref();
                    let batch_size = targets_ref.shape()[0].max(1) as f32;
                    let factor = grad_val / batch_size;

                    // Backward: (Prob - Target) / N * grad
                    Zip::from(&softmax_cache)
                        .and(&*targets_ref)
                        .par_map_collect(|&p, &t| (p - t) * factor)
                };
                input_clone.add_grad(grad);
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn softmax_rows_sum_to_one() {
        let p = softmax_rows(arr2(&[[1.0f32, 2.0, 3.0], [-5.0, 0.0, 5.0]]).view());
        for row in p.outer_iter() {
            assert_relative_eq!(row.sum(), 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn uniform_logits_give_log_classes() {
        let logits = Tensor::parameter(Array2::<f32>::zeros((2, 4)).into_dyn());
        let target = Tensor::from_data_no_grad(arr2(&[[1.0f32, 0., 0., 0.], [0., 0., 1., 0.]]).into_dyn());
        let loss = CrossEntropyLoss::apply(&logits, &target);
        assert_relative_eq!(loss.data().sum(), 4.0f32.ln(), epsilon = 1e-5);

        loss.backward();
        let g = logits.grad().unwrap();
        // (0.25 - 1) / 2 on the target column, 0.25 / 2 elsewhere
        assert_relative_eq!(g[[0, 0]], -0.375, epsilon = 1e-6);
        assert_relative_eq!(g[[0, 1]], 0.125, epsilon = 1e-6);
    }

    #[test]
    fn mse_gradient_points_towards_target() {
        let out = Tensor::parameter(arr2(&[[1.0f32, 3.0]]).into_dyn());
        let target = Tensor::from_data_no_grad(arr2(&[[0.0f32, 3.0]]).into_dyn());
        let loss = MSELoss::apply(&out, &target);
        assert_relative_eq!(loss.data().sum(), 0.5, epsilon = 1e-6);

        loss.backward();
        let g = out.grad().unwrap();
        assert_relative_eq!(g[[0, 0]], 1.0, epsilon = 1e-6);
        assert_relative_eq!(g[[0, 1]], 0.0, epsilon = 1e-6);
    }
}
