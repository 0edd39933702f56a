use crate::autograd::Tensor;
use ndarray::prelude::*;
use ndarray::Zip;

pub trait Optimizer {
    fn step(&mut self);
    fn zero_grad(&self) {
        for param in self.params() {
            param.zero_grad();
        }
    }
    fn params(&self) -> &[Tensor];
}

/// 把所有参数梯度的全局 L2 范数缩放到不超过 `max_norm`，返回缩放前的范数。
pub fn clip_grad_norm(params: &[Tensor], max_norm: f32) -> f32 {
    let total_sq: f32 = params
        .iter()
        .filter_map(|p| p.grad_ref().as_ref().map(|g| g.iter().map(|v| v * v).sum::<f32>()))
        .sum();
    let total_norm = total_sq.sqrt();

    if total_norm > max_norm && total_norm > 0.0 {
        let scale = max_norm / total_norm;
        for p in params {
            let mut inner = p.0.borrow_mut();
            if let Some(g) = inner.grad.as_mut() {
                g.mapv_inplace(|v| v * scale);
            }
        }
    }
    total_norm
}

/// RMSprop: cache = rho * cache + (1 - rho) * g^2;  w -= lr * g / (sqrt(cache) + eps)
pub struct RMSprop {
    params: Vec<Tensor>,
    lr: f32,
    rho: f32,
    eps: f32,
    // 状态
    square_avg: Vec<Option<ArrayD<f32>>>,
}

impl RMSprop {
    pub fn new(params: Vec<Tensor>, lr: f32) -> Self {
        let len = params.len();
        RMSprop {
            params,
            lr,
            rho: 0.9,
            eps: 1e-6,
            square_avg: vec![None; len],
        }
    }
}

impl Optimizer for RMSprop {
    fn params(&self) -> &[Tensor] {
        &self.params
    }

    fn step(&mut self) {
        let (lr, rho, eps) = (self.lr, self.rho, self.eps);

        for (i, param) in self.params.iter().enumerate() {
            let mut p_inner = param.0.borrow_mut();
            let p_inner = &mut *p_inner;

            let grad = match p_inner.grad.as_ref() {
                Some(g) => g,
                None => continue,
            };

            let cache = self.square_avg[i].get_or_insert_with(|| ArrayD::zeros(p_inner.data.shape()));

            Zip::from(p_inner.data.view_mut())
                .and(cache.view_mut())
                .and(grad.view())
                .for_each(|w, c, &g| {
                    *c = rho * (*c) + (1.0 - rho) * g * g;
                    *w -= lr * g / (c.sqrt() + eps);
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn first_rmsprop_step_moves_by_lr_over_sqrt_one_minus_rho() {
        let w = Tensor::parameter(arr1(&[1.0f32, -1.0]).into_dyn());
        w.add_grad(arr1(&[2.0f32, -2.0]).into_dyn());
        let mut opt = RMSprop::new(vec![w.clone()], 0.1);
        opt.step();

        // cache = 0.1 * 4 => step = 0.1 * 2 / sqrt(0.4)
        let expected = 0.1 * 2.0 / (0.4f32.sqrt() + 1e-6);
        let data = w.data();
        assert_relative_eq!(data[[0]], 1.0 - expected, epsilon = 1e-5);
        assert_relative_eq!(data[[1]], -1.0 + expected, epsilon = 1e-5);
    }

    #[test]
    fn clipping_rescales_to_max_norm() {
        let a = Tensor::parameter(arr1(&[0.0f32, 0.0]).into_dyn());
        let b = Tensor::parameter(arr1(&[0.0f32]).into_dyn());
        a.add_grad(arr1(&[3.0f32, 0.0]).into_dyn());
        b.add_grad(arr1(&[4.0f32]).into_dyn());

        let norm = clip_grad_norm(&[a.clone(), b.clone()], 1.0);
        assert_relative_eq!(norm, 5.0, epsilon = 1e-6);
        assert_relative_eq!(a.grad().unwrap()[[0]], 0.6, epsilon = 1e-6);
        assert_relative_eq!(b.grad().unwrap()[[0]], 0.8, epsilon = 1e-6);
    }
}
