// src/ops/arithmetic.rs
use crate::autograd::Tensor;
use ndarray::{ArrayD, ArrayViewD, Axis};
use std::ops::Add;

/// 把广播后的梯度还原到 target_shape（对被广播的轴求和）
fn reduce_gradient(grad: ArrayViewD<'_, f32>, target_shape: &[usize]) -> ArrayD<f32> {
    if grad.shape() == target_shape {
        return grad.to_owned();
    }

    let mut res = grad.to_owned();
    let g_ndim = res.ndim();
    let t_ndim = target_shape.len();

    // 多出来的前导轴全部求和
    if g_ndim > t_ndim {
        for _ in 0..(g_ndim - t_ndim) {
            res = res.sum_axis(Axis(0));
        }
    }

    for i in 0..res.ndim() {
        if target_shape[i] == 1 && res.shape()[i] > 1 {
            let summed = res.sum_axis(Axis(i));
            res = summed.insert_axis(Axis(i));
        } else if target_shape[i] != res.shape()[i] {
            panic!(
                "Gradient shape mismatch. Grad: {:?}, Target: {:?}",
                grad.shape(),
                target_shape
            );
        }
    }

    res
}

impl Add for Tensor {
    type Output = Tensor;
    fn add(self, rhs: Tensor) -> Tensor {
        let data = &*self.data_ref() + &*rhs.data_ref();

        let lhs_c = self.clone();
        let rhs_c = rhs.clone();

        Tensor::from_op(
            data,
            vec![self, rhs],
            Box::new(move |grad| {
                let l_shape = lhs_c.shape();
                let r_shape = rhs_c.shape();
                lhs_c.add_grad(reduce_gradient(grad.view(), &l_shape));
                rhs_c.add_grad(reduce_gradient(grad.view(), &r_shape));
            }),
        )
    }
}

impl<'a, 'b> Add<&'b Tensor> for &'a Tensor {
    type Output = Tensor;
    fn add(self, rhs: &'b Tensor) -> Tensor {
        self.clone() + rhs.clone()
    }
}

pub fn sum(input: &Tensor) -> Tensor {
    let sum_val = input.data_ref().sum();

    // 结果是一个 0 维标量 Tensor
    let result = ndarray::arr0(sum_val).into_dyn();
    let input_clone = input.clone();

    Tensor::from_op(
        result,
        vec![input.clone()],
        Box::new(move |grad| {
            let g = grad.first().copied().unwrap_or(0.0);
            // dL/dx = dL/dSum * 1，广播回输入形状
            let grad_input = ArrayD::from_elem(input_clone.shape(), g);
            input_clone.add_grad(grad_input);
        }),
    )
}
