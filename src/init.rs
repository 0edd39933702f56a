use crate::autograd::Tensor;
use ndarray::{Array, Array2, ArrayD, IxDyn};
use rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand::Rng;

pub enum InitType {
    XavierUniform,           // Dense 默认 (Glorot)
    Normal { std: f32 },     // IRNN 输入权重
    Identity { scale: f32 }, // IRNN 循环权重，必须是方阵
    Zeros,                   // For Bias
}

/// 按 `init_type` 生成一个参数张量。随机数全部来自调用方传入的 rng。
///
/// `shape` 为 `[out, in]`（与 Linear 的权重布局一致）或 `[out]`。
pub fn tensor_init<R: Rng + ?Sized>(shape: Vec<usize>, init_type: InitType, rng: &mut R) -> Tensor {
    let shape_dyn = IxDyn(shape.as_slice());

    let data: ArrayD<f32> = match init_type {
        InitType::Zeros => ArrayD::zeros(shape_dyn),

        InitType::XavierUniform => {
            let fan_out = shape[0] as f32;
            let fan_in = if shape.len() > 1 { shape[1] } else { shape[0] } as f32;
            let limit = (6.0 / (fan_in + fan_out)).sqrt();
            Array::random_using(shape_dyn, Uniform::new(-limit, limit), rng)
        }

        InitType::Normal { std } => {
            let dist = Normal::new(0.0f32, std).unwrap_or_else(|_| {
                panic!("normal init needs a finite, non-negative std, got {}", std)
            });
            Array::random_using(shape_dyn, dist, rng)
        }

        InitType::Identity { scale } => {
            assert!(
                shape.len() == 2 && shape[0] == shape[1],
                "identity init needs a square matrix, got {:?}",
                shape
            );
            (Array2::<f32>::eye(shape[0]) * scale).into_dyn()
        }
    };

    Tensor::parameter(data)
}
