// src/ops/matmul.rs
use crate::autograd::Tensor;
use ndarray::linalg::general_mat_mul;
use ndarray::{Array2, Ix2};

// A[..., K] @ B^T, where B is [N(out), K(in)]
// output: [..., N]
pub fn matmul(a: &Tensor, b: &Tensor) -> Tensor {
    let a_shape = a.shape();
    let b_shape = b.shape();

    if b_shape.len() != 2 {
        panic!("MatMul RHS must be 2D, got {:?}", b_shape);
    }

    let k_dim_a = a_shape[a_shape.len() - 1];
    let n_dim = b_shape[0];
    let k_dim_b = b_shape[1];

    if k_dim_a != k_dim_b {
        panic!(
            "MatMul shape mismatch: a {:?} (K={}) vs b {:?} (K={})",
            a_shape, k_dim_a, b_shape, k_dim_b
        );
    }

    let m_dim = a_shape.iter().product::<usize>() / k_dim_a.max(1);

    let res_2d = {
        let ad = a.data_ref();
        let bd = b.data_ref();

        let b_2d = bd
            .view()
            .into_dimensionality::<Ix2>()
            .expect("rank checked above");
        let mut res = Array2::<f32>::zeros((m_dim, n_dim));

        // 尝试 View，失败则 Copy (处理非连续内存)
        match ad.view().into_shape((m_dim, k_dim_a)) {
            Ok(a_2d) => general_mat_mul(1.0, &a_2d, &b_2d.t(), 0.0, &mut res),
            Err(_) => {
                let a_2d = ad
                    .as_standard_layout()
                    .into_owned()
                    .into_shape((m_dim, k_dim_a))
                    .expect("element count checked above");
                general_mat_mul(1.0, &a_2d, &b_2d.t(), 0.0, &mut res);
            }
        }
        res
    };

    // 恢复输出形状: [..., N]
    let mut out_shape = a_shape.clone();
    let last_idx = out_shape.len() - 1;
    out_shape[last_idx] = n_dim;

    let result = res_2d
        .into_shape(out_shape)
        .expect("output element count is m * n")
        .into_dyn();

    let a_clone = a.clone();
    let b_clone = b.clone();

    Tensor::from_op(
        result,
        vec![a.clone(), b.clone()],
        Box::new(move |grad| {
            // grad: [..., N] -> [M,N]
            let grad_2d = grad
                .as_standard_layout()
                .into_owned()
                .into_shape((m_dim, n_dim))
                .expect("Grad reshape failed");

            // 先 clone 数据再 add_grad，避免 RefCell 借用冲突 (a 与 b 可能是同一个张量)
            let (a_data, b_data) = (a_clone.data(), b_clone.data());

            let a_2d = a_data
                .as_standard_layout()
                .into_owned()
                .into_shape((m_dim, k_dim_a))
                .expect("A reshape failed");
            let b_2d = b_data
                .into_dimensionality::<Ix2>()
                .expect("B must stay 2D");

            // dA = dY @ B  -> [M,K]
            let mut da_2d = Array2::<f32>::zeros((m_dim, k_dim_a));
            general_mat_mul(1.0, &grad_2d, &b_2d, 0.0, &mut da_2d);
            let da = da_2d
                .into_shape(a_shape.clone())
                .expect("dA reshape failed")
                .into_dyn();
            a_clone.add_grad(da);

            // dB = dY^T @ A -> [N,K]
            let mut db_2d = Array2::<f32>::zeros((n_dim, k_dim_a));
            general_mat_mul(1.0, &grad_2d.t(), &a_2d, 0.0, &mut db_2d);
            b_clone.add_grad(db_2d.into_dyn());
        }),
    )
}
