// src/autograd.rs
use ndarray::prelude::*;
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::rc::Rc;

// 计算图本身是 Rc，不跨线程，所以 no_grad 深度按线程记录
thread_local! {
    static NO_GRAD_DEPTH: Cell<usize> = Cell::new(0);
}

pub struct NoGradGuard {
    _priv: (),
}

impl NoGradGuard {
    pub fn enter() -> Self {
        NO_GRAD_DEPTH.with(|d| d.set(d.get() + 1));
        Self { _priv: () }
    }
}

impl Drop for NoGradGuard {
    fn drop(&mut self) {
        NO_GRAD_DEPTH.with(|d| d.set(d.get() - 1));
    }
}

/// 在 NoGradGuard 作用域内为 true
#[inline]
pub fn is_no_grad() -> bool {
    NO_GRAD_DEPTH.with(|d| d.get() > 0)
}

/// 便利封装：no_grad(|| { ... })
pub fn no_grad<R>(f: impl FnOnce() -> R) -> R {
    let _g = NoGradGuard::enter();
    f()
}

pub type BackwardOp = Box<dyn Fn(&ArrayD<f32>)>;

pub struct TensorData {
    pub data: ArrayD<f32>,
    pub grad: Option<ArrayD<f32>>,
    pub parents: Vec<Tensor>,
    pub backward_op: Option<BackwardOp>,
    pub requires_grad: bool,
}

#[derive(Clone)]
pub struct Tensor(pub(crate) Rc<RefCell<TensorData>>);

impl Tensor {
    /// 创建叶子张量（显式指定 requires_grad）
    pub fn from_data_with_grad_flag(data: ArrayD<f32>, requires_grad: bool) -> Tensor {
        Tensor(Rc::new(RefCell::new(TensorData {
            data,
            grad: None,
            parents: vec![],
            backward_op: None,
            requires_grad,
        })))
    }

    /// 推理/常量：不需要梯度（输入批次、标签）
    pub fn from_data_no_grad(data: ArrayD<f32>) -> Tensor {
        Tensor::from_data_with_grad_flag(data, false)
    }

    /// 训练参数：需要梯度（叶子）
    pub fn parameter(data: ArrayD<f32>) -> Tensor {
        Tensor::from_data_with_grad_flag(data, true)
    }

    /// Builds the output node of an op.
    ///
    /// Inside `no_grad`, or when no parent tracks gradients, the result is a
    /// plain constant and `backward` is dropped without being recorded.
    pub fn from_op(data: ArrayD<f32>, parents: Vec<Tensor>, backward: BackwardOp) -> Tensor {
        let build_graph = !is_no_grad() && parents.iter().any(|p| p.requires_grad());
        if !build_graph {
            return Tensor::from_data_no_grad(data);
        }
        Tensor(Rc::new(RefCell::new(TensorData {
            data,
            grad: None,
            parents,
            backward_op: Some(backward),
            requires_grad: true,
        })))
    }

    /// 获取数据的只读引用（零拷贝）
    pub fn data_ref(&self) -> Ref<'_, ArrayD<f32>> {
        let borrow = self.0.borrow();
        Ref::map(borrow, |t| &t.data)
    }

    /// 获取梯度的只读引用（零拷贝）
    pub fn grad_ref(&self) -> Ref<'_, Option<ArrayD<f32>>> {
        let borrow = self.0.borrow();
        Ref::map(borrow, |t| &t.grad)
    }

    pub fn data_mut(&self) -> RefMut<'_, ArrayD<f32>> {
        let borrow = self.0.borrow_mut();
        RefMut::map(borrow, |t| &mut t.data)
    }

    pub fn data(&self) -> ArrayD<f32> {
        self.0.borrow().data.clone()
    }

    pub fn grad(&self) -> Option<ArrayD<f32>> {
        self.0.borrow().grad.clone()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.0.borrow().data.shape().to_vec()
    }

    pub fn sum(&self) -> Tensor {
        crate::ops::arithmetic::sum(self)
    }

    #[inline]
    pub fn requires_grad(&self) -> bool {
        self.0.borrow().requires_grad
    }

    pub fn zero_grad(&self) {
        self.0.borrow_mut().grad = None;
    }

    pub fn add_grad(&self, grad: ArrayD<f32>) {
        let mut inner = self.0.borrow_mut();

        if inner.data.shape() != grad.shape() {
            panic!(
                "CRITICAL: Gradient shape mismatch!\nParameter Shape: {:?}\nGradient Shape: {:?}",
                inner.data.shape(),
                grad.shape()
            );
        }

        if let Some(existing) = inner.grad.as_mut() {
            *existing += &grad;
        } else {
            inner.grad = Some(grad);
        }
    }

    /// 拓扑序（父节点在前）。用显式栈而不是递归：
    /// 长序列 RNN 展开后图的深度与时间步数成正比。
    fn topo_order(&self) -> Vec<Tensor> {
        let mut topo = Vec::new();
        let mut visited: HashSet<*const TensorData> = HashSet::new();
        let mut stack = vec![(self.clone(), false)];

        while let Some((node, expanded)) = stack.pop() {
            if expanded {
                topo.push(node);
                continue;
            }
            let ptr = node.0.as_ptr() as *const TensorData;
            if !visited.insert(ptr) {
                continue;
            }
            stack.push((node.clone(), true));
            for parent in &node.0.borrow().parents {
                let pptr = parent.0.as_ptr() as *const TensorData;
                if !visited.contains(&pptr) {
                    stack.push((parent.clone(), false));
                }
            }
        }
        topo
    }

    pub fn backward(&self) {
        let topo = self.topo_order();

        let seed = ArrayD::ones(self.data_ref().shape());
        self.add_grad(seed);

        for node in topo.iter().rev() {
            let inner = node.0.borrow();
            if let (Some(grad), Some(op)) = (&inner.grad, &inner.backward_op) {
                op(grad);
            }
        }
    }

    pub fn get_raw_data(&self) -> (Vec<usize>, Vec<f32>) {
        let inner = self.0.borrow();
        (
            inner.data.shape().to_vec(),
            inner.data.iter().cloned().collect(),
        )
    }

    pub fn set_raw_data(
        &self,
        shape: Vec<usize>,
        raw_data: Vec<f32>,
    ) -> Result<(), ndarray::ShapeError> {
        let new_data = Array::from_shape_vec(shape, raw_data)?.into_dyn();
        self.0.borrow_mut().data = new_data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn no_grad_yields_constants() {
        let w = Tensor::parameter(arr1(&[1.0f32, 2.0]).into_dyn());
        let y = no_grad(|| (&w + &w).sum());
        assert!(!y.requires_grad());
        assert!(!is_no_grad());
    }

    #[test]
    fn shared_parent_accumulates_gradient() {
        // y = sum(w + w) => dy/dw = 2
        let w = Tensor::parameter(arr1(&[1.0f32, -3.0, 0.5]).into_dyn());
        let y = (&w + &w).sum();
        y.backward();
        assert_eq!(w.grad().unwrap(), arr1(&[2.0f32, 2.0, 2.0]).into_dyn());
    }

    #[test]
    fn backward_handles_deep_chains() {
        let w = Tensor::parameter(arr1(&[1.0f32]).into_dyn());
        let mut h = w.clone();
        for _ in 0..1_000 {
            h = &h + &w;
        }
        h.sum().backward();
        assert_eq!(w.grad().unwrap()[[0]], 1_001.0);
    }
}
