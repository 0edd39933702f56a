pub mod arithmetic;
pub mod matmul;
pub mod shape;
