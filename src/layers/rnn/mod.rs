pub mod irnn;

pub use irnn::IRNN;
