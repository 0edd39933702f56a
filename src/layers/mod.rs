// 1. 声明子文件夹为模块
pub mod activation;
pub mod basic;
pub mod rnn;

// 2. 重新导出 (Re-export)
pub use activation::ReLU;
pub use basic::Linear;
pub use rnn::IRNN;
