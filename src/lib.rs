// src/lib.rs

pub mod autograd;
#[macro_use] pub mod module;
pub mod optim;
pub mod mnist_loader;
pub mod loss;
pub mod ops;
pub mod init;
pub mod layers;
pub mod models;
pub mod error;
pub mod window;
pub mod encoder;
pub mod store;
pub mod train;
pub mod config;
pub mod experiments;

pub use encoder::{auto_encode, encode_dataset, Encoder};
pub use error::{GlanceError, Result};
pub use window::{im2window, window_count, windows_dataset};
