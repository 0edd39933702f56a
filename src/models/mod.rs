pub mod autoencoder;
pub mod classifier;

pub use autoencoder::{AutoEncoder, AutoEncoderSpec, FeatureMode, FrozenAutoEncoder};
pub use classifier::GlanceClassifier;
