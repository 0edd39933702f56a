//! Experiment configuration
//!
//! A single JSON file may carry one section per experiment. Every section and
//! every field is optional; anything left out keeps that experiment's default.
//!
//! # Example
//!
//! ```json
//! {
//!   "glance": { "epochs": 50, "window_size": 7 },
//!   "autoencoder": { "hidden_layers": [64, 16], "model_path": "models/ae16" },
//!   "glance_encoded": { "feature_mode": "bottleneck", "model_path": "models/ae16" }
//! }
//! ```

use crate::error::{GlanceError, Result};
use crate::models::FeatureMode;
use crate::train::FitConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SEED: u64 = 1337;
pub const DEFAULT_MODEL_PATH: &str = "models/autoEncoder";

/// Experiment (a): IRNN directly on pixel windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlanceConfig {
    pub data_dir: PathBuf,
    pub train_limit: Option<usize>,
    pub test_limit: Option<usize>,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub clip_norm: Option<f32>,
    pub seed: u64,
    pub window_size: usize,
    pub hidden_units: usize,
    pub nb_classes: usize,
}

impl Default for GlanceConfig {
    fn default() -> Self {
        GlanceConfig {
            data_dir: PathBuf::from("data"),
            train_limit: Some(1000),
            test_limit: Some(1000),
            batch_size: 32,
            epochs: 200,
            learning_rate: 1e-6,
            clip_norm: None,
            seed: DEFAULT_SEED,
            window_size: 4,
            hidden_units: 100,
            nb_classes: 10,
        }
    }
}

/// Experiment (b): autoencoder pretraining on individual windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoEncoderConfig {
    pub data_dir: PathBuf,
    pub train_limit: Option<usize>,
    pub test_limit: Option<usize>,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub clip_norm: Option<f32>,
    pub seed: u64,
    pub window_size: usize,
    pub hidden_layers: Vec<usize>,
    /// Path stem; `.json` and `.bin` are appended.
    pub model_path: PathBuf,
}

impl Default for AutoEncoderConfig {
    fn default() -> Self {
        AutoEncoderConfig {
            data_dir: PathBuf::from("data"),
            train_limit: Some(1000),
            test_limit: Some(1000),
            batch_size: 32,
            epochs: 200,
            learning_rate: 1e-6,
            clip_norm: None,
            seed: DEFAULT_SEED,
            window_size: 4,
            hidden_layers: vec![100, 25],
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
        }
    }
}

/// Experiment (c): IRNN on autoencoder-featurized windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GlanceEncodedConfig {
    pub data_dir: PathBuf,
    pub train_limit: Option<usize>,
    pub test_limit: Option<usize>,
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub clip_norm: Option<f32>,
    pub seed: u64,
    /// `None`: derived from the stored autoencoder's input size.
    pub window_size: Option<usize>,
    pub hidden_units: usize,
    pub nb_classes: usize,
    pub model_path: PathBuf,
    pub feature_mode: FeatureMode,
}

impl Default for GlanceEncodedConfig {
    fn default() -> Self {
        GlanceEncodedConfig {
            data_dir: PathBuf::from("data"),
            train_limit: Some(10),
            test_limit: Some(10),
            batch_size: 32,
            epochs: 200,
            learning_rate: 1e-6,
            clip_norm: None,
            seed: DEFAULT_SEED,
            window_size: None,
            hidden_units: 100,
            nb_classes: 10,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            feature_mode: FeatureMode::Reconstruction,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentsConfig {
    pub glance: GlanceConfig,
    pub autoencoder: AutoEncoderConfig,
    pub glance_encoded: GlanceEncodedConfig,
}

/// Reads and validates a configuration file.
pub fn load_config(path: &Path) -> Result<ExperimentsConfig> {
    let contents = fs::read_to_string(path)?;
    let config: ExperimentsConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

fn config_err(msg: impl Into<String>) -> GlanceError {
    GlanceError::Config(msg.into())
}

fn validate_training(
    section: &str,
    batch_size: usize,
    epochs: usize,
    learning_rate: f32,
    clip_norm: Option<f32>,
) -> Result<()> {
    if batch_size == 0 {
        return Err(config_err(format!("{}.batch_size must be positive", section)));
    }
    if epochs == 0 {
        return Err(config_err(format!("{}.epochs must be positive", section)));
    }
    if !(learning_rate.is_finite() && learning_rate > 0.0) {
        return Err(config_err(format!(
            "{}.learning_rate must be positive, got {}",
            section, learning_rate
        )));
    }
    if let Some(c) = clip_norm {
        if !(c.is_finite() && c > 0.0) {
            return Err(config_err(format!("{}.clip_norm must be positive", section)));
        }
    }
    Ok(())
}

impl GlanceConfig {
    pub fn validate(&self) -> Result<()> {
        validate_training(
            "glance",
            self.batch_size,
            self.epochs,
            self.learning_rate,
            self.clip_norm,
        )?;
        if self.window_size == 0 {
            return Err(config_err("glance.window_size must be positive"));
        }
        if self.hidden_units == 0 {
            return Err(config_err("glance.hidden_units must be positive"));
        }
        if self.nb_classes < 2 {
            return Err(config_err("glance.nb_classes must be at least 2"));
        }
        Ok(())
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            batch_size: self.batch_size,
            epochs: self.epochs,
            clip_norm: self.clip_norm,
            seed: self.seed,
        }
    }
}

impl AutoEncoderConfig {
    pub fn validate(&self) -> Result<()> {
        validate_training(
            "autoencoder",
            self.batch_size,
            self.epochs,
            self.learning_rate,
            self.clip_norm,
        )?;
        if self.window_size == 0 {
            return Err(config_err("autoencoder.window_size must be positive"));
        }
        if self.hidden_layers.is_empty() || self.hidden_layers.contains(&0) {
            return Err(config_err(format!(
                "autoencoder.hidden_layers must be non-empty and positive, got {:?}",
                self.hidden_layers
            )));
        }
        Ok(())
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            batch_size: self.batch_size,
            epochs: self.epochs,
            clip_norm: self.clip_norm,
            seed: self.seed,
        }
    }
}

impl GlanceEncodedConfig {
    pub fn validate(&self) -> Result<()> {
        validate_training(
            "glance_encoded",
            self.batch_size,
            self.epochs,
            self.learning_rate,
            self.clip_norm,
        )?;
        if self.window_size == Some(0) {
            return Err(config_err("glance_encoded.window_size must be positive"));
        }
        if self.hidden_units == 0 {
            return Err(config_err("glance_encoded.hidden_units must be positive"));
        }
        if self.nb_classes < 2 {
            return Err(config_err("glance_encoded.nb_classes must be at least 2"));
        }
        Ok(())
    }

    pub fn fit_config(&self) -> FitConfig {
        FitConfig {
            batch_size: self.batch_size,
            epochs: self.epochs,
            clip_norm: self.clip_norm,
            seed: self.seed,
        }
    }
}

impl ExperimentsConfig {
    pub fn validate(&self) -> Result<()> {
        self.glance.validate()?;
        self.autoencoder.validate()?;
        self.glance_encoded.validate()
    }
}
