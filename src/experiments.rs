// src/experiments.rs
//! The three experiment drivers.
//!
//! Each `run_*` loads MNIST from the configured directory and hands off to an
//! `*_on_images` function that works on in-memory arrays.

use crate::config::{AutoEncoderConfig, GlanceConfig, GlanceEncodedConfig};
use crate::encoder::{encode_dataset, Encoder};
use crate::error::{GlanceError, Result};
use crate::mnist_loader::{load_data, one_hot};
use crate::models::{AutoEncoder, AutoEncoderSpec, GlanceClassifier};
use crate::module::Module;
use crate::optim::RMSprop;
use crate::store::{load_autoencoder, save_autoencoder};
use crate::train::{evaluate, fit, EpochReport, Evaluation, FitConfig, Objective};
use crate::window::{window_side, windows_dataset};
use log::info;
use ndarray::{Array2, Array3, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentReport {
    pub history: Vec<EpochReport>,
    pub test: Evaluation,
}

/// Labelled images for one split.
pub struct Split<'a> {
    pub images: ArrayView3<'a, f32>,
    pub labels: &'a [u8],
}

fn train_irnn(
    label: &str,
    x_train: Array3<f32>,
    y_train: Array2<f32>,
    x_test: Array3<f32>,
    y_test: Array2<f32>,
    hidden_units: usize,
    learning_rate: f32,
    fit_cfg: &FitConfig,
) -> Result<ExperimentReport> {
    info!("X_train shape: {:?}", x_train.shape());
    info!("{} train samples", x_train.dim().0);
    info!("{} test samples", x_test.dim().0);

    let (_, _, features) = x_train.dim();
    let nb_classes = y_train.ncols();

    let mut rng = StdRng::seed_from_u64(fit_cfg.seed);
    let model = GlanceClassifier::new(features, hidden_units, nb_classes, &mut rng);
    let mut optimizer = RMSprop::new(model.parameters(), learning_rate);

    let (x_train, y_train) = (x_train.into_dyn(), y_train.into_dyn());
    let (x_test, y_test) = (x_test.into_dyn(), y_test.into_dyn());

    info!("Evaluate {}...", label);
    let history = fit(
        &model,
        &mut optimizer,
        Objective::CategoricalCrossEntropy,
        &x_train,
        &y_train,
        Some((&x_test, &y_test)),
        fit_cfg,
    )?;

    let test = evaluate(
        &model,
        Objective::CategoricalCrossEntropy,
        &x_test,
        &y_test,
        fit_cfg.batch_size,
    )?;
    info!("{} test score: {}", label, test.loss);
    info!("{} test accuracy: {}", label, test.accuracy.unwrap_or(0.0));

    Ok(ExperimentReport { history, test })
}

/// (a) IRNN on raw pixel windows.
pub fn glance_on_images(
    cfg: &GlanceConfig,
    train: Split<'_>,
    test: Split<'_>,
) -> Result<ExperimentReport> {
    cfg.validate()?;
    let x_train = windows_dataset(train.images, cfg.window_size)?;
    let x_test = windows_dataset(test.images, cfg.window_size)?;
    let y_train = one_hot(train.labels, cfg.nb_classes)?;
    let y_test = one_hot(test.labels, cfg.nb_classes)?;

    train_irnn(
        "IRNN",
        x_train,
        y_train,
        x_test,
        y_test,
        cfg.hidden_units,
        cfg.learning_rate,
        &cfg.fit_config(),
    )
}

pub fn run_glance(cfg: &GlanceConfig) -> Result<ExperimentReport> {
    cfg.validate()?;
    let data = load_data(&cfg.data_dir, cfg.train_limit, cfg.test_limit)?;
    glance_on_images(
        cfg,
        Split {
            images: data.train_images.view(),
            labels: &data.train_labels,
        },
        Split {
            images: data.test_images.view(),
            labels: &data.test_labels,
        },
    )
}

/// Every window of every image as one row: `[N * patches, window_size^2]`.
fn patch_rows(images: ArrayView3<'_, f32>, window_size: usize) -> Result<Array2<f32>> {
    let windows = windows_dataset(images, window_size)?;
    let (n, steps, features) = windows.dim();
    windows
        .into_shape((n * steps, features))
        .map_err(|e| GlanceError::invalid(format!("flattening windows: {}", e)))
}

/// (b) Autoencoder trained to reconstruct individual windows.
pub fn pretrain_on_images(
    cfg: &AutoEncoderConfig,
    train_images: ArrayView3<'_, f32>,
    test_images: ArrayView3<'_, f32>,
) -> Result<(AutoEncoder, ExperimentReport)> {
    cfg.validate()?;
    let x_train = patch_rows(train_images, cfg.window_size)?.into_dyn();
    let x_test = patch_rows(test_images, cfg.window_size)?.into_dyn();
    info!("X_train shape: {:?}", x_train.shape());
    info!("{} train samples", x_train.shape()[0]);
    info!("{} test samples", x_test.shape()[0]);

    let fit_cfg = cfg.fit_config();
    let mut rng = StdRng::seed_from_u64(fit_cfg.seed);
    let spec = AutoEncoderSpec::new(cfg.window_size * cfg.window_size, cfg.hidden_layers.clone());
    let model = AutoEncoder::new(spec, &mut rng)?;
    let mut optimizer = RMSprop::new(model.parameters(), cfg.learning_rate);

    info!("Train autoencoder {:?}...", model.spec());
    let history = fit(
        &model,
        &mut optimizer,
        Objective::MeanSquaredError,
        &x_train,
        &x_train,
        Some((&x_test, &x_test)),
        &fit_cfg,
    )?;

    let test = evaluate(
        &model,
        Objective::MeanSquaredError,
        &x_test,
        &x_test,
        fit_cfg.batch_size,
    )?;
    info!("Autoencoder test score: {}", test.loss);

    Ok((model, ExperimentReport { history, test }))
}

pub fn run_pretrain(cfg: &AutoEncoderConfig) -> Result<ExperimentReport> {
    cfg.validate()?;
    let data = load_data(&cfg.data_dir, cfg.train_limit, cfg.test_limit)?;
    let (model, report) =
        pretrain_on_images(cfg, data.train_images.view(), data.test_images.view())?;
    save_autoencoder(&model, &cfg.model_path)?;
    Ok(report)
}

/// Window size to featurize with: the configured one must agree with what the
/// encoder consumes.
fn resolve_window_size<E: Encoder + ?Sized>(
    configured: Option<usize>,
    encoder: &E,
) -> Result<usize> {
    let from_encoder = encoder.input_dim().and_then(window_side);

    match (configured, from_encoder) {
        (Some(w), Some(e)) if w != e => Err(GlanceError::invalid(format!(
            "window size {} does not match encoder input of {} ({}x{})",
            w,
            e * e,
            e,
            e
        ))),
        (Some(w), _) => Ok(w),
        (None, Some(e)) => Ok(e),
        (None, None) => Err(GlanceError::invalid(
            "window size not configured and encoder input size is not a square",
        )),
    }
}

/// (c) IRNN on encoder features of each window.
pub fn glance_encoded_on_images<E: Encoder + ?Sized>(
    cfg: &GlanceEncodedConfig,
    encoder: &E,
    train: Split<'_>,
    test: Split<'_>,
) -> Result<ExperimentReport> {
    cfg.validate()?;
    let window_size = resolve_window_size(cfg.window_size, encoder)?;
    info!("Featurizing {}x{} windows", window_size, window_size);

    let x_train = encode_dataset(train.images, window_size, encoder)?;
    let x_test = encode_dataset(test.images, window_size, encoder)?;
    let y_train = one_hot(train.labels, cfg.nb_classes)?;
    let y_test = one_hot(test.labels, cfg.nb_classes)?;

    train_irnn(
        "IRNN",
        x_train,
        y_train,
        x_test,
        y_test,
        cfg.hidden_units,
        cfg.learning_rate,
        &cfg.fit_config(),
    )
}

pub fn run_glance_encoded(cfg: &GlanceEncodedConfig) -> Result<ExperimentReport> {
    cfg.validate()?;
    let data = load_data(&cfg.data_dir, cfg.train_limit, cfg.test_limit)?;

    let autoencoder = load_autoencoder(&cfg.model_path)?;
    let encoder = autoencoder.freeze(cfg.feature_mode)?;
    // 图模型只在冻结前需要
    drop(autoencoder);

    glance_encoded_on_images(
        cfg,
        &encoder,
        Split {
            images: data.train_images.view(),
            labels: &data.train_labels,
        },
        Split {
            images: data.test_images.view(),
            labels: &data.test_labels,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use ndarray::{Array1, ArrayView1};

    fn identity(x: ArrayView1<'_, f32>) -> std::result::Result<Array1<f32>, BoxError> {
        Ok(x.to_owned())
    }

    struct Fixed(usize);

    impl Encoder for Fixed {
        fn predict(&self, x: ArrayView1<'_, f32>) -> std::result::Result<Array1<f32>, BoxError> {
            Ok(x.to_owned())
        }

        fn input_dim(&self) -> Option<usize> {
            Some(self.0)
        }
    }

    #[test]
    fn window_size_comes_from_encoder_when_unset() {
        assert_eq!(resolve_window_size(None, &Fixed(16)).unwrap(), 4);
        assert_eq!(resolve_window_size(Some(4), &Fixed(16)).unwrap(), 4);
        assert!(resolve_window_size(Some(10), &Fixed(16)).is_err());
        assert!(resolve_window_size(None, &Fixed(15)).is_err());
        assert_eq!(resolve_window_size(Some(3), &identity).unwrap(), 3);
        assert!(resolve_window_size(None, &identity).is_err());
    }

    #[test]
    fn patch_rows_flattens_images_and_windows() {
        let images = Array3::<f32>::zeros((3, 5, 5));
        let rows = patch_rows(images.view(), 2).unwrap();
        assert_eq!(rows.dim(), (3 * 16, 4));
    }
}
