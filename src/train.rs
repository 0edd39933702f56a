// src/train.rs
use crate::autograd::{no_grad, Tensor};
use crate::error::{GlanceError, Result};
use crate::loss::{CrossEntropyLoss, MSELoss};
use crate::module::Module;
use crate::optim::{clip_grad_norm, Optimizer};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use ndarray::{concatenate, ArrayD, ArrayView2, ArrayViewD, Axis, Ix2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    /// Softmax + categorical cross-entropy over one-hot targets; reports accuracy.
    CategoricalCrossEntropy,
    MeanSquaredError,
}

impl Objective {
    pub fn apply(&self, output: &Tensor, target: &Tensor) -> Tensor {
        match self {
            Objective::CategoricalCrossEntropy => CrossEntropyLoss::apply(output, target),
            Objective::MeanSquaredError => MSELoss::apply(output, target),
        }
    }

    fn tracks_accuracy(&self) -> bool {
        matches!(self, Objective::CategoricalCrossEntropy)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub clip_norm: Option<f32>,
    /// Seeds the per-epoch shuffling.
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub loss: f32,
    pub accuracy: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: Option<f32>,
    pub validation: Option<Evaluation>,
}

fn check_pair(x: &ArrayD<f32>, y: &ArrayD<f32>, batch_size: usize) -> Result<usize> {
    if batch_size == 0 {
        return Err(GlanceError::invalid("batch size must be positive"));
    }
    let n = x.shape().first().copied().unwrap_or(0);
    let m = y.shape().first().copied().unwrap_or(0);
    if n == 0 {
        return Err(GlanceError::Dataset("no samples".to_string()));
    }
    if n != m {
        return Err(GlanceError::Dataset(format!(
            "{} inputs but {} targets",
            n, m
        )));
    }
    Ok(n)
}

/// Rows whose argmax matches the one-hot target's argmax.
fn count_correct(output: ArrayView2<'_, f32>, target: ArrayView2<'_, f32>) -> usize {
    fn argmax(row: ndarray::ArrayView1<'_, f32>) -> usize {
        row.iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
                if v > bv {
                    (i, v)
                } else {
                    (bi, bv)
                }
            })
            .0
    }
    output
        .rows()
        .into_iter()
        .zip(target.rows())
        .filter(|(o, t)| argmax(o.view()) == argmax(t.view()))
        .count()
}

fn as_2d<'a>(a: &'a ArrayD<f32>) -> Result<ArrayView2<'a, f32>> {
    a.view()
        .into_dimensionality::<Ix2>()
        .map_err(|e| GlanceError::invalid(format!("expected [Batch, Classes]: {}", e)))
}

fn progress_bar(len: usize, prefix: String) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_prefix(prefix);
    if !log::log_enabled!(log::Level::Info) {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
    pb
}

/// Mini-batch training. Each epoch visits every sample once in a shuffled
/// order drawn from `cfg.seed`.
pub fn fit<M: Module, O: Optimizer>(
    model: &M,
    optimizer: &mut O,
    objective: Objective,
    x: &ArrayD<f32>,
    y: &ArrayD<f32>,
    validation: Option<(&ArrayD<f32>, &ArrayD<f32>)>,
    cfg: &FitConfig,
) -> Result<Vec<EpochReport>> {
    let n = check_pair(x, y, cfg.batch_size)?;
    if let Some((vx, vy)) = validation {
        check_pair(vx, vy, cfg.batch_size)?;
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut indices: Vec<usize> = (0..n).collect();
    let n_batches = (n + cfg.batch_size - 1) / cfg.batch_size;
    let mut history = Vec::with_capacity(cfg.epochs);

    info!(
        "Train on {} samples, {} batches of {} per epoch",
        n, n_batches, cfg.batch_size
    );

    for epoch in 1..=cfg.epochs {
        indices.shuffle(&mut rng);
        let pb = progress_bar(n_batches, format!("Epoch {}/{}", epoch, cfg.epochs));

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;

        for batch_idx in indices.chunks(cfg.batch_size) {
            let xb = x.select(Axis(0), batch_idx);
            let yb = y.select(Axis(0), batch_idx);
            let target = Tensor::from_data_no_grad(yb);

            optimizer.zero_grad();
            let output = model.forward(Tensor::from_data_no_grad(xb));
            let loss = objective.apply(&output, &target);
            loss.backward();

            if let Some(max_norm) = cfg.clip_norm {
                let norm = clip_grad_norm(optimizer.params(), max_norm);
                debug!("grad norm {:.6}", norm);
            }
            optimizer.step();

            let batch_loss = loss.data_ref().sum();
            loss_sum += batch_loss as f64 * batch_idx.len() as f64;

            if objective.tracks_accuracy() {
                let out = output.data();
                correct += count_correct(as_2d(&out)?, as_2d(&target.data())?);
            }

            pb.set_message(format!("loss: {:.4}", batch_loss));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let report = EpochReport {
            epoch,
            loss: (loss_sum / n as f64) as f32,
            accuracy: objective
                .tracks_accuracy()
                .then(|| correct as f32 / n as f32),
            validation: match validation {
                Some((vx, vy)) => Some(evaluate(model, objective, vx, vy, cfg.batch_size)?),
                None => None,
            },
        };
        log_epoch(&report, cfg.epochs);
        history.push(report);
    }

    Ok(history)
}

fn log_epoch(report: &EpochReport, epochs: usize) {
    let mut line = format!(
        "Epoch {}/{} - loss: {:.4}",
        report.epoch, epochs, report.loss
    );
    if let Some(acc) = report.accuracy {
        line.push_str(&format!(" - acc: {:.4}", acc));
    }
    if let Some(val) = &report.validation {
        line.push_str(&format!(" - val_loss: {:.4}", val.loss));
        if let Some(acc) = val.accuracy {
            line.push_str(&format!(" - val_acc: {:.4}", acc));
        }
    }
    info!("{}", line);
}

/// Mean loss (and accuracy for classification) over `x`, without building a graph.
pub fn evaluate<M: Module>(
    model: &M,
    objective: Objective,
    x: &ArrayD<f32>,
    y: &ArrayD<f32>,
    batch_size: usize,
) -> Result<Evaluation> {
    let n = check_pair(x, y, batch_size)?;

    no_grad(|| -> Result<Evaluation> {
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;

        for start in (0..n).step_by(batch_size) {
            let end = (start + batch_size).min(n);
            let xb = x.slice_axis(Axis(0), (start..end).into()).to_owned();
            let yb = y.slice_axis(Axis(0), (start..end).into()).to_owned();

            let output = model.forward(Tensor::from_data_no_grad(xb));
            let target = Tensor::from_data_no_grad(yb);
            let loss = objective.apply(&output, &target);
            loss_sum += loss.data_ref().sum() as f64 * (end - start) as f64;

            if objective.tracks_accuracy() {
                let out = output.data();
                correct += count_correct(as_2d(&out)?, as_2d(&target.data())?);
            }
        }

        Ok(Evaluation {
            loss: (loss_sum / n as f64) as f32,
            accuracy: objective
                .tracks_accuracy()
                .then(|| correct as f32 / n as f32),
        })
    })
}

/// Forward pass over `x` in batches, outputs stacked along axis 0.
pub fn predict<M: Module>(model: &M, x: &ArrayD<f32>, batch_size: usize) -> Result<ArrayD<f32>> {
    if batch_size == 0 {
        return Err(GlanceError::invalid("batch size must be positive"));
    }
    let n = x.shape().first().copied().unwrap_or(0);
    if n == 0 {
        return Err(GlanceError::Dataset("no samples".to_string()));
    }

    let outputs: Vec<ArrayD<f32>> = no_grad(|| {
        (0..n)
            .step_by(batch_size)
            .map(|start| {
                let end = (start + batch_size).min(n);
                let xb = x.slice_axis(Axis(0), (start..end).into()).to_owned();
                model.forward(Tensor::from_data_no_grad(xb)).data()
            })
            .collect()
    });

    let views: Vec<ArrayViewD<'_, f32>> = outputs.iter().map(|o| o.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| GlanceError::invalid(format!("stacking outputs: {}", e)))
}
