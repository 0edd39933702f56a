// src/encoder.rs
//! Feature encoder adapter: runs a trained encoder over a patch sequence.

use crate::error::{BoxError, GlanceError, Result};
use crate::window::{im2window, stack_sequences, window_count};
use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

/// A loaded model that maps one patch vector to one feature vector.
///
/// Implementations must be read-only: the same encoder is shared across
/// rayon workers when a dataset is featurized.
pub trait Encoder: Send + Sync {
    fn predict(&self, input: ArrayView1<'_, f32>) -> std::result::Result<Array1<f32>, BoxError>;

    /// Expected patch length, if known.
    fn input_dim(&self) -> Option<usize> {
        None
    }

    /// Fixed output length, if known.
    fn output_dim(&self) -> Option<usize> {
        None
    }
}

impl<F> Encoder for F
where
    F: Fn(ArrayView1<'_, f32>) -> std::result::Result<Array1<f32>, BoxError> + Send + Sync,
{
    fn predict(&self, input: ArrayView1<'_, f32>) -> std::result::Result<Array1<f32>, BoxError> {
        self(input)
    }
}

/// Maps every patch (row) of `patches` through `encoder`, keeping scan order.
///
/// Fails on the first patch whose encoding errors or whose output length
/// differs from the fixed feature dimension; nothing is emitted in that case.
pub fn auto_encode<E: Encoder + ?Sized>(
    patches: ArrayView2<'_, f32>,
    encoder: &E,
) -> Result<Array2<f32>> {
    let n = patches.nrows();
    let mut expected = encoder.output_dim();

    if n == 0 {
        return Ok(Array2::zeros((0, expected.unwrap_or(0))));
    }

    let mut data = Vec::new();
    for (index, patch) in patches.axis_iter(Axis(0)).enumerate() {
        if let Some(input_dim) = encoder.input_dim() {
            if patch.len() != input_dim {
                return Err(GlanceError::ShapeMismatch {
                    index,
                    expected: input_dim,
                    actual: patch.len(),
                });
            }
        }

        let feature = encoder
            .predict(patch)
            .map_err(|source| GlanceError::EncoderFailure { index, source })?;

        match expected {
            Some(d) if d != feature.len() => {
                return Err(GlanceError::ShapeMismatch {
                    index,
                    expected: d,
                    actual: feature.len(),
                });
            }
            Some(_) => {}
            None => {
                expected = Some(feature.len());
                data.reserve(n * feature.len());
            }
        }
        data.extend(feature.iter().copied());
    }

    let d = expected.unwrap_or(0);
    Array2::from_shape_vec((n, d), data)
        .map_err(|e| GlanceError::invalid(format!("feature layout: {}", e)))
}

/// Windows and encodes every image of `images` (`[N, H, W]`), returning
/// `[N, patches, D]`. Images are processed in parallel; order is preserved.
pub fn encode_dataset<E: Encoder + ?Sized>(
    images: ArrayView3<'_, f32>,
    window_size: usize,
    encoder: &E,
) -> Result<Array3<f32>> {
    let (n, height, width) = images.dim();
    let steps = window_count(height, width, window_size)?;

    let sequences: Vec<Array2<f32>> = images
        .axis_iter(Axis(0))
        .into_par_iter()
        .enumerate()
        .map(|(image, pixels)| {
            im2window(pixels, window_size)
                .and_then(|patches| auto_encode(patches.view(), encoder))
                .map_err(|e| GlanceError::ImageFailure {
                    image,
                    source: Box::new(e),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let features = sequences.first().map(|s| s.ncols()).unwrap_or(0);
    // 各图像的特征维度必须一致
    for (image, seq) in sequences.iter().enumerate() {
        if seq.ncols() != features {
            return Err(GlanceError::ImageFailure {
                image,
                source: Box::new(GlanceError::ShapeMismatch {
                    index: 0,
                    expected: features,
                    actual: seq.ncols(),
                }),
            });
        }
    }

    stack_sequences(sequences, n, steps, features)
}
