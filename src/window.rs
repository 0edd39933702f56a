// src/window.rs
//! Sliding-window patch extraction ("glances").
//!
//! An image is cut into every overlapping `w x w` square, each flattened
//! row-major. Patches are emitted in scan order: the top-left corner walks
//! rows (y) in the outer loop and columns (x) in the inner loop.

use crate::error::{GlanceError, Result};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

/// Number of patches a `height x width` image yields for `window_size`.
pub fn window_count(height: usize, width: usize, window_size: usize) -> Result<usize> {
    if window_size == 0 {
        return Err(GlanceError::invalid("window size must be at least 1"));
    }
    if window_size > height || window_size > width {
        return Err(GlanceError::invalid(format!(
            "window size {} exceeds image dimensions {}x{}",
            window_size, height, width
        )));
    }
    Ok((height - window_size + 1) * (width - window_size + 1))
}

/// Window side whose flattened patches hold `patch_len` values, if
/// `patch_len` is a perfect square.
pub fn window_side(patch_len: usize) -> Option<usize> {
    let side = (patch_len as f64).sqrt().round() as usize;
    (side > 0 && side * side == patch_len).then_some(side)
}

/// Extracts the patch sequence of `image`.
///
/// Returns an array of shape `[patches, window_size^2]`, one patch per row.
pub fn im2window(image: ArrayView2<'_, f32>, window_size: usize) -> Result<Array2<f32>> {
    let (height, width) = image.dim();
    let count = window_count(height, width, window_size)?;
    let xdim = width - window_size + 1;
    let ydim = height - window_size + 1;

    let data: Vec<f32> = (0..ydim)
        .flat_map(|y| (0..xdim).map(move |x| (y, x)))
        .flat_map(|(y, x)| {
            image
                .slice(ndarray::s![y..y + window_size, x..x + window_size])
                .iter()
                .copied()
                .collect::<Vec<f32>>()
        })
        .collect();

    Array2::from_shape_vec((count, window_size * window_size), data)
        .map_err(|e| GlanceError::invalid(format!("patch layout: {}", e)))
}

/// Windows every image of `images` (`[N, H, W]`) into `[N, patches, window_size^2]`.
pub fn windows_dataset(images: ArrayView3<'_, f32>, window_size: usize) -> Result<Array3<f32>> {
    let (n, height, width) = images.dim();
    let count = window_count(height, width, window_size)?;

    // 按图像并行，collect 保持原顺序
    let sequences: Vec<Array2<f32>> = images
        .axis_iter(Axis(0))
        .into_par_iter()
        .map(|image| im2window(image, window_size))
        .collect::<Result<Vec<_>>>()?;

    stack_sequences(sequences, n, count, window_size * window_size)
}

/// Stacks equally-shaped per-image sequences into one `[N, T, F]` array.
pub(crate) fn stack_sequences(
    sequences: Vec<Array2<f32>>,
    n: usize,
    steps: usize,
    features: usize,
) -> Result<Array3<f32>> {
    let mut out = Array3::<f32>::zeros((n, steps, features));
    for (i, seq) in sequences.into_iter().enumerate() {
        if seq.dim() != (steps, features) {
            return Err(GlanceError::ShapeMismatch {
                index: i,
                expected: steps * features,
                actual: seq.len(),
            });
        }
        out.index_axis_mut(Axis(0), i).assign(&seq);
    }
    Ok(out)
}
