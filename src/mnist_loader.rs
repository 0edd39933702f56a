// src/mnist_loader.rs
use crate::error::{GlanceError, Result};
use log::info;
use mnist::{Mnist, MnistBuilder};
use ndarray::prelude::*;
use std::path::Path;

pub const IMAGE_SIDE: usize = 28;
const TRAIN_TOTAL: usize = 60_000;
const TEST_TOTAL: usize = 10_000;

const FILES: [&str; 4] = [
    "train-images-idx3-ubyte",
    "train-labels-idx1-ubyte",
    "t10k-images-idx3-ubyte",
    "t10k-labels-idx1-ubyte",
];

pub struct MnistData {
    /// `[N, 28, 28]`, normalised to [0, 1]
    pub train_images: Array3<f32>,
    pub train_labels: Vec<u8>,
    pub test_images: Array3<f32>,
    pub test_labels: Vec<u8>,
}

/// Loads the first `train_limit` / `test_limit` examples (all when `None`)
/// from the uncompressed idx files in `data_dir`.
pub fn load_data(
    data_dir: &Path,
    train_limit: Option<usize>,
    test_limit: Option<usize>,
) -> Result<MnistData> {
    // MnistBuilder 找不到文件会直接 panic，先自己检查
    for file in FILES {
        if !data_dir.join(file).exists() {
            return Err(GlanceError::Dataset(format!(
                "MNIST file {} not found in {}; download and unpack the four idx files there",
                file,
                data_dir.display()
            )));
        }
    }
    let base = data_dir
        .to_str()
        .ok_or_else(|| GlanceError::Dataset(format!("non UTF-8 path {}", data_dir.display())))?;
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };

    let train_size = train_limit.unwrap_or(TRAIN_TOTAL).min(TRAIN_TOTAL);
    let test_size = test_limit.unwrap_or(TEST_TOTAL).min(TEST_TOTAL);

    info!("Loading MNIST data from {}...", data_dir.display());

    // finalize() 把 t10k 拼在训练集后面再按长度切分，只能整份读入后再截断
    let Mnist {
        mut trn_img,
        mut trn_lbl,
        mut tst_img,
        mut tst_lbl,
        ..
    } = MnistBuilder::new()
        .label_format_digit()
        .training_set_length(TRAIN_TOTAL as u32)
        .validation_set_length(0)
        .test_set_length(TEST_TOTAL as u32)
        .base_path(&base)
        .finalize();

    trn_img.truncate(train_size * IMAGE_SIDE * IMAGE_SIDE);
    trn_lbl.truncate(train_size);
    tst_img.truncate(test_size * IMAGE_SIDE * IMAGE_SIDE);
    tst_lbl.truncate(test_size);

    let data = MnistData {
        train_images: process_images(trn_img, train_size)?,
        train_labels: trn_lbl,
        test_images: process_images(tst_img, test_size)?,
        test_labels: tst_lbl,
    };

    info!(
        "{} train samples, {} test samples",
        data.train_images.dim().0,
        data.test_images.dim().0
    );
    Ok(data)
}

/// Raw bytes -> `[N, 28, 28]` in [0, 1].
pub fn process_images(data: Vec<u8>, size: usize) -> Result<Array3<f32>> {
    let data_f32: Vec<f32> = data.into_iter().map(|x| x as f32 / 255.0).collect();
    Array3::from_shape_vec((size, IMAGE_SIDE, IMAGE_SIDE), data_f32)
        .map_err(|e| GlanceError::Dataset(format!("Error reshaping images: {}", e)))
}

/// Digit labels -> `[N, nb_classes]` one-hot rows.
pub fn one_hot(labels: &[u8], nb_classes: usize) -> Result<Array2<f32>> {
    let mut out = Array2::<f32>::zeros((labels.len(), nb_classes));
    for (i, &label) in labels.iter().enumerate() {
        let class = label as usize;
        if class >= nb_classes {
            return Err(GlanceError::invalid(format!(
                "label {} at index {} is outside {} classes",
                label, i, nb_classes
            )));
        }
        out[[i, class]] = 1.0;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_rows() {
        let y = one_hot(&[0, 3, 1], 4).unwrap();
        assert_eq!(y, array![[1., 0., 0., 0.], [0., 0., 0., 1.], [0., 1., 0., 0.]]);
        assert!(one_hot(&[4], 4).is_err());
    }

    #[test]
    fn images_are_scaled_to_unit_range() {
        let mut raw = vec![0u8; IMAGE_SIDE * IMAGE_SIDE];
        raw[1] = 255;
        let imgs = process_images(raw, 1).unwrap();
        assert_eq!(imgs[[0, 0, 1]], 1.0);
        assert_eq!(imgs[[0, 0, 0]], 0.0);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = Path::new("/nonexistent/mnist");
        assert!(matches!(load_data(dir, None, None), Err(GlanceError::Dataset(_))));
    }
}
