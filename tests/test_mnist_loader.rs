//! Tests for the MNIST idx loader
//!
//! Writes synthetic idx files whose train and t10k splits are told apart by
//! pixel value and label, so split mixing shows up directly.

use glance::mnist_loader::{load_data, IMAGE_SIDE};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::TempDir;

fn write_images(path: &Path, n: usize, pixel: u8) {
    let mut w = BufWriter::new(File::create(path).unwrap());
    for v in [2051u32, n as u32, IMAGE_SIDE as u32, IMAGE_SIDE as u32] {
        w.write_all(&v.to_be_bytes()).unwrap();
    }
    w.write_all(&vec![pixel; n * IMAGE_SIDE * IMAGE_SIDE]).unwrap();
    w.flush().unwrap();
}

fn write_labels(path: &Path, n: usize, label: u8) {
    let mut w = BufWriter::new(File::create(path).unwrap());
    for v in [2049u32, n as u32] {
        w.write_all(&v.to_be_bytes()).unwrap();
    }
    w.write_all(&vec![label; n]).unwrap();
    w.flush().unwrap();
}

/// Train split: blank images labelled 0. Test split: white images labelled 7.
fn synthetic_mnist() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_images(&dir.path().join("train-images-idx3-ubyte"), 60_000, 0);
    write_labels(&dir.path().join("train-labels-idx1-ubyte"), 60_000, 0);
    write_images(&dir.path().join("t10k-images-idx3-ubyte"), 10_000, 255);
    write_labels(&dir.path().join("t10k-labels-idx1-ubyte"), 10_000, 7);
    dir
}

// ============================================================================
// Split Tests
// ============================================================================

mod split_tests {
    use super::*;

    #[test]
    fn test_limited_splits_come_from_their_own_files() {
        let dir = synthetic_mnist();
        let data = load_data(dir.path(), Some(1000), Some(1000)).unwrap();

        assert_eq!(data.train_images.dim(), (1000, IMAGE_SIDE, IMAGE_SIDE));
        assert_eq!(data.test_images.dim(), (1000, IMAGE_SIDE, IMAGE_SIDE));
        assert_eq!(data.train_labels.len(), 1000);
        assert_eq!(data.test_labels.len(), 1000);

        assert!(data.train_labels.iter().all(|&l| l == 0));
        assert!(data.train_images.iter().all(|&p| p == 0.0));
        assert!(data.test_labels.iter().all(|&l| l == 7));
        assert!(data.test_images.iter().all(|&p| p == 1.0));
    }

    #[test]
    fn test_no_limit_loads_full_splits() {
        let dir = synthetic_mnist();
        let data = load_data(dir.path(), None, None).unwrap();

        assert_eq!(data.train_images.dim().0, 60_000);
        assert_eq!(data.test_images.dim().0, 10_000);
        assert!(data.test_labels.iter().all(|&l| l == 7));
    }

    #[test]
    fn test_limit_above_split_size_is_capped() {
        let dir = synthetic_mnist();
        let data = load_data(dir.path(), Some(10), Some(50_000)).unwrap();

        assert_eq!(data.train_labels.len(), 10);
        assert_eq!(data.test_labels.len(), 10_000);
        assert!(data.test_images.iter().all(|&p| p == 1.0));
    }
}
