//! Tests for sliding-window patch extraction
//!
//! Covers patch counts, scan order, row-major flattening inside a patch,
//! invalid window sizes and dataset-level windowing.

use glance::window::{im2window, window_count, windows_dataset};
use glance::GlanceError;
use ndarray::{Array, Array2, Array3};

fn ramp(height: usize, width: usize) -> Array2<f32> {
    Array::from_shape_fn((height, width), |(y, x)| (y * width + x) as f32)
}

// ============================================================================
// Patch Count and Order Tests
// ============================================================================

mod order_tests {
    use super::*;

    #[test]
    fn test_window_equal_to_image_yields_single_patch() {
        let image = ramp(4, 4);
        let patches = im2window(image.view(), 4).unwrap();

        assert_eq!(patches.dim(), (1, 16));
        assert_eq!(patches.row(0).to_vec(), image.iter().copied().collect::<Vec<_>>());
    }

    #[test]
    fn test_ten_by_ten_window_four_gives_49_patches() {
        let image = ramp(10, 10);
        let patches = im2window(image.view(), 4).unwrap();

        assert_eq!(patches.dim(), (49, 16));
        // k -> top-left corner (k / 7, k % 7)
        for k in 0..49 {
            let (y, x) = (k / 7, k % 7);
            assert_eq!(patches[[k, 0]], (y * 10 + x) as f32, "patch {}", k);
        }
    }

    #[test]
    fn test_five_by_five_window_two() {
        let image = ramp(5, 5);
        let patches = im2window(image.view(), 2).unwrap();

        assert_eq!(patches.nrows(), 16);
        assert_eq!(patches.row(0).to_vec(), vec![0., 1., 5., 6.]);
        assert_eq!(patches.row(1).to_vec(), vec![1., 2., 6., 7.]);
        assert_eq!(patches.row(4).to_vec(), vec![5., 6., 10., 11.]);
        assert_eq!(patches.row(15).to_vec(), vec![18., 19., 23., 24.]);
    }

    #[test]
    fn test_window_one_is_pixel_scan() {
        let image = ramp(3, 5);
        let patches = im2window(image.view(), 1).unwrap();

        assert_eq!(patches.dim(), (15, 1));
        assert_eq!(
            patches.column(0).to_vec(),
            (0..15).map(|v| v as f32).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_mnist_sized_count() {
        assert_eq!(window_count(28, 28, 4).unwrap(), 625);
        assert_eq!(window_count(28, 28, 10).unwrap(), 361);
        assert_eq!(window_count(28, 28, 28).unwrap(), 1);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let image = Array::from_shape_fn((9, 7), |(y, x)| ((y * 31 + x * 17) % 11) as f32 / 10.0);
        let a = im2window(image.view(), 3).unwrap();
        let b = im2window(image.view(), 3).unwrap();
        assert_eq!(a, b);
    }
}

// ============================================================================
// Invalid Argument Tests
// ============================================================================

mod invalid_tests {
    use super::*;

    #[test]
    fn test_zero_window_rejected() {
        let image = ramp(4, 4);
        assert!(matches!(
            im2window(image.view(), 0),
            Err(GlanceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_window_larger_than_image_rejected() {
        let image = ramp(4, 6);
        assert!(matches!(
            im2window(image.view(), 5),
            Err(GlanceError::InvalidArgument(_))
        ));
        assert!(matches!(
            window_count(4, 6, 7),
            Err(GlanceError::InvalidArgument(_))
        ));
    }
}

// ============================================================================
// Dataset Windowing Tests
// ============================================================================

mod dataset_tests {
    use super::*;

    #[test]
    fn test_dataset_matches_per_image_windows() {
        let images = Array3::from_shape_fn((3, 6, 6), |(n, y, x)| (n * 100 + y * 6 + x) as f32);
        let windows = windows_dataset(images.view(), 3).unwrap();

        assert_eq!(windows.dim(), (3, 16, 9));
        for n in 0..3 {
            let single = im2window(images.index_axis(ndarray::Axis(0), n), 3).unwrap();
            assert_eq!(windows.index_axis(ndarray::Axis(0), n), single);
        }
    }

    #[test]
    fn test_dataset_rejects_oversized_window() {
        let images = Array3::<f32>::zeros((2, 4, 4));
        assert!(windows_dataset(images.view(), 5).is_err());
    }
}
