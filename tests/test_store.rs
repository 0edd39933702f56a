//! Tests for persisting and restoring the window autoencoder
//!
//! Covers the two-artifact layout, identical predictions after a round trip,
//! and rejection of weight blobs that do not fit the stored architecture.

use glance::encoder::Encoder;
use glance::models::{AutoEncoder, AutoEncoderSpec, FeatureMode};
use glance::module::Module;
use glance::store::{architecture_path, load_autoencoder, save_autoencoder, weights_path};
use glance::GlanceError;
use ndarray::Array;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use tempfile::TempDir;

fn trained_like(seed: u64, hidden: Vec<usize>) -> AutoEncoder {
    let mut rng = StdRng::seed_from_u64(seed);
    AutoEncoder::new(AutoEncoderSpec::new(16, hidden), &mut rng).expect("valid spec")
}

// ============================================================================
// Round Trip Tests
// ============================================================================

mod round_trip_tests {
    use super::*;

    #[test]
    fn test_save_writes_both_artifacts() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("nested").join("autoEncoder");

        save_autoencoder(&trained_like(1, vec![100, 25]), &stem).unwrap();

        assert!(architecture_path(&stem).is_file());
        assert!(weights_path(&stem).is_file());
        let json = fs::read_to_string(architecture_path(&stem)).unwrap();
        assert!(json.contains("\"input_dim\": 16"));
    }

    #[test]
    fn test_loaded_model_predicts_identically() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("ae");
        let original = trained_like(42, vec![100, 25]);
        save_autoencoder(&original, &stem).unwrap();

        let restored = load_autoencoder(&stem).unwrap();
        assert_eq!(restored.spec(), original.spec());

        let patch = Array::linspace(0.0f32, 1.0, 16);
        for mode in [FeatureMode::Reconstruction, FeatureMode::Bottleneck] {
            let a = original.freeze(mode).unwrap().predict(patch.view()).unwrap();
            let b = restored.freeze(mode).unwrap().predict(patch.view()).unwrap();
            assert_eq!(a, b, "{:?} features differ after reload", mode);
        }
    }

    #[test]
    fn test_parameters_survive_round_trip() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("ae");
        let original = trained_like(3, vec![8, 4]);
        save_autoencoder(&original, &stem).unwrap();

        let restored = load_autoencoder(&stem).unwrap();
        for (p, q) in original.parameters().iter().zip(restored.parameters().iter()) {
            assert_eq!(p.data(), q.data());
        }
    }
}

// ============================================================================
// Error Handling Tests
// ============================================================================

mod error_tests {
    use super::*;

    #[test]
    fn test_missing_model_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_autoencoder(&dir.path().join("absent")),
            Err(GlanceError::Io(_))
        ));
    }

    #[test]
    fn test_blob_from_other_architecture_is_rejected() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("ae");
        save_autoencoder(&trained_like(1, vec![100, 25]), &stem).unwrap();

        // 用另一种结构的权重覆盖 blob
        trained_like(1, vec![64, 16])
            .save_weights(&weights_path(&stem))
            .unwrap();

        assert!(matches!(
            load_autoencoder(&stem),
            Err(GlanceError::Checkpoint(_))
        ));
    }

    #[test]
    fn test_failed_load_leaves_weights_untouched() {
        let dir = TempDir::new().unwrap();
        let blob = dir.path().join("small.bin");
        trained_like(5, vec![4]).save_weights(&blob).unwrap();

        let model = trained_like(6, vec![100, 25]);
        let before: Vec<_> = model.parameters().iter().map(|p| p.data()).collect();
        assert!(model.load_weights(&blob).is_err());
        let after: Vec<_> = model.parameters().iter().map(|p| p.data()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_failed_blob_write_leaves_no_architecture() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("ae");
        // 目录占住 blob 的位置，rename 必然失败
        fs::create_dir(weights_path(&stem)).unwrap();

        assert!(save_autoencoder(&trained_like(1, vec![8, 4]), &stem).is_err());

        assert!(!architecture_path(&stem).exists());
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![weights_path(&stem).file_name().unwrap().to_owned()]);
    }

    #[test]
    fn test_failed_save_keeps_previous_model_loadable() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("ae");
        let original = trained_like(2, vec![8, 4]);
        save_autoencoder(&original, &stem).unwrap();

        // 临时 blob 名被目录占住，新的保存在改名之前就失败
        fs::create_dir(dir.path().join("ae.bin.tmp")).unwrap();
        assert!(save_autoencoder(&trained_like(3, vec![6]), &stem).is_err());

        let restored = load_autoencoder(&stem).unwrap();
        assert_eq!(restored.spec(), original.spec());
    }

    #[test]
    fn test_corrupt_architecture_is_json_error() {
        let dir = TempDir::new().unwrap();
        let stem = dir.path().join("ae");
        fs::write(architecture_path(&stem), "{ not json").unwrap();
        assert!(matches!(load_autoencoder(&stem), Err(GlanceError::Json(_))));
    }
}
