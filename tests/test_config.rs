use std::fs;
use std::path::PathBuf;

use ppe_detect::config::{AppConfig, DatasetConfig, ModelConfig, VisualizationConfig};
use ppe_detect::error::Error;

#[test]
fn model_defaults_are_valid() {
    let config = ModelConfig::default();
    config.validate().unwrap();

    assert_eq!(config.name, "yolov8n.pt");
    assert_eq!(config.epochs, 20);
    assert_eq!(config.batch_size, 64);
    assert_eq!(config.confidence_threshold, 0.4);
}

#[test]
fn zero_epochs_fail_validation() {
    let config = ModelConfig {
        epochs: 0,
        ..ModelConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("epochs"));
}

#[test]
fn out_of_range_confidence_fails_validation() {
    for threshold in [1.5_f32, -0.1] {
        let config = ModelConfig {
            confidence_threshold: threshold,
            ..ModelConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("confidence threshold"));
    }
}

#[test]
fn boundary_confidence_values_are_accepted() {
    for threshold in [0.0_f32, 1.0] {
        let config = ModelConfig {
            confidence_threshold: threshold,
            ..ModelConfig::default()
        };
        config.validate().unwrap();
    }
}

#[test]
fn dataset_paths_derive_from_base_path() {
    let config = DatasetConfig {
        base_path: PathBuf::from("/test/path"),
        ..DatasetConfig::default()
    };

    assert_eq!(
        config.train_images_path(),
        PathBuf::from("/test/path/train/images")
    );
    assert_eq!(
        config.train_labels_path(),
        PathBuf::from("/test/path/train/labels")
    );
    assert_eq!(
        config.valid_images_path(),
        PathBuf::from("/test/path/valid/images")
    );
    assert_eq!(
        config.valid_labels_path(),
        PathBuf::from("/test/path/valid/labels")
    );
    assert_eq!(config.data_yaml_path(), PathBuf::from("/test/path/data.yaml"));
}

#[test]
fn dataset_split_defaults() {
    let config = DatasetConfig::default();
    assert_eq!(config.validation_split, 0.2);
    assert_eq!(config.min_validation_samples, 10);
}

#[test]
fn color_lookup_wraps_by_class_id() {
    let config = VisualizationConfig::default();
    let n = config.colors.len();
    assert_eq!(n, 10);

    assert_eq!(config.color_for(0), config.colors[0]);
    assert_eq!(config.color_for(n), config.colors[0]);
    assert_eq!(config.color_for(2 * n + 3), config.colors[3]);
    assert_eq!(config.color_for(15), config.colors[5]);
}

#[test]
fn empty_palette_fails_validation() {
    let config = VisualizationConfig {
        colors: Vec::new(),
        ..VisualizationConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn app_config_derives_model_paths() {
    let config = AppConfig {
        save_dir: PathBuf::from("/test"),
        project_name: "test_project".to_string(),
        ..AppConfig::default()
    };

    assert_eq!(config.model_save_path(), PathBuf::from("/test/test_project"));
    assert_eq!(
        config.best_model_path(),
        PathBuf::from("/test/test_project/weights/best.onnx")
    );
}

#[test]
fn app_config_validation_covers_sections() {
    let mut config = AppConfig::default();
    config.validate().unwrap();

    config.model.epochs = 0;
    assert!(config.validate().is_err());
}

#[test]
fn yaml_file_overrides_defaults_per_section() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(
        &path,
        "\
project_name: site_cameras
model:
  epochs: 5
  confidence_threshold: 0.25
dataset:
  base_path: /data/ppe
  validation_split: 0.3
",
    )
    .unwrap();

    let config = AppConfig::from_yaml_file(&path).unwrap();

    assert_eq!(config.project_name, "site_cameras");
    assert_eq!(config.model.epochs, 5);
    assert_eq!(config.model.confidence_threshold, 0.25);
    assert_eq!(config.dataset.base_path, PathBuf::from("/data/ppe"));
    assert_eq!(config.dataset.validation_split, 0.3);
    // Untouched sections keep their defaults.
    assert_eq!(config.model.batch_size, 64);
    assert_eq!(config.save_dir, PathBuf::from("runs"));
}

#[test]
fn malformed_yaml_file_fails_as_configuration_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "model: [not, a, map\n").unwrap();

    let result = AppConfig::from_yaml_file(&path);
    assert!(matches!(result, Err(Error::ConfigValidation(_))));
}

#[test]
fn yaml_file_with_invalid_values_fails_validation() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, "model:\n  epochs: 0\n").unwrap();

    let result = AppConfig::from_yaml_file(&path);
    assert!(matches!(result, Err(Error::ConfigValidation(_))));
}

#[test]
fn app_config_display_names_the_project() {
    let text = AppConfig::default().to_string();
    assert!(text.contains("AppConfig"));
    assert!(text.contains("Save Dir"));
    assert!(text.contains("ppe_model"));
}
