use puzzle_gan::config::{DType, NetworkConfig, Structure};
use puzzle_gan::config_file::PuzzleGanConfigFile;
use puzzle_gan::error::{ConfigError, PuzzleGanError};
use tempfile::TempDir;

#[test]
fn test_network_config_default() {
    let config = NetworkConfig::default();
    assert_eq!(config.resolution, 32);
    assert_eq!(config.firstblock_res, 8);
    assert_eq!(config.num_channels, 1);
    assert_eq!(config.fmap_base, 8192);
    assert_eq!(config.fmap_max, 512);
    assert_eq!(config.latent_sizes, vec![512]);
    assert_eq!(config.mbstd_group_size, 4);
    assert_eq!(config.dtype, DType::Float32);
    assert!(config.mode.is_none());
}

#[test]
fn test_network_config_validate_success() {
    let config = NetworkConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_derived_stage_values() {
    let config = NetworkConfig::default();
    assert_eq!(config.resolution_log2(), 5);
    assert_eq!(config.firstblock_log2(), 3);
    assert_eq!(config.max_lod(), 2);
    assert_eq!(config.latent_size(), 512);
}

#[test]
fn test_validate_rejects_small_resolution() {
    let config = NetworkConfig::builder().resolution(2).firstblock_res(2).build();
    match config.validate() {
        Err(PuzzleGanError::Config(ConfigError::InvalidResolution(2))) => (),
        other => panic!("Expected InvalidResolution, got {:?}", other),
    }
}

#[test]
fn test_validate_rejects_odd_first_block() {
    let config = NetworkConfig::builder().firstblock_res(6).build();
    let result = config.validate();
    assert!(result.is_err());
    assert!(result.unwrap_err().is_config());
}

#[test]
fn test_validate_rejects_zero_channels() {
    let config = NetworkConfig::builder().num_channels(0).build();
    let result = config.validate();
    assert!(result.is_err());
    assert!(format!("{}", result.unwrap_err()).contains("Number of channels must be greater than 0"));
}

#[test]
fn test_validate_rejects_vanishing_feature_maps() {
    let config = NetworkConfig::builder().fmap_base(4).fmap_max(4).build();
    assert!(config.validate().is_err());
}

#[test]
fn test_network_config_builder() {
    let config = NetworkConfig::builder()
        .resolution(64)
        .num_channels(3)
        .fmap_base(1024)
        .fmap_max(128)
        .latent_sizes(vec![64, 64])
        .latent_size(128)
        .mode("2parts-faces")
        .fused_scale(false)
        .structure(Structure::Linear)
        .dtype(DType::Float16)
        .build();

    assert_eq!(config.resolution, 64);
    assert_eq!(config.num_channels, 3);
    assert_eq!(config.nf(0), 128);
    assert_eq!(config.nf(5), 32);
    assert_eq!(config.latent_size(), 128);
    assert_eq!(config.mode.as_deref(), Some("2parts-faces"));
    assert!(!config.fused_scale);
    assert_eq!(config.structure(), Structure::Linear);
    assert_eq!(config.dtype, DType::Float16);
    assert!(config.validate().is_ok());
}

#[test]
fn test_structure_and_dtype_parsing() {
    assert_eq!(Structure::from_str("Linear").unwrap(), Structure::Linear);
    assert_eq!(Structure::from_str("recursive").unwrap(), Structure::Recursive);
    assert!(Structure::from_str("tree").is_err());
    assert_eq!(DType::from_str("f16").unwrap(), DType::Float16);
    assert_eq!(DType::Float32.to_string(), "float32");
}

#[test]
fn test_config_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("puzzle.toml");

    let mut file = PuzzleGanConfigFile::generate_default();
    file.network.resolution = 64;
    file.network.structure = Some("linear".to_string());
    file.puzzle.mode = Some("5parts-faces".to_string());
    file.puzzle.latent_size = Some(500);
    file.puzzle.latent_sizes = vec![100; 5];
    file.runtime.lod = 0.5;
    file.to_toml_file(&path).unwrap();

    let loaded = PuzzleGanConfigFile::from_file(&path).unwrap();
    let config = loaded.to_network_config().unwrap();
    assert_eq!(config.resolution, 64);
    assert_eq!(config.structure(), Structure::Linear);
    assert_eq!(config.latent_size(), 500);
    assert_eq!(loaded.runtime.lod, 0.5);
}

#[test]
fn test_config_file_partial_sections_use_defaults() {
    let toml = r#"
[network]
resolution = 16

[puzzle]
mode = "2parts-bedrooms"
latent_sizes = [8, 8]
latent_size = 16
"#;
    let file: PuzzleGanConfigFile = toml::from_str(toml).unwrap();
    let config = file.to_network_config().unwrap();
    assert_eq!(config.resolution, 16);
    assert_eq!(config.firstblock_res, 8);
    assert_eq!(file.runtime.batch_size, 4);
}

#[test]
fn test_config_file_invalid_structure() {
    let mut file = PuzzleGanConfigFile::generate_default();
    file.network.structure = Some("tree".to_string());
    assert!(file.to_network_config().is_err());
}

#[test]
fn test_config_file_invalid_resolution() {
    let mut file = PuzzleGanConfigFile::generate_default();
    file.network.resolution = 24;
    let err = file.to_network_config().unwrap_err();
    assert!(matches!(err, PuzzleGanError::Config(ConfigError::InvalidResolution(24))));
}
