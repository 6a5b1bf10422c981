use puzzle_gan::error::{ConfigError, PuzzleGanError, Result};
use std::io;

#[test]
fn test_io_error_conversion() {
    let io_err = io::Error::new(io::ErrorKind::NotFound, "test error");
    let err: PuzzleGanError = io_err.into();

    match err {
        PuzzleGanError::Io(_) => (),
        _ => panic!("Expected Io error variant"),
    }
}

#[test]
fn test_error_display() {
    let err = PuzzleGanError::Shape("bad shape".to_string());
    assert_eq!(format!("{}", err), "Shape error: bad shape");

    let err = PuzzleGanError::MissingParameter("G/8x8/Conv/weight".to_string());
    assert_eq!(format!("{}", err), "Missing parameter: G/8x8/Conv/weight");

    let err: PuzzleGanError = ConfigError::UnknownPuzzleMode("3parts".to_string()).into();
    assert_eq!(format!("{}", err), "Configuration error: unknown puzzle mode: 3parts");

    let err: PuzzleGanError = ConfigError::InvalidKernel(2).into();
    assert_eq!(
        format!("{}", err),
        "Configuration error: kernel size 2 must be odd and at least 1"
    );
}

#[test]
fn test_config_errors_are_distinguishable() {
    let config: PuzzleGanError = ConfigError::InvalidResolution(12).into();
    assert!(config.is_config());
    assert!(!PuzzleGanError::Execution("boom".to_string()).is_config());
    assert!(!PuzzleGanError::Shape("boom".to_string()).is_config());
}

#[test]
fn test_parse_int_error_conversion() {
    let parse_err = "not a number".parse::<i32>().unwrap_err();
    let err: PuzzleGanError = parse_err.into();

    match err {
        PuzzleGanError::Parse(msg) => assert!(msg.contains("Failed to parse integer")),
        _ => panic!("Expected Parse error variant"),
    }
}

#[test]
fn test_parse_float_error_conversion() {
    let parse_err = "not a float".parse::<f32>().unwrap_err();
    let err: PuzzleGanError = parse_err.into();

    match err {
        PuzzleGanError::Parse(msg) => assert!(msg.contains("Failed to parse float")),
        _ => panic!("Expected Parse error variant"),
    }
}

#[test]
fn test_toml_error_conversion() {
    let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
    let err: PuzzleGanError = toml_err.into();
    assert!(matches!(err, PuzzleGanError::Parse(_)));
}

#[test]
fn test_shape_error_conversion() {
    let shape_err = ndarray::Array::from_shape_vec((2, 2), vec![1.0f32; 3]).unwrap_err();
    let err: PuzzleGanError = shape_err.into();
    assert!(matches!(err, PuzzleGanError::Shape(_)));
}

#[test]
fn test_result_propagation() {
    fn parse_lod(s: &str) -> Result<f32> {
        Ok(s.parse::<f32>()?)
    }

    assert_eq!(parse_lod("1.5").unwrap(), 1.5);
    assert!(parse_lod("one").is_err());
}
