use std::io;
use thiserror::Error;

/// Configuration problems detected before any graph node is created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
	#[error("resolution {0} must be a power of two and at least 4")]
	InvalidResolution(usize),

	#[error("first block resolution {first} must be a power of two between 4 and the output resolution {resolution}")]
	InvalidFirstBlock { first: usize, resolution: usize },

	#[error("kernel size {0} must be odd and at least 1")]
	InvalidKernel(usize),

	#[error("unknown puzzle mode: {0}")]
	UnknownPuzzleMode(String),

	#[error("latent partition mismatch: {0}")]
	LatentPartition(String),

	#[error("invalid parameter: {0}")]
	InvalidParameter(String),
}

#[derive(Debug, Error)]
pub enum PuzzleGanError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("Shape error: {0}")]
	Shape(String),

	#[error("Missing parameter: {0}")]
	MissingParameter(String),

	#[error("Execution error: {0}")]
	Execution(String),

	#[error("IO error: {0}")]
	Io(#[from] io::Error),

	#[error("Image processing error: {0}")]
	Image(#[from] image::ImageError),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Parse error: {0}")]
	Parse(String),

	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl PuzzleGanError {
	/// True for every failure raised by configuration validation.
	pub fn is_config(&self) -> bool {
		matches!(self, PuzzleGanError::Config(_))
	}
}

impl From<toml::de::Error> for PuzzleGanError {
	fn from(err: toml::de::Error) -> Self {
		PuzzleGanError::Parse(format!("Failed to parse TOML config: {}", err))
	}
}

impl From<serde_json::Error> for PuzzleGanError {
	fn from(err: serde_json::Error) -> Self {
		PuzzleGanError::Parse(format!("Failed to parse JSON config: {}", err))
	}
}

impl From<bincode::Error> for PuzzleGanError {
	fn from(err: bincode::Error) -> Self {
		PuzzleGanError::Serialization(err.to_string())
	}
}

impl From<ndarray::ShapeError> for PuzzleGanError {
	fn from(err: ndarray::ShapeError) -> Self {
		PuzzleGanError::Shape(err.to_string())
	}
}

impl From<std::num::ParseIntError> for PuzzleGanError {
	fn from(err: std::num::ParseIntError) -> Self {
		PuzzleGanError::Parse(format!("Failed to parse integer: {}", err))
	}
}

impl From<std::num::ParseFloatError> for PuzzleGanError {
	fn from(err: std::num::ParseFloatError) -> Self {
		PuzzleGanError::Parse(format!("Failed to parse float: {}", err))
	}
}

pub type Result<T> = std::result::Result<T, PuzzleGanError>;
