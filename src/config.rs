use crate::constants::network;
use crate::error::{ConfigError, PuzzleGanError, Result};
use std::fmt;

/// Graph topology used to wire the resolution stages together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Structure {
	/// Every stage is built and blended; the graph does not depend on the LOD value.
	Linear,
	/// Only the stages selected by the current LOD value are built.
	Recursive,
}

impl Structure {
	pub fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"linear" => Ok(Structure::Linear),
			"recursive" => Ok(Structure::Recursive),
			_ => Err(ConfigError::InvalidParameter(format!("Unknown structure: {}", s)).into()),
		}
	}
}

impl fmt::Display for Structure {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Structure::Linear => write!(f, "linear"),
			Structure::Recursive => write!(f, "recursive"),
		}
	}
}

/// Data type of activations and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
	Float32,
	Float16,
}

impl DType {
	pub fn from_str(s: &str) -> Result<Self> {
		match s.to_lowercase().as_str() {
			"float32" | "f32" => Ok(DType::Float32),
			"float16" | "f16" => Ok(DType::Float16),
			_ => Err(ConfigError::InvalidParameter(format!("Unknown dtype: {}", s)).into()),
		}
	}
}

impl fmt::Display for DType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			DType::Float32 => write!(f, "float32"),
			DType::Float16 => write!(f, "float16"),
		}
	}
}

/// Immutable configuration shared by the generator and the discriminator.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
	pub resolution: usize,
	pub num_channels: usize,
	pub label_size: usize,
	pub firstblock_res: usize,
	pub fmap_base: usize,
	pub fmap_decay: f32,
	pub fmap_max: usize,
	/// `None` selects `nf(0)`.
	pub latent_size: Option<usize>,
	pub latent_sizes: Vec<usize>,
	pub mode: Option<String>,
	pub normalize_latents: bool,
	pub use_wscale: bool,
	pub use_pixelnorm: bool,
	pub pixelnorm_epsilon: f32,
	pub use_leakyrelu: bool,
	pub dtype: DType,
	pub fused_scale: bool,
	/// `None` selects linear for template graphs and recursive otherwise.
	pub structure: Option<Structure>,
	pub is_template_graph: bool,
	/// Group size of the minibatch stddev layer, 0 or 1 disables it.
	pub mbstd_group_size: usize,
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			resolution: network::DEFAULT_RESOLUTION,
			num_channels: network::DEFAULT_NUM_CHANNELS,
			label_size: network::DEFAULT_LABEL_SIZE,
			firstblock_res: network::DEFAULT_FIRSTBLOCK_RES,
			fmap_base: network::DEFAULT_FMAP_BASE,
			fmap_decay: network::DEFAULT_FMAP_DECAY,
			fmap_max: network::DEFAULT_FMAP_MAX,
			latent_size: None,
			latent_sizes: network::DEFAULT_LATENT_SIZES.to_vec(),
			mode: None,
			normalize_latents: true,
			use_wscale: true,
			use_pixelnorm: true,
			pixelnorm_epsilon: network::DEFAULT_PIXELNORM_EPSILON,
			use_leakyrelu: true,
			dtype: DType::Float32,
			fused_scale: true,
			structure: None,
			is_template_graph: false,
			mbstd_group_size: network::DEFAULT_MBSTD_GROUP_SIZE,
		}
	}
}

impl NetworkConfig {
	pub fn builder() -> NetworkConfigBuilder {
		NetworkConfigBuilder::default()
	}

	/// Feature map count at `stage`: `min(floor(fmap_base / 2^(stage * fmap_decay)), fmap_max)`.
	pub fn nf(&self, stage: usize) -> usize {
		let scaled = self.fmap_base as f64 / 2f64.powf(stage as f64 * self.fmap_decay as f64);
		(scaled.floor() as usize).min(self.fmap_max)
	}

	pub fn resolution_log2(&self) -> usize {
		log2_exact(self.resolution).unwrap_or(0)
	}

	pub fn firstblock_log2(&self) -> usize {
		log2_exact(self.firstblock_res).unwrap_or(0)
	}

	/// Largest meaningful LOD value, `resolution_log2 - firstblock_log2`.
	pub fn max_lod(&self) -> usize {
		self.resolution_log2().saturating_sub(self.firstblock_log2())
	}

	pub fn latent_size(&self) -> usize {
		self.latent_size.unwrap_or_else(|| self.nf(0))
	}

	pub fn structure(&self) -> Structure {
		match self.structure {
			Some(structure) => structure,
			None if self.is_template_graph => Structure::Linear,
			None => Structure::Recursive,
		}
	}

	pub fn validate(&self) -> Result<()> {
		match log2_exact(self.resolution) {
			Some(_) if self.resolution >= network::MIN_RESOLUTION => {}
			_ => return Err(ConfigError::InvalidResolution(self.resolution).into()),
		}
		let first_ok = log2_exact(self.firstblock_res).is_some()
			&& self.firstblock_res >= network::MIN_RESOLUTION
			&& self.firstblock_res <= self.resolution;
		if !first_ok {
			return Err(ConfigError::InvalidFirstBlock {
				first: self.firstblock_res,
				resolution: self.resolution,
			}
			.into());
		}
		if self.num_channels == 0 {
			return Err(invalid("Number of channels must be greater than 0"));
		}
		if self.fmap_max == 0 || self.fmap_base == 0 {
			return Err(invalid("fmap_base and fmap_max must be greater than 0"));
		}
		if !(self.fmap_decay >= 0.0) {
			return Err(invalid(format!("fmap_decay ({}) must be non-negative", self.fmap_decay)));
		}
		if let Some(stage) = (0..=self.resolution_log2()).find(|&stage| self.nf(stage) == 0) {
			return Err(invalid(format!(
				"fmap schedule yields zero feature maps at stage {}",
				stage
			)));
		}
		if !(self.pixelnorm_epsilon > 0.0) {
			return Err(invalid("Pixel norm epsilon must be greater than 0"));
		}
		Ok(())
	}
}

fn invalid<S: Into<String>>(msg: S) -> PuzzleGanError {
	ConfigError::InvalidParameter(msg.into()).into()
}

/// Returns `log2(value)` when `value` is a power of two.
pub fn log2_exact(value: usize) -> Option<usize> {
	if value.is_power_of_two() {
		Some(value.trailing_zeros() as usize)
	} else {
		None
	}
}

#[derive(Default)]
pub struct NetworkConfigBuilder {
	resolution: Option<usize>,
	num_channels: Option<usize>,
	label_size: Option<usize>,
	firstblock_res: Option<usize>,
	fmap_base: Option<usize>,
	fmap_decay: Option<f32>,
	fmap_max: Option<usize>,
	latent_size: Option<usize>,
	latent_sizes: Option<Vec<usize>>,
	mode: Option<String>,
	normalize_latents: Option<bool>,
	use_wscale: Option<bool>,
	use_pixelnorm: Option<bool>,
	pixelnorm_epsilon: Option<f32>,
	use_leakyrelu: Option<bool>,
	dtype: Option<DType>,
	fused_scale: Option<bool>,
	structure: Option<Structure>,
	is_template_graph: Option<bool>,
	mbstd_group_size: Option<usize>,
}

impl NetworkConfigBuilder {
	pub fn resolution(mut self, resolution: usize) -> Self {
		self.resolution = Some(resolution);
		self
	}

	pub fn num_channels(mut self, num_channels: usize) -> Self {
		self.num_channels = Some(num_channels);
		self
	}

	pub fn label_size(mut self, label_size: usize) -> Self {
		self.label_size = Some(label_size);
		self
	}

	pub fn firstblock_res(mut self, firstblock_res: usize) -> Self {
		self.firstblock_res = Some(firstblock_res);
		self
	}

	pub fn fmap_base(mut self, fmap_base: usize) -> Self {
		self.fmap_base = Some(fmap_base);
		self
	}

	pub fn fmap_decay(mut self, fmap_decay: f32) -> Self {
		self.fmap_decay = Some(fmap_decay);
		self
	}

	pub fn fmap_max(mut self, fmap_max: usize) -> Self {
		self.fmap_max = Some(fmap_max);
		self
	}

	pub fn latent_size(mut self, latent_size: usize) -> Self {
		self.latent_size = Some(latent_size);
		self
	}

	pub fn latent_sizes(mut self, latent_sizes: Vec<usize>) -> Self {
		self.latent_sizes = Some(latent_sizes);
		self
	}

	pub fn mode<S: Into<String>>(mut self, mode: S) -> Self {
		self.mode = Some(mode.into());
		self
	}

	pub fn normalize_latents(mut self, normalize: bool) -> Self {
		self.normalize_latents = Some(normalize);
		self
	}

	pub fn use_wscale(mut self, use_wscale: bool) -> Self {
		self.use_wscale = Some(use_wscale);
		self
	}

	pub fn use_pixelnorm(mut self, use_pixelnorm: bool) -> Self {
		self.use_pixelnorm = Some(use_pixelnorm);
		self
	}

	pub fn pixelnorm_epsilon(mut self, epsilon: f32) -> Self {
		self.pixelnorm_epsilon = Some(epsilon);
		self
	}

	pub fn use_leakyrelu(mut self, use_leakyrelu: bool) -> Self {
		self.use_leakyrelu = Some(use_leakyrelu);
		self
	}

	pub fn dtype(mut self, dtype: DType) -> Self {
		self.dtype = Some(dtype);
		self
	}

	pub fn fused_scale(mut self, fused_scale: bool) -> Self {
		self.fused_scale = Some(fused_scale);
		self
	}

	pub fn structure(mut self, structure: Structure) -> Self {
		self.structure = Some(structure);
		self
	}

	pub fn is_template_graph(mut self, is_template_graph: bool) -> Self {
		self.is_template_graph = Some(is_template_graph);
		self
	}

	pub fn mbstd_group_size(mut self, group_size: usize) -> Self {
		self.mbstd_group_size = Some(group_size);
		self
	}

	pub fn build(self) -> NetworkConfig {
		let defaults = NetworkConfig::default();
		NetworkConfig {
			resolution: self.resolution.unwrap_or(defaults.resolution),
			num_channels: self.num_channels.unwrap_or(defaults.num_channels),
			label_size: self.label_size.unwrap_or(defaults.label_size),
			firstblock_res: self.firstblock_res.unwrap_or(defaults.firstblock_res),
			fmap_base: self.fmap_base.unwrap_or(defaults.fmap_base),
			fmap_decay: self.fmap_decay.unwrap_or(defaults.fmap_decay),
			fmap_max: self.fmap_max.unwrap_or(defaults.fmap_max),
			latent_size: self.latent_size.or(defaults.latent_size),
			latent_sizes: self.latent_sizes.unwrap_or(defaults.latent_sizes),
			mode: self.mode.or(defaults.mode),
			normalize_latents: self.normalize_latents.unwrap_or(defaults.normalize_latents),
			use_wscale: self.use_wscale.unwrap_or(defaults.use_wscale),
			use_pixelnorm: self.use_pixelnorm.unwrap_or(defaults.use_pixelnorm),
			pixelnorm_epsilon: self.pixelnorm_epsilon.unwrap_or(defaults.pixelnorm_epsilon),
			use_leakyrelu: self.use_leakyrelu.unwrap_or(defaults.use_leakyrelu),
			dtype: self.dtype.unwrap_or(defaults.dtype),
			fused_scale: self.fused_scale.unwrap_or(defaults.fused_scale),
			structure: self.structure.or(defaults.structure),
			is_template_graph: self.is_template_graph.unwrap_or(defaults.is_template_graph),
			mbstd_group_size: self.mbstd_group_size.unwrap_or(defaults.mbstd_group_size),
		}
	}
}
