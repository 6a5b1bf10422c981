use crate::config::{DType, NetworkConfig, Structure};
use crate::constants::{network, store};
use crate::error::{PuzzleGanError, Result};
use std::fs;
use std::path::Path;

/// Network, puzzle and runtime settings that can be loaded from a TOML or JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PuzzleGanConfigFile {
    /// Network architecture configuration
    #[serde(default)]
    pub network: NetworkConfigSection,

    /// Latent partition and puzzle layout
    #[serde(default)]
    pub puzzle: PuzzleConfigSection,

    /// Evaluation settings used by the CLI
    #[serde(default)]
    pub runtime: RuntimeConfigSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfigSection {
    /// Output resolution, a power of two (default: 32)
    pub resolution: usize,

    /// Image channels (default: 1)
    pub num_channels: usize,

    /// Label width, 0 for unconditional networks (default: 0)
    pub label_size: usize,

    /// Resolution of the puzzle seed map (default: 8)
    pub firstblock_res: usize,

    pub fmap_base: usize,
    pub fmap_decay: f32,
    pub fmap_max: usize,

    pub normalize_latents: bool,
    pub use_wscale: bool,
    pub use_pixelnorm: bool,
    pub pixelnorm_epsilon: f32,

    /// Leaky ReLU in the generator, plain ReLU otherwise (default: true)
    pub use_leakyrelu: bool,

    /// "float32" or "float16" (default: "float32")
    pub dtype: String,

    pub fused_scale: bool,

    /// "linear" or "recursive", unset selects automatically
    pub structure: Option<String>,

    pub is_template_graph: bool,

    /// Minibatch stddev group size, 0 disables the layer (default: 4)
    pub mbstd_group_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PuzzleConfigSection {
    /// Puzzle mode, e.g. "2parts-faces"
    pub mode: Option<String>,

    /// Total latent width, unset selects nf(0)
    pub latent_size: Option<usize>,

    /// Sizes of the latent chunks, in order
    pub latent_sizes: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfigSection {
    /// Level of detail used for evaluation (default: 0.0)
    pub lod: f32,

    /// Seed of latents and noise (default: 0)
    pub seed: u64,

    /// Samples per evaluation (default: 4)
    pub batch_size: usize,

    /// Seed of freshly initialised parameters
    pub param_seed: u64,

    /// Stored parameter file (optional)
    pub parameter_file: Option<String>,

    /// Zero the low 12 mantissa bits of every parameter when saving (default: false)
    pub quantise: bool,
}

impl Default for NetworkConfigSection {
    fn default() -> Self {
        let config = NetworkConfig::default();
        Self {
            resolution: config.resolution,
            num_channels: config.num_channels,
            label_size: config.label_size,
            firstblock_res: config.firstblock_res,
            fmap_base: config.fmap_base,
            fmap_decay: config.fmap_decay,
            fmap_max: config.fmap_max,
            normalize_latents: config.normalize_latents,
            use_wscale: config.use_wscale,
            use_pixelnorm: config.use_pixelnorm,
            pixelnorm_epsilon: config.pixelnorm_epsilon,
            use_leakyrelu: config.use_leakyrelu,
            dtype: config.dtype.to_string(),
            fused_scale: config.fused_scale,
            structure: None,
            is_template_graph: config.is_template_graph,
            mbstd_group_size: config.mbstd_group_size,
        }
    }
}

impl Default for PuzzleConfigSection {
    fn default() -> Self {
        Self {
            mode: None,
            latent_size: None,
            latent_sizes: network::DEFAULT_LATENT_SIZES.to_vec(),
        }
    }
}

impl Default for RuntimeConfigSection {
    fn default() -> Self {
        Self {
            lod: 0.0,
            seed: 0,
            batch_size: 4,
            param_seed: store::DEFAULT_SEED,
            parameter_file: None,
            quantise: false,
        }
    }
}

impl PuzzleGanConfigFile {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        toml::from_str(&contents)
            .map_err(|e| PuzzleGanError::Parse(format!("Failed to parse TOML config: {}", e)))
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;

        serde_json::from_str(&contents)
            .map_err(|e| PuzzleGanError::Parse(format!("Failed to parse JSON config: {}", e)))
    }

    /// Load a `.json` file as JSON and anything else as TOML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let is_json = path
            .as_ref()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_file(path)
        } else {
            Self::from_toml_file(path)
        }
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PuzzleGanError::Serialization(format!("Failed to serialize to TOML: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| PuzzleGanError::Serialization(format!("Failed to serialize to JSON: {}", e)))?;

        fs::write(path, contents)?;
        Ok(())
    }

    /// Convert to a validated NetworkConfig
    pub fn to_network_config(&self) -> Result<NetworkConfig> {
        let net = &self.network;
        let structure = match &net.structure {
            Some(s) => Some(Structure::from_str(s)?),
            None => None,
        };

        let config = NetworkConfig {
            resolution: net.resolution,
            num_channels: net.num_channels,
            label_size: net.label_size,
            firstblock_res: net.firstblock_res,
            fmap_base: net.fmap_base,
            fmap_decay: net.fmap_decay,
            fmap_max: net.fmap_max,
            latent_size: self.puzzle.latent_size,
            latent_sizes: self.puzzle.latent_sizes.clone(),
            mode: self.puzzle.mode.clone(),
            normalize_latents: net.normalize_latents,
            use_wscale: net.use_wscale,
            use_pixelnorm: net.use_pixelnorm,
            pixelnorm_epsilon: net.pixelnorm_epsilon,
            use_leakyrelu: net.use_leakyrelu,
            dtype: DType::from_str(&net.dtype)?,
            fused_scale: net.fused_scale,
            structure,
            is_template_graph: net.is_template_graph,
            mbstd_group_size: net.mbstd_group_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Generate a default configuration file
    pub fn generate_default() -> Self {
        Self::default()
    }

    /// Create an example configuration file with comments
    pub fn create_example_toml() -> String {
        r#"# Puzzle GAN configuration file

[network]
# Output resolution, a power of two >= 4
resolution = 32

# Image channels: 1 for grayscale, 3 for RGB
num_channels = 1

# Label width, 0 for unconditional networks
label_size = 0

# Resolution of the seed feature map assembled from the puzzle tiles
firstblock_res = 8

# Feature maps at stage s: min(fmap_base / 2^(s * fmap_decay), fmap_max)
fmap_base = 8192
fmap_decay = 1.0
fmap_max = 512

normalize_latents = true

# Equalized learning rate
use_wscale = true

use_pixelnorm = true
pixelnorm_epsilon = 1e-8

# Leaky ReLU (true) or ReLU (false) in the generator
use_leakyrelu = true

# "float32" or "float16"
dtype = "float32"

# Fused upscale/downscale convolutions
fused_scale = true

# "linear" or "recursive", leave unset to select automatically
# structure = "recursive"

is_template_graph = false

# Minibatch stddev group size, 0 disables the layer
mbstd_group_size = 4

[puzzle]
# One of: 2parts-faces, 5parts-faces, 2parts-bedrooms, 4parts-digits
mode = "2parts-bedrooms"

# Latent chunk sizes, one per puzzle part, summing to latent_size
latent_size = 512
latent_sizes = [256, 256]

[runtime]
# Level of detail: 0 = full resolution, each step halves it
lod = 0.0

# Seed of latents and noise
seed = 0

# Samples per evaluation
batch_size = 4

# Seed of freshly initialised parameters
param_seed = 1592594996

# Stored parameter file (optional)
# parameter_file = "./puzzle.pgp"

# Quantise parameters to f16 when saving
quantise = false
"#.to_string()
    }
}
