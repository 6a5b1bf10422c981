pub mod generate;
pub mod generate_config;
pub mod score;
pub mod summary;

pub use self::generate::generate;
pub use self::generate_config::generate_config;
pub use self::score::score;
pub use self::summary::summary;

use crate::config::NetworkConfig;
use crate::config_file::{PuzzleGanConfigFile, RuntimeConfigSection};
use crate::error::{PuzzleGanError, Result};
use crate::params::MemoryParamStore;
use clap::ArgMatches;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Configuration of one CLI invocation after command line overrides.
pub struct Settings {
	pub network: NetworkConfig,
	pub runtime: RuntimeConfigSection,
}

pub fn load_settings(app_m: &ArgMatches) -> Result<Settings> {
	let config_path = app_m
		.value_of("CONFIG_FILE")
		.ok_or_else(|| PuzzleGanError::InvalidInput("No configuration file given".to_string()))?;
	let file = PuzzleGanConfigFile::from_file(config_path)?;
	info!("Loaded configuration from: {}", config_path);

	let network = file.to_network_config()?;
	let mut runtime = file.runtime;
	if let Some(lod) = app_m.value_of("LOD") {
		runtime.lod = lod.parse::<f32>()?;
	}
	if let Some(seed) = app_m.value_of("SEED") {
		runtime.seed = seed.parse::<u64>()?;
	}
	if let Some(count) = app_m.value_of("COUNT") {
		runtime.batch_size = count.parse::<usize>()?;
	}
	if let Some(params) = app_m.value_of("PARAMETER_FILE") {
		runtime.parameter_file = Some(params.to_string());
	}
	if runtime.batch_size == 0 {
		return Err(PuzzleGanError::InvalidInput("Sample count must be greater than 0".to_string()));
	}
	if !runtime.lod.is_finite() {
		return Err(PuzzleGanError::InvalidInput(format!("LOD {} is not finite", runtime.lod)));
	}
	Ok(Settings { network, runtime })
}

/// Reads the configured parameter file, or starts an empty store seeded with `param_seed`.
pub fn load_store(runtime: &RuntimeConfigSection) -> Result<MemoryParamStore> {
	match &runtime.parameter_file {
		Some(path) => {
			let mut file = File::open(Path::new(path))?;
			let mut data = Vec::new();
			file.read_to_end(&mut data)?;
			let store = MemoryParamStore::from_bytes(&data)?;
			info!("Loaded {} variables from: {}", store.keys().count(), path);
			Ok(store)
		}
		None => Ok(MemoryParamStore::new(runtime.param_seed)),
	}
}

/// Writes the store when `--save-params` was given.
pub fn save_store(app_m: &ArgMatches, store: &MemoryParamStore, quantise: bool) -> Result<()> {
	if let Some(path) = app_m.value_of("SAVE_PARAMETERS") {
		let data = store.to_bytes(quantise)?;
		let mut file = File::create(Path::new(path))?;
		file.write_all(&data)?;
		info!("Saved {} variables to: {}", store.keys().count(), path);
	}
	Ok(())
}
