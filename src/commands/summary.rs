use super::{load_settings, load_store, save_store};
use crate::error::Result;
use crate::logging::OperationLogger;
use crate::network::{self, Topology};
use crate::params::ParamStore;
use crate::progressive;
use crate::puzzle;
use clap::ArgMatches;

pub fn summary(app_m: &ArgMatches) -> Result<()> {
	let mut op = OperationLogger::new("summary");
	match run(app_m, &mut op) {
		Ok(()) => {
			op.complete();
			Ok(())
		}
		Err(err) => {
			op.log_error(&err);
			Err(err)
		}
	}
}

fn run(app_m: &ArgMatches, op: &mut OperationLogger) -> Result<()> {
	let settings = load_settings(app_m)?;
	let config = &settings.network;
	let mut store = load_store(&settings.runtime)?;

	let layout = puzzle::resolve(config)?;
	let generator = network::build_generator(config, &mut store, &Topology::Linear)?;
	let discriminator = network::build_discriminator(config, &mut store, &Topology::Linear)?;
	op.add_metadata("generator_nodes", generator.len());
	op.add_metadata("discriminator_nodes", discriminator.len());
	op.log_progress("graphs built");

	println!("Resolution:  {0}x{0} ({1} channels)", config.resolution, config.num_channels);
	println!("Structure:   {}", config.structure());
	println!("Puzzle mode: {} ({} parts, seed {}x{})", layout.mode, layout.chunks, layout.seed_size, layout.seed_size);
	println!("Latents:     {} = {:?}", config.latent_size(), config.latent_sizes);
	println!("Stages:");
	for res in progressive::stages(config) {
		println!("  {0:>4}x{0:<4} lod {1}  nf {2}", 1usize << res, config.resolution_log2() - res, config.nf(res - 1));
	}
	println!(
		"Generator:     {} nodes, {} variables",
		generator.len(),
		generator.param_keys().len()
	);
	println!(
		"Discriminator: {} nodes, {} variables",
		discriminator.len(),
		discriminator.param_keys().len()
	);
	println!("Parameters:    {} variables, {} trainable values", store.len(), store.trainable_count());
	println!("Digest:        {}", store.digest());

	if app_m.is_present("PRINT_GRAPH") {
		print!("{}", generator);
	}

	save_store(app_m, &store, settings.runtime.quantise)?;
	Ok(())
}
