use super::{load_settings, load_store, save_store};
use crate::error::Result;
use crate::logging::OperationLogger;
use crate::network::{random_latents, Network};
use clap::ArgMatches;
use tracing::info;

/// Generates a batch and prints one discriminator score per sample.
pub fn score(app_m: &ArgMatches) -> Result<()> {
	let mut op = OperationLogger::new("score");
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
	let runtime = &settings.runtime;
	let store = load_store(runtime)?;
	op.add_metadata("count", runtime.batch_size);
	op.add_metadata("lod", runtime.lod);

	let mut generator = Network::generator(settings.network.clone(), store)?;
	generator.lod().set(runtime.lod);
	let latents = random_latents(&settings.network, runtime.batch_size, runtime.seed);
	let images = generator.forward(latents, runtime.seed)?;

	let mut discriminator = Network::discriminator(settings.network.clone(), generator.into_store())?;
	discriminator.lod().set(runtime.lod);
	let scores = discriminator.forward(images, runtime.seed)?;
	op.log_progress("samples scored");

	for (n, score) in scores.iter().enumerate() {
		println!("{:>4}  {:+.6}", n, score);
	}
	let mean = scores.mean().unwrap_or(0.0);
	info!("Mean score over {} samples: {}", scores.len(), mean);

	save_store(app_m, discriminator.store(), runtime.quantise)?;
	Ok(())
}
