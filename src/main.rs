extern crate puzzle_gan;

use puzzle_gan::{cli, commands, logging};
use tracing::error;

fn main() {
	let app_m = cli::build_cli();
	let (name, sub_m) = app_m.subcommand();

	let verbosity = app_m
		.occurrences_of("VERBOSE")
		.max(sub_m.map(|m| m.occurrences_of("VERBOSE")).unwrap_or(0));
	let mut log_config = logging::LogConfig::from_verbosity(verbosity + 1);
	if let Some(format) = sub_m
		.and_then(|m| m.value_of("LOG_FORMAT"))
		.or_else(|| app_m.value_of("LOG_FORMAT"))
		.and_then(logging::LogFormat::from_str)
	{
		log_config.format = format;
	}
	if let Err(err) = logging::init_logging(log_config) {
		eprintln!("Failed to initialise logging: {}", err);
	}

	let result = match (name, sub_m) {
		("summary", Some(sub_m)) => commands::summary(sub_m),
		("generate", Some(sub_m)) => commands::generate(sub_m),
		("score", Some(sub_m)) => commands::score(sub_m),
		("generate-config", Some(sub_m)) => commands::generate_config(sub_m),
		_ => {
			let _ = cli::build_app().print_help();
			println!();
			Ok(())
		}
	};

	if let Err(err) = result {
		error!("Error: {}", err);
		eprintln!("Error: {}", err);
		std::process::exit(1);
	}
}
