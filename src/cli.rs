use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};

pub fn build_cli() -> ArgMatches<'static> {
	build_app().get_matches()
}

pub fn build_app() -> App<'static, 'static> {
	App::new("Puzzle GAN")
		.version("v0.1.0")
		.author("ktheindifferent")
		.about("Builds and evaluates progressive puzzle GAN generator and discriminator graphs")
		.settings(&[
			AppSettings::SubcommandRequiredElseHelp,
			AppSettings::VersionlessSubcommands,
		])
		.arg(build_verbose_arg())
		.arg(build_log_format_arg())
		.subcommand(build_summary_subcommand())
		.subcommand(build_generate_subcommand())
		.subcommand(build_score_subcommand())
		.subcommand(build_generate_config_subcommand())
}

fn build_verbose_arg() -> Arg<'static, 'static> {
	Arg::with_name("VERBOSE")
		.short("v")
		.long("verbose")
		.multiple(true)
		.global(true)
		.help("Increases log output, repeat for more detail")
}

fn build_log_format_arg() -> Arg<'static, 'static> {
	Arg::with_name("LOG_FORMAT")
		.long("log-format")
		.value_name("FORMAT")
		.possible_values(&["compact", "pretty", "json"])
		.global(true)
		.help("Log output format. Default: compact")
		.empty_values(false)
}

fn build_config_arg() -> Arg<'static, 'static> {
	Arg::with_name("CONFIG_FILE")
		.required(true)
		.index(1)
		.help("Configuration file (.toml or .json)")
}

fn build_params_arg() -> Arg<'static, 'static> {
	Arg::with_name("PARAMETER_FILE")
		.short("p")
		.long("params")
		.value_name("PARAMETER_FILE")
		.help("Loads network parameters from this file (.pgp) instead of initialising them")
		.empty_values(false)
}

fn build_save_params_arg() -> Arg<'static, 'static> {
	Arg::with_name("SAVE_PARAMETERS")
		.long("save-params")
		.value_name("PARAMETER_FILE")
		.help("Writes the network parameters to this file (.pgp) after the command ran")
		.empty_values(false)
}

fn build_lod_arg() -> Arg<'static, 'static> {
	Arg::with_name("LOD")
		.long("lod")
		.value_name("LOD")
		.help("Level of detail, 0 = full resolution. Overrides the configuration file")
		.allow_hyphen_values(true)
		.empty_values(false)
}

fn build_seed_arg() -> Arg<'static, 'static> {
	Arg::with_name("SEED")
		.short("s")
		.long("seed")
		.value_name("SEED")
		.help("Seed of the latent vectors and noise. Overrides the configuration file")
		.empty_values(false)
}

fn build_count_arg() -> Arg<'static, 'static> {
	Arg::with_name("COUNT")
		.short("n")
		.long("count")
		.value_name("COUNT")
		.help("Number of samples. Overrides the configuration file batch size")
		.empty_values(false)
}

fn build_summary_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("summary")
		.about("Builds both networks and prints their stages, node counts and parameter counts")
		.arg(build_config_arg())
		.arg(build_params_arg())
		.arg(build_save_params_arg())
		.arg(
			Arg::with_name("PRINT_GRAPH")
				.long("print-graph")
				.help("Prints every node of the linear generator graph"),
		)
}

fn build_generate_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("generate")
		.about("Generates a grid of images from random latent vectors")
		.arg(build_config_arg())
		.arg(
			Arg::with_name("OUTPUT_FILE")
				.required(true)
				.index(2)
				.help("Image grid to write/overwrite (.png recommended)"),
		)
		.arg(build_params_arg())
		.arg(build_save_params_arg())
		.arg(build_lod_arg())
		.arg(build_seed_arg())
		.arg(build_count_arg())
}

fn build_score_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("score")
		.about("Scores generated samples with the discriminator")
		.arg(build_config_arg())
		.arg(build_params_arg())
		.arg(build_save_params_arg())
		.arg(build_lod_arg())
		.arg(build_seed_arg())
		.arg(build_count_arg())
}

fn build_generate_config_subcommand() -> App<'static, 'static> {
	SubCommand::with_name("generate-config")
		.about("Writes a default configuration file")
		.arg(
			Arg::with_name("OUTPUT_FILE")
				.index(1)
				.help("Configuration file to write. Default: puzzle_gan.toml"),
		)
		.arg(
			Arg::with_name("FORMAT")
				.short("f")
				.long("format")
				.value_name("FORMAT")
				.possible_values(&["toml", "json"])
				.help("File format. Default: toml"),
		)
		.arg(
			Arg::with_name("EXAMPLE")
				.short("e")
				.long("example")
				.help("Writes a commented example instead of the bare defaults (TOML only)"),
		)
		.arg(
			Arg::with_name("FORCE")
				.long("force")
				.help("Overwrites an existing file"),
		)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn generate_accepts_overrides() {
		let m = build_app()
			.get_matches_from_safe(vec![
				"puzzle-gan", "-vv", "generate", "cfg.toml", "out.png", "--lod", "-0.5", "--seed", "3", "-n", "9",
			])
			.unwrap();
		assert_eq!(m.occurrences_of("VERBOSE"), 2);
		let (name, sub) = m.subcommand();
		let sub = sub.unwrap();
		assert_eq!(name, "generate");
		assert_eq!(sub.value_of("LOD"), Some("-0.5"));
		assert_eq!(sub.value_of("COUNT"), Some("9"));
	}

	#[test]
	fn subcommand_is_required() {
		assert!(build_app().get_matches_from_safe(vec!["puzzle-gan"]).is_err());
	}
}
