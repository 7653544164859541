use std::fs;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use petri::{
	instruments::InteractionMatrix,
	prelude::*,
	record::CsvRecorder,
	worlds::{Bits, BitsetParams, BitsetWorld},
};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Run a directed evolution experiment over bitset worlds
	Run {
		/// Config filename (TOML). Defaults are used if unset.
		#[arg(short = 'F', long = "config")]
		config: Option<String>,

		/// Seed for the experiment
		#[arg(short = 's', long = "seed")]
		seed: Option<u64>,

		/// Number of populations
		#[arg(short = 'n', long = "pops")]
		num_pops: Option<usize>,

		/// Number of epochs
		#[arg(short = 'e', long = "epochs")]
		epochs: Option<usize>,

		/// Output directory
		#[arg(short, long)]
		outdir: Option<String>,
	},
	/// Check a config file without running it
	Validate {
		#[arg(short = 'F', long = "config")]
		config: String,
	},
}

/// Everything a run reads from its config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RunConfig {
	#[serde(flatten)]
	pub experiment: ExperimentConfig,
	#[serde(default)]
	pub world: BitsetParams,
}

impl RunConfig {
	fn load(filename: &str) -> eyre::Result<Self> {
		let contents = fs::read_to_string(filename)
			.wrap_err_with(|| format!("failed to read config {filename}"))?;
		let config = toml::from_str(&contents)
			.wrap_err_with(|| format!("failed to parse config {filename}"))?;
		Ok(config)
	}

	fn validate(&self) -> eyre::Result<()> {
		self.experiment.validate()?;
		self.world.validate()?;
		Ok(())
	}
}

impl Default for RunConfig {
	fn default() -> Self {
		Self {
			experiment: ExperimentConfig::builder().build(),
			world: BitsetParams::default(),
		}
	}
}

fn run(config: RunConfig) -> eyre::Result<()> {
	config.validate()?;
	let ancestor = config.world.load_ancestor()?;
	let RunConfig { experiment, world } = config;
	let output = experiment.output.clone();
	let instruments = experiment.instruments.clone();
	let steps = experiment.steps_per_epoch;

	let mut exper = Experiment::<BitsetWorld>::new(experiment)?;
	exper.register_recorder(Box::new(CsvRecorder::new(&output)));
	if !instruments.interaction_epochs.is_empty() {
		exper.register_instrument(Box::new(InteractionMatrix::<Bits>::new(
			&output.dir,
			instruments.interaction_epochs.iter().copied(),
			instruments.interaction_steps.unwrap_or(steps),
		)));
	}

	fs::create_dir_all(&output.dir)?;
	fs::write(
		std::path::Path::new(&output.dir).join("world.toml"),
		toml::to_string_pretty(&world)?,
	)?;

	let summary = exper.run(
		|seed| BitsetWorld::new(world.clone(), seed),
		|_, pop| ancestor.clone().unwrap_or_else(|| pop.ancestor()),
	)?;
	log::info!(
		"Finished after {} epochs in {:.3} secs; results in {}.",
		summary.epochs_completed,
		summary.total_time,
		output.dir
	);
	Ok(())
}

fn main() -> eyre::Result<()> {
	pretty_env_logger::init();

	let cli = Cli::parse();

	match cli.command {
		Command::Run {
			config,
			seed,
			num_pops,
			epochs,
			outdir,
		} => {
			let mut config = match config {
				Some(filename) => RunConfig::load(&filename)?,
				None => RunConfig::default(),
			};
			let exp = &mut config.experiment;
			if seed.is_some() {
				exp.seed = seed;
			}
			if let Some(n) = num_pops {
				exp.num_pops = n;
			}
			if let Some(e) = epochs {
				exp.epochs = e;
			}
			if let Some(dir) = outdir {
				exp.output.dir = dir;
			}
			run(config)
		}
		Command::Validate { config } => {
			let config = RunConfig::load(&config)?;
			config.validate()?;
			log::info!("{config:#?}");
			println!("Config is valid.");
			Ok(())
		}
	}
}
