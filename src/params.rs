//! Experiment parameters. Loaded from TOML, built in code, and validated before a run.

use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::{
	error::ConfigError,
	propagule::SamplePolicy,
	selection::SelectionScheme,
};

pub fn default_output_dir() -> String {
	String::from("output")
}

fn one() -> usize {
	1
}

fn default_tournament_size() -> usize {
	4
}

fn default_selection_method() -> String {
	String::from("elite")
}

fn default_sampling_method() -> String {
	String::from("random")
}

fn default_epochs() -> usize {
	100
}

fn default_steps() -> usize {
	100
}

/// Parameters for a full directed evolution run.
#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExperimentConfig {
	/// Seed for the experiment-level random stream. Drawn at random if unset.
	pub seed: Option<u64>,

	/// Number of populations. Must be > 0.
	#[builder(default = 1)]
	#[serde(default = "one")]
	pub num_pops: usize,

	/// Number of rounds of population-level selection.
	#[builder(default = default_epochs())]
	#[serde(default = "default_epochs")]
	pub epochs: usize,

	/// Internal steps each population runs per epoch. Must be > 0.
	#[builder(default = default_steps())]
	#[serde(default = "default_steps")]
	pub steps_per_epoch: usize,

	#[builder(default)]
	#[serde(default)]
	pub selection: SelectionParams,

	#[builder(default)]
	#[serde(default)]
	pub sampling: SamplingParams,

	/// Keep one ancestry record across every population and epoch.
	#[builder(default)]
	#[serde(default)]
	pub track_phylogeny: bool,

	/// Drop retired ancestry nodes once nothing descends from them.
	#[builder(default = true)]
	#[serde(default = "yes")]
	pub prune_phylogeny: bool,

	#[builder(default)]
	#[serde(default)]
	pub parallel: ParallelParams,

	#[builder(default)]
	#[serde(default)]
	pub output: OutputParams,

	#[builder(default)]
	#[serde(default)]
	pub instruments: InstrumentParams,
}

fn yes() -> bool {
	true
}

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SelectionParams {
	/// One of: elite, tournament, lexicase, non-dominated-elite, non-dominated-tournament, random, none
	#[builder(into, default = String::from("elite"))]
	#[serde(default = "default_selection_method")]
	pub method: String,
	#[builder(default = 1)]
	#[serde(default = "one")]
	pub elite_count: usize,
	#[builder(default = default_tournament_size())]
	#[serde(default = "default_tournament_size")]
	pub tournament_size: usize,
	#[builder(default)]
	#[serde(default)]
	pub lexicase_epsilon: f64,
}

impl Default for SelectionParams {
	fn default() -> Self {
		Self::builder().build()
	}
}

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SamplingParams {
	/// One of: random, full
	#[builder(into, default = String::from("random"))]
	#[serde(default = "default_sampling_method")]
	pub method: String,
	/// Genomes drawn per propagule (random sampling only).
	#[builder(default = 1)]
	#[serde(default = "one")]
	pub size: usize,
}

impl Default for SamplingParams {
	fn default() -> Self {
		Self::builder().build()
	}
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ParallelParams {
	#[serde(default)]
	pub enabled: bool,
	/// Worker threads; defaults to one per population.
	pub threads: Option<usize>,
}

/// How often the default recorder writes each output. The final epoch is always written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputParams {
	#[serde(default = "default_output_dir")]
	pub dir: String,
	#[serde(default = "one")]
	pub summary_epoch_resolution: usize,
	#[serde(default = "default_snapshot_resolution")]
	pub phylogeny_snapshot_resolution: usize,
	#[serde(default = "one")]
	pub ancestry_epoch_resolution: usize,
	/// Collect every population's world summary during each epoch (`world_summary.csv`).
	#[serde(default)]
	pub collect_update_summary: bool,
	/// Updates between world summaries. The last update of an epoch is always summarized.
	#[serde(default = "one")]
	pub summary_update_resolution: usize,
}

fn default_snapshot_resolution() -> usize {
	100
}

impl Default for OutputParams {
	fn default() -> Self {
		Self {
			dir: default_output_dir(),
			summary_epoch_resolution: 1,
			phylogeny_snapshot_resolution: default_snapshot_resolution(),
			ancestry_epoch_resolution: 1,
			collect_update_summary: false,
			summary_update_resolution: 1,
		}
	}
}

/// Optional post-evaluation instrumentation.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct InstrumentParams {
	/// Epochs on which to compute the interaction matrix of every population.
	#[serde(default)]
	pub interaction_epochs: Vec<usize>,
	/// Steps each counterfactual re-run lasts.
	#[serde(default)]
	pub interaction_steps: Option<usize>,
}

impl ExperimentConfig {
	/// Parses a TOML document into a config. Does not validate.
	pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
		toml::from_str(contents)
	}

	/// Checks every parameter and combination the controller relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.num_pops < 1 {
			return Err(ConfigError::NoPopulations);
		}
		if self.steps_per_epoch < 1 {
			return Err(ConfigError::NoSteps);
		}
		self.selection_scheme()?;
		self.sample_policy()?;
		if self.track_phylogeny && self.parallel.enabled {
			return Err(ConfigError::PhylogenyWithParallel);
		}
		if self.parallel.threads == Some(0) {
			return Err(ConfigError::ZeroParameter {
				name: "parallel.threads",
			});
		}
		let out = &self.output;
		for (name, value) in [
			("output.summary_epoch_resolution", out.summary_epoch_resolution),
			("output.phylogeny_snapshot_resolution", out.phylogeny_snapshot_resolution),
			("output.ancestry_epoch_resolution", out.ancestry_epoch_resolution),
			("output.summary_update_resolution", out.summary_update_resolution),
		] {
			if value < 1 {
				return Err(ConfigError::ZeroParameter { name });
			}
		}
		if self.instruments.interaction_steps == Some(0) {
			return Err(ConfigError::ZeroParameter {
				name: "instruments.interaction_steps",
			});
		}
		Ok(())
	}

	/// The configured selection scheme with its parameters checked.
	pub fn selection_scheme(&self) -> Result<SelectionScheme, ConfigError> {
		let sel = &self.selection;
		let method = SelectionMethod::from_str(&sel.method)?;
		let check = |name, value: usize| {
			if value < 1 {
				Err(ConfigError::ZeroParameter { name })
			} else {
				Ok(value)
			}
		};
		Ok(match method {
			SelectionMethod::Elite => SelectionScheme::Elite {
				count: check("selection.elite_count", sel.elite_count)?,
			},
			SelectionMethod::Tournament => SelectionScheme::Tournament {
				size: check("selection.tournament_size", sel.tournament_size)?,
			},
			SelectionMethod::Lexicase => {
				if !(sel.lexicase_epsilon >= 0.0) {
					return Err(ConfigError::BadEpsilon(sel.lexicase_epsilon));
				}
				SelectionScheme::Lexicase {
					epsilon: sel.lexicase_epsilon,
				}
			}
			SelectionMethod::NonDominatedElite => SelectionScheme::NonDominatedElite,
			SelectionMethod::NonDominatedTournament => SelectionScheme::NonDominatedTournament {
				size: check("selection.tournament_size", sel.tournament_size)?,
			},
			SelectionMethod::Random => SelectionScheme::Random,
			SelectionMethod::None => SelectionScheme::None,
		})
	}

	/// The configured propagule sampling policy with its parameters checked.
	pub fn sample_policy(&self) -> Result<SamplePolicy, ConfigError> {
		if self.sampling.size < 1 {
			return Err(ConfigError::ZeroParameter {
				name: "sampling.size",
			});
		}
		match &*self.sampling.method {
			"random" => Ok(SamplePolicy::Random {
				size: self.sampling.size,
			}),
			"full" => Ok(SamplePolicy::Full),
			other => Err(ConfigError::UnknownSampling(other.to_owned())),
		}
	}

	/// Updates within an epoch after which world summaries are taken, ending with the last
	/// one. Empty unless summaries are collected.
	pub fn summary_updates(&self) -> Vec<usize> {
		if !self.output.collect_update_summary {
			return Vec::new();
		}
		let steps = self.steps_per_epoch;
		let every = self.output.summary_update_resolution.max(1);
		let mut updates: Vec<usize> = (every..steps).step_by(every).collect();
		updates.push(steps);
		updates
	}

	/// Worker threads for parallel advancement.
	pub fn threads(&self) -> usize {
		self.parallel.threads.unwrap_or(self.num_pops)
	}
}

/// Names accepted for `selection.method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMethod {
	Elite,
	Tournament,
	Lexicase,
	NonDominatedElite,
	NonDominatedTournament,
	Random,
	None,
}

impl FromStr for SelectionMethod {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"elite" => Self::Elite,
			"tournament" => Self::Tournament,
			"lexicase" => Self::Lexicase,
			"non-dominated-elite" => Self::NonDominatedElite,
			"non-dominated-tournament" => Self::NonDominatedTournament,
			"random" => Self::Random,
			"none" => Self::None,
			other => return Err(ConfigError::UnknownSelection(other.to_owned())),
		})
	}
}
