//! Directed Evolution Types

use serde::Serialize;

use crate::{
	controller::EpochReport,
	error::Result,
	experiment::RunSummary,
	params::ExperimentConfig,
	phylogeny::{AncestryRecord, Lineage, Position},
};

/// An independently simulated population ("world") that the epoch controller can orchestrate.
/// Everything about how it evolves internally is up to the implementation; the controller only
/// relies on these capabilities.
pub trait Population: Send {
	type Genome: Clone + Send;

	/// Number of slots an individual can occupy.
	fn capacity(&self) -> usize;

	/// Whether an individual lives at `slot`.
	fn is_occupied(&self, slot: usize) -> bool;

	/// Genome of the individual at `slot`, if any.
	fn genome(&self, slot: usize) -> Option<&Self::Genome>;

	/// Called before each epoch's advancement.
	fn set_epoch(&mut self, _epoch: usize) {}

	/// Runs the population forward `steps` internal steps. When the ancestry is tracked, every
	/// birth and death must be reported through `lineage`.
	fn advance(&mut self, steps: usize, lineage: Option<&mut Lineage<'_>>) -> Result<()>;

	/// Refreshes cached scores. Called once per epoch, before any score is read.
	fn evaluate(&mut self) {}

	fn aggregate_score(&self) -> f64;

	/// Per-objective scores. Every population of an experiment reports the same number.
	fn objective_scores(&self) -> Vec<f64>;

	/// An extinct population can't be the source of a propagule.
	fn is_extinct(&self) -> bool;

	/// Clears every individual, keeping the population's identity and random stream.
	fn reset(&mut self);

	/// Places `genome` at `slot`. When the ancestry is tracked, `parent` is the transfer identity
	/// it descends from (the controller records the node itself).
	fn inject_at(&mut self, genome: Self::Genome, slot: usize, parent: Option<Position>);

	/// Called once after every injection of a reseed, so internal schedulers can rebalance.
	fn resync_after_seeding(&mut self);

	/// Snapshot of the population's current state, taken between steps when per-update world
	/// summaries are collected. Populations without one are skipped.
	fn world_summary(&self) -> Option<WorldSummary> {
		None
	}
}

/// State of one population at one update inside an epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldSummary {
	pub num_organisms: usize,
	/// Population-defined mean trait value, e.g. the mean number of set bits.
	pub mean_trait: f64,
	/// Objective scores as they stand at this update.
	pub objectives: Vec<f64>,
}

/// Identifies a population at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopulationSeed {
	pub index: usize,
	pub seed: u64,
}

/// Populations that can replay themselves with a chosen subset of genomes, for the
/// interaction matrix instrument.
pub trait Counterfactual: Population {
	/// Runs a fresh copy for `steps` steps, seeded with one individual per given genome but
	/// leaving out `removed` (an index into `genomes`) if set, and returns each genome's fitness
	/// in that copy. The result has one entry per element of `genomes`; the removed one is
	/// ignored.
	fn counterfactual_fitness(
		&self,
		genomes: &[Self::Genome],
		removed: Option<usize>,
		steps: usize,
	) -> Vec<f64>;
}

/// Aggregates any results from the run. Define hooks to record data.
pub trait Recorder {
	/// Called once, after the populations are seeded and before the first epoch.
	fn initialize(&mut self, _config: &ExperimentConfig, _seed: u64) -> eyre::Result<()> {
		Ok(())
	}

	/// Called once per epoch, after selection (or after evaluation if every population is
	/// extinct). `ancestry` is the shared record at that moment, if tracked.
	fn record_epoch(
		&mut self,
		report: &EpochReport,
		ancestry: Option<&AncestryRecord>,
		is_final: bool,
	) -> eyre::Result<()>;

	/// Called when the run ends, successfully or not. Anything buffered should be flushed here.
	fn finalize(&mut self, _summary: &RunSummary) -> eyre::Result<()> {
		Ok(())
	}
}

/// Post-evaluation instrumentation: sees every population after scoring and before transfer.
pub trait Instrument<P: Population> {
	fn after_evaluation(&mut self, epoch: usize, populations: &[P]) -> eyre::Result<()>;

	/// Called when the run ends. Anything buffered should be flushed here.
	fn finalize(&mut self) -> eyre::Result<()> {
		Ok(())
	}
}
