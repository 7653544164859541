//! Directed evolution over a pool of independently simulated populations.
//!
//! Each epoch every population runs for a fixed number of steps, gets scored, and a selection
//! scheme picks which populations seed the next epoch. Selected populations contribute a small
//! propagule of individuals to each reset population. An optional ancestry record follows every
//! individual across populations and epochs.

pub mod controller;
pub mod error;
pub mod experiment;
pub mod genetic;
pub mod instruments;
pub mod params;
pub mod phylogeny;
pub mod propagule;
pub mod record;
pub mod scores;
pub mod selection;
pub mod worlds;

pub use crate::error::{ConfigError, Error, Result};

pub mod prelude {
	pub use crate::{
		controller::{EpochController, EpochReport, Phase, Termination, WorldUpdate},
		experiment::{Experiment, RunSummary},
		genetic::{
			Counterfactual, Instrument, Population, PopulationSeed, Recorder, WorldSummary,
		},
		params::ExperimentConfig,
		phylogeny::{AncestryRecord, Lineage, NodeId, Position},
		propagule::SamplePolicy,
		scores::ScoreSet,
		selection::{SelectionScheme, Selector},
	};
}
