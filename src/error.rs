//! Error types for the orchestration core.

use derive_more::derive::{Display, Error, From};

use crate::phylogeny::Position;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal errors raised by the epoch controller. Extinction of every population is not one of
/// these; see [`crate::controller::Termination`].
#[derive(Debug, Display, Error, From)]
pub enum Error {
	#[display("invalid configuration: {_0}")]
	#[from]
	Config(ConfigError),

	#[display("selection returned {found} indices, expected {expected}")]
	SelectionCount { expected: usize, found: usize },

	#[display("selection returned index {index} with only {num_pops} populations")]
	SelectionRange { index: usize, num_pops: usize },

	#[display("propagule of {len} individuals exceeds capacity {capacity} of population {destination}")]
	PropaguleOverflow {
		destination: usize,
		len: usize,
		capacity: usize,
	},

	#[display("empty propagule sampled from population {source_pop} for population {destination}")]
	EmptyPropagule {
		source_pop: usize,
		destination: usize,
	},

	#[display("no ancestry node recorded at {position}")]
	MissingAncestor { position: Position },

	#[display("cannot {action} while {phase}")]
	Phase {
		action: &'static str,
		phase: String,
	},

	#[display("failed to build worker pool: {_0}")]
	#[from]
	ThreadPool(rayon::ThreadPoolBuildError),
}

/// Reasons a configuration is rejected before any population is constructed.
#[derive(Debug, Display, Error, Clone, PartialEq)]
pub enum ConfigError {
	#[display("num_pops must be at least 1")]
	NoPopulations,

	#[display("steps_per_epoch must be at least 1")]
	NoSteps,

	#[display("unknown selection method '{_0}'")]
	UnknownSelection(#[error(not(source))] String),

	#[display("unknown sampling method '{_0}'")]
	UnknownSampling(#[error(not(source))] String),

	#[display("{name} must be at least 1")]
	ZeroParameter { name: &'static str },

	#[display("{name} must lie within [0, 1], got {value}")]
	OutOfUnitRange { name: &'static str, value: f64 },

	#[display("lexicase_epsilon must be a non-negative number, got {_0}")]
	BadEpsilon(#[error(not(source))] f64),

	#[display("phylogeny tracking cannot be combined with parallel execution")]
	PhylogenyWithParallel,

	#[display("populations disagree on objective count ({expected} vs {found} for population {population})")]
	ObjectiveMismatch {
		population: usize,
		expected: usize,
		found: usize,
	},
}
