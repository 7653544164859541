//! Per-population scores, as read at the evaluation boundary of each epoch.

use serde::Serialize;

use crate::error::ConfigError;

/// Scores of every population for one epoch. Index `i` belongs to population `i`.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ScoreSet {
	pub aggregate: Vec<f64>,
	pub objectives: Vec<Vec<f64>>,
}

impl ScoreSet {
	/// Builds a score set, checking every population reports the same number of objectives.
	pub fn new(aggregate: Vec<f64>, objectives: Vec<Vec<f64>>) -> Result<Self, ConfigError> {
		debug_assert_eq!(aggregate.len(), objectives.len());
		if let Some(first) = objectives.first() {
			let expected = first.len();
			if let Some((population, found)) = objectives
				.iter()
				.map(Vec::len)
				.enumerate()
				.find(|&(_, len)| len != expected)
			{
				return Err(ConfigError::ObjectiveMismatch {
					population,
					expected,
					found,
				});
			}
		}
		Ok(Self {
			aggregate,
			objectives,
		})
	}

	/// Score set with aggregate scores only.
	pub fn from_aggregate(aggregate: Vec<f64>) -> Self {
		let objectives = vec![Vec::new(); aggregate.len()];
		Self {
			aggregate,
			objectives,
		}
	}

	pub fn len(&self) -> usize {
		self.aggregate.len()
	}

	pub fn is_empty(&self) -> bool {
		self.aggregate.is_empty()
	}

	pub fn num_objectives(&self) -> usize {
		self.objectives.first().map_or(0, Vec::len)
	}

	/// Population indices ordered best-first by aggregate score. Exact ties keep index order.
	pub fn ranked(&self) -> Vec<usize> {
		let mut order: Vec<usize> = (0..self.len()).collect();
		order.sort_by(|&a, &b| f64::total_cmp(&self.aggregate[b], &self.aggregate[a])); // stable
		order
	}

	/// Whether population `a` Pareto-dominates population `b`.
	pub fn dominates(&self, a: usize, b: usize) -> bool {
		dominates(&self.objectives[a], &self.objectives[b])
	}

	/// Members of `candidates` not dominated by any other member of `candidates`, in the order
	/// given. NaN scores can make dominance cyclic; if nothing survives, every candidate does.
	pub fn pareto_front(&self, candidates: &[usize]) -> Vec<usize> {
		let front: Vec<usize> = candidates
			.iter()
			.copied()
			.filter(|&c| !candidates.iter().any(|&o| o != c && self.dominates(o, c)))
			.collect();
		if front.is_empty() {
			candidates.to_vec()
		} else {
			front
		}
	}
}

/// `a` dominates `b` iff it is at least as good on every objective and strictly better on one.
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	let mut better_in_one = false;
	for (x, y) in a.iter().zip(b) {
		if x < y {
			return false;
		}
		if x > y {
			better_in_one = true;
		}
	}
	better_in_one
}
