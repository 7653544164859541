#![allow(dead_code)]

use petri::{
	phylogeny::{Lineage, Position},
	prelude::*,
	Result,
};

/// A population of numbered genomes with fixed scores. Each step the genome in the first
/// occupied slot has a child (its genome plus one) in the next slot.
#[derive(Debug, Clone)]
pub struct MockPopulation {
	pub index: usize,
	pub seed: u64,
	pub slots: Vec<Option<u32>>,
	pub score: f64,
	pub objectives: Vec<f64>,
	/// Empties itself while advancing in this epoch.
	pub extinct_in: Option<usize>,
	/// Reproduce while advancing.
	pub breed: bool,
	pub epoch: usize,
	pub injected: Vec<(u32, usize, Option<Position>)>,
	pub resyncs: usize,
	pub resets: usize,
	pub steps_run: usize,
}

impl MockPopulation {
	pub fn new(seed: PopulationSeed, capacity: usize, score: f64) -> Self {
		Self {
			index: seed.index,
			seed: seed.seed,
			slots: vec![None; capacity],
			score,
			objectives: vec![score],
			extinct_in: None,
			breed: false,
			epoch: 0,
			injected: Vec::new(),
			resyncs: 0,
			resets: 0,
			steps_run: 0,
		}
	}

	pub fn with_objectives(mut self, objectives: Vec<f64>) -> Self {
		self.objectives = objectives;
		self
	}

	pub fn breeding(mut self) -> Self {
		self.breed = true;
		self
	}

	pub fn extinct_in(mut self, epoch: usize) -> Self {
		self.extinct_in = Some(epoch);
		self
	}

	pub fn genomes(&self) -> Vec<u32> {
		self.slots.iter().flatten().copied().collect()
	}
}

impl Population for MockPopulation {
	type Genome = u32;

	fn capacity(&self) -> usize {
		self.slots.len()
	}

	fn is_occupied(&self, slot: usize) -> bool {
		matches!(self.slots.get(slot), Some(Some(_)))
	}

	fn genome(&self, slot: usize) -> Option<&u32> {
		self.slots.get(slot)?.as_ref()
	}

	fn set_epoch(&mut self, epoch: usize) {
		self.epoch = epoch;
	}

	fn advance(&mut self, steps: usize, mut lineage: Option<&mut Lineage<'_>>) -> Result<()> {
		for _ in 0..steps {
			self.steps_run += 1;
			if self.extinct_in == Some(self.epoch) {
				for slot in 0..self.slots.len() {
					if self.slots[slot].take().is_some() {
						if let Some(l) = lineage.as_deref_mut() {
							l.death(slot);
						}
					}
				}
			} else if self.breed {
				if let Some(parent) = self.slots.iter().position(Option::is_some) {
					let child = (parent + 1) % self.slots.len();
					let genome = self.slots[parent].map(|g| g + 1);
					if let Some(l) = lineage.as_deref_mut() {
						l.birth(parent, child)?;
					}
					self.slots[child] = genome;
				}
			}
			if let Some(l) = lineage.as_deref_mut() {
				l.tick();
			}
		}
		Ok(())
	}

	fn aggregate_score(&self) -> f64 {
		self.score
	}

	fn objective_scores(&self) -> Vec<f64> {
		self.objectives.clone()
	}

	fn is_extinct(&self) -> bool {
		self.slots.iter().all(Option::is_none)
	}

	fn reset(&mut self) {
		self.resets += 1;
		self.slots.iter_mut().for_each(|s| *s = None);
	}

	fn inject_at(&mut self, genome: u32, slot: usize, parent: Option<Position>) {
		self.injected.push((genome, slot, parent));
		self.slots[slot] = Some(genome);
	}

	fn resync_after_seeding(&mut self) {
		self.resyncs += 1;
	}

	/// Reports the steps run so far as its trait, so summaries show where they were taken.
	fn world_summary(&self) -> Option<WorldSummary> {
		Some(WorldSummary {
			num_organisms: self.genomes().len(),
			mean_trait: self.steps_run as f64,
			objectives: self.objectives.clone(),
		})
	}
}

/// Fixed scores, so population `i` scores `scores[i]`.
pub fn scored(
	capacity: usize,
	scores: &[f64],
) -> impl FnMut(PopulationSeed) -> MockPopulation + '_ {
	move |seed| MockPopulation::new(seed, capacity, scores[seed.index])
}

/// Every population is founded by genome `10 * index`.
pub fn numbered_ancestor(index: usize, _: &MockPopulation) -> u32 {
	10 * index as u32
}
