//! A well-mixed world of fixed-length bitstrings.
//!
//! Organisms age one step at a time and die past `max_age`. Every step, occupied slots produce
//! offspring at `births_per_step` per organism; parents are drawn with weight `1 + ones`, the
//! child is a mutated copy placed at a random slot (replacing whatever lived there).
//!
//! Objective `i` is the best fraction of ones any live organism has in the `i`-th contiguous
//! chunk of its genome. The aggregate score is the sum of the objectives.

use std::{fmt, fs, path::Path, str::FromStr};

use bon::Builder;
use derive_more::derive::{Display, Error};
use eyre::WrapErr;
use rand::{seq::IndexedRandom, Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use crate::{
	error::{ConfigError, Result},
	genetic::{Counterfactual, Population, PopulationSeed, WorldSummary},
	phylogeny::{Lineage, Position},
};

#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BitsetParams {
	#[builder(default = 100)]
	#[serde(default = "default_capacity")]
	pub capacity: usize,
	#[builder(default = 32)]
	#[serde(default = "default_genome_len")]
	pub genome_len: usize,
	#[builder(default = 4)]
	#[serde(default = "default_num_objectives")]
	pub num_objectives: usize,
	/// Per-site flip probability.
	#[builder(default = 0.01)]
	#[serde(default = "default_mutation_rate")]
	pub mutation_rate: f64,
	/// Steps an organism lives.
	#[builder(default = 20)]
	#[serde(default = "default_max_age")]
	pub max_age: usize,
	/// Offspring per occupied slot per step.
	#[builder(default = 0.1)]
	#[serde(default = "default_births_per_step")]
	pub births_per_step: f64,
	/// File holding the ancestral genome as a string of 0s and 1s. The all-zero genome is used
	/// if unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ancestor_file: Option<String>,
}

fn default_capacity() -> usize {
	100
}
fn default_genome_len() -> usize {
	32
}
fn default_num_objectives() -> usize {
	4
}
fn default_mutation_rate() -> f64 {
	0.01
}
fn default_max_age() -> usize {
	20
}
fn default_births_per_step() -> f64 {
	0.1
}

impl Default for BitsetParams {
	fn default() -> Self {
		Self::builder().build()
	}
}

impl BitsetParams {
	pub fn validate(&self) -> Result<(), ConfigError> {
		for (name, value) in [
			("world.capacity", self.capacity),
			("world.genome_len", self.genome_len),
			("world.num_objectives", self.num_objectives),
			("world.max_age", self.max_age),
		] {
			if value < 1 {
				return Err(ConfigError::ZeroParameter { name });
			}
		}
		for (name, value) in [
			("world.mutation_rate", self.mutation_rate),
			("world.births_per_step", self.births_per_step),
		] {
			if !(0.0..=1.0).contains(&value) {
				return Err(ConfigError::OutOfUnitRange { name, value });
			}
		}
		Ok(())
	}

	/// Reads the ancestral genome from `ancestor_file`, if one is set. It must hold exactly
	/// `genome_len` bits.
	pub fn load_ancestor(&self) -> eyre::Result<Option<Bits>> {
		let Some(filename) = &self.ancestor_file else {
			return Ok(None);
		};
		let bits = Bits::from_file(filename)?;
		if bits.len() != self.genome_len {
			eyre::bail!(
				"ancestor in {filename} has {} bits, expected world.genome_len = {}",
				bits.len(),
				self.genome_len
			);
		}
		log::info!("Loaded ancestor {bits} from {filename}.");
		Ok(Some(bits))
	}
}

/// A character other than `0`, `1` or whitespace in a bitstring.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[display("invalid character {found:?} at position {position} of a bitstring")]
pub struct ParseBitsError {
	pub position: usize,
	pub found: char,
}

/// A bitstring genome.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bits(pub Vec<bool>);

impl Bits {
	pub fn zeros(len: usize) -> Self {
		Self(vec![false; len])
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn ones(&self) -> usize {
		self.0.iter().filter(|&&b| b).count()
	}

	/// Fraction of ones within `start..end`. Empty ranges score 0.
	pub fn density(&self, start: usize, end: usize) -> f64 {
		let end = end.min(self.len());
		if start >= end {
			return 0.0;
		}
		let ones = self.0[start..end].iter().filter(|&&b| b).count();
		ones as f64 / (end - start) as f64
	}

	/// Parses a genome file. Whitespace, including line breaks, is ignored.
	pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
		let path = path.as_ref();
		let contents = fs::read_to_string(path)
			.wrap_err_with(|| format!("failed to read genome file {}", path.display()))?;
		let bits = contents
			.parse()
			.wrap_err_with(|| format!("failed to parse genome file {}", path.display()))?;
		Ok(bits)
	}

	/// Flips every site independently with probability `rate`.
	pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R, rate: f64) {
		for bit in &mut self.0 {
			if rng.random_bool(rate) {
				*bit = !*bit;
			}
		}
	}
}

impl fmt::Display for Bits {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for &b in &self.0 {
			f.write_str(if b { "1" } else { "0" })?;
		}
		Ok(())
	}
}

impl FromStr for Bits {
	type Err = ParseBitsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.chars()
			.enumerate()
			.filter(|(_, c)| !c.is_whitespace())
			.map(|(position, c)| match c {
				'0' => Ok(false),
				'1' => Ok(true),
				found => Err(ParseBitsError { position, found }),
			})
			.collect::<Result<_, _>>()
			.map(Self)
	}
}

#[derive(Debug, Clone, PartialEq)]
struct Organism {
	genome: Bits,
	age: usize,
	founder: Option<usize>, // counterfactual runs only
}

impl Organism {
	fn new(genome: Bits, founder: Option<usize>) -> Self {
		Self {
			genome,
			age: 0,
			founder,
		}
	}
}

#[derive(Debug, Clone)]
pub struct BitsetWorld {
	params: BitsetParams,
	seed: u64,
	rng: Pcg64Mcg,
	slots: Vec<Option<Organism>>,
	epoch: usize,
	births_owed: f64, // fractional births carried between steps
	objectives: Vec<f64>,
}

impl BitsetWorld {
	pub fn new(params: BitsetParams, seed: PopulationSeed) -> Self {
		Self::with_seed(params, seed.seed)
	}

	pub fn with_seed(params: BitsetParams, seed: u64) -> Self {
		Self {
			slots: vec![None; params.capacity],
			objectives: vec![0.0; params.num_objectives],
			rng: Pcg64Mcg::seed_from_u64(seed),
			seed,
			epoch: 0,
			births_owed: 0.0,
			params,
		}
	}

	/// The all-zero genome every population starts from.
	pub fn ancestor(&self) -> Bits {
		Bits::zeros(self.params.genome_len)
	}

	pub fn params(&self) -> &BitsetParams {
		&self.params
	}

	pub fn epoch(&self) -> usize {
		self.epoch
	}

	pub fn num_organisms(&self) -> usize {
		self.slots.iter().flatten().count()
	}

	/// Genome index range scored by objective `i`.
	fn chunk(&self, i: usize) -> (usize, usize) {
		let len = self.params.genome_len;
		let k = self.params.num_objectives;
		(i * len / k, (i + 1) * len / k)
	}

	/// Best density of each objective's chunk over the live organisms.
	fn current_objectives(&self) -> Vec<f64> {
		(0..self.params.num_objectives)
			.map(|i| {
				let (start, end) = self.chunk(i);
				self.slots
					.iter()
					.flatten()
					.map(|o| o.genome.density(start, end))
					.fold(0.0, f64::max)
			})
			.collect()
	}

	fn step(&mut self, mut lineage: Option<&mut Lineage<'_>>) -> Result<()> {
		for (slot, cell) in self.slots.iter_mut().enumerate() {
			let Some(org) = cell else { continue };
			org.age += 1;
			if org.age > self.params.max_age {
				*cell = None;
				if let Some(l) = lineage.as_deref_mut() {
					l.death(slot);
				}
			}
		}

		let occupied: Vec<usize> = (0..self.slots.len())
			.filter(|&s| self.slots[s].is_some())
			.collect();
		if occupied.is_empty() {
			self.births_owed = 0.0;
			return Ok(());
		}
		self.births_owed += occupied.len() as f64 * self.params.births_per_step;
		let births = self.births_owed.floor();
		self.births_owed -= births;

		for _ in 0..births as usize {
			let slots = &self.slots;
			let Ok(&parent) = occupied.choose_weighted(&mut self.rng, |&s| {
				1.0 + slots[s].as_ref().map_or(0, |o| o.genome.ones()) as f64
			}) else {
				break;
			};
			let Some(parent_org) = &self.slots[parent] else {
				continue;
			};
			let mut child = Organism::new(parent_org.genome.clone(), parent_org.founder);
			child.genome.mutate(&mut self.rng, self.params.mutation_rate);
			let child_slot = self.rng.random_range(0..self.slots.len());
			if let Some(l) = lineage.as_deref_mut() {
				l.birth(parent, child_slot)?;
			}
			self.slots[child_slot] = Some(child);
		}
		Ok(())
	}
}

impl Population for BitsetWorld {
	type Genome = Bits;

	fn capacity(&self) -> usize {
		self.slots.len()
	}

	fn is_occupied(&self, slot: usize) -> bool {
		matches!(self.slots.get(slot), Some(Some(_)))
	}

	fn genome(&self, slot: usize) -> Option<&Bits> {
		self.slots.get(slot)?.as_ref().map(|o| &o.genome)
	}

	fn set_epoch(&mut self, epoch: usize) {
		self.epoch = epoch;
	}

	fn advance(&mut self, steps: usize, mut lineage: Option<&mut Lineage<'_>>) -> Result<()> {
		for _ in 0..steps {
			self.step(lineage.as_deref_mut())?;
			if let Some(l) = lineage.as_deref_mut() {
				l.tick();
			}
		}
		Ok(())
	}

	fn evaluate(&mut self) {
		self.objectives = self.current_objectives();
	}

	fn aggregate_score(&self) -> f64 {
		self.objectives.iter().sum()
	}

	fn objective_scores(&self) -> Vec<f64> {
		self.objectives.clone()
	}

	fn is_extinct(&self) -> bool {
		self.slots.iter().all(Option::is_none)
	}

	fn reset(&mut self) {
		self.slots.iter_mut().for_each(|s| *s = None);
		self.births_owed = 0.0;
	}

	fn inject_at(&mut self, genome: Bits, slot: usize, parent: Option<Position>) {
		match self.slots.get_mut(slot) {
			Some(cell) => *cell = Some(Organism::new(genome, None)),
			None => log::warn!("Ignoring injection at slot {slot} (from {parent:?}) beyond capacity."),
		}
	}

	fn resync_after_seeding(&mut self) {
		self.births_owed = 0.0;
		log::trace!("World reseeded with {} organisms.", self.num_organisms());
	}

	fn world_summary(&self) -> Option<WorldSummary> {
		let num_organisms = self.num_organisms();
		let ones: usize = self.slots.iter().flatten().map(|o| o.genome.ones()).sum();
		Some(WorldSummary {
			num_organisms,
			mean_trait: if num_organisms == 0 {
				0.0
			} else {
				ones as f64 / num_organisms as f64
			},
			objectives: self.current_objectives(),
		})
	}
}

impl Counterfactual for BitsetWorld {
	/// Fitness of a genome is the share of organisms descended from it once the copy has run.
	fn counterfactual_fitness(
		&self,
		genomes: &[Bits],
		removed: Option<usize>,
		steps: usize,
	) -> Vec<f64> {
		let mut world = Self::with_seed(self.params.clone(), self.seed ^ self.epoch as u64);
		for (i, genome) in genomes.iter().enumerate().take(world.slots.len()) {
			if Some(i) != removed {
				world.slots[i] = Some(Organism::new(genome.clone(), Some(i)));
			}
		}
		for _ in 0..steps {
			// the copy never tracks ancestry, so stepping can't fail
			if world.step(None).is_err() {
				break;
			}
		}

		let mut counts = vec![0usize; genomes.len()];
		for founder in world.slots.iter().flatten().filter_map(|o| o.founder) {
			counts[founder] += 1;
		}
		let total = world.num_organisms();
		counts
			.into_iter()
			.map(|c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
			.collect()
	}
}
