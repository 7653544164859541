//! The epoch controller: runs, evaluates, selects among and reseeds a pool of populations.

use std::collections::{BTreeSet, HashSet};

use derive_more::derive::Display;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};
use serde::Serialize;

use crate::{
	error::{ConfigError, Error, Result},
	genetic::{Population, PopulationSeed, WorldSummary},
	params::ExperimentConfig,
	phylogeny::{AncestryRecord, AncestrySummary, Lineage, Position},
	propagule::{Propagule, SamplePolicy},
	scores::ScoreSet,
	selection::{SelectionScheme, Selector},
};

/// Why a run ended.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
	#[display("completed {epochs} epochs")]
	Completed { epochs: usize },
	#[display("every population extinct at epoch {epoch}")]
	Extinct { epoch: usize },
}

/// Where the controller is in its epoch cycle.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	#[display("idle")]
	Idle,
	#[display("running epoch {_0}")]
	Running(usize),
	#[display("evaluating epoch {_0}")]
	Evaluating(usize),
	#[display("selecting in epoch {_0}")]
	Selecting(usize),
	#[display("transferring in epoch {_0}")]
	Transferring(usize),
	#[display("terminated ({_0})")]
	Terminated(Termination),
}

/// Epoch-level bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochState {
	pub epoch: usize,
	pub extinct: BTreeSet<usize>,
	pub live: BTreeSet<usize>,
	/// Most recent selection, one entry per population.
	pub selected: Vec<usize>,
	/// Population each destination was actually reseeded from in the most recent transfer,
	/// after redirecting away from extinct selections.
	pub sources: Vec<usize>,
	/// World summaries taken while the most recent epoch ran, by population then update.
	pub world_updates: Vec<WorldUpdate>,
}

/// One population's world summary after `update` steps of an epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldUpdate {
	pub epoch: usize,
	pub population: usize,
	pub update: usize,
	pub summary: WorldSummary,
}

/// Read-only snapshot of one epoch for recorders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochReport {
	pub epoch: usize,
	pub aggregate_scores: Vec<f64>,
	pub objective_scores: Vec<Vec<f64>>,
	pub selected: Vec<usize>,
	pub num_unique_selected: usize,
	pub extinct: Vec<usize>,
	pub ancestry: Option<AncestrySummary>,
	pub world_updates: Vec<WorldUpdate>,
}

pub struct EpochController<P: Population> {
	config: ExperimentConfig,
	seed: u64,
	rng: Pcg64Mcg, // experiment-level stream: population seeds, selection, sampling
	scheme: SelectionScheme,
	sampling: SamplePolicy,
	pool: Option<rayon::ThreadPool>,

	populations: Vec<P>,
	ancestry: Option<AncestryRecord>,
	phase: Phase,
	state: EpochState,
	scores: ScoreSet,
}

impl<P: Population> EpochController<P> {
	/// Validates the configuration. No population exists until [start](Self::start).
	pub fn new(config: ExperimentConfig) -> Result<Self> {
		config.validate()?;
		let scheme = config.selection_scheme()?;
		let sampling = config.sample_policy()?;
		// kept within TOML's integer range so the config snapshot can be replayed
		let seed = config
			.seed
			.unwrap_or_else(|| rand::rng().random_range(0..=i64::MAX as u64));
		let pool = if config.parallel.enabled {
			Some(
				rayon::ThreadPoolBuilder::new()
					.num_threads(config.threads())
					.thread_name(|i| format!("population-worker-{i}"))
					.build()?,
			)
		} else {
			None
		};
		log::info!(
			"Configured {} populations with {} selection, {:?} sampling, seed {seed}.",
			config.num_pops,
			scheme.name(),
			sampling,
		);
		Ok(Self {
			seed,
			rng: Pcg64Mcg::seed_from_u64(seed),
			scheme,
			sampling,
			pool,
			populations: Vec::with_capacity(config.num_pops),
			ancestry: None,
			phase: Phase::Idle,
			state: EpochState::default(),
			scores: ScoreSet::default(),
			config,
		})
	}

	/// Builds every population from its own seed, seeds each with an ancestral genome at slot 0
	/// and lets it resync. Moves from `Idle` to `Running(0)`.
	pub fn start<F, A>(&mut self, mut build: F, mut ancestor: A) -> Result<()>
	where
		F: FnMut(PopulationSeed) -> P,
		A: FnMut(usize, &P) -> P::Genome,
	{
		if self.phase != Phase::Idle {
			return Err(self.phase_error("start"));
		}
		let num_pops = self.config.num_pops;

		// distinct seeds, one per population
		let mut seen = HashSet::with_capacity(num_pops);
		let mut seeds = Vec::with_capacity(num_pops);
		while seeds.len() < num_pops {
			let s: u64 = self.rng.random();
			if seen.insert(s) {
				seeds.push(s);
			}
		}
		self.populations = seeds
			.into_iter()
			.enumerate()
			.map(|(index, seed)| build(PopulationSeed { index, seed }))
			.collect();

		let expected = self.populations[0].objective_scores().len();
		for (population, pop) in self.populations.iter().enumerate() {
			let found = pop.objective_scores().len();
			if found != expected {
				return Err(ConfigError::ObjectiveMismatch {
					population,
					expected,
					found,
				}
				.into());
			}
		}

		if self.config.track_phylogeny {
			self.ancestry = Some(AncestryRecord::new(self.config.prune_phylogeny));
		}
		for (i, pop) in self.populations.iter_mut().enumerate() {
			let genome = ancestor(i, pop);
			pop.inject_at(genome, 0, None);
			if let Some(record) = &mut self.ancestry {
				record.add_root(Position::slot(i, 0), 0);
			}
		}
		for pop in &mut self.populations {
			pop.resync_after_seeding();
		}

		self.state = EpochState {
			live: (0..num_pops).collect(),
			..Default::default()
		};
		self.phase = if self.config.epochs == 0 {
			Phase::Terminated(Termination::Completed { epochs: 0 })
		} else {
			Phase::Running(0)
		};
		log::info!("Seeded {num_pops} populations with their ancestor.");
		Ok(())
	}

	/// Advances every population one epoch's worth of steps, on the worker pool if configured.
	pub fn advance(&mut self) -> Result<()> {
		let Phase::Running(epoch) = self.phase else {
			return Err(self.phase_error("advance"));
		};
		log::info!("==== EPOCH {epoch} ====");
		let steps = self.config.steps_per_epoch;
		let checkpoints = self.config.summary_updates();
		for pop in &mut self.populations {
			pop.set_epoch(epoch);
		}

		let updates: Vec<Vec<WorldUpdate>> = match (&self.pool, &mut self.ancestry) {
			(Some(pool), _) => {
				let populations = &mut self.populations;
				pool.install(|| {
					populations
						.par_iter_mut()
						.enumerate()
						.map(|(i, pop)| run_population(pop, i, epoch, steps, &checkpoints, None))
						.collect::<Result<_>>()
				})?
			}
			(None, record) => {
				let mut updates = Vec::with_capacity(self.populations.len());
				for (i, pop) in self.populations.iter_mut().enumerate() {
					log::debug!("Running population {i}.");
					updates.push(run_population(
						pop,
						i,
						epoch,
						steps,
						&checkpoints,
						record.as_mut(),
					)?);
				}
				updates
			}
		};
		self.state.world_updates = updates.into_iter().flatten().collect();

		self.phase = Phase::Evaluating(epoch);
		Ok(())
	}

	/// Reads every population's scores and extinction. Moves to `Selecting`, or to
	/// `Terminated` if nothing survived.
	pub fn evaluate(&mut self) -> Result<Phase> {
		let Phase::Evaluating(epoch) = self.phase else {
			return Err(self.phase_error("evaluate"));
		};
		for pop in &mut self.populations {
			pop.evaluate();
		}
		let aggregate = self.populations.iter().map(P::aggregate_score).collect();
		let objectives = self.populations.iter().map(P::objective_scores).collect();
		self.scores = ScoreSet::new(aggregate, objectives)?;

		self.state.epoch = epoch;
		self.state.extinct.clear();
		self.state.live.clear();
		self.state.selected.clear();
		for (i, pop) in self.populations.iter().enumerate() {
			if pop.is_extinct() {
				self.state.extinct.insert(i);
			} else {
				self.state.live.insert(i);
			}
		}
		for (i, score) in self.scores.aggregate.iter().enumerate() {
			log::debug!(
				"Population {i}: aggregate {score:.4}, objectives {:?}{}",
				self.scores.objectives[i],
				if self.state.extinct.contains(&i) { " (extinct)" } else { "" },
			);
		}

		self.phase = if self.state.live.is_empty() {
			log::info!("All of the populations are extinct.");
			Phase::Terminated(Termination::Extinct { epoch })
		} else {
			Phase::Selecting(epoch)
		};
		Ok(self.phase)
	}

	/// Chooses a source population for every destination.
	pub fn select(&mut self) -> Result<&[usize]> {
		let Phase::Selecting(epoch) = self.phase else {
			return Err(self.phase_error("select"));
		};
		let num_pops = self.populations.len();
		let selected = self.scheme.select(&mut self.rng, &self.scores, num_pops);
		check_selection(&selected, num_pops)?;
		log::info!(
			"Selected {:?} ({} unique).",
			selected,
			selected.iter().collect::<HashSet<_>>().len()
		);
		self.state.selected = selected;
		self.phase = Phase::Transferring(epoch);
		Ok(&self.state.selected)
	}

	/// Samples a propagule for every destination, stitches the ancestry, then resets and
	/// reseeds every population. Moves to the next epoch or terminates after the last one.
	pub fn transfer(&mut self) -> Result<()> {
		let Phase::Transferring(epoch) = self.phase else {
			return Err(self.phase_error("transfer"));
		};
		let num_pops = self.populations.len();

		// Sample everything before any population is reset.
		let mut propagules: Vec<Propagule<P::Genome>> = Vec::with_capacity(num_pops);
		let mut sources = Vec::with_capacity(num_pops);
		for destination in 0..num_pops {
			let chosen = self.state.selected[destination];
			let source = self.live_source(chosen);
			if source != chosen {
				log::warn!("Population {chosen} is extinct; sampling population {source} instead.");
			}
			let propagule = self
				.sampling
				.sample(&mut self.rng, &self.populations[source], source);
			let capacity = self.populations[destination].capacity();
			if propagule.is_empty() {
				return Err(Error::EmptyPropagule {
					source_pop: source,
					destination,
				});
			}
			if propagule.len() > self.sampling.max_len(capacity) {
				return Err(Error::PropaguleOverflow {
					destination,
					len: propagule.len(),
					capacity,
				});
			}
			sources.push(propagule.source);
			propagules.push(propagule);
		}

		let transfer_time = (epoch + 1) * self.config.steps_per_epoch;
		let mut in_transit = Vec::new();
		if let Some(record) = &mut self.ancestry {
			let mut sequence = 0;
			for member in propagules.iter_mut().flat_map(|p| p.members.iter_mut()) {
				let pos = Position::Transfer { epoch, sequence };
				record.add_child(pos, member.origin, transfer_time)?;
				member.transfer = Some(pos);
				in_transit.push(pos);
				sequence += 1;
			}
		}

		for (destination, propagule) in propagules.into_iter().enumerate() {
			let pop = &mut self.populations[destination];
			pop.reset();
			if let Some(record) = &mut self.ancestry {
				record.retire_population(destination, transfer_time);
			}
			for (slot, member) in propagule.members.into_iter().enumerate() {
				if let (Some(record), Some(parent)) = (&mut self.ancestry, member.transfer) {
					record.add_child(Position::slot(destination, slot), parent, transfer_time)?;
				}
				pop.inject_at(member.genome, slot, member.transfer);
			}
			pop.resync_after_seeding();
		}

		// Only now that every destination holds its propagule can the transfer nodes go.
		if let Some(record) = &mut self.ancestry {
			for pos in in_transit {
				record.retire(pos, transfer_time);
			}
			record.update();
		}

		self.state.sources = sources;
		let next = epoch + 1;
		self.state.epoch = next;
		self.phase = if next >= self.config.epochs {
			log::info!("Completed {next} epochs.");
			Phase::Terminated(Termination::Completed { epochs: next })
		} else {
			Phase::Running(next)
		};
		Ok(())
	}

	/// Runs one full epoch and returns its report. Returns `None` if already terminated.
	pub fn run_epoch(&mut self) -> Result<Option<EpochReport>> {
		if self.termination().is_some() {
			return Ok(None);
		}
		self.advance()?;
		if let Phase::Terminated(_) = self.evaluate()? {
			return Ok(Some(self.report()));
		}
		self.select()?;
		let report = self.report();
		self.transfer()?;
		Ok(Some(report))
	}

	/// Runs epochs until the configured count completes or every population is extinct.
	pub fn run(&mut self) -> Result<Termination> {
		loop {
			if let Some(termination) = self.termination() {
				return Ok(termination);
			}
			self.run_epoch()?;
		}
	}

	/// Snapshot of the most recent evaluation and selection.
	pub fn report(&self) -> EpochReport {
		let selected = self.state.selected.clone();
		EpochReport {
			epoch: self.state.epoch,
			aggregate_scores: self.scores.aggregate.clone(),
			objective_scores: self.scores.objectives.clone(),
			num_unique_selected: selected.iter().collect::<HashSet<_>>().len(),
			selected,
			extinct: self.state.extinct.iter().copied().collect(),
			ancestry: self.ancestry.as_ref().map(AncestryRecord::summary),
			world_updates: self.state.world_updates.clone(),
		}
	}

	/// First non-extinct population at or after `chosen`, wrapping around.
	fn live_source(&self, chosen: usize) -> usize {
		let n = self.populations.len();
		let mut source = chosen;
		while self.state.extinct.contains(&source) {
			source = (source + 1) % n;
		}
		source
	}

	fn phase_error(&self, action: &'static str) -> Error {
		Error::Phase {
			action,
			phase: self.phase.to_string(),
		}
	}

	pub fn phase(&self) -> Phase {
		self.phase
	}

	pub fn termination(&self) -> Option<Termination> {
		match self.phase {
			Phase::Terminated(t) => Some(t),
			_ => None,
		}
	}

	pub fn config(&self) -> &ExperimentConfig {
		&self.config
	}

	/// The experiment seed actually used.
	pub fn seed(&self) -> u64 {
		self.seed
	}

	pub fn state(&self) -> &EpochState {
		&self.state
	}

	pub fn scores(&self) -> &ScoreSet {
		&self.scores
	}

	pub fn populations(&self) -> &[P] {
		&self.populations
	}

	pub fn ancestry(&self) -> Option<&AncestryRecord> {
		self.ancestry.as_ref()
	}

	pub fn into_populations(self) -> Vec<P> {
		self.populations
	}
}

/// Advances one population through epoch `epoch`, pausing after each checkpoint update for a
/// world summary. Without checkpoints the epoch runs in one go.
fn run_population<P: Population>(
	pop: &mut P,
	population: usize,
	epoch: usize,
	steps: usize,
	checkpoints: &[usize],
	mut record: Option<&mut AncestryRecord>,
) -> Result<Vec<WorldUpdate>> {
	let whole = [steps];
	let ends = if checkpoints.is_empty() { &whole[..] } else { checkpoints };
	let mut updates = Vec::with_capacity(checkpoints.len());
	let mut done = 0;
	for &update in ends {
		let mut lineage = record
			.as_deref_mut()
			.map(|r| Lineage::new(r, population, epoch * steps + done));
		pop.advance(update - done, lineage.as_mut())?;
		done = update;
		if checkpoints.is_empty() {
			continue;
		}
		if let Some(summary) = pop.world_summary() {
			updates.push(WorldUpdate {
				epoch,
				population,
				update,
				summary,
			});
		}
	}
	Ok(updates)
}

/// Selection must name exactly one in-range source per population.
pub fn check_selection(selected: &[usize], num_pops: usize) -> Result<()> {
	if selected.len() != num_pops {
		return Err(Error::SelectionCount {
			expected: num_pops,
			found: selected.len(),
		});
	}
	if let Some(&index) = selected.iter().find(|&&i| i >= num_pops) {
		return Err(Error::SelectionRange { index, num_pops });
	}
	Ok(())
}
