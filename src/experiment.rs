//! Runs an [EpochController] to completion, feeding recorders and instruments along the way.

use std::time::Instant;

use eyre::WrapErr;
use serde::Serialize;

use crate::{
	controller::{EpochController, Phase, Termination},
	error::Result,
	genetic::{Instrument, Population, PopulationSeed, Recorder},
	params::ExperimentConfig,
	phylogeny::AncestrySummary,
};

/// Outcome of a run, handed to every recorder's `finalize`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
	pub seed: u64,
	/// `None` if the run stopped on an error.
	pub termination: Option<Termination>,
	pub epochs_completed: usize,
	pub error: Option<String>,
	/// Wall time of the run, in seconds.
	pub total_time: f64,
	pub ancestry: Option<AncestrySummary>,
}

pub type BoxedRecorder = Box<dyn Recorder + Send>;
pub type BoxedInstrument<P> = Box<dyn Instrument<P> + Send>;

/// A directed evolution run: the controller plus everything observing it.
pub struct Experiment<P: Population> {
	controller: EpochController<P>,
	recorders: Vec<BoxedRecorder>,
	instruments: Vec<BoxedInstrument<P>>,
}

impl<P: Population> Experiment<P> {
	/// Validates the configuration; fails before any population exists if it is invalid.
	pub fn new(config: ExperimentConfig) -> Result<Self> {
		Ok(Self {
			controller: EpochController::new(config)?,
			recorders: Vec::new(),
			instruments: Vec::new(),
		})
	}

	/// Add another recorder before running.
	pub fn register_recorder(&mut self, recorder: BoxedRecorder) {
		self.recorders.push(recorder);
	}

	/// Add another instrument before running.
	pub fn register_instrument(&mut self, instrument: BoxedInstrument<P>) {
		self.instruments.push(instrument);
	}

	pub fn controller(&self) -> &EpochController<P> {
		&self.controller
	}

	pub fn into_controller(self) -> EpochController<P> {
		self.controller
	}

	/// Builds and seeds the populations, then runs every epoch. Recorders and instruments are
	/// finalized whether the run succeeds or stops on an error.
	pub fn run<F, A>(&mut self, build: F, ancestor: A) -> eyre::Result<RunSummary>
	where
		F: FnMut(PopulationSeed) -> P,
		A: FnMut(usize, &P) -> P::Genome,
	{
		let timer = Instant::now();
		log::info!("Beginning directed evolution run with seed {}.", self.controller.seed());

		let outcome = self.start(build, ancestor).and_then(|()| self.run_epochs());

		let summary = RunSummary {
			seed: self.controller.seed(),
			termination: outcome.as_ref().ok().copied(),
			epochs_completed: self.epochs_completed(),
			error: outcome.as_ref().err().map(|e| format!("{e:#}")),
			total_time: timer.elapsed().as_secs_f64(),
			ancestry: self.controller.ancestry().map(|a| a.summary()),
		};
		for r in &mut self.recorders {
			if let Err(e) = r.finalize(&summary) {
				log::error!("Failed to finalize recorder: {e:#}");
			}
		}
		for i in &mut self.instruments {
			if let Err(e) = i.finalize() {
				log::error!("Failed to finalize instrument: {e:#}");
			}
		}

		match outcome {
			Ok(termination) => {
				log::info!(
					"Run finished: {termination}. Total time: {:.3} secs.",
					summary.total_time
				);
				Ok(summary)
			}
			Err(e) => Err(e),
		}
	}

	fn start<F, A>(&mut self, build: F, ancestor: A) -> eyre::Result<()>
	where
		F: FnMut(PopulationSeed) -> P,
		A: FnMut(usize, &P) -> P::Genome,
	{
		self.controller
			.start(build, ancestor)
			.wrap_err("failed to seed populations")?;
		let seed = self.controller.seed();
		for r in &mut self.recorders {
			r.initialize(self.controller.config(), seed)?;
		}
		Ok(())
	}

	fn run_epochs(&mut self) -> eyre::Result<Termination> {
		loop {
			if let Some(termination) = self.controller.termination() {
				return Ok(termination);
			}
			self.controller.advance()?;
			let phase = self.controller.evaluate()?;
			let epoch = self.controller.state().epoch;
			for i in &mut self.instruments {
				i.after_evaluation(epoch, self.controller.populations())
					.wrap_err_with(|| format!("instrument failed in epoch {epoch}"))?;
			}
			if let Phase::Terminated(termination) = phase {
				self.record(true)?;
				return Ok(termination);
			}
			self.controller.select()?;
			self.record(epoch + 1 >= self.controller.config().epochs)?;
			self.controller
				.transfer()
				.wrap_err_with(|| format!("transfer failed in epoch {epoch}"))?;
		}
	}

	fn record(&mut self, is_final: bool) -> eyre::Result<()> {
		let report = self.controller.report();
		let ancestry = self.controller.ancestry();
		for r in &mut self.recorders {
			r.record_epoch(&report, ancestry, is_final)?;
		}
		Ok(())
	}

	fn epochs_completed(&self) -> usize {
		match self.controller.phase() {
			Phase::Idle => 0,
			Phase::Terminated(Termination::Completed { epochs }) => epochs,
			Phase::Terminated(Termination::Extinct { epoch }) => epoch,
			Phase::Running(e)
			| Phase::Evaluating(e)
			| Phase::Selecting(e)
			| Phase::Transferring(e) => e,
		}
	}
}
