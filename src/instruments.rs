//! Post-evaluation instruments.

use std::{
	collections::{HashMap, HashSet},
	fs::{self, File},
	hash::Hash,
	path::{Path, PathBuf},
};

use csv::Writer;
use eyre::WrapErr;
use serde::Serialize;

use crate::genetic::{Counterfactual, Instrument};

/// One cell of an interaction matrix: how much `genome`'s fitness changes when `removed` is
/// left out of its population.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Interaction {
	pub epoch: usize,
	pub population: usize,
	pub genome: usize,
	pub removed: usize,
	pub interaction: f64,
}

/// Computes, on chosen epochs, the pairwise interaction matrix of the unique genomes of every
/// population. Genomes get a run-wide id the first time they are seen.
pub struct InteractionMatrix<G> {
	epochs: HashSet<usize>,
	steps: usize,
	genome_ids: HashMap<G, usize>,
	path: PathBuf,
	writer: Option<Writer<File>>,
}

impl<G: Clone + Eq + Hash> InteractionMatrix<G> {
	/// Writes to `interaction_matrices.csv` in `outdir` on each of `epochs`, running every
	/// counterfactual copy for `steps` steps.
	pub fn new(
		outdir: impl AsRef<Path>,
		epochs: impl IntoIterator<Item = usize>,
		steps: usize,
	) -> Self {
		Self {
			epochs: epochs.into_iter().collect(),
			steps,
			genome_ids: HashMap::new(),
			path: outdir.as_ref().join("interaction_matrices.csv"),
			writer: None,
		}
	}

	fn genome_id(&mut self, genome: &G) -> usize {
		let next = self.genome_ids.len();
		*self.genome_ids.entry(genome.clone()).or_insert(next)
	}

	/// Interactions within one population. Self-interactions are 0.
	pub fn compute<P>(&mut self, epoch: usize, population: usize, pop: &P) -> Vec<Interaction>
	where
		P: Counterfactual<Genome = G>,
	{
		let mut seen = HashSet::new();
		let unique: Vec<G> = (0..pop.capacity())
			.filter_map(|slot| pop.genome(slot))
			.filter(|g| seen.insert(*g))
			.cloned()
			.collect();
		let ids: Vec<usize> = unique.iter().map(|g| self.genome_id(g)).collect();

		let baseline = pop.counterfactual_fitness(&unique, None, self.steps);
		let mut out = Vec::with_capacity(unique.len() * unique.len());
		for removed in 0..unique.len() {
			let without = pop.counterfactual_fitness(&unique, Some(removed), self.steps);
			for genome in 0..unique.len() {
				let interaction = if genome == removed {
					0.0
				} else {
					without[genome] - baseline[genome]
				};
				out.push(Interaction {
					epoch,
					population,
					genome: ids[genome],
					removed: ids[removed],
					interaction,
				});
			}
		}
		out
	}

	fn writer(&mut self) -> eyre::Result<&mut Writer<File>> {
		let wtr = match self.writer.take() {
			Some(wtr) => wtr,
			None => {
				if let Some(dir) = self.path.parent() {
					fs::create_dir_all(dir)?;
				}
				Writer::from_path(&self.path)
					.wrap_err_with(|| format!("failed to create {}", self.path.display()))?
			}
		};
		Ok(self.writer.insert(wtr))
	}
}

impl<P> Instrument<P> for InteractionMatrix<P::Genome>
where
	P: Counterfactual,
	P::Genome: Eq + Hash,
{
	fn after_evaluation(&mut self, epoch: usize, populations: &[P]) -> eyre::Result<()> {
		if !self.epochs.contains(&epoch) {
			return Ok(());
		}
		log::info!("Computing interaction matrices for epoch {epoch}.");
		for (i, pop) in populations.iter().enumerate() {
			let cells = self.compute(epoch, i, pop);
			log::debug!("Population {i}: {} interactions.", cells.len());
			let wtr = self.writer()?;
			for cell in cells {
				wtr.serialize(cell)?;
			}
		}
		self.writer()?.flush()?;
		Ok(())
	}

	fn finalize(&mut self) -> eyre::Result<()> {
		if let Some(wtr) = &mut self.writer {
			wtr.flush()?;
		}
		Ok(())
	}
}
