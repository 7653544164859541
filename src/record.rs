//! Default recorder: CSV tables plus JSON/TOML snapshots in one output directory.
//!
//! Layout:
//! - `run_config.toml`: the configuration actually run, with the seed filled in
//! - `evaluation.csv`: one row per recorded epoch; score vectors as JSON arrays
//! - `ancestry.csv`: ancestry summary per recorded epoch (phylogeny tracking only)
//! - `phylogeny_<epoch>.csv`: every stored ancestry node (phylogeny tracking only)
//! - `world_summary.csv`: each population's state at every summarized update of every epoch
//!   (only when update summaries are collected)
//! - `summary.json`: the [RunSummary], written when the run ends

use std::{
	fs::{self, File},
	path::{Path, PathBuf},
};

use csv::Writer;
use eyre::WrapErr;
use serde::Serialize;

use crate::{
	controller::{EpochReport, WorldUpdate},
	experiment::RunSummary,
	genetic::Recorder,
	params::{ExperimentConfig, OutputParams},
	phylogeny::{AncestryNode, AncestryRecord},
};

#[derive(Serialize, Debug, Clone, PartialEq)]
struct EvaluationRow {
	epoch: usize,
	aggregate_scores: String,
	objective_scores: String,
	selected: String,
	num_unique_selected: usize,
	extinct: String,
}

impl EvaluationRow {
	fn new(report: &EpochReport) -> serde_json::Result<Self> {
		Ok(Self {
			epoch: report.epoch,
			aggregate_scores: serde_json::to_string(&report.aggregate_scores)?,
			objective_scores: serde_json::to_string(&report.objective_scores)?,
			selected: serde_json::to_string(&report.selected)?,
			num_unique_selected: report.num_unique_selected,
			extinct: serde_json::to_string(&report.extinct)?,
		})
	}
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct WorldRow {
	epoch: usize,
	population: usize,
	update: usize,
	num_organisms: usize,
	mean_trait: f64,
	objectives: String,
}

impl WorldRow {
	fn new(update: &WorldUpdate) -> serde_json::Result<Self> {
		Ok(Self {
			epoch: update.epoch,
			population: update.population,
			update: update.update,
			num_organisms: update.summary.num_organisms,
			mean_trait: update.summary.mean_trait,
			objectives: serde_json::to_string(&update.summary.objectives)?,
		})
	}
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct AncestryRow {
	epoch: usize,
	num_active: usize,
	num_stored: usize,
	total_nodes: u64,
	num_roots: usize,
	ave_depth: f64,
	mrca_depth: Option<usize>,
	diversity: f64,
	phylogenetic_diversity: usize,
	updates: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
struct PhylogenyRow {
	id: u64,
	parent: Option<u64>,
	depth: usize,
	origin: String,
	origin_time: usize,
	destruction_time: Option<usize>,
}

impl From<&AncestryNode> for PhylogenyRow {
	fn from(node: &AncestryNode) -> Self {
		Self {
			id: node.id.into(),
			parent: node.parent.map(Into::into),
			depth: node.depth,
			origin: node.origin.to_string(),
			origin_time: node.origin_time,
			destruction_time: node.destruction_time,
		}
	}
}

/// Writes everything into `outdir`, creating it if needed.
pub struct CsvRecorder {
	outdir: PathBuf,
	resolution: OutputParams,
	evaluation: Option<Writer<File>>,
	ancestry: Option<Writer<File>>,
	world: Option<Writer<File>>,
}

/// Whether an epoch falls on a recording boundary.
fn due(epoch: usize, resolution: usize, is_final: bool) -> bool {
	is_final || epoch % resolution.max(1) == 0
}

impl CsvRecorder {
	/// Records into the directory and at the resolutions from `output`.
	pub fn new(output: &OutputParams) -> Self {
		Self::with_dir(&output.dir, output)
	}

	/// Records into `outdir` instead of the configured directory.
	pub fn with_dir(outdir: impl AsRef<Path>, output: &OutputParams) -> Self {
		Self {
			outdir: outdir.as_ref().to_path_buf(),
			resolution: output.clone(),
			evaluation: None,
			ancestry: None,
			world: None,
		}
	}

	pub fn outdir(&self) -> &Path {
		&self.outdir
	}

	fn write_snapshot(&self, epoch: usize, record: &AncestryRecord) -> eyre::Result<()> {
		let path = self.outdir.join(format!("phylogeny_{epoch}.csv"));
		let mut wtr = Writer::from_path(&path)
			.wrap_err_with(|| format!("failed to create {}", path.display()))?;
		for node in record.nodes() {
			wtr.serialize(PhylogenyRow::from(node))?;
		}
		wtr.flush()?;
		Ok(())
	}
}

impl Recorder for CsvRecorder {
	fn initialize(&mut self, config: &ExperimentConfig, seed: u64) -> eyre::Result<()> {
		fs::create_dir_all(&self.outdir)
			.wrap_err_with(|| format!("failed to create output directory {}", self.outdir.display()))?;

		let mut snapshot = config.clone();
		snapshot.seed = Some(seed);
		fs::write(self.outdir.join("run_config.toml"), toml::to_string_pretty(&snapshot)?)?;

		self.evaluation = Some(Writer::from_path(self.outdir.join("evaluation.csv"))?);
		if config.track_phylogeny {
			self.ancestry = Some(Writer::from_path(self.outdir.join("ancestry.csv"))?);
		}
		if config.output.collect_update_summary {
			self.world = Some(Writer::from_path(self.outdir.join("world_summary.csv"))?);
		}
		log::info!("Recording to {}.", self.outdir.display());
		Ok(())
	}

	fn record_epoch(
		&mut self,
		report: &EpochReport,
		ancestry: Option<&AncestryRecord>,
		is_final: bool,
	) -> eyre::Result<()> {
		let epoch = report.epoch;
		if let Some(wtr) = &mut self.evaluation {
			if due(epoch, self.resolution.summary_epoch_resolution, is_final) {
				wtr.serialize(EvaluationRow::new(report)?)?;
				wtr.flush()?;
			}
		}
		if let (Some(wtr), Some(summary)) = (&mut self.ancestry, &report.ancestry) {
			if due(epoch, self.resolution.ancestry_epoch_resolution, is_final) {
				wtr.serialize(AncestryRow {
					epoch,
					num_active: summary.num_active,
					num_stored: summary.num_stored,
					total_nodes: summary.total_nodes,
					num_roots: summary.num_roots,
					ave_depth: summary.ave_depth,
					mrca_depth: summary.mrca_depth,
					diversity: summary.diversity,
					phylogenetic_diversity: summary.phylogenetic_diversity,
					updates: summary.updates,
				})?;
				wtr.flush()?;
			}
		}
		if let Some(wtr) = &mut self.world {
			for update in &report.world_updates {
				wtr.serialize(WorldRow::new(update)?)?;
			}
			wtr.flush()?;
		}
		if let Some(record) = ancestry {
			if due(epoch, self.resolution.phylogeny_snapshot_resolution, is_final) {
				self.write_snapshot(epoch, record)?;
			}
		}
		Ok(())
	}

	fn finalize(&mut self, summary: &RunSummary) -> eyre::Result<()> {
		for wtr in [&mut self.evaluation, &mut self.ancestry, &mut self.world]
			.into_iter()
			.flatten()
		{
			wtr.flush()?;
		}
		fs::create_dir_all(&self.outdir)?;
		let results = serde_json::to_string_pretty(summary)?;
		fs::write(self.outdir.join("summary.json"), results)?;
		Ok(())
	}
}
