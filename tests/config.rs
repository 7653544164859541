use eyre::Result;
use petri::{
	params::{ExperimentConfig, SelectionMethod},
	prelude::*,
	worlds::BitsetParams,
	ConfigError,
};

#[test]
fn defaults_from_empty_toml() -> Result<()> {
	let config = ExperimentConfig::from_toml("")?;
	assert_eq!(config, ExperimentConfig::builder().build());
	assert_eq!(config.num_pops, 1);
	assert_eq!(config.epochs, 100);
	assert_eq!(config.steps_per_epoch, 100);
	assert_eq!(config.selection.method, "elite");
	assert_eq!(config.sampling.method, "random");
	assert!(!config.track_phylogeny);
	assert!(config.prune_phylogeny);
	assert_eq!(config.output.dir, "output");
	config.validate()?;
	Ok(())
}

#[test]
fn full_toml_round_trips_into_schemes() -> Result<()> {
	let config = ExperimentConfig::from_toml(
		r#"
		seed = 7
		num_pops = 6
		epochs = 3
		steps_per_epoch = 20
		track_phylogeny = true

		[selection]
		method = "non-dominated-tournament"
		tournament_size = 3

		[sampling]
		method = "full"

		[output]
		dir = "somewhere"
		phylogeny_snapshot_resolution = 2
		"#,
	)?;
	config.validate()?;
	assert_eq!(config.seed, Some(7));
	assert_eq!(
		config.selection_scheme()?,
		SelectionScheme::NonDominatedTournament { size: 3 }
	);
	assert_eq!(config.sample_policy()?, SamplePolicy::Full);
	assert_eq!(config.output.phylogeny_snapshot_resolution, 2);
	assert_eq!(config.output.summary_epoch_resolution, 1);
	Ok(())
}

#[test]
fn selection_names() {
	for (name, method) in [
		("elite", SelectionMethod::Elite),
		("tournament", SelectionMethod::Tournament),
		("lexicase", SelectionMethod::Lexicase),
		("non-dominated-elite", SelectionMethod::NonDominatedElite),
		("non-dominated-tournament", SelectionMethod::NonDominatedTournament),
		("random", SelectionMethod::Random),
		("none", SelectionMethod::None),
	] {
		assert_eq!(name.parse::<SelectionMethod>(), Ok(method));
	}
	assert_eq!(
		"roulette".parse::<SelectionMethod>(),
		Err(ConfigError::UnknownSelection("roulette".into()))
	);
}

#[test]
fn invalid_values_are_rejected() {
	let base = ExperimentConfig::builder().build();

	let mut c = base.clone();
	c.num_pops = 0;
	assert_eq!(c.validate(), Err(ConfigError::NoPopulations));

	let mut c = base.clone();
	c.steps_per_epoch = 0;
	assert_eq!(c.validate(), Err(ConfigError::NoSteps));

	let mut c = base.clone();
	c.selection.elite_count = 0;
	assert_eq!(
		c.validate(),
		Err(ConfigError::ZeroParameter {
			name: "selection.elite_count"
		})
	);

	let mut c = base.clone();
	c.selection.method = "lexicase".into();
	c.selection.lexicase_epsilon = -0.5;
	assert_eq!(c.validate(), Err(ConfigError::BadEpsilon(-0.5)));

	let mut c = base.clone();
	c.sampling.method = "clone".into();
	assert_eq!(
		c.validate(),
		Err(ConfigError::UnknownSampling("clone".into()))
	);

	let mut c = base.clone();
	c.sampling.size = 0;
	assert!(matches!(c.validate(), Err(ConfigError::ZeroParameter { .. })));

	let mut c = base.clone();
	c.output.ancestry_epoch_resolution = 0;
	assert!(matches!(c.validate(), Err(ConfigError::ZeroParameter { .. })));

	let mut c = base.clone();
	c.track_phylogeny = true;
	c.parallel.enabled = true;
	assert_eq!(c.validate(), Err(ConfigError::PhylogenyWithParallel));

	// zero epochs is valid: the run terminates right after seeding
	let mut c = base;
	c.epochs = 0;
	assert_eq!(c.validate(), Ok(()));
}

#[test]
fn unknown_selection_rejected_before_populations_exist() {
	let config = ExperimentConfig::builder()
		.selection(
			petri::params::SelectionParams::builder()
				.method("roulette")
				.build(),
		)
		.build();
	let res = EpochController::<petri::worlds::BitsetWorld>::new(config);
	assert!(matches!(
		res,
		Err(petri::Error::Config(ConfigError::UnknownSelection(_)))
	));
}

#[test]
fn world_params() -> Result<()> {
	let params: BitsetParams = toml::from_str("capacity = 10\nmutation_rate = 0.5")?;
	assert_eq!(params.capacity, 10);
	assert_eq!(params.genome_len, 32);
	params.validate()?;

	let bad = BitsetParams::builder().births_per_step(1.5).build();
	assert!(matches!(
		bad.validate(),
		Err(ConfigError::OutOfUnitRange {
			name: "world.births_per_step",
			..
		})
	));
	Ok(())
}

#[test]
fn update_summary_checkpoints() -> Result<()> {
	let mut config = ExperimentConfig::from_toml(
		r#"
		steps_per_epoch = 10

		[output]
		summary_update_resolution = 3
		"#,
	)?;
	assert!(config.summary_updates().is_empty());

	config.output.collect_update_summary = true;
	assert_eq!(config.summary_updates(), vec![3, 6, 9, 10]);
	config.output.summary_update_resolution = 5;
	assert_eq!(config.summary_updates(), vec![5, 10]);
	config.output.summary_update_resolution = 50;
	assert_eq!(config.summary_updates(), vec![10]);

	config.output.summary_update_resolution = 0;
	assert_eq!(
		config.validate(),
		Err(ConfigError::ZeroParameter {
			name: "output.summary_update_resolution"
		})
	);
	Ok(())
}

#[test]
fn ancestor_file_is_optional() -> Result<()> {
	let params: BitsetParams = toml::from_str("ancestor_file = \"seed.txt\"")?;
	assert_eq!(params.ancestor_file.as_deref(), Some("seed.txt"));
	let params: BitsetParams = toml::from_str("")?;
	assert_eq!(params.ancestor_file, None);
	assert!(!toml::to_string(&params)?.contains("ancestor_file"));
	Ok(())
}
