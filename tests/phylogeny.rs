use eyre::Result;
use petri::{
	phylogeny::{AncestryRecord, Lineage, NodeId, Position},
	Error,
};
use proptest::prelude::*;

#[test]
fn children_extend_depth() -> Result<()> {
	let mut record = AncestryRecord::new(true);
	let root = record.add_root(Position::slot(0, 0), 0);
	let child = record.add_child(Position::slot(0, 1), Position::slot(0, 0), 1)?;
	let grandchild = record.add_child(Position::slot(0, 2), Position::slot(0, 1), 2)?;

	assert_eq!(record.node(root).map(|n| n.depth), Some(0));
	assert_eq!(record.node(child).map(|n| n.depth), Some(1));
	assert_eq!(record.node(grandchild).map(|n| n.parent), Some(Some(child)));
	let chain: Vec<NodeId> = record.ancestors(grandchild).map(|n| n.id).collect();
	assert_eq!(chain, vec![child, root]);
	assert_eq!(record.mrca_depth(), Some(0));
	Ok(())
}

#[test]
fn missing_parent_is_an_error() {
	let mut record = AncestryRecord::new(true);
	let res = record.add_child(Position::slot(0, 1), Position::slot(0, 0), 0);
	assert!(matches!(res, Err(Error::MissingAncestor { .. })));
}

#[test]
fn child_may_replace_its_parent() -> Result<()> {
	let mut record = AncestryRecord::new(true);
	let root = record.add_root(Position::slot(0, 0), 0);
	let child = record.add_child(Position::slot(0, 0), Position::slot(0, 0), 3)?;
	let node = record.node(child).expect("child stored");
	assert_eq!(node.parent, Some(root));
	let root_node = record.node(root).expect("retired parent kept while it has children");
	assert_eq!(root_node.destruction_time, Some(3));
	assert_eq!(record.num_active(), 1);
	Ok(())
}

#[test]
fn pruning_removes_dead_branches() -> Result<()> {
	let mut record = AncestryRecord::new(true);
	let root = record.add_root(Position::slot(0, 0), 0);
	let a = record.add_child(Position::slot(0, 1), Position::slot(0, 0), 1)?;
	let b = record.add_child(Position::slot(0, 2), Position::slot(0, 1), 2)?;
	record.retire(Position::slot(0, 1), 3);
	assert!(record.node(a).is_some());

	record.retire(Position::slot(0, 2), 4);
	assert!(record.node(b).is_none());
	assert!(record.node(a).is_none());
	assert!(record.node(root).is_some());
	assert!(record.is_connected());

	let mut unpruned = AncestryRecord::new(false);
	unpruned.add_root(Position::slot(0, 0), 0);
	unpruned.retire(Position::slot(0, 0), 1);
	assert_eq!(unpruned.nodes().count(), 1);
	Ok(())
}

#[test]
fn ids_are_never_reused() -> Result<()> {
	let mut record = AncestryRecord::new(true);
	let first = record.add_root(Position::slot(0, 0), 0);
	record.retire(Position::slot(0, 0), 1);
	assert!(record.node(first).is_none());
	let second = record.add_root(Position::slot(0, 0), 2);
	assert!(second > first);
	assert_eq!(record.total_nodes(), 2);
	Ok(())
}

#[test]
fn retire_population_only_touches_that_population() {
	let mut record = AncestryRecord::new(false);
	for pop in 0..2 {
		for slot in 0..3 {
			record.add_root(Position::slot(pop, slot), 0);
		}
	}
	assert_eq!(record.retire_population(1, 5), 3);
	assert_eq!(record.num_active(), 3);
	assert!(record.live_positions().all(|p| matches!(p, Position::InPopulation { population: 0, .. })));
}

#[test]
fn lineage_reports_timed_events() -> Result<()> {
	let mut record = AncestryRecord::new(false);
	record.add_root(Position::slot(2, 0), 0);
	{
		let mut lineage = Lineage::new(&mut record, 2, 10);
		lineage.tick();
		let child = lineage.birth(0, 1)?;
		lineage.tick();
		lineage.death(0);
		assert_eq!(lineage.time(), 12);
		let node = lineage.record().node(child).expect("child stored");
		assert_eq!(node.origin_time, 11);
	}
	let root = record.nodes().next().expect("root kept");
	assert_eq!(root.destruction_time, Some(12));
	let summary = record.summary();
	assert_eq!(summary.num_active, 1);
	assert_eq!(summary.num_roots, 1);
	assert_eq!(summary.ave_depth, 1.0);
	assert_eq!(summary.mrca_depth, Some(1));
	Ok(())
}

#[test]
fn diversity_of_active_nodes() -> Result<()> {
	let mut record = AncestryRecord::new(true);
	assert_eq!(record.diversity(), 0.0);
	assert_eq!(record.phylogenetic_diversity(), 0);

	record.add_root(Position::slot(0, 0), 0);
	record.add_child(Position::slot(0, 1), Position::slot(0, 0), 1)?;
	record.add_child(Position::slot(0, 2), Position::slot(0, 0), 2)?;
	record.add_child(Position::slot(0, 3), Position::slot(0, 1), 3)?;
	// groups of 1 (root), 2 (children of root) and 1 (child of slot 1)
	assert!((record.diversity() - 1.5).abs() < 1e-12);
	assert_eq!(record.phylogenetic_diversity(), 3);

	record.retire(Position::slot(0, 0), 4);
	record.retire(Position::slot(0, 1), 4);
	let summary = record.summary();
	assert!((summary.diversity - 1.0).abs() < 1e-12);
	// retired ancestors still carry the paths
	assert_eq!(summary.phylogenetic_diversity, 3);

	record.retire(Position::slot(0, 2), 5);
	assert_eq!(record.diversity(), 0.0);
	assert_eq!(record.phylogenetic_diversity(), 2);
	Ok(())
}

#[test]
fn separate_roots_share_no_branches() {
	let mut record = AncestryRecord::new(false);
	record.add_root(Position::slot(0, 0), 0);
	record.add_root(Position::slot(1, 0), 0);
	let summary = record.summary();
	assert!((summary.diversity - 1.0).abs() < 1e-12);
	assert_eq!(summary.phylogenetic_diversity, 0);
	assert_eq!(summary.mrca_depth, None);
}

#[test]
fn transfer_positions_are_distinct_from_slots() {
	let transfer = Position::Transfer { epoch: 0, sequence: 0 };
	assert!(transfer.is_transfer());
	assert_ne!(transfer, Position::slot(0, 0));
	assert_eq!(transfer.to_string(), "transfer 0 of epoch 0");
}

#[derive(Debug, Clone)]
enum Event {
	Birth { parent: usize, child: usize },
	Death(usize),
}

fn events() -> impl Strategy<Value = Vec<Event>> {
	prop::collection::vec(
		prop_oneof![
			(0usize..6, 0usize..6).prop_map(|(parent, child)| Event::Birth { parent, child }),
			(0usize..6).prop_map(Event::Death),
		],
		0..60,
	)
}

proptest! {
	#[test]
	fn record_stays_connected(events in events(), prune in any::<bool>()) {
		let mut record = AncestryRecord::new(prune);
		record.add_root(Position::slot(0, 0), 0);
		for (time, event) in events.into_iter().enumerate() {
			match event {
				Event::Birth { parent, child } => {
					// births from empty slots are rejected and leave the record untouched
					let _ = record.add_child(Position::slot(0, child), Position::slot(0, parent), time);
				}
				Event::Death(slot) => {
					record.retire(Position::slot(0, slot), time);
				}
			}
			prop_assert!(record.is_connected());
			let active = record.nodes().filter(|n| n.is_active()).count();
			prop_assert_eq!(active, record.num_active());
			let summary = record.summary();
			prop_assert!(summary.phylogenetic_diversity < summary.num_stored.max(1));
			prop_assert!(summary.diversity <= (active.max(1) as f64).log2() + 1e-9);
		}
	}
}
