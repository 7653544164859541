//! Shared ancestry record spanning every population and epoch.
//!
//! Individuals are tracked by [Position] while they are alive and by [NodeId] forever after.
//! Node ids are handed out in increasing order and never reused. Propagule members get their
//! own [Position::Transfer] identity while in transit, so they can't collide with anything
//! living in a population.

use std::collections::{BTreeMap, HashMap, HashSet};

use derive_more::derive::{Display, From, Into};
use serde::Serialize;

use crate::error::{Error, Result};

/// Where a tracked individual currently lives.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Position {
	#[display("population {population} slot {slot}")]
	InPopulation { population: usize, slot: usize },
	#[display("transfer {sequence} of epoch {epoch}")]
	Transfer { epoch: usize, sequence: usize },
}

impl Position {
	pub fn slot(population: usize, slot: usize) -> Self {
		Self::InPopulation { population, slot }
	}

	pub fn is_transfer(&self) -> bool {
		matches!(self, Self::Transfer { .. })
	}
}

/// Permanent identity of an ancestry node.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, From, Into)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Serialize)]
pub struct AncestryNode {
	pub id: NodeId,
	pub parent: Option<NodeId>,
	pub depth: usize,
	/// Position the node was created at.
	pub origin: Position,
	pub origin_time: usize,
	/// Set once the individual dies or, for transfer nodes, once its propagule was consumed.
	pub destruction_time: Option<usize>,
	#[serde(skip)]
	children: usize, // child nodes still stored
}

impl AncestryNode {
	pub fn is_active(&self) -> bool {
		self.destruction_time.is_none()
	}

	pub fn is_root(&self) -> bool {
		self.parent.is_none()
	}

	/// Number of child nodes currently stored.
	pub fn num_children(&self) -> usize {
		self.children
	}
}

/// Summary statistics of the ancestry record at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AncestrySummary {
	/// Nodes whose individual is still alive.
	pub num_active: usize,
	/// Nodes currently stored (active plus retired ancestors of active ones).
	pub num_stored: usize,
	/// Nodes ever created.
	pub total_nodes: u64,
	pub num_roots: usize,
	/// Mean depth of active nodes.
	pub ave_depth: f64,
	/// Depth of the most recent common ancestor of every active node, if they share one.
	pub mrca_depth: Option<usize>,
	/// Shannon entropy in bits of active nodes grouped by parent.
	pub diversity: f64,
	/// Edges of the tree connecting every active node to its root.
	pub phylogenetic_diversity: usize,
	/// Times [AncestryRecord::update] has run.
	pub updates: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AncestryRecord {
	nodes: BTreeMap<NodeId, AncestryNode>,
	live: HashMap<Position, NodeId>,
	next_id: u64,
	prune: bool,
	updates: usize,
}

impl AncestryRecord {
	/// Creates an empty record. With `prune`, retired nodes are dropped as soon as nothing
	/// stored descends from them.
	pub fn new(prune: bool) -> Self {
		Self {
			prune,
			..Default::default()
		}
	}

	fn insert(&mut self, origin: Position, parent: Option<NodeId>, time: usize) -> NodeId {
		let id = NodeId(self.next_id);
		self.next_id += 1;
		let depth = match parent {
			Some(p) => {
				let par = self.nodes.get_mut(&p).expect("parent of a new node is stored");
				par.children += 1;
				par.depth + 1
			}
			None => 0,
		};
		self.nodes.insert(
			id,
			AncestryNode {
				id,
				parent,
				depth,
				origin,
				origin_time: time,
				destruction_time: None,
				children: 0,
			},
		);
		if let Some(prev) = self.live.insert(origin, id) {
			self.retire_node(prev, time);
		}
		id
	}

	/// Records a founder with no parent at `position`, replacing whatever lived there.
	pub fn add_root(&mut self, position: Position, time: usize) -> NodeId {
		self.insert(position, None, time)
	}

	/// Records a new individual at `position` descended from whatever currently lives at
	/// `parent`. The parent may share the child's position; it is looked up before replacement.
	pub fn add_child(&mut self, position: Position, parent: Position, time: usize) -> Result<NodeId> {
		let parent_id = self
			.live
			.get(&parent)
			.copied()
			.ok_or(Error::MissingAncestor { position: parent })?;
		Ok(self.insert(position, Some(parent_id), time))
	}

	/// Marks the individual at `position` dead. Returns its node, if one was tracked there.
	pub fn retire(&mut self, position: Position, time: usize) -> Option<NodeId> {
		let id = self.live.remove(&position)?;
		self.retire_node(id, time);
		Some(id)
	}

	/// Retires every individual of one population, e.g. when it is reset.
	pub fn retire_population(&mut self, population: usize, time: usize) -> usize {
		let mut positions: Vec<Position> = self
			.live
			.keys()
			.filter(|p| matches!(p, Position::InPopulation { population: pop, .. } if *pop == population))
			.copied()
			.collect();
		positions.sort_unstable();
		for &pos in &positions {
			self.retire(pos, time);
		}
		positions.len()
	}

	fn retire_node(&mut self, id: NodeId, time: usize) {
		let Some(node) = self.nodes.get_mut(&id) else {
			return;
		};
		node.destruction_time.get_or_insert(time);
		if self.prune && node.children == 0 {
			self.prune_from(id);
		}
	}

	/// Removes a childless retired node and any ancestors left childless and retired by it.
	fn prune_from(&mut self, mut id: NodeId) {
		loop {
			let Some(node) = self.nodes.get(&id) else {
				return;
			};
			if node.is_active() || node.children > 0 {
				return;
			}
			let parent = node.parent;
			self.nodes.remove(&id);
			let Some(p) = parent else {
				return;
			};
			match self.nodes.get_mut(&p) {
				Some(par) => par.children -= 1,
				None => return,
			}
			id = p;
		}
	}

	/// Advances per-epoch bookkeeping. Called once per epoch after transfer nodes are retired.
	pub fn update(&mut self) {
		self.updates += 1;
	}

	pub fn node(&self, id: NodeId) -> Option<&AncestryNode> {
		self.nodes.get(&id)
	}

	/// The node of the individual currently living at `position`.
	pub fn node_at(&self, position: Position) -> Option<&AncestryNode> {
		self.live.get(&position).and_then(|id| self.nodes.get(id))
	}

	/// Every stored node in id order.
	pub fn nodes(&self) -> impl Iterator<Item = &AncestryNode> {
		self.nodes.values()
	}

	/// Every live position, in no particular order.
	pub fn live_positions(&self) -> impl Iterator<Item = &Position> {
		self.live.keys()
	}

	/// The chain of stored ancestors of `id`, starting with its parent.
	pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &AncestryNode> {
		let mut next = self.nodes.get(&id).and_then(|n| n.parent);
		std::iter::from_fn(move || {
			let node = self.nodes.get(&next?)?;
			next = node.parent;
			Some(node)
		})
	}

	/// Whether every stored node's parent is stored too, so each active individual traces back
	/// to a founder.
	pub fn is_connected(&self) -> bool {
		self.nodes
			.values()
			.all(|n| n.parent.map_or(true, |p| self.nodes.contains_key(&p)))
			&& self.live.values().all(|id| self.nodes.contains_key(id))
	}

	pub fn num_active(&self) -> usize {
		self.live.len()
	}

	pub fn total_nodes(&self) -> u64 {
		self.next_id
	}

	pub fn updates(&self) -> usize {
		self.updates
	}

	/// Depth of the deepest node that is an ancestor of (or equal to) every active node.
	pub fn mrca_depth(&self) -> Option<usize> {
		let active = self.live.len();
		if active == 0 {
			return None;
		}
		let mut covers: HashMap<NodeId, usize> = HashMap::new();
		for &id in self.live.values() {
			*covers.entry(id).or_default() += 1;
			for anc in self.ancestors(id) {
				*covers.entry(anc.id).or_default() += 1;
			}
		}
		covers
			.into_iter()
			.filter(|&(_, c)| c == active)
			.filter_map(|(id, _)| self.nodes.get(&id).map(|n| n.depth))
			.max()
	}

	/// Shannon entropy in bits of the active nodes, grouping siblings by their parent. A root
	/// that is still active counts as its own group.
	pub fn diversity(&self) -> f64 {
		let mut groups: HashMap<NodeId, usize> = HashMap::new();
		for node in self.live.values().filter_map(|id| self.nodes.get(id)) {
			*groups.entry(node.parent.unwrap_or(node.id)).or_default() += 1;
		}
		let total = self.live.len() as f64;
		groups
			.into_values()
			.map(|count| {
				let count = count as f64;
				count / total * (total / count).log2()
			})
			.sum()
	}

	/// Faith's phylogenetic diversity with unit branch lengths: the number of parent links on
	/// the union of every active node's path back to its root.
	pub fn phylogenetic_diversity(&self) -> usize {
		let mut seen: HashSet<NodeId> = HashSet::new();
		let mut edges = 0;
		for &id in self.live.values() {
			let mut next = Some(id);
			while let Some(node) = next.and_then(|id| self.nodes.get(&id)) {
				if !seen.insert(node.id) {
					break;
				}
				if node.parent.is_some() {
					edges += 1;
				}
				next = node.parent;
			}
		}
		edges
	}

	pub fn summary(&self) -> AncestrySummary {
		let num_active = self.live.len();
		let depth_sum: usize = self
			.live
			.values()
			.filter_map(|id| self.nodes.get(id))
			.map(|n| n.depth)
			.sum();
		AncestrySummary {
			num_active,
			num_stored: self.nodes.len(),
			total_nodes: self.next_id,
			num_roots: self.nodes.values().filter(|n| n.is_root()).count(),
			ave_depth: if num_active == 0 {
				0.0
			} else {
				depth_sum as f64 / num_active as f64
			},
			mrca_depth: self.mrca_depth(),
			diversity: self.diversity(),
			phylogenetic_diversity: self.phylogenetic_diversity(),
			updates: self.updates,
		}
	}
}

/// Handle a population uses to report births and deaths while it advances. Only handed out on
/// the sequential path, so the record has a single writer.
pub struct Lineage<'a> {
	record: &'a mut AncestryRecord,
	population: usize,
	time: usize,
}

impl<'a> Lineage<'a> {
	pub fn new(record: &'a mut AncestryRecord, population: usize, time: usize) -> Self {
		Self {
			record,
			population,
			time,
		}
	}

	pub fn population(&self) -> usize {
		self.population
	}

	pub fn time(&self) -> usize {
		self.time
	}

	/// Advances the timestamp given to subsequent events by one internal step.
	pub fn tick(&mut self) {
		self.time += 1;
	}

	/// Records an offspring of the individual at `parent_slot` placed at `child_slot`.
	pub fn birth(&mut self, parent_slot: usize, child_slot: usize) -> Result<NodeId> {
		self.record.add_child(
			Position::slot(self.population, child_slot),
			Position::slot(self.population, parent_slot),
			self.time,
		)
	}

	/// Records the death of the individual at `slot`.
	pub fn death(&mut self, slot: usize) {
		self.record
			.retire(Position::slot(self.population, slot), self.time);
	}

	pub fn record(&self) -> &AncestryRecord {
		self.record
	}
}
