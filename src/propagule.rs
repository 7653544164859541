//! Propagules: the small sets of genomes transferred from a selected population into the
//! population it reseeds.

use rand::{seq::SliceRandom, Rng};

use crate::{genetic::Population, phylogeny::Position};

/// How individuals are drawn from a source population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePolicy {
	/// Up to `size` occupied slots in random order.
	Random { size: usize },
	/// Every occupied slot in ascending order.
	Full,
}

/// A copy of one sampled genome, with where it came from and where it is stitched into the
/// ancestry while in transit.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferIndividual<G> {
	pub genome: G,
	pub origin: Position,
	pub transfer: Option<Position>,
}

/// Individuals bound for one destination population during one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Propagule<G> {
	/// Population the individuals were sampled from.
	pub source: usize,
	pub members: Vec<TransferIndividual<G>>,
}

impl<G> Propagule<G> {
	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &TransferIndividual<G>> {
		self.members.iter()
	}
}

impl SamplePolicy {
	/// Upper bound on the propagule size for a source of the given capacity.
	pub fn max_len(&self, capacity: usize) -> usize {
		match *self {
			Self::Random { size } => size.min(capacity),
			Self::Full => capacity,
		}
	}

	/// Copies individuals out of `pop` (population number `source`). The source is left intact.
	pub fn sample<P, R>(&self, rng: &mut R, pop: &P, source: usize) -> Propagule<P::Genome>
	where
		P: Population,
		R: Rng + ?Sized,
	{
		debug_assert!(!pop.is_extinct(), "sampling from an extinct population");
		let slots: Vec<usize> = match *self {
			Self::Random { size } => {
				let mut order: Vec<usize> = (0..pop.capacity()).collect();
				order.shuffle(rng);
				order
					.into_iter()
					.filter(|&s| pop.is_occupied(s))
					.take(size)
					.collect()
			}
			Self::Full => (0..pop.capacity()).filter(|&s| pop.is_occupied(s)).collect(),
		};
		let members = slots
			.into_iter()
			.filter_map(|slot| {
				pop.genome(slot).map(|g| TransferIndividual {
					genome: g.clone(),
					origin: Position::slot(source, slot),
					transfer: None,
				})
			})
			.collect();
		Propagule { source, members }
	}
}
