mod common;

use common::MockPopulation;
use petri::{phylogeny::Position, prelude::*};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

fn population(slots: Vec<Option<u32>>) -> MockPopulation {
	let mut pop = MockPopulation::new(PopulationSeed { index: 0, seed: 0 }, slots.len(), 0.0);
	pop.slots = slots;
	pop
}

#[test]
fn full_takes_every_occupied_slot_in_order() {
	let pop = population(vec![Some(4), None, Some(6), Some(7)]);
	let mut rng = Pcg64Mcg::seed_from_u64(1);
	let propagule = SamplePolicy::Full.sample(&mut rng, &pop, 3);
	assert_eq!(propagule.source, 3);
	let genomes: Vec<u32> = propagule.iter().map(|m| m.genome).collect();
	assert_eq!(genomes, vec![4, 6, 7]);
	let origins: Vec<Position> = propagule.iter().map(|m| m.origin).collect();
	assert_eq!(
		origins,
		vec![Position::slot(3, 0), Position::slot(3, 2), Position::slot(3, 3)]
	);
	assert!(propagule.iter().all(|m| m.transfer.is_none()));
}

#[test]
fn random_is_bounded_by_occupancy() {
	let pop = population(vec![None, Some(1), None, Some(2)]);
	let mut rng = Pcg64Mcg::seed_from_u64(7);
	let propagule = SamplePolicy::Random { size: 10 }.sample(&mut rng, &pop, 0);
	assert_eq!(propagule.len(), 2);
	assert_eq!(SamplePolicy::Random { size: 10 }.max_len(4), 4);
	assert_eq!(SamplePolicy::Full.max_len(4), 4);
}

#[test]
fn sampling_leaves_the_source_intact() {
	let pop = population(vec![Some(1), Some(2), Some(3)]);
	let mut rng = Pcg64Mcg::seed_from_u64(2);
	SamplePolicy::Random { size: 2 }.sample(&mut rng, &pop, 0);
	assert_eq!(pop.genomes(), vec![1, 2, 3]);
}

proptest! {
	#[test]
	fn random_samples_distinct_occupied_slots(
		slots in prop::collection::vec(prop::option::of(0u32..100), 1..20),
		size in 1usize..8,
		seed in any::<u64>()
	) {
		let occupied = slots.iter().filter(|s| s.is_some()).count();
		prop_assume!(occupied > 0);
		let pop = population(slots.clone());
		let mut rng = Pcg64Mcg::seed_from_u64(seed);
		let propagule = SamplePolicy::Random { size }.sample(&mut rng, &pop, 0);

		prop_assert_eq!(propagule.len(), size.min(occupied));
		let max_len = SamplePolicy::Random { size }.max_len(pop.capacity());
		prop_assert!(propagule.len() <= max_len);
		let mut seen = std::collections::HashSet::new();
		for member in propagule.iter() {
			let Position::InPopulation { slot, .. } = member.origin else {
				return Err(TestCaseError::fail("transfer origin"));
			};
			prop_assert!(seen.insert(slot));
			prop_assert_eq!(slots[slot], Some(member.genome));
		}
	}
}
