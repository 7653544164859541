//! Population Selection Schemes
//! See [Selector] for more info.

use rand::{
	seq::{index, IndexedRandom, SliceRandom},
	Rng,
};

use crate::scores::ScoreSet;

/// Chooses which populations propagate into the next epoch. Called once per epoch with that
/// epoch's scores; must return exactly `n` indices into the score set.
pub trait Selector {
	fn select<R: Rng + ?Sized>(&self, rng: &mut R, scores: &ScoreSet, n: usize) -> Vec<usize>;
}

/// Every supported selection scheme with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionScheme {
	/// The `count` best populations by aggregate score fill the slots in turn. A count of 0
	/// acts as 1.
	Elite { count: usize },
	/// Best aggregate score out of `size` populations drawn without replacement. With `size`
	/// covering every population each draw is `Elite { count: 1 }`.
	Tournament { size: usize },
	/// Filters on shuffled objectives until one candidate survives.
	Lexicase { epsilon: f64 },
	/// Uniform draws from the Pareto front.
	NonDominatedElite,
	/// Uniform draw from the Pareto front of each tournament.
	NonDominatedTournament { size: usize },
	/// Uniform draws with replacement.
	Random,
	/// No selection pressure: population `i` propagates itself.
	None,
}

impl SelectionScheme {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Elite { .. } => "elite",
			Self::Tournament { .. } => "tournament",
			Self::Lexicase { .. } => "lexicase",
			Self::NonDominatedElite => "non-dominated-elite",
			Self::NonDominatedTournament { .. } => "non-dominated-tournament",
			Self::Random => "random",
			Self::None => "none",
		}
	}
}

impl Selector for SelectionScheme {
	fn select<R: Rng + ?Sized>(&self, rng: &mut R, scores: &ScoreSet, n: usize) -> Vec<usize> {
		if scores.is_empty() {
			return Vec::new();
		}
		match *self {
			Self::Elite { count } => elite(scores, count, n),
			Self::Tournament { size } => (0..n).map(|_| tournament(rng, scores, size)).collect(),
			Self::Lexicase { epsilon } => (0..n).map(|_| lexicase(rng, scores, epsilon)).collect(),
			Self::NonDominatedElite => non_dominated_elite(rng, scores, n),
			Self::NonDominatedTournament { size } => (0..n)
				.map(|_| non_dominated_tournament(rng, scores, size))
				.collect(),
			Self::Random => (0..n).map(|_| rng.random_range(0..scores.len())).collect(),
			Self::None => (0..n).collect(),
		}
	}
}

fn elite(scores: &ScoreSet, count: usize, n: usize) -> Vec<usize> {
	let ranked = scores.ranked();
	let elites = &ranked[..count.clamp(1, ranked.len())];
	(0..n).map(|i| elites[i % elites.len()]).collect()
}

/// Draws `size` distinct populations (all of them if `size` is larger), in draw order.
fn draw<R: Rng + ?Sized>(rng: &mut R, num_pops: usize, size: usize) -> Vec<usize> {
	index::sample(rng, num_pops, size.clamp(1, num_pops)).into_vec()
}

fn tournament<R: Rng + ?Sized>(rng: &mut R, scores: &ScoreSet, size: usize) -> usize {
	if size >= scores.len() {
		return scores.ranked()[0];
	}
	let entrants = draw(rng, scores.len(), size);
	let mut winner = entrants[0];
	for &e in &entrants[1..] {
		if scores.aggregate[e] > scores.aggregate[winner] {
			winner = e; // strictly better only, so the first drawn keeps ties
		}
	}
	winner
}

fn lexicase<R: Rng + ?Sized>(rng: &mut R, scores: &ScoreSet, epsilon: f64) -> usize {
	let mut candidates: Vec<usize> = (0..scores.len()).collect();
	let mut order: Vec<usize> = (0..scores.num_objectives()).collect();
	order.shuffle(rng);
	for obj in order {
		if candidates.len() == 1 {
			break;
		}
		let best = candidates
			.iter()
			.map(|&c| scores.objectives[c][obj])
			.fold(f64::NEG_INFINITY, f64::max);
		let survivors: Vec<usize> = candidates
			.iter()
			.copied()
			.filter(|&c| scores.objectives[c][obj] >= best - epsilon)
			.collect();
		if !survivors.is_empty() {
			candidates = survivors; // all-NaN objectives don't narrow
		}
	}
	*candidates.choose(rng).expect("lexicase keeps at least the best candidate")
}

fn non_dominated_elite<R: Rng + ?Sized>(rng: &mut R, scores: &ScoreSet, n: usize) -> Vec<usize> {
	let everyone: Vec<usize> = (0..scores.len()).collect();
	let front = scores.pareto_front(&everyone);
	if front.len() >= n {
		index::sample(rng, front.len(), n)
			.into_iter()
			.map(|i| front[i])
			.collect()
	} else {
		(0..n)
			.map(|_| *front.choose(rng).expect("pareto front is never empty"))
			.collect()
	}
}

fn non_dominated_tournament<R: Rng + ?Sized>(rng: &mut R, scores: &ScoreSet, size: usize) -> usize {
	let entrants = if size >= scores.len() {
		(0..scores.len()).collect()
	} else {
		draw(rng, scores.len(), size)
	};
	let front = scores.pareto_front(&entrants);
	*front.choose(rng).expect("pareto front is never empty")
}
