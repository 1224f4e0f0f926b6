use std::{rc::Rc, time::Instant};

use bnum::types::U512;
use cube_geometry::{Puzzle, PuzzleState};
use fxhash::{FxHashMap, FxHashSet};
use log::{debug, info, trace};
use thiserror::Error;

use crate::{
    action::{Action, PuzzleGroup},
    block_set::BlockSet,
    config::ChainConfig,
    filter::{Filter, FilterOutcome, GeneratorFilter, StabilizingOrder},
    permutation_map::PermutationMap,
    short_words::ShortWordTable,
    start, success, working,
};

/// A stabilizer chain over the pieces of a puzzle. Step `k` fixes the pieces
/// of steps `0..k` and records, for every configuration its own pieces can
/// reach, an action reaching it from solved.
pub struct StabilizerChain<P: Puzzle> {
    group: Rc<PuzzleGroup<P>>,
    order: Rc<StabilizingOrder>,
    head: Option<Box<ChainStep<P>>>,
    short_words: Option<ShortWordTable<P>>,
}

struct ChainStep<P: Puzzle> {
    index: usize,
    /// The pieces fixed by every earlier step
    stabilized: BlockSet,
    /// The pieces this step fixes
    to_stabilize: BlockSet,
    filter: Filter<P>,
    reps: Vec<CosetRep<P>>,
    /// Indices into `reps`, keyed by the configuration each one reaches
    orbit: FxHashMap<BlockSet, usize>,
    /// Generators known to add nothing, never offered again
    rejected: FxHashSet<PermutationMap>,
    next: Option<Box<ChainStep<P>>>,
}

struct CosetRep<P: Puzzle> {
    block: BlockSet,
    action: Action<P>,
    inverse: Action<P>,
}

/// What one chain step holds after building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSummary {
    pub index: usize,
    pub stickers: usize,
    pub orbit_size: usize,
    pub generators: usize,
    pub generator_bound: usize,
    pub rejected: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("The state is not a rearrangement of the puzzle's pieces")]
    InvalidState,
    #[error("Chain step {step} never reached the configuration of its pieces")]
    ConfigurationNotInOrbit { step: usize },
    #[error("The state left after the last chain step is not solved")]
    ResidueNotSolved,
}

/// The actions undoing a scramble, one per chain step.
pub struct Solution<P: Puzzle> {
    group: Rc<PuzzleGroup<P>>,
    steps: Vec<SolutionStep<P>>,
}

pub struct SolutionStep<P: Puzzle> {
    pub action: Action<P>,
    /// The state after performing `action`
    pub state: PuzzleState,
}

impl<P: Puzzle> StabilizerChain<P> {
    /// Partition the pieces of the puzzle into chain steps. The chain knows no
    /// generators until `build` or `add_generator` is called.
    ///
    /// # Panics
    ///
    /// If two pieces of the puzzle share a sticker slot.
    #[must_use]
    pub fn new(group: Rc<PuzzleGroup<P>>, config: &ChainConfig) -> Self {
        let puzzle = group.puzzle();
        let solved = group.solved();

        let chunks = puzzle
            .pieces()
            .chunks(config.pieces_per_step.max(1))
            .map(|pieces| {
                pieces
                    .iter()
                    .flat_map(|piece| piece.slots.iter().copied())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let order = Rc::new(StabilizingOrder::new(
            chunks.concat(),
            puzzle.slot_count(),
        ));

        let mut stabilized = BlockSet::empty(solved.clone());
        let mut steps = vec![];
        for (index, slots) in chunks.into_iter().enumerate() {
            let to_stabilize = BlockSet::new(slots, solved.clone());
            let filter = Filter::new(
                config.filter,
                Rc::clone(&group),
                Rc::clone(&order),
                stabilized.len(),
            );
            let next_stabilized = stabilized
                .merge(&to_stabilize)
                .expect("pieces do not share sticker slots");
            steps.push(ChainStep::new(
                index,
                stabilized,
                to_stabilize,
                filter,
                group.identity(),
            ));
            stabilized = next_stabilized;
        }

        let head = steps.into_iter().rev().fold(None, |next, mut step| {
            step.next = next;
            Some(Box::new(step))
        });

        let short_words = (config.short_word_depth > 0)
            .then(|| ShortWordTable::new(puzzle, config.short_word_depth));

        StabilizerChain {
            group,
            order,
            head,
            short_words,
        }
    }

    /// Create a chain for `puzzle` and feed it the puzzle's generators.
    #[must_use]
    pub fn from_puzzle(puzzle: P, config: &ChainConfig) -> Self {
        let mut chain = StabilizerChain::new(PuzzleGroup::new(puzzle, config), config);
        chain.build();
        chain
    }

    pub fn group(&self) -> &Rc<PuzzleGroup<P>> {
        &self.group
    }

    pub fn stabilizing_order(&self) -> &StabilizingOrder {
        &self.order
    }

    /// The short word table of this session, if one was configured.
    pub fn short_words(&self) -> Option<&ShortWordTable<P>> {
        self.short_words.as_ref()
    }

    /// Feed every generator of the puzzle to the chain.
    pub fn build(&mut self) {
        info!(
            start!("Building a stabilizer chain over {} steps"),
            self.steps().count()
        );
        let start = Instant::now();

        for generator in self.group.generators() {
            debug!(working!("Adding generator {}"), generator);
            self.add_generator(generator);
        }

        for summary in self.step_summaries() {
            debug!(
                "Step {}: {} stickers, orbit of {}, {} of at most {} generators, {} rejected",
                summary.index,
                summary.stickers,
                summary.orbit_size,
                summary.generators,
                summary.generator_bound,
                summary.rejected,
            );
        }
        info!(
            success!("Built a stabilizer chain for a group of order {} in {:.3}s"),
            self.order(),
            start.elapsed().as_secs_f64()
        );
    }

    /// Extend the chain so that it also represents `generator`.
    pub fn add_generator(&mut self, generator: Action<P>) {
        if let Some(head) = &mut self.head {
            head.add_generator(&self.group, generator);
        }
    }

    fn steps(&self) -> impl Iterator<Item = &ChainStep<P>> {
        std::iter::successors(self.head.as_deref(), |step| step.next.as_deref())
    }

    /// Whether `action` lies in the group the chain represents.
    #[must_use]
    pub fn is_member(&self, action: &Action<P>) -> bool {
        match &self.head {
            Some(head) => head.sifts(&self.group, action.map().clone()),
            None => action.is_identity(),
        }
    }

    /// The order of the represented group: the product of the orbit sizes.
    #[must_use]
    pub fn order(&self) -> U512 {
        self.steps().fold(U512::ONE, |order, step| {
            order * U512::from_digit(step.orbit.len() as u64)
        })
    }

    #[must_use]
    pub fn step_summaries(&self) -> Vec<StepSummary> {
        self.steps()
            .map(|step| StepSummary {
                index: step.index,
                stickers: step.to_stabilize.len(),
                orbit_size: step.orbit.len(),
                generators: step.filter.len(),
                generator_bound: step.filter.bound(),
                rejected: step.rejected.len(),
            })
            .collect()
    }

    /// Decompose `state` into one coset representative inverse per chain
    /// step. Performing the actions in order on `state` solves it.
    ///
    /// # Errors
    ///
    /// If `state` is not a piece rearrangement or lies outside of the group
    /// the chain represents.
    ///
    /// # Panics
    ///
    /// If verification is enabled and the combined solution does not solve
    /// `state`.
    pub fn solve(&self, state: &PuzzleState) -> Result<Solution<P>, SolveError> {
        let puzzle = self.group.puzzle();
        let solved = self.group.solved();
        if !puzzle.is_same_piece_arrangement(state, solved) {
            return Err(SolveError::InvalidState);
        }

        info!(start!("Solving with {} chain steps"), self.steps().count());
        let start = Instant::now();

        let mut current = state.clone();
        let mut steps = vec![];
        for step in self.steps() {
            let block = step.to_stabilize.with_state(current);
            let Some(&rep) = step.orbit.get(&block) else {
                return Err(SolveError::ConfigurationNotInOrbit { step: step.index });
            };
            let action = step.reps[rep].inverse.clone();
            trace!("Step {}: coset {rep}, {} moves", step.index, action.count());
            current = action.apply(block.state());
            steps.push(SolutionStep {
                action,
                state: current.clone(),
            });
        }

        if current != *solved {
            return Err(SolveError::ResidueNotSolved);
        }

        let solution = Solution {
            group: Rc::clone(&self.group),
            steps,
        };
        if self.group.verify() {
            assert_eq!(
                solution.combined().apply(state),
                *solved,
                "the combined solution does not solve the state"
            );
        }

        info!(
            success!("Solved in {:.3}s with {} moves"),
            start.elapsed().as_secs_f64(),
            solution.move_count()
        );
        Ok(solution)
    }
}

impl<P: Puzzle> ChainStep<P> {
    fn new(
        index: usize,
        stabilized: BlockSet,
        to_stabilize: BlockSet,
        filter: Filter<P>,
        identity: Action<P>,
    ) -> Self {
        let mut orbit = FxHashMap::default();
        orbit.insert(to_stabilize.clone(), 0);
        ChainStep {
            index,
            stabilized,
            reps: vec![CosetRep {
                block: to_stabilize.clone(),
                action: identity.clone(),
                inverse: identity,
            }],
            to_stabilize,
            filter,
            orbit,
            rejected: FxHashSet::default(),
            next: None,
        }
    }

    fn add_generator(&mut self, group: &Rc<PuzzleGroup<P>>, generator: Action<P>) {
        if group.verify() {
            assert!(
                self.stabilized.apply(&generator) == self.stabilized,
                "step {}: a generator moves pieces fixed by earlier steps",
                self.index
            );
        }

        let map = generator.map();
        if map.is_identity() || self.rejected.contains(map) {
            return;
        }
        if self.sifts(group, map.clone()) {
            self.rejected.insert(map.clone());
            return;
        }

        let map = map.clone();
        let added = match self.filter.insert(generator) {
            FilterOutcome::Redundant => {
                self.rejected.insert(map);
                return;
            }
            FilterOutcome::Accepted { added, evicted } => {
                trace!(
                    "Step {}: {} generators added, {} evicted",
                    self.index,
                    added.len(),
                    evicted.len()
                );
                added
            }
        };

        let orbit_size = self.orbit.len();
        let candidates = self.explore(&added);
        if self.orbit.len() > orbit_size {
            trace!(
                "Step {}: orbit grew from {orbit_size} to {}",
                self.index,
                self.orbit.len()
            );
        }

        match &mut self.next {
            Some(next) => {
                for candidate in candidates {
                    next.add_generator(group, candidate);
                }
            }
            None => {
                if group.verify() {
                    assert!(
                        candidates.iter().all(Action::is_identity),
                        "the last chain step has a nontrivial stabilizer"
                    );
                }
            }
        }
    }

    /// Grow the orbit with the generating set, breadth first, and return the
    /// Schreier generators `rep(s·r)⁻¹·s·r` of every pair involving a new
    /// generator or a new coset representative.
    fn explore(&mut self, added: &[Action<P>]) -> Vec<Action<P>> {
        let generators = self.filter.generators().cloned().collect::<Vec<_>>();
        let known = self.reps.len();
        let mut pairs = vec![];

        for generator in added {
            for rep in 0..known {
                self.visit(generator, rep, &mut pairs);
            }
        }
        let mut rep = known;
        while rep < self.reps.len() {
            for generator in &generators {
                self.visit(generator, rep, &mut pairs);
            }
            rep += 1;
        }

        pairs
            .into_iter()
            .map(|(generator, rep, target)| {
                self.reps[target]
                    .inverse
                    .multiply(&generator.multiply(&self.reps[rep].action))
            })
            .collect()
    }

    /// Follow `generator` from the coset of `rep`. A configuration seen for
    /// the first time gets a new coset representative; a known one yields a
    /// Schreier pair.
    fn visit(
        &mut self,
        generator: &Action<P>,
        rep: usize,
        pairs: &mut Vec<(Action<P>, usize, usize)>,
    ) {
        let block = self.reps[rep].block.apply(generator);
        if let Some(&target) = self.orbit.get(&block) {
            pairs.push((generator.clone(), rep, target));
            return;
        }

        let action = generator.multiply(&self.reps[rep].action);
        let inverse = action.invert();
        self.orbit.insert(block.clone(), self.reps.len());
        self.reps.push(CosetRep {
            block,
            action,
            inverse,
        });
    }

    /// Strip coset representatives off `map` from this step down. The map is
    /// a member if nothing is left.
    fn sifts(&self, group: &PuzzleGroup<P>, mut map: PermutationMap) -> bool {
        let puzzle = group.puzzle();
        let solved = group.solved();

        let mut step = Some(self);
        while let Some(current) = step {
            let block = current
                .to_stabilize
                .with_state(map.apply(puzzle, solved));
            let Some(&rep) = current.orbit.get(&block) else {
                return false;
            };
            map = current.reps[rep].inverse.map().compose(&map);
            step = current.next.as_deref();
        }

        map.is_identity()
    }
}

impl<P: Puzzle> Solution<P> {
    pub fn steps(&self) -> &[SolutionStep<P>] {
        &self.steps
    }

    /// All steps as one action.
    #[must_use]
    pub fn combined(&self) -> Action<P> {
        self.steps
            .iter()
            .fold(self.group.identity(), |combined, step| {
                step.action.multiply(&combined)
            })
    }

    /// The total number of moves over all steps, before simplification.
    #[must_use]
    pub fn move_count(&self) -> usize {
        self.steps
            .iter()
            .map(|step| step.action.count())
            .fold(0, usize::saturating_add)
    }
}
