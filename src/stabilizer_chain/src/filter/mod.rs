//! Generator filters: keep a bounded generating set for a subgroup that fixes
//! a prefix of the stabilizing order, whatever stream of generators arrives.
//!
//! Every generator is classified by its action pair `(i, j)`: `i` is the
//! first position past the prefix that it moves and `j > i` is where `i`
//! goes. Generators fixing everything past the prefix are the identity.

use std::rc::Rc;

use cube_geometry::{Puzzle, Slot};
use itertools::Either;
use serde::{Deserialize, Serialize};

use crate::{
    action::{Action, PuzzleGroup},
    permutation_map::PermutationMap,
};

mod jerrum;
mod sims;

pub use jerrum::JerrumFilter;
pub use sims::SimsFilter;

/// Which generator filter the chain steps use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Spanning forest over the stabilizing order, at most `m - 1`
    /// generators for `m` remaining positions.
    #[default]
    Jerrum,
    /// One generator per action pair, at most `m(m - 1) / 2`.
    Sims,
}

/// The order in which sticker slots are stabilized by the chain.
#[derive(Debug)]
pub struct StabilizingOrder {
    slots: Box<[Slot]>,
    /// `positions[slot]` is the position of `slot` in `slots`
    positions: Box<[usize]>,
}

impl StabilizingOrder {
    /// # Panics
    ///
    /// If a slot appears twice or lies outside of the slot space.
    #[must_use]
    pub fn new(slots: Vec<Slot>, slot_count: usize) -> Self {
        let mut positions = vec![usize::MAX; slot_count].into_boxed_slice();
        for (position, &slot) in slots.iter().enumerate() {
            assert_eq!(
                std::mem::replace(&mut positions[slot as usize], position),
                usize::MAX,
                "slot {slot} appears twice in the stabilizing order"
            );
        }
        StabilizingOrder {
            slots: slots.into_boxed_slice(),
            positions,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn slot(&self, position: usize) -> Slot {
        self.slots[position]
    }

    #[must_use]
    pub fn position(&self, slot: Slot) -> Option<usize> {
        self.positions
            .get(slot as usize)
            .copied()
            .filter(|&position| position != usize::MAX)
    }

    /// The first position at or past `prefix` that `map` moves, and where it
    /// goes. `None` if `map` fixes every such position.
    #[must_use]
    pub fn action_pair(&self, map: &PermutationMap, prefix: usize) -> Option<(usize, usize)> {
        (prefix..self.len()).find_map(|position| {
            let slot = self.slots[position];
            let image = map.image(slot);
            (image != slot).then(|| {
                let target = self.positions[image as usize];
                debug_assert!(target > position, "a generator moved a stabilized slot");
                (position, target)
            })
        })
    }
}

/// The result of offering a generator to a filter.
pub enum FilterOutcome<P: Puzzle> {
    /// The generator lies in the group the filter already generates.
    Redundant,
    /// The generating set changed. `added` and `evicted` are what entered and
    /// left it; the generated group only grows.
    Accepted {
        added: Vec<Action<P>>,
        evicted: Vec<Action<P>>,
    },
}

pub trait GeneratorFilter<P: Puzzle> {
    /// Offer a generator. Generators must be offered in arrival order.
    fn insert(&mut self, generator: Action<P>) -> FilterOutcome<P>;

    /// The retained generating set.
    fn generators<'a>(&'a self) -> impl Iterator<Item = &'a Action<P>>
    where
        P: 'a;

    /// The number of retained generators.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most generators this filter can ever retain.
    fn bound(&self) -> usize;

    /// How many offered generators were redundant.
    fn rejected(&self) -> usize;
}

/// A generator filter of either kind.
pub enum Filter<P: Puzzle> {
    Jerrum(JerrumFilter<P>),
    Sims(SimsFilter<P>),
}

impl<P: Puzzle> Filter<P> {
    /// A filter for the subgroup fixing the first `prefix` positions of
    /// `order`.
    #[must_use]
    pub fn new(
        kind: FilterKind,
        group: Rc<PuzzleGroup<P>>,
        order: Rc<StabilizingOrder>,
        prefix: usize,
    ) -> Self {
        match kind {
            FilterKind::Jerrum => Filter::Jerrum(JerrumFilter::new(group, order, prefix)),
            FilterKind::Sims => Filter::Sims(SimsFilter::new(group, order, prefix)),
        }
    }
}

impl<P: Puzzle> GeneratorFilter<P> for Filter<P> {
    fn insert(&mut self, generator: Action<P>) -> FilterOutcome<P> {
        match self {
            Filter::Jerrum(filter) => filter.insert(generator),
            Filter::Sims(filter) => filter.insert(generator),
        }
    }

    fn generators<'a>(&'a self) -> impl Iterator<Item = &'a Action<P>>
    where
        P: 'a,
    {
        match self {
            Filter::Jerrum(filter) => Either::Left(filter.generators()),
            Filter::Sims(filter) => Either::Right(filter.generators()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Filter::Jerrum(filter) => filter.len(),
            Filter::Sims(filter) => filter.len(),
        }
    }

    fn bound(&self) -> usize {
        match self {
            Filter::Jerrum(filter) => filter.bound(),
            Filter::Sims(filter) => filter.bound(),
        }
    }

    fn rejected(&self) -> usize {
        match self {
            Filter::Jerrum(filter) => filter.rejected(),
            Filter::Sims(filter) => filter.rejected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use cube_geometry::{Cube, MoveSet};
    use fxhash::FxHashSet;

    use super::*;
    use crate::config::{ChainConfig, VerificationLevel};

    fn group(eager_threshold: usize) -> Rc<PuzzleGroup<Cube>> {
        PuzzleGroup::new(
            Cube::new(2, MoveSet::Faces).unwrap(),
            &ChainConfig {
                eager_threshold,
                verification: VerificationLevel::Always,
                ..ChainConfig::default()
            },
        )
    }

    fn piece_order(cube: &Cube) -> Rc<StabilizingOrder> {
        let slots = cube
            .pieces()
            .iter()
            .flat_map(|piece| piece.slots.iter().copied())
            .collect();
        Rc::new(StabilizingOrder::new(slots, cube.slot_count()))
    }

    /// Every element generated by `generators`.
    fn closure<'a>(
        group: &Rc<PuzzleGroup<Cube>>,
        generators: impl IntoIterator<Item = &'a Action<Cube>>,
    ) -> FxHashSet<PermutationMap> {
        let maps = generators
            .into_iter()
            .map(|generator| generator.map().clone())
            .collect::<Vec<_>>();
        let identity = group.identity().map().clone();
        let mut seen = FxHashSet::default();
        seen.insert(identity.clone());
        let mut queue = vec![identity];
        while let Some(element) = queue.pop() {
            for generator in &maps {
                let next = generator.compose(&element);
                if seen.insert(next.clone()) {
                    queue.push(next);
                }
            }
        }
        seen
    }

    /// Every element of the group generated by `generators`, as actions.
    fn elements(group: &Rc<PuzzleGroup<Cube>>, generators: &str) -> Vec<Action<Cube>> {
        let generators = generators
            .split_whitespace()
            .map(|name| group.parse(name).unwrap())
            .collect::<Vec<_>>();
        let mut seen = FxHashSet::default();
        let mut elements = vec![group.identity()];
        seen.insert(group.identity().map().clone());
        let mut index = 0;
        while index < elements.len() {
            for generator in &generators {
                let next = generator.multiply(&elements[index]);
                if seen.insert(next.map().clone()) {
                    elements.push(next);
                }
            }
            index += 1;
        }
        elements
    }

    #[test]
    fn action_pairs() {
        let group = group(32);
        let cube = group.puzzle();
        let order = piece_order(cube);
        assert_eq!(order.len(), 24);
        assert_eq!(order.position(order.slot(5)), Some(5));

        assert_eq!(order.action_pair(group.identity().map(), 0), None);

        // The first piece is never moved by `R` or `U`
        let r = group.parse("R").unwrap();
        let (i, j) = order.action_pair(r.map(), 0).unwrap();
        assert!(i >= 3);
        assert!(j > i);
        assert_eq!(order.slot(j), r.map().image(order.slot(i)));
        assert_eq!(order.action_pair(r.map(), i), Some((i, j)));
        assert_eq!(order.action_pair(r.map(), 24), None);
    }

    #[test]
    fn toy_groups_are_reproduced() {
        fastrand::seed(5);
        for (generators, size) in [("U2", 2), ("R", 4), ("R2 U2", 6)] {
            for kind in [FilterKind::Jerrum, FilterKind::Sims] {
                for prefix in [0, 3] {
                    let group = group(4);
                    let mut elements = elements(&group, generators);
                    assert_eq!(elements.len(), size);
                    fastrand::shuffle(&mut elements);

                    let mut filter =
                        Filter::new(kind, Rc::clone(&group), piece_order(group.puzzle()), prefix);
                    for element in elements.iter().chain(&elements) {
                        filter.insert(element.clone());
                        assert!(filter.len() <= filter.bound());
                    }

                    assert_eq!(closure(&group, filter.generators()).len(), size);
                    // The identity is offered twice
                    assert!(filter.rejected() >= 2);
                }
            }
        }
    }

    /// The retained generators of any filter, borrowed through the trait.
    fn retained<F: GeneratorFilter<Cube>>(filter: &F) -> Vec<&Action<Cube>> {
        filter.generators().collect()
    }

    #[test]
    fn generators_borrow_from_the_filter() {
        let group = group(32);
        let order = piece_order(group.puzzle());
        let mut jerrum = JerrumFilter::new(Rc::clone(&group), Rc::clone(&order), 0);
        let mut sims = SimsFilter::new(Rc::clone(&group), Rc::clone(&order), 0);
        for name in ["R", "U", "R U R'"] {
            jerrum.insert(group.parse(name).unwrap());
            sims.insert(group.parse(name).unwrap());
        }

        assert_eq!(retained(&jerrum).len(), jerrum.len());
        assert_eq!(retained(&sims).len(), sims.len());
        let filter = Filter::Jerrum(jerrum);
        let generators = retained(&filter);
        assert_eq!(generators.len(), filter.len());
        assert!(generators.iter().all(|generator| !generator.is_identity()));
    }

    #[test]
    fn identity_is_redundant() {
        let group = group(32);
        for kind in [FilterKind::Jerrum, FilterKind::Sims] {
            let mut filter = Filter::new(kind, Rc::clone(&group), piece_order(group.puzzle()), 0);
            assert!(matches!(
                filter.insert(group.parse("R R'").unwrap()),
                FilterOutcome::Redundant
            ));
            assert!(filter.is_empty());
            assert_eq!(filter.rejected(), 1);

            let FilterOutcome::Accepted { added, evicted } = filter.insert(group.parse("R").unwrap())
            else {
                panic!("a new generator was rejected");
            };
            assert_eq!(added, vec![group.parse("R").unwrap()]);
            assert!(evicted.is_empty());
            assert!(matches!(
                filter.insert(group.parse("R").unwrap()),
                FilterOutcome::Redundant
            ));
        }
    }

    #[test]
    fn jerrum_is_tighter_than_sims() {
        fastrand::seed(6);
        let group = group(8);
        let order = piece_order(group.puzzle());
        let mut jerrum = JerrumFilter::new(Rc::clone(&group), Rc::clone(&order), 0);
        let mut sims = SimsFilter::new(Rc::clone(&group), Rc::clone(&order), 0);
        assert_eq!(jerrum.bound(), 23);
        assert_eq!(sims.bound(), 24 * 23 / 2);

        let mut evictions = 0;
        for _ in 0..200 {
            let generator = group.random(fastrand::usize(1..12));
            if let FilterOutcome::Accepted { evicted, .. } = jerrum.insert(generator.clone()) {
                evictions += evicted.len();
            }
            sims.insert(generator);
            assert!(jerrum.len() <= jerrum.bound());
            assert!(sims.len() <= sims.bound());
        }
        assert!(evictions > 0);
    }
}
