use std::{collections::BTreeMap, rc::Rc};

use cube_geometry::Puzzle;
use log::trace;

use super::{FilterOutcome, GeneratorFilter, StabilizingOrder};
use crate::action::{Action, PuzzleGroup};

/// Keeps at most one generator per action pair. A generator whose pair is
/// taken is divided by the stored one and offered again further down.
pub struct SimsFilter<P: Puzzle> {
    group: Rc<PuzzleGroup<P>>,
    order: Rc<StabilizingOrder>,
    prefix: usize,
    grid: BTreeMap<(usize, usize), Action<P>>,
    rejected: usize,
}

impl<P: Puzzle> SimsFilter<P> {
    #[must_use]
    pub fn new(group: Rc<PuzzleGroup<P>>, order: Rc<StabilizingOrder>, prefix: usize) -> Self {
        SimsFilter {
            group,
            order,
            prefix,
            grid: BTreeMap::new(),
            rejected: 0,
        }
    }
}

impl<P: Puzzle> GeneratorFilter<P> for SimsFilter<P> {
    fn insert(&mut self, generator: Action<P>) -> FilterOutcome<P> {
        let mut current = generator;

        while let Some((i, j)) = self.order.action_pair(current.map(), self.prefix) {
            let Some(stored) = self.grid.get(&(i, j)) else {
                trace!("Sims filter at {}: new entry ({i}, {j})", self.prefix);
                self.grid.insert((i, j), current.clone());
                assert!(
                    self.len() <= self.bound(),
                    "the Sims filter holds {} generators, more than {}",
                    self.len(),
                    self.bound()
                );
                return FilterOutcome::Accepted {
                    added: vec![current],
                    evicted: vec![],
                };
            };

            let next = stored.invert().multiply(&current);
            if self.group.verify()
                && let Some((next_i, _)) = self.order.action_pair(next.map(), self.prefix)
            {
                assert!(next_i > i, "sifting moved position {next_i}, not past {i}");
            }
            current = next;
        }

        self.rejected += 1;
        FilterOutcome::Redundant
    }

    fn generators<'a>(&'a self) -> impl Iterator<Item = &'a Action<P>>
    where
        P: 'a,
    {
        self.grid.values()
    }

    fn len(&self) -> usize {
        self.grid.len()
    }

    fn bound(&self) -> usize {
        let remaining = self.order.len().saturating_sub(self.prefix);
        remaining * remaining.saturating_sub(1) / 2
    }

    fn rejected(&self) -> usize {
        self.rejected
    }
}
