use std::{collections::BTreeMap, rc::Rc};

use cube_geometry::Puzzle;
use fxhash::FxHashMap;
use log::trace;

use super::{FilterOutcome, GeneratorFilter, StabilizingOrder};
use crate::action::{Action, PuzzleGroup};

/// Keeps the generators as the edges of a forest on the stabilizing order. A
/// generator with action pair `(i, j)` is the edge between `i` and `j`, and
/// a generator closing a cycle is folded into the cycle's product.
pub struct JerrumFilter<P: Puzzle> {
    group: Rc<PuzzleGroup<P>>,
    order: Rc<StabilizingOrder>,
    prefix: usize,
    /// Keyed by the action pair of the label
    edges: BTreeMap<(usize, usize), Action<P>>,
    adjacency: FxHashMap<usize, Vec<usize>>,
    rejected: usize,
}

/// An edge of a cycle, walked from `from` to `to`. `key` is `None` for the
/// edge of the generator being inserted.
#[derive(Clone, Copy, Debug)]
struct CycleEdge {
    from: usize,
    to: usize,
    key: Option<(usize, usize)>,
}

impl<P: Puzzle> JerrumFilter<P> {
    #[must_use]
    pub fn new(group: Rc<PuzzleGroup<P>>, order: Rc<StabilizingOrder>, prefix: usize) -> Self {
        JerrumFilter {
            group,
            order,
            prefix,
            edges: BTreeMap::new(),
            adjacency: FxHashMap::default(),
            rejected: 0,
        }
    }

    fn add_edge(&mut self, (i, j): (usize, usize), label: Action<P>) {
        self.adjacency.entry(i).or_default().push(j);
        self.adjacency.entry(j).or_default().push(i);
        self.edges.insert((i, j), label);
    }

    fn remove_edge(&mut self, (i, j): (usize, usize)) -> Option<Action<P>> {
        for (from, to) in [(i, j), (j, i)] {
            if let Some(neighbors) = self.adjacency.get_mut(&from) {
                neighbors.retain(|&neighbor| neighbor != to);
            }
        }
        self.edges.remove(&(i, j))
    }

    /// The vertices of the forest path from `from` to `to`, both included.
    fn path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut parents = FxHashMap::default();
        parents.insert(from, from);
        let mut stack = vec![from];

        while let Some(vertex) = stack.pop() {
            if vertex == to {
                let mut path = vec![to];
                let mut current = to;
                while current != from {
                    current = parents[&current];
                    path.push(current);
                }
                path.reverse();
                return Some(path);
            }
            for &neighbor in self.adjacency.get(&vertex).into_iter().flatten() {
                if !parents.contains_key(&neighbor) {
                    parents.insert(neighbor, vertex);
                    stack.push(neighbor);
                }
            }
        }

        None
    }

    /// The cycle made by the new edge `(i, j)` and the forest path from `i`
    /// to `j`, rotated to start at its smallest vertex.
    fn cycle(i: usize, j: usize, path: &[usize]) -> Vec<CycleEdge> {
        let mut cycle = Vec::with_capacity(path.len());
        cycle.push(CycleEdge {
            from: i,
            to: j,
            key: None,
        });
        for pair in path.windows(2).rev() {
            let (from, to) = (pair[1], pair[0]);
            cycle.push(CycleEdge {
                from,
                to,
                key: Some((from.min(to), from.max(to))),
            });
        }

        let smallest = cycle
            .iter()
            .enumerate()
            .min_by_key(|(_, edge)| edge.from)
            .map_or(0, |(index, _)| index);
        cycle.rotate_left(smallest);
        cycle
    }
}

impl<P: Puzzle> GeneratorFilter<P> for JerrumFilter<P> {
    fn insert(&mut self, generator: Action<P>) -> FilterOutcome<P> {
        let mut current = generator;
        let mut added_keys: Vec<(usize, usize)> = vec![];
        let mut evicted = vec![];

        loop {
            let Some((i, j)) = self.order.action_pair(current.map(), self.prefix) else {
                break;
            };

            let Some(path) = self.path(i, j) else {
                trace!("Jerrum filter at {}: new edge ({i}, {j})", self.prefix);
                self.add_edge((i, j), current);
                added_keys.push((i, j));
                break;
            };

            let cycle = Self::cycle(i, j, &path);
            let smallest = cycle[0].from;
            let mut product = self.group.identity();
            for edge in &cycle {
                let label = match edge.key {
                    None => &current,
                    Some(key) => &self.edges[&key],
                };
                let oriented = if edge.from < edge.to {
                    label.clone()
                } else {
                    label.invert()
                };
                product = oriented.multiply(&product);
            }

            // The first edge of the cycle is recovered from the product and
            // the rest of the cycle
            if let Some(key) = cycle[0].key {
                trace!(
                    "Jerrum filter at {}: ({i}, {j}) replaces ({}, {})",
                    self.prefix, key.0, key.1
                );
                let label = self
                    .remove_edge(key)
                    .expect("cycle edges are edges of the forest");
                if let Some(index) = added_keys.iter().position(|&added| added == key) {
                    added_keys.swap_remove(index);
                } else {
                    evicted.push(label);
                }
                self.add_edge((i, j), current);
                added_keys.push((i, j));
            }

            if self.group.verify()
                && let Some((next_i, _)) = self.order.action_pair(product.map(), self.prefix)
            {
                assert!(
                    next_i > smallest,
                    "a cycle product moves position {next_i}, not past {smallest}"
                );
            }
            current = product;
        }

        assert!(
            self.len() <= self.bound(),
            "the Jerrum filter holds {} generators, more than {}",
            self.len(),
            self.bound()
        );

        if added_keys.is_empty() {
            debug_assert!(evicted.is_empty());
            self.rejected += 1;
            return FilterOutcome::Redundant;
        }

        FilterOutcome::Accepted {
            added: added_keys
                .iter()
                .map(|key| self.edges[key].clone())
                .collect(),
            evicted,
        }
    }

    fn generators<'a>(&'a self) -> impl Iterator<Item = &'a Action<P>>
    where
        P: 'a,
    {
        self.edges.values()
    }

    fn len(&self) -> usize {
        self.edges.len()
    }

    fn bound(&self) -> usize {
        self.order.len().saturating_sub(self.prefix + 1)
    }

    fn rejected(&self) -> usize {
        self.rejected
    }
}
