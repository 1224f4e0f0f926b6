use std::{hash::Hash, rc::Rc};

use cube_geometry::{Puzzle, PuzzleState, Slot};
use itertools::Itertools;
use thiserror::Error;

use crate::action::Action;

/// A set of tracked stickers together with a state snapshot. Only the
/// locations of the tracked stickers matter: two block sets are equal when
/// they track the same stickers and those stickers sit in the same slots.
#[derive(Clone, Debug)]
pub struct BlockSet {
    indices: Rc<[Slot]>,
    state: PuzzleState,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockSetError {
    #[error("Sticker {index} is tracked by both block sets")]
    OverlappingIndices { index: Slot },
    #[error("The snapshots disagree on sticker {index}")]
    SnapshotMismatch { index: Slot },
}

impl BlockSet {
    /// Track `indices` in `state`. Duplicates are ignored and order is
    /// irrelevant.
    #[must_use]
    pub fn new(indices: impl IntoIterator<Item = Slot>, state: PuzzleState) -> Self {
        BlockSet {
            indices: indices.into_iter().sorted_unstable().dedup().collect(),
            state,
        }
    }

    #[must_use]
    pub fn empty(state: PuzzleState) -> Self {
        BlockSet {
            indices: Rc::new([]),
            state,
        }
    }

    /// The same tracked stickers in another state.
    #[must_use]
    pub fn with_state(&self, state: PuzzleState) -> Self {
        BlockSet {
            indices: Rc::clone(&self.indices),
            state,
        }
    }

    /// Apply `action` to the snapshot.
    #[must_use]
    pub fn apply<P: Puzzle>(&self, action: &Action<P>) -> Self {
        self.with_state(action.apply(&self.state))
    }

    /// Track the stickers of both block sets. The snapshots must agree on
    /// every tracked sticker.
    ///
    /// # Errors
    ///
    /// If a sticker is tracked by both or the snapshots disagree.
    pub fn merge(&self, other: &BlockSet) -> Result<BlockSet, BlockSetError> {
        let mut indices = Vec::with_capacity(self.len() + other.len());
        for index in self.indices.iter().merge(other.indices.iter()).copied() {
            if indices.last() == Some(&index) {
                return Err(BlockSetError::OverlappingIndices { index });
            }
            if self.state.location(index) != other.state.location(index) {
                return Err(BlockSetError::SnapshotMismatch { index });
            }
            indices.push(index);
        }

        Ok(BlockSet {
            indices: indices.into(),
            state: self.state.clone(),
        })
    }

    pub fn indices(&self) -> &[Slot] {
        &self.indices
    }

    pub fn state(&self) -> &PuzzleState {
        &self.state
    }

    /// The locations of the tracked stickers, in index order.
    pub fn configuration(&self) -> impl Iterator<Item = Slot> + '_ {
        self.indices.iter().map(|&index| self.state.location(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl PartialEq for BlockSet {
    fn eq(&self, other: &Self) -> bool {
        self.indices == other.indices && self.configuration().eq(other.configuration())
    }
}

impl Eq for BlockSet {}

impl Hash for BlockSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.indices.hash(state);
        for location in self.configuration() {
            location.hash(state);
        }
    }
}
