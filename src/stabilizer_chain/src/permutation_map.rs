use std::fmt::Debug;

use cube_geometry::{Puzzle, PuzzleState, Slot, UNUSED_SLOT};
use thiserror::Error;

/// A bijection on the colored sticker slots of a puzzle. Applying a map to a
/// state relocates every sticker in time proportional to the slot count, no
/// matter how many moves produced the map.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PermutationMap {
    /// `mapping[slot]` is where the content of `slot` goes
    mapping: Box<[Slot]>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermutationMapError {
    #[error("The two states are not a rearrangement of the same pieces")]
    NotPieceRearrangement,
    #[error("Slot {slot} is the target of more than one slot")]
    DuplicateTarget { slot: Slot },
}

impl PermutationMap {
    /// The map fixing every sticker slot of `puzzle`.
    #[must_use]
    pub fn identity<P: Puzzle + ?Sized>(puzzle: &P) -> Self {
        Self {
            mapping: puzzle.solved().locations().into(),
        }
    }

    /// The map taking every sticker's slot in `original` to the slot holding
    /// the same sticker in `current`.
    ///
    /// # Errors
    ///
    /// If the two states are not a rearrangement of the same pieces or the
    /// induced mapping is not a bijection.
    pub fn from_transform<P: Puzzle + ?Sized>(
        puzzle: &P,
        original: &PuzzleState,
        current: &PuzzleState,
    ) -> Result<Self, PermutationMapError> {
        if !puzzle.is_same_piece_arrangement(original, current) {
            return Err(PermutationMapError::NotPieceRearrangement);
        }

        let mut mapping = vec![UNUSED_SLOT; puzzle.slot_count()].into_boxed_slice();
        let mut targeted = vec![false; puzzle.slot_count()];
        for (sticker, from) in original.stickers() {
            let to = current.location(sticker);
            if std::mem::replace(&mut targeted[to as usize], true) {
                return Err(PermutationMapError::DuplicateTarget { slot: to });
            }
            mapping[from as usize] = to;
        }

        Ok(Self { mapping })
    }

    /// Where the content of `slot` goes.
    #[must_use]
    pub fn image(&self, slot: Slot) -> Slot {
        self.mapping[slot as usize]
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.mapping.len()
    }

    /// Relocate every sticker of `state` according to this map.
    #[must_use]
    pub fn apply<P: Puzzle + ?Sized>(&self, puzzle: &P, state: &PuzzleState) -> PuzzleState {
        debug_assert!(
            self.moves_whole_pieces(puzzle),
            "a permutation map tore a piece apart"
        );
        PuzzleState::new(
            state
                .locations()
                .iter()
                .map(|&slot| {
                    if slot == UNUSED_SLOT {
                        UNUSED_SLOT
                    } else {
                        self.mapping[slot as usize]
                    }
                })
                .collect(),
        )
    }

    /// Relocate every sticker of `state` in place. The whole buffer is
    /// replaced at once.
    pub fn apply_in_place<P: Puzzle + ?Sized>(&self, puzzle: &P, state: &mut PuzzleState) {
        let mut relocated = self.apply(puzzle, state);
        std::mem::swap(state, &mut relocated);
    }

    /// The map equivalent to applying `other` and then `self`.
    #[must_use]
    pub fn compose(&self, other: &PermutationMap) -> PermutationMap {
        assert_eq!(self.slot_count(), other.slot_count());
        PermutationMap {
            mapping: other
                .mapping
                .iter()
                .map(|&slot| {
                    if slot == UNUSED_SLOT {
                        UNUSED_SLOT
                    } else {
                        self.mapping[slot as usize]
                    }
                })
                .collect(),
        }
    }

    /// The unique map whose composition with `self` is the identity.
    #[must_use]
    pub fn invert(&self) -> PermutationMap {
        let mut mapping = vec![UNUSED_SLOT; self.slot_count()].into_boxed_slice();
        for (from, &to) in self.mapping.iter().enumerate() {
            if to != UNUSED_SLOT {
                // Slot counts fit in a `Slot` by construction
                #[allow(clippy::cast_possible_truncation)]
                {
                    mapping[to as usize] = from as Slot;
                }
            }
        }
        PermutationMap { mapping }
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.mapping
            .iter()
            .enumerate()
            .all(|(from, &to)| to == UNUSED_SLOT || from == to as usize)
    }

    /// Iterate over the slots this map moves, in slot order.
    #[allow(clippy::cast_possible_truncation)]
    pub fn moved_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.mapping
            .iter()
            .enumerate()
            .filter(|&(from, &to)| to != UNUSED_SLOT && from != to as usize)
            .map(|(from, _)| from as Slot)
    }

    fn moves_whole_pieces<P: Puzzle + ?Sized>(&self, puzzle: &P) -> bool {
        puzzle.pieces().iter().all(|piece| {
            let mut targets = piece
                .slots
                .iter()
                .map(|&slot| puzzle.piece_of(self.image(slot)));
            let first = targets.next().flatten();
            first.is_some() && targets.all(|target| target == first)
        })
    }
}

impl Debug for PermutationMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.moved_slots().map(|slot| (slot, self.image(slot))))
            .finish()
    }
}
