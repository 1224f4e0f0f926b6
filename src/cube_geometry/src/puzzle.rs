use std::{fmt::Debug, hash::Hash};

use fxhash::FxHashSet;
use itertools::Itertools;

use crate::MoveParseError;

/// An index into the sticker slot space of a puzzle.
pub type Slot = u16;

/// Marks an index that does not correspond to a colored sticker slot.
pub const UNUSED_SLOT: Slot = Slot::MAX;

/// The full configuration of a puzzle. Every sticker is identified by its home
/// slot, and `locations[sticker]` is the slot the sticker currently occupies.
/// Indices that are not sticker slots hold `UNUSED_SLOT`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PuzzleState {
    locations: Box<[Slot]>,
}

impl PuzzleState {
    #[must_use]
    pub fn new(locations: Box<[Slot]>) -> Self {
        Self { locations }
    }

    #[must_use]
    pub fn locations(&self) -> &[Slot] {
        &self.locations
    }

    /// The slot holding `sticker`, or `UNUSED_SLOT` if `sticker` is not a
    /// sticker of this puzzle.
    #[must_use]
    pub fn location(&self, sticker: Slot) -> Slot {
        self.locations
            .get(sticker as usize)
            .copied()
            .unwrap_or(UNUSED_SLOT)
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.locations.len()
    }

    /// Iterate over `(sticker, slot)` pairs of every colored sticker.
    #[allow(clippy::cast_possible_truncation)]
    pub fn stickers(&self) -> impl Iterator<Item = (Slot, Slot)> + '_ {
        self.locations
            .iter()
            .enumerate()
            .filter(|&(_, &slot)| slot != UNUSED_SLOT)
            .map(|(sticker, &slot)| (sticker as Slot, slot))
    }
}

impl Debug for PuzzleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let moved = self
            .stickers()
            .filter(|&(sticker, slot)| sticker != slot)
            .map(|(sticker, slot)| format!("{sticker}->{slot}"))
            .join(" ");
        write!(f, "PuzzleState[{moved}]")
    }
}

/// A physical piece of a puzzle and the sticker slots it carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Piece {
    pub slots: Box<[Slot]>,
}

/// How two moves on the same axis and layer combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveMerge<M> {
    /// The two moves undo each other.
    Cancel,
    /// The two moves are equivalent to a single move.
    Combined(M),
}

/// The puzzle interface consumed by the stabilizer chain. Implementors define
/// the concrete mechanics of elementary moves; everything above this trait is
/// puzzle-agnostic.
pub trait Puzzle {
    /// An elementary move tag.
    type Move: Copy + Eq + Hash + Debug;

    /// The length of the slot space. Every `PuzzleState` of this puzzle has
    /// exactly this many entries.
    fn slot_count(&self) -> usize;

    /// The canonical solved state.
    fn solved(&self) -> PuzzleState;

    /// Apply a single elementary move. This must be a pure function of its
    /// arguments.
    fn apply_move(&self, state: &PuzzleState, move_: Self::Move) -> PuzzleState;

    /// The whole elementary move tag domain.
    fn moves(&self) -> &[Self::Move];

    /// The moves that generate the puzzle group.
    fn generators(&self) -> &[Self::Move];

    /// The number of repetitions of `move_` that return to the identity.
    fn move_order(&self, move_: Self::Move) -> u8;

    /// A sequence of tags that realizes the inverse of `move_`.
    fn reverse_decomposition(&self, move_: Self::Move) -> Vec<Self::Move>;

    /// Moves sharing an axis commute with each other.
    fn move_axis(&self, move_: Self::Move) -> usize;

    /// Moves sharing both an axis and a layer can be merged.
    fn move_layer(&self, move_: Self::Move) -> usize;

    /// Merge two moves that share an axis and a layer.
    fn merge_moves(&self, a: Self::Move, b: Self::Move) -> MoveMerge<Self::Move>;

    fn move_name(&self, move_: Self::Move) -> &str;

    /// Look up a move tag by its name in this puzzle's notation.
    ///
    /// # Errors
    ///
    /// If `name` does not name a move of this puzzle.
    fn find_move(&self, name: &str) -> Result<Self::Move, MoveParseError>;

    /// The pieces of the puzzle.
    fn pieces(&self) -> &[Piece];

    /// The index into `pieces` of the piece carrying `slot`, if any.
    fn piece_of(&self, slot: Slot) -> Option<usize>;

    /// Parse a whitespace separated move sequence.
    ///
    /// # Errors
    ///
    /// If any token does not name a move of this puzzle.
    fn parse_moves(&self, moves: &str) -> Result<Vec<Self::Move>, MoveParseError> {
        moves
            .split_whitespace()
            .map(|name| self.find_move(name))
            .collect()
    }

    /// Render a move sequence in this puzzle's notation.
    fn format_moves(&self, moves: &[Self::Move]) -> String {
        moves.iter().map(|&move_| self.move_name(move_)).join(" ")
    }

    /// Whether `a` and `b` are both rearrangements of whole pieces: every
    /// piece's stickers occupy exactly the slots of a single piece of the same
    /// kind, and no two stickers share a slot.
    fn is_same_piece_arrangement(&self, a: &PuzzleState, b: &PuzzleState) -> bool {
        [a, b]
            .into_iter()
            .all(|state| is_piece_arrangement(self, state))
    }
}

fn is_piece_arrangement<P: Puzzle + ?Sized>(puzzle: &P, state: &PuzzleState) -> bool {
    if state.slot_count() != puzzle.slot_count() {
        return false;
    }

    let mut occupied = vec![false; puzzle.slot_count()];
    let mut used_pieces = FxHashSet::default();
    let mut sticker_count = 0;

    for piece in puzzle.pieces() {
        let mut target_piece = None;
        for &sticker in &piece.slots {
            let slot = state.location(sticker);
            let Some(slot_piece) = puzzle.piece_of(slot) else {
                return false;
            };
            if *target_piece.get_or_insert(slot_piece) != slot_piece {
                return false;
            }
            if std::mem::replace(&mut occupied[slot as usize], true) {
                return false;
            }
            sticker_count += 1;
        }

        let Some(target_piece) = target_piece else {
            continue;
        };
        if puzzle.pieces()[target_piece].slots.len() != piece.slots.len()
            || !used_pieces.insert(target_piece)
        {
            return false;
        }
    }

    // Nothing outside of the pieces may hold a location
    state.stickers().count() == sticker_count
}

/// Apply a sequence of moves to a state.
pub fn apply_moves<P: Puzzle + ?Sized>(
    puzzle: &P,
    state: &PuzzleState,
    moves: &[P::Move],
) -> PuzzleState {
    moves
        .iter()
        .fold(state.clone(), |state, &move_| puzzle.apply_move(&state, move_))
}

/// A random sequence of `count` moves drawn from the whole tag domain.
#[allow(clippy::missing_panics_doc)]
pub fn random_moves<P: Puzzle + ?Sized>(puzzle: &P, count: usize) -> Vec<P::Move> {
    (0..count)
        // The tag domain of a puzzle is never empty
        .map(|_| *fastrand::choice(puzzle.moves()).unwrap())
        .collect()
}
