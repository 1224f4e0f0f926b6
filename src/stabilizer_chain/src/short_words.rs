use std::time::Instant;

use cube_geometry::{Puzzle, PuzzleState, apply_moves};
use fxhash::FxHashMap;
use log::debug;

use crate::{start, success};

/// The shortest word reaching every state within `depth` moves of solved.
/// Owned by whoever simplifies with it; nothing here is global.
pub struct ShortWordTable<P: Puzzle> {
    words: FxHashMap<PuzzleState, Box<[P::Move]>>,
    depth: usize,
}

impl<P: Puzzle> ShortWordTable<P> {
    /// Enumerate every word of at most `depth` moves over the whole move
    /// domain of `puzzle`, breadth first.
    #[must_use]
    pub fn new(puzzle: &P, depth: usize) -> Self {
        debug!(start!("Building a short word table of depth {}"), depth);
        let start = Instant::now();

        let solved = puzzle.solved();
        let mut words = FxHashMap::default();
        words.insert(solved.clone(), Box::<[P::Move]>::default());

        let mut frontier = vec![(solved, vec![])];
        for _ in 0..depth {
            let mut next = vec![];
            for (state, word) in &frontier {
                for &move_ in puzzle.moves() {
                    let reached = puzzle.apply_move(state, move_);
                    if words.contains_key(&reached) {
                        continue;
                    }
                    let mut longer = word.clone();
                    longer.push(move_);
                    words.insert(reached.clone(), longer.clone().into_boxed_slice());
                    next.push((reached, longer));
                }
            }
            frontier = next;
        }

        debug!(
            success!("Found {} short words in {:.3}s"),
            words.len(),
            start.elapsed().as_secs_f64()
        );
        ShortWordTable { words, depth }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// The shortest known word reaching `state` from solved.
    #[must_use]
    pub fn lookup(&self, state: &PuzzleState) -> Option<&[P::Move]> {
        self.words.get(state).map(AsRef::as_ref)
    }

    /// Replace suffixes of up to twice the table depth by strictly shorter
    /// words, scanning left to right.
    #[must_use]
    pub fn shorten(&self, puzzle: &P, moves: &[P::Move]) -> Vec<P::Move> {
        let window = 2 * self.depth;
        let solved = puzzle.solved();
        let mut out = Vec::with_capacity(moves.len());

        for &move_ in moves {
            out.push(move_);
            for length in (2..=window.min(out.len())).rev() {
                let start = out.len() - length;
                let reached = apply_moves(puzzle, &solved, &out[start..]);
                if let Some(word) = self.words.get(&reached)
                    && word.len() < length
                {
                    out.truncate(start);
                    out.extend_from_slice(word);
                    break;
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use cube_geometry::{Cube, MoveSet};

    use super::*;
    use crate::{
        action::{PuzzleGroup, SimplifyLevel},
        config::ChainConfig,
    };

    #[test]
    fn table_sizes() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        assert_eq!(ShortWordTable::new(&cube, 0).len(), 1);
        // Every one of the 27 moves reaches a distinct state
        let table = ShortWordTable::new(&cube, 1);
        assert_eq!(table.len(), 28);
        assert_eq!(table.lookup(&cube.solved()), Some(&[][..]));

        let r2 = cube.parse_moves("R2").unwrap();
        let state = apply_moves(&cube, &cube.solved(), &cube.parse_moves("R R").unwrap());
        assert_eq!(table.lookup(&state), Some(&r2[..]));
    }

    #[test]
    fn shorten_suffixes() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        let table = ShortWordTable::new(&cube, 1);
        let shorten = |moves: &str| table.shorten(&cube, &cube.parse_moves(moves).unwrap());

        assert_eq!(shorten("R R U U'"), cube.parse_moves("R2").unwrap());
        assert_eq!(shorten("F2 F2"), vec![]);
        assert_eq!(shorten("R U F"), cube.parse_moves("R U F").unwrap());
    }

    #[test]
    fn conjugate_by_rotation_collapses() {
        let group = PuzzleGroup::new(Cube::new(2, MoveSet::Faces).unwrap(), &ChainConfig::default());
        let table = ShortWordTable::new(group.puzzle(), 3);

        // `R L'` turns the whole cube, so this is a single layer turn
        let action = group.parse("R L' F L R'").unwrap();
        let simplified = action.simplify(SimplifyLevel::ShortWords(&table));
        assert_eq!(simplified.count(), 1);
        assert_eq!(simplified, action);
    }
}
