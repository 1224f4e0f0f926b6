use thiserror::Error;

use crate::{
    MoveParseError,
    puzzle::{MoveMerge, Piece, Puzzle, PuzzleState, Slot, UNUSED_SLOT},
};

/// The largest supported cube. `6 * 20^3` still fits in a `Slot`.
pub const MAX_CUBE_SIZE: u8 = 20;

const DIRECTIONS: [[i32; 3]; 6] = [
    [1, 0, 0],
    [-1, 0, 0],
    [0, 1, 0],
    [0, -1, 0],
    [0, 0, 1],
    [0, 0, -1],
];
const POSITIVE_FACES: [char; 3] = ['R', 'U', 'F'];
const NEGATIVE_FACES: [char; 3] = ['L', 'D', 'B'];

#[derive(Error, Debug)]
pub enum CubeError {
    #[error("Cube size must be between 1 and {MAX_CUBE_SIZE}, got {0}")]
    SizeOutOfRange(u8),
    #[error("Unknown generator: {0}")]
    UnknownMove(#[from] MoveParseError),
}

/// Which layers contribute generators to the cube group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MoveSet {
    /// Quarter turns of the six outer faces.
    #[default]
    Faces,
    /// Quarter turns of every layer, including inner slices.
    AllLayers,
}

/// An elementary move of a `Cube`, as an index into its move table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CubeMove(u16);

#[derive(Debug)]
struct MoveDef {
    name: String,
    axis: usize,
    layer: usize,
    turns: u8,
    /// Where the content of each slot goes
    table: Box<[Slot]>,
}

/// An N×N×N cube where every sticker is distinguishable.
#[derive(Debug)]
pub struct Cube {
    size: usize,
    solved: PuzzleState,
    pieces: Box<[Piece]>,
    piece_of_slot: Box<[Option<usize>]>,
    move_defs: Box<[MoveDef]>,
    moves: Box<[CubeMove]>,
    generators: Box<[CubeMove]>,
}

impl Cube {
    /// Create a cube of the given size whose generators are the quarter turns
    /// of `move_set`.
    ///
    /// # Errors
    ///
    /// If `size` is zero or larger than `MAX_CUBE_SIZE`.
    pub fn new(size: u8, move_set: MoveSet) -> Result<Self, CubeError> {
        let mut cube = Self::without_generators(size)?;
        cube.generators = cube
            .moves
            .iter()
            .copied()
            .filter(|&move_| {
                let move_def = cube.move_def(move_);
                move_def.turns == nearer_face_quarter_turn(move_def.layer, cube.size)
                    && (move_set == MoveSet::AllLayers
                        || move_def.layer == 0
                        || move_def.layer == cube.size - 1)
            })
            .collect();
        Ok(cube)
    }

    /// Create a cube of the given size whose generators are the named moves,
    /// for example `["R", "U", "F"]`.
    ///
    /// # Errors
    ///
    /// If the size is out of range or any name is not a move of the cube.
    pub fn with_generators<S: AsRef<str>>(size: u8, names: &[S]) -> Result<Self, CubeError> {
        let mut cube = Self::without_generators(size)?;
        cube.generators = names
            .iter()
            .map(|name| cube.find_move(name.as_ref()))
            .collect::<Result<_, _>>()?;
        Ok(cube)
    }

    fn without_generators(size: u8) -> Result<Self, CubeError> {
        if size == 0 || size > MAX_CUBE_SIZE {
            return Err(CubeError::SizeOutOfRange(size));
        }
        let size = size as usize;
        let slot_count = 6 * size * size * size;

        let mut locations = vec![UNUSED_SLOT; slot_count].into_boxed_slice();
        let mut piece_of_slot = vec![None; slot_count].into_boxed_slice();
        let mut pieces = vec![];
        for cubie in 0..size * size * size {
            let coords = cubie_coords(cubie, size);
            let slots = (0..6)
                .filter(|&direction| is_exposed(coords, direction, size))
                .map(|direction| slot_index(cubie, direction))
                .collect::<Box<[_]>>();
            if slots.is_empty() {
                continue;
            }
            for &slot in &slots {
                locations[slot as usize] = slot;
                piece_of_slot[slot as usize] = Some(pieces.len());
            }
            pieces.push(Piece { slots });
        }

        let mut move_defs = vec![];
        for axis in 0..3 {
            for layer in 0..size {
                let quarter = quarter_turn_table(axis, layer, size, &locations);
                let mut table = quarter.clone();
                for turns in 1..=3 {
                    move_defs.push(MoveDef {
                        name: move_name(axis, layer, turns, size),
                        axis,
                        layer,
                        turns,
                        table: table.clone(),
                    });
                    table = table
                        .iter()
                        .map(|&slot| {
                            if slot == UNUSED_SLOT {
                                UNUSED_SLOT
                            } else {
                                quarter[slot as usize]
                            }
                        })
                        .collect();
                }
            }
        }

        // There are at most 9 * MAX_CUBE_SIZE move definitions
        #[allow(clippy::cast_possible_truncation)]
        let moves = (0..move_defs.len())
            .map(|i| CubeMove(i as u16))
            .collect();

        Ok(Cube {
            size,
            solved: PuzzleState::new(locations),
            pieces: pieces.into_boxed_slice(),
            piece_of_slot,
            move_defs: move_defs.into_boxed_slice(),
            moves,
            generators: Box::new([]),
        })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The number of clockwise quarter turns `move_` performs.
    #[must_use]
    pub fn turns(&self, move_: CubeMove) -> u8 {
        self.move_def(move_).turns
    }

    fn move_def(&self, move_: CubeMove) -> &MoveDef {
        &self.move_defs[move_.0 as usize]
    }

    fn move_at(&self, axis: usize, layer: usize, turns: u8) -> CubeMove {
        // Bounded by the size of `move_defs`
        #[allow(clippy::cast_possible_truncation)]
        CubeMove(((axis * self.size + layer) * 3 + turns as usize - 1) as u16)
    }
}

impl Puzzle for Cube {
    type Move = CubeMove;

    fn slot_count(&self) -> usize {
        self.solved.slot_count()
    }

    fn solved(&self) -> PuzzleState {
        self.solved.clone()
    }

    fn apply_move(&self, state: &PuzzleState, move_: CubeMove) -> PuzzleState {
        let table = &self.move_def(move_).table;
        PuzzleState::new(
            state
                .locations()
                .iter()
                .map(|&slot| {
                    if slot == UNUSED_SLOT {
                        UNUSED_SLOT
                    } else {
                        table[slot as usize]
                    }
                })
                .collect(),
        )
    }

    fn moves(&self) -> &[CubeMove] {
        &self.moves
    }

    fn generators(&self) -> &[CubeMove] {
        &self.generators
    }

    fn move_order(&self, move_: CubeMove) -> u8 {
        if self.move_def(move_).turns == 2 { 2 } else { 4 }
    }

    fn reverse_decomposition(&self, move_: CubeMove) -> Vec<CubeMove> {
        let move_def = self.move_def(move_);
        vec![self.move_at(move_def.axis, move_def.layer, 4 - move_def.turns)]
    }

    fn move_axis(&self, move_: CubeMove) -> usize {
        self.move_def(move_).axis
    }

    fn move_layer(&self, move_: CubeMove) -> usize {
        self.move_def(move_).layer
    }

    fn merge_moves(&self, a: CubeMove, b: CubeMove) -> MoveMerge<CubeMove> {
        let (a, b) = (self.move_def(a), self.move_def(b));
        debug_assert_eq!((a.axis, a.layer), (b.axis, b.layer));
        match (a.turns + b.turns) % 4 {
            0 => MoveMerge::Cancel,
            turns => MoveMerge::Combined(self.move_at(a.axis, a.layer, turns)),
        }
    }

    fn move_name(&self, move_: CubeMove) -> &str {
        &self.move_def(move_).name
    }

    fn find_move(&self, name: &str) -> Result<CubeMove, MoveParseError> {
        let (axis, layer, turns) = parse_move_name(name, self.size)?;
        Ok(self.move_at(axis, layer, turns))
    }

    fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    fn piece_of(&self, slot: Slot) -> Option<usize> {
        self.piece_of_slot.get(slot as usize).copied().flatten()
    }
}

fn cubie_coords(cubie: usize, size: usize) -> [usize; 3] {
    [cubie % size, cubie / size % size, cubie / (size * size)]
}

fn cubie_index([x, y, z]: [usize; 3], size: usize) -> usize {
    x + size * (y + size * z)
}

// Slot counts are bounded by MAX_CUBE_SIZE
#[allow(clippy::cast_possible_truncation)]
fn slot_index(cubie: usize, direction: usize) -> Slot {
    (cubie * 6 + direction) as Slot
}

fn is_exposed(coords: [usize; 3], direction: usize, size: usize) -> bool {
    let axis = direction / 2;
    if direction % 2 == 0 {
        coords[axis] == size - 1
    } else {
        coords[axis] == 0
    }
}

/// A clockwise quarter turn about `axis`, seen from the positive face.
fn rotate([x, y, z]: [i32; 3], axis: usize) -> [i32; 3] {
    match axis {
        0 => [x, z, -y],
        1 => [-z, y, x],
        _ => [y, -x, z],
    }
}

fn direction_index(vector: [i32; 3]) -> usize {
    DIRECTIONS
        .iter()
        .position(|&direction| direction == vector)
        .expect("rotations map unit vectors onto unit vectors")
}

// Coordinates are bounded by MAX_CUBE_SIZE
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn quarter_turn_table(axis: usize, layer: usize, size: usize, solved: &[Slot]) -> Box<[Slot]> {
    let offset = size as i32 - 1;
    solved
        .iter()
        .enumerate()
        .map(|(slot, &home)| {
            if home == UNUSED_SLOT {
                return UNUSED_SLOT;
            }
            let (cubie, direction) = (slot / 6, slot % 6);
            let coords = cubie_coords(cubie, size);
            if coords[axis] != layer {
                return home;
            }
            // Doubled coordinates centered on the middle of the cube
            let centered = coords.map(|c| 2 * c as i32 - offset);
            let rotated = rotate(centered, axis).map(|c| ((c + offset) / 2) as usize);
            let rotated_direction = direction_index(rotate(DIRECTIONS[direction], axis));
            slot_index(cubie_index(rotated, size), rotated_direction)
        })
        .collect()
}

/// The turn count of a clockwise quarter turn seen from the face nearer to
/// `layer`. Turns are counted from the positive face.
fn nearer_face_quarter_turn(layer: usize, size: usize) -> u8 {
    if size - layer <= layer + 1 { 1 } else { 3 }
}

fn move_name(axis: usize, layer: usize, turns: u8, size: usize) -> String {
    let positive_depth = size - layer;
    let negative_depth = layer + 1;
    let (face, depth, turns) = if positive_depth <= negative_depth {
        (POSITIVE_FACES[axis], positive_depth, turns)
    } else {
        (NEGATIVE_FACES[axis], negative_depth, 4 - turns)
    };

    let mut name = String::new();
    if depth > 1 {
        name.push_str(&depth.to_string());
    }
    name.push(face);
    match turns {
        1 => {}
        2 => name.push('2'),
        _ => name.push('\''),
    }
    name
}

fn parse_move_name(name: &str, size: usize) -> Result<(usize, usize, u8), MoveParseError> {
    if name.is_empty() {
        return Err(MoveParseError::Empty);
    }

    let digits = name.chars().take_while(char::is_ascii_digit).count();
    let depth = if digits == 0 {
        1
    } else {
        name[..digits]
            .parse::<usize>()
            .map_err(|_| MoveParseError::InvalidDepth(name.to_owned()))?
    };
    if depth == 0 || depth > size {
        return Err(MoveParseError::InvalidDepth(name.to_owned()));
    }

    let mut rest = name[digits..].chars();
    let face = rest
        .next()
        .ok_or_else(|| MoveParseError::UnknownFace(name.to_owned()))?;
    let (axis, positive) = if let Some(axis) = POSITIVE_FACES.iter().position(|&f| f == face) {
        (axis, true)
    } else if let Some(axis) = NEGATIVE_FACES.iter().position(|&f| f == face) {
        (axis, false)
    } else {
        return Err(MoveParseError::UnknownFace(name.to_owned()));
    };

    let turns = match rest.as_str() {
        "" => 1,
        "2" | "2'" => 2,
        "'" => 3,
        _ => return Err(MoveParseError::InvalidSuffix(name.to_owned())),
    };

    Ok(if positive {
        (axis, size - depth, turns)
    } else {
        (axis, depth - 1, 4 - turns)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::apply_moves;
    use itertools::Itertools;

    #[test]
    fn slot_and_piece_counts() {
        for (size, pieces) in [(1, 1), (2, 8), (3, 26), (4, 56)] {
            let cube = Cube::new(size, MoveSet::Faces).unwrap();
            let size = size as usize;
            assert_eq!(cube.slot_count(), 6 * size * size * size);
            assert_eq!(cube.pieces().len(), pieces);
            assert_eq!(cube.solved().stickers().count(), 6 * size * size);
        }
    }

    #[test]
    fn rejects_bad_sizes() {
        assert!(matches!(
            Cube::new(0, MoveSet::Faces),
            Err(CubeError::SizeOutOfRange(0))
        ));
        assert!(Cube::new(MAX_CUBE_SIZE + 1, MoveSet::Faces).is_err());
        assert!(Cube::new(MAX_CUBE_SIZE, MoveSet::Faces).is_ok());
    }

    #[test]
    fn canonical_names() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        let names = cube
            .generators()
            .iter()
            .map(|&move_| cube.move_name(move_))
            .sorted()
            .collect_vec();
        assert_eq!(names, ["B", "D", "F", "L", "R", "U"]);

        for name in ["R", "U2", "F'", "L", "D2", "B'", "2R", "2U2", "2F'"] {
            let move_ = cube.find_move(name).unwrap();
            assert_eq!(cube.move_name(move_), name);
        }

        // Alternative spellings resolve to the canonical move
        let l = cube.find_move("3R'").unwrap();
        assert_eq!(cube.move_name(l), "L");
        assert_eq!(cube.find_move("R2'").unwrap(), cube.find_move("R2").unwrap());
    }

    #[test]
    fn slice_generators_turn_clockwise() {
        for (size, expected) in [
            (4, ["2B", "2D", "2F", "2L", "2R", "2U", "B", "D", "F", "L", "R", "U"]),
            (5, ["2B", "2D", "2F", "2L", "2R", "2U", "B", "D", "F", "L", "R", "U"]),
        ] {
            let cube = Cube::new(size, MoveSet::AllLayers).unwrap();
            let names = cube
                .generators()
                .iter()
                .map(|&move_| cube.move_name(move_))
                .sorted()
                .collect_vec();
            if size == 5 {
                // The middle slices are named from the positive face
                assert_eq!(names.len(), 15);
                assert_eq!(
                    names.iter().filter(|name| name.starts_with('3')).count(),
                    3
                );
            }
            let outer = names
                .iter()
                .filter(|name| !name.starts_with('3'))
                .copied()
                .collect_vec();
            assert_eq!(outer, expected);
        }
    }

    #[test]
    fn bad_names() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        assert!(matches!(cube.find_move(""), Err(MoveParseError::Empty)));
        assert!(matches!(
            cube.find_move("X"),
            Err(MoveParseError::UnknownFace(_))
        ));
        assert!(matches!(
            cube.find_move("4R"),
            Err(MoveParseError::InvalidDepth(_))
        ));
        assert!(matches!(
            cube.find_move("0R"),
            Err(MoveParseError::InvalidDepth(_))
        ));
        assert!(matches!(
            cube.find_move("R3"),
            Err(MoveParseError::InvalidSuffix(_))
        ));
    }

    #[test]
    fn every_move_has_its_order() {
        for size in 1..=4 {
            let cube = Cube::new(size, MoveSet::AllLayers).unwrap();
            let solved = cube.solved();
            for &move_ in cube.moves() {
                let order = cube.move_order(move_);
                let mut state = solved.clone();
                for i in 1..=order {
                    state = cube.apply_move(&state, move_);
                    assert_eq!(state == solved, i == order, "{}", cube.move_name(move_));
                }
            }
        }
    }

    #[test]
    fn reverse_decomposition_undoes_move() {
        let cube = Cube::new(4, MoveSet::AllLayers).unwrap();
        let solved = cube.solved();
        for &move_ in cube.moves() {
            let moved = cube.apply_move(&solved, move_);
            let undone = apply_moves(&cube, &moved, &cube.reverse_decomposition(move_));
            assert_eq!(undone, solved);
        }
    }

    #[test]
    fn face_turn_moves_expected_stickers() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        let state = apply_moves(&cube, &cube.solved(), &cube.parse_moves("R").unwrap());
        // Eight stickers on the face itself and twelve around it
        let moved = state.stickers().filter(|&(s, l)| s != l).count();
        assert_eq!(moved, 20);
        assert!(cube.is_same_piece_arrangement(&cube.solved(), &state));
    }

    #[test]
    fn opposite_faces_commute() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        let solved = cube.solved();
        let rl = apply_moves(&cube, &solved, &cube.parse_moves("R L").unwrap());
        let lr = apply_moves(&cube, &solved, &cube.parse_moves("L R").unwrap());
        assert_eq!(rl, lr);

        let ru = apply_moves(&cube, &solved, &cube.parse_moves("R U").unwrap());
        let ur = apply_moves(&cube, &solved, &cube.parse_moves("U R").unwrap());
        assert_ne!(ru, ur);
    }

    #[test]
    fn sexy_move_has_order_six() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        let sexy = cube.parse_moves("R U R' U'").unwrap();
        let solved = cube.solved();
        let mut state = solved.clone();
        for i in 1..=6 {
            state = apply_moves(&cube, &state, &sexy);
            assert_eq!(state == solved, i == 6);
        }
    }

    #[test]
    fn merges_same_layer() {
        let cube = Cube::new(3, MoveSet::Faces).unwrap();
        let find = |name| cube.find_move(name).unwrap();
        assert_eq!(cube.merge_moves(find("R"), find("R'")), MoveMerge::Cancel);
        assert_eq!(
            cube.merge_moves(find("R"), find("R")),
            MoveMerge::Combined(find("R2"))
        );
        assert_eq!(
            cube.merge_moves(find("U2"), find("U")),
            MoveMerge::Combined(find("U'"))
        );
        assert_eq!(cube.move_axis(find("R")), cube.move_axis(find("L")));
        assert_ne!(cube.move_layer(find("R")), cube.move_layer(find("L")));
    }

    #[test]
    fn piece_arrangement_rejects_broken_states() {
        let cube = Cube::new(2, MoveSet::Faces).unwrap();
        let solved = cube.solved();

        // Stickers of two different corners trade places, tearing both apart
        let mut torn = solved.locations().to_vec();
        let first = cube.pieces()[0].slots[0] as usize;
        let second = cube.pieces()[1].slots[0] as usize;
        torn.swap(first, second);
        let torn = PuzzleState::new(torn.into_boxed_slice());
        assert!(!cube.is_same_piece_arrangement(&solved, &torn));

        let mut collided = solved.locations().to_vec();
        collided[second] = collided[first];
        let collided = PuzzleState::new(collided.into_boxed_slice());
        assert!(!cube.is_same_piece_arrangement(&solved, &collided));

        let short = PuzzleState::new(solved.locations()[1..].into());
        assert!(!cube.is_same_piece_arrangement(&solved, &short));
    }

    #[test]
    fn named_generators() {
        let cube = Cube::with_generators(2, &["R", "U", "F"]).unwrap();
        assert_eq!(cube.generators().len(), 3);
        assert!(Cube::with_generators(2, &["Q"]).is_err());
    }
}
