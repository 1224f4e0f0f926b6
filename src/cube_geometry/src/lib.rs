//! Puzzle mechanics consumed by the stabilizer chain: the `Puzzle` trait, the
//! `PuzzleState` value, and an N×N×N cube with distinguishable stickers.

#![warn(clippy::pedantic)]
#![allow(clippy::similar_names, clippy::module_name_repetitions)]

pub mod cube;
pub mod puzzle;

pub use cube::{Cube, CubeError, CubeMove, MoveSet};
pub use puzzle::{
    MoveMerge, Piece, Puzzle, PuzzleState, Slot, UNUSED_SLOT, apply_moves, random_moves,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoveParseError {
    #[error("Empty move name")]
    Empty,
    #[error("Unknown face in move {0:?}")]
    UnknownFace(String),
    #[error("Invalid layer depth in move {0:?}")]
    InvalidDepth(String),
    #[error("Invalid turn suffix in move {0:?}")]
    InvalidSuffix(String),
}
