//! Incremental stabilizer chains for permutation puzzles.
//!
//! A `StabilizerChain` fixes the pieces of a puzzle one step at a time. Each
//! step keeps a bounded generating set behind a generator filter, a coset
//! representative for every configuration its pieces can reach, and passes
//! Schreier generators down to the next step. Solving a state strips one
//! coset representative per step.

#![warn(clippy::pedantic)]
#![allow(
    clippy::similar_names,
    clippy::module_name_repetitions,
    clippy::must_use_candidate
)]

pub mod action;
pub mod block_set;
pub mod chain;
pub mod config;
pub mod filter;
pub mod permutation_map;
pub mod short_words;

pub use action::{Action, PuzzleGroup, SimplifyLevel};
pub use block_set::{BlockSet, BlockSetError};
pub use chain::{SolveError, Solution, SolutionStep, StabilizerChain, StepSummary};
pub use config::{ChainConfig, ConfigError, VerificationLevel};
pub use filter::{Filter, FilterKind, FilterOutcome, GeneratorFilter, StabilizingOrder};
pub use permutation_map::{PermutationMap, PermutationMapError};
pub use short_words::ShortWordTable;

#[macro_export]
macro_rules! start {
    ($msg:expr) => {
        concat!("⏳ ", $msg)
    };
}

#[macro_export]
macro_rules! working {
    ($msg:expr) => {
        concat!("🛠  ", $msg)
    };
}

#[macro_export]
macro_rules! success {
    ($msg:expr) => {
        concat!("✅ ", $msg)
    };
}
