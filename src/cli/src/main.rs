use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{OptionExt, WrapErr};
use cube_geometry::{Cube, MoveSet, Puzzle};
use env_logger::TimestampPrecision;
use itertools::Itertools;
use log::{LevelFilter, warn};
use owo_colors::OwoColorize;
use stabilizer_chain::{ChainConfig, SimplifyLevel, StabilizerChain};

/// Used by `--simplify words` when the configuration has no table depth.
const DEFAULT_SHORT_WORD_DEPTH: usize = 3;

/// Builds stabilizer chains for cubes and solves scrambles with them
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The chain configuration file to use, in TOML format.
    #[arg(long, short = 'c', value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (can be repeated)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct PuzzleArgs {
    /// The edge length of the cube
    #[arg(short, long, default_value_t = 3)]
    size: u8,

    /// The generators of the group, e.g. "R U F". Defaults to the six faces.
    #[arg(short, long)]
    generators: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a scramble and print the solution.
    Solve {
        #[command(flatten)]
        puzzle: PuzzleArgs,
        /// The scramble to solve, e.g. "R U' F2". Random if not given.
        #[arg(long, conflicts_with_all = ["scramble_length", "seed"])]
        scramble: Option<String>,
        /// The number of generators in a random scramble
        #[arg(long, default_value_t = 30)]
        scramble_length: usize,
        /// Seed for the random scramble
        #[arg(long)]
        seed: Option<u64>,
        /// How far to simplify the solution
        #[arg(long, value_enum, default_value_t = Simplify::Cancel)]
        simplify: Simplify,
    },
    /// Print the group order and the orbit size of every chain step.
    Order {
        #[command(flatten)]
        puzzle: PuzzleArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Simplify {
    /// Merge and cancel adjacent moves
    Cancel,
    /// Also push inversions down to the move lists
    Sink,
    /// Also turn the solution into one move list
    Flatten,
    /// Also replace move runs by shorter words
    Words,
}

impl PuzzleArgs {
    fn cube(&self) -> color_eyre::Result<Cube> {
        let cube = match &self.generators {
            Some(generators) => Cube::with_generators(
                self.size,
                &generators.split_whitespace().collect_vec(),
            )?,
            None => Cube::new(self.size, MoveSet::Faces)?,
        };
        Ok(cube)
    }
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let config = match &cli.config {
        Some(path) => ChainConfig::from_file(path)
            .wrap_err_with(|| format!("Failed to load {}", path.display()))?,
        None => ChainConfig::default(),
    };

    match cli.command {
        Commands::Solve {
            puzzle,
            scramble,
            scramble_length,
            seed,
            simplify,
        } => {
            if let Some(seed) = seed {
                fastrand::seed(seed);
            }
            solve(&puzzle, scramble.as_deref(), scramble_length, simplify, config)
        }
        Commands::Order { puzzle } => order(&puzzle, &config),
    }
}

fn solve(
    puzzle: &PuzzleArgs,
    scramble: Option<&str>,
    scramble_length: usize,
    simplify: Simplify,
    mut config: ChainConfig,
) -> color_eyre::Result<()> {
    if matches!(simplify, Simplify::Words) && config.short_word_depth == 0 {
        warn!("No short word depth is configured, using {DEFAULT_SHORT_WORD_DEPTH}");
        config.short_word_depth = DEFAULT_SHORT_WORD_DEPTH;
    }

    let chain = StabilizerChain::from_puzzle(puzzle.cube()?, &config);
    let group = chain.group();

    let scramble = match scramble {
        Some(moves) => group.parse(moves)?,
        None => group.random(scramble_length),
    };
    println!("{} {scramble}", "Scramble:".bold());

    let solution = chain
        .solve(&scramble.apply(group.solved()))
        .wrap_err("The scramble is outside of the group")?;
    for (index, step) in solution.steps().iter().enumerate() {
        if step.action.count() > 0 {
            println!(
                "{} {} moves",
                format!("Step {index:>3}:").dimmed(),
                step.action.count()
            );
        }
    }

    let level = match simplify {
        Simplify::Cancel => SimplifyLevel::CancelMoves,
        Simplify::Sink => SimplifyLevel::SinkInversions,
        Simplify::Flatten => SimplifyLevel::Flatten,
        Simplify::Words => SimplifyLevel::ShortWords(
            chain
                .short_words()
                .ok_or_eyre("The chain has no short word table")?,
        ),
    };
    let simplified = solution.combined().simplify(level);

    println!(
        "{} {} moves, {} after simplifying",
        "Solution:".bold(),
        solution.move_count(),
        simplified.count()
    );
    println!(
        "{}",
        group.puzzle().format_moves(&simplified.moves()).green()
    );
    Ok(())
}

fn order(puzzle: &PuzzleArgs, config: &ChainConfig) -> color_eyre::Result<()> {
    let chain = StabilizerChain::from_puzzle(puzzle.cube()?, config);

    println!("{} {}", "Group order:".bold(), chain.order().green());
    let summaries = chain.step_summaries();
    println!(
        "{} {}",
        "Orbit sizes:".bold(),
        summaries
            .iter()
            .map(|summary| summary.orbit_size)
            .filter(|&size| size > 1)
            .join(" · ")
    );
    for summary in summaries {
        println!(
            "{} orbit {:>3}, {:>2} of at most {:>3} generators, {} rejected",
            format!("Step {:>3}:", summary.index).dimmed(),
            summary.orbit_size,
            summary.generators,
            summary.generator_bound,
            summary.rejected
        );
    }
    Ok(())
}
