//! Command line and the validated run configuration built from it.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

use crate::error::{Error, Result};
use crate::evolution::EvolutionStrategy;
use crate::rules::MIN_GRID_SIDE;

/// Distributed Game of Life on a toroidal grid split in row bands.
#[derive(Parser, Debug, Clone)]
#[command(name = "game_of_life_rows", version)]
#[command(group(ArgGroup::new("mode").required(true).args(["init", "run"])))]
pub struct Cli {
    /// Initialize a random grid of `--size` cells per side into `--file`
    #[arg(short = 'i', long = "init")]
    pub init: bool,

    /// Run a simulation on the grid stored in `--file`
    #[arg(short = 'r', long = "run")]
    pub run: bool,

    /// Side of the grid to initialize
    #[arg(short = 'k', long = "size")]
    pub size: Option<usize>,

    /// Grid file, read when running and written when initializing
    #[arg(short = 'f', long = "file", default_value = "grid.pgm")]
    pub file: PathBuf,

    /// Generations to simulate
    #[arg(short = 'n', long = "steps")]
    pub steps: Option<u64>,

    /// Generations between snapshots, 0 only snapshots the last one
    #[arg(short = 's', long = "snapshot-every", default_value_t = 0)]
    pub snapshot_every: u64,

    /// Evolution strategy (`1` and `0` are accepted for static and ordered)
    #[arg(short = 'e', long = "evolution", value_enum)]
    pub evolution: Option<EvolutionStrategy>,

    /// Directory receiving the snapshots
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Threads per worker [default: RAYON_NUM_THREADS or one per core]
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Seed for reproducible initial grids
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// File to which the slowest worker's wall time is appended
    #[arg(long = "timing-file")]
    pub timing_file: Option<PathBuf>,

    /// Workers of the in-process ring (under MPI the world size is used instead)
    #[arg(short = 'w', long = "workers", default_value_t = 1)]
    pub workers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitSettings {
    pub file: PathBuf,
    pub side: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub file: PathBuf,
    pub steps: u64,
    pub snapshot_every: u64,
    pub strategy: EvolutionStrategy,
    pub output_dir: PathBuf,
    pub timing_file: Option<PathBuf>,
}

impl RunSettings {
    /// Whether a snapshot is written once generation `step` (counted from 1) is computed.
    pub fn snapshot_due(&self, step: u64) -> bool {
        if self.snapshot_every == 0 {
            step == self.steps
        } else {
            step % self.snapshot_every == 0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Initialize(InitSettings),
    Run(RunSettings),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub threads: Option<usize>,
    pub workers: usize,
}

impl Config {
    /// Checks that the arguments the chosen mode needs are present and usable.
    pub fn from_cli(cli: Cli) -> Result<Config> {
        if cli.threads == Some(0) {
            return Err(Error::Config("-t/--threads must be at least 1".to_string()));
        }
        if cli.workers == 0 {
            return Err(Error::Config("-w/--workers must be at least 1".to_string()));
        }

        let mode = if cli.init {
            let side = cli.size.ok_or_else(|| {
                Error::Config("-k/--size is required to initialize a grid".to_string())
            })?;
            if side < MIN_GRID_SIDE {
                return Err(Error::Config(format!(
                    "-k/--size must be at least {}, got {}",
                    MIN_GRID_SIDE, side
                )));
            }
            Mode::Initialize(InitSettings {
                file: cli.file,
                side,
                seed: cli.seed,
            })
        } else {
            let steps = cli.steps.ok_or_else(|| {
                Error::Config("-n/--steps is required to run a simulation".to_string())
            })?;
            if steps == 0 {
                return Err(Error::Config("-n/--steps must be at least 1".to_string()));
            }
            let strategy = cli.evolution.ok_or_else(|| {
                Error::Config("-e/--evolution is required to run a simulation".to_string())
            })?;
            Mode::Run(RunSettings {
                file: cli.file,
                steps,
                snapshot_every: cli.snapshot_every,
                strategy,
                output_dir: cli.output_dir,
                timing_file: cli.timing_file,
            })
        };

        Ok(Config {
            mode,
            threads: cli.threads,
            workers: cli.workers,
        })
    }
}
