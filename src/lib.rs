//! Conway's Game of Life on a large toroidal grid, split in contiguous row bands
//! over a ring of workers, each band updated by a pool of threads.
//!
//! Workers only share boundary rows ("halos") with their two ring neighbors and
//! read and write their own byte range of shared grid files.

pub mod band;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod evolution;
pub mod generate;
pub mod halo;
pub mod partition;
pub mod rules;
pub mod scheduler;
pub mod simulation;
pub mod transport;

pub use band::WorkerBand;
pub use error::{Error, Result};
pub use evolution::{EvolutionStrategy, Evolver};
pub use partition::{Partition, RingLinks};
pub use transport::{LocalRing, RingTransport};
