//! Random initial grids, written straight into a shared grid file.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::checkpoint;
use crate::error::{Error, Result};
use crate::partition::Partition;
use crate::rules::{ALIVE, DEAD, MIN_GRID_SIDE};
use crate::transport::RingTransport;

/// Fraction of cells alive in a generated grid.
pub const LIVE_DENSITY: f64 = 0.5;

/// Every worker fills its own band and writes it at its offset of `path`.
///
/// With a seed every row is drawn from its own generator, so the file only depends
/// on `seed` and `side`, not on how many workers produced it.
pub fn write_random_grid<T>(
    transport: &T,
    path: &Path,
    side: usize,
    seed: Option<u64>,
) -> Result<Partition>
where
    T: RingTransport + ?Sized,
{
    if side < MIN_GRID_SIDE {
        return Err(Error::Config(format!(
            "-k/--size must be at least {}, got {}",
            MIN_GRID_SIDE, side
        )));
    }
    let partition = Partition::compute(side, transport.size(), transport.rank())?;
    info!(
        rows = partition.local_rows,
        cells = partition.cells(side),
        "generating band"
    );

    let mut interior = Vec::with_capacity(partition.cells(side));
    match seed {
        Some(seed) => {
            let first = partition.global_row_offset;
            for row in first..first + partition.local_rows {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(row as u64));
                fill_row(&mut rng, side, &mut interior);
            }
        }
        None => {
            let mut rng = StdRng::from_entropy();
            for _ in 0..partition.local_rows {
                fill_row(&mut rng, side, &mut interior);
            }
        }
    }

    checkpoint::write_shared(transport, path, side, &partition, &interior)?;
    Ok(partition)
}

fn fill_row(rng: &mut StdRng, side: usize, out: &mut Vec<u8>) {
    out.extend((0..side).map(|_| if rng.gen_bool(LIVE_DENSITY) { ALIVE } else { DEAD }));
}
