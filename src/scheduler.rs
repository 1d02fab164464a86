//! Splits a worker's per-generation update over its thread pool.

use std::ops::Range;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::rules::{live_neighbors, next_cell};

/// `slices` equal runs of `slice_len` cells, then a `remainder` left to one serial pass.
///
/// Indices are relative to the first interior cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicePlan {
    pub slice_len: usize,
    pub slices: usize,
    pub remainder: Range<usize>,
}

impl SlicePlan {
    pub fn new(cells: usize, threads: usize) -> SlicePlan {
        let threads = threads.max(1);
        let slice_len = cells / threads;
        let slices = if slice_len == 0 { 0 } else { threads };
        SlicePlan {
            slice_len,
            slices,
            remainder: slice_len * slices..cells,
        }
    }

    pub fn slice(&self, k: usize) -> Range<usize> {
        k * self.slice_len..(k + 1) * self.slice_len
    }
}

/// Thread pool of one worker. Only the worker's controlling thread talks to the ring.
pub struct Scheduler {
    pool: ThreadPool,
}

impl Scheduler {
    /// `threads` of `None` lets rayon pick (`RAYON_NUM_THREADS`, else one per core).
    pub fn new(threads: Option<usize>) -> Result<Scheduler> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("life-slice-{}", i));
        if let Some(threads) = threads {
            if threads == 0 {
                return Err(Error::Config("--threads must be at least 1".to_string()));
            }
            builder = builder.num_threads(threads);
        }
        let pool = builder
            .build()
            .map_err(|err| Error::Config(format!("could not start the thread pool: {}", err)))?;
        debug!(threads = pool.current_num_threads(), "slice pool ready");
        Ok(Scheduler { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Computes the interior rows of `next` from `current`; both are `cols`-wide bands with halos.
    ///
    /// Every cell only reads `current`, so slices run concurrently and the result does
    /// not depend on how they are scheduled.
    pub fn evolve_static(&self, current: &[u8], next: &mut [u8], cols: usize) {
        debug_assert_eq!(current.len(), next.len());
        let cells = current.len() - 2 * cols;
        let plan = SlicePlan::new(cells, self.threads());
        let slice_len = plan.slice_len;

        let interior = &mut next[cols..cols + cells];
        let (sliced, tail) = interior.split_at_mut(slice_len * plan.slices);
        if plan.slices > 0 {
            self.pool.scope(|scope| {
                for (k, slice) in sliced.chunks_mut(slice_len).enumerate() {
                    scope.spawn(move |_| update_run(current, slice, cols + k * slice_len, cols));
                }
            });
        }
        update_run(current, tail, cols + plan.remainder.start, cols);
    }

    /// Updates the interior rows of `cells` in place, in row-major order.
    ///
    /// A cell sees the new state of every cell before it, so this has to stay one
    /// sequential pass.
    pub fn evolve_in_place(&self, cells: &mut [u8], cols: usize) {
        let interior_end = cells.len() - cols;
        for index in cols..interior_end {
            cells[index] = evolved(cells, cols, index);
        }
    }
}

#[inline]
fn evolved(cells: &[u8], cols: usize, index: usize) -> u8 {
    let (row, col) = (index / cols, index % cols);
    next_cell(cells[index], live_neighbors(cells, cols, row, col))
}

// `out[k]` receives the next state of `current[first + k]`.
fn update_run(current: &[u8], out: &mut [u8], first: usize, cols: usize) {
    let mut groups = out.chunks_exact_mut(4);
    let mut index = first;
    for group in &mut groups {
        let next = [
            evolved(current, cols, index),
            evolved(current, cols, index + 1),
            evolved(current, cols, index + 2),
            evolved(current, cols, index + 3),
        ];
        group.copy_from_slice(&next);
        index += 4;
    }
    for cell in groups.into_remainder() {
        *cell = evolved(current, cols, index);
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band::WorkerBand;
    use crate::rules::{ALIVE, DEAD};
    use rand::{Rng, SeedableRng};

    #[test]
    fn plan_is_equal_slices_plus_remainder() {
        let plan = SlicePlan::new(30, 4);
        assert_eq!(plan.slice_len, 7);
        assert_eq!(plan.slices, 4);
        assert_eq!(plan.slice(3), 21..28);
        assert_eq!(plan.remainder, 28..30);

        let tiny = SlicePlan::new(3, 8);
        assert_eq!(tiny.slices, 0);
        assert_eq!(tiny.remainder, 0..3);

        assert_eq!(SlicePlan::new(12, 0), SlicePlan::new(12, 1));
    }

    #[test]
    fn thread_count_does_not_change_the_result() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x51CE);
        let interior: Vec<u8> = (0..11 * 13)
            .map(|_| if rng.gen_bool(0.4) { ALIVE } else { DEAD })
            .collect();
        let mut band = WorkerBand::from_interior(13, &interior);
        band.wrap_halos_locally();

        let outputs: Vec<Vec<u8>> = [1, 2, 3, 7]
            .iter()
            .map(|&threads| {
                let scheduler = Scheduler::new(Some(threads)).unwrap();
                let mut next = vec![DEAD; band.cells().len()];
                scheduler.evolve_static(band.cells(), &mut next, 13);
                next[13..13 + 11 * 13].to_vec()
            })
            .collect();
        for output in &outputs[1..] {
            assert_eq!(output, &outputs[0]);
        }
    }

    #[test]
    fn blinker_oscillates() {
        // 5x5, horizontal blinker in the middle row
        let mut interior = vec![DEAD; 25];
        for col in 1..4 {
            interior[2 * 5 + col] = ALIVE;
        }
        let mut band = WorkerBand::from_interior(5, &interior);
        band.wrap_halos_locally();

        let scheduler = Scheduler::new(Some(2)).unwrap();
        let mut next = vec![DEAD; band.cells().len()];
        scheduler.evolve_static(band.cells(), &mut next, 5);

        let mut vertical = vec![DEAD; 25];
        for row in 1..4 {
            vertical[row * 5 + 2] = ALIVE;
        }
        assert_eq!(&next[5..30], vertical.as_slice());
    }

    #[test]
    fn in_place_pass_sees_updated_cells() {
        // On a 3x3 torus the synchronous step revives every cell. In place, (1,1)
        // already counts the revived (0,2) and dies of overcrowding.
        let mut interior = vec![DEAD; 9];
        interior[0] = ALIVE;
        interior[1] = ALIVE;
        interior[3] = ALIVE;
        let mut synchronous = WorkerBand::from_interior(3, &interior);
        synchronous.wrap_halos_locally();
        let mut in_place = synchronous.clone();

        let scheduler = Scheduler::new(Some(1)).unwrap();
        let mut next = vec![DEAD; synchronous.cells().len()];
        scheduler.evolve_static(synchronous.cells(), &mut next, 3);
        scheduler.evolve_in_place(in_place.cells_mut(), 3);

        assert_ne!(&next[3..12], in_place.interior());
    }
}
