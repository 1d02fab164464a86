//! Row-band partitioning of the global grid and the ring built over the workers.

use crate::error::{Error, Result};

/// One worker's share of the global grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub worker_id: usize,
    pub local_rows: usize,
    pub global_row_offset: usize,
}

impl Partition {
    /// Splits `n` rows over `workers`, the first `n % workers` workers taking one extra row.
    ///
    /// The offset is replayed worker by worker instead of using a closed form, so the
    /// remainder distribution stays exactly the one used to lay out the shared file.
    pub fn compute(n: usize, workers: usize, rank: usize) -> Result<Partition> {
        if workers == 0 {
            return Err(Error::Config("worker count must be at least 1".to_string()));
        }
        if rank >= workers {
            return Err(Error::Config(format!(
                "rank {} is outside of a ring of {} workers",
                rank, workers
            )));
        }
        if workers > n {
            return Err(Error::Config(format!(
                "{} workers can not share a grid of only {} rows",
                workers, n
            )));
        }

        let base_rows = n / workers;
        let leftovers = n % workers;
        let rows_of = |worker: usize| base_rows + usize::from(worker < leftovers);

        let mut global_row_offset = 0;
        for worker in 0..rank {
            global_row_offset += rows_of(worker);
        }

        Ok(Partition {
            worker_id: rank,
            local_rows: rows_of(rank),
            global_row_offset,
        })
    }

    /// Partitions of every worker, in rank order.
    pub fn all(n: usize, workers: usize) -> Result<Vec<Partition>> {
        (0..workers)
            .map(|rank| Partition::compute(n, workers, rank))
            .collect()
    }

    /// Byte position of this worker's first interior row inside a grid file.
    pub fn byte_offset(&self, header_len: u64, n: usize) -> u64 {
        header_len + (self.global_row_offset * n) as u64
    }

    /// Number of interior cells owned by this worker.
    pub fn cells(&self, n: usize) -> usize {
        self.local_rows * n
    }
}

/// Position of a worker in the ordered strategy's propagation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainRole {
    /// Rank 0, computes first from the previous step's boundaries.
    Head,
    /// Any rank strictly between the head and the tail.
    Middle,
    /// The last rank, computes after everybody else.
    Tail,
}

/// A worker's two ring neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLinks {
    pub rank: usize,
    pub workers: usize,
    pub prev: usize,
    pub next: usize,
}

impl RingLinks {
    pub fn new(rank: usize, workers: usize) -> RingLinks {
        RingLinks {
            rank,
            workers,
            prev: (rank + workers - 1) % workers,
            next: (rank + 1) % workers,
        }
    }

    /// A ring of one: the band already holds the whole grid, nothing is exchanged.
    pub fn is_solo(&self) -> bool {
        self.workers == 1
    }

    pub fn chain_role(&self) -> ChainRole {
        if self.rank == 0 {
            ChainRole::Head
        } else if self.rank == self.workers - 1 {
            ChainRole::Tail
        } else {
            ChainRole::Middle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_cover_the_grid() {
        for n in 1..=40 {
            for workers in 1..=n {
                let parts = Partition::all(n, workers).unwrap();
                let total: usize = parts.iter().map(|p| p.local_rows).sum();
                assert_eq!(total, n, "n={n} workers={workers}");

                let max = parts.iter().map(|p| p.local_rows).max().unwrap();
                let min = parts.iter().map(|p| p.local_rows).min().unwrap();
                assert!(max - min <= 1, "n={n} workers={workers}");
                assert!(min >= 1);
            }
        }
    }

    #[test]
    fn offsets_are_cumulative() {
        for n in 1..=40 {
            for workers in 1..=n {
                let parts = Partition::all(n, workers).unwrap();
                assert_eq!(parts[0].global_row_offset, 0);
                for pair in parts.windows(2) {
                    assert_eq!(
                        pair[1].global_row_offset,
                        pair[0].global_row_offset + pair[0].local_rows
                    );
                }
            }
        }
    }

    #[test]
    fn remainder_goes_to_lowest_ranks() {
        let rows: Vec<usize> = Partition::all(10, 4)
            .unwrap()
            .iter()
            .map(|p| p.local_rows)
            .collect();
        assert_eq!(rows, vec![3, 3, 2, 2]);

        let single = Partition::compute(7, 1, 0).unwrap();
        assert_eq!(single.local_rows, 7);
        assert_eq!(single.global_row_offset, 0);
    }

    #[test]
    fn byte_offset_skips_header_and_previous_rows() {
        let part = Partition::compute(10, 4, 2).unwrap();
        assert_eq!(part.global_row_offset, 6);
        assert_eq!(part.byte_offset(15, 10), 15 + 60);
        assert_eq!(part.cells(10), 20);
    }

    #[test]
    fn rejects_more_workers_than_rows() {
        assert!(matches!(Partition::compute(3, 4, 0), Err(Error::Config(_))));
        assert!(matches!(Partition::compute(8, 0, 0), Err(Error::Config(_))));
        assert!(matches!(Partition::compute(8, 2, 2), Err(Error::Config(_))));
    }

    #[test]
    fn ring_links_wrap_around() {
        let first = RingLinks::new(0, 4);
        assert_eq!((first.prev, first.next), (3, 1));
        assert_eq!(first.chain_role(), ChainRole::Head);

        let last = RingLinks::new(3, 4);
        assert_eq!((last.prev, last.next), (2, 0));
        assert_eq!(last.chain_role(), ChainRole::Tail);

        assert_eq!(RingLinks::new(1, 4).chain_role(), ChainRole::Middle);

        let solo = RingLinks::new(0, 1);
        assert!(solo.is_solo());
        assert_eq!((solo.prev, solo.next), (0, 0));
    }
}
