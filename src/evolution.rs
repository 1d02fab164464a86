//! One generation of a worker's band, under either update strategy.

use clap::ValueEnum;

use crate::band::WorkerBand;
use crate::error::Result;
use crate::halo;
use crate::partition::{ChainRole, RingLinks};
use crate::rules::DEAD;
use crate::scheduler::Scheduler;
use crate::transport::RingTransport;

/// How a generation is computed. Chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EvolutionStrategy {
    /// Every cell is computed from the previous generation only.
    #[value(alias = "1")]
    Static,
    /// Cells are updated in place and the ring is walked as a chain, rank 0 first:
    /// later workers see some of their neighbors' cells already updated.
    ///
    /// The outcome depends on the number of workers. Any chain of two or more amounts
    /// to one row-major sweep over the torus; a single worker wraps its rows before
    /// updating, so its last row sees row 0 as it was.
    #[value(alias = "0")]
    Ordered,
}

/// Advances one worker's band generation by generation.
pub struct Evolver {
    strategy: EvolutionStrategy,
    links: RingLinks,
    scheduler: Scheduler,
    scratch: Vec<u8>,
}

impl Evolver {
    pub fn new(strategy: EvolutionStrategy, links: RingLinks, scheduler: Scheduler) -> Evolver {
        Evolver {
            strategy,
            links,
            scheduler,
            scratch: Vec::new(),
        }
    }

    pub fn strategy(&self) -> EvolutionStrategy {
        self.strategy
    }

    pub fn links(&self) -> &RingLinks {
        &self.links
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Replaces the interior of `band` by the next generation.
    ///
    /// The halo rows are left stale afterwards, the next exchange rewrites them.
    pub fn step<T>(&mut self, band: &mut WorkerBand, transport: &T) -> Result<()>
    where
        T: RingTransport + ?Sized,
    {
        match self.strategy {
            EvolutionStrategy::Static => self.step_static(band, transport),
            EvolutionStrategy::Ordered => self.step_ordered(band, transport),
        }
    }

    fn step_static<T>(&mut self, band: &mut WorkerBand, transport: &T) -> Result<()>
    where
        T: RingTransport + ?Sized,
    {
        halo::exchange(band, &self.links, transport)?;

        self.scratch.resize(band.cells().len(), DEAD);
        self.scheduler.evolve_static(band.cells(), &mut self.scratch, band.cols());
        band.swap_cells(&mut self.scratch);
        Ok(())
    }

    fn step_ordered<T>(&mut self, band: &mut WorkerBand, transport: &T) -> Result<()>
    where
        T: RingTransport + ?Sized,
    {
        let links = &self.links;
        let cols = band.cols();

        if links.is_solo() {
            band.wrap_halos_locally();
            self.scheduler.evolve_in_place(band.cells_mut(), cols);
            return Ok(());
        }

        match links.chain_role() {
            ChainRole::Head => {
                // computes from last generation's boundaries, then starts the chain
                halo::receive_top_halo(band, links, transport)?;
                halo::receive_bottom_halo(band, links, transport)?;
                self.scheduler.evolve_in_place(band.cells_mut(), cols);
                halo::send_first_row(band, links, transport)?;
                halo::send_last_row(band, links, transport)?;
            }
            ChainRole::Middle => {
                halo::send_first_row(band, links, transport)?;
                halo::receive_bottom_halo(band, links, transport)?;
                // blocks until the previous worker of the chain is done
                halo::receive_top_halo(band, links, transport)?;
                self.scheduler.evolve_in_place(band.cells_mut(), cols);
                halo::send_last_row(band, links, transport)?;
            }
            ChainRole::Tail => {
                halo::send_last_row(band, links, transport)?;
                halo::send_first_row(band, links, transport)?;
                // rank 0's and the previous worker's rows arrive already updated
                halo::receive_bottom_halo(band, links, transport)?;
                halo::receive_top_halo(band, links, transport)?;
                self.scheduler.evolve_in_place(band.cells_mut(), cols);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::Partition;
    use crate::rules::{live_neighbors, ALIVE};
    use crate::transport::LocalRing;
    use std::time::Duration;

    fn solo_evolver(strategy: EvolutionStrategy) -> Evolver {
        Evolver::new(strategy, RingLinks::new(0, 1), Scheduler::new(Some(2)).unwrap())
    }

    #[test]
    fn diagonal_neighbor_across_both_edges() {
        let mut interior = vec![DEAD; 9];
        interior[0] = ALIVE;
        let mut band = WorkerBand::from_interior(3, &interior);
        band.wrap_halos_locally();

        // global (2, 2) is buffer row 3
        assert_eq!(live_neighbors(band.cells(), 3, 3, 2), 1);
    }

    #[test]
    fn full_three_by_three_dies_in_one_static_step() {
        let bands = LocalRing::run(1, |ring| {
            let mut band = WorkerBand::from_interior(3, &[ALIVE; 9]);
            solo_evolver(EvolutionStrategy::Static).step(&mut band, ring)?;
            Ok(band)
        })
        .unwrap();
        assert_eq!(bands[0].interior(), &[DEAD; 9]);
    }

    #[test]
    fn strategies_agree_on_a_still_life() {
        // a block on a 6x6 torus never changes under either strategy
        let mut interior = vec![DEAD; 36];
        for (row, col) in [(2, 2), (2, 3), (3, 2), (3, 3)] {
            interior[row * 6 + col] = ALIVE;
        }
        for strategy in [EvolutionStrategy::Static, EvolutionStrategy::Ordered] {
            let bands = LocalRing::run(2, |ring| {
                let links = RingLinks::new(ring.rank(), 2);
                let rows = &interior[ring.rank() * 18..(ring.rank() + 1) * 18];
                let mut band = WorkerBand::from_interior(6, rows);
                let mut evolver = Evolver::new(strategy, links, Scheduler::new(Some(1))?);
                for _ in 0..4 {
                    evolver.step(&mut band, ring)?;
                }
                Ok(band.interior().to_vec())
            })
            .unwrap();
            assert_eq!(bands.concat(), interior, "{:?}", strategy);
        }
    }

    // glider on a 10x10 torus, one band per worker
    fn evolve_glider(
        ring: &LocalRing,
        strategy: EvolutionStrategy,
        steps: usize,
    ) -> Result<Vec<u8>> {
        let side = 10;
        let mut grid = vec![DEAD; side * side];
        for (row, col) in [(0, 1), (1, 2), (2, 0), (2, 1), (2, 2)] {
            grid[row * side + col] = ALIVE;
        }
        let part = Partition::compute(side, ring.size(), ring.rank())?;
        let start = part.global_row_offset * side;
        let mut band = WorkerBand::from_interior(side, &grid[start..start + part.cells(side)]);
        let links = RingLinks::new(ring.rank(), ring.size());
        let mut evolver = Evolver::new(strategy, links, Scheduler::new(Some(1))?);
        for _ in 0..steps {
            evolver.step(&mut band, ring)?;
        }
        Ok(band.interior().to_vec())
    }

    #[test]
    fn both_strategies_complete_when_sends_wait_for_receives() {
        for workers in 2..=5 {
            for strategy in [EvolutionStrategy::Static, EvolutionStrategy::Ordered] {
                let waited = LocalRing::run_synchronous(workers, Duration::from_secs(10), |ring| {
                    evolve_glider(ring, strategy, 6)
                })
                .unwrap_or_else(|err| panic!("{:?} on {} workers: {}", strategy, workers, err));
                let buffered =
                    LocalRing::run(workers, |ring| evolve_glider(ring, strategy, 6)).unwrap();
                assert_eq!(waited, buffered, "{:?} on {} workers", strategy, workers);
            }
        }
    }

    #[test]
    fn numeric_aliases_select_the_strategy() {
        assert_eq!(
            EvolutionStrategy::from_str("1", true).unwrap(),
            EvolutionStrategy::Static
        );
        assert_eq!(
            EvolutionStrategy::from_str("0", true).unwrap(),
            EvolutionStrategy::Ordered
        );
        assert!(EvolutionStrategy::from_str("chaotic", true).is_err());
    }
}
