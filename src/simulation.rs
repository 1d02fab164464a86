//! Drives a worker through a whole run: load, evolve, snapshot, report.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::band::WorkerBand;
use crate::checkpoint::{self, snapshot_name, LoadedBand};
use crate::config::{Config, Mode, RunSettings};
use crate::error::{Error, Result};
use crate::evolution::Evolver;
use crate::generate;
use crate::partition::{Partition, RingLinks};
use crate::scheduler::Scheduler;
use crate::transport::RingTransport;

/// What a finished run produced, as seen by one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub steps: u64,
    pub snapshots: Vec<PathBuf>,
    /// Wall time of the slowest worker, only known on rank 0.
    pub elapsed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Initialized(Partition),
    Simulated(RunReport),
}

/// Runs the mode selected by `config` on this worker.
pub fn execute<T>(config: &Config, transport: &T) -> Result<Outcome>
where
    T: RingTransport + ?Sized,
{
    match &config.mode {
        Mode::Initialize(init) => {
            let partition =
                generate::write_random_grid(transport, &init.file, init.side, init.seed)?;
            if transport.rank() == 0 {
                info!(path = %init.file.display(), side = init.side, "grid initialized");
            }
            Ok(Outcome::Initialized(partition))
        }
        Mode::Run(settings) => {
            let mut simulation = Simulation::load(transport, settings.clone(), config.threads)?;
            Ok(Outcome::Simulated(simulation.run()?))
        }
    }
}

/// One worker's view of a running simulation.
pub struct Simulation<'t, T: ?Sized> {
    transport: &'t T,
    settings: RunSettings,
    side: usize,
    partition: Partition,
    band: WorkerBand,
    evolver: Evolver,
}

impl<'t, T> Simulation<'t, T>
where
    T: RingTransport + ?Sized,
{
    /// Reads this worker's band from `settings.file`.
    pub fn load(transport: &'t T, settings: RunSettings, threads: Option<usize>) -> Result<Self> {
        let loaded = checkpoint::read_shared(transport, &settings.file)?;
        Simulation::from_band(transport, settings, loaded, threads)
    }

    pub fn from_band(
        transport: &'t T,
        settings: RunSettings,
        loaded: LoadedBand,
        threads: Option<usize>,
    ) -> Result<Self> {
        let LoadedBand {
            side,
            partition,
            band,
        } = loaded;
        fs::create_dir_all(&settings.output_dir)
            .map_err(|err| Error::io(&settings.output_dir, err))?;

        let links = RingLinks::new(transport.rank(), transport.size());
        let evolver = Evolver::new(settings.strategy, links, Scheduler::new(threads)?);
        info!(
            side,
            rows = partition.local_rows,
            first_row = partition.global_row_offset,
            prev = evolver.links().prev,
            next = evolver.links().next,
            threads = evolver.scheduler().threads(),
            strategy = ?evolver.strategy(),
            "band ready"
        );

        Ok(Simulation {
            transport,
            settings,
            side,
            partition,
            band,
            evolver,
        })
    }

    pub fn band(&self) -> &WorkerBand {
        &self.band
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Advances the band by one generation.
    pub fn step(&mut self) -> Result<()> {
        self.evolver.step(&mut self.band, self.transport)
    }

    /// Runs every generation, writing snapshots on the configured cadence.
    pub fn run(&mut self) -> Result<RunReport> {
        let start = Instant::now();
        let mut snapshots = Vec::new();

        for step in 1..=self.settings.steps {
            self.step()?;
            if self.settings.snapshot_due(step) {
                snapshots.push(self.snapshot(step)?);
            }
        }

        let elapsed = self
            .transport
            .reduce_max_f64(0, start.elapsed().as_secs_f64())?;
        if let Some(seconds) = elapsed {
            info!(steps = self.settings.steps, seconds, "simulation finished");
            if let Some(path) = &self.settings.timing_file {
                append_timing(path, seconds)?;
            }
        }

        Ok(RunReport {
            steps: self.settings.steps,
            snapshots,
            elapsed,
        })
    }

    /// Writes the current interior rows into the snapshot file of `step`.
    pub fn snapshot(&self, step: u64) -> Result<PathBuf> {
        let path = self.settings.output_dir.join(snapshot_name(step));
        checkpoint::write_shared(
            self.transport,
            &path,
            self.side,
            &self.partition,
            self.band.interior(),
        )?;
        debug!(step, population = self.band.population(), "snapshot written");
        Ok(path)
    }
}

fn append_timing(path: &Path, seconds: f64) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| Error::io(path, err))?;
    writeln!(file, "{}", seconds).map_err(|err| Error::io(path, err))
}
