use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use game_of_life_rows::config::{Cli, Config};
use game_of_life_rows::simulation;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("game_of_life_rows=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// Every worker is a thread of this process.
#[cfg(not(feature = "mpi"))]
fn main() -> ExitCode {
    use game_of_life_rows::LocalRing;

    init_tracing();

    // clap exits with status 2 on its own before anything is read or written
    let config = match Config::from_cli(Cli::parse()) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    // a failing worker has already logged its error from inside its span
    match LocalRing::run(config.workers, |ring| simulation::execute(&config, ring)) {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

// Every worker is an MPI rank: `mpirun -n W game_of_life_rows -r ...`
#[cfg(feature = "mpi")]
fn main() -> ExitCode {
    use game_of_life_rows::transport::MpiRing;
    use game_of_life_rows::RingTransport;
    use mpi::Threading;
    use tracing::{debug, info_span};

    init_tracing();

    // only this thread talks to MPI, the slice pools never do
    let Some((universe, _threading)) = mpi::initialize_with_threading(Threading::Funneled) else {
        error!("MPI could not be initialized");
        return ExitCode::FAILURE;
    };
    let ring = MpiRing::new(universe.world());
    let rank = ring.rank();
    let _span = info_span!("worker", rank).entered();

    // every rank sees the same arguments, so every rank fails the same way;
    // only rank 0 tells the user about it
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            if rank == 0 {
                let _ = err.print();
            }
            return ExitCode::from(err.exit_code() as u8);
        }
    };
    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            if rank == 0 {
                error!("{}", err);
            }
            return ExitCode::FAILURE;
        }
    };
    if config.workers != 1 {
        debug!(world = ring.size(), "--workers is ignored under MPI");
    }

    match simulation::execute(&config, &ring) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            // neighbors may be blocked on this rank forever
            ring.abort(1);
            ExitCode::FAILURE
        }
    }
}
