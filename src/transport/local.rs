//! A ring of workers living as threads of one process.

use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
#[cfg(test)]
use std::time::Duration;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{error, info_span};

use super::{length_mismatch, RingTransport, Tag};
use crate::error::{Error, Result};

struct Envelope {
    id: u64,
    tag: Tag,
    payload: Vec<u8>,
}

#[derive(Default)]
struct State {
    // (source, dest) -> messages in send order
    mailboxes: HashMap<(usize, usize), VecDeque<Envelope>>,
    next_id: u64,
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// When a send returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// As soon as the message is queued, like an MPI eager send.
    Buffered,
    /// Once the receiver has taken the message, like an MPI rendezvous send.
    /// Any wait past `deadline` fails instead of hanging.
    #[cfg_attr(not(test), allow(dead_code))]
    Rendezvous { deadline: Instant },
}

struct Shared {
    workers: usize,
    delivery: Delivery,
    state: Mutex<State>,
    signal: Condvar,
}

/// One worker's handle on an in-process ring.
///
/// Sends are buffered and never block. Receives match the oldest message from the
/// source carrying the requested tag, the way MPI matches on (source, tag).
pub struct LocalRing {
    rank: usize,
    shared: Arc<Shared>,
}

impl LocalRing {
    /// Runs `body` once per worker, each on its own thread, and collects the results by rank.
    ///
    /// A worker that fails or panics aborts the ring so nobody stays blocked on it;
    /// the first real failure is returned rather than the `Aborted` of its peers.
    pub fn run<F, R>(workers: usize, body: F) -> Result<Vec<R>>
    where
        F: Fn(&LocalRing) -> Result<R> + Sync,
        R: Send,
    {
        LocalRing::launch(workers, Delivery::Buffered, body)
    }

    /// Like [`LocalRing::run`], but every send waits for its receive. A ring still
    /// blocked after `patience` fails with a protocol error.
    #[cfg(test)]
    pub(crate) fn run_synchronous<F, R>(
        workers: usize,
        patience: Duration,
        body: F,
    ) -> Result<Vec<R>>
    where
        F: Fn(&LocalRing) -> Result<R> + Sync,
        R: Send,
    {
        let deadline = Instant::now() + patience;
        LocalRing::launch(workers, Delivery::Rendezvous { deadline }, body)
    }

    fn launch<F, R>(workers: usize, delivery: Delivery, body: F) -> Result<Vec<R>>
    where
        F: Fn(&LocalRing) -> Result<R> + Sync,
        R: Send,
    {
        if workers == 0 {
            return Err(Error::Config("worker count must be at least 1".to_string()));
        }
        let shared = Arc::new(Shared {
            workers,
            delivery,
            state: Mutex::new(State::default()),
            signal: Condvar::new(),
        });

        let outcomes: Vec<Result<R>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|rank| {
                    let ring = LocalRing {
                        rank,
                        shared: Arc::clone(&shared),
                    };
                    let body = &body;
                    scope.spawn(move || {
                        let _span = info_span!("worker", rank).entered();
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&ring)))
                            .unwrap_or_else(|_| {
                                Err(Error::Protocol(format!("worker {} panicked", rank)))
                            });
                        if let Err(err) = &outcome {
                            if !matches!(err, Error::Aborted) {
                                error!("{}", err);
                            }
                            ring.abort(1);
                        }
                        outcome
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::Protocol("worker thread died".to_string())))
                })
                .collect()
        });

        let mut results = Vec::with_capacity(workers);
        let mut first_failure = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => results.push(value),
                Err(Error::Aborted) => {
                    first_failure.get_or_insert(Error::Aborted);
                }
                Err(err) => {
                    if matches!(first_failure, None | Some(Error::Aborted)) {
                        first_failure = Some(err);
                    }
                }
            }
        }
        match first_failure {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    fn wait<D>(&self, state: &mut MutexGuard<'_, State>, waiting_for: D) -> Result<()>
    where
        D: FnOnce() -> String,
    {
        match self.shared.delivery {
            Delivery::Buffered => self.shared.signal.wait(state),
            Delivery::Rendezvous { deadline } => {
                if self.shared.signal.wait_until(state, deadline).timed_out() {
                    return Err(Error::Protocol(format!(
                        "rank {} stalled waiting for {}",
                        self.rank,
                        waiting_for()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl RingTransport for LocalRing {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.workers
    }

    fn send(&self, dest: usize, tag: Tag, data: &[u8]) -> Result<()> {
        if dest >= self.shared.workers {
            return Err(Error::Protocol(format!(
                "rank {} sent {:?} to nonexistent rank {}",
                self.rank, tag, dest
            )));
        }
        let mut state = self.shared.state.lock();
        if state.aborted {
            return Err(Error::Aborted);
        }
        let id = state.next_id;
        state.next_id += 1;
        state
            .mailboxes
            .entry((self.rank, dest))
            .or_default()
            .push_back(Envelope {
                id,
                tag,
                payload: data.to_vec(),
            });
        self.shared.signal.notify_all();

        if let Delivery::Rendezvous { .. } = self.shared.delivery {
            loop {
                if state.aborted {
                    return Err(Error::Aborted);
                }
                let queued = state
                    .mailboxes
                    .get(&(self.rank, dest))
                    .map_or(false, |queue| queue.iter().any(|envelope| envelope.id == id));
                if !queued {
                    break;
                }
                self.wait(&mut state, || format!("rank {} to take {:?}", dest, tag))?;
            }
        }
        Ok(())
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [u8]) -> Result<()> {
        if source >= self.shared.workers {
            return Err(Error::Protocol(format!(
                "rank {} waits for {:?} from nonexistent rank {}",
                self.rank, tag, source
            )));
        }
        let mut state = self.shared.state.lock();
        loop {
            if state.aborted {
                return Err(Error::Aborted);
            }
            if let Some(queue) = state.mailboxes.get_mut(&(source, self.rank)) {
                if let Some(position) = queue.iter().position(|envelope| envelope.tag == tag) {
                    if let Some(envelope) = queue.remove(position) {
                        // a rendezvous sender waits for exactly this
                        self.shared.signal.notify_all();
                        if envelope.payload.len() != buf.len() {
                            return Err(length_mismatch(
                                source,
                                tag,
                                buf.len(),
                                envelope.payload.len(),
                            ));
                        }
                        buf.copy_from_slice(&envelope.payload);
                        return Ok(());
                    }
                }
            }
            self.wait(&mut state, || format!("{:?} from rank {}", tag, source))?;
        }
    }

    fn barrier(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.aborted {
            return Err(Error::Aborted);
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.shared.workers {
            state.arrived = 0;
            state.generation += 1;
            self.shared.signal.notify_all();
            return Ok(());
        }
        while state.generation == generation {
            if state.aborted {
                return Err(Error::Aborted);
            }
            self.wait(&mut state, || "the barrier".to_string())?;
        }
        Ok(())
    }

    fn abort(&self, _code: i32) {
        let mut state = self.shared.state.lock();
        state.aborted = true;
        self.shared.signal.notify_all();
    }
}
