//! Workers as MPI ranks of `MPI_COMM_WORLD`.

use mpi::collective::SystemOperation;
use mpi::topology::{Rank, SimpleCommunicator};
use mpi::traits::*;

use super::{length_mismatch, RingTransport, Tag};
use crate::error::{Error, Result};

/// Blocking standard-mode sends and receives over an MPI communicator.
///
/// Rows above the eager limit go through the rendezvous protocol: a send does not
/// return before the matching receive is posted. The halo exchange and the ordered
/// chain pass every row so that each blocked send's receiver is already on its way
/// to that receive.
pub struct MpiRing {
    world: SimpleCommunicator,
}

impl MpiRing {
    pub fn new(world: SimpleCommunicator) -> MpiRing {
        MpiRing { world }
    }

    fn peer(&self, rank: usize) -> Result<Rank> {
        if rank >= self.size() {
            return Err(Error::Protocol(format!(
                "rank {} does not exist in a world of {}",
                rank,
                self.size()
            )));
        }
        Ok(rank as Rank)
    }
}

impl RingTransport for MpiRing {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send(&self, dest: usize, tag: Tag, data: &[u8]) -> Result<()> {
        let dest = self.peer(dest)?;
        self.world
            .process_at_rank(dest)
            .send_with_tag(data, tag as mpi::Tag);
        Ok(())
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [u8]) -> Result<()> {
        let rank = self.peer(source)?;
        // a longer message than `buf` is an MPI truncation error and aborts the job
        let status = self
            .world
            .process_at_rank(rank)
            .receive_into_with_tag(buf, tag as mpi::Tag);
        let count = status.count(u8::equivalent_datatype()) as usize;
        if count != buf.len() {
            return Err(length_mismatch(source, tag, buf.len(), count));
        }
        Ok(())
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    fn abort(&self, code: i32) {
        self.world.abort(code)
    }

    fn broadcast_u64(&self, root: usize, value: &mut u64) -> Result<()> {
        let root = self.peer(root)?;
        self.world.process_at_rank(root).broadcast_into(value);
        Ok(())
    }

    fn reduce_max_f64(&self, root: usize, value: f64) -> Result<Option<f64>> {
        let root_process = self.world.process_at_rank(self.peer(root)?);
        if self.rank() == root {
            let mut max = value;
            root_process.reduce_into_root(&value, &mut max, SystemOperation::max());
            Ok(Some(max))
        } else {
            root_process.reduce_into(&value, SystemOperation::max());
            Ok(None)
        }
    }
}
