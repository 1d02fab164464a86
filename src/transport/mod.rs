//! Message passing between workers.
//!
//! Workers only ever exchange whole row buffers and a handful of scalars, so the
//! layer is kept that small: blocking point-to-point messages matched by source
//! and tag, a barrier, and the two collectives the run needs.

mod local;
#[cfg(feature = "mpi")]
mod mpi_ring;

pub use local::LocalRing;
#[cfg(feature = "mpi")]
pub use mpi_ring::MpiRing;

use crate::error::{Error, Result};

/// What a message carries. Point-to-point messages are matched on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Tag {
    /// The sender's first interior row.
    FirstRow = 1,
    /// The sender's last interior row.
    LastRow = 2,
    /// Grid metadata broadcast from rank 0.
    Metadata = 3,
    /// Per-worker timings reduced to rank 0.
    Timing = 4,
}

/// Inter-worker messaging used by the halo exchange, the checkpoint I/O and the driver.
///
/// Messages from one source with one tag are delivered in the order they were sent.
pub trait RingTransport {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn send(&self, dest: usize, tag: Tag, data: &[u8]) -> Result<()>;

    /// Blocks until a message from `source` with `tag` arrives; its length must be `buf.len()`.
    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [u8]) -> Result<()>;

    fn barrier(&self) -> Result<()>;

    /// Tears down every worker of the run.
    fn abort(&self, code: i32);

    /// Replaces `value` on every worker by the one held by `root`.
    fn broadcast_u64(&self, root: usize, value: &mut u64) -> Result<()> {
        if self.rank() == root {
            for dest in (0..self.size()).filter(|&dest| dest != root) {
                self.send(dest, Tag::Metadata, &value.to_le_bytes())?;
            }
        } else {
            let mut bytes = [0u8; 8];
            self.receive_into(root, Tag::Metadata, &mut bytes)?;
            *value = u64::from_le_bytes(bytes);
        }
        Ok(())
    }

    /// Maximum of `value` over all workers, returned on `root` only.
    fn reduce_max_f64(&self, root: usize, value: f64) -> Result<Option<f64>> {
        if self.rank() != root {
            self.send(root, Tag::Timing, &value.to_le_bytes())?;
            return Ok(None);
        }
        let mut max = value;
        for source in (0..self.size()).filter(|&source| source != root) {
            let mut bytes = [0u8; 8];
            self.receive_into(source, Tag::Timing, &mut bytes)?;
            max = max.max(f64::from_le_bytes(bytes));
        }
        Ok(Some(max))
    }
}

pub(crate) fn length_mismatch(source: usize, tag: Tag, expected: usize, got: usize) -> Error {
    Error::Protocol(format!(
        "expected {} bytes from rank {} ({:?}), received {}",
        expected, source, tag, got
    ))
}
