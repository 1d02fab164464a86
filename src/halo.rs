//! Halo exchange between ring neighbors.
//!
//! Each worker sends its first interior row to `prev` and its last one to `next`,
//! and receives `prev`'s last row into its top halo and `next`'s first row into
//! its bottom halo.
//!
//! A send may not return before its receive is posted, so the exchange runs as two
//! ring shifts, first rows upward then last rows downward. In each shift rank 0
//! drains before it fills and every other rank fills before it drains: the sends
//! unwind from rank 0 around the ring and no wait closes a cycle.

use tracing::trace;

use crate::band::WorkerBand;
use crate::error::Result;
use crate::partition::RingLinks;
use crate::transport::{RingTransport, Tag};

/// Refreshes both halo rows of `band` from its ring neighbors' current boundary rows.
pub fn exchange<T>(band: &mut WorkerBand, links: &RingLinks, transport: &T) -> Result<()>
where
    T: RingTransport + ?Sized,
{
    if links.is_solo() {
        band.wrap_halos_locally();
        return Ok(());
    }

    if links.rank == 0 {
        receive_bottom_halo(band, links, transport)?;
        send_first_row(band, links, transport)?;
        receive_top_halo(band, links, transport)?;
        send_last_row(band, links, transport)?;
    } else {
        send_first_row(band, links, transport)?;
        receive_bottom_halo(band, links, transport)?;
        send_last_row(band, links, transport)?;
        receive_top_halo(band, links, transport)?;
    }
    Ok(())
}

pub fn send_first_row<T>(band: &WorkerBand, links: &RingLinks, transport: &T) -> Result<()>
where
    T: RingTransport + ?Sized,
{
    trace!(to = links.prev, "sending first row");
    transport.send(links.prev, Tag::FirstRow, band.first_row())
}

pub fn send_last_row<T>(band: &WorkerBand, links: &RingLinks, transport: &T) -> Result<()>
where
    T: RingTransport + ?Sized,
{
    trace!(to = links.next, "sending last row");
    transport.send(links.next, Tag::LastRow, band.last_row())
}

pub fn receive_top_halo<T>(band: &mut WorkerBand, links: &RingLinks, transport: &T) -> Result<()>
where
    T: RingTransport + ?Sized,
{
    trace!(from = links.prev, "waiting for top halo");
    transport.receive_into(links.prev, Tag::LastRow, band.top_halo_mut())
}

pub fn receive_bottom_halo<T>(
    band: &mut WorkerBand,
    links: &RingLinks,
    transport: &T,
) -> Result<()>
where
    T: RingTransport + ?Sized,
{
    trace!(from = links.next, "waiting for bottom halo");
    transport.receive_into(links.next, Tag::FirstRow, band.bottom_halo_mut())
}
