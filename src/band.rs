//! Storage of one worker's row band plus its two halo rows.

use crate::rules::{is_alive, DEAD};

/// `local_rows` interior rows framed by a top and a bottom halo row, row-major.
///
/// Only the interior rows belong to the worker. The halo rows are copies of the
/// neighbors' boundary rows and are rewritten before every generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerBand {
    cols: usize,
    local_rows: usize,
    cells: Vec<u8>,
}

impl WorkerBand {
    /// An all-dead band.
    pub fn new(cols: usize, local_rows: usize) -> WorkerBand {
        WorkerBand {
            cols,
            local_rows,
            cells: vec![DEAD; (local_rows + 2) * cols],
        }
    }

    /// Wraps interior rows read from a file or generated; halos start dead.
    ///
    /// # Panics
    ///
    /// If `interior` is not a whole number of `cols`-wide rows.
    pub fn from_interior(cols: usize, interior: &[u8]) -> WorkerBand {
        assert!(
            cols > 0 && interior.len() % cols == 0,
            "interior of {} cells is not made of {}-cell rows",
            interior.len(),
            cols
        );
        let mut band = WorkerBand::new(cols, interior.len() / cols);
        band.interior_mut().copy_from_slice(interior);
        band
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn local_rows(&self) -> usize {
        self.local_rows
    }

    /// The whole buffer, halos included.
    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [u8] {
        &mut self.cells
    }

    pub fn interior(&self) -> &[u8] {
        &self.cells[self.cols..(self.local_rows + 1) * self.cols]
    }

    pub fn interior_mut(&mut self) -> &mut [u8] {
        let (start, end) = (self.cols, (self.local_rows + 1) * self.cols);
        &mut self.cells[start..end]
    }

    /// Row `row` of the buffer, where 0 is the top halo and `local_rows + 1` the bottom one.
    pub fn row(&self, row: usize) -> &[u8] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    fn row_mut(&mut self, row: usize) -> &mut [u8] {
        let cols = self.cols;
        &mut self.cells[row * cols..(row + 1) * cols]
    }

    pub fn first_row(&self) -> &[u8] {
        self.row(1)
    }

    pub fn last_row(&self) -> &[u8] {
        self.row(self.local_rows)
    }

    pub fn top_halo_mut(&mut self) -> &mut [u8] {
        self.row_mut(0)
    }

    pub fn bottom_halo_mut(&mut self) -> &mut [u8] {
        let row = self.local_rows + 1;
        self.row_mut(row)
    }

    /// Fills the halos from the band's own edges, for a worker holding the whole grid.
    pub fn wrap_halos_locally(&mut self) {
        let cols = self.cols;
        let last = self.local_rows;
        self.cells.copy_within(last * cols..(last + 1) * cols, 0);
        self.cells.copy_within(cols..2 * cols, (last + 1) * cols);
    }

    /// Swaps in a freshly computed buffer of the same shape.
    pub(crate) fn swap_cells(&mut self, next: &mut Vec<u8>) {
        debug_assert_eq!(self.cells.len(), next.len());
        std::mem::swap(&mut self.cells, next);
    }

    /// Live interior cells.
    pub fn population(&self) -> usize {
        self.interior().iter().filter(|&&cell| is_alive(cell)).count()
    }
}
