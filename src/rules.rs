//! The B3/S23 cell rule and toroidal neighbor counting.

/// Smallest grid side on which the eight neighbors of a cell are distinct cells.
pub const MIN_GRID_SIDE: usize = 3;

/// Byte stored for a live cell.
pub const ALIVE: u8 = 0x00;
/// Byte stored for a dead cell.
pub const DEAD: u8 = 0xFF;

#[inline]
pub fn is_alive(cell: u8) -> bool {
    cell == ALIVE
}

/// State of a cell in the next generation.
#[inline]
pub fn next_cell(former_cell: u8, neighbors: u32) -> u8 {
    match neighbors {
        3 => ALIVE,
        2 => former_cell,
        _ => DEAD,
    }
}

/// Live neighbors of the cell at (`row`, `col`) of a row-major buffer `cols` wide.
///
/// `row` must have a row above and below it in `cells` (a halo row at the band
/// edges). Columns wrap around: column -1 is `cols - 1`, column `cols` is 0.
#[inline]
pub fn live_neighbors(cells: &[u8], cols: usize, row: usize, col: usize) -> u32 {
    let left = if col == 0 { cols - 1 } else { col - 1 };
    let right = if col + 1 == cols { 0 } else { col + 1 };

    let above = (row - 1) * cols;
    let middle = row * cols;
    let below = (row + 1) * cols;

    let mut neighbors = 0;
    for index in [
        above + left,
        above + col,
        above + right,
        middle + left,
        middle + right,
        below + left,
        below + col,
        below + right,
    ] {
        neighbors += u32::from(is_alive(cells[index]));
    }
    neighbors
}
