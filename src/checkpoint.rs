//! Shared grid files: every worker reads and writes its own byte range.
//!
//! A grid file is a binary PGM image: the ASCII header `P5 <cols> <rows> 255\n`
//! followed by `rows * cols` cell bytes, row-major. The header length depends on
//! the digit counts, so it is always measured and never assumed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::band::WorkerBand;
use crate::error::{Error, Result};
use crate::partition::Partition;
use crate::rules::MIN_GRID_SIDE;
use crate::transport::RingTransport;

const MAGIC: &str = "P5";
const MAX_VALUE: u32 = 255;
// "P5 " + two 20-digit sizes + " 255\n" with room to spare
const MAX_HEADER_LEN: u64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridHeader {
    pub cols: usize,
    pub rows: usize,
}

impl GridHeader {
    pub fn square(side: usize) -> GridHeader {
        GridHeader {
            cols: side,
            rows: side,
        }
    }

    pub fn encode(&self) -> String {
        format!("{} {} {} {}\n", MAGIC, self.cols, self.rows, MAX_VALUE)
    }

    /// Parses the header line and returns it with its length in bytes, newline included.
    pub fn read_from<R: BufRead>(reader: &mut R, path: &Path) -> Result<(GridHeader, u64)> {
        let mut line = Vec::new();
        reader
            .take(MAX_HEADER_LEN)
            .read_until(b'\n', &mut line)
            .map_err(|err| Error::io(path, err))?;
        if line.last() != Some(&b'\n') {
            return Err(Error::format(path, "header is not terminated by a newline"));
        }
        let text =
            std::str::from_utf8(&line).map_err(|_| Error::format(path, "header is not ASCII"))?;

        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() != 4 || tokens[0] != MAGIC {
            return Err(Error::format(
                path,
                format!(
                    "expected `{} <cols> <rows> {}`, found {:?}",
                    MAGIC,
                    MAX_VALUE,
                    text.trim_end()
                ),
            ));
        }
        let number = |token: &str, what: &str| {
            token
                .parse::<usize>()
                .map_err(|_| Error::format(path, format!("{} `{}` is not a number", what, token)))
        };
        let header = GridHeader {
            cols: number(tokens[1], "width")?,
            rows: number(tokens[2], "height")?,
        };
        if number(tokens[3], "maximum value")? != MAX_VALUE as usize {
            return Err(Error::format(
                path,
                format!("maximum value must be {}, found {}", MAX_VALUE, tokens[3]),
            ));
        }
        if header.cols != header.rows {
            return Err(Error::format(
                path,
                format!(
                    "grid is {} by {}, only square grids are supported",
                    header.cols, header.rows
                ),
            ));
        }
        Ok((header, line.len() as u64))
    }
}

/// Name of the snapshot taken after `step` generations.
pub fn snapshot_name(step: u64) -> String {
    format!("snapshot_{:05}", step)
}

/// Writes one worker's interior rows into the shared grid file at `path`.
///
/// Rank 0 creates the file and writes the header. After a barrier every worker
/// measures the header on disk, and after a second one writes its rows at its
/// own offset, so nobody writes body bytes before every offset is known.
pub fn write_shared<T>(
    transport: &T,
    path: &Path,
    side: usize,
    partition: &Partition,
    interior: &[u8],
) -> Result<()>
where
    T: RingTransport + ?Sized,
{
    debug_assert_eq!(interior.len(), partition.cells(side));

    if transport.rank() == 0 {
        let mut file = File::create(path).map_err(|err| Error::io(path, err))?;
        file.write_all(GridHeader::square(side).encode().as_bytes())
            .map_err(|err| Error::io(path, err))?;
    }
    transport.barrier()?;
    let header_len = fs::metadata(path).map_err(|err| Error::io(path, err))?.len();
    transport.barrier()?;

    let offset = partition.byte_offset(header_len, side);
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|err| Error::io(path, err))?;
    file.seek(SeekFrom::Start(offset)).map_err(|err| Error::io(path, err))?;
    file.write_all(interior).map_err(|err| Error::io(path, err))?;
    debug!(offset, bytes = interior.len(), path = %path.display(), "band written");
    Ok(())
}

/// One worker's share of a grid file.
#[derive(Debug)]
pub struct LoadedBand {
    pub side: usize,
    pub partition: Partition,
    pub band: WorkerBand,
}

/// Reads one worker's interior rows from the shared grid file at `path`.
///
/// Rank 0 parses the header, checks that the file holds the whole body it announces,
/// and broadcasts the grid side and the header length. The halo rows stay untouched
/// until the first exchange.
pub fn read_shared<T>(transport: &T, path: &Path) -> Result<LoadedBand>
where
    T: RingTransport + ?Sized,
{
    let mut side = 0u64;
    let mut header_len = 0u64;
    if transport.rank() == 0 {
        let file = File::open(path).map_err(|err| Error::io(path, err))?;
        let file_len = file.metadata().map_err(|err| Error::io(path, err))?.len();
        let (header, len) = GridHeader::read_from(&mut BufReader::new(file), path)?;
        check_body_len(path, header, len, file_len)?;
        side = header.cols as u64;
        header_len = len;
    }
    transport.broadcast_u64(0, &mut side)?;
    transport.broadcast_u64(0, &mut header_len)?;
    if header_len == 0 {
        return Err(Error::Protocol("rank 0 broadcast an empty grid header".to_string()));
    }

    let side = side as usize;
    if side < MIN_GRID_SIDE {
        return Err(Error::Config(format!(
            "grid side {} is below the minimum of {}",
            side, MIN_GRID_SIDE
        )));
    }
    let partition = Partition::compute(side, transport.size(), transport.rank())?;
    debug!(side, header_len, rows = partition.local_rows, "reading band");

    let mut band = WorkerBand::new(side, partition.local_rows);
    let mut file = File::open(path).map_err(|err| Error::io(path, err))?;
    file.seek(SeekFrom::Start(partition.byte_offset(header_len, side)))
        .map_err(|err| Error::io(path, err))?;
    file.read_exact(band.interior_mut()).map_err(|err| Error::io(path, err))?;

    Ok(LoadedBand {
        side,
        partition,
        band,
    })
}

// Nothing is allocated from header values a truncated or corrupt file can't back.
fn check_body_len(path: &Path, header: GridHeader, header_len: u64, file_len: u64) -> Result<()> {
    let needed = (header.cols as u64)
        .checked_mul(header.rows as u64)
        .and_then(|body| body.checked_add(header_len))
        .ok_or_else(|| {
            Error::format(
                path,
                format!("a {}x{} grid is too large", header.cols, header.rows),
            )
        })?;
    if needed > file_len {
        let short = io::Error::new(
            ErrorKind::UnexpectedEof,
            format!("header announces {} bytes, file holds {}", needed, file_len),
        );
        return Err(Error::io(path, short));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &[u8]) -> Result<(GridHeader, u64)> {
        GridHeader::read_from(&mut Cursor::new(text), Path::new("grid.pgm"))
    }

    #[test]
    fn header_length_is_measured() {
        let (header, len) = parse(b"P5 9 9 255\n\xff\x00").unwrap();
        assert_eq!(header, GridHeader::square(9));
        assert_eq!(len, 11);

        let (header, len) = parse(b"P5 10000 10000 255\n").unwrap();
        assert_eq!(header.cols, 10000);
        assert_eq!(len, 19);
        assert_eq!(GridHeader::square(10000).encode().len() as u64, len);
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for text in [
            &b"P6 9 9 255\n"[..],
            b"P5 9 8 255\n",
            b"P5 9 9 15\n",
            b"P5 nine 9 255\n",
            b"P5 9 9\n",
            b"P5 9 9 255",
        ] {
            assert!(
                matches!(parse(text), Err(Error::Format { .. })),
                "{:?}",
                String::from_utf8_lossy(text)
            );
        }
    }

    #[test]
    fn snapshot_names_are_zero_padded() {
        assert_eq!(snapshot_name(42), "snapshot_00042");
        assert_eq!(snapshot_name(0), "snapshot_00000");
        assert_eq!(snapshot_name(123456), "snapshot_123456");
    }
}
