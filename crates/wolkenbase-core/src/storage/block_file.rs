//! Flat block files.
//!
//! Block `n` lives in file `n % F` at offset `(n / F) * block_size`. A block
//! is `records` serialized points, empty records in the unused slots, and
//! zero padding up to the block size.

use crate::constants::POINT_RECORD_SIZE;
use crate::types::{LasPoint, Result, StoreError};
use dashmap::DashSet;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// The set of files backing a store
#[derive(Debug)]
pub struct BlockFiles {
    dir: PathBuf,
    files: Vec<Mutex<File>>,
    block_size: usize,
    written: DashSet<u64>,
}

impl BlockFiles {
    /// Create (or truncate) `blocks-<i>.dat` for `i` in `0..fan_out` under `dir`
    pub fn open(dir: &Path, fan_out: usize, block_size: usize) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let files = (0..fan_out.max(1))
            .map(|i| {
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(dir.join(format!("blocks-{i}.dat")))
                    .map(Mutex::new)
            })
            .collect::<std::io::Result<Vec<_>>>()?;
        Ok(Self { dir: dir.to_path_buf(), files, block_size, written: DashSet::new() })
    }

    /// Directory holding the files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of files
    pub fn fan_out(&self) -> usize {
        self.files.len()
    }

    /// Bytes per block
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// File index and byte offset of block `n`
    pub fn location(&self, n: u64) -> (usize, u64) {
        let f = self.files.len() as u64;
        ((n % f) as usize, (n / f) * self.block_size as u64)
    }

    /// True once block `n` has been written
    pub fn is_written(&self, n: u64) -> bool {
        self.written.contains(&n)
    }

    /// Write one block image
    pub fn write_block(&self, n: u64, bytes: &[u8]) -> Result<()> {
        let (file, offset) = self.location(n);
        let io = |source| StoreError::BlockIo { block: n, source };
        {
            let mut f = self.files[file].lock();
            f.seek(SeekFrom::Start(offset)).map_err(io)?;
            f.write_all(bytes).map_err(io)?;
        }
        self.written.insert(n);
        Ok(())
    }

    /// Read one block image, `None` if the block was never written
    pub fn read_block(&self, n: u64) -> Result<Option<Vec<u8>>> {
        if !self.is_written(n) {
            return Ok(None);
        }
        let (file, offset) = self.location(n);
        let io = |source| StoreError::BlockIo { block: n, source };
        let mut buf = vec![0u8; self.block_size];
        let mut f = self.files[file].lock();
        f.seek(SeekFrom::Start(offset)).map_err(io)?;
        f.read_exact(&mut buf).map_err(io)?;
        Ok(Some(buf))
    }
}

fn check_fit(records: usize, block_size: usize) -> Result<()> {
    if records * POINT_RECORD_SIZE > block_size {
        return Err(StoreError::RecordTooLarge {
            records,
            record_size: POINT_RECORD_SIZE,
            block_size,
        }
        .into());
    }
    Ok(())
}

/// Serialize up to `records` points into a block image of `block_size` bytes
pub fn encode_block(points: &[LasPoint], records: usize, block_size: usize) -> Result<Vec<u8>> {
    check_fit(records, block_size)?;
    let mut buf = Vec::with_capacity(block_size);
    let empty = LasPoint::empty();
    for i in 0..records {
        let p = points.get(i).unwrap_or(&empty);
        bincode::serialize_into(&mut buf, p).map_err(StoreError::Codec)?;
    }
    buf.resize(block_size, 0);
    Ok(buf)
}

/// Parse a block image back into its non-empty points
pub fn decode_block(bytes: &[u8], records: usize) -> Result<Vec<LasPoint>> {
    check_fit(records, bytes.len())?;
    let mut points = Vec::with_capacity(records);
    for chunk in bytes.chunks_exact(POINT_RECORD_SIZE).take(records) {
        let p: LasPoint = bincode::deserialize(chunk).map_err(StoreError::Codec)?;
        if !p.is_empty() {
            points.push(p);
        }
    }
    Ok(points)
}
