//! Binary format for cached map state.
//!
//! A cache directory holds two files:
//!
//! ```text
//! weights.bin   prototype weights, shape (size, D)
//! loss.bin      loss history, length maxiter
//! ```
//!
//! Each file is a bincode record of a magic number (4 bytes: "SOMC"), a
//! format version (u16), the [`CacheKey`] of the run that produced it and the
//! array itself. Weights are stored one node per row, i.e. transposed
//! relative to the in-memory `(D, size)` layout.

use super::CacheKey;
use crate::error::{Result, SomError};
use log::debug;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Magic number for cached map state files.
const MAGIC: &[u8; 4] = b"SOMC";

/// Current format version.
const VERSION: u16 = 2;

/// File name of the cached prototype weights.
pub const WEIGHTS_FILE: &str = "weights.bin";

/// File name of the cached loss history.
pub const LOSS_FILE: &str = "loss.bin";

#[derive(Serialize, Deserialize)]
struct ArrayRecord<A> {
    magic: [u8; 4],
    version: u16,
    key: CacheKey,
    array: A,
}

/// Cached results of one training run.
#[derive(Debug, Clone)]
pub struct CachedMap {
    /// Identity of the run.
    pub key: CacheKey,
    /// Prototype weights, shape `(size, D)`.
    pub weights: Array2<f64>,
    /// Loss history.
    pub loss: Array1<f64>,
}

/// A directory holding cached weights and loss history.
#[derive(Debug, Clone)]
pub struct MapStore {
    directory: PathBuf,
}

impl MapStore {
    /// Creates a store rooted at `directory`. Nothing is touched on disk.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// The cache directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the weights file.
    pub fn weights_path(&self) -> PathBuf {
        self.directory.join(WEIGHTS_FILE)
    }

    /// Path of the loss file.
    pub fn loss_path(&self) -> PathBuf {
        self.directory.join(LOSS_FILE)
    }

    /// Returns true if both cache files are present.
    pub fn exists(&self) -> bool {
        self.weights_path().is_file() && self.loss_path().is_file()
    }

    /// Writes `(size, D)` weights and the loss history of the run `key`,
    /// creating the directory if needed.
    pub fn save(
        &self,
        key: &CacheKey,
        weights: ArrayView2<'_, f64>,
        loss: ArrayView1<'_, f64>,
    ) -> Result<()> {
        fs::create_dir_all(&self.directory)?;
        write_record(&self.weights_path(), key, weights)?;
        write_record(&self.loss_path(), key, loss)?;
        debug!(
            "Wrote {}x{} weights and {} loss values to {}",
            weights.nrows(),
            weights.ncols(),
            loss.len(),
            self.directory.display()
        );
        Ok(())
    }

    /// Reads the cached weights and loss history.
    ///
    /// Returns `Ok(None)` when either file is missing, and an error when the
    /// files exist but cannot be decoded or come from different runs.
    pub fn load(&self) -> Result<Option<CachedMap>> {
        if !self.exists() {
            return Ok(None);
        }
        let (key, weights): (_, Array2<f64>) = read_record(&self.weights_path())?;
        let (loss_key, loss): (_, Array1<f64>) = read_record(&self.loss_path())?;
        if key != loss_key {
            return Err(SomError::Storage(format!(
                "Weights and loss in {} belong to different runs",
                self.directory.display()
            )));
        }
        Ok(Some(CachedMap { key, weights, loss }))
    }
}

fn write_record<A: Serialize>(path: &Path, key: &CacheKey, array: A) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let record = ArrayRecord {
        magic: *MAGIC,
        version: VERSION,
        key: key.clone(),
        array,
    };
    bincode::serialize_into(&mut writer, &record)?;
    writer.flush()?;
    Ok(())
}

fn read_record<A: DeserializeOwned>(path: &Path) -> Result<(CacheKey, A)> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let record: ArrayRecord<A> = bincode::deserialize_from(reader)?;

    if &record.magic != MAGIC {
        return Err(SomError::Storage(format!(
            "Invalid magic number in {}",
            path.display()
        )));
    }
    if record.version != VERSION {
        return Err(SomError::Storage(format!(
            "Unsupported format version {} in {}",
            record.version,
            path.display()
        )));
    }
    Ok((record.key, record.array))
}
