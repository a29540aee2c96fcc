//! CIFAR-10 binary batch files.
//!
//! Each file holds fixed-size records of one label byte followed by
//! `32 * 32 * 3` pixel bytes (channel-planar). Pixels are normalized to
//! `[0, 1]` by dividing by 255.

use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::dataset::{Dataset, Label, Vector, VectorShape};
use crate::error::HarnessError;

pub const CIFAR10_SHAPE: VectorShape = VectorShape::new(32, 32, 3);
pub const RECORDS_PER_FILE: usize = 10_000;
pub const NUM_TRAIN_FILES: usize = 5;

const RECORD_LEN: usize = 1 + CIFAR10_SHAPE.len();

/// Loads `data_batch_1.bin` .. `data_batch_5.bin` from `dir`.
pub fn load_cifar10(dir: impl AsRef<Path>) -> Result<Dataset> {
    let dir = dir.as_ref();
    let mut vectors = Vec::with_capacity(NUM_TRAIN_FILES * RECORDS_PER_FILE);
    let mut labels = Vec::with_capacity(NUM_TRAIN_FILES * RECORDS_PER_FILE);

    for i in 1..=NUM_TRAIN_FILES {
        let path = dir.join(format!("data_batch_{}.bin", i));
        info!(path = %path.display(), "Loading CIFAR-10 batch file");
        let (v, l) = read_records(&path, RECORDS_PER_FILE)?;
        vectors.extend(v);
        labels.extend(l);
    }

    Dataset::new(vectors, labels, CIFAR10_SHAPE)
}

/// Loads the first `records` records of a single batch file.
pub fn load_cifar10_file(path: impl AsRef<Path>, records: usize) -> Result<Dataset> {
    let (vectors, labels) = read_records(path.as_ref(), records)?;
    Dataset::new(vectors, labels, CIFAR10_SHAPE)
}

fn read_records(path: &Path, records: usize) -> Result<(Vec<Vector>, Vec<Label>)> {
    let data = fs::read(path).map_err(|e| HarnessError::load(path, e.to_string()))?;

    let expected = records * RECORD_LEN;
    if data.len() < expected {
        return Err(HarnessError::load(
            path,
            format!(
                "file is smaller than expected. Size: {} bytes, Expected: {} bytes",
                data.len(),
                expected
            ),
        )
        .into());
    }

    let (vectors, labels): (Vec<Vector>, Vec<Label>) = data
        .chunks_exact(RECORD_LEN)
        .take(records)
        .map(|record| {
            let pixels: Vector = record[1..].iter().map(|&b| b as f32 / 255.0).collect();
            (pixels, Label::Class(record[0] as u16))
        })
        .unzip();

    Ok((vectors, labels))
}
