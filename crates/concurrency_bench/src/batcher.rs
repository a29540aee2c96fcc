//! Partitioning of a dataset into fixed-size contiguous batches.
//!
//! `Batcher::split` moves vectors out of the dataset into `Batch`es so that each
//! batch exclusively owns its vectors while a worker transforms them. Trailing
//! vectors that do not fill a whole batch stay in the `Partition` remainder and
//! are never handed to a worker. `Partition::reassemble` puts everything back in
//! the original order once the scheduler returns the batches.

use anyhow::{anyhow, bail, Result};
use std::ops::Range;
use std::sync::Arc;

use crate::dataset::{Dataset, Label, Vector, VectorShape};
use crate::error::HarnessError;

/// A contiguous slice of the dataset processed as a unit.
#[derive(Debug)]
pub struct Batch {
    index: usize,
    offset: usize,
    vectors: Vec<Vector>,
    labels: Arc<[Label]>,
}

impl Batch {
    /// Position of this batch in dispatch order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Index of the first vector in the source dataset.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    pub fn vectors_mut(&mut self) -> &mut [Vector] {
        &mut self.vectors
    }

    /// Labels parallel to `vectors()`.
    pub fn labels(&self) -> &[Label] {
        &self.labels[self.offset..self.offset + self.vectors.len()]
    }
}

/// Splits datasets into batches of `batch_size`.
#[derive(Debug, Clone, Copy)]
pub struct Batcher {
    batch_size: usize,
}

impl Batcher {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(HarnessError::InvalidConfig("batch_size must be > 0".into()).into());
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Index ranges of the batches for a dataset of `n` vectors.
    ///
    /// Always `n / batch_size` ranges of exactly `batch_size`, in order; the last
    /// `n % batch_size` indices are not covered.
    pub fn plan(&self, n: usize) -> Vec<Range<usize>> {
        (0..n / self.batch_size)
            .map(|i| i * self.batch_size..(i + 1) * self.batch_size)
            .collect()
    }

    /// Moves the dataset's vectors into batches following `plan`.
    pub fn split(&self, dataset: Dataset) -> Partition {
        let total = dataset.len();
        let (mut vectors, labels, shape) = dataset.into_parts();
        let ranges = self.plan(total);

        let covered = ranges.last().map_or(0, |r| r.end);
        let remainder = vectors.split_off(covered);

        let mut source = vectors.into_iter();
        let batches = ranges
            .into_iter()
            .enumerate()
            .map(|(index, range)| Batch {
                index,
                offset: range.start,
                vectors: source.by_ref().take(range.len()).collect(),
                labels: Arc::clone(&labels),
            })
            .collect();

        Partition {
            batches,
            remainder,
            labels,
            shape,
            total,
        }
    }
}

/// Result of splitting a dataset: the batches plus everything needed to
/// rebuild the dataset afterwards.
#[derive(Debug)]
pub struct Partition {
    batches: Vec<Batch>,
    remainder: Vec<Vector>,
    labels: Arc<[Label]>,
    shape: VectorShape,
    total: usize,
}

impl Partition {
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    /// Vectors left out of every batch.
    pub fn remainder(&self) -> &[Vector] {
        &self.remainder
    }

    /// Hands the batches to a scheduler, keeping the rest for `reassemble`.
    pub fn take_batches(&mut self) -> Vec<Batch> {
        std::mem::take(&mut self.batches)
    }

    /// Rebuilds the dataset from processed batches, in original order.
    ///
    /// Batches may come back in any completion order. Fails if any batch is
    /// missing, duplicated or resized.
    pub fn reassemble(self, mut processed: Vec<Batch>) -> Result<Dataset> {
        processed.extend(self.batches);
        processed.sort_by_key(Batch::index);

        let mut vectors = Vec::with_capacity(self.total);
        for (expected, batch) in processed.into_iter().enumerate() {
            if batch.index != expected || batch.offset != vectors.len() {
                bail!(
                    "Batch {} returned out of place (expected batch {} at offset {})",
                    batch.index,
                    expected,
                    vectors.len()
                );
            }
            vectors.extend(batch.vectors);
        }
        vectors.extend(self.remainder);

        if vectors.len() != self.total {
            return Err(anyhow!(
                "Reassembled {} vectors, dataset had {}",
                vectors.len(),
                self.total
            ));
        }

        Ok(Dataset::from_parts(vectors, self.labels, self.shape))
    }
}
