//! In-memory dataset of fixed-length `f32` vectors with parallel labels.
//!
//! The dataset is loaded once before any timed run and then cycled through the
//! batcher on every run: vectors are moved out into batches, transformed in place
//! by exactly one worker, and moved back. Labels never move; they live in an
//! `Arc<[Label]>` shared read-only by every batch.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// One flattened sample, `height * width * channels` elements long.
pub type Vector = Vec<f32>;

/// Class label attached to a vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// Numeric class index (binary record formats).
    Class(u16),
    /// Class name (directory-per-class layouts).
    Name(Arc<str>),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Class(idx) => write!(f, "{}", idx),
            Label::Name(name) => f.write_str(name),
        }
    }
}

/// Image geometry every vector in a dataset shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl VectorShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Flat vector length.
    pub const fn len(&self) -> usize {
        self.height * self.width * self.channels
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A single row of `len` elements, for non-image data.
    pub const fn flat(len: usize) -> Self {
        Self::new(1, len, 1)
    }
}

impl fmt::Display for VectorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} x {}", self.height, self.width, self.channels)
    }
}

/// Ordered `(vector, label)` pairs.
#[derive(Debug, Clone)]
pub struct Dataset {
    vectors: Vec<Vector>,
    labels: Arc<[Label]>,
    shape: VectorShape,
}

impl Dataset {
    /// Builds a dataset, checking that labels line up with vectors and that every
    /// vector has exactly `shape.len()` elements.
    pub fn new(vectors: Vec<Vector>, labels: Vec<Label>, shape: VectorShape) -> Result<Self> {
        if vectors.len() != labels.len() {
            bail!(
                "Dataset has {} vectors but {} labels",
                vectors.len(),
                labels.len()
            );
        }
        if let Some((index, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != shape.len())
        {
            bail!(
                "Vector {} has {} elements, expected {} ({})",
                index,
                v.len(),
                shape.len(),
                shape
            );
        }

        Ok(Self {
            vectors,
            labels: labels.into(),
            shape,
        })
    }

    /// `n` vectors with every element set to `value`, labelled `Class(i % 10)`.
    pub fn filled(n: usize, shape: VectorShape, value: f32) -> Self {
        Self {
            vectors: (0..n).map(|_| vec![value; shape.len()]).collect(),
            labels: (0..n).map(|i| Label::Class((i % 10) as u16)).collect(),
            shape,
        }
    }

    /// `n` vectors of uniform `[0, 1)` samples drawn from a seeded RNG.
    pub fn synthetic(n: usize, shape: VectorShape, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let vectors = (0..n)
            .map(|_| (0..shape.len()).map(|_| rng.random::<f32>()).collect())
            .collect();
        let labels = (0..n)
            .map(|_| Label::Class(rng.random_range(0..10u16)))
            .collect();

        Self {
            vectors,
            labels,
            shape,
        }
    }

    pub(crate) fn from_parts(vectors: Vec<Vector>, labels: Arc<[Label]>, shape: VectorShape) -> Self {
        Self {
            vectors,
            labels,
            shape,
        }
    }

    pub(crate) fn into_parts(self) -> (Vec<Vector>, Arc<[Label]>, VectorShape) {
        (self.vectors, self.labels, self.shape)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn shape(&self) -> VectorShape {
        self.shape
    }

    pub fn vectors(&self) -> &[Vector] {
        &self.vectors
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Number of distinct labels.
    pub fn num_classes(&self) -> usize {
        self.labels.iter().collect::<HashSet<_>>().len()
    }

    /// Sum of every element, accumulated in `f64`.
    ///
    /// Used as a run checksum: after one doubling pass over the batched prefix,
    /// that prefix's sum is exactly twice what it was.
    pub fn checksum(&self) -> f64 {
        checksum(&self.vectors)
    }
}

/// Sum of every element of `vectors` in `f64`.
pub fn checksum(vectors: &[Vector]) -> f64 {
    vectors
        .iter()
        .flat_map(|v| v.iter())
        .map(|&x| x as f64)
        .sum()
}
