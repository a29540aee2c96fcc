use anyhow::{Context, Result};

use crate::batcher::Batch;

/// A stateless elementwise operation applied in place to one vector.
///
/// Implementations are shared by every worker thread, so they must not hold
/// mutable state; each call only touches the vector it is given.
pub trait Transform: Send + Sync {
    fn apply(&self, vector: &mut [f32]) -> Result<()>;
}

/// Multiplies every element by a constant factor. No clamping is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub factor: f32,
}

impl Scale {
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    /// The harness workload: `x -> 2x`.
    pub fn doubling() -> Self {
        Self::new(2.0)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::doubling()
    }
}

impl Transform for Scale {
    #[inline]
    fn apply(&self, vector: &mut [f32]) -> Result<()> {
        for x in vector.iter_mut() {
            *x *= self.factor;
        }
        Ok(())
    }
}

/// Applies `transform` to every vector of `batch`.
pub fn apply_batch<T: Transform + ?Sized>(transform: &T, batch: &mut Batch) -> Result<()> {
    let offset = batch.offset();
    for (i, vector) in batch.vectors_mut().iter_mut().enumerate() {
        transform
            .apply(vector)
            .with_context(|| format!("Transform failed on vector {}", offset + i))?;
    }
    Ok(())
}
