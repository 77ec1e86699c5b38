use std::io;

use thiserror::Error;

/// Why an allocation could not be served.
#[derive(Debug, Error)]
pub enum AllocError {
  /// Payload plus header does not fit in an `isize`.
  #[error("invalid allocation size: {requested} bytes")]
  InvalidSize { requested: usize },

  /// Growing again would push the heap past its configured limit.
  #[error("out of memory: {requested} bytes requested, heap limit is {heap_limit} bytes")]
  OutOfMemory { requested: usize, heap_limit: usize },

  #[error(transparent)]
  Growth(#[from] GrowthError),
}

/// Failures reported by a [`GrowthSource`](crate::GrowthSource).
#[derive(Debug, Error)]
pub enum GrowthError {
  #[error("program break refused to move by {delta} bytes")]
  Refused {
    delta: isize,
    #[source]
    source: io::Error,
  },

  #[error("arena cannot move its break by {delta} bytes (capacity {capacity} bytes)")]
  Exhausted { delta: isize, capacity: usize },

  /// Someone else moved the break between two growth steps.
  #[error("heap is no longer contiguous: expected top at {expected:#x}, found {found:#x}")]
  Discontiguous { expected: usize, found: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
  #[error("growth increment of {increment} bytes must exceed {min} bytes")]
  IncrementTooSmall { increment: usize, min: usize },

  #[error("growth increment of {increment} bytes does not fit in an isize")]
  IncrementTooLarge { increment: usize },

  #[error("unknown placement strategy `{0}` (expected first-fit, best-fit or worst-fit)")]
  UnknownStrategy(String),
}
