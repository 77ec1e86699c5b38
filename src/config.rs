use crate::{block::HEADER_SIZE, error::ConfigError, strategy::Strategy};

/// Bytes added to the heap per growth step: one page.
pub const DEFAULT_INCREMENT: usize = 4096;

/// Allocator settings. Applying a new configuration always resets the heap.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
  pub strategy: Strategy,
  /// Ceiling on cumulative growth since the last reset, in bytes.
  pub heap_limit: usize,
  /// Fixed size of every growth step.
  pub increment: usize,
}

impl Config {
  pub fn new(
    strategy: Strategy,
    heap_limit: usize,
  ) -> Self {
    Self {
      strategy,
      heap_limit,
      increment: DEFAULT_INCREMENT,
    }
  }

  pub fn with_increment(
    mut self,
    increment: usize,
  ) -> Self {
    self.increment = increment;
    self
  }

  /// A growth step must at least fit one header plus a payload byte, and
  /// must be expressible as a signed break delta.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.increment <= HEADER_SIZE {
      return Err(ConfigError::IncrementTooSmall {
        increment: self.increment,
        min: HEADER_SIZE,
      });
    }

    if isize::try_from(self.increment).is_err() {
      return Err(ConfigError::IncrementTooLarge { increment: self.increment });
    }

    Ok(())
  }
}

impl Default for Config {
  /// First fit with a zero limit: nothing can be allocated until configured.
  fn default() -> Self {
    Self::new(Strategy::FirstFit, 0)
  }
}
