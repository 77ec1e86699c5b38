use std::ptr::NonNull;

use tracing::{debug, warn};

use crate::{
  block::Block,
  error::GrowthError,
  free_list::FreeList,
  source::GrowthSource,
};

/// Extent of the heap: `[origin, top)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Bounds {
  pub origin: NonNull<u8>,
  pub top: NonNull<u8>,
}

/// Grows the heap in fixed steps at its high end, within a budget.
pub(crate) struct Heap<S> {
  source: S,
  increment: usize,
  limit: usize,
  size: usize,
  bounds: Option<Bounds>,
}

impl<S: GrowthSource> Heap<S> {
  pub(crate) fn new(
    source: S,
    increment: usize,
    limit: usize,
  ) -> Self {
    Self {
      source,
      increment,
      limit,
      size: 0,
      bounds: None,
    }
  }

  /// Adds one increment to the heap.
  ///
  /// Returns `Ok(false)` when the step would exceed the limit. The new space
  /// is folded into the free block ending at the old top if there is one,
  /// otherwise it becomes a new free block at the head of `free`.
  pub(crate) fn grow(
    &mut self,
    free: &mut FreeList,
  ) -> Result<bool, GrowthError> {
    if self.size.checked_add(self.increment).is_none_or(|size| size > self.limit) {
      return Ok(false);
    }

    let delta = self.increment as isize;

    let expected = match self.bounds {
      Some(bounds) => bounds.top,
      None => self.source.extend(0)?,
    };

    let base = self.source.extend(delta)?;

    if base != expected {
      if let Err(err) = self.source.extend(-delta) {
        warn!("could not undo a non-contiguous growth step: {err}");
      }

      return Err(GrowthError::Discontiguous {
        expected: expected.as_ptr().addr(),
        found: base.as_ptr().addr(),
      });
    }

    let origin = self.bounds.map_or(base, |bounds| bounds.origin);
    let top = unsafe { base.add(self.increment) };

    self.size += self.increment;
    self.bounds = Some(Bounds { origin, top });

    // Only a block touching the old top can be adjacent to the new space.
    if let Some(link) = free.find_ending_at(base.as_ptr().addr()) {
      let block = link.block;
      block.set_size(block.size() + self.increment);

      debug!("heap grown to {} bytes, extended {:?}", self.size, block);
      return Ok(true);
    }

    let block = unsafe { Block::init(base, self.increment, None) };
    free.push_front(block);

    debug!("heap grown to {} bytes, new {:?}", self.size, block);
    Ok(true)
  }

  /// Gives every granted byte back to the source and applies new settings.
  ///
  /// Memory is only returned when the top of the source is still where this
  /// heap left it. Otherwise the region is abandoned rather than releasing
  /// bytes that belong to someone else. Returns the number of bytes released.
  pub(crate) fn reset(
    &mut self,
    increment: usize,
    limit: usize,
  ) -> usize {
    let mut released = 0;

    if let Some(bounds) = self.bounds.take() {
      match self.source.extend(0) {
        Ok(current) if current == bounds.top => match self.source.extend(-(self.size as isize)) {
          Ok(_) => released = self.size,
          Err(err) => warn!("could not return {} heap bytes: {err}", self.size),
        },
        Ok(current) => warn!(
          "break moved from {:p} to {:p}, abandoning {} heap bytes",
          bounds.top, current, self.size
        ),
        Err(err) => warn!("could not inspect the break: {err}"),
      }
    }

    self.size = 0;
    self.increment = increment;
    self.limit = limit;

    released
  }

  pub(crate) fn bounds(&self) -> Option<Bounds> {
    self.bounds
  }

  pub(crate) fn size(&self) -> usize {
    self.size
  }

  pub(crate) fn limit(&self) -> usize {
    self.limit
  }

  pub(crate) fn increment(&self) -> usize {
    self.increment
  }

  pub(crate) fn source(&self) -> &S {
    &self.source
  }

  /// Whether `addr` falls inside the granted region.
  pub(crate) fn contains(
    &self,
    addr: usize,
  ) -> bool {
    self
      .bounds
      .is_some_and(|bounds| (bounds.origin.as_ptr().addr()..bounds.top.as_ptr().addr()).contains(&addr))
  }
}
