//! Where heap memory comes from.
//!
//! ```text
//!   extend(+n)                         extend(-n)
//!   ┌──────────────┬ ─ ─ ─ ─┐          ┌──────────────┬ ─ ─ ─ ─┐
//!   │   granted    │   +n   │          │   granted    │   -n   │
//!   └──────────────┴ ─ ─ ─ ─┘          └──────────────┴ ─ ─ ─ ─┘
//!                  ▲        ▲                         ▲        ▲
//!            returned     new break            new break   returned
//! ```

use std::{
  alloc::{self, Layout},
  io, mem,
  ptr::NonNull,
};

use crate::error::GrowthError;

/// A contiguous region that can be extended or shrunk at its high end, in
/// the manner of `sbrk(2)`.
///
/// # Safety
///
/// Implementors must guarantee that after a successful `extend(delta)` with
/// `delta > 0`, the `delta` bytes starting at the returned address are
/// writable and owned by the caller until they are given back with a negative
/// delta or the source is dropped.
pub unsafe trait GrowthSource {
  /// Moves the top of the region by `delta` bytes and returns the top as it
  /// was before the move. `extend(0)` only peeks.
  fn extend(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, GrowthError>;
}

/// The process's program break.
#[cfg(unix)]
#[derive(Debug)]
pub struct Sbrk {
  _private: (),
}

#[cfg(unix)]
impl Sbrk {
  /// # Safety
  ///
  /// The program break is process-wide. The caller must make sure nothing
  /// else shrinks it below memory handed out by the allocator, and that no
  /// other thread moves it while an allocator call is in progress.
  pub unsafe fn new() -> Self {
    Self { _private: () }
  }
}

#[cfg(unix)]
unsafe impl GrowthSource for Sbrk {
  fn extend(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, GrowthError> {
    let previous = unsafe { libc::sbrk(delta as libc::intptr_t) };

    if previous == usize::MAX as *mut libc::c_void {
      return Err(GrowthError::Refused {
        delta,
        source: io::Error::last_os_error(),
      });
    }

    NonNull::new(previous.cast::<u8>()).ok_or_else(|| GrowthError::Refused {
      delta,
      source: io::Error::other("sbrk reported a null break"),
    })
  }
}

/// A fixed-capacity region with its own simulated break.
///
/// Behaves like [`Sbrk`] without touching process state, which makes it the
/// source of choice for isolated heaps and tests.
pub struct Arena {
  base: NonNull<u8>,
  capacity: usize,
  brk: usize,
}

impl Arena {
  /// Reserves `capacity` zeroed bytes.
  ///
  /// # Panics
  ///
  /// Panics if `capacity` exceeds `isize::MAX`, and aborts through
  /// [`alloc::handle_alloc_error`] if the memory cannot be obtained.
  pub fn new(capacity: usize) -> Self {
    let layout = Self::layout(capacity);
    let base = unsafe { alloc::alloc_zeroed(layout) };

    match NonNull::new(base) {
      Some(base) => Self { base, capacity, brk: 0 },
      None => alloc::handle_alloc_error(layout),
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes currently below the simulated break.
  pub fn used(&self) -> usize {
    self.brk
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  fn layout(capacity: usize) -> Layout {
    match Layout::from_size_align(capacity.max(1), mem::align_of::<usize>()) {
      Ok(layout) => layout,
      Err(_) => panic!("arena capacity of {capacity} bytes is too large"),
    }
  }
}

unsafe impl GrowthSource for Arena {
  fn extend(
    &mut self,
    delta: isize,
  ) -> Result<NonNull<u8>, GrowthError> {
    let previous = self.brk;

    self.brk = previous
      .checked_add_signed(delta)
      .filter(|&brk| brk <= self.capacity)
      .ok_or(GrowthError::Exhausted {
        delta,
        capacity: self.capacity,
      })?;

    Ok(unsafe { self.base.add(previous) })
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), Self::layout(self.capacity)) }
  }
}
