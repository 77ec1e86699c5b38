use std::{
  fmt,
  mem::{self, offset_of},
  ptr::{self, NonNull},
};

/// Metadata prepended to every block, free or allocated.
///
/// `size` counts the header itself, so a block's payload is
/// `size - HEADER_SIZE` bytes. `next` links free blocks together and is stale
/// while the block is handed out.
#[repr(C)]
pub struct Header {
  pub size: usize,
  pub next: *mut Header,
}

/// Bytes reserved in front of every payload.
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

/// Handle to a block header living inside the managed heap.
///
/// Headers sit wherever the previous block ended, so they are generally not
/// word aligned. Every access goes through unaligned reads and writes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct Block(NonNull<u8>);

impl Block {
  /// # Safety
  ///
  /// `addr` must point to `HEADER_SIZE` writable bytes inside the heap that
  /// stay owned by the allocator for as long as the handle is used.
  pub(crate) unsafe fn at(addr: NonNull<u8>) -> Self {
    Self(addr)
  }

  /// Writes a fresh header at `addr`.
  ///
  /// # Safety
  ///
  /// Same contract as [`Block::at`], and `size` bytes starting at `addr` must
  /// belong to the heap.
  pub(crate) unsafe fn init(
    addr: NonNull<u8>,
    size: usize,
    next: Option<Block>,
  ) -> Self {
    let block = Self(addr);
    block.set_size(size);
    block.set_next(next);
    block
  }

  /// Recovers the header from a pointer previously returned by
  /// [`Block::payload`].
  ///
  /// # Safety
  ///
  /// `payload` must have been produced by this allocator and the block must
  /// not have been invalidated by a reset.
  pub(crate) unsafe fn from_payload(payload: NonNull<u8>) -> Self {
    Self(unsafe { payload.sub(HEADER_SIZE) })
  }

  pub(crate) fn addr(self) -> usize {
    self.0.as_ptr().addr()
  }

  /// First address past the block.
  pub(crate) fn end(self) -> usize {
    self.addr() + self.size()
  }

  pub(crate) fn payload(self) -> NonNull<u8> {
    unsafe { self.0.add(HEADER_SIZE) }
  }

  /// Pointer `bytes` into the block, used to place a split remainder.
  ///
  /// # Safety
  ///
  /// `bytes` must not exceed the block's size.
  pub(crate) unsafe fn offset(
    self,
    bytes: usize,
  ) -> NonNull<u8> {
    unsafe { self.0.add(bytes) }
  }

  pub(crate) fn size(self) -> usize {
    unsafe { self.field::<usize>(offset_of!(Header, size)).read_unaligned() }
  }

  pub(crate) fn set_size(
    self,
    size: usize,
  ) {
    debug_assert!(size >= HEADER_SIZE, "block of {size} bytes cannot hold a header");
    unsafe { self.field::<usize>(offset_of!(Header, size)).write_unaligned(size) }
  }

  pub(crate) fn next(self) -> Option<Block> {
    let next = unsafe { self.field::<*mut Header>(offset_of!(Header, next)).read_unaligned() };
    NonNull::new(next.cast::<u8>()).map(Block)
  }

  pub(crate) fn set_next(
    self,
    next: Option<Block>,
  ) {
    let next = next.map_or(ptr::null_mut(), |block| block.0.as_ptr().cast::<Header>());
    unsafe { self.field::<*mut Header>(offset_of!(Header, next)).write_unaligned(next) }
  }

  unsafe fn field<T>(
    self,
    offset: usize,
  ) -> *mut T {
    unsafe { self.0.as_ptr().add(offset).cast::<T>() }
  }
}

impl fmt::Debug for Block {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "Block({:#x}, {} bytes)", self.addr(), self.size())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_arithmetic() {
    let mut buffer = [0u8; 4 * HEADER_SIZE];
    let base = NonNull::new(buffer.as_mut_ptr()).unwrap();

    unsafe {
      let block = Block::init(base, 3 * HEADER_SIZE, None);

      assert_eq!(block.size(), 3 * HEADER_SIZE);
      assert_eq!(block.end(), block.addr() + 3 * HEADER_SIZE);
      assert_eq!(block.payload().as_ptr().addr(), block.addr() + HEADER_SIZE);
      assert_eq!(Block::from_payload(block.payload()), block);
      assert!(block.next().is_none());
    }
  }

  #[test]
  fn test_unaligned_headers() {
    let mut buffer = [0u8; 4 * HEADER_SIZE];
    let base = NonNull::new(buffer.as_mut_ptr()).unwrap();

    unsafe {
      let first = Block::init(base.add(1), HEADER_SIZE + 3, None);
      let second = Block::init(first.offset(first.size()), HEADER_SIZE + 5, Some(first));

      assert_eq!(second.addr(), first.end());
      assert_eq!(second.next(), Some(first));
      assert_eq!(first.size(), HEADER_SIZE + 3);

      second.set_next(None);
      assert!(second.next().is_none());
      assert_eq!(second.size(), HEADER_SIZE + 5);
    }
  }
}
