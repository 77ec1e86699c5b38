use std::ptr::NonNull;

use crate::{
  block::{Block, HEADER_SIZE},
  free_list::{FreeList, Link},
  heap::Bounds,
};

/// How a free block is turned into an allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Split {
  /// The block is handed out as is. Any slack too small for a header of its
  /// own stays inside the allocation.
  Whole,
  /// The block is cut and the trailing `remainder` bytes stay free.
  Remainder(usize),
}

/// Decides how to serve `total` bytes (header included) out of a free block
/// of `block_size` bytes.
pub(crate) fn plan(
  block_size: usize,
  total: usize,
) -> Split {
  debug_assert!(block_size >= total, "carving {total} bytes out of a {block_size} byte block");

  match block_size - total {
    remainder if remainder > HEADER_SIZE => Split::Remainder(remainder),
    _ => Split::Whole,
  }
}

/// Takes `total` bytes from the front of `link.block` and returns the payload.
///
/// A split remainder takes over the exact list position of the block it came
/// from.
pub(crate) fn carve(
  free: &mut FreeList,
  link: Link,
  total: usize,
) -> NonNull<u8> {
  let block = link.block;

  match plan(block.size(), total) {
    Split::Whole => free.unlink(link),
    Split::Remainder(remainder) => {
      let rest = unsafe { Block::init(block.offset(total), remainder, None) };
      block.set_size(total);
      free.replace(link, rest);
    }
  }

  block.payload()
}

/// What happened to a released block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Merge {
  Alone,
  IntoLeft,
  AbsorbedRight,
  Both,
}

/// Returns `block` to the free list, fusing it with free neighbours on
/// either side. The surviving block always lands at the head.
pub(crate) fn merge(
  free: &mut FreeList,
  block: Block,
  bounds: Bounds,
) -> Merge {
  let leftmost = block.addr() == bounds.origin.as_ptr().addr();
  let rightmost = block.end() == bounds.top.as_ptr().addr();

  let right = if rightmost { None } else { free.find_starting_at(block.end()) };
  let left = if leftmost { None } else { free.find_ending_at(block.addr()) };

  match (left, right) {
    (Some(left), Some(right)) => {
      detach_pair(free, left, right);
      left.block.set_size(left.block.size() + block.size() + right.block.size());
      free.push_front(left.block);
      Merge::Both
    }
    (Some(left), None) => {
      free.unlink(left);
      left.block.set_size(left.block.size() + block.size());
      free.push_front(left.block);
      Merge::IntoLeft
    }
    (None, Some(right)) => {
      free.unlink(right);
      block.set_size(block.size() + right.block.size());
      free.push_front(block);
      Merge::AbsorbedRight
    }
    (None, None) => {
      free.push_front(block);
      Merge::Alone
    }
  }
}

/// Unlinks two blocks found in the same pass. When one is the other's
/// predecessor, the second unlink has to go through the first's predecessor.
fn detach_pair(
  free: &mut FreeList,
  first: Link,
  second: Link,
) {
  free.unlink(first);

  let prev = if second.prev == Some(first.block) { first.prev } else { second.prev };
  free.unlink(Link { prev, block: second.block });
}
