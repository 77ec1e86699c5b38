use crate::block::{Block, HEADER_SIZE};

/// A free block together with the node that precedes it in the list.
///
/// Carrying the predecessor around is what makes detaching O(1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Link {
  pub prev: Option<Block>,
  pub block: Block,
}

/// Unordered, singly linked list of free blocks threaded through their
/// headers. New blocks always go to the front.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
  head: Option<Block>,
}

impl FreeList {
  pub(crate) fn new() -> Self {
    Self { head: None }
  }

  #[cfg(test)]
  pub(crate) fn head(&self) -> Option<Block> {
    self.head
  }

  /// Forgets every node. The headers themselves are left untouched.
  pub(crate) fn clear(&mut self) {
    self.head = None;
  }

  pub(crate) fn push_front(
    &mut self,
    block: Block,
  ) {
    block.set_next(self.head);
    self.head = Some(block);
  }

  /// Detaches `link.block`, which must currently follow `link.prev`.
  pub(crate) fn unlink(
    &mut self,
    link: Link,
  ) {
    let Link { prev, block } = link;

    match prev {
      None => {
        debug_assert_eq!(self.head, Some(block), "unlinking a block without predecessor that is not the head");
        self.head = block.next();
      }
      Some(prev) => prev.set_next(block.next()),
    }

    block.set_next(None);
  }

  /// Puts `block` at the exact position `link.block` occupied.
  pub(crate) fn replace(
    &mut self,
    link: Link,
    block: Block,
  ) {
    block.set_next(link.block.next());

    match link.prev {
      None => self.head = Some(block),
      Some(prev) => prev.set_next(Some(block)),
    }

    link.block.set_next(None);
  }

  pub(crate) fn iter(&self) -> Iter {
    Iter {
      prev: None,
      current: self.head,
    }
  }

  /// The free block whose header sits at `addr`.
  pub(crate) fn find_starting_at(
    &self,
    addr: usize,
  ) -> Option<Link> {
    self.iter().find(|link| link.block.addr() == addr)
  }

  /// The free block whose last byte sits right before `addr`.
  pub(crate) fn find_ending_at(
    &self,
    addr: usize,
  ) -> Option<Link> {
    self.iter().find(|link| link.block.end() == addr)
  }

  pub(crate) fn len(&self) -> usize {
    self.iter().count()
  }

  /// Sum of the payload bytes of every free block.
  pub(crate) fn free_bytes(&self) -> usize {
    self.iter().map(|link| link.block.size() - HEADER_SIZE).sum()
  }

  pub(crate) fn contains(
    &self,
    block: Block,
  ) -> bool {
    self.iter().any(|link| link.block == block)
  }
}

pub(crate) struct Iter {
  prev: Option<Block>,
  current: Option<Block>,
}

impl Iterator for Iter {
  type Item = Link;

  fn next(&mut self) -> Option<Link> {
    let block = self.current?;
    let link = Link { prev: self.prev, block };

    self.prev = Some(block);
    self.current = block.next();

    Some(link)
  }
}
