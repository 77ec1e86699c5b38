use std::ptr::NonNull;

use tracing::{info, trace, warn};

use crate::{
  block::{Block, HEADER_SIZE},
  config::Config,
  error::{AllocError, ConfigError},
  free_list::FreeList,
  heap::Heap,
  source::GrowthSource,
  split,
  strategy::Strategy,
};

/// Snapshot of the allocator's bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
  /// Payload bytes available across all free blocks.
  pub free_bytes: usize,
  pub free_blocks: usize,
  /// Bytes granted by the growth source since the last reset.
  pub heap_size: usize,
  pub heap_limit: usize,
}

/// One block found while walking the heap in address order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  pub addr: usize,
  /// Total size, header included.
  pub size: usize,
  pub free: bool,
}

/// Free-list allocator over a single heap that grows in fixed increments.
///
/// Not thread safe: every operation takes `&mut self`.
pub struct Allocator<S: GrowthSource> {
  heap: Heap<S>,
  free: FreeList,
  strategy: Strategy,
  first_use: bool,
}

impl<S: GrowthSource> Allocator<S> {
  /// Starts with [`Config::default`], whose zero limit refuses every
  /// allocation until [`Allocator::configure`] is called.
  pub fn new(source: S) -> Self {
    let config = Config::default();

    Self {
      heap: Heap::new(source, config.increment, config.heap_limit),
      free: FreeList::new(),
      strategy: config.strategy,
      first_use: true,
    }
  }

  pub fn with_config(
    source: S,
    config: Config,
  ) -> Result<Self, ConfigError> {
    config.validate()?;

    Ok(Self {
      heap: Heap::new(source, config.increment, config.heap_limit),
      free: FreeList::new(),
      strategy: config.strategy,
      first_use: true,
    })
  }

  /// Selects a strategy and growth budget, returning every byte of the heap
  /// to the growth source.
  ///
  /// Pointers handed out before the call dangle afterwards.
  pub fn configure(
    &mut self,
    strategy: Strategy,
    heap_limit: usize,
  ) {
    let increment = self.heap.increment();
    self.apply(Config {
      strategy,
      heap_limit,
      increment,
    });
  }

  /// Like [`Allocator::configure`], but can also change the growth
  /// increment. Nothing is reset when `config` is invalid.
  pub fn reconfigure(
    &mut self,
    config: Config,
  ) -> Result<(), ConfigError> {
    config.validate()?;
    self.apply(config);
    Ok(())
  }

  fn apply(
    &mut self,
    config: Config,
  ) {
    let released = self.heap.reset(config.increment, config.heap_limit);

    self.free.clear();
    self.first_use = true;
    self.strategy = config.strategy;

    info!(
      "configured {} with a {} byte limit in {} byte steps, released {} bytes",
      config.strategy, config.heap_limit, config.increment, released
    );
  }

  pub fn config(&self) -> Config {
    Config {
      strategy: self.strategy,
      heap_limit: self.heap.limit(),
      increment: self.heap.increment(),
    }
  }

  pub fn strategy(&self) -> Strategy {
    self.strategy
  }

  /// Reserves `size` payload bytes.
  ///
  /// The returned pointer is only guaranteed to be byte aligned. The header
  /// right in front of it belongs to the allocator and must not be written.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<NonNull<u8>, AllocError> {
    let total = size
      .checked_add(HEADER_SIZE)
      .filter(|&total| isize::try_from(total).is_ok())
      .ok_or(AllocError::InvalidSize { requested: size })?;

    if self.first_use {
      self.grow(size)?;
      self.first_use = false;
    }

    loop {
      if let Some(link) = self.strategy.search(&self.free, total) {
        let payload = split::carve(&mut self.free, link, total);
        trace!("allocate({size}) -> {payload:p} ({})", self.strategy);
        return Ok(payload);
      }

      self.grow(size)?;
    }
  }

  fn grow(
    &mut self,
    requested: usize,
  ) -> Result<(), AllocError> {
    match self.heap.grow(&mut self.free) {
      Ok(true) => Ok(()),
      Ok(false) => {
        warn!(
          "allocate({requested}) failed: heap of {} bytes is at its {} byte limit",
          self.heap.size(),
          self.heap.limit()
        );
        Err(AllocError::OutOfMemory {
          requested,
          heap_limit: self.heap.limit(),
        })
      }
      Err(err) => {
        warn!("allocate({requested}) failed: {err}");
        Err(err.into())
      }
    }
  }

  /// Hands a block back, merging it with free neighbours.
  ///
  /// # Safety
  ///
  /// `ptr` must come from [`Allocator::allocate`] on this allocator, must not
  /// have been released already, and no reset may have happened in between.
  /// None of this is checked in release builds.
  pub unsafe fn release(
    &mut self,
    ptr: NonNull<u8>,
  ) {
    let Some(bounds) = self.heap.bounds() else {
      warn!("release({ptr:p}) on an empty heap ignored");
      return;
    };

    let block = unsafe { Block::from_payload(ptr) };
    debug_assert!(self.heap.contains(block.addr()), "release({ptr:p}) outside of the heap");
    debug_assert!(!self.free.contains(block), "double release of {ptr:p}");

    let merge = split::merge(&mut self.free, block, bounds);
    trace!("release({ptr:p}) -> {merge:?}");
  }

  pub fn stats(&self) -> Stats {
    Stats {
      free_bytes: self.free.free_bytes(),
      free_blocks: self.free.len(),
      heap_size: self.heap.size(),
      heap_limit: self.heap.limit(),
    }
  }

  /// Walks every block, free or allocated, from the lowest address up.
  pub fn blocks(&self) -> Blocks<'_> {
    let next = self
      .heap
      .bounds()
      .filter(|bounds| bounds.origin != bounds.top)
      .map(|bounds| unsafe { Block::at(bounds.origin) });

    Blocks {
      free: &self.free,
      next,
      top: self.heap.bounds().map_or(0, |bounds| bounds.top.as_ptr().addr()),
    }
  }

  pub fn source(&self) -> &S {
    self.heap.source()
  }
}

/// Iterator returned by [`Allocator::blocks`].
pub struct Blocks<'a> {
  free: &'a FreeList,
  next: Option<Block>,
  top: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    let block = self.next?;
    let size = block.size();

    self.next = (block.end() < self.top).then(|| unsafe { Block::at(block.offset(size)) });

    Some(BlockInfo {
      addr: block.addr(),
      size,
      free: self.free.contains(block),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::DEFAULT_INCREMENT, source::Arena};

  const I: usize = DEFAULT_INCREMENT;
  const H: usize = HEADER_SIZE;

  fn allocator(
    strategy: Strategy,
    heap_limit: usize,
  ) -> Allocator<Arena> {
    let mut allocator = Allocator::new(Arena::new(8 * I));
    allocator.configure(strategy, heap_limit);
    allocator
  }

  fn origin(allocator: &Allocator<Arena>) -> usize {
    allocator.source().base().as_ptr().addr()
  }

  #[test]
  fn test_single_allocation_round_trip() {
    let mut allocator = allocator(Strategy::FirstFit, I);
    assert_eq!(allocator.stats().free_bytes, 0);

    let ptr = allocator.allocate(1).unwrap();
    assert_eq!(ptr.as_ptr().addr(), origin(&allocator) + H);
    assert_eq!(allocator.stats().free_bytes, I - 2 * H - 1);

    unsafe { allocator.release(ptr) };

    let stats = allocator.stats();
    assert_eq!(stats.free_bytes, I - H);
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.heap_size, I);
  }

  #[test]
  fn test_growth_coalesces_into_tail() {
    let mut allocator = allocator(Strategy::FirstFit, 2 * I);

    let first = allocator.allocate(100).unwrap();
    let second = allocator.allocate(I - 50).unwrap();

    assert_eq!(second.as_ptr().addr(), first.as_ptr().addr() + 100 + H);

    let stats = allocator.stats();
    assert_eq!(stats.heap_size, 2 * I);
    assert_eq!(stats.free_blocks, 1);
    assert_eq!(stats.free_bytes, 2 * I - (100 + H) - (I - 50 + H) - H);
  }

  #[test]
  fn test_limit_yields_out_of_memory() {
    let mut allocator = allocator(Strategy::FirstFit, I);

    assert!(matches!(
      allocator.allocate(I),
      Err(AllocError::OutOfMemory { requested: I, heap_limit: I })
    ));
    assert_eq!(allocator.stats().free_bytes, I - H);
    assert_eq!(allocator.source().used(), I);
  }

  #[test]
  fn test_unconfigured_allocator_refuses() {
    let mut allocator = Allocator::new(Arena::new(I));

    assert!(matches!(
      allocator.allocate(1),
      Err(AllocError::OutOfMemory { heap_limit: 0, .. })
    ));
    assert_eq!(allocator.source().used(), 0);
    assert_eq!(allocator.blocks().count(), 0);
  }

  #[test]
  fn test_absurd_sizes_are_rejected() {
    let mut allocator = allocator(Strategy::FirstFit, I);

    assert!(matches!(
      allocator.allocate(usize::MAX),
      Err(AllocError::InvalidSize { requested: usize::MAX })
    ));
    assert!(matches!(
      allocator.allocate(isize::MAX as usize),
      Err(AllocError::InvalidSize { .. })
    ));
    assert_eq!(allocator.source().used(), 0);
  }

  #[test]
  fn test_growth_source_failure_is_reported() {
    let mut allocator = Allocator::new(Arena::new(I));
    allocator.configure(Strategy::FirstFit, 4 * I);

    allocator.allocate(10).unwrap();
    assert!(matches!(allocator.allocate(I), Err(AllocError::Growth(_))));
    assert_eq!(allocator.stats().heap_size, I);
  }

  #[test]
  fn test_whole_heap_block() {
    let mut allocator = allocator(Strategy::BestFit, I);

    let ptr = allocator.allocate(I - H).unwrap();
    assert_eq!(allocator.stats().free_blocks, 0);

    unsafe { allocator.release(ptr) };
    assert_eq!(allocator.stats().free_blocks, 1);
    assert_eq!(allocator.stats().free_bytes, I - H);
  }

  #[test]
  fn test_small_slack_stays_with_allocation() {
    let mut allocator = allocator(Strategy::FirstFit, I);

    // Leaves exactly H bytes behind, too few for a block of their own.
    let ptr = allocator.allocate(I - 2 * H).unwrap();

    assert_eq!(allocator.stats().free_blocks, 0);
    let blocks: Vec<BlockInfo> = allocator.blocks().collect();
    assert_eq!(
      blocks,
      vec![BlockInfo {
        addr: ptr.as_ptr().addr() - H,
        size: I,
        free: false,
      }]
    );
  }

  #[test]
  fn test_configure_resets_everything() {
    let mut allocator = allocator(Strategy::FirstFit, 2 * I);

    let first = allocator.allocate(10).unwrap();
    allocator.allocate(I).unwrap();
    assert_eq!(allocator.source().used(), 2 * I);

    allocator.configure(Strategy::WorstFit, I);

    assert_eq!(allocator.stats(), Stats {
      free_bytes: 0,
      free_blocks: 0,
      heap_size: 0,
      heap_limit: I,
    });
    assert_eq!(allocator.source().used(), 0);
    assert_eq!(allocator.strategy(), Strategy::WorstFit);

    let again = allocator.allocate(10).unwrap();
    assert_eq!(again, first);
    assert_eq!(allocator.source().used(), I);
  }

  #[test]
  fn test_reconfigure_validates() {
    let mut allocator = allocator(Strategy::FirstFit, I);
    allocator.allocate(10).unwrap();

    assert!(allocator.reconfigure(Config::new(Strategy::BestFit, I).with_increment(H)).is_err());
    assert_eq!(allocator.source().used(), I);

    allocator
      .reconfigure(Config::new(Strategy::BestFit, 2 * I).with_increment(I / 2))
      .unwrap();
    assert_eq!(allocator.config(), Config::new(Strategy::BestFit, 2 * I).with_increment(I / 2));

    allocator.allocate(10).unwrap();
    assert_eq!(allocator.stats().heap_size, I / 2);
  }

  /// Leaves free blocks of 400, 300 and 100 payload bytes (in list order),
  /// followed by the tail. Returns the payload right after the last
  /// allocation, where the tail's payload starts.
  fn fragment(allocator: &mut Allocator<Arena>) -> (NonNull<u8>, NonNull<u8>, NonNull<u8>, usize) {
    let a = allocator.allocate(100).unwrap();
    allocator.allocate(200).unwrap();
    let c = allocator.allocate(300).unwrap();
    allocator.allocate(50).unwrap();
    let e = allocator.allocate(400).unwrap();
    let f = allocator.allocate(20).unwrap();

    unsafe {
      allocator.release(a);
      allocator.release(c);
      allocator.release(e);
    }

    assert_eq!(allocator.stats().free_blocks, 4);
    (a, c, e, f.as_ptr().addr() + 20 + H)
  }

  #[test]
  fn test_first_fit_follows_list_order() {
    let mut allocator = allocator(Strategy::FirstFit, I);
    let (_, _, e, _) = fragment(&mut allocator);

    assert_eq!(allocator.allocate(90).unwrap(), e);
  }

  #[test]
  fn test_best_fit_picks_smallest() {
    let mut allocator = allocator(Strategy::BestFit, I);
    let (a, c, _, _) = fragment(&mut allocator);

    assert_eq!(allocator.allocate(90).unwrap(), a);
    assert_eq!(allocator.allocate(101).unwrap(), c);
  }

  #[test]
  fn test_worst_fit_picks_largest() {
    let mut allocator = allocator(Strategy::WorstFit, I);
    let (_, _, _, tail) = fragment(&mut allocator);

    assert_eq!(allocator.allocate(90).unwrap().as_ptr().addr(), tail);
  }

  #[test]
  fn test_best_fit_tie_goes_to_list_head() {
    let mut allocator = allocator(Strategy::BestFit, I);

    let a = allocator.allocate(100).unwrap();
    allocator.allocate(10).unwrap();
    let c = allocator.allocate(100).unwrap();
    allocator.allocate(10).unwrap();

    unsafe {
      allocator.release(a);
      allocator.release(c);
    }

    assert_eq!(allocator.allocate(100).unwrap(), c);
    assert_eq!(allocator.allocate(100).unwrap(), a);
  }

  #[test]
  fn test_release_merges_both_sides() {
    let mut allocator = allocator(Strategy::FirstFit, I);

    let a = allocator.allocate(64).unwrap();
    let b = allocator.allocate(64).unwrap();
    let c = allocator.allocate(64).unwrap();
    allocator.allocate(64).unwrap();

    unsafe {
      allocator.release(a);
      allocator.release(c);
      allocator.release(b);
    }

    let blocks: Vec<BlockInfo> = allocator.blocks().collect();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0], BlockInfo {
      addr: origin(&allocator),
      size: 3 * (64 + H),
      free: true,
    });
    assert!(!blocks[1].free);
    assert!(blocks[2].free);
  }
}
