//! # fitalloc - A Free-List Memory Allocator
//!
//! This crate provides a user-space **free-list allocator** that manages one
//! contiguous heap, grown in fixed increments from a [`GrowthSource`] such as
//! the process's program break.
//!
//! ## Overview
//!
//! Free blocks are threaded into a singly linked list through their own
//! headers. Allocation searches that list with one of three strategies, and
//! release merges the block back with any free neighbours:
//!
//! ```text
//!   Heap after a few allocations and releases:
//!
//!   origin                                                           top
//!   ┌──────────┬───────────┬──────────┬─────────────┬───────────────────┐
//!   │  free A  │   used    │  free B  │    used     │      free C       │
//!   └──────────┴───────────┴──────────┴─────────────┴───────────────────┘
//!        ▲                      ▲                            ▲
//!        │                      │                            │
//!   head ┴──────── next ────────┘ ───────── next ────────────┘
//!
//!   The list order reflects history, not addresses: releases and growth
//!   insert at the head, splits keep the position of the block they cut.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   fitalloc
//!   ├── allocator  - Allocator facade: configure, allocate, release, stats
//!   ├── block      - Block header layout and address arithmetic (internal)
//!   ├── config     - Strategy, heap limit and growth increment
//!   ├── error      - AllocError, GrowthError, ConfigError
//!   ├── free_list  - Intrusive list of free blocks (internal)
//!   ├── heap       - Growth within a limit, reset (internal)
//!   ├── source     - GrowthSource trait, Sbrk and Arena
//!   ├── split      - Carving and coalescing (internal)
//!   └── strategy   - First, best and worst fit
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use fitalloc::{Allocator, Arena, Strategy};
//!
//! let mut allocator = Allocator::new(Arena::new(64 * 1024));
//! allocator.configure(Strategy::BestFit, 16 * 1024);
//!
//! let ptr = allocator.allocate(32).unwrap();
//! unsafe {
//!   ptr.as_ptr().write_bytes(0xAB, 32);
//!   allocator.release(ptr);
//! }
//!
//! assert_eq!(allocator.stats().heap_size, 4096);
//! ```
//!
//! ## How It Works
//!
//! Every block starts with a header. The size counts the header itself:
//!
//! ```text
//!   ┌───────────────────────┬────────────────────────────────┐
//!   │    Block Header       │           Payload              │
//!   │  ┌─────────────────┐  │                                │
//!   │  │ size: N + H     │  │   N bytes usable               │
//!   │  │ next: free link │  │                                │
//!   │  └─────────────────┘  │                                │
//!   │       H bytes         │                                │
//!   └───────────────────────┴────────────────────────────────┘
//!                           ▲
//!                           └── Pointer returned to user
//! ```
//!
//! When the chosen block is larger than needed and the leftover can hold a
//! header of its own, it is split and the leftover stays free. When no block
//! fits, the heap grows by one increment; if the last block before the old
//! top is free, it simply absorbs the new space.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: no synchronization, `&mut self` everywhere
//! - **Byte alignment**: payloads are not aligned beyond what sizes happen to give
//! - **No resizing**: there is no realloc
//! - **Trusting release**: releasing a foreign or stale pointer is undefined behavior

mod allocator;
mod block;
mod config;
mod error;
mod free_list;
mod heap;
mod source;
mod split;
mod strategy;

pub use allocator::{Allocator, BlockInfo, Blocks, Stats};
pub use block::{HEADER_SIZE, Header};
pub use config::{Config, DEFAULT_INCREMENT};
pub use error::{AllocError, ConfigError, GrowthError};
#[cfg(unix)]
pub use source::Sbrk;
pub use source::{Arena, GrowthSource};
pub use strategy::Strategy;
