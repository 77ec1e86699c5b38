use std::{env, process, ptr::NonNull};

use fitalloc::{AllocError, Allocator, DEFAULT_INCREMENT, Sbrk, Strategy};
use tracing_subscriber::EnvFilter;

/// Copies `text` plus a trailing NUL into a fresh allocation.
fn store(
  allocator: &mut Allocator<Sbrk>,
  text: &str,
) -> Result<NonNull<u8>, AllocError> {
  let ptr = allocator.allocate(text.len() + 1)?;

  unsafe {
    ptr.as_ptr().copy_from_nonoverlapping(text.as_ptr(), text.len());
    ptr.as_ptr().add(text.len()).write(0);
  }

  Ok(ptr)
}

/// Reads back a string written by [`store`].
unsafe fn load<'a>(
  ptr: NonNull<u8>,
  len: usize,
) -> &'a str {
  let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
  std::str::from_utf8(bytes).unwrap_or("<invalid utf-8>")
}

fn print_free(allocator: &Allocator<Sbrk>) {
  println!("Free size: {}\n", allocator.stats().free_bytes);
}

fn run(strategy: Strategy) -> Result<(), AllocError> {
  // The break is only touched from this thread, and nothing below releases it.
  let mut allocator = Allocator::new(unsafe { Sbrk::new() });
  allocator.configure(strategy, DEFAULT_INCREMENT);

  // --------------------------------------------------------------------
  // 1) A one byte allocation forces the first growth step.
  // --------------------------------------------------------------------
  allocator.allocate(1)?;
  print_free(&allocator);

  // --------------------------------------------------------------------
  // 2) Three strings, each carved from the same free block.
  // --------------------------------------------------------------------
  let texts = ["Hello, world!", "Hello again!", "Hello yet again!"];
  let mut stored = Vec::with_capacity(texts.len());

  for text in texts {
    let ptr = store(&mut allocator, text)?;
    println!("{}", unsafe { load(ptr, text.len()) });
    print_free(&allocator);
    stored.push(ptr);
  }

  // --------------------------------------------------------------------
  // 3) Releasing the first string leaves a hole between live blocks.
  // --------------------------------------------------------------------
  println!("release(str1)");
  unsafe { allocator.release(stored[0]) };
  print_free(&allocator);

  // --------------------------------------------------------------------
  // 4) Releasing the other two coalesces everything after the first byte.
  // --------------------------------------------------------------------
  println!("release(str2) and release(str3)");
  unsafe {
    allocator.release(stored[1]);
    allocator.release(stored[2]);
  }
  println!("Free size: {}", allocator.stats().free_bytes);

  for block in allocator.blocks() {
    tracing::debug!("{:#x}: {} bytes{}", block.addr, block.size, if block.free { " (free)" } else { "" });
  }

  // Give the break back before exiting.
  allocator.configure(strategy, 0);
  Ok(())
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .without_time()
    .with_target(false)
    .init();

  let strategy = match env::args().nth(1).map(|arg| arg.parse::<Strategy>()) {
    None => Strategy::FirstFit,
    Some(Ok(strategy)) => strategy,
    Some(Err(err)) => {
      eprintln!("{err}");
      process::exit(2);
    }
  };

  if let Err(err) = run(strategy) {
    eprintln!("walkthrough failed: {err}");
    process::exit(1);
  }
}
