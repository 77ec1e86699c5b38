use std::{fmt, str::FromStr};

use crate::{
  error::ConfigError,
  free_list::{FreeList, Link},
};

/// Policy deciding which free block serves a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
  /// First block in list order that is large enough.
  #[default]
  FirstFit,
  /// Smallest block that is large enough.
  BestFit,
  /// Largest block that is large enough.
  WorstFit,
}

impl Strategy {
  pub const ALL: [Strategy; 3] = [Strategy::FirstFit, Strategy::BestFit, Strategy::WorstFit];

  /// Picks one of `candidates`, given as `(item, size)` pairs in traversal
  /// order, whose size is at least `total`.
  ///
  /// Best and worst fit only replace their pick on a strictly smaller
  /// (larger) size, so ties go to whichever candidate came first.
  pub fn select<T>(
    self,
    candidates: impl IntoIterator<Item = (T, usize)>,
    total: usize,
  ) -> Option<T> {
    let mut fits = candidates.into_iter().filter(|&(_, size)| size >= total);

    let chosen = match self {
      Strategy::FirstFit => fits.next(),
      Strategy::BestFit => fits.reduce(|best, candidate| if candidate.1 < best.1 { candidate } else { best }),
      Strategy::WorstFit => fits.reduce(|worst, candidate| if candidate.1 > worst.1 { candidate } else { worst }),
    };

    chosen.map(|(item, _)| item)
  }

  /// Single pass over the free list for a block of at least `total` bytes,
  /// header included.
  pub(crate) fn search(
    self,
    free: &FreeList,
    total: usize,
  ) -> Option<Link> {
    self.select(free.iter().map(|link| (link, link.block.size())), total)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Strategy::FirstFit => "first-fit",
      Strategy::BestFit => "best-fit",
      Strategy::WorstFit => "worst-fit",
    }
  }
}

impl fmt::Display for Strategy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Strategy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "first-fit" | "first_fit" | "first" => Ok(Strategy::FirstFit),
      "best-fit" | "best_fit" | "best" => Ok(Strategy::BestFit),
      "worst-fit" | "worst_fit" | "worst" => Ok(Strategy::WorstFit),
      _ => Err(ConfigError::UnknownStrategy(s.to_owned())),
    }
  }
}
