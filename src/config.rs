//! Configuration for read-level analyses.

use std::num::NonZeroUsize;

/// The number of records between cancellation checks by default.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// An error related to a [`ReadAnalysisConfig`].
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// The number of shards was zero.
    ZeroShards,

    /// The batch size was zero.
    ZeroBatchSize,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ZeroShards => write!(f, "the number of shards must be at least one"),
            Error::ZeroBatchSize => write!(f, "the batch size must be at least one"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

/// Settings shared by every read-level reducer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReadAnalysisConfig {
    /// The number of shards processed in parallel.
    shards: NonZeroUsize,

    /// The number of records processed between cancellation checks.
    batch_size: NonZeroUsize,

    /// Bases with a Phred quality below this are ignored.
    min_q_score: u8,

    /// Reads with a mapping quality below this are ignored.
    min_map_q: u8,

    /// Positions with fewer contributing reads are suppressed.
    min_depth: u64,
}

impl ReadAnalysisConfig {
    /// Gets a [`Builder`] seeded with the defaults.
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Gets the number of shards.
    pub fn shards(&self) -> usize {
        self.shards.get()
    }

    /// Gets the number of records between cancellation checks.
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Gets the minimum base quality.
    pub fn min_q_score(&self) -> u8 {
        self.min_q_score
    }

    /// Gets the minimum mapping quality.
    pub fn min_map_q(&self) -> u8 {
        self.min_map_q
    }

    /// Gets the minimum reported depth.
    pub fn min_depth(&self) -> u64 {
        self.min_depth
    }
}

impl Default for ReadAnalysisConfig {
    fn default() -> Self {
        Self {
            shards: available_parallelism(),
            batch_size: NonZeroUsize::MIN.saturating_add(DEFAULT_BATCH_SIZE - 1),
            min_q_score: 0,
            min_map_q: 0,
            min_depth: 1,
        }
    }
}

/// The number of threads the platform suggests, or one.
fn available_parallelism() -> NonZeroUsize {
    std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}

/// A builder for a [`ReadAnalysisConfig`].
#[derive(Debug)]
pub struct Builder {
    /// The number of shards.
    shards: usize,

    /// The batch size.
    batch_size: usize,

    /// The minimum base quality.
    min_q_score: u8,

    /// The minimum mapping quality.
    min_map_q: u8,

    /// The minimum reported depth.
    min_depth: u64,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            shards: available_parallelism().get(),
            batch_size: DEFAULT_BATCH_SIZE,
            min_q_score: 0,
            min_map_q: 0,
            min_depth: 1,
        }
    }
}

impl Builder {
    /// Sets the number of shards.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets the number of records between cancellation checks.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the minimum base quality.
    pub fn min_q_score(mut self, min_q_score: u8) -> Self {
        self.min_q_score = min_q_score;
        self
    }

    /// Sets the minimum mapping quality.
    pub fn min_map_q(mut self, min_map_q: u8) -> Self {
        self.min_map_q = min_map_q;
        self
    }

    /// Sets the minimum reported depth.
    pub fn min_depth(mut self, min_depth: u64) -> Self {
        self.min_depth = min_depth;
        self
    }

    /// Attempts to build a [`ReadAnalysisConfig`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::config::ReadAnalysisConfig;
    ///
    /// let config = ReadAnalysisConfig::builder().shards(4).min_depth(10).try_build()?;
    /// assert_eq!(config.shards(), 4);
    /// assert_eq!(config.batch_size(), 10_000);
    ///
    /// assert!(ReadAnalysisConfig::builder().shards(0).try_build().is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_build(self) -> Result<ReadAnalysisConfig> {
        let shards = NonZeroUsize::new(self.shards).ok_or(Error::ZeroShards)?;
        let batch_size = NonZeroUsize::new(self.batch_size).ok_or(Error::ZeroBatchSize)?;

        Ok(ReadAnalysisConfig {
            shards,
            batch_size,
            min_q_score: self.min_q_score,
            min_map_q: self.min_map_q,
            min_depth: self.min_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_builder() -> std::result::Result<(), Box<dyn std::error::Error>> {
        assert_eq!(ReadAnalysisConfig::builder().try_build()?, ReadAnalysisConfig::default());
        Ok(())
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = ReadAnalysisConfig::builder().batch_size(0).try_build().unwrap_err();
        assert_eq!(err, Error::ZeroBatchSize);
    }
}
