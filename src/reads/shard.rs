//! Sharded, parallel reduction over a read stream.
//!
//! Each shard worker opens its own stream from the [`ReadSource`], keeps the
//! fragments dealt to it, and folds them into a private partial result.
//! Partials are combined on the calling thread only after every worker has
//! finished.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;
use tracing::info;

use crate::config::ReadAnalysisConfig;
use crate::reads::pairs::in_shard;
use crate::reads::Error;
use crate::reads::Fragment;
use crate::reads::Fragments;
use crate::reads::ReadSource;
use crate::reads::Result;

/// A per-fragment analysis with an associative combine step.
pub trait Reducer: Sync {
    /// The partial result accumulated by one shard.
    type Partial: Send + Default;

    /// Folds one fragment into a partial result.
    fn observe(&self, partial: &mut Self::Partial, fragment: &Fragment) -> Result<()>;

    /// Combines two partial results.
    ///
    /// This must be associative, and [`Default::default()`] must be its
    /// identity.
    fn reduce(&self, a: Self::Partial, b: Self::Partial) -> Self::Partial;
}

/// A cooperative cancellation flag shared with shard workers.
///
/// Workers check the flag between batches of records.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Runs `reducer` over every fragment of `source`.
///
/// # Examples
///
/// ```
/// use varscope::config::ReadAnalysisConfig;
/// use varscope::reads::depth::DepthReducer;
/// use varscope::reads::shard;
/// use varscope::reads::AlignmentBlock;
/// use varscope::reads::CancellationToken;
/// use varscope::reads::MappedRead;
/// use varscope::reads::ReadMapper;
///
/// let config = ReadAnalysisConfig::builder().shards(2).try_build()?;
/// let reads = vec![
///     MappedRead::try_new("r1", "ACGT", "IIII", 60, vec![AlignmentBlock::new(1, 1, 4)])?,
///     MappedRead::try_new("r2", "CGT", "III", 60, vec![AlignmentBlock::new(1, 2, 3)])?,
/// ];
///
/// let reducer = DepthReducer::new(ReadMapper::identity(10, &config));
/// let depths = shard::run(&reads, &reducer, &config, &CancellationToken::default())?;
///
/// assert_eq!(depths.rows(&config), vec![(1, 1), (2, 2), (3, 2), (4, 2)]);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn run<S, R>(
    source: &S,
    reducer: &R,
    config: &ReadAnalysisConfig,
    cancel: &CancellationToken,
) -> Result<R::Partial>
where
    S: ReadSource,
    R: Reducer,
{
    let shards = config.shards();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(shards)
        .build()
        .map_err(|err| Error::ThreadPool(err.to_string()))?;

    let partials = pool.install(|| {
        (0..shards)
            .into_par_iter()
            .map(|shard| run_shard(source, reducer, shard, config, cancel))
            .collect::<Vec<_>>()
    });

    if cancel.is_cancelled() {
        info!("read analysis cancelled");
        return Err(Error::Cancelled);
    }

    partials
        .into_iter()
        .try_fold(R::Partial::default(), |acc, partial| {
            Ok(reducer.reduce(acc, partial?))
        })
}

/// Folds the fragments dealt to `shard` into a fresh partial result.
fn run_shard<S, R>(
    source: &S,
    reducer: &R,
    shard: usize,
    config: &ReadAnalysisConfig,
    cancel: &CancellationToken,
) -> Result<R::Partial>
where
    S: ReadSource,
    R: Reducer,
{
    debug!(shard, shards = config.shards(), "starting shard");

    let mut partial = R::Partial::default();
    let mut records = 0usize;
    let mut observed = 0usize;
    let mut next_check = config.batch_size();

    for (index, fragment) in Fragments::new(source.open()?).enumerate() {
        let fragment = fragment?;
        records += fragment.len();

        if records >= next_check {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            next_check = records + config.batch_size();
        }

        if in_shard(index, shard, config.shards()) {
            reducer.observe(&mut partial, &fragment)?;
            observed += 1;
        }
    }

    debug!(shard, records, fragments = observed, "finished shard");
    Ok(partial)
}
