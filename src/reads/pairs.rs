//! Grouping adjacent reads into mate pairs.
//!
//! Mates are expected to be adjacent in the stream and share a read name.
//! Bookkeeping anomalies are repaired rather than rejected: a pair whose
//! flags do not name exactly one first and one second mate has its flags
//! rewritten, and a read whose mate never appears is kept as a single with
//! its pairing flags cleared.

use tracing::warn;

use crate::reads::MappedRead;
use crate::reads::Result;

/// One read, or two mates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Fragment {
    /// A read without a mate in the stream.
    Single(MappedRead),

    /// A first-of-pair read and its second-of-pair mate.
    Pair(MappedRead, MappedRead),
}

impl Fragment {
    /// Gets the read name.
    pub fn name(&self) -> &str {
        match self {
            Fragment::Single(read) => read.name(),
            Fragment::Pair(first, _) => first.name(),
        }
    }

    /// The number of reads in the fragment.
    pub fn len(&self) -> usize {
        match self {
            Fragment::Single(_) => 1,
            Fragment::Pair(_, _) => 2,
        }
    }

    /// Always false: a fragment holds at least one read.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// An iterator grouping a read stream into [`Fragment`]s.
pub struct Fragments<I> {
    /// The read stream.
    reads: I,

    /// A read taken from the stream that starts the next fragment.
    pending: Option<MappedRead>,
}

impl<I> std::fmt::Debug for Fragments<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragments")
            .field("pending", &self.pending.as_ref().map(|read| read.name()))
            .finish()
    }
}

impl<I> Fragments<I>
where
    I: Iterator<Item = Result<MappedRead>>,
{
    /// Creates a new [`Fragments`].
    pub fn new(reads: I) -> Self {
        Self {
            reads,
            pending: None,
        }
    }

    /// Takes the next read, preferring one already taken from the stream.
    fn next_read(&mut self) -> Option<Result<MappedRead>> {
        match self.pending.take() {
            Some(read) => Some(Ok(read)),
            None => self.reads.next(),
        }
    }
}

impl<I> Iterator for Fragments<I>
where
    I: Iterator<Item = Result<MappedRead>>,
{
    type Item = Result<Fragment>;

    fn next(&mut self) -> Option<Self::Item> {
        let read = match self.next_read()? {
            Ok(read) => read,
            Err(err) => return Some(Err(err)),
        };

        let mate = match self.reads.next() {
            Some(Ok(mate)) if mate.name() == read.name() => mate,
            Some(Ok(other)) => {
                self.pending = Some(other);
                return Some(Ok(single(read)));
            }
            Some(Err(err)) => {
                // The lone read is dropped with the failed stream.
                return Some(Err(err));
            }
            None => return Some(Ok(single(read))),
        };

        Some(Ok(pair(read, mate)))
    }
}

/// Wraps an unpaired read, clearing any pairing flags it carries.
fn single(read: MappedRead) -> Fragment {
    if !read.first_of_pair() && !read.second_of_pair() {
        return Fragment::Single(read);
    }

    warn!(
        name = read.name(),
        "mate not found alongside read; treating it as unpaired"
    );

    Fragment::Single(read.with_pairing(false, false))
}

/// Orders two mates, repairing their pairing flags.
fn pair(mut a: MappedRead, mut b: MappedRead) -> Fragment {
    match (a.first_of_pair(), a.second_of_pair(), b.first_of_pair(), b.second_of_pair()) {
        (true, false, false, true) => Fragment::Pair(a, b),
        (false, true, true, false) => Fragment::Pair(b, a),
        _ => {
            warn!(
                name = a.name(),
                "mates do not carry one first-of-pair and one second-of-pair flag; treating the \
                 earlier read as first of pair"
            );

            a.set_mate(true);
            b.set_mate(false);
            Fragment::Pair(a, b)
        }
    }
}

/// Whether the fragment at `index` in the stream belongs to `shard` of
/// `shards`.
pub fn in_shard(index: usize, shard: usize, shards: usize) -> bool {
    index % shards == shard
}
