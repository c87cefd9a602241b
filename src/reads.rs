//! Read-level analyses over streams of mapped sequencing reads.
//!
//! A read stream is consumed as a sequence of [`MappedRead`]s. Each read's
//! alignment blocks relate the read to the reference it was mapped against;
//! a [`ReadMapper`] composes those blocks with a precomputed homology from
//! that reference to the target reference so that every base lands at a
//! target position. Reads are grouped into mate pairs ([`pairs`]), the
//! pairs are dealt out to shards processed in parallel ([`shard`]), and the
//! per-shard partial results of a [`Reducer`](shard::Reducer) are combined
//! associatively.

use std::collections::BTreeMap;

use crate::config::ReadAnalysisConfig;
use crate::segment::algebra::sort_by_ref_start;
use crate::segment::algebra::translate_segments;
use crate::segment::realized::complement;
use crate::segment::NtQueryAlignedSegment;
use crate::segment::QueryAlignedSegment;
use crate::segment::ReferenceBounds;
use crate::segment::Sense;

pub mod codon;
pub mod depth;
pub mod nucleotide;
pub mod pairs;
pub mod shard;
pub mod tiebreak;
pub mod variation;

pub use pairs::Fragment;
pub use pairs::Fragments;
pub use shard::CancellationToken;
pub use shard::Reducer;
pub use tiebreak::Call;
pub use tiebreak::Mate;

/// The mapping quality reported when none is available.
pub const MAPQ_UNAVAILABLE: u8 = 255;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to read-level analysis.
#[derive(Debug)]
pub enum Error {
    /// A read is internally inconsistent.
    InvalidRead {
        /// The read name.
        name: String,

        /// What is wrong with it.
        reason: String,
    },

    /// The read source failed.
    Source(String),

    /// The worker pool could not be created.
    ThreadPool(String),

    /// The analysis was cancelled.
    Cancelled,

    /// A codon error.
    Codon(crate::codon::Error),

    /// A variation error.
    Variation(crate::variation::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidRead { name, reason } => write!(f, "invalid read {name}: {reason}"),
            Error::Source(err) => write!(f, "read source error: {err}"),
            Error::ThreadPool(err) => write!(f, "unable to start shard workers: {err}"),
            Error::Cancelled => write!(f, "analysis cancelled"),
            Error::Codon(err) => write!(f, "codon error: {err}"),
            Error::Variation(err) => write!(f, "variation error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Reads
////////////////////////////////////////////////////////////////////////////////////////

/// Decodes a Phred+33 quality character.
///
/// # Examples
///
/// ```
/// assert_eq!(varscope::reads::phred(b'!'), 0);
/// assert_eq!(varscope::reads::phred(b'?'), 30);
/// ```
pub fn phred(quality: u8) -> u8 {
    quality.saturating_sub(33)
}

/// An ungapped stretch of a read aligned to its mapping reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AlignmentBlock {
    /// The first read position (1-based).
    read_start: i64,

    /// The first reference position (1-based).
    ref_start: i64,

    /// The number of aligned positions.
    length: i64,
}

impl AlignmentBlock {
    /// Creates a new [`AlignmentBlock`].
    pub fn new(read_start: i64, ref_start: i64, length: i64) -> Self {
        Self {
            read_start,
            ref_start,
            length,
        }
    }

    /// Gets the first read position.
    pub fn read_start(&self) -> i64 {
        self.read_start
    }

    /// Gets the first reference position.
    pub fn ref_start(&self) -> i64 {
        self.ref_start
    }

    /// Gets the number of aligned positions.
    pub fn length(&self) -> i64 {
        self.length
    }
}

/// A sequencing read mapped against a reference.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MappedRead {
    /// The read name.
    name: String,

    /// The read bases, in mapping-reference orientation.
    sequence: Vec<u8>,

    /// The Phred+33 base qualities.
    qualities: Vec<u8>,

    /// The mapping quality.
    mapping_quality: u8,

    /// The alignment blocks.
    blocks: Vec<AlignmentBlock>,

    /// Whether the read is the first of a pair.
    first_of_pair: bool,

    /// Whether the read is the second of a pair.
    second_of_pair: bool,

    /// Whether the read was reverse complemented when mapped.
    ///
    /// Informational only: `sequence` is already in mapping-reference
    /// orientation, so placement never consults it.
    negative_strand: bool,
}

impl MappedRead {
    /// Attempts to create a new unpaired [`MappedRead`].
    ///
    /// An empty `qualities` means the qualities are unknown; every base is
    /// then treated as quality zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::reads::AlignmentBlock;
    /// use varscope::reads::MappedRead;
    ///
    /// let read = MappedRead::try_new("r1", "ACGT", "IIII", 60, vec![AlignmentBlock::new(1, 100, 4)])?;
    /// assert_eq!(read.base_quality(2), 40);
    ///
    /// assert!(MappedRead::try_new("r2", "ACGT", "II", 60, Vec::new()).is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(
        name: impl Into<String>,
        sequence: impl Into<Vec<u8>>,
        qualities: impl Into<Vec<u8>>,
        mapping_quality: u8,
        blocks: Vec<AlignmentBlock>,
    ) -> Result<Self> {
        let name = name.into();
        let sequence = sequence.into();
        let qualities = qualities.into();

        if !qualities.is_empty() && qualities.len() != sequence.len() {
            return Err(Error::InvalidRead {
                name,
                reason: format!(
                    "{} qualities for {} bases",
                    qualities.len(),
                    sequence.len()
                ),
            });
        }

        if let Some(offset) = sequence.iter().position(|base| !base.is_ascii()) {
            return Err(Error::InvalidRead {
                name,
                reason: format!("base at read position {} is not ASCII", offset + 1),
            });
        }

        let length = sequence.len() as i64;
        if let Some(block) = blocks.iter().find(|block| {
            block.length < 1
                || block.read_start < 1
                || block.ref_start < 1
                || block.read_start + block.length - 1 > length
        }) {
            return Err(Error::InvalidRead {
                name,
                reason: format!(
                    "alignment block at read position {} of length {} does not fit a read of \
                     length {length}",
                    block.read_start, block.length
                ),
            });
        }

        Ok(Self {
            name,
            sequence,
            qualities,
            mapping_quality,
            blocks,
            first_of_pair: false,
            second_of_pair: false,
            negative_strand: false,
        })
    }

    /// Sets the pairing flags.
    pub fn with_pairing(mut self, first_of_pair: bool, second_of_pair: bool) -> Self {
        self.first_of_pair = first_of_pair;
        self.second_of_pair = second_of_pair;
        self
    }

    /// Sets whether the read was reverse complemented when mapped.
    pub fn with_negative_strand(mut self, negative_strand: bool) -> Self {
        self.negative_strand = negative_strand;
        self
    }

    /// Gets the read name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the read bases.
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Gets the mapping quality.
    pub fn mapping_quality(&self) -> u8 {
        self.mapping_quality
    }

    /// Gets the alignment blocks.
    pub fn blocks(&self) -> &[AlignmentBlock] {
        &self.blocks
    }

    /// Whether the read is the first of a pair.
    pub fn first_of_pair(&self) -> bool {
        self.first_of_pair
    }

    /// Whether the read is the second of a pair.
    pub fn second_of_pair(&self) -> bool {
        self.second_of_pair
    }

    /// Whether the read was reverse complemented when mapped.
    ///
    /// The flag is reported as read and has no effect on where bases land.
    /// Reverse-sense placement comes from the homology handed to
    /// [`ReadMapper::new`].
    pub fn negative_strand(&self) -> bool {
        self.negative_strand
    }

    /// Gets the decoded quality of the base at 1-based `read_position`.
    pub fn base_quality(&self, read_position: i64) -> u8 {
        self.qualities
            .get((read_position - 1) as usize)
            .map(|q| phred(*q))
            .unwrap_or(0)
    }

    /// The alignment blocks as segments relating the mapping reference
    /// (reference axis) to the read (query axis).
    pub fn segments(&self) -> Vec<QueryAlignedSegment> {
        let mut segments = self
            .blocks
            .iter()
            .map(|block| {
                QueryAlignedSegment::from_bounds(
                    block.ref_start,
                    block.ref_start + block.length - 1,
                    block.read_start,
                    block.read_start + block.length - 1,
                )
            })
            .collect::<Vec<_>>();

        sort_by_ref_start(&mut segments);
        segments
    }

    /// Flips the pairing flags so the read is first or second of its pair.
    pub(crate) fn set_mate(&mut self, first: bool) {
        self.first_of_pair = first;
        self.second_of_pair = !first;
    }
}

/// Supplies a stream of mapped reads.
///
/// Every shard opens its own stream, so implementations must be able to
/// produce the same stream repeatedly.
pub trait ReadSource: Sync {
    /// Opens a fresh stream positioned at the first read.
    fn open(&self) -> Result<Box<dyn Iterator<Item = Result<MappedRead>> + '_>>;
}

impl ReadSource for Vec<MappedRead> {
    fn open(&self) -> Result<Box<dyn Iterator<Item = Result<MappedRead>> + '_>> {
        Ok(Box::new(self.iter().cloned().map(Ok)))
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Mapping reads onto the target reference
////////////////////////////////////////////////////////////////////////////////////////

/// A read base placed on the target reference.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AlignedBase {
    /// The base, in target orientation.
    pub base: u8,

    /// The decoded base quality.
    pub quality: u8,
}

/// Places reads on the target reference.
#[derive(Clone, Debug)]
pub struct ReadMapper {
    /// Segments relating the target (reference axis) to the mapping
    /// reference (query axis).
    target_to_mapping: Vec<QueryAlignedSegment>,

    /// The minimum base quality.
    min_q_score: u8,

    /// The minimum mapping quality.
    min_map_q: u8,
}

impl ReadMapper {
    /// Creates a new [`ReadMapper`].
    pub fn new(
        mut target_to_mapping: Vec<QueryAlignedSegment>,
        config: &ReadAnalysisConfig,
    ) -> Self {
        sort_by_ref_start(&mut target_to_mapping);

        Self {
            target_to_mapping,
            min_q_score: config.min_q_score(),
            min_map_q: config.min_map_q(),
        }
    }

    /// Creates a mapper for reads mapped directly against the target.
    pub fn identity(target_length: i64, config: &ReadAnalysisConfig) -> Self {
        Self::new(
            vec![QueryAlignedSegment::from_bounds(
                1,
                target_length.max(1),
                1,
                target_length.max(1),
            )],
            config,
        )
    }

    /// Whether the read passes the mapping quality filter.
    ///
    /// Reads without a mapping quality always pass.
    pub fn accepts(&self, read: &MappedRead) -> bool {
        read.mapping_quality == MAPQ_UNAVAILABLE || read.mapping_quality >= self.min_map_q
    }

    /// The segments relating the target (reference axis) to the read (query
    /// axis).
    pub fn target_segments(&self, read: &MappedRead) -> Vec<QueryAlignedSegment> {
        translate_segments(&self.target_to_mapping, &read.segments())
    }

    /// The read's segments realized with its bases in target orientation.
    pub fn realized_segments(&self, read: &MappedRead) -> Vec<NtQueryAlignedSegment> {
        let sequence = String::from_utf8_lossy(read.sequence());

        self.target_segments(read)
            .into_iter()
            .filter_map(|segment| NtQueryAlignedSegment::realize(segment, &sequence).ok())
            .collect()
    }

    /// The read's bases on the target that pass the base quality filter.
    ///
    /// A read that fails the mapping quality filter yields no bases.
    pub fn aligned_bases(&self, read: &MappedRead) -> BTreeMap<i64, Call<AlignedBase>> {
        let mut bases = BTreeMap::new();

        if !self.accepts(read) {
            return bases;
        }

        for segment in self.target_segments(read) {
            for position in segment.ref_start()..=segment.ref_end() {
                let Some(read_position) = segment.query_at(position) else {
                    continue;
                };

                let quality = read.base_quality(read_position);
                if quality < self.min_q_score {
                    continue;
                }

                let base = read.sequence[(read_position - 1) as usize].to_ascii_uppercase();
                let base = match segment.sense() {
                    Sense::Forward => base,
                    Sense::Reverse => complement(base as char) as u8,
                };

                bases.insert(
                    position,
                    Call::new(AlignedBase { base, quality }, quality),
                );
            }
        }

        bases
    }
}

/// The bases of a fragment on the target, with overlapping mates merged so
/// each position is counted once.
pub fn fragment_bases(mapper: &ReadMapper, fragment: &Fragment) -> BTreeMap<i64, Call<AlignedBase>> {
    match fragment {
        Fragment::Single(read) => mapper.aligned_bases(read),
        Fragment::Pair(first, second) => tiebreak::merge_calls(
            mapper.aligned_bases(first),
            mapper.aligned_bases(second),
            first.mapping_quality(),
            second.mapping_quality(),
            first.name(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn read(name: &str, sequence: &str, quality: u8, ref_start: i64) -> MappedRead {
        let qualities = vec![quality + 33; sequence.len()];
        let blocks = vec![AlignmentBlock::new(1, ref_start, sequence.len() as i64)];
        MappedRead::try_new(name, sequence, qualities, 60, blocks).unwrap()
    }

    #[test]
    fn blocks_must_fit_the_read() {
        let err = MappedRead::try_new("r", "ACGT", "", 60, vec![AlignmentBlock::new(2, 1, 4)])
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRead { .. }));
    }

    #[test]
    fn non_ascii_bases_are_rejected() {
        let err = MappedRead::try_new(
            "r",
            vec![b'A', 0xFF, b'C', b'G'],
            "",
            60,
            vec![AlignmentBlock::new(3, 1, 2)],
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "invalid read r: base at read position 2 is not ASCII");
    }

    #[test]
    fn bases_are_placed_on_the_target() {
        let config = ReadAnalysisConfig::builder().min_q_score(20).try_build().unwrap();
        // Target 1-10 is the mapping reference 101-110, reversed.
        let mapper = ReadMapper::new(
            vec![QueryAlignedSegment::try_new(1, 10, 110, 101).unwrap()],
            &config,
        );

        let read = MappedRead::try_new(
            "r",
            "AACG",
            vec![b'I', b'I', b'I', b'+'],
            60,
            vec![AlignmentBlock::new(1, 101, 4)],
        )
        .unwrap();

        let bases = mapper.aligned_bases(&read);
        let placed = bases
            .iter()
            .map(|(position, call)| (*position, call.value().base as char))
            .collect::<Vec<_>>();

        // Read position 4 (quality 10) is filtered out; the rest is
        // complemented.
        assert_eq!(placed, vec![(8, 'G'), (9, 'T'), (10, 'T')]);
    }

    #[test]
    fn strand_flag_does_not_move_bases() {
        let mapper = ReadMapper::identity(20, &ReadAnalysisConfig::default());
        let forward = read("r", "ACGT", 30, 5);
        let negative = forward.clone().with_negative_strand(true);

        assert!(negative.negative_strand());
        assert_eq!(mapper.aligned_bases(&negative), mapper.aligned_bases(&forward));
    }

    #[test]
    fn mapping_quality_filter_skips_unavailable() {
        let config = ReadAnalysisConfig::builder().min_map_q(30).try_build().unwrap();
        let mapper = ReadMapper::identity(100, &config);

        let low = MappedRead::try_new("r", "A", "I", 10, vec![AlignmentBlock::new(1, 1, 1)]).unwrap();
        let unavailable =
            MappedRead::try_new("r", "A", "I", MAPQ_UNAVAILABLE, vec![AlignmentBlock::new(1, 1, 1)])
                .unwrap();

        assert!(!mapper.accepts(&low));
        assert!(mapper.accepts(&unavailable));
        assert!(mapper.aligned_bases(&low).is_empty());
    }
}
