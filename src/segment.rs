//! Closed, 1-based intervals on a reference axis and their homologies to a
//! query axis.
//!
//! ```text
//! ============== reference ==============
//!
//! | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 |
//! -------------------------------------
//! |   |   | X | X | X | X | X |   |   |  <= [3, 7]
//!
//! ================ query ================
//!
//! | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 | 9 |
//! -------------------------------------
//! | X | X | X | X | X |   |   |   |   |  <= [3, 7] -> [1, 5] (forward)
//! | X | X | X | X | X |   |   |   |   |  <= [3, 7] -> [5, 1] (reverse)
//! ```
//!
//! Both ends of every interval are inclusive. A [`QueryAlignedSegment`] whose
//! query start is greater than its query end represents reverse-complement
//! homology: walking forward along the reference walks backward along the
//! query.

use std::cmp::Ordering;

pub mod algebra;
pub mod realized;

pub use realized::AaQueryAlignedSegment;
pub use realized::AaReferenceSegment;
pub use realized::AminoAcid;
pub use realized::NtQueryAlignedSegment;
pub use realized::NtReferenceSegment;
pub use realized::Nucleotide;
pub use realized::Realized;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to constructing a segment.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// A coordinate was below the first position (1).
    NonPositiveCoordinate(i64),

    /// The reference start was greater than the reference end.
    StartGreaterThanEnd(i64, i64),

    /// The reference and query intervals do not cover the same number of
    /// positions.
    LengthMismatch {
        /// The number of reference positions.
        reference: i64,

        /// The number of query positions.
        query: i64,
    },

    /// The residue payload does not match the length of the segment.
    ResidueCountMismatch {
        /// The number of residues expected from the segment length.
        expected: i64,

        /// The number of residues supplied.
        found: usize,
    },

    /// A segment extends beyond the length of its sequence.
    BeyondSequenceLength {
        /// The offending position.
        position: i64,

        /// The sequence length.
        length: i64,
    },

    /// A residue is not an ASCII character.
    NonAsciiResidue {
        /// The 1-based offset of the residue within its sequence.
        position: i64,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NonPositiveCoordinate(value) => {
                write!(f, "coordinates are 1-based but found position {value}")
            }
            Error::StartGreaterThanEnd(start, end) => {
                write!(f, "start ({start}) is greater than end ({end})")
            }
            Error::LengthMismatch { reference, query } => write!(
                f,
                "reference length ({reference}) doesn't match query length ({query})"
            ),
            Error::ResidueCountMismatch { expected, found } => write!(
                f,
                "expected {expected} residues for the segment but found {found}"
            ),
            Error::BeyondSequenceLength { position, length } => write!(
                f,
                "position {position} lies beyond the sequence length ({length})"
            ),
            Error::NonAsciiResidue { position } => {
                write!(f, "residue at position {position} is not an ASCII character")
            }
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Traits
////////////////////////////////////////////////////////////////////////////////////////

/// Anything exposing closed reference bounds.
pub trait ReferenceBounds {
    /// The first reference position covered (inclusive).
    fn ref_start(&self) -> i64;

    /// The last reference position covered (inclusive).
    fn ref_end(&self) -> i64;

    /// The number of reference positions covered.
    fn current_length(&self) -> i64 {
        self.ref_end() - self.ref_start() + 1
    }

    /// Whether the reference bounds of `self` and `other` share at least one
    /// position.
    fn overlaps<O: ReferenceBounds + ?Sized>(&self, other: &O) -> bool {
        self.ref_start().max(other.ref_start()) <= self.ref_end().min(other.ref_end())
    }

    /// Whether `position` falls within the reference bounds.
    fn contains_ref(&self, position: i64) -> bool {
        self.ref_start() <= position && position <= self.ref_end()
    }
}

/// A segment that can be narrowed to a sub-range of its own reference bounds.
///
/// Narrowing produces a fresh value; the receiver is never modified.
pub trait Segment: ReferenceBounds + Clone {
    /// Clamps the segment to the positions shared with `[start, end]`.
    ///
    /// Returns [`None`] when nothing is shared.
    fn clamp_ref(&self, start: i64, end: i64) -> Option<Self>;

    /// The constant that relates reference positions to query positions, if
    /// the segment has a query side.
    fn reference_to_query_offset(&self) -> Option<i64> {
        None
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Reference segments
////////////////////////////////////////////////////////////////////////////////////////

/// A closed interval `[ref_start, ref_end]` on a reference axis.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ReferenceSegment {
    /// The reference start.
    start: i64,

    /// The reference end.
    end: i64,
}

impl ReferenceSegment {
    /// Attempts to create a new [`ReferenceSegment`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::segment::ReferenceBounds as _;
    /// use varscope::segment::ReferenceSegment;
    ///
    /// let segment = ReferenceSegment::try_new(10, 20)?;
    /// assert_eq!(segment.current_length(), 11);
    ///
    /// assert!(ReferenceSegment::try_new(20, 10).is_err());
    /// assert!(ReferenceSegment::try_new(0, 10).is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(start: i64, end: i64) -> Result<Self> {
        if start < 1 {
            return Err(Error::NonPositiveCoordinate(start));
        }

        if start > end {
            return Err(Error::StartGreaterThanEnd(start, end));
        }

        Ok(Self { start, end })
    }

    /// Creates a segment from bounds already known to be valid.
    pub(crate) fn from_bounds(start: i64, end: i64) -> Self {
        debug_assert!(1 <= start && start <= end, "invalid bounds [{start}, {end}]");
        Self { start, end }
    }

    /// Whether `other` begins at the position immediately after `self` ends.
    pub fn abuts(&self, other: &ReferenceSegment) -> bool {
        self.end + 1 == other.start
    }

    /// Joins `self` with an abutting `other`.
    pub fn merged(&self, other: &ReferenceSegment) -> ReferenceSegment {
        Self::from_bounds(self.start.min(other.start), self.end.max(other.end))
    }
}

impl ReferenceBounds for ReferenceSegment {
    fn ref_start(&self) -> i64 {
        self.start
    }

    fn ref_end(&self) -> i64 {
        self.end
    }
}

impl Segment for ReferenceSegment {
    fn clamp_ref(&self, start: i64, end: i64) -> Option<Self> {
        let start = self.start.max(start);
        let end = self.end.min(end);

        (start <= end).then(|| Self::from_bounds(start, end))
    }
}

impl std::fmt::Display for ReferenceSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Query-aligned segments
////////////////////////////////////////////////////////////////////////////////////////

/// The direction in which a query interval runs relative to its reference
/// interval.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Sense {
    /// The query runs in the same direction as the reference.
    Forward,

    /// The query runs against the reference (reverse-complement homology).
    Reverse,
}

impl Sense {
    /// The multiplier applied to a reference position to obtain a query
    /// position.
    fn sign(&self) -> i64 {
        match self {
            Sense::Forward => 1,
            Sense::Reverse => -1,
        }
    }

    /// Composes two senses.
    pub fn then(self, other: Sense) -> Sense {
        match self == other {
            true => Sense::Forward,
            false => Sense::Reverse,
        }
    }
}

/// A reference interval paired with an equal-length query interval.
///
/// The reference interval always runs ascending. The query interval runs
/// ascending for [`Sense::Forward`] homology and descending for
/// [`Sense::Reverse`] homology.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct QueryAlignedSegment {
    /// The reference interval.
    reference: ReferenceSegment,

    /// The query position aligned to the reference start.
    query_start: i64,

    /// The query position aligned to the reference end.
    query_end: i64,
}

impl QueryAlignedSegment {
    /// Attempts to create a new [`QueryAlignedSegment`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::segment::QueryAlignedSegment;
    /// use varscope::segment::Sense;
    ///
    /// let forward = QueryAlignedSegment::try_new(100, 200, 1, 101)?;
    /// assert_eq!(forward.sense(), Sense::Forward);
    /// assert_eq!(forward.reference_to_query_offset(), -99);
    /// assert_eq!(forward.query_at(150), Some(51));
    ///
    /// let reverse = QueryAlignedSegment::try_new(100, 200, 101, 1)?;
    /// assert_eq!(reverse.sense(), Sense::Reverse);
    /// assert_eq!(reverse.query_at(100), Some(101));
    /// assert_eq!(reverse.query_at(200), Some(1));
    ///
    /// assert!(QueryAlignedSegment::try_new(100, 200, 1, 50).is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(ref_start: i64, ref_end: i64, query_start: i64, query_end: i64) -> Result<Self> {
        let reference = ReferenceSegment::try_new(ref_start, ref_end)?;

        if query_start < 1 {
            return Err(Error::NonPositiveCoordinate(query_start));
        }

        if query_end < 1 {
            return Err(Error::NonPositiveCoordinate(query_end));
        }

        if (query_end - query_start).abs() != ref_end - ref_start {
            return Err(Error::LengthMismatch {
                reference: ref_end - ref_start + 1,
                query: (query_end - query_start).abs() + 1,
            });
        }

        Ok(Self {
            reference,
            query_start,
            query_end,
        })
    }

    /// Creates a segment from bounds already known to be consistent.
    pub(crate) fn from_bounds(ref_start: i64, ref_end: i64, query_start: i64, query_end: i64) -> Self {
        debug_assert_eq!((query_end - query_start).abs(), ref_end - ref_start);
        debug_assert!(query_start >= 1 && query_end >= 1);

        Self {
            reference: ReferenceSegment::from_bounds(ref_start, ref_end),
            query_start,
            query_end,
        }
    }

    /// Gets the reference interval.
    pub fn reference(&self) -> &ReferenceSegment {
        &self.reference
    }

    /// Gets the query position aligned to the reference start.
    pub fn query_start(&self) -> i64 {
        self.query_start
    }

    /// Gets the query position aligned to the reference end.
    pub fn query_end(&self) -> i64 {
        self.query_end
    }

    /// The lowest query position covered.
    pub fn query_min(&self) -> i64 {
        self.query_start.min(self.query_end)
    }

    /// The highest query position covered.
    pub fn query_max(&self) -> i64 {
        self.query_start.max(self.query_end)
    }

    /// The direction of the homology.
    pub fn sense(&self) -> Sense {
        match self.query_start <= self.query_end {
            true => Sense::Forward,
            false => Sense::Reverse,
        }
    }

    /// The constant `c` such that `query = sign * reference + c` across the
    /// segment, where `sign` is `1` for forward and `-1` for reverse sense.
    pub fn reference_to_query_offset(&self) -> i64 {
        self.query_start - self.sense().sign() * self.reference.start
    }

    /// The constant `c` such that `reference = sign * query + c` across the
    /// segment.
    pub fn query_to_reference_offset(&self) -> i64 {
        self.reference.start - self.sense().sign() * self.query_start
    }

    /// Maps a reference position to its aligned query position.
    pub fn query_at(&self, ref_position: i64) -> Option<i64> {
        self.reference
            .contains_ref(ref_position)
            .then(|| self.sense().sign() * ref_position + self.reference_to_query_offset())
    }

    /// Maps a query position to its aligned reference position.
    pub fn reference_at(&self, query_position: i64) -> Option<i64> {
        (self.query_min() <= query_position && query_position <= self.query_max())
            .then(|| self.sense().sign() * query_position + self.query_to_reference_offset())
    }

    /// Swaps the roles of the reference and query axes.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::segment::QueryAlignedSegment;
    ///
    /// let segment = QueryAlignedSegment::try_new(10, 19, 40, 31)?;
    /// let inverted = segment.inverted();
    ///
    /// assert_eq!(inverted, QueryAlignedSegment::try_new(31, 40, 19, 10)?);
    /// assert_eq!(inverted.inverted(), segment);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn inverted(&self) -> QueryAlignedSegment {
        match self.sense() {
            Sense::Forward => Self::from_bounds(
                self.query_start,
                self.query_end,
                self.reference.start,
                self.reference.end,
            ),
            Sense::Reverse => Self::from_bounds(
                self.query_end,
                self.query_start,
                self.reference.end,
                self.reference.start,
            ),
        }
    }

    /// Whether `other` continues `self` on both axes with the same sense.
    pub fn abuts_query(&self, other: &QueryAlignedSegment) -> bool {
        if !self.reference.abuts(&other.reference) || self.sense() != other.sense() {
            return false;
        }

        other.query_start == self.query_end + self.sense().sign()
    }

    /// Joins `self` with an abutting `other`.
    pub fn merged(&self, other: &QueryAlignedSegment) -> QueryAlignedSegment {
        Self::from_bounds(
            self.reference.start,
            other.reference.end,
            self.query_start,
            other.query_end,
        )
    }
}

impl ReferenceBounds for QueryAlignedSegment {
    fn ref_start(&self) -> i64 {
        self.reference.start
    }

    fn ref_end(&self) -> i64 {
        self.reference.end
    }
}

impl Segment for QueryAlignedSegment {
    fn clamp_ref(&self, start: i64, end: i64) -> Option<Self> {
        let reference = self.reference.clamp_ref(start, end)?;

        // SAFETY: the clamped bounds fall within the original reference
        // interval, so both positions map onto the query.
        let query_start = self.query_at(reference.start).unwrap();
        let query_end = self.query_at(reference.end).unwrap();

        Some(Self {
            reference,
            query_start,
            query_end,
        })
    }

    fn reference_to_query_offset(&self) -> Option<i64> {
        Some(QueryAlignedSegment::reference_to_query_offset(self))
    }
}

impl PartialOrd for QueryAlignedSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueryAlignedSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.reference
            .cmp(&other.reference)
            .then(self.query_start.cmp(&other.query_start))
            .then(self.query_end.cmp(&other.query_end))
    }
}

impl std::fmt::Display for QueryAlignedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> [{}, {}]",
            self.reference, self.query_start, self.query_end
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_invariant_holds_for_both_senses() -> std::result::Result<(), Box<dyn std::error::Error>> {
        for segment in [
            QueryAlignedSegment::try_new(5, 14, 100, 109)?,
            QueryAlignedSegment::try_new(5, 14, 109, 100)?,
        ] {
            assert_eq!(
                segment.ref_end() - segment.ref_start(),
                (segment.query_end() - segment.query_start()).abs()
            );

            let clamped = segment.clamp_ref(7, 20).unwrap();
            assert_eq!(
                clamped.ref_end() - clamped.ref_start(),
                (clamped.query_end() - clamped.query_start()).abs()
            );
        }

        Ok(())
    }

    #[test]
    fn reverse_segment_maps_positions_both_ways() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let segment = QueryAlignedSegment::try_new(10, 19, 40, 31)?;

        assert_eq!(segment.query_at(10), Some(40));
        assert_eq!(segment.query_at(19), Some(31));
        assert_eq!(segment.query_at(20), None);
        assert_eq!(segment.reference_at(31), Some(19));
        assert_eq!(segment.reference_at(35), Some(15));
        assert_eq!(segment.reference_at(41), None);

        let clamped = segment.clamp_ref(12, 15).unwrap();
        assert_eq!(clamped, QueryAlignedSegment::try_new(12, 15, 38, 35)?);

        Ok(())
    }

    #[test]
    fn clamping_outside_bounds_is_empty() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let segment = ReferenceSegment::try_new(10, 20)?;

        assert_eq!(segment.clamp_ref(21, 30), None);
        assert_eq!(segment.clamp_ref(1, 9), None);
        assert_eq!(segment.clamp_ref(1, 10), Some(ReferenceSegment::try_new(10, 10)?));

        Ok(())
    }

    #[test]
    fn abutting_requires_query_continuity() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let a = QueryAlignedSegment::try_new(1, 5, 11, 15)?;
        let b = QueryAlignedSegment::try_new(6, 8, 16, 18)?;
        let gap = QueryAlignedSegment::try_new(6, 8, 20, 22)?;
        let reversed = QueryAlignedSegment::try_new(6, 8, 18, 16)?;

        assert!(a.abuts_query(&b));
        assert!(!a.abuts_query(&gap));
        assert!(!a.abuts_query(&reversed));
        assert_eq!(a.merged(&b), QueryAlignedSegment::try_new(1, 8, 11, 18)?);

        let c = QueryAlignedSegment::try_new(1, 5, 30, 26)?;
        let d = QueryAlignedSegment::try_new(6, 7, 25, 24)?;
        assert!(c.abuts_query(&d));
        assert_eq!(c.merged(&d), QueryAlignedSegment::try_new(1, 7, 30, 24)?);

        Ok(())
    }

    #[test]
    fn ordering_is_by_start_then_end() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut segments = vec![
            ReferenceSegment::try_new(5, 9)?,
            ReferenceSegment::try_new(1, 10)?,
            ReferenceSegment::try_new(5, 6)?,
        ];
        segments.sort();

        assert_eq!(
            segments,
            vec![
                ReferenceSegment::try_new(1, 10)?,
                ReferenceSegment::try_new(5, 6)?,
                ReferenceSegment::try_new(5, 9)?,
            ]
        );

        Ok(())
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = QueryAlignedSegment::try_new(1, 10, 1, 5).unwrap_err();
        assert_eq!(
            err.to_string(),
            "reference length (10) doesn't match query length (5)"
        );
    }
}
