//! Segments that carry the nucleotides or amino acids found along them.
//!
//! Residues are always stored in reference order, so residue `i` belongs to
//! reference position `ref_start + i` (nucleotides) or to the codon starting
//! at `ref_start + 3 * i` (amino acids). Once constructed, a realized segment
//! owns its residues independently of the sequence they were copied from.

use std::marker::PhantomData;

use crate::segment::Error;
use crate::segment::QueryAlignedSegment;
use crate::segment::ReferenceBounds;
use crate::segment::ReferenceSegment;
use crate::segment::Segment;
use crate::segment::Sense;

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

/// The kind of residue carried by a [`Realized`] segment.
pub trait Residues {
    /// How many reference nucleotides a single residue spans.
    const NTS_PER_RESIDUE: i64;
}

/// Marker for nucleotide residues.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Nucleotide;

impl Residues for Nucleotide {
    const NTS_PER_RESIDUE: i64 = 1;
}

/// Marker for amino-acid residues.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct AminoAcid;

impl Residues for AminoAcid {
    const NTS_PER_RESIDUE: i64 = 3;
}

/// A segment paired with the residues found along its reference interval.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Realized<S, K> {
    /// The underlying segment.
    segment: S,

    /// The residues in reference order.
    residues: String,

    /// The residue kind.
    kind: PhantomData<K>,
}

/// A reference interval carrying nucleotides.
pub type NtReferenceSegment = Realized<ReferenceSegment, Nucleotide>;

/// A query-aligned segment carrying the query's nucleotides.
pub type NtQueryAlignedSegment = Realized<QueryAlignedSegment, Nucleotide>;

/// A codon-aligned reference interval carrying amino acids.
pub type AaReferenceSegment = Realized<ReferenceSegment, AminoAcid>;

/// A codon-aligned query-aligned segment carrying the query's amino acids.
pub type AaQueryAlignedSegment = Realized<QueryAlignedSegment, AminoAcid>;

impl<S, K> Realized<S, K>
where
    S: ReferenceBounds,
    K: Residues,
{
    /// Attempts to create a new realized segment.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::segment::AaReferenceSegment;
    /// use varscope::segment::NtQueryAlignedSegment;
    /// use varscope::segment::QueryAlignedSegment;
    /// use varscope::segment::ReferenceSegment;
    ///
    /// let segment = QueryAlignedSegment::try_new(1, 4, 11, 14)?;
    /// NtQueryAlignedSegment::try_new(segment, "ACGT")?;
    ///
    /// let codons = ReferenceSegment::try_new(13, 18)?;
    /// AaReferenceSegment::try_new(codons, "ML")?;
    /// assert!(AaReferenceSegment::try_new(codons, "MLK").is_err());
    /// assert!(AaReferenceSegment::try_new(codons, "Mé").is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(segment: S, residues: impl Into<String>) -> Result<Self> {
        let residues = residues.into();
        let length = segment.current_length();

        ensure_ascii(residues.as_bytes(), 1)?;

        if length % K::NTS_PER_RESIDUE != 0
            || residues.len() as i64 * K::NTS_PER_RESIDUE != length
        {
            return Err(Error::ResidueCountMismatch {
                expected: length / K::NTS_PER_RESIDUE,
                found: residues.len(),
            });
        }

        Ok(Self {
            segment,
            residues,
            kind: PhantomData,
        })
    }

    /// Creates a realized segment whose residue count is already known to
    /// match.
    pub(crate) fn from_parts(segment: S, residues: String) -> Self {
        debug_assert_eq!(
            residues.len() as i64 * K::NTS_PER_RESIDUE,
            segment.current_length()
        );

        Self {
            segment,
            residues,
            kind: PhantomData,
        }
    }

    /// Gets the underlying segment.
    pub fn segment(&self) -> &S {
        &self.segment
    }

    /// Gets the residues in reference order.
    pub fn residues(&self) -> &str {
        &self.residues
    }

    /// Consumes `self` and returns the segment and its residues.
    pub fn into_parts(self) -> (S, String) {
        (self.segment, self.residues)
    }
}

impl<S, K> ReferenceBounds for Realized<S, K>
where
    S: ReferenceBounds,
{
    fn ref_start(&self) -> i64 {
        self.segment.ref_start()
    }

    fn ref_end(&self) -> i64 {
        self.segment.ref_end()
    }
}

impl<S> Segment for Realized<S, Nucleotide>
where
    S: Segment,
{
    fn clamp_ref(&self, start: i64, end: i64) -> Option<Self> {
        let segment = self.segment.clamp_ref(start, end)?;
        let from = (segment.ref_start() - self.ref_start()) as usize;
        let to = from + segment.current_length() as usize;

        Some(Self::from_parts(segment, self.residues[from..to].to_string()))
    }

    fn reference_to_query_offset(&self) -> Option<i64> {
        self.segment.reference_to_query_offset()
    }
}

impl<S> Realized<S, Nucleotide>
where
    S: Segment,
{
    /// Joins `self` with an `other` segment that continues it, where `join`
    /// merges the underlying segments.
    pub fn merged_with(&self, other: &Self, join: impl Fn(&S, &S) -> S) -> Self {
        let mut residues = self.residues.clone();
        residues.push_str(&other.residues);
        Self::from_parts(join(&self.segment, &other.segment), residues)
    }
}

impl NtQueryAlignedSegment {
    /// Realizes a segment against the full query sequence `query`, whose
    /// first character is query position 1.
    ///
    /// Reverse-sense segments receive the reverse complement of the query
    /// interval so that residues remain in reference order.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::segment::NtQueryAlignedSegment;
    /// use varscope::segment::QueryAlignedSegment;
    ///
    /// let query = "AACCGGTT";
    ///
    /// let forward = QueryAlignedSegment::try_new(101, 104, 3, 6)?;
    /// let realized = NtQueryAlignedSegment::realize(forward, query)?;
    /// assert_eq!(realized.residues(), "CCGG");
    ///
    /// let reverse = QueryAlignedSegment::try_new(101, 103, 3, 1)?;
    /// let realized = NtQueryAlignedSegment::realize(reverse, query)?;
    /// assert_eq!(realized.residues(), "GTT");
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn realize(segment: QueryAlignedSegment, query: &str) -> Result<Self> {
        let length = query.len() as i64;

        if segment.query_max() > length {
            return Err(Error::BeyondSequenceLength {
                position: segment.query_max(),
                length,
            });
        }

        let (from, to) = ((segment.query_min() - 1) as usize, segment.query_max() as usize);
        ensure_ascii(&query.as_bytes()[from..to], segment.query_min())?;

        // Both ends border ASCII bytes, so both are character boundaries.
        let slice = &query[from..to];
        let residues = match segment.sense() {
            Sense::Forward => slice.to_string(),
            Sense::Reverse => reverse_complement(slice),
        };

        Ok(Self::from_parts(segment, residues))
    }
}

impl<S> Realized<S, AminoAcid>
where
    S: Segment,
{
    /// Narrows the segment to the whole codons that fall within
    /// `[start, end]`.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::segment::AaReferenceSegment;
    /// use varscope::segment::ReferenceBounds as _;
    /// use varscope::segment::ReferenceSegment;
    ///
    /// let segment = AaReferenceSegment::try_new(ReferenceSegment::try_new(10, 21)?, "MKLV")?;
    ///
    /// let narrowed = segment.codon_sub_segment(12, 20).unwrap();
    /// assert_eq!(narrowed.ref_start(), 13);
    /// assert_eq!(narrowed.ref_end(), 18);
    /// assert_eq!(narrowed.residues(), "KL");
    ///
    /// assert!(segment.codon_sub_segment(11, 14).is_none());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn codon_sub_segment(&self, start: i64, end: i64) -> Option<Self> {
        let origin = self.ref_start();
        let start = start.max(origin);
        let end = end.min(self.ref_end());

        let first_codon = (start - origin + 2).div_euclid(3);
        let end_codon = (end - origin + 1).div_euclid(3);

        if first_codon >= end_codon {
            return None;
        }

        let segment = self
            .segment
            .clamp_ref(origin + first_codon * 3, origin + end_codon * 3 - 1)?;
        let residues = self.residues[first_codon as usize..end_codon as usize].to_string();

        Some(Self::from_parts(segment, residues))
    }
}

/// Fails at the first byte of `residues` that is not ASCII, where the first
/// byte sits at `first_position`.
fn ensure_ascii(residues: &[u8], first_position: i64) -> Result<()> {
    match residues.iter().position(|byte| !byte.is_ascii()) {
        Some(offset) => Err(Error::NonAsciiResidue {
            position: first_position + offset as i64,
        }),
        None => Ok(()),
    }
}

/// Complements a single IUPAC nucleotide, preserving case.
pub fn complement(nucleotide: char) -> char {
    match nucleotide {
        'A' => 'T',
        'T' | 'U' => 'A',
        'C' => 'G',
        'G' => 'C',
        'R' => 'Y',
        'Y' => 'R',
        'K' => 'M',
        'M' => 'K',
        'B' => 'V',
        'V' => 'B',
        'D' => 'H',
        'H' => 'D',
        'a' => 't',
        't' | 'u' => 'a',
        'c' => 'g',
        'g' => 'c',
        'r' => 'y',
        'y' => 'r',
        'k' => 'm',
        'm' => 'k',
        'b' => 'v',
        'v' => 'b',
        'd' => 'h',
        'h' => 'd',
        other => other,
    }
}

/// Reverse complements a nucleotide string.
pub fn reverse_complement(nucleotides: &str) -> String {
    nucleotides.chars().rev().map(complement).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_nucleotides_slices_residues() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let segment = QueryAlignedSegment::try_new(10, 17, 1, 8)?;
        let realized = NtQueryAlignedSegment::try_new(segment, "ACGTACGT")?;

        let clamped = realized.clamp_ref(12, 14).unwrap();
        assert_eq!(clamped.residues(), "GTA");
        assert_eq!(clamped.segment(), &QueryAlignedSegment::try_new(12, 14, 3, 5)?);

        assert!(realized.clamp_ref(20, 30).is_none());

        Ok(())
    }

    #[test]
    fn merging_concatenates_residues() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let a = NtReferenceSegment::try_new(ReferenceSegment::try_new(1, 3)?, "ACG")?;
        let b = NtReferenceSegment::try_new(ReferenceSegment::try_new(4, 5)?, "TT")?;

        let merged = a.merged_with(&b, ReferenceSegment::merged);
        assert_eq!(merged.residues(), "ACGTT");
        assert_eq!(merged.segment(), &ReferenceSegment::try_new(1, 5)?);

        Ok(())
    }

    #[test]
    fn realizing_beyond_the_query_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let segment = QueryAlignedSegment::try_new(1, 5, 4, 8)?;
        let err = NtQueryAlignedSegment::realize(segment, "ACGTAC").unwrap_err();

        assert_eq!(err, Error::BeyondSequenceLength { position: 8, length: 6 });

        Ok(())
    }

    #[test]
    fn non_ascii_query_bytes_are_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        // U+00E9 spans query bytes 2 and 3.
        let query = "AéCG";

        let spanning = QueryAlignedSegment::try_new(1, 2, 2, 3)?;
        let err = NtQueryAlignedSegment::realize(spanning, query).unwrap_err();
        assert_eq!(err, Error::NonAsciiResidue { position: 2 });

        let after = QueryAlignedSegment::try_new(1, 2, 4, 5)?;
        assert_eq!(NtQueryAlignedSegment::realize(after, query)?.residues(), "CG");

        Ok(())
    }

    #[test]
    fn reverse_complement_handles_ambiguity_codes() {
        assert_eq!(reverse_complement("ACGTRYN"), "NRYACGT");
        assert_eq!(reverse_complement("acgu"), "acgt");
    }
}
