//! Codon numbering and transcription of codon-aligned segments.
//!
//! Codon numbering is anchored at `codon1_start`, the reference nucleotide
//! that begins codon 1 of a feature. All arithmetic is exact integer
//! arithmetic; positions before `codon1_start` belong to codons numbered zero
//! or below.

use crate::segment::AaReferenceSegment;
use crate::segment::AminoAcid;
use crate::segment::Nucleotide;
use crate::segment::Realized;
use crate::segment::ReferenceBounds;
use crate::segment::ReferenceSegment;
use crate::segment::Segment;

pub mod genetic_code;
pub mod labeled;

pub use genetic_code::GeneticCode;
pub use labeled::CodonLabeler;
pub use labeled::FeatureLocation;
pub use labeled::InsertionCodonLabeler;
pub use labeled::IntegerCodonLabeler;
pub use labeled::LabeledAminoAcid;
pub use labeled::LabeledCodon;
pub use labeled::LabeledCodonTable;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to codon numbering.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// A descendant feature is not in the reading frame of its ancestor.
    FrameMismatch {
        /// The first nucleotide of codon 1 of the ancestor.
        ancestor_codon1_start: i64,

        /// The first nucleotide of codon 1 of the descendant.
        codon1_start: i64,
    },

    /// The feature does not code for amino acids.
    NonCodingFeature {
        /// The reference sequence name.
        reference: String,

        /// The feature name.
        feature: String,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::FrameMismatch {
                ancestor_codon1_start,
                codon1_start,
            } => write!(
                f,
                "codon 1 at {codon1_start} is out of frame with the ancestor's codon 1 at \
                 {ancestor_codon1_start}"
            ),
            Error::NonCodingFeature { reference, feature } => write!(
                f,
                "feature {feature} on reference {reference} does not code for amino acids"
            ),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Numbering
////////////////////////////////////////////////////////////////////////////////////////

/// Gets the codon number that contains `ref_nt`.
///
/// # Examples
///
/// ```
/// use varscope::codon::codon_of;
///
/// assert_eq!(codon_of(10, 10), 1);
/// assert_eq!(codon_of(10, 12), 1);
/// assert_eq!(codon_of(10, 13), 2);
/// assert_eq!(codon_of(10, 9), 0);
/// assert_eq!(codon_of(10, 7), 0);
/// assert_eq!(codon_of(10, 6), -1);
/// ```
pub fn codon_of(codon1_start: i64, ref_nt: i64) -> i64 {
    (ref_nt - codon1_start).div_euclid(3) + 1
}

/// Gets the first reference nucleotide of `codon`.
pub fn nt_of(codon1_start: i64, codon: i64) -> i64 {
    codon1_start + (codon - 1) * 3
}

/// Whether `ref_nt` begins a codon.
pub fn is_codon_start(codon1_start: i64, ref_nt: i64) -> bool {
    (ref_nt - codon1_start).rem_euclid(3) == 0
}

/// Trims every segment to whole codons.
///
/// Leading nucleotides before the first codon boundary and trailing
/// nucleotides after the last complete codon are discarded (never rounded
/// outward). Segments left with no complete codon are dropped. Among segments
/// with a query side, the reading frame is fixed by the first surviving
/// segment: any later segment whose reference-to-query offset differs from it
/// by other than a multiple of three is dropped whole.
///
/// # Examples
///
/// ```
/// use varscope::codon::truncate_to_codon_aligned;
/// use varscope::segment::ReferenceSegment;
///
/// let segments = vec![ReferenceSegment::try_new(11, 21)?];
///
/// assert_eq!(
///     truncate_to_codon_aligned(10, &segments),
///     vec![ReferenceSegment::try_new(13, 21)?]
/// );
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn truncate_to_codon_aligned<S: Segment>(codon1_start: i64, segments: &[S]) -> Vec<S> {
    let mut frame = None;
    let mut results = Vec::with_capacity(segments.len());

    for segment in segments {
        let start = segment.ref_start() + (codon1_start - segment.ref_start()).rem_euclid(3);
        let end = segment.ref_end() - (segment.ref_end() - codon1_start - 2).rem_euclid(3);

        if start > end {
            continue;
        }

        let trimmed = match segment.clamp_ref(start, end) {
            Some(trimmed) => trimmed,
            None => continue,
        };

        if let Some(offset) = trimmed.reference_to_query_offset() {
            match frame {
                None => frame = Some(offset),
                Some(frame) if (offset - frame).rem_euclid(3) != 0 => continue,
                Some(_) => {}
            }
        }

        results.push(trimmed);
    }

    results
}

////////////////////////////////////////////////////////////////////////////////////////
// Transcription
////////////////////////////////////////////////////////////////////////////////////////

/// Transcribes nucleotide-realized segments into amino-acid-realized
/// segments.
///
/// The segments are first trimmed with [`truncate_to_codon_aligned()`].
///
/// # Examples
///
/// ```
/// use varscope::codon::GeneticCode;
/// use varscope::codon::transcribe;
/// use varscope::segment::NtQueryAlignedSegment;
/// use varscope::segment::QueryAlignedSegment;
///
/// let code = GeneticCode::standard();
/// let segment = QueryAlignedSegment::try_new(10, 21, 1, 12)?;
/// let realized = NtQueryAlignedSegment::try_new(segment, "ATGAAACTGTAA")?;
///
/// let amino_acids = transcribe(&code, 10, &[realized]);
/// assert_eq!(amino_acids.len(), 1);
/// assert_eq!(amino_acids[0].residues(), "MKL*");
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn transcribe<S>(
    code: &GeneticCode,
    codon1_start: i64,
    segments: &[Realized<S, Nucleotide>],
) -> Vec<Realized<S, AminoAcid>>
where
    S: Segment,
{
    truncate_to_codon_aligned(codon1_start, segments)
        .into_iter()
        .map(|segment| {
            let amino_acids = code.translate(segment.residues());
            let (segment, _) = segment.into_parts();
            Realized::from_parts(segment, amino_acids)
        })
        .collect()
}

////////////////////////////////////////////////////////////////////////////////////////
// ORF descendants
////////////////////////////////////////////////////////////////////////////////////////

/// A feature that is a sub-region of an already transcribed open reading
/// frame.
///
/// The descendant reuses the ancestor's amino acids; its codon numbers differ
/// from the ancestor's by a constant shift.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OrfDescendant {
    /// The first nucleotide of codon 1 of the ancestor.
    ancestor_codon1_start: i64,

    /// The first nucleotide of codon 1 of the descendant.
    codon1_start: i64,
}

impl OrfDescendant {
    /// Attempts to create a new [`OrfDescendant`].
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::codon::OrfDescendant;
    ///
    /// let descendant = OrfDescendant::try_new(100, 160)?;
    /// assert_eq!(descendant.codon_shift(), 20);
    /// assert_eq!(descendant.descendant_codon(21), 1);
    ///
    /// assert!(OrfDescendant::try_new(100, 161).is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(ancestor_codon1_start: i64, codon1_start: i64) -> Result<Self> {
        if (codon1_start - ancestor_codon1_start).rem_euclid(3) != 0 {
            return Err(Error::FrameMismatch {
                ancestor_codon1_start,
                codon1_start,
            });
        }

        Ok(Self {
            ancestor_codon1_start,
            codon1_start,
        })
    }

    /// Gets the first nucleotide of codon 1 of the descendant.
    pub fn codon1_start(&self) -> i64 {
        self.codon1_start
    }

    /// The number of ancestor codons preceding descendant codon 1.
    pub fn codon_shift(&self) -> i64 {
        (self.codon1_start - self.ancestor_codon1_start) / 3
    }

    /// Converts an ancestor codon number into the descendant's numbering.
    pub fn descendant_codon(&self, ancestor_codon: i64) -> i64 {
        ancestor_codon - self.codon_shift()
    }

    /// Converts a descendant codon number into the ancestor's numbering.
    pub fn ancestor_codon(&self, descendant_codon: i64) -> i64 {
        descendant_codon + self.codon_shift()
    }

    /// Restricts the ancestor's amino acids to the descendant's region.
    pub fn amino_acids<S>(
        &self,
        ancestor: &[Realized<S, AminoAcid>],
        region: &[ReferenceSegment],
    ) -> Vec<Realized<S, AminoAcid>>
    where
        S: Segment,
    {
        let mut results = Vec::new();

        for segment in ancestor {
            for window in region {
                if !segment.overlaps(window) {
                    continue;
                }

                if let Some(narrowed) =
                    segment.codon_sub_segment(window.ref_start(), window.ref_end())
                {
                    results.push(narrowed);
                }
            }
        }

        results
    }
}

/// Transcribes reference-realized nucleotides directly, as for a reference
/// sequence's own feature.
pub fn transcribe_reference(
    code: &GeneticCode,
    codon1_start: i64,
    segments: &[Realized<ReferenceSegment, Nucleotide>],
) -> Vec<AaReferenceSegment> {
    transcribe(code, codon1_start, segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::NtQueryAlignedSegment;
    use crate::segment::NtReferenceSegment;
    use crate::segment::QueryAlignedSegment;

    fn rs(start: i64, end: i64) -> ReferenceSegment {
        ReferenceSegment::try_new(start, end).unwrap()
    }

    #[test]
    fn codon_numbers_round_trip() {
        for codon1_start in [1, 2, 3, 10, 250] {
            for ref_nt in -20..400 {
                let codon = codon_of(codon1_start, ref_nt);
                assert!(nt_of(codon1_start, codon) <= ref_nt);
                assert!(ref_nt < nt_of(codon1_start, codon + 1));
            }
        }
    }

    #[test]
    fn in_frame_segment_is_kept_whole() {
        let kept = truncate_to_codon_aligned(10, &[rs(10, 21)]);
        assert_eq!(kept, vec![rs(10, 21)]);
        assert_eq!(codon_of(10, kept[0].ref_start()), 1);
        assert_eq!(codon_of(10, kept[0].ref_end()), 4);
    }

    #[test]
    fn partial_leading_codon_is_dropped() {
        // With codon 1 at 10, position 12 is the last base of codon 1, so the
        // first whole codon starts at 13, not 12.
        let kept = truncate_to_codon_aligned(10, &[rs(11, 21)]);
        assert_eq!(kept, vec![rs(13, 21)]);
        assert_eq!(codon_of(10, 13), 2);
    }

    #[test]
    fn partial_trailing_codon_is_dropped() {
        assert_eq!(truncate_to_codon_aligned(10, &[rs(10, 20)]), vec![rs(10, 18)]);
        assert!(truncate_to_codon_aligned(10, &[rs(11, 14)]).is_empty());
    }

    #[test]
    fn truncation_is_idempotent() {
        let segments = vec![
            QueryAlignedSegment::try_new(5, 30, 1, 26).unwrap(),
            QueryAlignedSegment::try_new(32, 47, 28, 43).unwrap(),
            QueryAlignedSegment::try_new(50, 70, 45, 65).unwrap(),
        ];

        let once = truncate_to_codon_aligned(4, &segments);
        let twice = truncate_to_codon_aligned(4, &once);

        assert_eq!(once, twice);
    }

    #[test]
    fn out_of_frame_segments_are_dropped_whole() {
        let segments = vec![
            // offset -9
            QueryAlignedSegment::try_new(10, 21, 1, 12).unwrap(),
            // offset -8: out of frame
            QueryAlignedSegment::try_new(22, 33, 14, 25).unwrap(),
            // offset -6: back in frame
            QueryAlignedSegment::try_new(34, 45, 28, 39).unwrap(),
        ];

        let kept = truncate_to_codon_aligned(10, &segments);
        assert_eq!(kept, vec![segments[0], segments[2]]);
    }

    #[test]
    fn transcribes_codons_one_to_four() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let code = GeneticCode::standard();
        let segment = NtReferenceSegment::try_new(rs(10, 21), "ATGGCCAAATTT")?;

        let amino_acids = transcribe_reference(&code, 10, &[segment]);
        assert_eq!(amino_acids.len(), 1);
        assert_eq!(amino_acids[0].residues(), "MAKF");
        assert_eq!(amino_acids[0].ref_start(), 10);
        assert_eq!(amino_acids[0].ref_end(), 21);

        let shifted = NtReferenceSegment::try_new(rs(11, 21), "TGGCCAAATTT")?;
        let amino_acids = transcribe_reference(&code, 10, &[shifted]);
        assert_eq!(amino_acids[0].residues(), "AKF");
        assert_eq!(amino_acids[0].ref_start(), 13);

        Ok(())
    }

    #[test]
    fn descendant_reuses_ancestor_amino_acids() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let code = GeneticCode::standard();
        let segment = QueryAlignedSegment::try_new(1, 18, 101, 118)?;
        let realized = NtQueryAlignedSegment::try_new(segment, "ATGAAACTGGGGCCCTAA")?;
        let ancestor = transcribe(&code, 1, &[realized]);

        let descendant = OrfDescendant::try_new(1, 7)?;
        let amino_acids = descendant.amino_acids(&ancestor, &[rs(7, 15)]);

        assert_eq!(amino_acids.len(), 1);
        assert_eq!(amino_acids[0].residues(), "LGP");
        assert_eq!(amino_acids[0].segment().query_start(), 107);
        assert_eq!(descendant.descendant_codon(codon_of(1, 7)), 1);

        Ok(())
    }

    #[test]
    fn out_of_frame_descendant_is_rejected() {
        assert_eq!(
            OrfDescendant::try_new(1, 8).unwrap_err(),
            Error::FrameMismatch {
                ancestor_codon1_start: 1,
                codon1_start: 8,
            }
        );
    }
}
