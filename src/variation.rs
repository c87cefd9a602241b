//! Variations and their reference-level scanning.
//!
//! A variation is a regular expression anchored to a reference interval. It
//! is scanned against the nucleotides (or amino acids) a query carries over
//! that interval using substring search, never a full match. A query whose
//! segments leave any position of the interval uncovered has insufficient
//! coverage: it is neither present nor confirmed absent.

use std::collections::HashMap;

use regex::Regex;
use rust_lapper as lapper;

use crate::codon;
use crate::codon::GeneticCode;
use crate::segment::algebra::covers;
use crate::segment::algebra::sort_by_ref_start;
use crate::segment::AaQueryAlignedSegment;
use crate::segment::realized::Residues;
use crate::segment::NtQueryAlignedSegment;
use crate::segment::QueryAlignedSegment;
use crate::segment::Realized;
use crate::segment::ReferenceBounds;
use crate::segment::ReferenceSegment;
use crate::segment::Segment;

pub mod result;

pub use result::AminoAcidMatch;
pub use result::MatchKind;
pub use result::MatchResult;
pub use result::MatchResultTable;
pub use result::NucleotideMatch;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to a [`Variation`].
#[derive(Debug)]
pub enum Error {
    /// The pattern is not a valid regular expression.
    InvalidPattern {
        /// The variation name.
        name: String,

        /// The error from the regular expression compiler.
        source: Box<regex::Error>,
    },

    /// The interval of the variation is invalid.
    InvalidInterval {
        /// The variation name.
        name: String,

        /// The interval error.
        source: crate::segment::Error,
    },

    /// A variation was scanned in the wrong translation format.
    WrongFormat {
        /// The variation name.
        name: String,

        /// The format of the variation.
        expected: TranslationFormat,
    },

    /// An amino-acid variation was scanned without a reading frame.
    MissingReadingFrame(String),

    /// Results of different kinds were combined.
    MixedMatchKinds {
        /// The kind established first.
        expected: MatchKind,

        /// The kind encountered afterwards.
        found: MatchKind,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidPattern { name, source } => {
                write!(f, "variation {name}: invalid pattern: {source}")
            }
            Error::InvalidInterval { name, source } => {
                write!(f, "variation {name}: invalid interval: {source}")
            }
            Error::WrongFormat { name, expected } => write!(
                f,
                "variation {name} must be scanned as {expected}"
            ),
            Error::MissingReadingFrame(name) => write!(
                f,
                "variation {name} is an amino acid variation on a feature with no codon 1"
            ),
            Error::MixedMatchKinds { expected, found } => write!(
                f,
                "cannot combine {found} match results with {expected} match results"
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidPattern { source, .. } => Some(source.as_ref()),
            Error::InvalidInterval { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Variations
////////////////////////////////////////////////////////////////////////////////////////

/// The residues a variation's pattern is written in.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TranslationFormat {
    /// Nucleotides.
    Nucleotide,

    /// Amino acids.
    AminoAcid,
}

impl std::fmt::Display for TranslationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslationFormat::Nucleotide => write!(f, "NUCLEOTIDE"),
            TranslationFormat::AminoAcid => write!(f, "AMINO_ACID"),
        }
    }
}

/// A named pattern scanned for at a fixed reference interval.
#[derive(Clone, Debug)]
pub struct Variation {
    /// The reference sequence name.
    reference_name: String,

    /// The feature name.
    feature_name: String,

    /// The variation name.
    name: String,

    /// The reference interval.
    interval: ReferenceSegment,

    /// The translation format.
    format: TranslationFormat,

    /// The compiled pattern.
    pattern: Regex,
}

impl Variation {
    /// Attempts to create a new [`Variation`], compiling its pattern.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::variation::TranslationFormat;
    /// use varscope::variation::Variation;
    ///
    /// let variation = Variation::try_new("REF", "NS5B", "S282T", 50, 52, TranslationFormat::AminoAcid, "T")?;
    /// assert_eq!(variation.name(), "S282T");
    ///
    /// assert!(Variation::try_new("REF", "NS5B", "BAD", 50, 52, TranslationFormat::AminoAcid, "(").is_err());
    /// assert!(Variation::try_new("REF", "NS5B", "BAD", 52, 50, TranslationFormat::AminoAcid, "T").is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(
        reference_name: impl Into<String>,
        feature_name: impl Into<String>,
        name: impl Into<String>,
        ref_start: i64,
        ref_end: i64,
        format: TranslationFormat,
        pattern: &str,
    ) -> Result<Self> {
        let name = name.into();

        let interval = ReferenceSegment::try_new(ref_start, ref_end).map_err(|source| {
            Error::InvalidInterval {
                name: name.clone(),
                source,
            }
        })?;

        let pattern = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            name: name.clone(),
            source: Box::new(source),
        })?;

        Ok(Self {
            reference_name: reference_name.into(),
            feature_name: feature_name.into(),
            name,
            interval,
            format,
            pattern,
        })
    }

    /// Gets the reference sequence name.
    pub fn reference_name(&self) -> &str {
        &self.reference_name
    }

    /// Gets the feature name.
    pub fn feature_name(&self) -> &str {
        &self.feature_name
    }

    /// Gets the variation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the reference interval.
    pub fn interval(&self) -> &ReferenceSegment {
        &self.interval
    }

    /// Gets the first reference nucleotide.
    pub fn ref_start(&self) -> i64 {
        self.interval.ref_start()
    }

    /// Gets the last reference nucleotide.
    pub fn ref_end(&self) -> i64 {
        self.interval.ref_end()
    }

    /// Gets the translation format.
    pub fn format(&self) -> TranslationFormat {
        self.format
    }

    /// Gets the compiled pattern.
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Whether the pattern occurs anywhere in `candidate`.
    pub fn is_match(&self, candidate: &str) -> bool {
        self.pattern.is_match(candidate)
    }

    /// Fails unless the variation is written in `format`.
    fn require_format(&self, format: TranslationFormat) -> Result<()> {
        if self.format != format {
            return Err(Error::WrongFormat {
                name: self.name.clone(),
                expected: self.format,
            });
        }

        Ok(())
    }
}

/// The outcome of scanning one query for one variation.
#[derive(Clone, Debug)]
pub struct VariationScanResult {
    /// The variation.
    variation: Variation,

    /// Whether the pattern was found.
    present: bool,

    /// Whether the query covers the full variation interval.
    sufficient_coverage: bool,

    /// The individual matches.
    match_results: Vec<MatchResult>,
}

impl VariationScanResult {
    /// A result for a query that does not cover the variation interval.
    fn insufficient(variation: &Variation) -> Self {
        Self {
            variation: variation.clone(),
            present: false,
            sufficient_coverage: false,
            match_results: Vec::new(),
        }
    }

    /// Gets the variation.
    pub fn variation(&self) -> &Variation {
        &self.variation
    }

    /// Whether the pattern was found.
    pub fn present(&self) -> bool {
        self.present
    }

    /// Whether the pattern is confirmed absent.
    pub fn absent(&self) -> bool {
        self.sufficient_coverage && !self.present
    }

    /// Whether the query covers the full variation interval.
    pub fn sufficient_coverage(&self) -> bool {
        self.sufficient_coverage
    }

    /// Gets the individual matches.
    pub fn match_results(&self) -> &[MatchResult] {
        &self.match_results
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Scanning
////////////////////////////////////////////////////////////////////////////////////////

/// Scans nucleotide-realized segments for a nucleotide variation.
///
/// # Examples
///
/// ```
/// use varscope::segment::NtQueryAlignedSegment;
/// use varscope::segment::QueryAlignedSegment;
/// use varscope::variation;
/// use varscope::variation::TranslationFormat;
/// use varscope::variation::Variation;
///
/// let variation = Variation::try_new("REF", "5UTR", "G3A", 3, 5, TranslationFormat::Nucleotide, "A")?;
/// let segment = QueryAlignedSegment::try_new(1, 8, 11, 18)?;
/// let realized = NtQueryAlignedSegment::try_new(segment, "CCTAGGTT")?;
///
/// let result = variation::scan_nucleotides(&variation, &[realized])?;
/// assert!(result.present());
/// assert_eq!(result.match_results().len(), 1);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn scan_nucleotides(
    variation: &Variation,
    segments: &[NtQueryAlignedSegment],
) -> Result<VariationScanResult> {
    variation.require_format(TranslationFormat::Nucleotide)?;

    let (start, end) = (variation.ref_start(), variation.ref_end());
    let mut covering = segments
        .iter()
        .filter_map(|segment| segment.clamp_ref(start, end))
        .collect::<Vec<_>>();
    sort_by_ref_start(&mut covering);

    if !covers(&covering, start, end) {
        return Ok(VariationScanResult::insufficient(variation));
    }

    let candidate = covering
        .iter()
        .map(|segment| segment.residues())
        .collect::<String>();

    let match_results = variation
        .pattern()
        .find_iter(&candidate)
        .map(|found| {
            let ref_start = start + found.start() as i64;
            let ref_end = start + found.end() as i64 - 1;

            MatchResult::Nucleotide(NucleotideMatch::new(
                ref_start,
                ref_end,
                query_position(&covering, ref_start),
                query_position(&covering, ref_end),
                found.as_str(),
            ))
        })
        .collect::<Vec<_>>();

    Ok(VariationScanResult {
        variation: variation.clone(),
        present: !match_results.is_empty(),
        sufficient_coverage: true,
        match_results,
    })
}

/// Scans amino-acid-realized segments for an amino-acid variation.
///
/// The variation interval is covered only when whole codons span every
/// nucleotide of it; an interval cut by a partial codon has insufficient
/// coverage.
pub fn scan_amino_acids(
    variation: &Variation,
    segments: &[AaQueryAlignedSegment],
) -> Result<VariationScanResult> {
    variation.require_format(TranslationFormat::AminoAcid)?;

    let (start, end) = (variation.ref_start(), variation.ref_end());
    let mut covering = segments
        .iter()
        .filter(|segment| segment.overlaps(variation.interval()))
        .filter_map(|segment| segment.codon_sub_segment(start, end))
        .collect::<Vec<_>>();
    covering.sort_by_key(|segment| segment.ref_start());

    let contiguous = covering
        .windows(2)
        .all(|pair| pair[0].ref_end() + 1 == pair[1].ref_start());

    let sufficient = contiguous
        && covering.first().map(|s| s.ref_start()) == Some(start)
        && covering.last().map(|s| s.ref_end()) == Some(end);

    if !sufficient {
        return Ok(VariationScanResult::insufficient(variation));
    }

    let candidate = covering
        .iter()
        .map(|segment| segment.residues())
        .collect::<String>();

    let match_results = variation
        .pattern()
        .find_iter(&candidate)
        .map(|found| {
            let ref_start = start + 3 * found.start() as i64;
            let ref_end = start + 3 * found.end() as i64 - 1;

            MatchResult::AminoAcid(AminoAcidMatch::new(
                ref_start,
                ref_end,
                query_position(&covering, ref_start),
                query_position(&covering, ref_end),
                found.as_str(),
            ))
        })
        .collect::<Vec<_>>();

    Ok(VariationScanResult {
        variation: variation.clone(),
        present: !match_results.is_empty(),
        sufficient_coverage: true,
        match_results,
    })
}

/// Scans a query's nucleotides for a variation of either format.
///
/// Amino-acid variations are transcribed from `segments` using
/// `codon1_start`, which must then be present.
pub fn scan(
    variation: &Variation,
    code: &GeneticCode,
    codon1_start: Option<i64>,
    segments: &[NtQueryAlignedSegment],
) -> Result<VariationScanResult> {
    match variation.format() {
        TranslationFormat::Nucleotide => scan_nucleotides(variation, segments),
        TranslationFormat::AminoAcid => {
            let codon1_start = codon1_start
                .ok_or_else(|| Error::MissingReadingFrame(variation.name().to_string()))?;
            let amino_acids = codon::transcribe(code, codon1_start, segments);
            scan_amino_acids(variation, &amino_acids)
        }
    }
}

/// Scans a query for every variation, transcribing at most once.
pub fn scan_all<'a>(
    variations: impl IntoIterator<Item = &'a Variation>,
    code: &GeneticCode,
    codon1_start: Option<i64>,
    segments: &[NtQueryAlignedSegment],
) -> Result<Vec<VariationScanResult>> {
    let mut amino_acids = None;

    variations
        .into_iter()
        .map(|variation| match variation.format() {
            TranslationFormat::Nucleotide => scan_nucleotides(variation, segments),
            TranslationFormat::AminoAcid => {
                let codon1_start = codon1_start
                    .ok_or_else(|| Error::MissingReadingFrame(variation.name().to_string()))?;
                let amino_acids = amino_acids
                    .get_or_insert_with(|| codon::transcribe(code, codon1_start, segments));
                scan_amino_acids(variation, amino_acids)
            }
        })
        .collect()
}

/// The query position aligned to `ref_position`.
fn query_position<K: Residues>(
    segments: &[Realized<QueryAlignedSegment, K>],
    ref_position: i64,
) -> Option<i64> {
    segments
        .iter()
        .find_map(|segment| segment.segment().query_at(ref_position))
}

////////////////////////////////////////////////////////////////////////////////////////
// Index
////////////////////////////////////////////////////////////////////////////////////////

/// Variations indexed by reference interval for fast overlap lookup.
#[derive(Debug)]
pub struct VariationIndex {
    /// The variations.
    variations: Vec<Variation>,

    /// An interval tree per reference name, holding indices into
    /// `variations`.
    inner: HashMap<String, lapper::Lapper<u64, usize>>,
}

impl VariationIndex {
    /// Creates a new index.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::variation::TranslationFormat;
    /// use varscope::variation::Variation;
    /// use varscope::variation::VariationIndex;
    ///
    /// let index = VariationIndex::new(vec![
    ///     Variation::try_new("REF", "NS3", "A", 10, 12, TranslationFormat::AminoAcid, "Q")?,
    ///     Variation::try_new("REF", "NS3", "B", 40, 42, TranslationFormat::AminoAcid, "K")?,
    /// ]);
    ///
    /// let names = index.overlapping("REF", 12, 30).map(|v| v.name()).collect::<Vec<_>>();
    /// assert_eq!(names, vec!["A"]);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(variations: Vec<Variation>) -> Self {
        let mut intervals = HashMap::<String, Vec<lapper::Interval<u64, usize>>>::new();

        for (i, variation) in variations.iter().enumerate() {
            intervals
                .entry(variation.reference_name().to_string())
                .or_default()
                .push(lapper::Interval {
                    start: variation.ref_start() as u64,
                    stop: variation.ref_end() as u64 + 1,
                    val: i,
                });
        }

        let inner = intervals
            .into_iter()
            .map(|(reference, intervals)| (reference, lapper::Lapper::new(intervals)))
            .collect();

        Self { variations, inner }
    }

    /// Iterates the variations on `reference` that share at least one
    /// position with `[start, end]`, in the order they were added.
    pub fn overlapping<'a>(
        &'a self,
        reference: &str,
        start: i64,
        end: i64,
    ) -> impl Iterator<Item = &'a Variation> + 'a {
        let mut found = match (self.inner.get(reference), start <= end && end >= 1) {
            (Some(lapper), true) => lapper
                .find(start.max(1) as u64, end as u64 + 1)
                .map(|interval| interval.val)
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        };

        found.sort_unstable();
        found.into_iter().map(move |i| &self.variations[i])
    }

    /// Gets all variations.
    pub fn variations(&self) -> &[Variation] {
        &self.variations
    }

    /// The number of variations.
    pub fn len(&self) -> usize {
        self.variations.len()
    }

    /// Whether the index holds no variations.
    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realized(rs: i64, re: i64, qs: i64, qe: i64, residues: &str) -> NtQueryAlignedSegment {
        NtQueryAlignedSegment::try_new(QueryAlignedSegment::try_new(rs, re, qs, qe).unwrap(), residues)
            .unwrap()
    }

    /// A read covering `[1, end]` whose codon at 50-52 (codon 17 from 2) is
    /// CTG.
    fn read_covering(end: i64) -> NtQueryAlignedSegment {
        let mut nts = "A".repeat(end as usize);
        if end >= 52 {
            nts.replace_range(49..52, "CTG");
        } else {
            nts.replace_range(49..end as usize, &"CTG"[..(end - 49) as usize]);
        }

        realized(1, end, 1, end, &nts)
    }

    #[test]
    fn amino_acid_variation_is_present() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let variation =
            Variation::try_new("REF", "NS5A", "L17", 50, 52, TranslationFormat::AminoAcid, "L")?;
        let code = GeneticCode::standard();

        let result = scan(&variation, &code, Some(2), &[read_covering(100)])?;

        assert!(result.present());
        assert!(result.sufficient_coverage());
        assert!(!result.absent());

        match &result.match_results()[0] {
            MatchResult::AminoAcid(found) => {
                assert_eq!(found.ref_start(), 50);
                assert_eq!(found.ref_end(), 52);
                assert_eq!(found.query_start(), Some(50));
                assert_eq!(found.query_end(), Some(52));
                assert_eq!(found.matched(), "L");
            }
            other => panic!("unexpected match: {other:?}"),
        }

        Ok(())
    }

    #[test]
    fn partial_codon_is_insufficient_coverage() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let variation =
            Variation::try_new("REF", "NS5A", "L17", 50, 52, TranslationFormat::AminoAcid, "L")?;
        let code = GeneticCode::standard();

        let result = scan(&variation, &code, Some(2), &[read_covering(51)])?;

        assert!(!result.present());
        assert!(!result.absent());
        assert!(!result.sufficient_coverage());
        assert!(result.match_results().is_empty());

        Ok(())
    }

    #[test]
    fn confirmed_absence_needs_full_coverage() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let variation =
            Variation::try_new("REF", "NS5A", "K17", 50, 52, TranslationFormat::AminoAcid, "K")?;
        let code = GeneticCode::standard();

        let result = scan(&variation, &code, Some(2), &[read_covering(100)])?;
        assert!(result.absent());

        let gapped = [realized(1, 50, 1, 50, &"A".repeat(50)), realized(52, 60, 51, 59, &"A".repeat(9))];
        let nucleotide =
            Variation::try_new("REF", "NS5A", "A51", 49, 53, TranslationFormat::Nucleotide, "A")?;
        assert!(!scan_nucleotides(&nucleotide, &gapped)?.sufficient_coverage());

        Ok(())
    }

    #[test]
    fn every_nucleotide_match_is_reported() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let variation =
            Variation::try_new("REF", "E2", "TA", 1, 10, TranslationFormat::Nucleotide, "TA")?;
        let segments = [realized(1, 10, 10, 1, "GTACCTAGGG")];

        let result = scan_nucleotides(&variation, &segments)?;
        let matches = result
            .match_results()
            .iter()
            .map(|m| match m {
                MatchResult::Nucleotide(found) => (found.ref_start(), found.query_start()),
                other => panic!("unexpected match: {other:?}"),
            })
            .collect::<Vec<_>>();

        assert_eq!(matches, vec![(2, Some(9)), (6, Some(5))]);

        Ok(())
    }

    #[test]
    fn wrong_format_is_rejected() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let variation =
            Variation::try_new("REF", "NS5A", "L17", 50, 52, TranslationFormat::AminoAcid, "L")?;
        let code = GeneticCode::standard();

        assert!(matches!(
            scan_nucleotides(&variation, &[]),
            Err(Error::WrongFormat { .. })
        ));
        assert!(matches!(
            scan(&variation, &code, None, &[]),
            Err(Error::MissingReadingFrame(_))
        ));

        Ok(())
    }

    #[test]
    fn scanning_everything_transcribes_once() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let variations = vec![
            Variation::try_new("REF", "NS5A", "L17", 50, 52, TranslationFormat::AminoAcid, "L")?,
            Variation::try_new("REF", "NS5A", "CTG", 50, 52, TranslationFormat::Nucleotide, "CTG")?,
            Variation::try_new("REF", "NS5A", "K17", 50, 52, TranslationFormat::AminoAcid, "K")?,
        ];

        let results = scan_all(&variations, &GeneticCode::standard(), Some(2), &[read_covering(100)])?;
        let present = results.iter().map(|r| r.present()).collect::<Vec<_>>();

        assert_eq!(present, vec![true, true, false]);

        Ok(())
    }

    #[test]
    fn index_finds_overlaps_per_reference() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let index = VariationIndex::new(vec![
            Variation::try_new("R1", "F", "A", 10, 12, TranslationFormat::Nucleotide, "A")?,
            Variation::try_new("R2", "F", "B", 10, 12, TranslationFormat::Nucleotide, "A")?,
            Variation::try_new("R1", "F", "C", 13, 15, TranslationFormat::Nucleotide, "A")?,
        ]);

        let names = |start, end| {
            index
                .overlapping("R1", start, end)
                .map(|v| v.name().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(names(1, 9), Vec::<String>::new());
        assert_eq!(names(12, 12), vec!["A"]);
        assert_eq!(names(12, 13), vec!["A", "C"]);
        assert_eq!(names(16, 30), Vec::<String>::new());
        assert!(index.overlapping("R3", 1, 100).next().is_none());

        Ok(())
    }
}
