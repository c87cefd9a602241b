//! Match results and their tabular form.
//!
//! Each kind of match declares its own fixed column set, so a table of
//! results is only well formed when every row is of one kind.

use crate::variation::Error;
use crate::variation::Result;
use crate::variation::TranslationFormat;
use crate::variation::VariationScanResult;

/// The kind of a [`MatchResult`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MatchKind {
    /// A nucleotide match.
    Nucleotide,

    /// An amino-acid match.
    AminoAcid,
}

impl MatchKind {
    /// The columns of a table of this kind of match.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            MatchKind::Nucleotide => NucleotideMatch::COLUMNS,
            MatchKind::AminoAcid => AminoAcidMatch::COLUMNS,
        }
    }
}

impl From<TranslationFormat> for MatchKind {
    fn from(format: TranslationFormat) -> Self {
        match format {
            TranslationFormat::Nucleotide => MatchKind::Nucleotide,
            TranslationFormat::AminoAcid => MatchKind::AminoAcid,
        }
    }
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Nucleotide => write!(f, "nucleotide"),
            MatchKind::AminoAcid => write!(f, "amino acid"),
        }
    }
}

/// Formats an optional query position, leaving unaligned positions blank.
fn optional(position: Option<i64>) -> String {
    position.map(|p| p.to_string()).unwrap_or_default()
}

/// A single match of a nucleotide pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NucleotideMatch {
    /// The first reference nucleotide of the match.
    ref_start: i64,

    /// The last reference nucleotide of the match.
    ref_end: i64,

    /// The query nucleotide aligned to `ref_start`.
    query_start: Option<i64>,

    /// The query nucleotide aligned to `ref_end`.
    query_end: Option<i64>,

    /// The matched nucleotides.
    matched: String,
}

impl NucleotideMatch {
    /// The columns of a nucleotide match.
    pub const COLUMNS: &'static [&'static str] =
        &["refNtStart", "refNtEnd", "queryNtStart", "queryNtEnd", "matchedNts"];

    pub(crate) fn new(
        ref_start: i64,
        ref_end: i64,
        query_start: Option<i64>,
        query_end: Option<i64>,
        matched: &str,
    ) -> Self {
        Self {
            ref_start,
            ref_end,
            query_start,
            query_end,
            matched: matched.to_string(),
        }
    }

    /// Gets the first reference nucleotide.
    pub fn ref_start(&self) -> i64 {
        self.ref_start
    }

    /// Gets the last reference nucleotide.
    pub fn ref_end(&self) -> i64 {
        self.ref_end
    }

    /// Gets the query nucleotide aligned to the first reference nucleotide.
    pub fn query_start(&self) -> Option<i64> {
        self.query_start
    }

    /// Gets the query nucleotide aligned to the last reference nucleotide.
    pub fn query_end(&self) -> Option<i64> {
        self.query_end
    }

    /// Gets the matched nucleotides.
    pub fn matched(&self) -> &str {
        &self.matched
    }
}

/// A single match of an amino-acid pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AminoAcidMatch {
    /// The first reference nucleotide of the first matched codon.
    ref_start: i64,

    /// The last reference nucleotide of the last matched codon.
    ref_end: i64,

    /// The query nucleotide aligned to `ref_start`.
    query_start: Option<i64>,

    /// The query nucleotide aligned to `ref_end`.
    query_end: Option<i64>,

    /// The matched amino acids.
    matched: String,
}

impl AminoAcidMatch {
    /// The columns of an amino-acid match.
    pub const COLUMNS: &'static [&'static str] = &[
        "refNtStart",
        "refNtEnd",
        "queryNtStart",
        "queryNtEnd",
        "matchedAas",
    ];

    pub(crate) fn new(
        ref_start: i64,
        ref_end: i64,
        query_start: Option<i64>,
        query_end: Option<i64>,
        matched: &str,
    ) -> Self {
        Self {
            ref_start,
            ref_end,
            query_start,
            query_end,
            matched: matched.to_string(),
        }
    }

    /// Gets the first reference nucleotide.
    pub fn ref_start(&self) -> i64 {
        self.ref_start
    }

    /// Gets the last reference nucleotide.
    pub fn ref_end(&self) -> i64 {
        self.ref_end
    }

    /// Gets the query nucleotide aligned to the first reference nucleotide.
    pub fn query_start(&self) -> Option<i64> {
        self.query_start
    }

    /// Gets the query nucleotide aligned to the last reference nucleotide.
    pub fn query_end(&self) -> Option<i64> {
        self.query_end
    }

    /// Gets the matched amino acids.
    pub fn matched(&self) -> &str {
        &self.matched
    }
}

/// A match of a variation's pattern.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MatchResult {
    /// A nucleotide match.
    Nucleotide(NucleotideMatch),

    /// An amino-acid match.
    AminoAcid(AminoAcidMatch),
}

impl MatchResult {
    /// Gets the kind of the match.
    pub fn kind(&self) -> MatchKind {
        match self {
            MatchResult::Nucleotide(_) => MatchKind::Nucleotide,
            MatchResult::AminoAcid(_) => MatchKind::AminoAcid,
        }
    }

    /// The values of the match, in the order of its kind's columns.
    pub fn values(&self) -> Vec<String> {
        match self {
            MatchResult::Nucleotide(m) => vec![
                m.ref_start.to_string(),
                m.ref_end.to_string(),
                optional(m.query_start),
                optional(m.query_end),
                m.matched.clone(),
            ],
            MatchResult::AminoAcid(m) => vec![
                m.ref_start.to_string(),
                m.ref_end.to_string(),
                optional(m.query_start),
                optional(m.query_end),
                m.matched.clone(),
            ],
        }
    }
}

/// Rows of match results that share one kind, labeled by variation.
#[derive(Clone, Debug)]
pub struct MatchResultTable {
    /// The kind of every row.
    kind: MatchKind,

    /// The variation name and match of each row.
    rows: Vec<(String, MatchResult)>,
}

impl MatchResultTable {
    /// The columns that precede the match columns.
    pub const LEADING_COLUMNS: &'static [&'static str] = &["variationName"];

    /// Attempts to tabulate the matches of `results`.
    ///
    /// Every result's variation must share the format of `kind`; a mix of
    /// formats is rejected before any row is built.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::variation::MatchKind;
    /// use varscope::variation::MatchResultTable;
    ///
    /// let table = MatchResultTable::try_new(MatchKind::AminoAcid, &[])?;
    /// assert_eq!(table.columns().last(), Some(&String::from("matchedAas")));
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_new(kind: MatchKind, results: &[VariationScanResult]) -> Result<Self> {
        if let Some(found) = results
            .iter()
            .map(|result| MatchKind::from(result.variation().format()))
            .find(|found| *found != kind)
        {
            return Err(Error::MixedMatchKinds {
                expected: kind,
                found,
            });
        }

        let rows = results
            .iter()
            .flat_map(|result| {
                result
                    .match_results()
                    .iter()
                    .map(|m| (result.variation().name().to_string(), m.clone()))
            })
            .collect();

        Ok(Self { kind, rows })
    }

    /// Gets the kind of every row.
    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Gets the column names.
    pub fn columns(&self) -> Vec<String> {
        Self::LEADING_COLUMNS
            .iter()
            .chain(self.kind.columns())
            .map(|column| column.to_string())
            .collect()
    }

    /// Gets the rows, each with one value per column.
    pub fn rows(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        self.rows.iter().map(|(name, m)| {
            let mut row = vec![name.clone()];
            row.extend(m.values());
            row
        })
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::NtQueryAlignedSegment;
    use crate::segment::QueryAlignedSegment;
    use crate::variation::scan_nucleotides;
    use crate::variation::Variation;

    fn scanned(format: TranslationFormat) -> VariationScanResult {
        let variation = Variation::try_new("REF", "E1", "V", 1, 6, format, "A").unwrap();

        match format {
            TranslationFormat::Nucleotide => {
                let segment = QueryAlignedSegment::try_new(1, 6, 1, 6).unwrap();
                let realized = NtQueryAlignedSegment::try_new(segment, "CCACCA").unwrap();
                scan_nucleotides(&variation, &[realized]).unwrap()
            }
            TranslationFormat::AminoAcid => VariationScanResult::insufficient(&variation),
        }
    }

    #[test]
    fn rows_line_up_with_columns() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let table = MatchResultTable::try_new(
            MatchKind::Nucleotide,
            &[scanned(TranslationFormat::Nucleotide)],
        )?;

        let columns = table.columns();
        let rows = table.rows().collect::<Vec<_>>();

        assert_eq!(columns.len(), 6);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == columns.len()));
        assert_eq!(rows[0], vec!["V", "3", "3", "3", "3", "A"]);

        Ok(())
    }

    #[test]
    fn mixed_kinds_are_rejected() {
        let err = MatchResultTable::try_new(
            MatchKind::Nucleotide,
            &[
                scanned(TranslationFormat::Nucleotide),
                scanned(TranslationFormat::AminoAcid),
            ],
        )
        .unwrap_err();

        assert!(matches!(
            err,
            Error::MixedMatchKinds {
                expected: MatchKind::Nucleotide,
                found: MatchKind::AminoAcid,
            }
        ));
    }
}
