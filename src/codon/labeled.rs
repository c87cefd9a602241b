//! Human-facing codon numbering for feature locations.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::debug;

use crate::codon::codon_of;
use crate::codon::is_codon_start;
use crate::codon::Error;
use crate::codon::Result;
use crate::pipeline;
use crate::pipeline::FeatureProvider;
use crate::segment::algebra::sort_by_ref_start;
use crate::segment::AaQueryAlignedSegment;
use crate::segment::QueryAlignedSegment;
use crate::segment::ReferenceBounds;
use crate::segment::ReferenceSegment;

////////////////////////////////////////////////////////////////////////////////////////
// Labeled codons
////////////////////////////////////////////////////////////////////////////////////////

/// A codon on a reference sequence tagged with its label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabeledCodon {
    /// The feature name.
    feature: String,

    /// The label.
    label: String,

    /// The first reference nucleotide.
    nt_start: i64,

    /// The last reference nucleotide.
    nt_end: i64,

    /// The position of the codon in transcription order.
    transcription_index: usize,
}

impl LabeledCodon {
    /// Gets the feature name.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Gets the label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Gets the first reference nucleotide.
    pub fn nt_start(&self) -> i64 {
        self.nt_start
    }

    /// Gets the last reference nucleotide.
    pub fn nt_end(&self) -> i64 {
        self.nt_end
    }

    /// Gets the position of the codon in transcription order.
    pub fn transcription_index(&self) -> usize {
        self.transcription_index
    }
}

/// The labeled codons of a feature location, ordered by reference position.
#[derive(Clone, Debug, Default)]
pub struct LabeledCodonTable {
    /// The codons sorted by `nt_start`.
    codons: Vec<LabeledCodon>,

    /// Indices into `codons` keyed by label.
    by_label: HashMap<String, usize>,
}

impl LabeledCodonTable {
    /// Creates a table from codons in any order.
    pub fn new(mut codons: Vec<LabeledCodon>) -> Self {
        codons.sort_by_key(|codon| codon.nt_start);

        let by_label = codons
            .iter()
            .enumerate()
            .map(|(i, codon)| (codon.label.clone(), i))
            .collect();

        Self { codons, by_label }
    }

    /// Gets the codon beginning at `nt_start`.
    pub fn get(&self, nt_start: i64) -> Option<&LabeledCodon> {
        self.codons
            .binary_search_by_key(&nt_start, |codon| codon.nt_start)
            .ok()
            .map(|i| &self.codons[i])
    }

    /// Gets the codon containing the reference nucleotide `nt`.
    pub fn containing(&self, nt: i64) -> Option<&LabeledCodon> {
        let i = self.codons.partition_point(|codon| codon.nt_start <= nt);
        let codon = self.codons.get(i.checked_sub(1)?)?;
        (nt <= codon.nt_end).then_some(codon)
    }

    /// Gets the codon with `label`.
    pub fn by_label(&self, label: &str) -> Option<&LabeledCodon> {
        self.by_label.get(label).map(|i| &self.codons[*i])
    }

    /// Iterates the codons by reference position.
    pub fn iter(&self) -> impl Iterator<Item = &LabeledCodon> {
        self.codons.iter()
    }

    /// The number of codons.
    pub fn len(&self) -> usize {
        self.codons.len()
    }

    /// Whether the table holds no codons.
    pub fn is_empty(&self) -> bool {
        self.codons.is_empty()
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Labelers
////////////////////////////////////////////////////////////////////////////////////////

/// Assigns labels to the codons of a feature location.
pub trait CodonLabeler: std::fmt::Debug + Send + Sync {
    /// Labels each codon beginning at the reference positions `nt_starts`,
    /// which are sorted and in frame with `codon1_start`.
    fn labels(&self, codon1_start: i64, nt_starts: &[i64]) -> Vec<String>;
}

/// Labels codons with their integer codon number.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntegerCodonLabeler;

impl CodonLabeler for IntegerCodonLabeler {
    fn labels(&self, codon1_start: i64, nt_starts: &[i64]) -> Vec<String> {
        nt_starts
            .iter()
            .map(|nt| codon_of(codon1_start, *nt).to_string())
            .collect()
    }
}

/// Labels codons with the codon number of the homologous codon on a master
/// reference.
///
/// Codons that do not begin at a master codon boundary are insertions
/// relative to the master: they take the label of the preceding codon with a
/// letter suffix (`98a`, `98b`, ...), or `0` with a suffix when nothing
/// precedes them.
#[derive(Clone, Debug)]
pub struct InsertionCodonLabeler {
    /// The first nucleotide of codon 1 on the master reference.
    master_codon1_start: i64,

    /// Segments relating the master (reference axis) to the labeled
    /// reference (query axis).
    segments: Vec<QueryAlignedSegment>,
}

impl InsertionCodonLabeler {
    /// Creates a new [`InsertionCodonLabeler`].
    pub fn new(master_codon1_start: i64, mut segments: Vec<QueryAlignedSegment>) -> Self {
        sort_by_ref_start(&mut segments);

        Self {
            master_codon1_start,
            segments,
        }
    }

    /// Gets the master position homologous to `nt` on the labeled reference.
    fn master_position(&self, nt: i64) -> Option<i64> {
        self.segments
            .iter()
            .find_map(|segment| segment.reference_at(nt))
    }
}

impl CodonLabeler for InsertionCodonLabeler {
    fn labels(&self, _: i64, nt_starts: &[i64]) -> Vec<String> {
        let mut previous = String::from("0");
        let mut inserted = 0;

        nt_starts
            .iter()
            .map(|nt| match self.master_position(*nt) {
                Some(master) if is_codon_start(self.master_codon1_start, master) => {
                    previous = codon_of(self.master_codon1_start, master).to_string();
                    inserted = 0;
                    previous.clone()
                }
                _ => {
                    inserted += 1;
                    format!("{previous}{}", insertion_suffix(inserted))
                }
            })
            .collect()
    }
}

/// The bijective base-26 suffix for the `n`th inserted codon (`a`, ..., `z`,
/// `aa`, ...).
fn insertion_suffix(mut n: usize) -> String {
    let mut suffix = Vec::new();

    while n > 0 {
        n -= 1;
        suffix.push(b'a' + (n % 26) as u8);
        n /= 26;
    }

    suffix.reverse();
    String::from_utf8_lossy(&suffix).into_owned()
}

////////////////////////////////////////////////////////////////////////////////////////
// Feature locations
////////////////////////////////////////////////////////////////////////////////////////

/// An amino acid tagged with the labeled codon it was translated from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LabeledAminoAcid {
    /// The labeled codon on the reference.
    codon: LabeledCodon,

    /// The amino acid.
    amino_acid: char,

    /// The first query nucleotide of the codon.
    query_nt_start: i64,
}

impl LabeledAminoAcid {
    /// Gets the labeled codon.
    pub fn codon(&self) -> &LabeledCodon {
        &self.codon
    }

    /// Gets the amino acid.
    pub fn amino_acid(&self) -> char {
        self.amino_acid
    }

    /// Gets the first query nucleotide of the codon.
    pub fn query_nt_start(&self) -> i64 {
        self.query_nt_start
    }
}

/// A feature placed on a reference sequence.
///
/// The labeled codon table is built at most once, on first request, and is
/// shared read-only afterwards, including across threads.
#[derive(Debug)]
pub struct FeatureLocation {
    /// The reference sequence name.
    reference: String,

    /// The feature name.
    feature: String,

    /// The reference segments, sorted by start.
    segments: Vec<ReferenceSegment>,

    /// The first nucleotide of codon 1, if the feature codes amino acids.
    codon1_start: Option<i64>,

    /// The labeler.
    labeler: Box<dyn CodonLabeler>,

    /// The labeled codons.
    labeled_codons: OnceLock<LabeledCodonTable>,
}

impl FeatureLocation {
    /// Creates a new feature location labeled with integer codon numbers.
    pub fn new(
        reference: impl Into<String>,
        feature: impl Into<String>,
        mut segments: Vec<ReferenceSegment>,
        codon1_start: Option<i64>,
    ) -> Self {
        sort_by_ref_start(&mut segments);

        Self {
            reference: reference.into(),
            feature: feature.into(),
            segments,
            codon1_start,
            labeler: Box::new(IntegerCodonLabeler),
            labeled_codons: OnceLock::new(),
        }
    }

    /// Loads a feature location from a provider.
    pub fn load<F: FeatureProvider>(
        features: &F,
        reference: &str,
        feature: &str,
    ) -> pipeline::Result<Self> {
        let segments = features.feature_segments(reference, feature)?;
        let codon1_start = features.codon1_start(reference, feature)?;
        Ok(Self::new(reference, feature, segments, codon1_start))
    }

    /// Replaces the labeler.
    pub fn with_labeler(mut self, labeler: impl CodonLabeler + 'static) -> Self {
        self.labeler = Box::new(labeler);
        self.labeled_codons = OnceLock::new();
        self
    }

    /// Gets the reference sequence name.
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Gets the feature name.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    /// Gets the reference segments.
    pub fn segments(&self) -> &[ReferenceSegment] {
        &self.segments
    }

    /// Gets the first nucleotide of codon 1.
    pub fn codon1_start(&self) -> Option<i64> {
        self.codon1_start
    }

    /// Gets the first nucleotide of codon 1, failing for non-coding features.
    pub fn require_codon1_start(&self) -> Result<i64> {
        self.codon1_start.ok_or_else(|| Error::NonCodingFeature {
            reference: self.reference.clone(),
            feature: self.feature.clone(),
        })
    }

    /// Gets the labeled codons, building them on first use.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::codon::FeatureLocation;
    /// use varscope::segment::ReferenceSegment;
    ///
    /// let location = FeatureLocation::new("REF", "NS3", vec![ReferenceSegment::try_new(10, 21)?], Some(10));
    /// let codons = location.labeled_codons()?;
    ///
    /// assert_eq!(codons.len(), 4);
    /// assert_eq!(codons.containing(17).unwrap().label(), "3");
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn labeled_codons(&self) -> Result<&LabeledCodonTable> {
        let codon1_start = self.require_codon1_start()?;
        Ok(self
            .labeled_codons
            .get_or_init(|| self.build_labeled_codons(codon1_start)))
    }

    /// Labels the amino acids of codon-aligned query segments.
    ///
    /// Amino acids whose codon is not part of this feature location are
    /// skipped.
    pub fn label_amino_acids(
        &self,
        segments: &[AaQueryAlignedSegment],
    ) -> Result<Vec<LabeledAminoAcid>> {
        let table = self.labeled_codons()?;
        let mut results = Vec::new();

        for segment in segments {
            for (i, amino_acid) in segment.residues().chars().enumerate() {
                let nt = segment.ref_start() + 3 * i as i64;

                let codon = match table.get(nt) {
                    Some(codon) => codon,
                    None => continue,
                };

                let query_nt_start = match segment.segment().query_at(nt) {
                    Some(query) => query,
                    None => continue,
                };

                results.push(LabeledAminoAcid {
                    codon: codon.clone(),
                    amino_acid,
                    query_nt_start,
                });
            }
        }

        Ok(results)
    }

    /// Builds the labeled codon table.
    ///
    /// Codon starts are every in-frame position within the segments; a codon
    /// cut short by the end of a segment keeps its shortened end.
    fn build_labeled_codons(&self, codon1_start: i64) -> LabeledCodonTable {
        let mut bounds = Vec::new();

        for segment in &self.segments {
            let mut nt = segment.ref_start() + (codon1_start - segment.ref_start()).rem_euclid(3);

            while nt <= segment.ref_end() {
                bounds.push((nt, (nt + 2).min(segment.ref_end())));
                nt += 3;
            }
        }

        let starts = bounds.iter().map(|(start, _)| *start).collect::<Vec<_>>();
        let labels = self.labeler.labels(codon1_start, &starts);

        debug!(
            reference = self.reference.as_str(),
            feature = self.feature.as_str(),
            codons = bounds.len(),
            "built labeled codon table"
        );

        LabeledCodonTable::new(
            bounds
                .into_iter()
                .zip(labels)
                .enumerate()
                .map(|(transcription_index, ((nt_start, nt_end), label))| LabeledCodon {
                    feature: self.feature.clone(),
                    label,
                    nt_start,
                    nt_end,
                    transcription_index,
                })
                .collect(),
        )
    }
}
