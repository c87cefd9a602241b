//! Read-level variation presence counting.
//!
//! Every read (or merged mate pair) that covers a variation's full interval
//! with bases passing the quality filters is classified as present or
//! absent. Reads that cover only part of the interval are not counted.

use std::collections::BTreeMap;

use crate::codon::GeneticCode;
use crate::config::ReadAnalysisConfig;
use crate::reads::tiebreak::merge_calls;
use crate::reads::Call;
use crate::reads::Error;
use crate::reads::Fragment;
use crate::reads::MappedRead;
use crate::reads::ReadMapper;
use crate::reads::Reducer;
use crate::reads::Result;
use crate::segment::ReferenceBounds;
use crate::variation;
use crate::variation::TranslationFormat;
use crate::variation::Variation;
use crate::variation::VariationIndex;

/// The reads confirming a variation present or absent.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PresenceCounts {
    /// The reads in which the variation is present.
    present: u64,

    /// The reads in which the variation is confirmed absent.
    absent: u64,
}

impl PresenceCounts {
    /// Gets the number of reads in which the variation is present.
    pub fn present(&self) -> u64 {
        self.present
    }

    /// Gets the number of reads in which the variation is confirmed absent.
    pub fn absent(&self) -> u64 {
        self.absent
    }

    /// The number of reads classified either way.
    pub fn depth(&self) -> u64 {
        self.present + self.absent
    }

    /// The percentage of classified reads in which the variation is present.
    pub fn percent_present(&self) -> f64 {
        match self.depth() {
            0 => 0.0,
            depth => 100.0 * self.present as f64 / depth as f64,
        }
    }
}

/// Presence counts keyed by variation name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VariationCounts(BTreeMap<String, PresenceCounts>);

impl VariationCounts {
    /// Gets the counts for the variation named `name`.
    pub fn get(&self, name: &str) -> Option<&PresenceCounts> {
        self.0.get(name)
    }

    /// The `(name, counts)` rows classified by at least the configured
    /// minimum depth of reads.
    pub fn rows(&self, config: &ReadAnalysisConfig) -> Vec<(&str, PresenceCounts)> {
        self.0
            .iter()
            .filter(|(_, counts)| counts.depth() >= config.min_depth())
            .map(|(name, counts)| (name.as_str(), *counts))
            .collect()
    }
}

/// Counts, per variation, the reads in which it is present or absent.
#[derive(Debug)]
pub struct VariationReducer {
    /// The mapper.
    mapper: ReadMapper,

    /// The name of the target reference.
    reference: String,

    /// The variations to scan for.
    variations: VariationIndex,

    /// The genetic code.
    code: GeneticCode,

    /// The first nucleotide of codon 1 on the target reference, if any.
    codon1_start: Option<i64>,
}

impl VariationReducer {
    /// Attempts to create a new [`VariationReducer`].
    ///
    /// Amino-acid variations need a `codon1_start`; a missing one is
    /// rejected here rather than partway through the reads.
    pub fn try_new(
        mapper: ReadMapper,
        reference: impl Into<String>,
        variations: Vec<Variation>,
        code: GeneticCode,
        codon1_start: Option<i64>,
    ) -> Result<Self> {
        if codon1_start.is_none() {
            if let Some(variation) = variations
                .iter()
                .find(|variation| variation.format() == TranslationFormat::AminoAcid)
            {
                return Err(Error::Variation(variation::Error::MissingReadingFrame(
                    variation.name().to_string(),
                )));
            }
        }

        Ok(Self {
            mapper,
            reference: reference.into(),
            variations: VariationIndex::new(variations),
            code,
            codon1_start,
        })
    }

    /// Classifies a read against every variation it fully covers, with the
    /// lowest base quality over each variation's interval.
    fn calls(&self, read: &MappedRead) -> Result<BTreeMap<String, Call<bool>>> {
        let mut calls = BTreeMap::new();

        let segments = self.mapper.realized_segments(read);
        let bases = self.mapper.aligned_bases(read);

        let (Some(start), Some(end)) = (
            segments.iter().map(|s| s.ref_start()).min(),
            segments.iter().map(|s| s.ref_end()).max(),
        ) else {
            return Ok(calls);
        };

        let results = variation::scan_all(
            self.variations.overlapping(&self.reference, start, end),
            &self.code,
            self.codon1_start,
            &segments,
        )
        .map_err(Error::Variation)?;

        for result in results {
            if !result.sufficient_coverage() {
                continue;
            }

            let variation = result.variation();
            let quality = (variation.ref_start()..=variation.ref_end())
                .map(|position| bases.get(&position).map(|call| call.quality()))
                .collect::<Option<Vec<_>>>()
                .and_then(|qualities| qualities.into_iter().min());

            if let Some(quality) = quality {
                calls.insert(
                    variation.name().to_string(),
                    Call::new(result.present(), quality),
                );
            }
        }

        Ok(calls)
    }
}

impl Reducer for VariationReducer {
    type Partial = VariationCounts;

    fn observe(&self, partial: &mut VariationCounts, fragment: &Fragment) -> Result<()> {
        let calls = match fragment {
            Fragment::Single(read) => self.calls(read)?,
            Fragment::Pair(first, second) => merge_calls(
                self.calls(first)?,
                self.calls(second)?,
                first.mapping_quality(),
                second.mapping_quality(),
                first.name(),
            ),
        };

        for (name, call) in calls {
            let counts = partial.0.entry(name).or_default();

            match call.into_value() {
                true => counts.present += 1,
                false => counts.absent += 1,
            }
        }

        Ok(())
    }

    fn reduce(&self, mut a: VariationCounts, b: VariationCounts) -> VariationCounts {
        for (name, counts) in b.0 {
            let mine = a.0.entry(name).or_default();
            mine.present += counts.present;
            mine.absent += counts.absent;
        }

        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::shard;
    use crate::reads::tests::read;
    use crate::reads::CancellationToken;

    /// A read of `length` bases from position 1 carrying `codon` at 50-52.
    fn read_with_codon(name: &str, length: usize, codon: &str, quality: u8) -> MappedRead {
        let mut sequence = "A".repeat(length);
        let end = length.min(52);
        sequence.replace_range(49..end, &codon[..end - 49]);
        read(name, &sequence, quality, 1)
    }

    fn reducer() -> VariationReducer {
        let config = ReadAnalysisConfig::builder().min_q_score(15).try_build().unwrap();
        let variations = vec![
            Variation::try_new("REF", "NS5A", "L17", 50, 52, TranslationFormat::AminoAcid, "L").unwrap(),
        ];

        VariationReducer::try_new(
            ReadMapper::identity(200, &config),
            "REF",
            variations,
            GeneticCode::standard(),
            Some(2),
        )
        .unwrap()
    }

    #[test]
    fn reads_are_classified_by_coverage() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let reads = vec![
            read_with_codon("present", 100, "CTG", 30),
            read_with_codon("absent", 100, "AAA", 30),
            read_with_codon("partial", 51, "CTG", 30),
            read_with_codon("low-quality", 100, "CTG", 10),
        ];

        let config = ReadAnalysisConfig::builder().shards(3).try_build()?;
        let counts = shard::run(&reads, &reducer(), &config, &CancellationToken::default())?;
        let l17 = counts.get("L17").unwrap();

        assert_eq!((l17.present(), l17.absent()), (1, 1));
        assert_eq!(l17.percent_present(), 50.0);
        assert_eq!(counts.rows(&config).len(), 1);

        let deeper = ReadAnalysisConfig::builder().min_depth(3).try_build()?;
        assert_eq!(counts.rows(&deeper).len(), 0);

        Ok(())
    }

    #[test]
    fn mates_disagreeing_are_counted_once() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let first = read_with_codon("r1", 100, "CTG", 30).with_pairing(true, false);
        let second = read_with_codon("r1", 100, "AAA", 20).with_pairing(false, true);

        let reducer = reducer();
        let mut counts = VariationCounts::default();
        reducer.observe(&mut counts, &Fragment::Pair(first, second))?;

        assert_eq!(counts.get("L17").map(|c| (c.present(), c.absent())), Some((1, 0)));

        Ok(())
    }

    #[test]
    fn amino_acid_variations_need_a_reading_frame() {
        let config = ReadAnalysisConfig::default();
        let variations = vec![
            Variation::try_new("REF", "NS5A", "L17", 50, 52, TranslationFormat::AminoAcid, "L").unwrap(),
        ];

        let result = VariationReducer::try_new(
            ReadMapper::identity(200, &config),
            "REF",
            variations,
            GeneticCode::standard(),
            None,
        );

        assert!(matches!(result, Err(Error::Variation(_))));
    }
}
