//! Per-codon amino-acid and triplet pileups.

use std::collections::BTreeMap;

use crate::config::ReadAnalysisConfig;
use crate::codon::FeatureLocation;
use crate::codon::GeneticCode;
use crate::codon::LabeledCodon;
use crate::reads::tiebreak::merge_calls;
use crate::reads::AlignedBase;
use crate::reads::Call;
use crate::reads::Error;
use crate::reads::Fragment;
use crate::reads::MappedRead;
use crate::reads::ReadMapper;
use crate::reads::Reducer;
use crate::reads::Result;

/// The amino acids and triplets counted at one codon.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CodonCounts {
    /// Counts by amino acid.
    amino_acids: BTreeMap<char, u64>,

    /// Counts by nucleotide triplet.
    triplets: BTreeMap<String, u64>,
}

impl CodonCounts {
    /// Gets the counts by amino acid.
    pub fn amino_acids(&self) -> &BTreeMap<char, u64> {
        &self.amino_acids
    }

    /// Gets the counts by nucleotide triplet.
    pub fn triplets(&self) -> &BTreeMap<String, u64> {
        &self.triplets
    }

    /// The number of reads counted.
    pub fn depth(&self) -> u64 {
        self.triplets.values().sum()
    }

    /// Adds the counts of `other`.
    fn absorb(&mut self, other: CodonCounts) {
        for (amino_acid, count) in other.amino_acids {
            *self.amino_acids.entry(amino_acid).or_default() += count;
        }

        for (triplet, count) in other.triplets {
            *self.triplets.entry(triplet).or_default() += count;
        }
    }
}

/// Codon counts keyed by the first reference nucleotide of the codon.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CodonPileup(BTreeMap<i64, CodonCounts>);

impl CodonPileup {
    /// Gets the counts of the codon beginning at `nt_start`.
    pub fn get(&self, nt_start: i64) -> Option<&CodonCounts> {
        self.0.get(&nt_start)
    }
}

/// Counts the codons read at each labeled codon of a feature location.
#[derive(Debug)]
pub struct CodonReducer {
    /// The mapper.
    mapper: ReadMapper,

    /// The feature location.
    location: FeatureLocation,

    /// The genetic code.
    code: GeneticCode,
}

impl CodonReducer {
    /// Attempts to create a new [`CodonReducer`].
    ///
    /// The feature location must code for amino acids.
    pub fn try_new(
        mapper: ReadMapper,
        location: FeatureLocation,
        code: GeneticCode,
    ) -> Result<Self> {
        location.labeled_codons().map_err(Error::Codon)?;

        Ok(Self {
            mapper,
            location,
            code,
        })
    }

    /// The labeled codons with at least the configured minimum depth, and
    /// their counts, in reference order.
    pub fn rows<'a>(
        &'a self,
        pileup: &'a CodonPileup,
        config: &ReadAnalysisConfig,
    ) -> Result<Vec<(&'a LabeledCodon, &'a CodonCounts)>> {
        let table = self.location.labeled_codons().map_err(Error::Codon)?;

        Ok(pileup
            .0
            .iter()
            .filter(|(_, counts)| counts.depth() >= config.min_depth())
            .filter_map(|(nt_start, counts)| table.get(*nt_start).map(|codon| (codon, counts)))
            .collect())
    }

    /// The complete triplets a read calls at labeled codons, each with the
    /// lowest quality of its three bases.
    fn triplets(&self, read: &MappedRead) -> Result<BTreeMap<i64, Call<[u8; 3]>>> {
        let table = self.location.labeled_codons().map_err(Error::Codon)?;
        let bases = self.mapper.aligned_bases(read);
        let mut triplets = BTreeMap::new();

        for position in bases.keys() {
            let Some(codon) = table.get(*position) else {
                continue;
            };

            if codon.nt_end() - codon.nt_start() != 2 {
                continue;
            }

            let called = (0..3)
                .map(|offset| bases.get(&(position + offset)).copied())
                .collect::<Option<Vec<Call<AlignedBase>>>>();

            if let Some(called) = called {
                let quality = called.iter().map(|call| call.quality()).min().unwrap_or(0);
                let triplet = [
                    called[0].value().base,
                    called[1].value().base,
                    called[2].value().base,
                ];

                triplets.insert(*position, Call::new(triplet, quality));
            }
        }

        Ok(triplets)
    }
}

impl Reducer for CodonReducer {
    type Partial = CodonPileup;

    fn observe(&self, partial: &mut CodonPileup, fragment: &Fragment) -> Result<()> {
        let triplets = match fragment {
            Fragment::Single(read) => self.triplets(read)?,
            Fragment::Pair(first, second) => merge_calls(
                self.triplets(first)?,
                self.triplets(second)?,
                first.mapping_quality(),
                second.mapping_quality(),
                first.name(),
            ),
        };

        for (nt_start, call) in triplets {
            let triplet = String::from_utf8_lossy(call.value()).into_owned();
            let amino_acid = self.code.translate_codon(&triplet);
            let counts = partial.0.entry(nt_start).or_default();

            *counts.amino_acids.entry(amino_acid).or_default() += 1;
            *counts.triplets.entry(triplet).or_default() += 1;
        }

        Ok(())
    }

    fn reduce(&self, mut a: CodonPileup, b: CodonPileup) -> CodonPileup {
        for (nt_start, counts) in b.0 {
            a.0.entry(nt_start).or_default().absorb(counts);
        }

        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::tests::read;
    use crate::segment::ReferenceSegment;

    fn reducer() -> CodonReducer {
        let config = ReadAnalysisConfig::default();
        let location = FeatureLocation::new(
            "REF",
            "NS5B",
            vec![ReferenceSegment::try_new(4, 15).unwrap()],
            Some(4),
        );

        CodonReducer::try_new(ReadMapper::identity(30, &config), location, GeneticCode::standard())
            .unwrap()
    }

    #[test]
    fn only_complete_codons_are_counted() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let reducer = reducer();
        let mut pileup = CodonPileup::default();

        // Covers 1-11: codons at 4 and 7 completely, 10 partially.
        reducer.observe(&mut pileup, &Fragment::Single(read("a", "GGGATGCTGAA", 30, 1)))?;
        reducer.observe(&mut pileup, &Fragment::Single(read("b", "ATGCTC", 30, 4)))?;

        let rows = reducer.rows(&pileup, &ReadAnalysisConfig::default())?;
        let summary = rows
            .iter()
            .map(|(codon, counts)| (codon.label().to_string(), counts.amino_acids().clone()))
            .collect::<Vec<_>>();

        assert_eq!(
            summary,
            vec![
                (String::from("1"), BTreeMap::from([('M', 2)])),
                (String::from("2"), BTreeMap::from([('L', 2)])),
            ]
        );

        let triplets = pileup.get(7).unwrap().triplets();
        assert_eq!(triplets.get("CTG"), Some(&1));
        assert_eq!(triplets.get("CTC"), Some(&1));

        let config = ReadAnalysisConfig::builder().min_depth(3).try_build()?;
        assert_eq!(reducer.rows(&pileup, &config)?.len(), 0);

        Ok(())
    }

    #[test]
    fn mates_covering_a_codon_count_once() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let reducer = reducer();
        let mut pileup = CodonPileup::default();

        let first = read("r1", "ATGCTG", 30, 4).with_pairing(true, false);
        let second = read("r1", "CTGAAA", 20, 7).with_pairing(false, true);
        reducer.observe(&mut pileup, &Fragment::Pair(first, second))?;

        assert_eq!(pileup.get(7).unwrap().depth(), 1);
        assert_eq!(pileup.get(10).unwrap().amino_acids().get(&'K'), Some(&1));

        Ok(())
    }

    #[test]
    fn non_coding_features_are_rejected() {
        let location = FeatureLocation::new(
            "REF",
            "3UTR",
            vec![ReferenceSegment::try_new(1, 10).unwrap()],
            None,
        );
        let mapper = ReadMapper::identity(30, &ReadAnalysisConfig::default());

        assert!(matches!(
            CodonReducer::try_new(mapper, location, GeneticCode::standard()),
            Err(Error::Codon(_))
        ));
    }
}
