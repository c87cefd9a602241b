//! Per-position nucleotide pileups and consensus.

use std::collections::BTreeMap;

use crate::config::ReadAnalysisConfig;
use crate::reads::fragment_bases;
use crate::reads::Fragment;
use crate::reads::ReadMapper;
use crate::reads::Reducer;
use crate::reads::Result;

/// The nucleotides counted at one position.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BaseCounts {
    /// Counts of `A`, `C`, `G`, `T`, and anything else, in that order.
    counts: [u64; 5],
}

impl BaseCounts {
    /// The bases with a dedicated count, in count order.
    pub const BASES: [char; 4] = ['A', 'C', 'G', 'T'];

    /// Counts one base.
    pub fn add(&mut self, base: u8) {
        let slot = match base.to_ascii_uppercase() {
            b'A' => 0,
            b'C' => 1,
            b'G' => 2,
            b'T' | b'U' => 3,
            _ => 4,
        };

        self.counts[slot] += 1;
    }

    /// Gets the count of `base`.
    pub fn count(&self, base: char) -> u64 {
        match Self::BASES.iter().position(|b| b.eq_ignore_ascii_case(&base)) {
            Some(slot) => self.counts[slot],
            None => self.counts[4],
        }
    }

    /// The number of bases counted.
    pub fn depth(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// The most frequent of `A`, `C`, `G`, and `T`, the earliest winning a
    /// tie.
    pub fn majority(&self) -> Option<char> {
        let mut best: Option<(usize, u64)> = None;

        for (slot, count) in self.counts[..4].iter().enumerate() {
            if *count > best.map(|(_, c)| c).unwrap_or(0) {
                best = Some((slot, *count));
            }
        }

        best.map(|(slot, _)| Self::BASES[slot])
    }

    /// Adds the counts of `other`.
    fn absorb(&mut self, other: &BaseCounts) {
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts) {
            *mine += theirs;
        }
    }
}

/// Nucleotide counts by target position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Pileup(BTreeMap<i64, BaseCounts>);

impl Pileup {
    /// Gets the counts at `position`.
    pub fn get(&self, position: i64) -> Option<&BaseCounts> {
        self.0.get(&position)
    }

    /// The `(position, counts)` rows with at least the configured minimum
    /// depth.
    pub fn rows(&self, config: &ReadAnalysisConfig) -> Vec<(i64, BaseCounts)> {
        self.0
            .iter()
            .filter(|(_, counts)| counts.depth() >= config.min_depth())
            .map(|(position, counts)| (*position, *counts))
            .collect()
    }

    /// The majority base at every position in `[start, end]`, with `N`
    /// wherever the depth is below the configured minimum depth.
    ///
    /// # Examples
    ///
    /// ```
    /// use varscope::config::ReadAnalysisConfig;
    /// use varscope::reads::nucleotide::NucleotideReducer;
    /// use varscope::reads::nucleotide::Pileup;
    /// use varscope::reads::AlignmentBlock;
    /// use varscope::reads::Fragment;
    /// use varscope::reads::MappedRead;
    /// use varscope::reads::ReadMapper;
    /// use varscope::reads::Reducer as _;
    ///
    /// let config = ReadAnalysisConfig::default();
    /// let reducer = NucleotideReducer::new(ReadMapper::identity(10, &config));
    /// let read = MappedRead::try_new("r1", "ACG", "III", 60, vec![AlignmentBlock::new(1, 2, 3)])?;
    ///
    /// let mut pileup = Pileup::default();
    /// reducer.observe(&mut pileup, &Fragment::Single(read))?;
    ///
    /// assert_eq!(pileup.consensus(1, 5, &config), "NACGN");
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn consensus(&self, start: i64, end: i64, config: &ReadAnalysisConfig) -> String {
        let min_depth = config.min_depth().max(1);

        (start..=end)
            .map(|position| {
                self.0
                    .get(&position)
                    .filter(|counts| counts.depth() >= min_depth)
                    .and_then(|counts| counts.majority())
                    .unwrap_or('N')
            })
            .collect()
    }
}

/// Counts the nucleotides at each target position.
#[derive(Debug)]
pub struct NucleotideReducer {
    /// The mapper.
    mapper: ReadMapper,
}

impl NucleotideReducer {
    /// Creates a new [`NucleotideReducer`].
    pub fn new(mapper: ReadMapper) -> Self {
        Self { mapper }
    }
}

impl Reducer for NucleotideReducer {
    type Partial = Pileup;

    fn observe(&self, partial: &mut Pileup, fragment: &Fragment) -> Result<()> {
        for (position, call) in fragment_bases(&self.mapper, fragment) {
            partial.0.entry(position).or_default().add(call.value().base);
        }

        Ok(())
    }

    fn reduce(&self, mut a: Pileup, b: Pileup) -> Pileup {
        for (position, counts) in b.0 {
            a.0.entry(position).or_default().absorb(&counts);
        }

        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::tests::read;
    use crate::reads::AlignmentBlock;
    use crate::reads::MappedRead;

    fn reducer() -> NucleotideReducer {
        NucleotideReducer::new(ReadMapper::identity(100, &ReadAnalysisConfig::default()))
    }

    #[test]
    fn higher_quality_mate_wins_a_disagreement() -> std::result::Result<(), Box<dyn std::error::Error>> {
        // The mates overlap at positions 3-4 and disagree at 4.
        let first = MappedRead::try_new("r1", "ACGT", "????", 60, vec![AlignmentBlock::new(1, 1, 4)])?
            .with_pairing(true, false);
        let second = MappedRead::try_new("r1", "GAAA", "5555", 60, vec![AlignmentBlock::new(1, 3, 4)])?
            .with_pairing(false, true);

        let mut pileup = Pileup::default();
        reducer().observe(&mut pileup, &Fragment::Pair(first, second))?;

        let at_four = pileup.get(4).unwrap();
        assert_eq!(at_four.depth(), 1);
        assert_eq!(at_four.count('T'), 1);
        assert_eq!(at_four.count('A'), 0);
        assert_eq!(pileup.get(5).unwrap().count('A'), 1);

        Ok(())
    }

    #[test]
    fn reduction_is_associative() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let reducer = reducer();
        let shard = |reads: Vec<MappedRead>| -> Result<Pileup> {
            let mut pileup = Pileup::default();
            for read in reads {
                reducer.observe(&mut pileup, &Fragment::Single(read))?;
            }
            Ok(pileup)
        };

        let s1 = shard(vec![read("a", "ACGT", 30, 1), read("b", "CCGT", 30, 2)])?;
        let s2 = shard(vec![read("c", "TTTT", 30, 3)])?;
        let s3 = shard(vec![read("d", "GGGGGG", 30, 1), read("e", "A", 30, 9)])?;

        let left = reducer.reduce(reducer.reduce(s1.clone(), s2.clone()), s3.clone());
        let right = reducer.reduce(s1.clone(), reducer.reduce(s2.clone(), s3.clone()));

        assert_eq!(left, right);
        assert_eq!(left.get(3).unwrap().depth(), 4);
        assert_eq!(reducer.reduce(Pileup::default(), s1.clone()), s1);

        Ok(())
    }

    #[test]
    fn consensus_masks_shallow_positions() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let reducer = reducer();
        let mut pileup = Pileup::default();

        for (name, sequence) in [("a", "ACGT"), ("b", "ACCT"), ("c", "AC")] {
            reducer.observe(&mut pileup, &Fragment::Single(read(name, sequence, 30, 1)))?;
        }

        let config = ReadAnalysisConfig::default();
        assert_eq!(pileup.consensus(1, 4, &config), "ACCT");
        assert_eq!(pileup.rows(&config).len(), 4);

        let config = ReadAnalysisConfig::builder().min_depth(3).try_build()?;
        assert_eq!(pileup.consensus(1, 5, &config), "ACNNN");
        assert_eq!(pileup.rows(&config).len(), 2);

        Ok(())
    }
}
