//! Per-position read depth.

use std::collections::BTreeMap;

use crate::config::ReadAnalysisConfig;
use crate::reads::fragment_bases;
use crate::reads::Fragment;
use crate::reads::ReadMapper;
use crate::reads::Reducer;
use crate::reads::Result;

/// Read depth by target position.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DepthTable(BTreeMap<i64, u64>);

impl DepthTable {
    /// Gets the depth at `position`.
    pub fn depth(&self, position: i64) -> u64 {
        self.0.get(&position).copied().unwrap_or(0)
    }

    /// The `(position, depth)` rows with at least the configured minimum
    /// depth.
    pub fn rows(&self, config: &ReadAnalysisConfig) -> Vec<(i64, u64)> {
        self.0
            .iter()
            .filter(|(_, depth)| **depth >= config.min_depth())
            .map(|(position, depth)| (*position, *depth))
            .collect()
    }
}

/// Counts the fragments covering each target position.
#[derive(Debug)]
pub struct DepthReducer {
    /// The mapper.
    mapper: ReadMapper,
}

impl DepthReducer {
    /// Creates a new [`DepthReducer`].
    pub fn new(mapper: ReadMapper) -> Self {
        Self { mapper }
    }
}

impl Reducer for DepthReducer {
    type Partial = DepthTable;

    fn observe(&self, partial: &mut DepthTable, fragment: &Fragment) -> Result<()> {
        for position in fragment_bases(&self.mapper, fragment).into_keys() {
            *partial.0.entry(position).or_default() += 1;
        }

        Ok(())
    }

    fn reduce(&self, mut a: DepthTable, b: DepthTable) -> DepthTable {
        for (position, depth) in b.0 {
            *a.0.entry(position).or_default() += depth;
        }

        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reads::tests::read;

    #[test]
    fn overlapping_mates_count_once() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let config = ReadAnalysisConfig::default();
        let reducer = DepthReducer::new(ReadMapper::identity(20, &config));

        let first = read("r1", "ACGTA", 30, 1).with_pairing(true, false);
        let second = read("r1", "GTACC", 30, 3).with_pairing(false, true);

        let mut table = DepthTable::default();
        reducer.observe(&mut table, &Fragment::Pair(first, second))?;

        assert_eq!(table.rows(&config), (1..=7).map(|p| (p, 1)).collect::<Vec<_>>());

        let deeper = ReadAnalysisConfig::builder().min_depth(2).try_build()?;
        assert!(table.rows(&deeper).is_empty());

        Ok(())
    }
}
