//! Choosing between mates that both cover a position.
//!
//! The order is fixed: the higher call quality wins; on a tie, the higher
//! mapping quality wins unless either mate has none; on a further tie, a
//! hash of the read name picks a mate. The hash makes the choice
//! reproducible across runs and shard counts.

use std::collections::BTreeMap;

use xxhash_rust::xxh64::xxh64;

use crate::reads::MAPQ_UNAVAILABLE;

/// The seed for the read-name hash.
const COIN_FLIP_SEED: u64 = 0;

/// A mate of a pair.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mate {
    /// The first-of-pair read.
    First,

    /// The second-of-pair read.
    Second,
}

/// A value called by a read, with the quality supporting it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Call<T> {
    /// The value.
    value: T,

    /// The quality.
    quality: u8,
}

impl<T> Call<T> {
    /// Creates a new [`Call`].
    pub fn new(value: T, quality: u8) -> Self {
        Self { value, quality }
    }

    /// Gets the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Gets the quality.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Consumes `self` and returns the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Picks which mate's call to keep.
///
/// # Examples
///
/// ```
/// use varscope::reads::tiebreak::prefer;
/// use varscope::reads::Mate;
///
/// assert_eq!(prefer((30, 10), (20, 60), "r1"), Mate::First);
/// assert_eq!(prefer((30, 10), (30, 60), "r1"), Mate::Second);
///
/// // Without a mapping quality the read name decides, the same way every time.
/// let flip = prefer((30, 255), (30, 60), "r1");
/// assert_eq!(prefer((30, 255), (30, 60), "r1"), flip);
/// ```
pub fn prefer(first: (u8, u8), second: (u8, u8), read_name: &str) -> Mate {
    let ((first_quality, first_mapq), (second_quality, second_mapq)) = (first, second);

    if first_quality != second_quality {
        return match first_quality > second_quality {
            true => Mate::First,
            false => Mate::Second,
        };
    }

    let mapqs_available = first_mapq != MAPQ_UNAVAILABLE && second_mapq != MAPQ_UNAVAILABLE;
    if mapqs_available && first_mapq != second_mapq {
        return match first_mapq > second_mapq {
            true => Mate::First,
            false => Mate::Second,
        };
    }

    coin_flip(read_name)
}

/// Picks a mate from the read name alone.
pub fn coin_flip(read_name: &str) -> Mate {
    match xxh64(read_name.as_bytes(), COIN_FLIP_SEED) & 1 {
        0 => Mate::First,
        _ => Mate::Second,
    }
}

/// Merges the calls of two mates by key, keeping one call wherever both
/// mates made one.
pub fn merge_calls<K: Ord, T>(
    first: BTreeMap<K, Call<T>>,
    second: BTreeMap<K, Call<T>>,
    first_mapq: u8,
    second_mapq: u8,
    read_name: &str,
) -> BTreeMap<K, Call<T>> {
    let mut merged = first;

    for (key, theirs) in second {
        match merged.remove(&key) {
            None => {
                merged.insert(key, theirs);
            }
            Some(ours) => {
                let keep = match prefer(
                    (ours.quality, first_mapq),
                    (theirs.quality, second_mapq),
                    read_name,
                ) {
                    Mate::First => ours,
                    Mate::Second => theirs,
                };

                merged.insert(key, keep);
            }
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_outranks_mapping_quality() {
        assert_eq!(prefer((20, 60), (30, 0), "r"), Mate::Second);
    }

    #[test]
    fn unavailable_mapping_quality_is_skipped() {
        for name in ["a", "b", "c", "d"] {
            assert_eq!(prefer((30, 255), (30, 0), name), coin_flip(name));
            assert_eq!(prefer((30, 0), (30, 255), name), coin_flip(name));
        }
    }

    #[test]
    fn coin_flip_reaches_both_mates() {
        let flips = (0..64)
            .map(|i| coin_flip(&format!("read{i}")))
            .collect::<Vec<_>>();

        assert!(flips.contains(&Mate::First));
        assert!(flips.contains(&Mate::Second));
    }

    #[test]
    fn overlapping_calls_are_counted_once() {
        let first = BTreeMap::from([(10, Call::new('A', 30)), (11, Call::new('C', 30))]);
        let second = BTreeMap::from([(11, Call::new('T', 20)), (12, Call::new('G', 20))]);

        let merged = merge_calls(first, second, 60, 60, "r");
        let values = merged
            .iter()
            .map(|(position, call)| (*position, *call.value()))
            .collect::<Vec<_>>();

        assert_eq!(values, vec![(10, 'A'), (11, 'C'), (12, 'G')]);
    }
}
