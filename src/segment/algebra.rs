//! Set operations over ordered lists of segments.
//!
//! Unless stated otherwise, every operation here expects its inputs to be
//! sorted ascending by reference start and to be non-overlapping within each
//! list. The operations do not sort or validate their inputs: handing them an
//! unsorted list produces results that are simply wrong, and callers are
//! expected to sort with [`sort_by_ref_start()`] first.

use crate::segment::Error;
use crate::segment::QueryAlignedSegment;
use crate::segment::ReferenceBounds;
use crate::segment::ReferenceSegment;
use crate::segment::Segment;

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Ordering and coverage
////////////////////////////////////////////////////////////////////////////////////////

/// Sorts segments ascending by reference start, then reference end.
pub fn sort_by_ref_start<S: ReferenceBounds>(segments: &mut [S]) {
    segments.sort_by_key(|segment| (segment.ref_start(), segment.ref_end()));
}

/// The total number of reference positions covered by a non-overlapping list.
pub fn covered_length<S: ReferenceBounds>(segments: &[S]) -> i64 {
    segments.iter().map(|segment| segment.current_length()).sum()
}

/// Whether every position within `[start, end]` is covered by `segments`.
///
/// # Examples
///
/// ```
/// use varscope::segment::ReferenceSegment;
/// use varscope::segment::algebra::covers;
///
/// let segments = vec![
///     ReferenceSegment::try_new(1, 10)?,
///     ReferenceSegment::try_new(11, 20)?,
///     ReferenceSegment::try_new(25, 30)?,
/// ];
///
/// assert!(covers(&segments, 5, 15));
/// assert!(!covers(&segments, 15, 26));
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn covers<S: Segment>(segments: &[S], start: i64, end: i64) -> bool {
    let Ok(window) = ReferenceSegment::try_new(start, end) else {
        return false;
    };

    covered_length(&intersection(segments, &[window], clone_left)) == window.current_length()
}

////////////////////////////////////////////////////////////////////////////////////////
// Intersection and subtraction
////////////////////////////////////////////////////////////////////////////////////////

/// A merger that keeps the left-hand segment of each overlapping pair.
pub fn clone_left<A, B>(left: A, _: B) -> A {
    left
}

/// A merger that keeps the right-hand segment of each overlapping pair.
pub fn clone_right<A, B>(_: A, right: B) -> B {
    right
}

/// Computes the overlaps between two sorted, non-overlapping lists.
///
/// For every pair of segments that share at least one reference position,
/// both members are clamped to the shared interval and handed to `merger`.
/// Segments that merely touch (one ends immediately before the other starts)
/// share no position and produce nothing.
///
/// # Examples
///
/// ```
/// use varscope::segment::QueryAlignedSegment;
/// use varscope::segment::ReferenceSegment;
/// use varscope::segment::algebra::clone_left;
/// use varscope::segment::algebra::intersection;
///
/// let aligned = vec![QueryAlignedSegment::try_new(1, 100, 201, 300)?];
/// let feature = vec![
///     ReferenceSegment::try_new(10, 20)?,
///     ReferenceSegment::try_new(101, 110)?,
/// ];
///
/// let result = intersection(&aligned, &feature, clone_left);
/// assert_eq!(result, vec![QueryAlignedSegment::try_new(10, 20, 210, 220)?]);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn intersection<A, B, R, F>(left: &[A], right: &[B], mut merger: F) -> Vec<R>
where
    A: Segment,
    B: Segment,
    F: FnMut(A, B) -> R,
{
    let mut results = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);

    while i < left.len() && j < right.len() {
        let (a, b) = (&left[i], &right[j]);

        let start = a.ref_start().max(b.ref_start());
        let end = a.ref_end().min(b.ref_end());

        if start <= end {
            if let (Some(a), Some(b)) = (a.clamp_ref(start, end), b.clamp_ref(start, end)) {
                results.push(merger(a, b));
            }
        }

        match a.ref_end() < b.ref_end() {
            true => i += 1,
            false => j += 1,
        }
    }

    results
}

/// Removes every position covered by `to_remove` from `segments`.
///
/// A segment with a removal strictly inside it is split into the two
/// remaining pieces.
///
/// # Examples
///
/// ```
/// use varscope::segment::ReferenceSegment;
/// use varscope::segment::algebra::subtract;
///
/// let segments = vec![ReferenceSegment::try_new(1, 100)?];
/// let remove = vec![ReferenceSegment::try_new(40, 60)?];
///
/// assert_eq!(
///     subtract(&segments, &remove),
///     vec![
///         ReferenceSegment::try_new(1, 39)?,
///         ReferenceSegment::try_new(61, 100)?,
///     ]
/// );
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn subtract<S, R>(segments: &[S], to_remove: &[R]) -> Vec<S>
where
    S: Segment,
    R: ReferenceBounds,
{
    let mut results = Vec::new();

    for segment in segments {
        let mut pieces = vec![segment.clone()];

        for removal in to_remove {
            pieces = pieces
                .into_iter()
                .flat_map(|piece| {
                    if !piece.overlaps(removal) {
                        return vec![piece];
                    }

                    let left = piece.clamp_ref(piece.ref_start(), removal.ref_start() - 1);
                    let right = piece.clamp_ref(removal.ref_end() + 1, piece.ref_end());

                    left.into_iter().chain(right).collect()
                })
                .collect();
        }

        results.extend(pieces);
    }

    results
}

////////////////////////////////////////////////////////////////////////////////////////
// Merging
////////////////////////////////////////////////////////////////////////////////////////

/// Merges runs of consecutive segments for which `abuts` holds.
///
/// # Examples
///
/// ```
/// use varscope::segment::QueryAlignedSegment;
/// use varscope::segment::algebra::merge_abutting;
///
/// let segments = vec![
///     QueryAlignedSegment::try_new(1, 5, 11, 15)?,
///     QueryAlignedSegment::try_new(6, 10, 16, 20)?,
///     QueryAlignedSegment::try_new(11, 12, 30, 31)?,
/// ];
///
/// let merged = merge_abutting(
///     segments,
///     QueryAlignedSegment::merged,
///     QueryAlignedSegment::abuts_query,
/// );
///
/// assert_eq!(
///     merged,
///     vec![
///         QueryAlignedSegment::try_new(1, 10, 11, 20)?,
///         QueryAlignedSegment::try_new(11, 12, 30, 31)?,
///     ]
/// );
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn merge_abutting<S, M, P>(segments: Vec<S>, merge: M, abuts: P) -> Vec<S>
where
    M: Fn(&S, &S) -> S,
    P: Fn(&S, &S) -> bool,
{
    let mut results: Vec<S> = Vec::with_capacity(segments.len());

    for segment in segments {
        match results.last_mut() {
            Some(last) if abuts(last, &segment) => *last = merge(last, &segment),
            _ => results.push(segment),
        }
    }

    results
}

////////////////////////////////////////////////////////////////////////////////////////
// Axis manipulation
////////////////////////////////////////////////////////////////////////////////////////

/// Swaps the reference and query axes of every segment and re-sorts by the
/// new reference start.
pub fn invert_list(segments: &[QueryAlignedSegment]) -> Vec<QueryAlignedSegment> {
    let mut results = segments
        .iter()
        .map(QueryAlignedSegment::inverted)
        .collect::<Vec<_>>();
    sort_by_ref_start(&mut results);
    results
}

/// Mirrors both axes: every reference position `r` becomes
/// `reference_length - r + 1` and every query position `q` becomes
/// `query_length - q + 1`.
///
/// This is the view of the same homology from the reverse complement of both
/// sequences, so the sense of each segment is preserved.
///
/// # Examples
///
/// ```
/// use varscope::segment::QueryAlignedSegment;
/// use varscope::segment::algebra::reverse_sense;
///
/// let segments = vec![QueryAlignedSegment::try_new(1, 10, 5, 14)?];
/// let reversed = reverse_sense(&segments, 20, 100)?;
///
/// assert_eq!(reversed, vec![QueryAlignedSegment::try_new(91, 100, 7, 16)?]);
/// assert_eq!(reverse_sense(&reversed, 20, 100)?, segments);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn reverse_sense(
    segments: &[QueryAlignedSegment],
    query_length: i64,
    reference_length: i64,
) -> Result<Vec<QueryAlignedSegment>> {
    let mut results = Vec::with_capacity(segments.len());

    for segment in segments {
        check_within(segment.ref_end(), reference_length)?;
        check_within(segment.query_max(), query_length)?;

        results.push(QueryAlignedSegment::from_bounds(
            reference_length - segment.ref_end() + 1,
            reference_length - segment.ref_start() + 1,
            query_length - segment.query_end() + 1,
            query_length - segment.query_start() + 1,
        ));
    }

    sort_by_ref_start(&mut results);
    Ok(results)
}

/// Mirrors only the query axis, flipping the sense of every segment.
///
/// Applied to a read aligned to the negative strand, this relates the
/// reference to the read as it was sequenced.
pub fn reverse_complement_query(
    segments: &[QueryAlignedSegment],
    query_length: i64,
) -> Result<Vec<QueryAlignedSegment>> {
    segments
        .iter()
        .map(|segment| {
            check_within(segment.query_max(), query_length)?;

            Ok(QueryAlignedSegment::from_bounds(
                segment.ref_start(),
                segment.ref_end(),
                query_length - segment.query_start() + 1,
                query_length - segment.query_end() + 1,
            ))
        })
        .collect()
}

/// Ensures `position` does not exceed `length`.
fn check_within(position: i64, length: i64) -> Result<()> {
    match position > length {
        true => Err(Error::BeyondSequenceLength { position, length }),
        false => Ok(()),
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Composition
////////////////////////////////////////////////////////////////////////////////////////

/// Composes two homologies.
///
/// The query axis of `first` must be the same coordinate space as the
/// reference axis of `second`. The result relates the reference axis of
/// `first` to the query axis of `second`, covering only the positions that
/// survive both mappings. The sense of each result is the composition of the
/// senses involved, so reverse homology composed with reverse homology is
/// forward again.
///
/// `second` need not be sorted; the result is sorted by reference start.
///
/// # Examples
///
/// ```
/// use varscope::segment::QueryAlignedSegment;
/// use varscope::segment::algebra::translate_segments;
///
/// // ancestor reference -> child reference
/// let first = vec![QueryAlignedSegment::try_new(100, 200, 1, 101)?];
/// // child reference -> member
/// let second = vec![QueryAlignedSegment::try_new(50, 150, 500, 600)?];
///
/// let composed = translate_segments(&first, &second);
/// assert_eq!(
///     composed,
///     vec![QueryAlignedSegment::try_new(149, 200, 500, 551)?]
/// );
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn translate_segments(
    first: &[QueryAlignedSegment],
    second: &[QueryAlignedSegment],
) -> Vec<QueryAlignedSegment> {
    let mut results = Vec::new();

    for a in first {
        for b in second {
            let lo = a.query_min().max(b.ref_start());
            let hi = a.query_max().min(b.ref_end());

            if lo > hi {
                continue;
            }

            // SAFETY: `lo` and `hi` are within the query bounds of `a` and the
            // reference bounds of `b` by construction.
            let (x, y) = (a.reference_at(lo).unwrap(), a.reference_at(hi).unwrap());
            let (ref_start, ref_end) = (x.min(y), x.max(y));

            let query_start = b.query_at(a.query_at(ref_start).unwrap()).unwrap();
            let query_end = b.query_at(a.query_at(ref_end).unwrap()).unwrap();

            results.push(QueryAlignedSegment::from_bounds(
                ref_start,
                ref_end,
                query_start,
                query_end,
            ));
        }
    }

    sort_by_ref_start(&mut results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::Sense;

    fn qas(rs: i64, re: i64, qs: i64, qe: i64) -> QueryAlignedSegment {
        QueryAlignedSegment::try_new(rs, re, qs, qe).unwrap()
    }

    fn rs(start: i64, end: i64) -> ReferenceSegment {
        ReferenceSegment::try_new(start, end).unwrap()
    }

    #[test]
    fn intersection_excludes_touching_segments() {
        let a = vec![rs(1, 10)];
        let b = vec![rs(11, 20)];

        assert!(intersection(&a, &b, clone_left).is_empty());

        let b = vec![rs(10, 20)];
        assert_eq!(intersection(&a, &b, clone_left), vec![rs(10, 10)]);
    }

    #[test]
    fn intersection_lengths_are_overlap_lengths() {
        let a = vec![rs(1, 10), rs(20, 30), rs(40, 50)];
        let b = vec![rs(5, 25), rs(28, 45)];

        assert_eq!(
            intersection(&a, &b, clone_left),
            vec![rs(5, 10), rs(20, 25), rs(28, 30), rs(40, 45)]
        );
    }

    #[test]
    fn intersection_coverage_is_commutative() {
        let a = vec![qas(1, 10, 101, 110), qas(20, 30, 130, 120), qas(40, 50, 1, 11)];
        let b = vec![qas(5, 25, 5, 25), qas(28, 45, 300, 283)];

        let ab = intersection(&a, &b, clone_left);
        let ba = intersection(&b, &a, clone_left);

        assert_eq!(covered_length(&ab), covered_length(&ba));
        assert_eq!(covered_length(&ab), 6 + 6 + 3 + 6);
    }

    #[test]
    fn clone_right_keeps_the_right_query_side() {
        let a = vec![qas(1, 10, 101, 110)];
        let b = vec![qas(5, 20, 205, 220)];

        assert_eq!(intersection(&a, &b, clone_left), vec![qas(5, 10, 105, 110)]);
        assert_eq!(intersection(&a, &b, clone_right), vec![qas(5, 10, 205, 210)]);
    }

    #[test]
    fn intersection_of_unsorted_input_is_wrong() {
        // Callers must sort first; nothing guards against this.
        let unsorted = vec![rs(50, 60), rs(1, 10)];
        let other = vec![rs(1, 10)];

        assert!(intersection(&unsorted, &other, clone_left).is_empty());

        let mut sorted = unsorted.clone();
        sort_by_ref_start(&mut sorted);
        assert_eq!(intersection(&sorted, &other, clone_left), vec![rs(1, 10)]);
    }

    #[test]
    fn subtract_trims_edges_and_splits_interiors() {
        let segments = vec![qas(1, 20, 101, 120), qas(30, 40, 140, 130)];
        let remove = vec![rs(1, 5), rs(10, 12), rs(35, 50)];

        assert_eq!(
            subtract(&segments, &remove),
            vec![
                qas(6, 9, 106, 109),
                qas(13, 20, 113, 120),
                qas(30, 34, 140, 136)
            ]
        );
    }

    #[test]
    fn subtract_removing_everything_is_empty() {
        let segments = vec![rs(10, 20)];
        assert!(subtract(&segments, &[rs(1, 100)]).is_empty());
    }

    #[test]
    fn inverting_twice_returns_the_original() {
        let segments = vec![qas(1, 10, 51, 60), qas(11, 20, 40, 31), qas(30, 35, 1, 6)];

        let inverted = invert_list(&segments);
        assert_eq!(
            inverted,
            vec![qas(1, 6, 30, 35), qas(31, 40, 20, 11), qas(51, 60, 1, 10)]
        );
        assert_eq!(invert_list(&inverted), segments);
    }

    #[test]
    fn reversal_is_an_involution() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let segments = vec![qas(1, 10, 5, 14), qas(20, 29, 40, 31)];

        let reversed = reverse_sense(&segments, 50, 100)?;
        assert_eq!(reversed, vec![qas(72, 81, 20, 11), qas(91, 100, 37, 46)]);
        assert_eq!(reverse_sense(&reversed, 50, 100)?, segments);

        Ok(())
    }

    #[test]
    fn reversal_beyond_length_is_rejected() {
        let segments = vec![qas(1, 10, 5, 14)];

        assert_eq!(
            reverse_sense(&segments, 10, 100).unwrap_err(),
            Error::BeyondSequenceLength {
                position: 14,
                length: 10
            }
        );
    }

    #[test]
    fn reverse_complementing_the_query_flips_sense() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let segments = vec![qas(100, 109, 1, 10)];

        let flipped = reverse_complement_query(&segments, 10)?;
        assert_eq!(flipped, vec![qas(100, 109, 10, 1)]);
        assert_eq!(flipped[0].sense(), Sense::Reverse);
        assert_eq!(reverse_complement_query(&flipped, 10)?, segments);

        Ok(())
    }

    #[test]
    fn composition_yields_only_the_overlap() {
        let first = vec![qas(100, 200, 1, 101)];
        let second = vec![qas(50, 150, 500, 600)];

        let composed = translate_segments(&first, &second);

        assert_eq!(composed, vec![qas(149, 200, 500, 551)]);
        assert_eq!(composed[0].query_at(149), Some(500));
        assert_eq!(composed[0].query_at(200), Some(551));
    }

    #[test]
    fn composition_preserves_reverse_sense() {
        let first = vec![qas(1, 10, 20, 11)];
        let second = vec![qas(11, 20, 101, 110)];

        let once = translate_segments(&first, &second);
        assert_eq!(once, vec![qas(1, 10, 110, 101)]);
        assert_eq!(once[0].sense(), Sense::Reverse);

        let reverse_again = vec![qas(101, 110, 10, 1)];
        let twice = translate_segments(&once, &reverse_again);
        assert_eq!(twice, vec![qas(1, 10, 1, 10)]);
        assert_eq!(twice[0].sense(), Sense::Forward);
    }

    #[test]
    fn composition_is_associative() {
        let a = vec![qas(1, 50, 101, 150), qas(60, 80, 200, 180)];
        let b = vec![qas(110, 140, 11, 41), qas(150, 200, 300, 250)];
        let c = vec![qas(1, 30, 1001, 1030), qas(260, 290, 2001, 2031)];

        let left = translate_segments(&translate_segments(&a, &b), &c);
        let right = translate_segments(&a, &translate_segments(&b, &c));

        assert!(!left.is_empty());
        assert_eq!(left, right);
    }

    #[test]
    fn composition_without_overlap_is_empty() {
        let first = vec![qas(1, 10, 1, 10)];
        let second = vec![qas(11, 20, 11, 20)];

        assert!(translate_segments(&first, &second).is_empty());
    }

    #[test]
    fn merging_leaves_non_abutting_segments_alone() {
        let segments = vec![rs(1, 5), rs(6, 10), rs(12, 15), rs(16, 16)];

        assert_eq!(
            merge_abutting(segments, ReferenceSegment::merged, ReferenceSegment::abuts),
            vec![rs(1, 10), rs(12, 16)]
        );
    }
}
