//! Translating query coordinates through chains of alignments.
//!
//! Persisted data is reached only through the provider traits in this module.
//! Every member of an alignment is stored as a list of segments whose
//! reference axis is the alignment's coordinate space (the constraining
//! reference, for constrained alignments) and whose query axis is the member
//! sequence. Walking up the alignment tree composes these lists with
//! [`translate_segments()`] until the requested reference is reached.
//!
//! An empty result is never an error: it means the member has no coverage of
//! the requested reference.

use nonempty::NonEmpty;
use tracing::debug;

use crate::segment;
use crate::segment::algebra::clone_left;
use crate::segment::algebra::covered_length;
use crate::segment::algebra::intersection;
use crate::segment::algebra::invert_list;
use crate::segment::algebra::sort_by_ref_start;
use crate::segment::algebra::translate_segments;
use crate::segment::NtQueryAlignedSegment;
use crate::segment::QueryAlignedSegment;
use crate::segment::ReferenceSegment;
use crate::variation::Variation;

pub mod store;

pub use store::MemoryStore;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// Which end of a requested range failed a bounds check.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bound {
    /// The start of the range.
    Start,

    /// The end of the range.
    End,
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Start => write!(f, "start"),
            Bound::End => write!(f, "end"),
        }
    }
}

/// An error related to translating coordinates.
#[derive(Debug, Eq, PartialEq)]
pub enum Error {
    /// No alignment exists with that name.
    UnknownAlignment(String),

    /// No sequence exists with that identifier.
    UnknownSequence(SequenceId),

    /// The sequence is not a member of the alignment.
    UnknownMember {
        /// The alignment name.
        alignment: String,

        /// The sequence that was expected to be a member.
        member: SequenceId,
    },

    /// No reference sequence exists with that name.
    UnknownReference(String),

    /// No feature location exists for the reference and feature.
    UnknownFeatureLocation {
        /// The reference sequence name.
        reference: String,

        /// The feature name.
        feature: String,
    },

    /// A requested coordinate range violates the bounds of a sequence.
    RangeOutOfBounds {
        /// The entity whose bounds were violated.
        entity: String,

        /// The bound that failed.
        bound: Bound,

        /// The requested value.
        value: i64,

        /// The limit that was violated.
        limit: i64,
    },

    /// A requested range starts after it ends.
    StartAfterEnd {
        /// The entity the range was requested from.
        entity: String,

        /// The requested start.
        start: i64,

        /// The requested end.
        end: i64,
    },

    /// The reference does not constrain any ancestor of the alignment.
    NotAnAncestor {
        /// The alignment whose ancestry was walked.
        alignment: String,

        /// The reference that was not found.
        reference: String,
    },

    /// An alignment within a constrained chain has no constraining reference.
    UnconstrainedAlignment(String),

    /// The parent links of an alignment form a cycle.
    CyclicAncestry(String),

    /// A segment error.
    Segment(segment::Error),

    /// An error raised by an external provider.
    Provider(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::UnknownAlignment(name) => write!(f, "unknown alignment: {name}"),
            Error::UnknownSequence(id) => write!(f, "unknown sequence: {id}"),
            Error::UnknownMember { alignment, member } => {
                write!(f, "sequence {member} is not a member of alignment {alignment}")
            }
            Error::UnknownReference(name) => write!(f, "unknown reference sequence: {name}"),
            Error::UnknownFeatureLocation { reference, feature } => write!(
                f,
                "no location for feature {feature} on reference {reference}"
            ),
            Error::RangeOutOfBounds {
                entity,
                bound,
                value,
                limit,
            } => match bound {
                Bound::Start => write!(
                    f,
                    "{entity}: requested {bound} ({value}) is below the first position ({limit})"
                ),
                Bound::End => write!(
                    f,
                    "{entity}: requested {bound} ({value}) is beyond the sequence length ({limit})"
                ),
            },
            Error::StartAfterEnd { entity, start, end } => write!(
                f,
                "{entity}: requested start ({start}) is greater than requested end ({end})"
            ),
            Error::NotAnAncestor {
                alignment,
                reference,
            } => write!(
                f,
                "reference {reference} does not constrain alignment {alignment} or any of its \
                 ancestors"
            ),
            Error::UnconstrainedAlignment(name) => {
                write!(f, "alignment {name} has no constraining reference")
            }
            Error::CyclicAncestry(name) => {
                write!(f, "the ancestry of alignment {name} contains a cycle")
            }
            Error::Segment(err) => write!(f, "segment error: {err}"),
            Error::Provider(message) => write!(f, "provider error: {message}"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Identifiers and links
////////////////////////////////////////////////////////////////////////////////////////

/// A sequence, identified by its source and its id within that source.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SequenceId {
    /// The source name.
    source: String,

    /// The sequence id within the source.
    sequence: String,
}

impl SequenceId {
    /// Creates a new [`SequenceId`].
    pub fn new(source: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sequence: sequence.into(),
        }
    }

    /// Gets the source name.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Gets the sequence id.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.source, self.sequence)
    }
}

/// One step in the ancestry of an alignment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlignmentLink {
    /// The alignment name.
    alignment: String,

    /// The reference that constrains the alignment, if any.
    constraining_reference: Option<String>,
}

impl AlignmentLink {
    /// Creates a new [`AlignmentLink`].
    pub fn new(alignment: impl Into<String>, constraining_reference: Option<String>) -> Self {
        Self {
            alignment: alignment.into(),
            constraining_reference,
        }
    }

    /// Gets the alignment name.
    pub fn alignment(&self) -> &str {
        &self.alignment
    }

    /// Gets the constraining reference name.
    pub fn constraining_reference(&self) -> Option<&str> {
        self.constraining_reference.as_deref()
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Providers
////////////////////////////////////////////////////////////////////////////////////////

/// Supplies sequence data.
pub trait SequenceProvider {
    /// Gets the nucleotides of a sequence within the 1-based, inclusive
    /// `range`, or the whole sequence when `range` is [`None`].
    ///
    /// Ranges outside the sequence are rejected, never clamped.
    fn nucleotides(&self, id: &SequenceId, range: Option<(i64, i64)>) -> Result<String>;
}

/// Supplies alignment membership and ancestry.
pub trait AlignmentProvider {
    /// Gets the segments relating the alignment's coordinate space
    /// (reference axis) to the member sequence (query axis).
    fn member_segments(&self, alignment: &str, member: &SequenceId)
    -> Result<Vec<QueryAlignedSegment>>;

    /// Gets the chain of alignments from `alignment` itself up to the root.
    fn ancestors(&self, alignment: &str) -> Result<NonEmpty<AlignmentLink>>;

    /// Gets the sequence underlying a named reference.
    fn reference_sequence(&self, reference: &str) -> Result<SequenceId>;
}

/// Supplies feature placements on reference sequences.
pub trait FeatureProvider {
    /// Gets the reference segments of a feature location.
    fn feature_segments(&self, reference: &str, feature: &str) -> Result<Vec<ReferenceSegment>>;

    /// Gets the first nucleotide of codon 1, or [`None`] when the feature does
    /// not code for amino acids.
    fn codon1_start(&self, reference: &str, feature: &str) -> Result<Option<i64>>;
}

/// Supplies variations defined on feature locations.
pub trait VariationProvider {
    /// Gets the variations of a feature location, optionally filtered.
    fn variations(
        &self,
        reference: &str,
        feature: &str,
        filter: Option<&dyn Fn(&Variation) -> bool>,
    ) -> Result<Vec<Variation>>;
}

////////////////////////////////////////////////////////////////////////////////////////
// Translation
////////////////////////////////////////////////////////////////////////////////////////

/// Gets a member's segments against its own alignment, sorted by reference
/// start.
pub fn member_to_alignment<A: AlignmentProvider>(
    alignments: &A,
    alignment: &str,
    member: &SequenceId,
) -> Result<Vec<QueryAlignedSegment>> {
    let mut segments = alignments.member_segments(alignment, member)?;
    sort_by_ref_start(&mut segments);
    Ok(segments)
}

/// Relates the reference `target` (reference axis) to a member of
/// `alignment` (query axis) by walking strictly up the alignment's parent
/// links.
///
/// `target` may be the alignment's own constraining reference or the
/// constraining reference of any ancestor.
///
/// # Examples
///
/// ```
/// use varscope::pipeline;
/// use varscope::pipeline::MemoryStore;
/// use varscope::pipeline::SequenceId;
/// use varscope::segment::QueryAlignedSegment;
///
/// let mut store = MemoryStore::default();
/// let master = SequenceId::new("ref", "MASTER");
/// let subtype = SequenceId::new("ref", "SUBTYPE");
/// let member = SequenceId::new("ncbi", "AB000001");
///
/// store.add_reference("MASTER_REF", master.clone(), "ACGT".repeat(50))?;
/// store.add_reference("SUBTYPE_REF", subtype.clone(), "ACGT".repeat(50))?;
/// store.add_sequence(member.clone(), "ACGT".repeat(25));
///
/// store.add_alignment("ROOT", Some("MASTER_REF"), None)?;
/// store.add_alignment("CHILD", Some("SUBTYPE_REF"), Some("ROOT"))?;
///
/// // SUBTYPE positions 1-150 sit at MASTER positions 51-200.
/// store.add_member("ROOT", subtype.clone(), vec![QueryAlignedSegment::try_new(51, 200, 1, 150)?])?;
/// // The member covers SUBTYPE positions 101-180.
/// store.add_member("CHILD", member.clone(), vec![QueryAlignedSegment::try_new(101, 180, 1, 80)?])?;
///
/// let segments = pipeline::member_to_ancestor_reference(&store, "CHILD", &member, "MASTER_REF")?;
/// assert_eq!(segments, vec![QueryAlignedSegment::try_new(151, 200, 1, 50)?]);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn member_to_ancestor_reference<A: AlignmentProvider>(
    alignments: &A,
    alignment: &str,
    member: &SequenceId,
    target: &str,
) -> Result<Vec<QueryAlignedSegment>> {
    let ancestors = alignments.ancestors(alignment)?;
    let mut segments = member_to_alignment(alignments, alignment, member)?;

    let mut links = ancestors.tail.iter();
    let mut child = &ancestors.head;
    let mut current = constraining_reference(child)?;

    loop {
        if current == target {
            return Ok(segments);
        }

        let parent = match links.next() {
            Some(parent) => parent,
            None => {
                return Err(Error::NotAnAncestor {
                    alignment: alignment.to_string(),
                    reference: target.to_string(),
                });
            }
        };

        let parent_reference = constraining_reference(parent)?;
        let child_sequence = alignments.reference_sequence(current)?;

        // parent reference -> child reference
        let mut hop = alignments.member_segments(parent.alignment(), &child_sequence)?;
        sort_by_ref_start(&mut hop);

        debug!(
            from = child.alignment(),
            to = parent.alignment(),
            segments = segments.len(),
            "translating through parent alignment"
        );

        segments = translate_segments(&hop, &segments);
        child = parent;
        current = parent_reference;
    }
}

/// Relates `member_b` (reference axis) to `member_a` (query axis) where both
/// are members of the same alignment, regardless of whether the alignment is
/// constrained.
pub fn member_to_related_member<A: AlignmentProvider>(
    alignments: &A,
    alignment: &str,
    member_a: &SequenceId,
    member_b: &SequenceId,
) -> Result<Vec<QueryAlignedSegment>> {
    let a_to_alignment = member_to_alignment(alignments, alignment, member_a)?;
    let b_to_alignment = member_to_alignment(alignments, alignment, member_b)?;

    Ok(translate_segments(
        &invert_list(&b_to_alignment),
        &a_to_alignment,
    ))
}

/// Relates the named `reference` (reference axis) to a member (query axis),
/// where the reference sequence is itself a member of the same alignment.
pub fn member_to_related_reference<A: AlignmentProvider>(
    alignments: &A,
    alignment: &str,
    member: &SequenceId,
    reference: &str,
) -> Result<Vec<QueryAlignedSegment>> {
    let reference_sequence = alignments.reference_sequence(reference)?;
    member_to_related_member(alignments, alignment, member, &reference_sequence)
}

/// Attaches the member's nucleotides to each segment.
pub fn realize_query_nucleotides<S: SequenceProvider>(
    sequences: &S,
    member: &SequenceId,
    segments: &[QueryAlignedSegment],
) -> Result<Vec<NtQueryAlignedSegment>> {
    let nucleotides = sequences.nucleotides(member, None)?;

    segments
        .iter()
        .map(|segment| NtQueryAlignedSegment::realize(*segment, &nucleotides))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(Error::Segment)
}

/// Restricts reference-to-query segments to the positions of a feature.
pub fn restrict_to_feature(
    segments: &[QueryAlignedSegment],
    feature: &[ReferenceSegment],
) -> Vec<QueryAlignedSegment> {
    let mut segments = segments.to_vec();
    let mut feature = feature.to_vec();
    sort_by_ref_start(&mut segments);
    sort_by_ref_start(&mut feature);

    intersection(&segments, &feature, clone_left)
}

/// The percentage of a feature's reference positions covered by the query,
/// as `100.0 * covered / total`.
///
/// A feature with no positions has zero coverage.
pub fn feature_coverage(segments: &[QueryAlignedSegment], feature: &[ReferenceSegment]) -> f64 {
    let total = covered_length(feature);

    if total == 0 {
        return 0.0;
    }

    let covered = covered_length(&restrict_to_feature(segments, feature));
    100.0 * covered as f64 / total as f64
}

/// Gets the constraining reference of a link inside a constrained chain.
fn constraining_reference(link: &AlignmentLink) -> Result<&str> {
    link.constraining_reference()
        .ok_or_else(|| Error::UnconstrainedAlignment(link.alignment().to_string()))
}
