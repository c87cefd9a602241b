//! `varscope` is a crate for relating aligned virus sequences to one another,
//! transcribing their coding features, and scanning them for variations.
//!
//! The crate is organized around a small algebra of coordinate segments:
//!
//! - [`segment`] defines 1-based, closed [reference
//!   segments](segment::ReferenceSegment) and [query-aligned
//!   segments](segment::QueryAlignedSegment) along with the list operations
//!   (intersection, subtraction, inversion, and
//!   [composition](segment::algebra::translate_segments)) that every other
//!   module builds upon.
//! - [`pipeline`] walks chains of alignments to relate a member sequence to an
//!   alignment, an ancestor reference, or a related member.
//! - [`codon`] transcribes codon-aligned segments into amino acids and labels
//!   the codons of a feature.
//! - [`variation`] scans realized segments for nucleotide or amino-acid
//!   patterns.
//! - [`reads`] folds mapped reads into depth, nucleotide, codon, and
//!   variation pileups across a pool of worker threads, configured by
//!   [`config::ReadAnalysisConfig`].
//!
//! ## Composing homologies
//!
//! Two lists of segments can be composed when the query axis of the first is
//! the reference axis of the second. The result relates the reference axis of
//! the first to the query axis of the second.
//!
//! ```
//! use varscope::segment::algebra::translate_segments;
//! use varscope::segment::QueryAlignedSegment;
//!
//! // Reference -> alignment.
//! let first = vec![QueryAlignedSegment::try_new(1, 10, 101, 110)?];
//! // Alignment -> member.
//! let second = vec![QueryAlignedSegment::try_new(105, 120, 5, 20)?];
//!
//! assert_eq!(
//!     translate_segments(&first, &second),
//!     vec![QueryAlignedSegment::try_new(5, 10, 5, 10)?]
//! );
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Transcribing a feature
//!
//! Once a member's segments are restricted to a coding feature and realized
//! with the member's nucleotides, they can be transcribed codon by codon.
//!
//! ```
//! use varscope::codon;
//! use varscope::codon::GeneticCode;
//! use varscope::segment::NtQueryAlignedSegment;
//! use varscope::segment::QueryAlignedSegment;
//!
//! let segment = QueryAlignedSegment::try_new(1, 12, 1, 12)?;
//! let realized = NtQueryAlignedSegment::realize(segment, "ATGGCCAAATTT")?;
//!
//! let amino_acids = codon::transcribe(&GeneticCode::standard(), 1, &[realized]);
//! assert_eq!(amino_acids[0].residues(), "MAKF");
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod codon;
pub mod config;
pub mod pipeline;
pub mod reads;
pub mod segment;
pub mod variation;
