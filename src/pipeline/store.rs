//! An in-memory implementation of every provider.

use std::collections::HashMap;
use std::collections::HashSet;

use nonempty::NonEmpty;

use crate::pipeline::AlignmentLink;
use crate::pipeline::AlignmentProvider;
use crate::pipeline::Bound;
use crate::pipeline::Error;
use crate::pipeline::FeatureProvider;
use crate::pipeline::Result;
use crate::pipeline::SequenceId;
use crate::pipeline::SequenceProvider;
use crate::pipeline::VariationProvider;
use crate::segment;
use crate::segment::QueryAlignedSegment;
use crate::segment::ReferenceSegment;
use crate::variation::Variation;

/// A stored alignment.
#[derive(Debug, Default)]
struct AlignmentRecord {
    /// The constraining reference, if any.
    reference: Option<String>,

    /// The parent alignment, if any.
    parent: Option<String>,

    /// The member segments keyed by member.
    members: HashMap<SequenceId, Vec<QueryAlignedSegment>>,
}

/// A stored feature location.
#[derive(Debug)]
struct FeatureLocationRecord {
    /// The reference segments.
    segments: Vec<ReferenceSegment>,

    /// The first nucleotide of codon 1.
    codon1_start: Option<i64>,
}

/// Sequences, alignments, feature locations, and variations held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Nucleotides keyed by sequence.
    sequences: HashMap<SequenceId, String>,

    /// Reference names mapped to their sequences.
    references: HashMap<String, SequenceId>,

    /// Alignments keyed by name.
    alignments: HashMap<String, AlignmentRecord>,

    /// Feature locations keyed by reference and feature name.
    features: HashMap<(String, String), FeatureLocationRecord>,

    /// Variations in insertion order.
    variations: Vec<Variation>,
}

impl MemoryStore {
    /// Adds (or replaces) a sequence.
    pub fn add_sequence(&mut self, id: SequenceId, nucleotides: impl Into<String>) {
        self.sequences.insert(id, nucleotides.into());
    }

    /// Adds a sequence and names it as a reference.
    pub fn add_reference(
        &mut self,
        name: impl Into<String>,
        id: SequenceId,
        nucleotides: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();

        if let Some(existing) = self.references.get(&name) {
            if existing != &id {
                return Err(Error::Provider(format!(
                    "reference {name} already refers to {existing}"
                )));
            }
        }

        self.add_sequence(id.clone(), nucleotides);
        self.references.insert(name, id);
        Ok(())
    }

    /// Adds an alignment, constrained by `reference` if provided, beneath
    /// `parent` if provided.
    pub fn add_alignment(
        &mut self,
        name: impl Into<String>,
        reference: Option<&str>,
        parent: Option<&str>,
    ) -> Result<()> {
        if let Some(reference) = reference {
            if !self.references.contains_key(reference) {
                return Err(Error::UnknownReference(reference.to_string()));
            }
        }

        if let Some(parent) = parent {
            if !self.alignments.contains_key(parent) {
                return Err(Error::UnknownAlignment(parent.to_string()));
            }
        }

        self.alignments.insert(
            name.into(),
            AlignmentRecord {
                reference: reference.map(String::from),
                parent: parent.map(String::from),
                members: HashMap::new(),
            },
        );

        Ok(())
    }

    /// Adds a member to an alignment.
    pub fn add_member(
        &mut self,
        alignment: &str,
        member: SequenceId,
        segments: Vec<QueryAlignedSegment>,
    ) -> Result<()> {
        if !self.sequences.contains_key(&member) {
            return Err(Error::UnknownSequence(member));
        }

        let record = self
            .alignments
            .get_mut(alignment)
            .ok_or_else(|| Error::UnknownAlignment(alignment.to_string()))?;

        record.members.insert(member, segments);
        Ok(())
    }

    /// Adds a feature location.
    pub fn add_feature_location(
        &mut self,
        reference: &str,
        feature: &str,
        segments: Vec<ReferenceSegment>,
        codon1_start: Option<i64>,
    ) -> Result<()> {
        if !self.references.contains_key(reference) {
            return Err(Error::UnknownReference(reference.to_string()));
        }

        self.features.insert(
            (reference.to_string(), feature.to_string()),
            FeatureLocationRecord {
                segments,
                codon1_start,
            },
        );

        Ok(())
    }

    /// Adds a variation to its feature location.
    pub fn add_variation(&mut self, variation: Variation) -> Result<()> {
        self.feature(variation.reference_name(), variation.feature_name())?;
        self.variations.push(variation);
        Ok(())
    }

    /// Gets a feature location record.
    fn feature(&self, reference: &str, feature: &str) -> Result<&FeatureLocationRecord> {
        self.features
            .get(&(reference.to_string(), feature.to_string()))
            .ok_or_else(|| Error::UnknownFeatureLocation {
                reference: reference.to_string(),
                feature: feature.to_string(),
            })
    }
}

impl SequenceProvider for MemoryStore {
    fn nucleotides(&self, id: &SequenceId, range: Option<(i64, i64)>) -> Result<String> {
        let nucleotides = self
            .sequences
            .get(id)
            .ok_or_else(|| Error::UnknownSequence(id.clone()))?;

        if let Some(offset) = nucleotides.bytes().position(|byte| !byte.is_ascii()) {
            return Err(Error::Segment(segment::Error::NonAsciiResidue {
                position: offset as i64 + 1,
            }));
        }

        let (start, end) = match range {
            Some(range) => range,
            None => return Ok(nucleotides.clone()),
        };

        let entity = format!("source {} sequence {}", id.source(), id.sequence());

        let length = nucleotides.len() as i64;

        if start > end {
            return Err(Error::StartAfterEnd { entity, start, end });
        }

        if start < 1 {
            return Err(Error::RangeOutOfBounds {
                entity,
                bound: Bound::Start,
                value: start,
                limit: 1,
            });
        }

        if end > length {
            return Err(Error::RangeOutOfBounds {
                entity,
                bound: Bound::End,
                value: end,
                limit: length,
            });
        }

        Ok(nucleotides[(start - 1) as usize..end as usize].to_string())
    }
}

impl AlignmentProvider for MemoryStore {
    fn member_segments(
        &self,
        alignment: &str,
        member: &SequenceId,
    ) -> Result<Vec<QueryAlignedSegment>> {
        let record = self
            .alignments
            .get(alignment)
            .ok_or_else(|| Error::UnknownAlignment(alignment.to_string()))?;

        record
            .members
            .get(member)
            .cloned()
            .ok_or_else(|| Error::UnknownMember {
                alignment: alignment.to_string(),
                member: member.clone(),
            })
    }

    fn ancestors(&self, alignment: &str) -> Result<NonEmpty<AlignmentLink>> {
        let mut visited = HashSet::new();
        let mut name = alignment.to_string();
        let mut links = Vec::new();

        loop {
            if !visited.insert(name.clone()) {
                return Err(Error::CyclicAncestry(alignment.to_string()));
            }

            let record = self
                .alignments
                .get(&name)
                .ok_or_else(|| Error::UnknownAlignment(name.clone()))?;

            links.push(AlignmentLink::new(name.clone(), record.reference.clone()));

            match &record.parent {
                Some(parent) => name = parent.clone(),
                None => {
                    return NonEmpty::from_vec(links)
                        .ok_or_else(|| Error::UnknownAlignment(alignment.to_string()));
                }
            }
        }
    }

    fn reference_sequence(&self, reference: &str) -> Result<SequenceId> {
        self.references
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::UnknownReference(reference.to_string()))
    }
}

impl FeatureProvider for MemoryStore {
    fn feature_segments(&self, reference: &str, feature: &str) -> Result<Vec<ReferenceSegment>> {
        self.feature(reference, feature)
            .map(|record| record.segments.clone())
    }

    fn codon1_start(&self, reference: &str, feature: &str) -> Result<Option<i64>> {
        self.feature(reference, feature)
            .map(|record| record.codon1_start)
    }
}

impl VariationProvider for MemoryStore {
    fn variations(
        &self,
        reference: &str,
        feature: &str,
        filter: Option<&dyn Fn(&Variation) -> bool>,
    ) -> Result<Vec<Variation>> {
        self.feature(reference, feature)?;

        Ok(self
            .variations
            .iter()
            .filter(|variation| {
                variation.reference_name() == reference && variation.feature_name() == feature
            })
            .filter(|variation| filter.map(|f| f(variation)).unwrap_or(true))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variation::TranslationFormat;

    #[test]
    fn range_violations_name_the_sequence_and_bound() {
        let mut store = MemoryStore::default();
        let id = SequenceId::new("ncbi", "KX000001");
        store.add_sequence(id.clone(), "ACGTACGTAC");

        assert_eq!(store.nucleotides(&id, Some((3, 6))).unwrap(), "GTAC");
        assert_eq!(store.nucleotides(&id, None).unwrap(), "ACGTACGTAC");

        let err = store.nucleotides(&id, Some((5, 11))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "source ncbi sequence KX000001: requested end (11) is beyond the sequence length (10)"
        );

        let err = store.nucleotides(&id, Some((0, 4))).unwrap_err();
        assert!(matches!(
            err,
            Error::RangeOutOfBounds {
                bound: Bound::Start,
                ..
            }
        ));

        let err = store.nucleotides(&id, Some((6, 4))).unwrap_err();
        assert!(matches!(err, Error::StartAfterEnd { start: 6, end: 4, .. }));
    }

    #[test]
    fn non_ascii_sequences_are_rejected() {
        let mut store = MemoryStore::default();
        let id = SequenceId::new("ncbi", "KX000002");
        store.add_sequence(id.clone(), "AéCGT");

        for range in [None, Some((4, 5))] {
            let err = store.nucleotides(&id, range).unwrap_err();
            assert!(matches!(
                err,
                Error::Segment(segment::Error::NonAsciiResidue { position: 2 })
            ));
        }
    }

    #[test]
    fn ancestors_run_from_self_to_root() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut store = MemoryStore::default();
        store.add_reference("R1", SequenceId::new("ref", "1"), "A")?;
        store.add_reference("R2", SequenceId::new("ref", "2"), "A")?;
        store.add_alignment("ROOT", Some("R1"), None)?;
        store.add_alignment("CHILD", Some("R2"), Some("ROOT"))?;

        let ancestors = store.ancestors("CHILD")?;
        let names = ancestors
            .iter()
            .map(|link| link.alignment())
            .collect::<Vec<_>>();

        assert_eq!(names, vec!["CHILD", "ROOT"]);
        assert_eq!(ancestors.head.constraining_reference(), Some("R2"));

        Ok(())
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let mut store = MemoryStore::default();
        let err = store.add_alignment("CHILD", None, Some("MISSING")).unwrap_err();
        assert_eq!(err, Error::UnknownAlignment(String::from("MISSING")));
    }

    #[test]
    fn variations_are_filtered() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut store = MemoryStore::default();
        store.add_reference("REF", SequenceId::new("ref", "1"), "A".repeat(30))?;
        store.add_feature_location(
            "REF",
            "NS5B",
            vec![ReferenceSegment::try_new(1, 30)?],
            Some(1),
        )?;

        for name in ["S282T", "L159F"] {
            store.add_variation(Variation::try_new(
                "REF",
                "NS5B",
                name,
                1,
                3,
                TranslationFormat::AminoAcid,
                "T",
            )?)?;
        }

        let only_s282t = |variation: &Variation| variation.name() == "S282T";
        let found = store.variations("REF", "NS5B", Some(&only_s282t))?;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "S282T");
        assert_eq!(store.variations("REF", "NS5B", None)?.len(), 2);

        Ok(())
    }
}
