use crate::core::{
    filters::{filter_by_gender, order_by_gender},
    scoring::{raw_similarity_points, score_from_points},
};
use crate::models::{
    AttributeBundle, FamilyMatch, Gender, NoteMatch, ProductRecord, RelatedProducts, ScoringWeights,
    SimilarityMatch, Snapshot,
};

/// Relation computation over a snapshot
///
/// # Pipeline
/// 1. Purchasable records only
/// 2. Gender compatibility filter
/// 3. Family and note matching over the gender-ordered records
/// 4. Weighted scoring over the filtered records in snapshot order
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
}

impl Matcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Compute all three relation sets for a source item
    ///
    /// # Arguments
    /// * `source_id` - Id of the source item, never part of its own results
    /// * `source` - Normalized attributes of the source item
    /// * `gender` - Gender of the source item
    /// * `snapshot` - The catalog snapshot to search
    pub fn relate(
        &self,
        source_id: i64,
        source: &AttributeBundle,
        gender: Gender,
        snapshot: &Snapshot,
    ) -> RelatedProducts {
        let compatible = filter_by_gender(snapshot.purchasable(), gender);
        let ordered = order_by_gender(compatible.iter().copied(), gender);

        RelatedProducts {
            family: family_matches(source_id, source, &ordered),
            main_note: note_matches(source_id, source, &ordered),
            similar: self.similar_products(source_id, source, &compatible),
        }
    }

    /// Score every candidate except the source, keeping those with any
    /// points at all. A kept item may still report a rounded score of 0.
    pub fn similar_products(
        &self,
        source_id: i64,
        source: &AttributeBundle,
        candidates: &[&ProductRecord],
    ) -> Vec<SimilarityMatch> {
        candidates
            .iter()
            .filter(|record| record.id != source_id)
            .filter_map(|record| {
                let points = raw_similarity_points(source, &record.attributes, &self.weights);
                if points > 0.0 {
                    Some(SimilarityMatch {
                        id: record.id,
                        score: score_from_points(points) as u8,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}

/// Candidates whose fragrance-type set equals the source's
pub fn family_matches(
    source_id: i64,
    source: &AttributeBundle,
    candidates: &[&ProductRecord],
) -> Vec<FamilyMatch> {
    if source.fragrance_type.is_empty() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|record| record.id != source_id && record.attributes.fragrance_type == source.fragrance_type)
        .map(|record| FamilyMatch { id: record.id })
        .collect()
}

/// Candidates whose main-note set equals the source's
pub fn note_matches(
    source_id: i64,
    source: &AttributeBundle,
    candidates: &[&ProductRecord],
) -> Vec<NoteMatch> {
    if source.main_note.is_empty() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter(|record| record.id != source_id && record.attributes.main_note == source.main_note)
        .map(|record| NoteMatch {
            id: record.id,
            gender: record.gender,
        })
        .collect()
}
