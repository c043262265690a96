//! Similar Products - related-products recommendation service for a fragrance catalog
//!
//! This library scrapes the catalog into a cached snapshot of comparison
//! attributes and computes family, main-note and weighted-similarity
//! relations for a source item against it.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{calculate_similarity_score, Matcher, SimilarityEngine};
pub use models::{AttributeBundle, Gender, ProductRecord, RawAttributes, RawProduct, RelatedProducts, ScoringWeights, Snapshot};
pub use services::{SnapshotCache, SnapshotError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let bundle = AttributeBundle::default();
        let score = calculate_similarity_score(&bundle, &bundle, &ScoringWeights::default());
        assert_eq!(score, 0.0);
    }
}
