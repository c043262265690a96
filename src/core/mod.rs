// Core algorithm exports
pub mod engine;
pub mod filters;
pub mod matcher;
pub mod scoring;

pub use engine::SimilarityEngine;
pub use filters::{filter_by_gender, matches_gender, order_by_gender};
pub use matcher::{family_matches, note_matches, Matcher};
pub use scoring::{calculate_similarity_score, raw_similarity_points, score_from_points};
