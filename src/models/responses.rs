use serde::{Deserialize, Serialize};
use crate::models::domain::{FamilyMatch, NoteMatch, ProductRecord, SimilarityMatch, SnapshotStats};

/// Response for the related products endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedResponse {
    #[serde(rename = "productId")]
    pub product_id: i64,
    pub family: Vec<FamilyMatch>,
    #[serde(rename = "mainNote")]
    pub main_note: Vec<NoteMatch>,
    pub similar: Vec<SimilarityMatch>,
    pub totals: RelationTotals,
}

/// Size of each relation set before slicing
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RelationTotals {
    pub family: usize,
    #[serde(rename = "mainNote")]
    pub main_note: usize,
    pub similar: usize,
}

/// Response for the snapshot listing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub count: usize,
    pub records: Vec<ProductRecord>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub snapshot: SnapshotStats,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// Catalog event response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEventResponse {
    pub accepted: bool,
    pub rebuilt: bool,
}
