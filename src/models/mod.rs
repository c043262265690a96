// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    expiry_after, AttributeBundle, CatalogEvent, CatalogEventKind, FamilyMatch, Gender, NoteMatch, OptionSet,
    ProductRecord, RawAttributes, RawProduct, RelatedProducts, RelationKind, RelationResult,
    ScoringWeights, SimilarityMatch, Snapshot, SnapshotStats,
};
pub use requests::{CatalogEventRequest, RelatedRequest, SnapshotQuery};
pub use responses::{
    CatalogEventResponse, ErrorResponse, HealthResponse, RelatedResponse, RelationTotals,
    SnapshotResponse,
};
