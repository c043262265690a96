use crate::models::domain::RawAttributes;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request for the related products of one item
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RelatedRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "product_id", rename = "productId")]
    pub product_id: i64,
    #[serde(default)]
    pub attributes: RawAttributes,
    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

/// Query string of the snapshot listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotQuery {
    #[serde(default, alias = "exclude_unpurchasable", rename = "excludeUnpurchasable")]
    pub exclude_unpurchasable: bool,
}

/// Catalog mutation notification
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CatalogEventRequest {
    #[validate(range(min = 1))]
    #[serde(alias = "item_id", rename = "itemId")]
    pub item_id: i64,
    #[serde(alias = "event_type", rename = "eventType")]
    pub event_type: String,
}
