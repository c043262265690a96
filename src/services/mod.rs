// Service exports
pub mod cache;
pub mod catalog;
pub mod snapshot;

pub use cache::{CacheError, CacheKey, Clock, KeyValueStore, ManualClock, MemoryStore, SystemClock, TieredStore};
pub use catalog::{AttributeSource, CatalogClient, CatalogError, CatalogSeed, GenderTermResolver, InMemoryCatalog};
pub use snapshot::{SnapshotCache, SnapshotError, DEFAULT_SNAPSHOT_TTL};
