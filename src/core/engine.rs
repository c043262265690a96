use crate::core::Matcher;
use crate::models::{AttributeBundle, Gender, ProductRecord, RawAttributes, RelatedProducts};
use crate::services::{SnapshotCache, SnapshotError};
use std::sync::Arc;

/// Related-products service: keeps the snapshot fresh and runs the matcher on it
pub struct SimilarityEngine {
    cache: Arc<SnapshotCache>,
    matcher: Matcher,
}

impl SimilarityEngine {
    pub fn new(cache: Arc<SnapshotCache>, matcher: Matcher) -> Self {
        Self { cache, matcher }
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Compute family, main-note and similarity relations for a source item
    /// given its raw catalog attributes.
    pub async fn get_related(
        &self,
        source_id: i64,
        attributes: &RawAttributes,
    ) -> Result<RelatedProducts, SnapshotError> {
        let gender = self.cache.resolve_gender(attributes.gender_option()).await;
        self.get_related_for(source_id, &attributes.bundle(), gender).await
    }

    /// Same as [`get_related`](Self::get_related) for already normalized attributes
    pub async fn get_related_for(
        &self,
        source_id: i64,
        source: &AttributeBundle,
        gender: Gender,
    ) -> Result<RelatedProducts, SnapshotError> {
        let snapshot = match self.cache.ensure_fresh(Some(source_id)).await {
            Ok(snapshot) => snapshot,
            // Only the rebuild for an unknown source failed; the snapshot itself is fine
            Err(SnapshotError::SourceUnavailable(e)) => match self.cache.current() {
                Some(snapshot) => {
                    tracing::warn!(
                        "Rebuild for unknown item {} failed ({}), using current snapshot",
                        source_id,
                        e
                    );
                    snapshot
                }
                None => return Err(SnapshotError::SourceUnavailable(e)),
            },
            Err(e) => return Err(e),
        };
        let related = self.matcher.relate(source_id, source, gender, &snapshot);

        tracing::debug!(
            "Related for {} ({}): {} family, {} main note, {} similar (from {} items)",
            source_id,
            gender.as_str(),
            related.family.len(),
            related.main_note.len(),
            related.similar.len(),
            snapshot.len()
        );

        Ok(related)
    }

    /// Current snapshot records, optionally without unpurchasable items
    pub async fn read_snapshot(
        &self,
        exclude_unpurchasable: bool,
    ) -> Result<Vec<ProductRecord>, SnapshotError> {
        self.cache.read(exclude_unpurchasable).await
    }
}
