use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Ordered set of attribute option tokens for one category
pub type OptionSet = BTreeSet<String>;

/// Gender bucket of a catalog item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Men,
    Women,
    #[default]
    Unisex,
}

impl Gender {
    /// Map a gender term slug, anything unrecognised is unisex
    pub fn from_slug(slug: &str) -> Self {
        match slug.trim().to_ascii_lowercase().as_str() {
            "men" => Gender::Men,
            "women" => Gender::Women,
            _ => Gender::Unisex,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Men => "men",
            Gender::Women => "women",
            Gender::Unisex => "unisex",
        }
    }
}

/// Attribute map as delivered by the catalog, keyed by attribute slug.
///
/// Each value is expected to be either an array of options or an object
/// carrying an `options` array. Anything else reads as "no options".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawAttributes(pub HashMap<String, Value>);

impl RawAttributes {
    pub const CONCENTRATION: &'static str = "pa_concentration";
    pub const FRAGRANCE_TYPE: &'static str = "pa_fragrance-type";
    pub const MAIN_NOTE: &'static str = "pa_main-accord";
    pub const TOP_NOTES: &'static str = "pa_topnotes";
    pub const MIDDLE_NOTES: &'static str = "pa_heart";
    pub const BASE_NOTES: &'static str = "pa_base";
    pub const GENDER: &'static str = "pa_gender";

    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a raw attribute value
    pub fn with(mut self, slug: &str, value: Value) -> Self {
        self.0.insert(slug.to_string(), value);
        self
    }

    fn option_list(&self, slug: &str) -> Option<&Vec<Value>> {
        match self.0.get(slug)? {
            Value::Array(items) => Some(items),
            Value::Object(obj) => obj.get("options").and_then(|o| o.as_array()),
            _ => None,
        }
    }

    /// Options of one category as a set, malformed entries are dropped
    pub fn options(&self, slug: &str) -> OptionSet {
        self.option_list(slug)
            .map(|items| items.iter().filter_map(option_token).collect())
            .unwrap_or_default()
    }

    /// The raw gender term id: first `pa_gender` option, if it is an integer
    pub fn gender_option(&self) -> Option<i64> {
        match self.option_list(Self::GENDER)?.first()? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Normalize into the strongly typed comparison bundle
    pub fn bundle(&self) -> AttributeBundle {
        AttributeBundle {
            concentration: self.options(Self::CONCENTRATION),
            fragrance_type: self.options(Self::FRAGRANCE_TYPE),
            main_note: self.options(Self::MAIN_NOTE),
            top_notes: self.options(Self::TOP_NOTES),
            middle_notes: self.options(Self::MIDDLE_NOTES),
            base_notes: self.options(Self::BASE_NOTES),
        }
    }
}

fn option_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The six comparison categories of a product
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeBundle {
    pub concentration: OptionSet,
    pub fragrance_type: OptionSet,
    pub main_note: OptionSet,
    pub top_notes: OptionSet,
    pub middle_notes: OptionSet,
    pub base_notes: OptionSet,
}

/// Item record as fetched from the attribute source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProduct {
    pub id: i64,
    #[serde(default)]
    pub attributes: RawAttributes,
    #[serde(rename = "createdAt", alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub purchasable: Option<bool>,
}

/// Normalized catalog item held in the snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: i64,
    pub attributes: AttributeBundle,
    pub gender: Gender,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    pub purchasable: bool,
}

impl ProductRecord {
    /// Normalize a raw product with its already resolved gender
    pub fn normalize(raw: &RawProduct, gender: Gender) -> Self {
        Self {
            id: raw.id,
            attributes: raw.attributes.bundle(),
            gender,
            created_at: raw.created_at,
            purchasable: raw.purchasable.unwrap_or(false),
        }
    }
}

/// `start + ttl`, saturating at the latest representable instant
pub fn expiry_after(start: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
        .and_then(|ttl| start.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Immutable, time-bounded view of the whole catalog.
///
/// Records are ordered newest first; ids are unique.
#[derive(Debug)]
pub struct Snapshot {
    records: Vec<ProductRecord>,
    index: HashMap<i64, usize>,
    built_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl Snapshot {
    /// Sort records by creation date (newest first, ties keep source order)
    /// and key them by id. A repeated id keeps its first position and takes
    /// the later record.
    pub fn build(mut records: Vec<ProductRecord>, built_at: DateTime<Utc>, ttl: Duration) -> Self {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let expires_at = expiry_after(built_at, ttl);
        Self::from_ordered(records, built_at, expires_at)
    }

    fn from_ordered(records: Vec<ProductRecord>, built_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        let mut ordered: Vec<ProductRecord> = Vec::with_capacity(records.len());
        let mut index = HashMap::with_capacity(records.len());

        for record in records {
            match index.get(&record.id) {
                Some(&position) => ordered[position] = record,
                None => {
                    index.insert(record.id, ordered.len());
                    ordered.push(record);
                }
            }
        }

        Self {
            records: ordered,
            index,
            built_at,
            expires_at,
        }
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    /// Purchasable records in snapshot order
    pub fn purchasable(&self) -> impl Iterator<Item = &ProductRecord> {
        self.records.iter().filter(|r| r.purchasable)
    }

    pub fn get(&self, id: i64) -> Option<&ProductRecord> {
        self.index.get(&id).map(|&position| &self.records[position])
    }

    pub fn contains(&self, id: i64) -> bool {
        self.index.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Serialize)]
struct StoredSnapshotRef<'a> {
    records: &'a [ProductRecord],
    #[serde(rename = "builtAt")]
    built_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StoredSnapshot {
    records: Vec<ProductRecord>,
    #[serde(rename = "builtAt")]
    built_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    expires_at: DateTime<Utc>,
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StoredSnapshotRef {
            records: &self.records,
            built_at: self.built_at,
            expires_at: self.expires_at,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = StoredSnapshot::deserialize(deserializer)?;
        Ok(Snapshot::from_ordered(stored.records, stored.built_at, stored.expires_at))
    }
}

/// Item with an identical fragrance-type set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyMatch {
    pub id: i64,
}

/// Item with an identical main-note set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMatch {
    pub id: i64,
    pub gender: Gender,
}

/// Item with a positive weighted similarity score (multiple of 5, at most 100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    pub id: i64,
    pub score: u8,
}

/// One relation of any kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RelationResult {
    FamilyMatch { id: i64 },
    NoteMatch { id: i64, gender: Gender },
    SimilarityMatch { id: i64, score: u8 },
}

impl RelationResult {
    pub fn id(&self) -> i64 {
        match *self {
            RelationResult::FamilyMatch { id }
            | RelationResult::NoteMatch { id, .. }
            | RelationResult::SimilarityMatch { id, .. } => id,
        }
    }

    pub fn kind(&self) -> RelationKind {
        match self {
            RelationResult::FamilyMatch { .. } => RelationKind::Family,
            RelationResult::NoteMatch { .. } => RelationKind::MainNote,
            RelationResult::SimilarityMatch { .. } => RelationKind::Similar,
        }
    }
}

impl From<FamilyMatch> for RelationResult {
    fn from(m: FamilyMatch) -> Self {
        RelationResult::FamilyMatch { id: m.id }
    }
}

impl From<NoteMatch> for RelationResult {
    fn from(m: NoteMatch) -> Self {
        RelationResult::NoteMatch { id: m.id, gender: m.gender }
    }
}

impl From<SimilarityMatch> for RelationResult {
    fn from(m: SimilarityMatch) -> Self {
        RelationResult::SimilarityMatch { id: m.id, score: m.score }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Family,
    MainNote,
    Similar,
}

/// The three relation sets computed for one source item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedProducts {
    pub family: Vec<FamilyMatch>,
    #[serde(rename = "mainNote")]
    pub main_note: Vec<NoteMatch>,
    pub similar: Vec<SimilarityMatch>,
}

impl RelatedProducts {
    /// First `count` family matches in scan order
    pub fn top_family(&self, count: usize) -> &[FamilyMatch] {
        &self.family[..count.min(self.family.len())]
    }

    /// First `count` main-note matches in scan order
    pub fn top_main_note(&self, count: usize) -> &[NoteMatch] {
        &self.main_note[..count.min(self.main_note.len())]
    }

    /// Highest scores first; equal scores keep scan order
    pub fn top_similar(&self, count: usize, offset: usize) -> Vec<SimilarityMatch> {
        let mut ranked = self.similar.clone();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked.into_iter().skip(offset).take(count).collect()
    }

    pub fn count(&self, kind: RelationKind) -> usize {
        match kind {
            RelationKind::Family => self.family.len(),
            RelationKind::MainNote => self.main_note.len(),
            RelationKind::Similar => self.similar.len(),
        }
    }

    pub fn has_any(&self, kind: RelationKind) -> bool {
        self.count(kind) > 0
    }

    /// All relations flattened, family first, then main note, then similar
    pub fn results(&self) -> Vec<RelationResult> {
        self.family
            .iter()
            .map(|&m| RelationResult::from(m))
            .chain(self.main_note.iter().map(|&m| RelationResult::from(m)))
            .chain(self.similar.iter().map(|&m| RelationResult::from(m)))
            .collect()
    }
}

/// Weights of the similarity score formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub fragrance_type: f64,
    pub main_note: f64,
    pub concentration: f64,
    pub top_notes: f64,
    pub middle_notes: f64,
    pub base_notes: f64,
    pub note_bonus: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            fragrance_type: 20.0,
            main_note: 10.0,
            concentration: 5.0,
            top_notes: 5.0,
            middle_notes: 5.0,
            base_notes: 15.0,
            note_bonus: 40.0,
        }
    }
}

/// Kind of catalog mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogEventKind {
    Created,
    Updated,
    Deleted,
}

/// Item created, updated or deleted in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEvent {
    #[serde(rename = "itemId")]
    pub item_id: i64,
    pub kind: CatalogEventKind,
}

/// Snapshot diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub items: usize,
    pub purchasable: usize,
    pub fresh: bool,
    #[serde(rename = "builtAt")]
    pub built_at: Option<DateTime<Utc>>,
    #[serde(rename = "expiresAt")]
    pub expires_at: Option<DateTime<Utc>>,
    pub rebuilds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(id: i64, day: u32) -> ProductRecord {
        ProductRecord {
            id,
            attributes: AttributeBundle::default(),
            gender: Gender::Unisex,
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            purchasable: true,
        }
    }

    #[test]
    fn test_gender_from_slug() {
        assert_eq!(Gender::from_slug("men"), Gender::Men);
        assert_eq!(Gender::from_slug(" Women "), Gender::Women);
        assert_eq!(Gender::from_slug("kids"), Gender::Unisex);
    }

    #[test]
    fn test_raw_attributes_accept_arrays_and_option_objects() {
        let raw = RawAttributes::new()
            .with(RawAttributes::TOP_NOTES, json!([12, "bergamot", 12]))
            .with(RawAttributes::BASE_NOTES, json!({ "options": ["musk"] }))
            .with(RawAttributes::MIDDLE_NOTES, json!("not-a-list"))
            .with(RawAttributes::CONCENTRATION, json!([null, {}, " "]));

        let bundle = raw.bundle();
        assert_eq!(bundle.top_notes.len(), 2);
        assert!(bundle.top_notes.contains("12"));
        assert!(bundle.base_notes.contains("musk"));
        assert!(bundle.middle_notes.is_empty());
        assert!(bundle.concentration.is_empty());
        assert!(bundle.fragrance_type.is_empty());
    }

    #[test]
    fn test_gender_option() {
        let raw = RawAttributes::new().with(RawAttributes::GENDER, json!({ "options": [31, 32] }));
        assert_eq!(raw.gender_option(), Some(31));

        let raw = RawAttributes::new().with(RawAttributes::GENDER, json!(["40"]));
        assert_eq!(raw.gender_option(), Some(40));

        assert_eq!(RawAttributes::new().gender_option(), None);
    }

    #[test]
    fn test_snapshot_orders_newest_first() {
        let snapshot = Snapshot::build(
            vec![record(1, 1), record(2, 3), record(3, 2)],
            Utc::now(),
            Duration::from_secs(60),
        );

        let ids: Vec<i64> = snapshot.records().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!(snapshot.contains(3));
        assert_eq!(snapshot.get(3).map(|r| r.id), Some(3));
    }

    #[test]
    fn test_snapshot_duplicate_id_keeps_first_position() {
        let mut replacement = record(1, 1);
        replacement.purchasable = false;

        let snapshot = Snapshot::build(
            vec![record(1, 2), record(2, 2), replacement],
            Utc::now(),
            Duration::from_secs(60),
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records()[0].id, 1);
        assert!(!snapshot.records()[0].purchasable);
    }

    #[test]
    fn test_snapshot_serde_keeps_order_and_index() {
        let snapshot = Snapshot::build(
            vec![record(5, 1), record(6, 2)],
            Utc::now(),
            Duration::from_secs(60),
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: Snapshot = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.records(), snapshot.records());
        assert_eq!(restored.expires_at(), snapshot.expires_at());
        assert!(restored.contains(5));
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, Duration::from_secs(60)), now + chrono::TimeDelta::seconds(60));
        assert_eq!(expiry_after(now, Duration::from_secs(u64::MAX)), DateTime::<Utc>::MAX_UTC);

        let snapshot = Snapshot::build(vec![record(1, 1)], now, Duration::from_secs(i64::MAX as u64));
        assert_eq!(snapshot.expires_at(), DateTime::<Utc>::MAX_UTC);
        assert!(snapshot.is_valid_at(now));
    }

    #[test]
    fn test_top_similar_is_stable_on_ties() {
        let related = RelatedProducts {
            similar: vec![
                SimilarityMatch { id: 1, score: 40 },
                SimilarityMatch { id: 2, score: 75 },
                SimilarityMatch { id: 3, score: 40 },
                SimilarityMatch { id: 4, score: 90 },
            ],
            ..Default::default()
        };

        let ids: Vec<i64> = related.top_similar(3, 0).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![4, 2, 1]);

        let ids: Vec<i64> = related.top_similar(5, 2).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_counts_and_results() {
        let related = RelatedProducts {
            family: vec![FamilyMatch { id: 7 }],
            main_note: vec![],
            similar: vec![SimilarityMatch { id: 8, score: 10 }],
        };

        assert!(related.has_any(RelationKind::Family));
        assert!(!related.has_any(RelationKind::MainNote));
        assert_eq!(related.count(RelationKind::Similar), 1);
        assert_eq!(related.top_family(10).len(), 1);

        let results = related.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].kind(), RelationKind::Family);
        assert_eq!(results[1].id(), 8);
    }
}
