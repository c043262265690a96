use crate::models::{Gender, RawProduct};
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when reading the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error: {0}")]
    ApiError(String),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Supplies every catalog item with its raw comparison attributes
#[async_trait]
pub trait AttributeSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RawProduct>, CatalogError>;
}

/// Maps a raw gender term id to a gender, `None` when the term is unknown
#[async_trait]
pub trait GenderTermResolver: Send + Sync {
    async fn resolve(&self, term_id: i64) -> Result<Option<Gender>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct ProductPage {
    #[serde(default)]
    products: Vec<Value>,
    #[serde(default)]
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenderTerm {
    slug: String,
}

/// Catalog API client
///
/// Reads the product listing page by page and resolves gender terms.
pub struct CatalogClient {
    base_url: String,
    api_key: Option<String>,
    per_page: u32,
    client: Client,
}

impl CatalogClient {
    /// Create a new catalog client
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        per_page: u32,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            per_page: per_page.max(1),
            client,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("X-Api-Key", key),
            None => request,
        }
    }

    async fn fetch_page(&self, page: u32) -> Result<ProductPage, CatalogError> {
        let url = format!("{}/products", self.base_url);

        tracing::debug!("Fetching catalog page {} from: {}", page, url);

        let response = self
            .authorized(self.client.get(&url))
            .query(&[("page", page), ("per_page", self.per_page)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CatalogError::ApiError(format!(
                "Failed to fetch products page {}: {}",
                page,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(format!("Failed to parse products page {}: {}", page, e)))
    }
}

#[async_trait]
impl AttributeSource for CatalogClient {
    async fn fetch_all(&self) -> Result<Vec<RawProduct>, CatalogError> {
        let mut products = Vec::new();
        let mut page = 1;

        loop {
            let body = self.fetch_page(page).await?;
            let fetched = body.products.len();

            // Records that cannot be read at all (no id, no date) are skipped
            products.extend(body.products.into_iter().filter_map(|doc| {
                serde_json::from_value::<RawProduct>(doc)
                    .map_err(|e| tracing::warn!("Skipping unreadable catalog record: {}", e))
                    .ok()
            }));

            let more = match body.total_pages {
                Some(total) => page < total,
                None => fetched as u32 >= self.per_page,
            };
            if fetched == 0 || !more {
                break;
            }
            page += 1;
        }

        tracing::debug!("Fetched {} catalog records over {} page(s)", products.len(), page);

        Ok(products)
    }
}

#[async_trait]
impl GenderTermResolver for CatalogClient {
    async fn resolve(&self, term_id: i64) -> Result<Option<Gender>, CatalogError> {
        let url = format!("{}/terms/gender/{}", self.base_url, term_id);

        let response = self.authorized(self.client.get(&url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CatalogError::ApiError(format!(
                "Failed to resolve gender term {}: {}",
                term_id,
                response.status()
            )));
        }

        let term: GenderTerm = response.json().await?;
        Ok(Some(Gender::from_slug(&term.slug)))
    }
}

/// Catalog contents loadable from a JSON file
#[derive(Debug, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<RawProduct>,
    #[serde(default, rename = "genderTerms", alias = "gender_terms")]
    pub gender_terms: HashMap<i64, Gender>,
}

/// In-process catalog
///
/// Backs local runs from a seed file and doubles as the fake source in tests.
#[derive(Default)]
pub struct InMemoryCatalog {
    products: RwLock<Vec<RawProduct>>,
    gender_terms: RwLock<HashMap<i64, Gender>>,
    unavailable: AtomicBool,
    fetches: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<RawProduct>, gender_terms: HashMap<i64, Gender>) -> Self {
        Self {
            products: RwLock::new(products),
            gender_terms: RwLock::new(gender_terms),
            ..Default::default()
        }
    }

    /// Load a catalog seed file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let seed: CatalogSeed = serde_json::from_str(&content)
            .map_err(|e| CatalogError::InvalidResponse(format!("{}: {}", path.display(), e)))?;

        Ok(Self::new(seed.products, seed.gender_terms))
    }

    /// Insert a product or replace the one with the same id
    pub fn upsert(&self, product: RawProduct) {
        let mut products = self.products.write();
        match products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
    }

    pub fn remove(&self, id: i64) {
        self.products.write().retain(|p| p.id != id);
    }

    /// Make subsequent fetches fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of `fetch_all` calls served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttributeSource for InMemoryCatalog {
    async fn fetch_all(&self) -> Result<Vec<RawProduct>, CatalogError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("catalog marked unavailable".into()));
        }
        Ok(self.products.read().clone())
    }
}

#[async_trait]
impl GenderTermResolver for InMemoryCatalog {
    async fn resolve(&self, term_id: i64) -> Result<Option<Gender>, CatalogError> {
        Ok(self.gender_terms.read().get(&term_id).copied())
    }
}
