use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use similar_products::config::Settings;
use similar_products::core::{Matcher, SimilarityEngine};
use similar_products::models::ScoringWeights;
use similar_products::routes::{self, related::AppState};
use similar_products::services::{
    AttributeSource, CatalogClient, GenderTermResolver, InMemoryCatalog, KeyValueStore, MemoryStore,
    SnapshotCache, TieredStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_logging("info", "json");
            return Err(startup_error("Failed to load configuration", e));
        }
    };

    init_logging(&settings.logging.level, &settings.logging.format);

    info!("Starting similar products service...");

    // Catalog: seed file for local runs, the catalog API otherwise
    let (source, resolver): (Arc<dyn AttributeSource>, Arc<dyn GenderTermResolver>) =
        match &settings.catalog.seed_file {
            Some(path) => {
                let catalog = Arc::new(
                    InMemoryCatalog::from_file(path).map_err(|e| startup_error("Failed to load catalog seed", e))?,
                );
                info!("Catalog loaded from seed file {}", path);
                let source: Arc<dyn AttributeSource> = catalog.clone();
                let resolver: Arc<dyn GenderTermResolver> = catalog;
                (source, resolver)
            }
            None => {
                let client = Arc::new(
                    CatalogClient::new(
                        settings.catalog.endpoint.clone(),
                        settings.catalog.api_key.clone(),
                        settings.catalog.per_page.unwrap_or(100),
                        settings.catalog.timeout(),
                    )
                    .map_err(|e| startup_error("Failed to create catalog client", e))?,
                );
                info!("Catalog client initialized for {}", settings.catalog.endpoint);
                let source: Arc<dyn AttributeSource> = client.clone();
                let resolver: Arc<dyn GenderTermResolver> = client;
                (source, resolver)
            }
        };

    // Snapshot store (optional Redis tier)
    let ttl = settings.cache.ttl();
    let store: Arc<dyn KeyValueStore> = match &settings.cache.redis_url {
        Some(url) => {
            let l1_capacity = settings.cache.l1_capacity.unwrap_or(16);
            match TieredStore::new(url, l1_capacity, ttl).await {
                Ok(store) => {
                    info!("Tiered snapshot store initialized (L1: {} entries, TTL: {:?})", l1_capacity, ttl);
                    Arc::new(store)
                }
                Err(e) => {
                    error!("Failed to connect to Redis ({}), keeping snapshots in process", e);
                    Arc::new(MemoryStore::default())
                }
            }
        }
        None => {
            info!("No Redis configured, keeping snapshots in process (TTL: {:?})", ttl);
            Arc::new(MemoryStore::default())
        }
    };

    let cache = Arc::new(SnapshotCache::new(source, resolver, store, ttl));

    // Warm the snapshot; queries rebuild on demand if this fails
    if let Err(e) = cache.ensure_fresh(None).await {
        warn!("Initial snapshot build failed: {}", e);
    }

    let weights = ScoringWeights::from(&settings.scoring.weights);
    info!("Matcher initialized with weights: {:?}", weights);

    let app_state = AppState {
        engine: Arc::new(SimilarityEngine::new(cache, Matcher::new(weights))),
        related: settings.related.clone(),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
