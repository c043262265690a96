use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::config::RelatedSettings;
use crate::core::SimilarityEngine;
use crate::models::{
    CatalogEvent, CatalogEventKind, CatalogEventRequest, CatalogEventResponse, ErrorResponse,
    HealthResponse, RelatedRequest, RelatedResponse, RelationKind, RelationTotals, SnapshotQuery,
    SnapshotResponse,
};
use crate::services::SnapshotError;
use std::sync::Arc;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SimilarityEngine>,
    pub related: RelatedSettings,
}

/// Configure all related-products routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/related", web::post().to(find_related))
        .route("/snapshot", web::get().to(get_snapshot))
        .route("/snapshot/invalidate", web::post().to(invalidate_snapshot))
        .route("/catalog/events", web::post().to(catalog_event));
}

fn snapshot_error_response(context: &str, err: SnapshotError) -> HttpResponse {
    tracing::error!("{}: {}", context, err);
    let body = ErrorResponse {
        error: context.to_string(),
        message: err.to_string(),
        status_code: 503,
    };
    match err {
        SnapshotError::SourceUnavailable(_) => HttpResponse::ServiceUnavailable().json(body),
        SnapshotError::Store(_) => HttpResponse::InternalServerError().json(ErrorResponse {
            status_code: 500,
            ..body
        }),
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let stats = state.engine.cache().stats();
    let status = if stats.fresh { "healthy" } else { "cold" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        snapshot: stats,
    })
}

/// Related products endpoint
///
/// POST /api/v1/related
///
/// Request body:
/// ```json
/// {
///   "productId": 42,
///   "attributes": { "pa_fragrance-type": { "options": [12, 14] } },
///   "count": 5,
///   "offset": 0
/// }
/// ```
async fn find_related(
    state: web::Data<AppState>,
    req: web::Json<RelatedRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for related request: field_errors={:?}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let count = req
        .count
        .unwrap_or(state.related.default_count)
        .min(state.related.max_count);

    tracing::info!("Finding related products for: {}, count: {}", req.product_id, count);

    let related = match state.engine.get_related(req.product_id, &req.attributes).await {
        Ok(related) => related,
        Err(e) => return snapshot_error_response("Failed to compute related products", e),
    };

    let response = RelatedResponse {
        product_id: req.product_id,
        family: related.top_family(count).to_vec(),
        main_note: related.top_main_note(count).to_vec(),
        similar: related.top_similar(count, req.offset),
        totals: RelationTotals {
            family: related.count(RelationKind::Family),
            main_note: related.count(RelationKind::MainNote),
            similar: related.count(RelationKind::Similar),
        },
    };

    HttpResponse::Ok().json(response)
}

/// Snapshot listing
///
/// GET /api/v1/snapshot?excludeUnpurchasable=true
async fn get_snapshot(
    state: web::Data<AppState>,
    query: web::Query<SnapshotQuery>,
) -> impl Responder {
    match state.engine.read_snapshot(query.exclude_unpurchasable).await {
        Ok(records) => HttpResponse::Ok().json(SnapshotResponse {
            count: records.len(),
            records,
        }),
        Err(e) => snapshot_error_response("Failed to read snapshot", e),
    }
}

/// Explicit invalidation, the next query rebuilds
async fn invalidate_snapshot(state: web::Data<AppState>) -> impl Responder {
    match state.engine.cache().invalidate().await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => snapshot_error_response("Failed to invalidate snapshot", e),
    }
}

/// Catalog mutation notification
///
/// POST /api/v1/catalog/events
///
/// Request body:
/// ```json
/// {
///   "itemId": 42,
///   "eventType": "created|updated|deleted"
/// }
/// ```
async fn catalog_event(
    state: web::Data<AppState>,
    req: web::Json<CatalogEventRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let kind = match req.event_type.to_lowercase().as_str() {
        "created" => CatalogEventKind::Created,
        "updated" => CatalogEventKind::Updated,
        "deleted" => CatalogEventKind::Deleted,
        _ => {
            return HttpResponse::BadRequest().json(ErrorResponse {
                error: "Invalid event type".to_string(),
                message: "Event type must be one of: created, updated, deleted".to_string(),
                status_code: 400,
            });
        }
    };

    let event = CatalogEvent {
        item_id: req.item_id,
        kind,
    };

    match state.engine.cache().handle_event(&event).await {
        Ok(rebuilt) => HttpResponse::Ok().json(CatalogEventResponse {
            accepted: true,
            rebuilt,
        }),
        Err(e) => snapshot_error_response("Failed to apply catalog event", e),
    }
}
