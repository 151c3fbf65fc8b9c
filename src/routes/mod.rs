use actix_web::HttpResponse;
use serde_json::json;

use crate::helper::workflow_helpers::WorkflowError;
use crate::DbPool;

pub mod auth;
pub mod clients;
pub mod notifications;
pub mod posting_rules;
pub mod posts;
pub mod tasks;

/// Maps the workflow error taxonomy onto HTTP. Everything is recoverable at
/// the caller boundary; only storage failures become 500s.
pub fn workflow_error_response(err: &WorkflowError) -> HttpResponse {
    let body = |kind: &str| json!({ "success": false, "kind": kind, "error": err.to_string() });
    match err {
        WorkflowError::Unauthorized { .. } => HttpResponse::Unauthorized().json(body("unauthorized")),
        WorkflowError::InvalidTransition { .. } => {
            HttpResponse::BadRequest().json(body("invalid_transition"))
        }
        WorkflowError::MissingComment => HttpResponse::BadRequest().json(body("missing_comment")),
        WorkflowError::ValidationFailed(_) => {
            HttpResponse::BadRequest().json(body("validation_failed"))
        }
        WorkflowError::NotFound(_) => HttpResponse::NotFound().json(body("not_found")),
        WorkflowError::ConcurrentModification { .. } => {
            HttpResponse::Conflict().json(body("concurrent_modification"))
        }
        WorkflowError::Db(e) => {
            log::error!("Database error: {}", e);
            HttpResponse::InternalServerError()
                .json(json!({ "success": false, "kind": "internal", "error": "Internal error" }))
        }
    }
}

pub fn db_error_response(err: &rusqlite::Error) -> HttpResponse {
    log::error!("Database error: {}", err);
    HttpResponse::InternalServerError()
        .json(json!({ "success": false, "kind": "internal", "error": "Internal error" }))
}

pub fn forbidden() -> HttpResponse {
    HttpResponse::Unauthorized()
        .json(json!({ "success": false, "kind": "unauthorized", "error": "Not allowed" }))
}

pub fn not_found(what: &str) -> HttpResponse {
    HttpResponse::NotFound()
        .json(json!({ "success": false, "kind": "not_found", "error": format!("{what} not found") }))
}

pub fn pool_error() -> HttpResponse {
    HttpResponse::InternalServerError()
        .json(json!({ "success": false, "kind": "internal", "error": "No database connection" }))
}

/// Grabs a pooled connection or produces the canned 500.
pub fn get_conn(
    pool: &DbPool,
) -> Result<r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>, HttpResponse> {
    pool.get().map_err(|e| {
        log::error!("Connection pool exhausted: {}", e);
        pool_error()
    })
}
