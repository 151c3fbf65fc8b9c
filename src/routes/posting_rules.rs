use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::helper::permission_helpers::Capability;
use crate::helper::{calendar_helpers, schedule_helpers};
use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::{
    clients_db_operations, posts_db_operations, rules_db_operations,
};
use crate::routes::{db_error_response, forbidden, get_conn, not_found};
use crate::DbPool;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/clients/{client_id}/posting-rules",
        web::get().to(list_rules),
    )
    .route(
        "/clients/{client_id}/posting-rules",
        web::post().to(create_rule),
    )
    .route(
        "/clients/{client_id}/planned-slots",
        web::get().to(planned_slots),
    )
    .route("/posting-rules/{rule_id}", web::put().to(update_rule))
    .route("/posting-rules/{rule_id}", web::delete().to(delete_rule));
}

async fn list_rules(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth_user.can(Capability::ViewClients) {
        return forbidden();
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match rules_db_operations::read_rules_for_client(&conn, path.into_inner(), false) {
        Ok(rules) => HttpResponse::Ok().json(rules),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct NewRuleRequest {
    platform: String,
    #[serde(default = "default_content_type")]
    content_type: String,
    posting_days: Vec<String>,
    posting_hours: Vec<String>,
    #[serde(default = "default_posts_per_day")]
    posts_per_day: u32,
    #[serde(default)]
    notes: String,
}

fn default_content_type() -> String {
    "post".to_string()
}

fn default_posts_per_day() -> u32 {
    1
}

async fn create_rule(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<NewRuleRequest>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageRules) {
        return forbidden();
    }
    if body.platform.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Platform required" }));
    }
    if body.posting_days.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Posting days required" }));
    }
    if body.posting_hours.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Posting hours required" }));
    }
    if let Some(bad) = body
        .posting_days
        .iter()
        .find(|token| schedule_helpers::parse_day_code(token).is_none())
    {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": format!("Unknown day code '{bad}'") }));
    }

    let client_id = path.into_inner();
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match clients_db_operations::read_client(&conn, client_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Client"),
        Err(e) => return db_error_response(&e),
    }

    match rules_db_operations::create_rule(
        &conn,
        client_id,
        body.platform.trim(),
        &body.content_type,
        &body.posting_days,
        &body.posting_hours,
        body.posts_per_day.max(1),
        &body.notes,
    ) {
        Ok(id) => HttpResponse::Ok().json(json!({ "success": true, "id": id })),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct RuleUpdateRequest {
    posting_days: Option<Vec<String>>,
    posting_hours: Option<Vec<String>>,
    posts_per_day: Option<u32>,
    is_active: Option<bool>,
    notes: Option<String>,
}

async fn update_rule(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<RuleUpdateRequest>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageRules) {
        return forbidden();
    }
    if body.posting_days.as_ref().is_some_and(|days| days.is_empty()) {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Posting days required" }));
    }
    if body
        .posting_hours
        .as_ref()
        .is_some_and(|hours| hours.is_empty())
    {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Posting hours required" }));
    }

    let rule_id = path.into_inner();
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match rules_db_operations::read_rule(&conn, rule_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Posting rule"),
        Err(e) => return db_error_response(&e),
    }

    match rules_db_operations::update_rule(
        &conn,
        rule_id,
        body.posting_days.as_deref(),
        body.posting_hours.as_deref(),
        body.posts_per_day,
        body.is_active,
        body.notes.as_deref(),
    ) {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

async fn delete_rule(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageRules) {
        return forbidden();
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match rules_db_operations::delete_rule(&conn, path.into_inner()) {
        Ok(0) => not_found("Posting rule"),
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct SlotQuery {
    year: i32,
    month: u32,
}

/// The month's content obligations for a client: every posting rule
/// expanded into dated slots, each marked filled or still needing content.
async fn planned_slots(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    query: web::Query<SlotQuery>,
) -> impl Responder {
    if !auth_user.can(Capability::ViewClients) {
        return forbidden();
    }
    let Some(window) = calendar_helpers::month_window(query.year, query.month) else {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Invalid year/month" }));
    };

    let client_id = path.into_inner();
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let rules = match rules_db_operations::read_rules_for_client(&conn, client_id, true) {
        Ok(rules) => rules,
        Err(e) => return db_error_response(&e),
    };
    let posts = match posts_db_operations::read_posts_in_month(
        &conn,
        (&window.0, &window.1),
        Some(client_id),
        true,
    ) {
        Ok(posts) => posts,
        Err(e) => return db_error_response(&e),
    };

    let slots = schedule_helpers::expand_posting_slots(&rules, &posts, query.year, query.month);
    let unfilled = slots.iter().filter(|s| !s.filled).count();
    HttpResponse::Ok().json(json!({
        "year": query.year,
        "month": query.month,
        "slots": slots,
        "unfilled": unfilled,
    }))
}
