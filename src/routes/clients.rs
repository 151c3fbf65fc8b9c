use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::helper::permission_helpers::Capability;
use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::clients_db_operations::{self, ClientUpdate, TeamAssignments};
use crate::routes::{db_error_response, forbidden, get_conn, not_found};
use crate::DbPool;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/clients", web::get().to(list_clients))
        .route("/clients", web::post().to(create_client))
        .route("/clients/overview", web::get().to(clients_overview))
        .route("/clients/{client_id}", web::get().to(get_client))
        .route("/clients/{client_id}", web::put().to(update_client))
        .route("/clients/{client_id}", web::delete().to(delete_client))
        .route("/clients/{client_id}/coverage", web::get().to(client_coverage));
}

async fn list_clients(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    if !auth_user.can(Capability::ViewClients) {
        return forbidden();
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match clients_db_operations::read_all_clients(&conn) {
        Ok(clients) => HttpResponse::Ok().json(clients),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct NewClientRequest {
    name: String,
    #[serde(default)]
    company: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    brief_text: String,
    #[serde(default)]
    content_requirements: String,
    #[serde(flatten)]
    assignments: TeamAssignments,
}

async fn create_client(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    body: web::Json<NewClientRequest>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageClients) {
        return forbidden();
    }
    if body.name.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Client name required" }));
    }

    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match clients_db_operations::create_client(
        &conn,
        body.name.trim(),
        &body.company,
        &body.email,
        &body.brief_text,
        &body.content_requirements,
        &body.assignments,
    ) {
        Ok(id) => HttpResponse::Ok().json(json!({ "success": true, "id": id })),
        Err(e) => db_error_response(&e),
    }
}

async fn get_client(
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
    match clients_db_operations::read_client(&conn, path.into_inner()) {
        Ok(Some(client)) => HttpResponse::Ok().json(client),
        Ok(None) => not_found("Client"),
        Err(e) => db_error_response(&e),
    }
}

async fn update_client(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<ClientUpdate>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageClients) {
        return forbidden();
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
    match clients_db_operations::update_client(&conn, client_id, &body) {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

async fn delete_client(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageClients) {
        return forbidden();
    }
    let mut conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match clients_db_operations::delete_client(&mut conn, path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

async fn clients_overview(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    if !auth_user.can(Capability::ViewClients) {
        return forbidden();
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let today = Utc::now().date_naive();
    match clients_db_operations::clients_overview(&conn, today) {
        Ok(overview) => {
            // Surface clients heading into an empty week.
            let alerts: Vec<_> = overview
                .iter()
                .filter(|entry| entry.next_week_coverage == 0)
                .map(|entry| {
                    json!({
                        "kind": "no_coverage",
                        "client_id": entry.client.id,
                        "client_name": entry.client.name,
                        "message": format!("{} has no posts scheduled next week", entry.client.name),
                    })
                })
                .collect();
            HttpResponse::Ok().json(json!({ "clients": overview, "alerts": alerts }))
        }
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct CoverageQuery {
    weeks: Option<u32>,
}

async fn client_coverage(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    query: web::Query<CoverageQuery>,
) -> impl Responder {
    if !auth_user.can(Capability::ViewClients) {
        return forbidden();
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let weeks = query.weeks.unwrap_or(4).min(12);
    let today = Utc::now().date_naive();
    match clients_db_operations::client_coverage(&conn, path.into_inner(), today, weeks) {
        Ok(coverage) => HttpResponse::Ok().json(json!({ "coverage": coverage })),
        Err(e) => db_error_response(&e),
    }
}
