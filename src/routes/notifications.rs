use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::notifications_db_operations;
use crate::routes::{db_error_response, get_conn};
use crate::DbPool;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/notifications", web::get().to(list_notifications))
        .route("/notifications/count", web::get().to(unread_count))
        .route(
            "/notifications/{notification_id}/read",
            web::put().to(mark_read),
        )
        .route("/notifications/read-all", web::put().to(mark_all_read));
}

async fn list_notifications(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match notifications_db_operations::read_for_user(&conn, auth_user.id, 100) {
        Ok(notifications) => HttpResponse::Ok().json(notifications),
        Err(e) => db_error_response(&e),
    }
}

async fn unread_count(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match notifications_db_operations::unread_count(&conn, auth_user.id) {
        Ok(count) => HttpResponse::Ok().json(json!({ "count": count })),
        Err(e) => db_error_response(&e),
    }
}

async fn mark_read(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match notifications_db_operations::mark_read(&conn, path.into_inner()) {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

async fn mark_all_read(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match notifications_db_operations::mark_all_read(&conn, auth_user.id) {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}
