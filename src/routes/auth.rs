use actix_session::Session;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::helper::permission_helpers::{capabilities_of, Capability};
use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::users_db_operations;
use crate::routes::{db_error_response, forbidden, get_conn, not_found};
use crate::DbPool;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/login", web::post().to(login))
        .route("/logout", web::post().to(logout))
        .route("/me", web::get().to(me))
        .route("/users", web::get().to(list_users))
        .route("/users", web::post().to(create_user))
        .route("/users/{user_id}", web::put().to(update_user))
        .route("/users/{user_id}", web::delete().to(delete_user))
        .route("/users/{user_id}/dark-mode", web::put().to(set_dark_mode));
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    session: Session,
    pool: web::Data<DbPool>,
    body: web::Json<LoginRequest>,
) -> impl Responder {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Email and password required" }));
    }

    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    match users_db_operations::verify_credentials(&conn, body.email.trim(), &body.password) {
        Some(user) => {
            if session.insert("user_id", user.id).is_err()
                || session.insert("username", user.username.clone()).is_err()
                || session.insert("role", user.role.clone()).is_err()
            {
                return HttpResponse::InternalServerError()
                    .json(json!({ "success": false, "error": "Session error" }));
            }
            let capabilities = capabilities_of(&user.role);
            HttpResponse::Ok().json(json!({
                "success": true,
                "user": user,
                "capabilities": capabilities,
            }))
        }
        None => HttpResponse::Unauthorized()
            .json(json!({ "success": false, "error": "Invalid credentials" })),
    }
}

async fn logout(session: Session) -> impl Responder {
    session.clear();
    HttpResponse::Ok().json(json!({ "success": true }))
}

async fn me(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match users_db_operations::read_user_by_id(&conn, auth_user.id) {
        Ok(Some(user)) => {
            let capabilities = capabilities_of(&user.role);
            HttpResponse::Ok().json(json!({ "user": user, "capabilities": capabilities }))
        }
        Ok(None) => not_found("User"),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct UserListQuery {
    role: Option<String>,
}

async fn list_users(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    query: web::Query<UserListQuery>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match users_db_operations::read_all_users(&conn, query.role.as_deref()) {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct NewUserRequest {
    username: String,
    email: String,
    password: String,
    role: String,
    #[serde(default)]
    job_title: String,
    #[serde(default)]
    phone: String,
}

async fn create_user(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    body: web::Json<NewUserRequest>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageTeam) {
        return forbidden();
    }
    if body.username.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "All fields required" }));
    }
    if capabilities_of(&body.role).is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Unknown role" }));
    }

    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match users_db_operations::create_user(
        &conn,
        body.username.trim(),
        body.email.trim(),
        &body.password,
        &body.role,
        &body.job_title,
        &body.phone,
    ) {
        Ok(id) => HttpResponse::Ok().json(json!({ "success": true, "id": id })),
        Err(e) => {
            log::warn!("Could not create user: {}", e);
            HttpResponse::BadRequest().json(
                json!({ "success": false, "error": "Username or email already exists" }),
            )
        }
    }
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    username: String,
    email: String,
    role: String,
    #[serde(default)]
    job_title: String,
    #[serde(default)]
    phone: String,
    #[serde(default = "default_active")]
    is_active: bool,
    password: Option<String>,
}

fn default_active() -> bool {
    true
}

async fn update_user(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageTeam) {
        return forbidden();
    }
    let user_id = path.into_inner();

    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match users_db_operations::update_user(
        &conn,
        user_id,
        body.username.trim(),
        body.email.trim(),
        &body.role,
        &body.job_title,
        &body.phone,
        body.is_active,
        body.password.as_deref(),
    ) {
        Ok(0) => not_found("User"),
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

async fn delete_user(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth_user.can(Capability::ManageTeam) {
        return forbidden();
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match users_db_operations::delete_user(&conn, path.into_inner()) {
        Ok(0) => not_found("User"),
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct DarkModeRequest {
    dark_mode: bool,
}

async fn set_dark_mode(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<DarkModeRequest>,
) -> impl Responder {
    let user_id = path.into_inner();
    if user_id != auth_user.id && !auth_user.can(Capability::ManageTeam) {
        return forbidden();
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match users_db_operations::set_dark_mode(&conn, user_id, body.dark_mode) {
        Ok(0) => not_found("User"),
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}
