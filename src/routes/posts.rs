use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::helper::permission_helpers::Capability;
use crate::helper::workflow_helpers::TransitionRequest;
use crate::helper::{calendar_helpers, upload_helpers};
use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::posts_db_operations::{
    self, NewPost, PostFilters, PostUpdate,
};
use crate::models::{AssetKind, WorkflowStatus};
use crate::publish::{self, Publisher};
use crate::routes::{db_error_response, forbidden, get_conn, not_found, workflow_error_response};
use crate::DbPool;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/clients/{client_id}/posts", web::post().to(create_post))
        .route("/posts", web::get().to(list_posts))
        .route("/posts/calendar", web::get().to(calendar))
        .route("/posts/my-work", web::get().to(my_work))
        .route("/pipeline", web::get().to(pipeline))
        .route("/run-scheduler", web::post().to(run_scheduler))
        .route("/posts/{post_id}", web::get().to(get_post))
        .route("/posts/{post_id}", web::put().to(update_post))
        .route("/posts/{post_id}", web::delete().to(delete_post))
        .route("/posts/{post_id}/reschedule", web::put().to(reschedule))
        .route("/posts/{post_id}/transition", web::post().to(transition))
        .route("/posts/{post_id}/history", web::get().to(history))
        .route("/posts/{post_id}/comments", web::get().to(get_comments))
        .route("/posts/{post_id}/comments", web::post().to(add_comment))
        .route(
            "/posts/{post_id}/upload-design",
            web::post().to(upload_design),
        )
        .route(
            "/posts/{post_id}/upload-reference",
            web::post().to(upload_reference),
        )
        .route("/posts/{post_id}/assets", web::post().to(append_assets));
}

async fn create_post(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<NewPost>,
) -> impl Responder {
    if !auth_user.can(Capability::CreatePost) {
        return forbidden();
    }
    let mut conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::create_post(&mut conn, path.into_inner(), auth_user.id, &body) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "post": post })),
        Err(e) => workflow_error_response(&e),
    }
}

async fn list_posts(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    query: web::Query<PostFilters>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_all_posts(&conn, &query) {
        Ok(posts) => HttpResponse::Ok().json(posts),
        Err(e) => db_error_response(&e),
    }
}

async fn get_post(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_post(&conn, path.into_inner()) {
        Ok(Some(post)) => HttpResponse::Ok().json(post),
        Ok(None) => not_found("Post"),
        Err(e) => db_error_response(&e),
    }
}

/// Direct field edits outside the state machine. The caption and the two
/// asset lists are gated by their owning capabilities; the rest of the brief
/// is open to any signed-in team member.
async fn update_post(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<PostUpdate>,
) -> impl Responder {
    if body.caption.is_some() && !auth_user.can(Capability::EditCaption) {
        return forbidden();
    }
    if body.design_output_urls.is_some() && !auth_user.can(Capability::UploadDesign) {
        return forbidden();
    }
    if body.design_reference_urls.is_some() && !auth_user.can(Capability::UploadRef) {
        return forbidden();
    }

    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::update_post_fields(&conn, path.into_inner(), &body) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "post": post })),
        Err(e) => workflow_error_response(&e),
    }
}

async fn delete_post(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    if !auth_user.can(Capability::ViewAll) {
        return forbidden();
    }
    let mut conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    let post_id = path.into_inner();
    match posts_db_operations::read_post(&conn, post_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Post"),
        Err(e) => return db_error_response(&e),
    }
    match posts_db_operations::delete_post(&mut conn, post_id) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct RescheduleRequest {
    scheduled_at: String,
}

async fn reschedule(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<RescheduleRequest>,
) -> impl Responder {
    if body.scheduled_at.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "New schedule datetime required" }));
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::reschedule_post(&conn, path.into_inner(), &body.scheduled_at) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "post": post })),
        Err(e) => workflow_error_response(&e),
    }
}

#[derive(Deserialize)]
struct TransitionBody {
    from: String,
    to: String,
    comment: Option<String>,
    scheduled_at: Option<String>,
    caption: Option<String>,
}

async fn transition(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<TransitionBody>,
) -> impl Responder {
    let Some(from) = WorkflowStatus::parse(&body.from) else {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": format!("Unknown status '{}'", body.from) }));
    };
    let Some(to) = WorkflowStatus::parse(&body.to) else {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": format!("Unknown status '{}'", body.to) }));
    };

    let mut conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    let request = TransitionRequest {
        to,
        actor_id: auth_user.id,
        comment: body.comment.clone(),
        scheduled_at: body.scheduled_at.clone(),
        caption: body.caption.clone(),
    };
    match posts_db_operations::transition_post(&mut conn, path.into_inner(), from, &request) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "post": post })),
        Err(e) => workflow_error_response(&e),
    }
}

async fn history(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_history(&conn, path.into_inner()) {
        Ok(events) => HttpResponse::Ok().json(events),
        Err(e) => db_error_response(&e),
    }
}

async fn get_comments(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_comments(&conn, path.into_inner()) {
        Ok(comments) => HttpResponse::Ok().json(comments),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct CommentBody {
    content: String,
    #[serde(default = "default_comment_type")]
    comment_type: String,
}

fn default_comment_type() -> String {
    "comment".to_string()
}

async fn add_comment(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<CommentBody>,
) -> impl Responder {
    if body.content.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Content required" }));
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    let post_id = path.into_inner();
    match posts_db_operations::read_post(&conn, post_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Post"),
        Err(e) => return db_error_response(&e),
    }
    match posts_db_operations::add_comment(
        &conn,
        post_id,
        auth_user.id,
        body.content.trim(),
        &body.comment_type,
    ) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

async fn upload_assets(
    auth_user: &AuthenticatedUser,
    pool: &DbPool,
    config: &Config,
    post_id: i64,
    kind: AssetKind,
    payload: &mut Multipart,
) -> HttpResponse {
    let (capability, folder) = match kind {
        AssetKind::Output => (Capability::UploadDesign, "designs"),
        AssetKind::Reference => (Capability::UploadRef, "references"),
    };
    if !auth_user.can(capability) {
        return forbidden();
    }

    let conn = match get_conn(pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_post(&conn, post_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Post"),
        Err(e) => return db_error_response(&e),
    }

    let outcome = match upload_helpers::save_upload_batch(config, folder, payload).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("Multipart upload failed for post {}: {}", post_id, e);
            return HttpResponse::BadRequest()
                .json(json!({ "success": false, "error": "Upload failed" }));
        }
    };

    match posts_db_operations::append_design_assets(&conn, post_id, kind, &outcome.urls) {
        Ok(post) => HttpResponse::Ok().json(json!({
            "success": true,
            "urls": outcome.urls,
            "errors": outcome.errors,
            "post": post,
        })),
        Err(e) => workflow_error_response(&e),
    }
}

async fn upload_design(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
    mut payload: Multipart,
) -> impl Responder {
    upload_assets(
        &auth_user,
        &pool,
        &config,
        path.into_inner(),
        AssetKind::Output,
        &mut payload,
    )
    .await
}

async fn upload_reference(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    path: web::Path<i64>,
    mut payload: Multipart,
) -> impl Responder {
    upload_assets(
        &auth_user,
        &pool,
        &config,
        path.into_inner(),
        AssetKind::Reference,
        &mut payload,
    )
    .await
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum AssetKindBody {
    Reference,
    Output,
}

#[derive(Deserialize)]
struct AppendAssetsBody {
    kind: AssetKindBody,
    urls: Vec<String>,
}

/// Appends already-stored asset URLs to a post, for callers that talk to
/// the asset store themselves.
async fn append_assets(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<AppendAssetsBody>,
) -> impl Responder {
    let (kind, capability) = match body.kind {
        AssetKindBody::Reference => (AssetKind::Reference, Capability::UploadRef),
        AssetKindBody::Output => (AssetKind::Output, Capability::UploadDesign),
    };
    if !auth_user.can(capability) {
        return forbidden();
    }
    if body.urls.iter().all(|u| u.trim().is_empty()) {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "At least one URL required" }));
    }

    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::append_design_assets(&conn, path.into_inner(), kind, &body.urls) {
        Ok(post) => HttpResponse::Ok().json(json!({ "success": true, "post": post })),
        Err(e) => workflow_error_response(&e),
    }
}

#[derive(Deserialize)]
struct PipelineQuery {
    client_id: Option<i64>,
    assigned_to: Option<i64>,
}

async fn pipeline(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    query: web::Query<PipelineQuery>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_pipeline_board(&conn, query.client_id, query.assigned_to) {
        Ok(board) => HttpResponse::Ok().json(board),
        Err(e) => db_error_response(&e),
    }
}

async fn my_work(auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_my_work(&conn, auth_user.id, &auth_user.role) {
        Ok(items) => HttpResponse::Ok().json(items),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct CalendarQuery {
    year: Option<i32>,
    month: Option<u32>,
    client_id: Option<i64>,
    #[serde(default)]
    include_unscheduled: bool,
}

async fn calendar(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    query: web::Query<CalendarQuery>,
) -> impl Responder {
    let today = Utc::now().date_naive();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());

    let Some(window) = calendar_helpers::month_window(year, month) else {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Invalid year/month" }));
    };

    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match posts_db_operations::read_posts_in_month(
        &conn,
        (&window.0, &window.1),
        query.client_id,
        query.include_unscheduled,
    ) {
        Ok(posts) => {
            HttpResponse::Ok().json(calendar_helpers::build_calendar_view(posts, year, month))
        }
        Err(e) => db_error_response(&e),
    }
}

/// Hands every due scheduled post to the publishing collaborator.
async fn run_scheduler(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    publisher: web::Data<dyn Publisher>,
) -> impl Responder {
    if !auth_user.can(Capability::Schedule) {
        return forbidden();
    }
    let mut conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };

    let now = Utc::now().format("%Y-%m-%dT%H:%M").to_string();
    match publish::run_due_posts(&mut conn, publisher.get_ref(), &now) {
        Ok(report) => HttpResponse::Ok().json(json!({ "success": true, "report": report })),
        Err(e) => workflow_error_response(&e),
    }
}
