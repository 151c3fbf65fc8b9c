use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::middleware::AuthenticatedUser;
use crate::models::db_operations::notifications_db_operations;
use crate::models::db_operations::tasks_db_operations::{
    self, NewTask, TaskFilters, TaskUpdate, TASK_STATUSES,
};
use crate::routes::{db_error_response, get_conn, not_found};
use crate::DbPool;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.route("/tasks", web::get().to(list_tasks))
        .route("/tasks", web::post().to(create_task))
        .route("/tasks/board", web::get().to(task_board))
        .route("/tasks/my-tasks", web::get().to(my_tasks))
        .route("/tasks/{task_id}", web::get().to(get_task))
        .route("/tasks/{task_id}", web::put().to(update_task))
        .route("/tasks/{task_id}", web::delete().to(delete_task))
        .route("/tasks/{task_id}/status", web::put().to(update_status))
        .route("/tasks/{task_id}/comments", web::get().to(get_comments))
        .route("/tasks/{task_id}/comments", web::post().to(add_comment));
}

async fn list_tasks(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    query: web::Query<TaskFilters>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match tasks_db_operations::read_tasks(&conn, &query) {
        Ok(tasks) => HttpResponse::Ok().json(tasks),
        Err(e) => db_error_response(&e),
    }
}

async fn create_task(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    body: web::Json<NewTask>,
) -> impl Responder {
    if body.title.trim().is_empty() {
        return HttpResponse::BadRequest()
            .json(json!({ "success": false, "error": "Title required" }));
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match tasks_db_operations::create_task(&conn, auth_user.id, &body) {
        Ok(id) => {
            if let Some(assignee) = body.assigned_to_id {
                if let Err(e) = notifications_db_operations::create_notification(
                    &conn,
                    assignee,
                    "task_assigned",
                    "New task",
                    &format!("You have been assigned a task: {}", body.title.trim()),
                    "task",
                    id,
                ) {
                    log::warn!("Could not notify assignee of task {}: {}", id, e);
                }
            }
            HttpResponse::Ok().json(json!({ "success": true, "id": id }))
        }
        Err(e) => db_error_response(&e),
    }
}

async fn task_board(_auth_user: AuthenticatedUser, pool: web::Data<DbPool>) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match tasks_db_operations::read_task_board(&conn) {
        Ok(board) => HttpResponse::Ok().json(board),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct MyTasksQuery {
    #[serde(default)]
    include_done: bool,
}

async fn my_tasks(
    auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    query: web::Query<MyTasksQuery>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match tasks_db_operations::read_my_tasks(&conn, auth_user.id, query.include_done) {
        Ok(tasks) => HttpResponse::Ok().json(tasks),
        Err(e) => db_error_response(&e),
    }
}

async fn get_task(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    let task_id = path.into_inner();
    match tasks_db_operations::read_task(&conn, task_id) {
        Ok(Some(task)) => match tasks_db_operations::read_task_comments(&conn, task_id) {
            Ok(comments) => {
                HttpResponse::Ok().json(json!({ "task": task, "comments": comments }))
            }
            Err(e) => db_error_response(&e),
        },
        Ok(None) => not_found("Task"),
        Err(e) => db_error_response(&e),
    }
}

async fn update_task(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<TaskUpdate>,
) -> impl Responder {
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    let task_id = path.into_inner();
    match tasks_db_operations::read_task(&conn, task_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Task"),
        Err(e) => return db_error_response(&e),
    }
    match tasks_db_operations::update_task(&conn, task_id, &body) {
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

async fn delete_task(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> impl Responder {
    let mut conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match tasks_db_operations::delete_task(&mut conn, path.into_inner()) {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_status(
    _auth_user: AuthenticatedUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<StatusBody>,
) -> impl Responder {
    if !TASK_STATUSES.contains(&body.status.as_str()) {
        return HttpResponse::BadRequest().json(json!({
            "success": false,
            "error": format!("Invalid status. Must be one of: {TASK_STATUSES:?}"),
        }));
    }
    let conn = match get_conn(&pool) {
        Ok(conn) => conn,
        Err(resp) => return resp,
    };
    match tasks_db_operations::update_task_status(&conn, path.into_inner(), &body.status) {
        Ok(0) => not_found("Task"),
        Ok(_) => HttpResponse::Ok().json(json!({ "success": true })),
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
    match tasks_db_operations::read_task_comments(&conn, path.into_inner()) {
        Ok(comments) => HttpResponse::Ok().json(comments),
        Err(e) => db_error_response(&e),
    }
}

#[derive(Deserialize)]
struct CommentBody {
    content: String,
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
    let task_id = path.into_inner();
    match tasks_db_operations::read_task(&conn, task_id) {
        Ok(Some(_)) => {}
        Ok(None) => return not_found("Task"),
        Err(e) => return db_error_response(&e),
    }
    match tasks_db_operations::add_task_comment(&conn, task_id, auth_user.id, body.content.trim())
    {
        Ok(()) => HttpResponse::Ok().json(json!({ "success": true })),
        Err(e) => db_error_response(&e),
    }
}
