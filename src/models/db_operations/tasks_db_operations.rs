use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::models::{Task, TaskComment};

pub const TASK_STATUSES: [&str; 4] = ["todo", "in_progress", "in_review", "done"];

const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.client_id, t.assigned_to_id, \
     t.created_by_id, t.status, t.priority, t.due_date, t.category, t.post_id, \
     t.created_at, t.updated_at, t.completed_at, \
     u.username AS assigned_to_name, c.name AS client_name \
     FROM tasks t \
     LEFT JOIN users u ON t.assigned_to_id = u.id \
     LEFT JOIN clients c ON t.client_id = c.id";

const TASK_ORDER: &str = "ORDER BY CASE t.priority \
     WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'normal' THEN 2 ELSE 3 END, \
     t.created_at DESC";

fn task_from_row(row: &Row) -> Result<Task, RusqliteError> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        client_id: row.get(3)?,
        assigned_to_id: row.get(4)?,
        created_by_id: row.get(5)?,
        status: row.get(6)?,
        priority: row.get(7)?,
        due_date: row.get(8)?,
        category: row.get(9)?,
        post_id: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
        completed_at: row.get(13)?,
        assigned_to_name: row.get(14)?,
        client_name: row.get(15)?,
    })
}

#[derive(Debug, Deserialize, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub client_id: Option<i64>,
    pub assigned_to_id: Option<i64>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub category: Option<String>,
    pub post_id: Option<i64>,
}

pub fn create_task(
    conn: &Connection,
    created_by_id: i64,
    task: &NewTask,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO tasks
            (title, description, client_id, assigned_to_id, created_by_id,
             status, priority, due_date, category, post_id)
         VALUES (?1, ?2, ?3, ?4, ?5, 'todo', ?6, ?7, ?8, ?9)",
        params![
            task.title,
            task.description.as_deref().unwrap_or(""),
            task.client_id,
            task.assigned_to_id,
            created_by_id,
            task.priority.as_deref().unwrap_or("normal"),
            task.due_date,
            task.category.as_deref().unwrap_or("general"),
            task.post_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_task(conn: &Connection, task_id: i64) -> Result<Option<Task>, RusqliteError> {
    conn.query_row(
        &format!("{TASK_SELECT} WHERE t.id = ?1"),
        [task_id],
        task_from_row,
    )
    .optional()
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskFilters {
    pub status: Option<String>,
    pub assigned_to_id: Option<i64>,
    pub client_id: Option<i64>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub post_id: Option<i64>,
}

pub fn read_tasks(conn: &Connection, filters: &TaskFilters) -> Result<Vec<Task>, RusqliteError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = &filters.status {
        clauses.push("t.status = ?");
        values.push(Box::new(status.clone()));
    }
    if let Some(assigned) = filters.assigned_to_id {
        clauses.push("t.assigned_to_id = ?");
        values.push(Box::new(assigned));
    }
    if let Some(client) = filters.client_id {
        clauses.push("t.client_id = ?");
        values.push(Box::new(client));
    }
    if let Some(priority) = &filters.priority {
        clauses.push("t.priority = ?");
        values.push(Box::new(priority.clone()));
    }
    if let Some(category) = &filters.category {
        clauses.push("t.category = ?");
        values.push(Box::new(category.clone()));
    }
    if let Some(post) = filters.post_id {
        clauses.push("t.post_id = ?");
        values.push(Box::new(post));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("{TASK_SELECT} {where_clause} {TASK_ORDER}");
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(rusqlite::params_from_iter(values.iter()), task_from_row)?;

    let mut tasks = Vec::new();
    for task in iter {
        tasks.push(task?);
    }
    Ok(tasks)
}

pub fn read_my_tasks(
    conn: &Connection,
    user_id: i64,
    include_done: bool,
) -> Result<Vec<Task>, RusqliteError> {
    let sql = if include_done {
        format!("{TASK_SELECT} WHERE t.assigned_to_id = ?1 {TASK_ORDER}")
    } else {
        format!("{TASK_SELECT} WHERE t.assigned_to_id = ?1 AND t.status != 'done' {TASK_ORDER}")
    };
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map([user_id], task_from_row)?;

    let mut tasks = Vec::new();
    for task in iter {
        tasks.push(task?);
    }
    Ok(tasks)
}

/// Kanban projection of the task list. Unknown statuses land in the todo
/// column rather than vanishing.
#[derive(Debug, Serialize, Default)]
pub struct TaskBoard {
    pub todo: Vec<Task>,
    pub in_progress: Vec<Task>,
    pub in_review: Vec<Task>,
    pub done: Vec<Task>,
}

pub fn read_task_board(conn: &Connection) -> Result<TaskBoard, RusqliteError> {
    let tasks = read_tasks(conn, &TaskFilters::default())?;
    let mut board = TaskBoard::default();
    for task in tasks {
        match task.status.as_str() {
            "in_progress" => board.in_progress.push(task),
            "in_review" => board.in_review.push(task),
            "done" => board.done.push(task),
            _ => board.todo.push(task),
        }
    }
    Ok(board)
}

#[derive(Debug, Deserialize, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub client_id: Option<Option<i64>>,
    pub assigned_to_id: Option<Option<i64>>,
    pub priority: Option<String>,
    pub due_date: Option<Option<String>>,
    pub category: Option<String>,
}

pub fn update_task(
    conn: &Connection,
    task_id: i64,
    update: &TaskUpdate,
) -> Result<usize, RusqliteError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(title) = &update.title {
        sets.push("title = ?");
        values.push(Box::new(title.clone()));
    }
    if let Some(description) = &update.description {
        sets.push("description = ?");
        values.push(Box::new(description.clone()));
    }
    if let Some(client_id) = update.client_id {
        sets.push("client_id = ?");
        values.push(Box::new(client_id));
    }
    if let Some(assigned_to_id) = update.assigned_to_id {
        sets.push("assigned_to_id = ?");
        values.push(Box::new(assigned_to_id));
    }
    if let Some(priority) = &update.priority {
        sets.push("priority = ?");
        values.push(Box::new(priority.clone()));
    }
    if let Some(due_date) = &update.due_date {
        sets.push("due_date = ?");
        values.push(Box::new(due_date.clone()));
    }
    if let Some(category) = &update.category {
        sets.push("category = ?");
        values.push(Box::new(category.clone()));
    }

    if sets.is_empty() {
        return Ok(0);
    }

    sets.push("updated_at = datetime('now')");
    values.push(Box::new(task_id));
    let sql = format!("UPDATE tasks SET {} WHERE id = ?", sets.join(", "));
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
}

/// Plain status swap; tasks carry no transition-guard logic. Reaching `done`
/// stamps the completion time, leaving it clears the stamp.
pub fn update_task_status(
    conn: &Connection,
    task_id: i64,
    status: &str,
) -> Result<usize, RusqliteError> {
    if status == "done" {
        conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = datetime('now'),
                    completed_at = datetime('now') WHERE id = ?2",
            params![status, task_id],
        )
    } else {
        conn.execute(
            "UPDATE tasks SET status = ?1, updated_at = datetime('now'),
                    completed_at = NULL WHERE id = ?2",
            params![status, task_id],
        )
    }
}

pub fn delete_task(conn: &mut Connection, task_id: i64) -> Result<(), RusqliteError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM task_comments WHERE task_id = ?1", [task_id])?;
    tx.execute("DELETE FROM tasks WHERE id = ?1", [task_id])?;
    tx.commit()
}

pub fn read_task_comments(
    conn: &Connection,
    task_id: i64,
) -> Result<Vec<TaskComment>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT tc.id, tc.task_id, tc.user_id, tc.content, tc.created_at,
                u.username AS user_name
         FROM task_comments tc
         LEFT JOIN users u ON tc.user_id = u.id
         WHERE tc.task_id = ?1
         ORDER BY tc.created_at ASC, tc.id ASC",
    )?;
    let iter = stmt.query_map([task_id], |row| {
        Ok(TaskComment {
            id: row.get(0)?,
            task_id: row.get(1)?,
            user_id: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
            user_name: row.get(5)?,
        })
    })?;

    let mut comments = Vec::new();
    for comment in iter {
        comments.push(comment?);
    }
    Ok(comments)
}

pub fn add_task_comment(
    conn: &Connection,
    task_id: i64,
    user_id: i64,
    content: &str,
) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO task_comments (task_id, user_id, content) VALUES (?1, ?2, ?3)",
        params![task_id, user_id, content],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::users_db_operations;
    use crate::setup::db_setup;

    fn test_conn() -> (Connection, i64) {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_agency_db(&mut conn).unwrap();
        let uid =
            users_db_operations::create_user(&conn, "u", "u@x.io", "pw", "manager", "", "").unwrap();
        (conn, uid)
    }

    #[test]
    fn done_stamps_completed_at_and_reopening_clears_it() {
        let (conn, uid) = test_conn();
        let task = NewTask {
            title: "Write February plan".to_string(),
            ..Default::default()
        };
        let id = create_task(&conn, uid, &task).unwrap();

        update_task_status(&conn, id, "done").unwrap();
        assert!(read_task(&conn, id).unwrap().unwrap().completed_at.is_some());

        update_task_status(&conn, id, "in_progress").unwrap();
        let reopened = read_task(&conn, id).unwrap().unwrap();
        assert_eq!(reopened.status, "in_progress");
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn board_buckets_by_status() {
        let (conn, uid) = test_conn();
        for (title, status) in [("a", "todo"), ("b", "in_review"), ("c", "done")] {
            let id = create_task(
                &conn,
                uid,
                &NewTask {
                    title: title.to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
            update_task_status(&conn, id, status).unwrap();
        }

        let board = read_task_board(&conn).unwrap();
        assert_eq!(board.todo.len(), 1);
        assert_eq!(board.in_review.len(), 1);
        assert_eq!(board.done.len(), 1);
        assert!(board.in_progress.is_empty());
    }

    #[test]
    fn priority_orders_the_listing() {
        let (conn, uid) = test_conn();
        for (title, priority) in [("low", "normal"), ("top", "urgent"), ("mid", "high")] {
            create_task(
                &conn,
                uid,
                &NewTask {
                    title: title.to_string(),
                    priority: Some(priority.to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        let tasks = read_tasks(&conn, &TaskFilters::default()).unwrap();
        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["top", "mid", "low"]);
    }
}
