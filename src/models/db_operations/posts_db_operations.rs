use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::helper::workflow_helpers::{self, TransitionRequest, WorkflowError};
use crate::models::db_operations::{
    join_list, notifications_db_operations, split_list, tasks_db_operations,
};
use crate::models::{AssetKind, Post, PostComment, WorkflowEvent, WorkflowStatus};

const POST_SELECT: &str = "SELECT p.id, p.client_id, p.topic, p.caption, p.tov, p.brief_notes, \
     p.platforms, p.post_type, p.priority, p.scheduled_at, \
     p.design_reference_urls, p.design_output_urls, p.workflow_status, p.revision_count, \
     p.assigned_writer_id, p.assigned_designer_id, p.assigned_sm_id, p.assigned_motion_id, \
     p.created_by_id, p.approved_by_id, p.approved_at, p.created_at, p.updated_at, \
     c.name AS client_name \
     FROM posts p LEFT JOIN clients c ON p.client_id = c.id";

const PRIORITY_ORDER: &str = "CASE p.priority \
     WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 WHEN 'normal' THEN 2 ELSE 3 END";

fn post_from_row(row: &Row) -> Result<Post, RusqliteError> {
    let platforms: String = row.get(6)?;
    let reference_urls: String = row.get(10)?;
    let output_urls: String = row.get(11)?;
    let status: String = row.get(12)?;
    Ok(Post {
        id: row.get(0)?,
        client_id: row.get(1)?,
        topic: row.get(2)?,
        caption: row.get(3)?,
        tov: row.get(4)?,
        brief_notes: row.get(5)?,
        platforms: split_list(&platforms),
        post_type: row.get(7)?,
        priority: row.get(8)?,
        scheduled_at: row
            .get::<_, Option<String>>(9)?
            .filter(|s| !s.is_empty()),
        design_reference_urls: split_list(&reference_urls),
        design_output_urls: split_list(&output_urls),
        workflow_status: WorkflowStatus::parse(&status).unwrap_or(WorkflowStatus::Draft),
        revision_count: row.get(13)?,
        assigned_writer_id: row.get(14)?,
        assigned_designer_id: row.get(15)?,
        assigned_sm_id: row.get(16)?,
        assigned_motion_id: row.get(17)?,
        created_by_id: row.get(18)?,
        approved_by_id: row.get(19)?,
        approved_at: row.get(20)?,
        created_at: row.get(21)?,
        updated_at: row.get(22)?,
        client_name: row.get(23)?,
    })
}

pub fn read_post(conn: &Connection, post_id: i64) -> Result<Option<Post>, RusqliteError> {
    conn.query_row(
        &format!("{POST_SELECT} WHERE p.id = ?1"),
        [post_id],
        post_from_row,
    )
    .optional()
}

fn require_post(conn: &Connection, post_id: i64) -> Result<Post, WorkflowError> {
    read_post(conn, post_id)?.ok_or_else(|| WorkflowError::NotFound(format!("Post {post_id}")))
}

// ====================================================================
// ========================= CREATE / EDIT ============================
// ====================================================================

#[derive(Debug, Deserialize, Default)]
pub struct NewPost {
    pub topic: Option<String>,
    pub caption: Option<String>,
    pub tov: Option<String>,
    pub brief_notes: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub post_type: Option<String>,
    pub priority: Option<String>,
    pub scheduled_at: Option<String>,
    pub design_reference_urls: Option<Vec<String>>,
    pub assigned_writer_id: Option<i64>,
    pub assigned_designer_id: Option<i64>,
    pub assigned_sm_id: Option<i64>,
    pub assigned_motion_id: Option<i64>,
}

/// Creates a post in `draft`. Team assignments fall back to the owning
/// client's defaults; the creation itself is recorded as the first history
/// entry.
pub fn create_post(
    conn: &mut Connection,
    client_id: i64,
    created_by_id: i64,
    new_post: &NewPost,
) -> Result<Post, WorkflowError> {
    let tx = conn.transaction()?;

    let defaults: (Option<i64>, Option<i64>, Option<i64>, Option<i64>) = tx
        .query_row(
            "SELECT assigned_writer_id, assigned_designer_id, assigned_sm_id, assigned_motion_id
             FROM clients WHERE id = ?1",
            [client_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?
        .ok_or_else(|| WorkflowError::NotFound(format!("Client {client_id}")))?;

    tx.execute(
        "INSERT INTO posts
            (client_id, topic, caption, tov, brief_notes, platforms, post_type, priority,
             scheduled_at, design_reference_urls, workflow_status,
             assigned_writer_id, assigned_designer_id, assigned_sm_id, assigned_motion_id,
             created_by_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'draft', ?11, ?12, ?13, ?14, ?15)",
        params![
            client_id,
            new_post.topic.as_deref().unwrap_or(""),
            new_post.caption.as_deref().unwrap_or(""),
            new_post.tov.as_deref().unwrap_or(""),
            new_post.brief_notes.as_deref().unwrap_or(""),
            new_post.platforms.as_deref().map(join_list).unwrap_or_default(),
            new_post.post_type.as_deref().unwrap_or("post"),
            new_post.priority.as_deref().unwrap_or("normal"),
            new_post.scheduled_at,
            new_post
                .design_reference_urls
                .as_deref()
                .map(join_list)
                .unwrap_or_default(),
            new_post.assigned_writer_id.or(defaults.0),
            new_post.assigned_designer_id.or(defaults.1),
            new_post.assigned_sm_id.or(defaults.2),
            new_post.assigned_motion_id.or(defaults.3),
            created_by_id,
        ],
    )?;
    let post_id = tx.last_insert_rowid();

    tx.execute(
        "INSERT INTO workflow_history (post_id, user_id, from_status, to_status, comment)
         VALUES (?1, ?2, '', 'draft', 'Post created')",
        params![post_id, created_by_id],
    )?;

    tx.commit()?;
    require_post(conn, post_id)
}

#[derive(Debug, Deserialize, Default)]
pub struct PostUpdate {
    pub topic: Option<String>,
    pub caption: Option<String>,
    pub tov: Option<String>,
    pub brief_notes: Option<String>,
    pub platforms: Option<Vec<String>>,
    pub post_type: Option<String>,
    pub priority: Option<String>,
    pub scheduled_at: Option<Option<String>>,
    pub design_reference_urls: Option<Vec<String>>,
    pub design_output_urls: Option<Vec<String>>,
    pub assigned_writer_id: Option<Option<i64>>,
    pub assigned_designer_id: Option<Option<i64>>,
    pub assigned_sm_id: Option<Option<i64>>,
    pub assigned_motion_id: Option<Option<i64>>,
}

/// Direct field edits outside the state machine. Changing `scheduled_at`
/// here is a plain edit for any non-published post; a post already
/// `scheduled` keeps its status and only moves in time.
pub fn update_post_fields(
    conn: &Connection,
    post_id: i64,
    update: &PostUpdate,
) -> Result<Post, WorkflowError> {
    let post = require_post(conn, post_id)?;
    if update.scheduled_at.is_some() && post.workflow_status == WorkflowStatus::Posted {
        return Err(WorkflowError::ValidationFailed(
            "Published posts cannot be rescheduled".to_string(),
        ));
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(topic) = &update.topic {
        sets.push("topic = ?");
        values.push(Box::new(topic.clone()));
    }
    if let Some(caption) = &update.caption {
        sets.push("caption = ?");
        values.push(Box::new(caption.clone()));
    }
    if let Some(tov) = &update.tov {
        sets.push("tov = ?");
        values.push(Box::new(tov.clone()));
    }
    if let Some(brief_notes) = &update.brief_notes {
        sets.push("brief_notes = ?");
        values.push(Box::new(brief_notes.clone()));
    }
    if let Some(platforms) = &update.platforms {
        sets.push("platforms = ?");
        values.push(Box::new(join_list(platforms)));
    }
    if let Some(post_type) = &update.post_type {
        sets.push("post_type = ?");
        values.push(Box::new(post_type.clone()));
    }
    if let Some(priority) = &update.priority {
        sets.push("priority = ?");
        values.push(Box::new(priority.clone()));
    }
    if let Some(scheduled_at) = &update.scheduled_at {
        sets.push("scheduled_at = ?");
        values.push(Box::new(scheduled_at.clone()));
    }
    if let Some(urls) = &update.design_reference_urls {
        sets.push("design_reference_urls = ?");
        values.push(Box::new(join_list(urls)));
    }
    if let Some(urls) = &update.design_output_urls {
        sets.push("design_output_urls = ?");
        values.push(Box::new(join_list(urls)));
    }
    if let Some(id) = update.assigned_writer_id {
        sets.push("assigned_writer_id = ?");
        values.push(Box::new(id));
    }
    if let Some(id) = update.assigned_designer_id {
        sets.push("assigned_designer_id = ?");
        values.push(Box::new(id));
    }
    if let Some(id) = update.assigned_sm_id {
        sets.push("assigned_sm_id = ?");
        values.push(Box::new(id));
    }
    if let Some(id) = update.assigned_motion_id {
        sets.push("assigned_motion_id = ?");
        values.push(Box::new(id));
    }

    if !sets.is_empty() {
        sets.push("updated_at = datetime('now')");
        values.push(Box::new(post_id));
        let sql = format!("UPDATE posts SET {} WHERE id = ?", sets.join(", "));
        conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
    }

    require_post(conn, post_id)
}

/// Calendar drag-and-drop. Keeps `scheduled` posts scheduled; everything
/// short of `posted` may move freely.
pub fn reschedule_post(
    conn: &Connection,
    post_id: i64,
    scheduled_at: &str,
) -> Result<Post, WorkflowError> {
    let post = require_post(conn, post_id)?;
    if post.workflow_status == WorkflowStatus::Posted {
        return Err(WorkflowError::ValidationFailed(
            "Published posts cannot be rescheduled".to_string(),
        ));
    }
    conn.execute(
        "UPDATE posts SET scheduled_at = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![scheduled_at, post_id],
    )?;
    require_post(conn, post_id)
}

// ====================================================================
// ======================= WORKFLOW TRANSITIONS =======================
// ====================================================================

/// Moves a post along one workflow edge. The whole read-validate-write runs
/// in one transaction; the status write is a compare-and-swap so a racing
/// transition surfaces as `ConcurrentModification` instead of silently
/// winning.
pub fn transition_post(
    conn: &mut Connection,
    post_id: i64,
    from_expected: WorkflowStatus,
    req: &TransitionRequest,
) -> Result<Post, WorkflowError> {
    // Phase one of the caption handoff: persist the text before any
    // transition work. A failure here leaves the post untouched in
    // needs_caption.
    if from_expected == WorkflowStatus::NeedsCaption && req.to == WorkflowStatus::InDesign {
        if let Some(caption) = &req.caption {
            let saved = conn.execute(
                "UPDATE posts SET caption = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![caption, post_id],
            )?;
            if saved == 0 {
                return Err(WorkflowError::NotFound(format!("Post {post_id}")));
            }
        }
    }

    let tx = conn.transaction()?;

    let post = read_post(&tx, post_id)?
        .ok_or_else(|| WorkflowError::NotFound(format!("Post {post_id}")))?;
    let actor_role: String = tx
        .query_row("SELECT role FROM users WHERE id = ?1", [req.actor_id], |row| row.get(0))
        .optional()?
        .ok_or_else(|| WorkflowError::NotFound(format!("User {}", req.actor_id)))?;

    if post.workflow_status != from_expected {
        return Err(WorkflowError::ConcurrentModification {
            expected: from_expected.as_str().to_string(),
            actual: post.workflow_status.as_str().to_string(),
        });
    }

    let rule = workflow_helpers::check_transition(&post, &actor_role, req)?;

    let changed = tx.execute(
        "UPDATE posts SET workflow_status = ?1, updated_at = datetime('now')
         WHERE id = ?2 AND workflow_status = ?3",
        params![rule.to.as_str(), post_id, post.workflow_status.as_str()],
    )?;
    if changed == 0 {
        let actual: String = tx.query_row(
            "SELECT workflow_status FROM posts WHERE id = ?1",
            [post_id],
            |row| row.get(0),
        )?;
        return Err(WorkflowError::ConcurrentModification {
            expected: from_expected.as_str().to_string(),
            actual,
        });
    }

    match rule.to {
        WorkflowStatus::Approved => {
            tx.execute(
                "UPDATE posts SET approved_by_id = ?1, approved_at = datetime('now')
                 WHERE id = ?2",
                params![req.actor_id, post_id],
            )?;
        }
        WorkflowStatus::Scheduled => {
            let scheduled_at = req
                .scheduled_at
                .as_deref()
                .or(post.scheduled_at.as_deref())
                .unwrap_or_default();
            tx.execute(
                "UPDATE posts SET scheduled_at = ?1 WHERE id = ?2",
                params![scheduled_at, post_id],
            )?;
        }
        _ => {}
    }

    let is_revision = post.workflow_status == WorkflowStatus::DesignReview
        && matches!(rule.to, WorkflowStatus::InDesign | WorkflowStatus::NeedsCaption);
    if is_revision {
        tx.execute(
            "UPDATE posts SET revision_count = revision_count + 1 WHERE id = ?1",
            [post_id],
        )?;
    }

    let comment = req.comment.as_deref().unwrap_or("");
    tx.execute(
        "INSERT INTO workflow_history (post_id, user_id, from_status, to_status, comment)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            post_id,
            req.actor_id,
            post.workflow_status.as_str(),
            rule.to.as_str(),
            comment
        ],
    )?;

    if is_revision && !comment.trim().is_empty() {
        tx.execute(
            "INSERT INTO post_comments (post_id, user_id, content, comment_type)
             VALUES (?1, ?2, ?3, 'revision_feedback')",
            params![post_id, req.actor_id, comment],
        )?;
    }

    hand_off(&tx, &post, post.workflow_status, rule.to, req.actor_id)?;

    tx.commit()?;
    require_post(conn, post_id)
}

/// Notifies and auto-creates a task for whoever the post lands on next.
fn hand_off(
    conn: &Connection,
    post: &Post,
    from: WorkflowStatus,
    to: WorkflowStatus,
    actor_id: i64,
) -> Result<(), RusqliteError> {
    let topic = if post.topic.is_empty() {
        "Untitled"
    } else {
        post.topic.as_str()
    };
    let returned = from == WorkflowStatus::DesignReview;

    let assignment: Option<(i64, &str, String, &str)> = match to {
        WorkflowStatus::NeedsCaption => post.assigned_writer_id.map(|writer| {
            if returned {
                (
                    writer,
                    "caption_returned",
                    format!("Caption returned for edits: {topic}"),
                    "caption",
                )
            } else {
                (
                    writer,
                    "caption_assigned",
                    format!("You have been assigned a caption: {topic}"),
                    "caption",
                )
            }
        }),
        WorkflowStatus::InDesign => post.assigned_designer_id.map(|designer| {
            if returned {
                (
                    designer,
                    "design_returned",
                    format!("Design returned for edits: {topic}"),
                    "design",
                )
            } else {
                (
                    designer,
                    "design_assigned",
                    format!("You have been assigned a design brief: {topic}"),
                    "design",
                )
            }
        }),
        WorkflowStatus::DesignReview => post.assigned_sm_id.map(|reviewer| {
            (
                reviewer,
                "design_review_ready",
                format!("Design submitted for review: {topic}"),
                "review",
            )
        }),
        _ => None,
    };

    if let Some((user_id, kind, message, category)) = assignment {
        notifications_db_operations::create_notification(
            conn, user_id, kind, "Workflow update", &message, "post", post.id,
        )?;
        tasks_db_operations::create_task(
            conn,
            actor_id,
            &tasks_db_operations::NewTask {
                title: message,
                description: Some(format!("Post #{} for {}", post.id, topic)),
                client_id: Some(post.client_id),
                assigned_to_id: Some(user_id),
                priority: Some(post.priority.clone()),
                category: Some(category.to_string()),
                post_id: Some(post.id),
                ..Default::default()
            },
        )?;
    }

    if to == WorkflowStatus::Approved {
        if let Some(creator) = post.created_by_id {
            notifications_db_operations::create_notification(
                conn,
                creator,
                "post_approved",
                "Post approved",
                &format!("Approved: {topic}"),
                "post",
                post.id,
            )?;
        }
    }

    Ok(())
}

/// The publishing collaborator's entry point for `scheduled -> posted`.
/// Skips the role gate (no human actor) but still validates the from-state
/// and appends history, with a NULL actor.
pub fn record_published(conn: &mut Connection, post_id: i64) -> Result<Post, WorkflowError> {
    let tx = conn.transaction()?;

    let post = read_post(&tx, post_id)?
        .ok_or_else(|| WorkflowError::NotFound(format!("Post {post_id}")))?;
    if post.workflow_status != WorkflowStatus::Scheduled {
        return Err(WorkflowError::InvalidTransition {
            from: post.workflow_status.as_str().to_string(),
            to: WorkflowStatus::Posted.as_str().to_string(),
        });
    }

    let changed = tx.execute(
        "UPDATE posts SET workflow_status = 'posted', updated_at = datetime('now')
         WHERE id = ?1 AND workflow_status = 'scheduled'",
        [post_id],
    )?;
    if changed == 0 {
        return Err(WorkflowError::ConcurrentModification {
            expected: "scheduled".to_string(),
            actual: "unknown".to_string(),
        });
    }

    tx.execute(
        "INSERT INTO workflow_history (post_id, user_id, from_status, to_status, comment)
         VALUES (?1, NULL, 'scheduled', 'posted', 'Published')",
        [post_id],
    )?;

    tx.commit()?;
    require_post(conn, post_id)
}

// ====================================================================
// ========================= DESIGN ASSETS ============================
// ====================================================================

/// Appends uploaded asset URLs to one of the post's two lists. The append is
/// a single SQL expression over the current column value, so two racing
/// uploads both land instead of one overwriting the other.
pub fn append_design_assets(
    conn: &Connection,
    post_id: i64,
    kind: AssetKind,
    urls: &[String],
) -> Result<Post, WorkflowError> {
    let joined = join_list(urls);
    if joined.is_empty() {
        return require_post(conn, post_id);
    }

    let column = kind.column();
    let sql = format!(
        "UPDATE posts SET {column} = CASE WHEN {column} = '' THEN ?1
                ELSE {column} || ',' || ?1 END,
                updated_at = datetime('now')
         WHERE id = ?2"
    );
    let changed = conn.execute(&sql, params![joined, post_id])?;
    if changed == 0 {
        return Err(WorkflowError::NotFound(format!("Post {post_id}")));
    }
    require_post(conn, post_id)
}

// ====================================================================
// =========================== READ PATHS =============================
// ====================================================================

#[derive(Debug, Deserialize, Default)]
pub struct PostFilters {
    pub status: Option<String>,
    pub platform: Option<String>,
    pub client_id: Option<i64>,
}

pub fn read_all_posts(
    conn: &Connection,
    filters: &PostFilters,
) -> Result<Vec<Post>, RusqliteError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(status) = &filters.status {
        clauses.push("p.workflow_status = ?");
        values.push(Box::new(status.clone()));
    }
    if let Some(platform) = &filters.platform {
        clauses.push("p.platforms LIKE ?");
        values.push(Box::new(format!("%{platform}%")));
    }
    if let Some(client_id) = filters.client_id {
        clauses.push("p.client_id = ?");
        values.push(Box::new(client_id));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "{POST_SELECT} {where_clause} ORDER BY p.scheduled_at DESC, p.created_at DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(rusqlite::params_from_iter(values.iter()), post_from_row)?;

    let mut posts = Vec::new();
    for post in iter {
        posts.push(post?);
    }
    Ok(posts)
}

/// Posts of a month for calendar display and slot reconciliation: scheduled
/// posts by their scheduled date, optionally unscheduled posts by creation
/// date.
pub fn read_posts_in_month(
    conn: &Connection,
    window: (&str, &str),
    client_id: Option<i64>,
    include_unscheduled: bool,
) -> Result<Vec<Post>, RusqliteError> {
    let (start, end) = window;
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
        Box::new(start.to_string()),
        Box::new(end.to_string()),
    ];

    let mut time_clause = "(p.scheduled_at IS NOT NULL AND p.scheduled_at != ''
         AND date(p.scheduled_at) >= ?1 AND date(p.scheduled_at) < ?2)"
        .to_string();
    if include_unscheduled {
        time_clause.push_str(
            " OR ((p.scheduled_at IS NULL OR p.scheduled_at = '')
              AND date(p.created_at) >= ?1 AND date(p.created_at) < ?2)",
        );
    }

    let mut sql = format!("{POST_SELECT} WHERE ({time_clause})");
    if let Some(client_id) = client_id {
        sql.push_str(" AND p.client_id = ?3");
        values.push(Box::new(client_id));
    }
    sql.push_str(" ORDER BY COALESCE(p.scheduled_at, p.created_at) ASC, p.id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(rusqlite::params_from_iter(values.iter()), post_from_row)?;

    let mut posts = Vec::new();
    for post in iter {
        posts.push(post?);
    }
    Ok(posts)
}

/// Kanban projection of every in-flight post, urgent first. Posted content
/// has left the pipeline and is excluded.
#[derive(Debug, Serialize, Default)]
pub struct PipelineBoard {
    pub draft: Vec<Post>,
    pub needs_caption: Vec<Post>,
    pub in_design: Vec<Post>,
    pub design_review: Vec<Post>,
    pub approved: Vec<Post>,
    pub scheduled: Vec<Post>,
}

pub fn read_pipeline_board(
    conn: &Connection,
    client_id: Option<i64>,
    assigned_to: Option<i64>,
) -> Result<PipelineBoard, RusqliteError> {
    let mut clauses: Vec<&str> = vec!["p.workflow_status != 'posted'"];
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(client_id) = client_id {
        clauses.push("p.client_id = ?");
        values.push(Box::new(client_id));
    }
    if let Some(user_id) = assigned_to {
        clauses.push(
            "(p.assigned_writer_id = ? OR p.assigned_designer_id = ?
              OR p.assigned_sm_id = ? OR p.assigned_motion_id = ? OR p.created_by_id = ?)",
        );
        for _ in 0..5 {
            values.push(Box::new(user_id));
        }
    }

    let sql = format!(
        "{POST_SELECT} WHERE {} ORDER BY {PRIORITY_ORDER}, p.created_at DESC",
        clauses.join(" AND ")
    );
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map(rusqlite::params_from_iter(values.iter()), post_from_row)?;

    let mut board = PipelineBoard::default();
    for post in iter {
        let post = post?;
        match post.workflow_status {
            WorkflowStatus::NeedsCaption => board.needs_caption.push(post),
            WorkflowStatus::InDesign => board.in_design.push(post),
            WorkflowStatus::DesignReview => board.design_review.push(post),
            WorkflowStatus::Approved => board.approved.push(post),
            WorkflowStatus::Scheduled => board.scheduled.push(post),
            _ => board.draft.push(post),
        }
    }
    Ok(board)
}

/// A post surfaced on someone's "my work" queue together with the reason it
/// is there.
#[derive(Debug, Serialize)]
pub struct WorkItem {
    pub action: &'static str,
    #[serde(flatten)]
    pub post: Post,
}

fn collect_work(
    conn: &Connection,
    sql: &str,
    values: &[&dyn rusqlite::ToSql],
    action: &'static str,
    items: &mut Vec<WorkItem>,
) -> Result<(), RusqliteError> {
    let mut stmt = conn.prepare(sql)?;
    let iter = stmt.query_map(values, post_from_row)?;
    for post in iter {
        let post = post?;
        if !items.iter().any(|item| item.post.id == post.id) {
            items.push(WorkItem { action, post });
        }
    }
    Ok(())
}

/// Role-aware action items: what needs this user's attention right now.
pub fn read_my_work(
    conn: &Connection,
    user_id: i64,
    role: &str,
) -> Result<Vec<WorkItem>, RusqliteError> {
    let mut items: Vec<WorkItem> = Vec::new();

    match role {
        "copywriter" => {
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.assigned_writer_id = ?1
                     AND p.workflow_status = 'needs_caption' AND p.revision_count > 0
                     ORDER BY p.updated_at DESC"
                ),
                &[&user_id],
                "returned_for_edits",
                &mut items,
            )?;
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.assigned_writer_id = ?1
                     AND p.workflow_status = 'needs_caption'
                     ORDER BY {PRIORITY_ORDER}"
                ),
                &[&user_id],
                "needs_caption",
                &mut items,
            )?;
        }
        "designer" | "motion_editor" => {
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.assigned_designer_id = ?1
                     AND p.workflow_status = 'in_design' AND p.revision_count > 0
                     ORDER BY p.updated_at DESC"
                ),
                &[&user_id],
                "returned_for_edits",
                &mut items,
            )?;
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.assigned_designer_id = ?1
                     AND p.workflow_status = 'in_design'
                     ORDER BY {PRIORITY_ORDER}"
                ),
                &[&user_id],
                "needs_design",
                &mut items,
            )?;
        }
        "sm_specialist" | "manager" => {
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE (p.assigned_sm_id = ?1 OR p.assigned_sm_id IS NULL)
                     AND p.workflow_status = 'design_review'
                     ORDER BY {PRIORITY_ORDER}"
                ),
                &[&user_id],
                "needs_review",
                &mut items,
            )?;
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.workflow_status = 'approved'
                     AND (p.scheduled_at IS NULL OR p.scheduled_at = '')
                     ORDER BY p.updated_at DESC"
                ),
                &[],
                "ready_to_schedule",
                &mut items,
            )?;
        }
        "admin" => {
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.workflow_status = 'draft'
                     AND p.assigned_designer_id IS NULL
                     ORDER BY p.created_at DESC LIMIT 20"
                ),
                &[],
                "unassigned",
                &mut items,
            )?;
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.workflow_status = 'scheduled'
                     AND p.scheduled_at < datetime('now') AND p.scheduled_at != ''
                     ORDER BY p.scheduled_at ASC LIMIT 20"
                ),
                &[],
                "overdue",
                &mut items,
            )?;
            collect_work(
                conn,
                &format!(
                    "{POST_SELECT} WHERE p.workflow_status = 'design_review'
                     ORDER BY p.updated_at DESC LIMIT 20"
                ),
                &[],
                "needs_review",
                &mut items,
            )?;
        }
        _ => {}
    }

    Ok(items)
}

pub fn read_history(conn: &Connection, post_id: i64) -> Result<Vec<WorkflowEvent>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT wh.id, wh.post_id, wh.user_id, wh.from_status, wh.to_status, wh.comment,
                wh.created_at, u.username AS user_name
         FROM workflow_history wh
         LEFT JOIN users u ON wh.user_id = u.id
         WHERE wh.post_id = ?1
         ORDER BY wh.created_at ASC, wh.id ASC",
    )?;
    let iter = stmt.query_map([post_id], |row| {
        Ok(WorkflowEvent {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            from_status: row.get(3)?,
            to_status: row.get(4)?,
            comment: row.get(5)?,
            created_at: row.get(6)?,
            user_name: row.get(7)?,
        })
    })?;

    let mut events = Vec::new();
    for event in iter {
        events.push(event?);
    }
    Ok(events)
}

pub fn read_comments(conn: &Connection, post_id: i64) -> Result<Vec<PostComment>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT pc.id, pc.post_id, pc.user_id, pc.content, pc.comment_type, pc.created_at,
                u.username AS user_name
         FROM post_comments pc
         LEFT JOIN users u ON pc.user_id = u.id
         WHERE pc.post_id = ?1
         ORDER BY pc.created_at ASC, pc.id ASC",
    )?;
    let iter = stmt.query_map([post_id], |row| {
        Ok(PostComment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            user_id: row.get(2)?,
            content: row.get(3)?,
            comment_type: row.get(4)?,
            created_at: row.get(5)?,
            user_name: row.get(6)?,
        })
    })?;

    let mut comments = Vec::new();
    for comment in iter {
        comments.push(comment?);
    }
    Ok(comments)
}

pub fn add_comment(
    conn: &Connection,
    post_id: i64,
    user_id: i64,
    content: &str,
    comment_type: &str,
) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO post_comments (post_id, user_id, content, comment_type)
         VALUES (?1, ?2, ?3, ?4)",
        params![post_id, user_id, content, comment_type],
    )?;
    Ok(())
}

pub fn delete_post(conn: &mut Connection, post_id: i64) -> Result<(), RusqliteError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM post_comments WHERE post_id = ?1", [post_id])?;
    tx.execute("DELETE FROM workflow_history WHERE post_id = ?1", [post_id])?;
    tx.execute("DELETE FROM publish_log WHERE post_id = ?1", [post_id])?;
    tx.execute("DELETE FROM tasks WHERE post_id = ?1", [post_id])?;
    tx.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;
    tx.commit()
}

// ====================================================================
// ========================== PUBLISH SWEEP ===========================
// ====================================================================

pub fn read_due_posts(conn: &Connection, now: &str) -> Result<Vec<Post>, RusqliteError> {
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT} WHERE p.workflow_status = 'scheduled'
         AND p.scheduled_at IS NOT NULL AND p.scheduled_at != '' AND p.scheduled_at <= ?1
         ORDER BY p.scheduled_at ASC"
    ))?;
    let iter = stmt.query_map([now], post_from_row)?;

    let mut posts = Vec::new();
    for post in iter {
        posts.push(post?);
    }
    Ok(posts)
}

pub fn log_publish_attempt(
    conn: &Connection,
    post_id: i64,
    platform: &str,
    success: bool,
    detail: &str,
) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO publish_log (post_id, platform, status, detail)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            post_id,
            platform,
            if success { "success" } else { "failed" },
            detail
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::{clients_db_operations, users_db_operations};
    use crate::setup::db_setup;
    use std::collections::HashMap;

    struct Fixture {
        conn: Connection,
        users: HashMap<&'static str, i64>,
        client_id: i64,
    }

    fn fixture() -> Fixture {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_agency_db(&mut conn).unwrap();

        let mut users = HashMap::new();
        for role in [
            "admin",
            "manager",
            "sm_specialist",
            "copywriter",
            "designer",
            "motion_editor",
        ] {
            let id = users_db_operations::create_user(
                &conn,
                role,
                &format!("{role}@studio.io"),
                "pw",
                role,
                "",
                "",
            )
            .unwrap();
            users.insert(role, id);
        }

        let client_id = clients_db_operations::create_client(
            &conn,
            "Acme",
            "",
            "",
            "",
            "",
            &clients_db_operations::TeamAssignments {
                assigned_writer_id: Some(users["copywriter"]),
                assigned_designer_id: Some(users["designer"]),
                assigned_sm_id: Some(users["sm_specialist"]),
                ..Default::default()
            },
        )
        .unwrap();

        Fixture {
            conn,
            users,
            client_id,
        }
    }

    fn seed_post(fx: &mut Fixture, status: WorkflowStatus) -> i64 {
        let post = create_post(
            &mut fx.conn,
            fx.client_id,
            fx.users["admin"],
            &NewPost {
                topic: Some("February launch".to_string()),
                platforms: Some(vec!["instagram".to_string()]),
                caption: Some("caption text".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        fx.conn
            .execute(
                "UPDATE posts SET workflow_status = ?1 WHERE id = ?2",
                params![status.as_str(), post.id],
            )
            .unwrap();
        post.id
    }

    fn request(to: WorkflowStatus, actor: i64) -> TransitionRequest {
        TransitionRequest {
            to,
            actor_id: actor,
            comment: None,
            scheduled_at: None,
            caption: None,
        }
    }

    #[test]
    fn new_posts_start_in_draft_with_inherited_assignments() {
        let mut fx = fixture();
        let post = create_post(
            &mut fx.conn,
            fx.client_id,
            fx.users["admin"],
            &NewPost::default(),
        )
        .unwrap();

        assert_eq!(post.workflow_status, WorkflowStatus::Draft);
        assert_eq!(post.assigned_writer_id, Some(fx.users["copywriter"]));
        assert_eq!(post.assigned_designer_id, Some(fx.users["designer"]));
        assert_eq!(post.assigned_sm_id, Some(fx.users["sm_specialist"]));
        assert_eq!(post.client_name.as_deref(), Some("Acme"));

        let history = read_history(&fx.conn, post.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_status, "draft");
    }

    #[test]
    fn transition_moves_status_and_appends_history() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::Draft);

        let post = transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::Draft,
            &request(WorkflowStatus::InDesign, fx.users["admin"]),
        )
        .unwrap();

        assert_eq!(post.workflow_status, WorkflowStatus::InDesign);
        let history = read_history(&fx.conn, post_id).unwrap();
        assert_eq!(history.last().unwrap().from_status, "draft");
        assert_eq!(history.last().unwrap().to_status, "in_design");
    }

    #[test]
    fn unauthorized_roles_are_rejected_without_a_write() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::Draft);

        let result = transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::Draft,
            &request(WorkflowStatus::InDesign, fx.users["designer"]),
        );
        assert!(matches!(result, Err(WorkflowError::Unauthorized { .. })));

        let post = read_post(&fx.conn, post_id).unwrap().unwrap();
        assert_eq!(post.workflow_status, WorkflowStatus::Draft);
        assert_eq!(read_history(&fx.conn, post_id).unwrap().len(), 1);
    }

    #[test]
    fn stale_expected_state_is_a_concurrency_error() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::InDesign);

        let result = transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::Draft,
            &request(WorkflowStatus::InDesign, fx.users["admin"]),
        );
        assert!(matches!(
            result,
            Err(WorkflowError::ConcurrentModification { .. })
        ));
    }

    #[test]
    fn caption_handoff_saves_text_before_transitioning() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::NeedsCaption);

        let mut req = request(WorkflowStatus::InDesign, fx.users["copywriter"]);
        req.caption = Some("Fresh February copy".to_string());
        let post =
            transition_post(&mut fx.conn, post_id, WorkflowStatus::NeedsCaption, &req).unwrap();

        assert_eq!(post.workflow_status, WorkflowStatus::InDesign);
        assert_eq!(post.caption, "Fresh February copy");
    }

    #[test]
    fn empty_caption_saves_but_blocks_the_transition() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::NeedsCaption);

        let mut req = request(WorkflowStatus::InDesign, fx.users["copywriter"]);
        req.caption = Some("   ".to_string());
        let result = transition_post(&mut fx.conn, post_id, WorkflowStatus::NeedsCaption, &req);
        assert!(matches!(result, Err(WorkflowError::ValidationFailed(_))));

        // Phase one completed, phase two did not.
        let post = read_post(&fx.conn, post_id).unwrap().unwrap();
        assert_eq!(post.workflow_status, WorkflowStatus::NeedsCaption);
        assert_eq!(post.caption, "   ");
    }

    #[test]
    fn review_rejection_increments_revisions_and_records_feedback() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::DesignReview);

        let missing = transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::DesignReview,
            &request(WorkflowStatus::InDesign, fx.users["manager"]),
        );
        assert!(matches!(missing, Err(WorkflowError::MissingComment)));

        let mut req = request(WorkflowStatus::InDesign, fx.users["manager"]);
        req.comment = Some("Logo is too small".to_string());
        let post =
            transition_post(&mut fx.conn, post_id, WorkflowStatus::DesignReview, &req).unwrap();

        assert_eq!(post.revision_count, 1);
        let comments = read_comments(&fx.conn, post_id).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].comment_type, "revision_feedback");
        assert_eq!(comments[0].content, "Logo is too small");
    }

    #[test]
    fn scheduling_stamps_the_timestamp_from_the_call() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::Approved);

        let no_time = transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::Approved,
            &request(WorkflowStatus::Scheduled, fx.users["sm_specialist"]),
        );
        assert!(matches!(no_time, Err(WorkflowError::ValidationFailed(_))));

        let mut req = request(WorkflowStatus::Scheduled, fx.users["sm_specialist"]);
        req.scheduled_at = Some("2024-02-09T10:00".to_string());
        let post =
            transition_post(&mut fx.conn, post_id, WorkflowStatus::Approved, &req).unwrap();
        assert_eq!(post.workflow_status, WorkflowStatus::Scheduled);
        assert_eq!(post.scheduled_at.as_deref(), Some("2024-02-09T10:00"));
    }

    #[test]
    fn approval_stamps_the_approver() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::DesignReview);

        let post = transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::DesignReview,
            &request(WorkflowStatus::Approved, fx.users["manager"]),
        )
        .unwrap();
        assert_eq!(post.approved_by_id, Some(fx.users["manager"]));
        assert!(post.approved_at.is_some());
    }

    #[test]
    fn publishing_goes_through_the_collaborator_path_only() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::Scheduled);

        let via_user = transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::Scheduled,
            &request(WorkflowStatus::Posted, fx.users["admin"]),
        );
        assert!(matches!(via_user, Err(WorkflowError::Unauthorized { .. })));

        let post = record_published(&mut fx.conn, post_id).unwrap();
        assert_eq!(post.workflow_status, WorkflowStatus::Posted);
        let history = read_history(&fx.conn, post_id).unwrap();
        assert_eq!(history.last().unwrap().user_id, None);

        // Not scheduled any more: a second publish attempt is invalid.
        let again = record_published(&mut fx.conn, post_id);
        assert!(matches!(again, Err(WorkflowError::InvalidTransition { .. })));
    }

    #[test]
    fn handoff_notifies_and_tasks_the_next_assignee() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::Draft);

        transition_post(
            &mut fx.conn,
            post_id,
            WorkflowStatus::Draft,
            &request(WorkflowStatus::InDesign, fx.users["admin"]),
        )
        .unwrap();

        let designer = fx.users["designer"];
        assert_eq!(
            notifications_db_operations::unread_count(&fx.conn, designer).unwrap(),
            1
        );
        let tasks = tasks_db_operations::read_my_tasks(&fx.conn, designer, false).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].category, "design");
        assert_eq!(tasks[0].post_id, Some(post_id));
    }

    #[test]
    fn appended_asset_urls_accumulate_in_call_order() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::InDesign);

        append_design_assets(
            &fx.conn,
            post_id,
            AssetKind::Output,
            &["/media/designs/a.png".to_string()],
        )
        .unwrap();
        let post = append_design_assets(
            &fx.conn,
            post_id,
            AssetKind::Output,
            &["/media/designs/b.png".to_string()],
        )
        .unwrap();

        assert_eq!(
            post.design_output_urls,
            vec!["/media/designs/a.png", "/media/designs/b.png"]
        );
    }

    #[test]
    fn reschedule_keeps_scheduled_posts_scheduled() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::Scheduled);

        let post = reschedule_post(&fx.conn, post_id, "2024-02-20T12:00").unwrap();
        assert_eq!(post.workflow_status, WorkflowStatus::Scheduled);
        assert_eq!(post.scheduled_at.as_deref(), Some("2024-02-20T12:00"));

        let draft_id = seed_post(&mut fx, WorkflowStatus::Draft);
        let draft = reschedule_post(&fx.conn, draft_id, "2024-02-21T09:00").unwrap();
        assert_eq!(draft.workflow_status, WorkflowStatus::Draft);

        let posted_id = seed_post(&mut fx, WorkflowStatus::Posted);
        let rejected = reschedule_post(&fx.conn, posted_id, "2024-02-22T09:00");
        assert!(matches!(rejected, Err(WorkflowError::ValidationFailed(_))));
    }

    #[test]
    fn deleting_a_post_removes_its_trail() {
        let mut fx = fixture();
        let post_id = seed_post(&mut fx, WorkflowStatus::Draft);
        add_comment(&fx.conn, post_id, fx.users["admin"], "note", "comment").unwrap();

        delete_post(&mut fx.conn, post_id).unwrap();
        assert!(read_post(&fx.conn, post_id).unwrap().is_none());
        assert!(read_history(&fx.conn, post_id).unwrap().is_empty());
        assert!(read_comments(&fx.conn, post_id).unwrap().is_empty());
    }

    #[test]
    fn due_posts_are_scheduled_and_past_due_only() {
        let mut fx = fixture();
        let due_id = seed_post(&mut fx, WorkflowStatus::Scheduled);
        reschedule_post(&fx.conn, due_id, "2024-02-01T08:00").unwrap();
        let future_id = seed_post(&mut fx, WorkflowStatus::Scheduled);
        reschedule_post(&fx.conn, future_id, "2030-01-01T08:00").unwrap();

        let due = read_due_posts(&fx.conn, "2024-02-09T10:00").unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, due_id);
    }
}
