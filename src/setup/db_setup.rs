use rusqlite::{Connection, Result as RusqliteResult, Transaction};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

/// Creates the full schema. Every statement is idempotent so re-running the
/// CLI against an existing database is harmless.
pub fn setup_agency_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;

    println!("- Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL CHECK(role IN (
                'admin', 'manager', 'sm_specialist',
                'copywriter', 'designer', 'motion_editor'
            )),
            is_active INTEGER NOT NULL DEFAULT 1,
            dark_mode INTEGER NOT NULL DEFAULT 0,
            job_title TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    println!("- Creating 'clients' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            company TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '',
            brief_text TEXT NOT NULL DEFAULT '',
            content_requirements TEXT NOT NULL DEFAULT '',
            assigned_manager_id INTEGER REFERENCES users(id),
            assigned_writer_id INTEGER REFERENCES users(id),
            assigned_designer_id INTEGER REFERENCES users(id),
            assigned_sm_id INTEGER REFERENCES users(id),
            assigned_motion_id INTEGER REFERENCES users(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    println!("- Creating 'posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id),
            topic TEXT NOT NULL DEFAULT '',
            caption TEXT NOT NULL DEFAULT '',
            tov TEXT NOT NULL DEFAULT '',
            brief_notes TEXT NOT NULL DEFAULT '',
            platforms TEXT NOT NULL DEFAULT '',
            post_type TEXT NOT NULL DEFAULT 'post',
            priority TEXT NOT NULL DEFAULT 'normal',
            scheduled_at TEXT,
            design_reference_urls TEXT NOT NULL DEFAULT '',
            design_output_urls TEXT NOT NULL DEFAULT '',
            workflow_status TEXT NOT NULL DEFAULT 'draft',
            revision_count INTEGER NOT NULL DEFAULT 0,
            assigned_writer_id INTEGER REFERENCES users(id),
            assigned_designer_id INTEGER REFERENCES users(id),
            assigned_sm_id INTEGER REFERENCES users(id),
            assigned_motion_id INTEGER REFERENCES users(id),
            created_by_id INTEGER REFERENCES users(id),
            approved_by_id INTEGER REFERENCES users(id),
            approved_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT
        )",
        [],
    )?;

    println!("- Creating 'workflow_history' table...");
    // user_id is nullable: publisher-recorded transitions have no human actor.
    tx.execute(
        "CREATE TABLE IF NOT EXISTS workflow_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id INTEGER REFERENCES users(id),
            from_status TEXT NOT NULL DEFAULT '',
            to_status TEXT NOT NULL,
            comment TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    println!("- Creating 'post_comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS post_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            comment_type TEXT NOT NULL DEFAULT 'comment',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    println!("- Creating 'posting_rules' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posting_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id INTEGER NOT NULL REFERENCES clients(id) ON DELETE CASCADE,
            platform TEXT NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'post',
            posting_days TEXT NOT NULL,
            posting_hours TEXT NOT NULL,
            posts_per_day INTEGER NOT NULL DEFAULT 1,
            is_active INTEGER NOT NULL DEFAULT 1,
            notes TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    println!("- Creating 'tasks' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            client_id INTEGER REFERENCES clients(id),
            assigned_to_id INTEGER REFERENCES users(id),
            created_by_id INTEGER NOT NULL REFERENCES users(id),
            status TEXT NOT NULL DEFAULT 'todo',
            priority TEXT NOT NULL DEFAULT 'normal',
            due_date TEXT,
            category TEXT NOT NULL DEFAULT 'general',
            post_id INTEGER REFERENCES posts(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT,
            completed_at TEXT
        )",
        [],
    )?;

    println!("- Creating 'task_comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS task_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            user_id INTEGER NOT NULL REFERENCES users(id),
            content TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    println!("- Creating 'notifications' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            reference_type TEXT,
            reference_id INTEGER,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    println!("- Creating 'publish_log' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS publish_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            platform TEXT NOT NULL,
            status TEXT NOT NULL,
            detail TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    create_indexes(&tx)?;

    tx.commit()?;
    Ok(())
}

fn create_indexes(tx: &Transaction) -> RusqliteResult<()> {
    println!("- Creating indexes...");
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_posts_client_status
         ON posts (client_id, workflow_status)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_posts_scheduled_at ON posts (scheduled_at)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_post ON workflow_history (post_id)",
        [],
    )?;
    tx.execute(
        "CREATE INDEX IF NOT EXISTS idx_notifications_user
         ON notifications (user_id, is_read)",
        [],
    )?;
    Ok(())
}
