use rusqlite::Connection;
use serde::Serialize;

use crate::helper::workflow_helpers::WorkflowError;
use crate::models::db_operations::posts_db_operations;
use crate::models::Post;

/// External collaborator that pushes a post to an actual social platform.
/// Everything behind this trait is out of the core's hands; the core only
/// cares whether the push succeeded.
pub trait Publisher: Send + Sync {
    fn publish(&self, post: &Post, platform: &str) -> Result<(), String>;
}

/// Stand-in publisher for environments without platform credentials. Logs
/// the would-be push and reports success so the workflow can be exercised
/// end to end.
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish(&self, post: &Post, platform: &str) -> Result<(), String> {
        log::info!(
            "publish stub: post {} ('{}') -> {}",
            post.id,
            post.topic,
            platform
        );
        Ok(())
    }
}

#[derive(Debug, Serialize, Default)]
pub struct SweepReport {
    pub published: u32,
    pub failed: u32,
    pub total: u32,
}

/// Pushes every due `scheduled` post through the publisher. A post moves to
/// `posted` only when all of its platforms succeed; every attempt is logged
/// per platform either way.
pub fn run_due_posts(
    conn: &mut Connection,
    publisher: &dyn Publisher,
    now: &str,
) -> Result<SweepReport, WorkflowError> {
    let due = posts_db_operations::read_due_posts(conn, now)?;
    let mut report = SweepReport {
        total: due.len() as u32,
        ..Default::default()
    };

    for post in due {
        let mut all_ok = true;
        for platform in &post.platforms {
            match publisher.publish(&post, platform) {
                Ok(()) => {
                    posts_db_operations::log_publish_attempt(conn, post.id, platform, true, "")?;
                }
                Err(error) => {
                    all_ok = false;
                    log::warn!("Publishing post {} to {} failed: {}", post.id, platform, error);
                    posts_db_operations::log_publish_attempt(
                        conn, post.id, platform, false, &error,
                    )?;
                }
            }
        }

        if all_ok && !post.platforms.is_empty() {
            posts_db_operations::record_published(conn, post.id)?;
            report.published += 1;
        } else {
            report.failed += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::{clients_db_operations, posts_db_operations, users_db_operations};
    use crate::models::WorkflowStatus;
    use crate::setup::db_setup;
    use rusqlite::params;

    struct FailingPublisher;
    impl Publisher for FailingPublisher {
        fn publish(&self, _post: &Post, _platform: &str) -> Result<(), String> {
            Err("no connection".to_string())
        }
    }

    fn seed(conn: &mut Connection, scheduled_at: &str) -> i64 {
        let uid =
            users_db_operations::create_user(conn, "a", "a@x.io", "pw", "admin", "", "").unwrap();
        let client = clients_db_operations::create_client(
            conn,
            "Acme",
            "",
            "",
            "",
            "",
            &Default::default(),
        )
        .unwrap();
        let post = posts_db_operations::create_post(
            conn,
            client,
            uid,
            &posts_db_operations::NewPost {
                platforms: Some(vec!["instagram".to_string(), "facebook".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
        conn.execute(
            "UPDATE posts SET workflow_status = 'scheduled', scheduled_at = ?1 WHERE id = ?2",
            params![scheduled_at, post.id],
        )
        .unwrap();
        post.id
    }

    #[test]
    fn successful_sweep_moves_due_posts_to_posted() {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_agency_db(&mut conn).unwrap();
        let post_id = seed(&mut conn, "2024-02-01T08:00");

        let report = run_due_posts(&mut conn, &LogPublisher, "2024-02-09T10:00").unwrap();
        assert_eq!(report.published, 1);
        assert_eq!(report.failed, 0);

        let post = posts_db_operations::read_post(&conn, post_id).unwrap().unwrap();
        assert_eq!(post.workflow_status, WorkflowStatus::Posted);
    }

    #[test]
    fn failed_pushes_keep_the_post_scheduled_and_log_the_attempts() {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_agency_db(&mut conn).unwrap();
        let post_id = seed(&mut conn, "2024-02-01T08:00");

        let report = run_due_posts(&mut conn, &FailingPublisher, "2024-02-09T10:00").unwrap();
        assert_eq!(report.published, 0);
        assert_eq!(report.failed, 1);

        let post = posts_db_operations::read_post(&conn, post_id).unwrap().unwrap();
        assert_eq!(post.workflow_status, WorkflowStatus::Scheduled);

        let attempts: u32 = conn
            .query_row(
                "SELECT COUNT(*) FROM publish_log WHERE post_id = ?1 AND status = 'failed'",
                [post_id],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(attempts, 2);
    }
}
