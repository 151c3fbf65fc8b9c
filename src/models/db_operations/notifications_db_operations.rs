use rusqlite::{params, Connection, Error as RusqliteError, Row};

use crate::models::Notification;

fn notification_from_row(row: &Row) -> Result<Notification, RusqliteError> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        message: row.get(4)?,
        reference_type: row.get(5)?,
        reference_id: row.get(6)?,
        is_read: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn create_notification(
    conn: &Connection,
    user_id: i64,
    kind: &str,
    title: &str,
    message: &str,
    reference_type: &str,
    reference_id: i64,
) -> Result<(), RusqliteError> {
    conn.execute(
        "INSERT INTO notifications (user_id, kind, title, message, reference_type, reference_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![user_id, kind, title, message, reference_type, reference_id],
    )?;
    Ok(())
}

pub fn read_for_user(
    conn: &Connection,
    user_id: i64,
    limit: u32,
) -> Result<Vec<Notification>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, kind, title, message, reference_type, reference_id,
                is_read, created_at
         FROM notifications WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC LIMIT ?2",
    )?;
    let iter = stmt.query_map(params![user_id, limit], notification_from_row)?;

    let mut notifications = Vec::new();
    for notification in iter {
        notifications.push(notification?);
    }
    Ok(notifications)
}

pub fn unread_count(conn: &Connection, user_id: i64) -> Result<u32, RusqliteError> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        [user_id],
        |row| row.get(0),
    )
}

pub fn mark_read(conn: &Connection, notification_id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        [notification_id],
    )
}

pub fn mark_all_read(conn: &Connection, user_id: i64) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1",
        [user_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::users_db_operations;
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_agency_db(&mut conn).unwrap();
        conn
    }

    #[test]
    fn unread_count_tracks_reads() {
        let conn = test_conn();
        let uid =
            users_db_operations::create_user(&conn, "u", "u@x.io", "pw", "manager", "", "").unwrap();

        create_notification(&conn, uid, "post_approved", "Approved", "", "post", 1).unwrap();
        create_notification(&conn, uid, "design_assigned", "New design", "", "post", 2).unwrap();
        assert_eq!(unread_count(&conn, uid).unwrap(), 2);

        let first = read_for_user(&conn, uid, 50).unwrap()[0].id;
        mark_read(&conn, first).unwrap();
        assert_eq!(unread_count(&conn, uid).unwrap(), 1);

        mark_all_read(&conn, uid).unwrap();
        assert_eq!(unread_count(&conn, uid).unwrap(), 0);
    }
}
