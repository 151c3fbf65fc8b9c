use bcrypt::{hash, verify, BcryptError};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

use crate::models::User;

fn bcrypt_to_rusqlite_error(e: BcryptError) -> RusqliteError {
    RusqliteError::ToSqlConversionFailure(Box::new(e))
}

const USER_SELECT: &str =
    "SELECT id, username, email, role, is_active, dark_mode, job_title, phone FROM users";

fn user_from_row(row: &Row) -> Result<User, RusqliteError> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        is_active: row.get(4)?,
        dark_mode: row.get(5)?,
        job_title: row.get(6)?,
        phone: row.get(7)?,
    })
}

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
    job_title: &str,
    phone: &str,
) -> Result<i64, RusqliteError> {
    let hashed_password = hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
    conn.execute(
        "INSERT INTO users (username, email, password_hash, role, job_title, phone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![username, email, hashed_password, role, job_title, phone],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_all_users(conn: &Connection, role: Option<&str>) -> Result<Vec<User>, RusqliteError> {
    let mut users = Vec::new();
    match role {
        Some(role) => {
            let mut stmt =
                conn.prepare(&format!("{USER_SELECT} WHERE role = ?1 ORDER BY username"))?;
            let iter = stmt.query_map([role], user_from_row)?;
            for user in iter {
                users.push(user?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} ORDER BY username"))?;
            let iter = stmt.query_map([], user_from_row)?;
            for user in iter {
                users.push(user?);
            }
        }
    }
    Ok(users)
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>, RusqliteError> {
    conn.query_row(
        &format!("{USER_SELECT} WHERE id = ?1"),
        [user_id],
        user_from_row,
    )
    .optional()
}

pub fn read_role(conn: &Connection, user_id: i64) -> Result<Option<String>, RusqliteError> {
    conn.query_row("SELECT role FROM users WHERE id = ?1", [user_id], |row| {
        row.get(0)
    })
    .optional()
}

pub fn update_user(
    conn: &Connection,
    user_id: i64,
    username: &str,
    email: &str,
    role: &str,
    job_title: &str,
    phone: &str,
    is_active: bool,
    new_password: Option<&str>,
) -> Result<usize, RusqliteError> {
    if let Some(password) = new_password.filter(|p| !p.is_empty()) {
        let hashed_password =
            hash(password, bcrypt::DEFAULT_COST).map_err(bcrypt_to_rusqlite_error)?;
        return conn.execute(
            "UPDATE users SET username=?1, email=?2, role=?3, job_title=?4, phone=?5,
                    is_active=?6, password_hash=?7 WHERE id=?8",
            params![username, email, role, job_title, phone, is_active, hashed_password, user_id],
        );
    }

    conn.execute(
        "UPDATE users SET username=?1, email=?2, role=?3, job_title=?4, phone=?5,
                is_active=?6 WHERE id=?7",
        params![username, email, role, job_title, phone, is_active, user_id],
    )
}

pub fn delete_user(conn: &Connection, user_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM users WHERE id = ?1", [user_id])
}

/// Email + password check. Suspended accounts never authenticate.
pub fn verify_credentials(conn: &Connection, email: &str, password: &str) -> Option<User> {
    let result: rusqlite::Result<(String, User)> = conn.query_row(
        "SELECT password_hash, id, username, email, role, is_active, dark_mode,
                job_title, phone
         FROM users WHERE email = ?1",
        [email],
        |row| {
            Ok((
                row.get(0)?,
                User {
                    id: row.get(1)?,
                    username: row.get(2)?,
                    email: row.get(3)?,
                    role: row.get(4)?,
                    is_active: row.get(5)?,
                    dark_mode: row.get(6)?,
                    job_title: row.get(7)?,
                    phone: row.get(8)?,
                },
            ))
        },
    );

    if let Ok((stored_hash, user)) = result {
        if user.is_active && verify(password, &stored_hash).unwrap_or(false) {
            return Some(user);
        }
    }
    None
}

pub fn set_dark_mode(
    conn: &Connection,
    user_id: i64,
    dark_mode: bool,
) -> Result<usize, RusqliteError> {
    conn.execute(
        "UPDATE users SET dark_mode = ?1 WHERE id = ?2",
        params![dark_mode, user_id],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_agency_db(&mut conn).unwrap();
        conn
    }

    #[test]
    fn created_users_authenticate_by_email() {
        let conn = test_conn();
        create_user(&conn, "nora", "nora@studio.io", "s3cret", "manager", "", "").unwrap();

        let user = verify_credentials(&conn, "nora@studio.io", "s3cret").unwrap();
        assert_eq!(user.username, "nora");
        assert_eq!(user.role, "manager");

        assert!(verify_credentials(&conn, "nora@studio.io", "wrong").is_none());
        assert!(verify_credentials(&conn, "ghost@studio.io", "s3cret").is_none());
    }

    #[test]
    fn suspended_accounts_cannot_log_in() {
        let conn = test_conn();
        let id = create_user(&conn, "omar", "omar@studio.io", "pw", "designer", "", "").unwrap();
        update_user(&conn, id, "omar", "omar@studio.io", "designer", "", "", false, None).unwrap();
        assert!(verify_credentials(&conn, "omar@studio.io", "pw").is_none());
    }

    #[test]
    fn role_filter_limits_the_listing() {
        let conn = test_conn();
        create_user(&conn, "a", "a@x.io", "pw", "designer", "", "").unwrap();
        create_user(&conn, "b", "b@x.io", "pw", "copywriter", "", "").unwrap();

        assert_eq!(read_all_users(&conn, Some("designer")).unwrap().len(), 1);
        assert_eq!(read_all_users(&conn, None).unwrap().len(), 2);
    }
}
