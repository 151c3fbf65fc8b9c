use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::models::Client;

const CLIENT_SELECT: &str = "SELECT id, name, company, email, color, brief_text, \
                             content_requirements, assigned_manager_id, assigned_writer_id, \
                             assigned_designer_id, assigned_sm_id, assigned_motion_id, \
                             created_at FROM clients";

fn client_from_row(row: &Row) -> Result<Client, RusqliteError> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        company: row.get(2)?,
        email: row.get(3)?,
        color: row.get(4)?,
        brief_text: row.get(5)?,
        content_requirements: row.get(6)?,
        assigned_manager_id: row.get(7)?,
        assigned_writer_id: row.get(8)?,
        assigned_designer_id: row.get(9)?,
        assigned_sm_id: row.get(10)?,
        assigned_motion_id: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Default team routing for a client; new posts inherit these ids.
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct TeamAssignments {
    pub assigned_manager_id: Option<i64>,
    pub assigned_writer_id: Option<i64>,
    pub assigned_designer_id: Option<i64>,
    pub assigned_sm_id: Option<i64>,
    pub assigned_motion_id: Option<i64>,
}

pub fn create_client(
    conn: &Connection,
    name: &str,
    company: &str,
    email: &str,
    brief_text: &str,
    content_requirements: &str,
    assignments: &TeamAssignments,
) -> Result<i64, RusqliteError> {
    conn.execute(
        "INSERT INTO clients
            (name, company, email, brief_text, content_requirements,
             assigned_manager_id, assigned_writer_id, assigned_designer_id,
             assigned_sm_id, assigned_motion_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            name,
            company,
            email,
            brief_text,
            content_requirements,
            assignments.assigned_manager_id,
            assignments.assigned_writer_id,
            assignments.assigned_designer_id,
            assignments.assigned_sm_id,
            assignments.assigned_motion_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_client(conn: &Connection, client_id: i64) -> Result<Option<Client>, RusqliteError> {
    conn.query_row(
        &format!("{CLIENT_SELECT} WHERE id = ?1"),
        [client_id],
        client_from_row,
    )
    .optional()
}

pub fn read_all_clients(conn: &Connection) -> Result<Vec<Client>, RusqliteError> {
    let mut stmt = conn.prepare(&format!("{CLIENT_SELECT} ORDER BY id DESC"))?;
    let iter = stmt.query_map([], client_from_row)?;

    let mut clients = Vec::new();
    for client in iter {
        clients.push(client?);
    }
    Ok(clients)
}

#[derive(Debug, Deserialize, Default)]
pub struct ClientUpdate {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub color: Option<String>,
    pub brief_text: Option<String>,
    pub content_requirements: Option<String>,
    pub assigned_manager_id: Option<Option<i64>>,
    pub assigned_writer_id: Option<Option<i64>>,
    pub assigned_designer_id: Option<Option<i64>>,
    pub assigned_sm_id: Option<Option<i64>>,
    pub assigned_motion_id: Option<Option<i64>>,
}

pub fn update_client(
    conn: &Connection,
    client_id: i64,
    update: &ClientUpdate,
) -> Result<usize, RusqliteError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    macro_rules! set_text {
        ($field:expr, $column:literal) => {
            if let Some(value) = &$field {
                sets.push(concat!($column, " = ?"));
                values.push(Box::new(value.clone()));
            }
        };
    }
    macro_rules! set_id {
        ($field:expr, $column:literal) => {
            if let Some(value) = $field {
                sets.push(concat!($column, " = ?"));
                values.push(Box::new(value));
            }
        };
    }

    set_text!(update.name, "name");
    set_text!(update.company, "company");
    set_text!(update.email, "email");
    set_text!(update.color, "color");
    set_text!(update.brief_text, "brief_text");
    set_text!(update.content_requirements, "content_requirements");
    set_id!(update.assigned_manager_id, "assigned_manager_id");
    set_id!(update.assigned_writer_id, "assigned_writer_id");
    set_id!(update.assigned_designer_id, "assigned_designer_id");
    set_id!(update.assigned_sm_id, "assigned_sm_id");
    set_id!(update.assigned_motion_id, "assigned_motion_id");

    if sets.is_empty() {
        return Ok(0);
    }

    values.push(Box::new(client_id));
    let sql = format!("UPDATE clients SET {} WHERE id = ?", sets.join(", "));
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
}

/// Deleting a client takes its posts (with their history and comments, via
/// FK cascade on post children) and posting rules with it.
pub fn delete_client(conn: &mut Connection, client_id: i64) -> Result<(), RusqliteError> {
    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM post_comments WHERE post_id IN (SELECT id FROM posts WHERE client_id = ?1)",
        [client_id],
    )?;
    tx.execute(
        "DELETE FROM workflow_history WHERE post_id IN (SELECT id FROM posts WHERE client_id = ?1)",
        [client_id],
    )?;
    tx.execute(
        "DELETE FROM publish_log WHERE post_id IN (SELECT id FROM posts WHERE client_id = ?1)",
        [client_id],
    )?;
    tx.execute("DELETE FROM posts WHERE client_id = ?1", [client_id])?;
    tx.execute("DELETE FROM posting_rules WHERE client_id = ?1", [client_id])?;
    tx.execute("DELETE FROM clients WHERE id = ?1", [client_id])?;
    tx.commit()
}

#[derive(Debug, Serialize)]
pub struct CoverageWeek {
    pub week_start: String,
    pub week_end: String,
    pub days: [bool; 7],
    pub post_count: usize,
}

fn scheduled_dates_between(
    conn: &Connection,
    client_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>, RusqliteError> {
    let mut stmt = conn.prepare(
        "SELECT date(scheduled_at) FROM posts
         WHERE client_id = ?1 AND scheduled_at IS NOT NULL AND scheduled_at != ''
           AND date(scheduled_at) >= ?2 AND date(scheduled_at) <= ?3",
    )?;
    let iter = stmt.query_map(
        params![
            client_id,
            start.format("%Y-%m-%d").to_string(),
            end.format("%Y-%m-%d").to_string()
        ],
        |row| row.get::<_, String>(0),
    )?;

    let mut dates = Vec::new();
    for raw in iter {
        if let Ok(date) = NaiveDate::parse_from_str(&raw?, "%Y-%m-%d") {
            dates.push(date);
        }
    }
    Ok(dates)
}

/// Which weekdays of each of the next `weeks` weeks have scheduled content.
pub fn client_coverage(
    conn: &Connection,
    client_id: i64,
    today: NaiveDate,
    weeks: u32,
) -> Result<Vec<CoverageWeek>, RusqliteError> {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);

    let mut coverage = Vec::new();
    for offset in 0..weeks {
        let week_start = monday + Duration::weeks(offset as i64);
        let week_end = week_start + Duration::days(6);

        let dates = scheduled_dates_between(conn, client_id, week_start, week_end)?;
        let mut days = [false; 7];
        for date in &dates {
            let idx = (*date - week_start).num_days();
            if (0..7).contains(&idx) {
                days[idx as usize] = true;
            }
        }
        coverage.push(CoverageWeek {
            week_start: week_start.format("%Y-%m-%d").to_string(),
            week_end: week_end.format("%Y-%m-%d").to_string(),
            days,
            post_count: dates.len(),
        });
    }
    Ok(coverage)
}

#[derive(Debug, Serialize)]
pub struct ClientOverview {
    #[serde(flatten)]
    pub client: Client,
    pub this_week_coverage: usize,
    pub next_week_coverage: usize,
    pub this_week_total: usize,
    pub next_week_total: usize,
    pub pipeline: BTreeMap<String, u32>,
}

/// Per-client staffing of the next two weeks plus live pipeline counts, the
/// data behind the agency overview screen.
pub fn clients_overview(
    conn: &Connection,
    today: NaiveDate,
) -> Result<Vec<ClientOverview>, RusqliteError> {
    let clients = read_all_clients(conn)?;
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    let next_monday = monday + Duration::weeks(1);

    let mut overview = Vec::new();
    for client in clients {
        let this_week =
            scheduled_dates_between(conn, client.id, monday, monday + Duration::days(6))?;
        let next_week = scheduled_dates_between(
            conn,
            client.id,
            next_monday,
            next_monday + Duration::days(6),
        )?;

        let distinct_days = |dates: &[NaiveDate]| {
            let mut days: Vec<NaiveDate> = dates.to_vec();
            days.sort();
            days.dedup();
            days.len()
        };

        let mut pipeline = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT workflow_status, COUNT(*) FROM posts
             WHERE client_id = ?1 AND workflow_status != 'posted'
             GROUP BY workflow_status",
        )?;
        let iter = stmt.query_map([client.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
        })?;
        for entry in iter {
            let (status, count) = entry?;
            pipeline.insert(status, count);
        }

        overview.push(ClientOverview {
            this_week_coverage: distinct_days(&this_week),
            next_week_coverage: distinct_days(&next_week),
            this_week_total: this_week.len(),
            next_week_total: next_week.len(),
            pipeline,
            client,
        });
    }
    Ok(overview)
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

    fn seed_scheduled_post(conn: &Connection, client_id: i64, scheduled_at: &str) {
        conn.execute(
            "INSERT INTO posts (client_id, platforms, workflow_status, scheduled_at)
             VALUES (?1, 'instagram', 'scheduled', ?2)",
            params![client_id, scheduled_at],
        )
        .unwrap();
    }

    #[test]
    fn coverage_marks_the_days_with_content() {
        let conn = test_conn();
        let client_id = create_client(&conn, "Acme", "", "", "", "", &Default::default()).unwrap();

        // 2024-02-05 is a Monday.
        seed_scheduled_post(&conn, client_id, "2024-02-05T10:00");
        seed_scheduled_post(&conn, client_id, "2024-02-07T10:00");
        seed_scheduled_post(&conn, client_id, "2024-02-07T18:00");

        let today = NaiveDate::from_ymd_opt(2024, 2, 6).unwrap();
        let weeks = client_coverage(&conn, client_id, today, 1).unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].week_start, "2024-02-05");
        assert_eq!(weeks[0].days, [true, false, true, false, false, false, false]);
        assert_eq!(weeks[0].post_count, 3);
    }

    #[test]
    fn overview_counts_distinct_days_and_pipeline() {
        let conn = test_conn();
        let client_id = create_client(&conn, "Acme", "", "", "", "", &Default::default()).unwrap();
        seed_scheduled_post(&conn, client_id, "2024-02-06T10:00");
        seed_scheduled_post(&conn, client_id, "2024-02-06T14:00");
        seed_scheduled_post(&conn, client_id, "2024-02-13T10:00");

        let today = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();
        let overview = clients_overview(&conn, today).unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].this_week_coverage, 1);
        assert_eq!(overview[0].this_week_total, 2);
        assert_eq!(overview[0].next_week_coverage, 1);
        assert_eq!(overview[0].pipeline.get("scheduled"), Some(&3));
    }

    #[test]
    fn deleting_a_client_cascades_to_posts_and_rules() {
        let mut conn = test_conn();
        let client_id = create_client(&conn, "Acme", "", "", "", "", &Default::default()).unwrap();
        seed_scheduled_post(&conn, client_id, "2024-02-06T10:00");
        conn.execute(
            "INSERT INTO posting_rules (client_id, platform, posting_days, posting_hours)
             VALUES (?1, 'instagram', '[\"mon\"]', '[\"10:00\"]')",
            [client_id],
        )
        .unwrap();

        delete_client(&mut conn, client_id).unwrap();
        let posts: u32 = conn
            .query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))
            .unwrap();
        let rules: u32 = conn
            .query_row("SELECT COUNT(*) FROM posting_rules", [], |r| r.get(0))
            .unwrap();
        assert_eq!((posts, rules), (0, 0));
    }
}
