use rusqlite::{params, Connection, Error as RusqliteError, OptionalExtension, Row};

use crate::models::PostingRule;

const RULE_SELECT: &str = "SELECT id, client_id, platform, content_type, posting_days, \
                           posting_hours, posts_per_day, is_active, notes FROM posting_rules";

/// Day and hour lists live as JSON arrays in their columns; a rule that
/// fails to parse gets empty lists rather than poisoning the whole listing.
fn rule_from_row(row: &Row) -> Result<PostingRule, RusqliteError> {
    let days_json: String = row.get(4)?;
    let hours_json: String = row.get(5)?;
    Ok(PostingRule {
        id: row.get(0)?,
        client_id: row.get(1)?,
        platform: row.get(2)?,
        content_type: row.get(3)?,
        posting_days: serde_json::from_str(&days_json).unwrap_or_default(),
        posting_hours: serde_json::from_str(&hours_json).unwrap_or_default(),
        posts_per_day: row.get(6)?,
        is_active: row.get(7)?,
        notes: row.get(8)?,
    })
}

pub fn create_rule(
    conn: &Connection,
    client_id: i64,
    platform: &str,
    content_type: &str,
    posting_days: &[String],
    posting_hours: &[String],
    posts_per_day: u32,
    notes: &str,
) -> Result<i64, RusqliteError> {
    let days_json = serde_json::to_string(posting_days).unwrap_or_else(|_| "[]".to_string());
    let hours_json = serde_json::to_string(posting_hours).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO posting_rules
            (client_id, platform, content_type, posting_days, posting_hours, posts_per_day, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![client_id, platform, content_type, days_json, hours_json, posts_per_day, notes],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_rule(conn: &Connection, rule_id: i64) -> Result<Option<PostingRule>, RusqliteError> {
    conn.query_row(
        &format!("{RULE_SELECT} WHERE id = ?1"),
        [rule_id],
        rule_from_row,
    )
    .optional()
}

pub fn read_rules_for_client(
    conn: &Connection,
    client_id: i64,
    active_only: bool,
) -> Result<Vec<PostingRule>, RusqliteError> {
    let sql = if active_only {
        format!("{RULE_SELECT} WHERE client_id = ?1 AND is_active = 1 ORDER BY platform, id")
    } else {
        format!("{RULE_SELECT} WHERE client_id = ?1 ORDER BY platform, id")
    };
    let mut stmt = conn.prepare(&sql)?;
    let iter = stmt.query_map([client_id], rule_from_row)?;

    let mut rules = Vec::new();
    for rule in iter {
        rules.push(rule?);
    }
    Ok(rules)
}

pub fn update_rule(
    conn: &Connection,
    rule_id: i64,
    posting_days: Option<&[String]>,
    posting_hours: Option<&[String]>,
    posts_per_day: Option<u32>,
    is_active: Option<bool>,
    notes: Option<&str>,
) -> Result<usize, RusqliteError> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(days) = posting_days {
        sets.push("posting_days = ?");
        values.push(Box::new(
            serde_json::to_string(days).unwrap_or_else(|_| "[]".to_string()),
        ));
    }
    if let Some(hours) = posting_hours {
        sets.push("posting_hours = ?");
        values.push(Box::new(
            serde_json::to_string(hours).unwrap_or_else(|_| "[]".to_string()),
        ));
    }
    if let Some(per_day) = posts_per_day {
        sets.push("posts_per_day = ?");
        values.push(Box::new(per_day));
    }
    if let Some(active) = is_active {
        sets.push("is_active = ?");
        values.push(Box::new(active));
    }
    if let Some(notes) = notes {
        sets.push("notes = ?");
        values.push(Box::new(notes.to_string()));
    }

    if sets.is_empty() {
        return Ok(0);
    }

    values.push(Box::new(rule_id));
    let sql = format!(
        "UPDATE posting_rules SET {} WHERE id = ?",
        sets.join(", ")
    );
    conn.execute(&sql, rusqlite::params_from_iter(values.iter()))
}

pub fn delete_rule(conn: &Connection, rule_id: i64) -> Result<usize, RusqliteError> {
    conn.execute("DELETE FROM posting_rules WHERE id = ?1", [rule_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::clients_db_operations;
    use crate::setup::db_setup;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        db_setup::setup_agency_db(&mut conn).unwrap();
        conn
    }

    fn seed_client(conn: &Connection) -> i64 {
        clients_db_operations::create_client(
            conn,
            "Acme",
            "",
            "",
            "",
            "",
            &Default::default(),
        )
        .unwrap()
    }

    #[test]
    fn day_and_hour_lists_round_trip_as_json() {
        let conn = test_conn();
        let client_id = seed_client(&conn);
        let days = vec!["mon".to_string(), "fri_2".to_string()];
        let hours = vec!["10:00".to_string(), "14:00".to_string()];

        let id = create_rule(&conn, client_id, "instagram", "post", &days, &hours, 2, "").unwrap();
        let rule = read_rule(&conn, id).unwrap().unwrap();
        assert_eq!(rule.posting_days, days);
        assert_eq!(rule.posting_hours, hours);
        assert_eq!(rule.posts_per_day, 2);
        assert!(rule.is_active);
    }

    #[test]
    fn deactivated_rules_drop_out_of_the_active_listing() {
        let conn = test_conn();
        let client_id = seed_client(&conn);
        let days = vec!["mon".to_string()];
        let hours = vec!["10:00".to_string()];
        let id = create_rule(&conn, client_id, "instagram", "post", &days, &hours, 1, "").unwrap();

        update_rule(&conn, id, None, None, None, Some(false), None).unwrap();
        assert!(read_rules_for_client(&conn, client_id, true).unwrap().is_empty());
        assert_eq!(read_rules_for_client(&conn, client_id, false).unwrap().len(), 1);
    }
}
