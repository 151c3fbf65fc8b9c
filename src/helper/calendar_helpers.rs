use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::Post;

/// Per-month calendar payload: the raw post list plus a date-keyed index.
/// BTreeMap keeps the date keys ordered so identical inputs serialize
/// identically.
#[derive(Debug, Serialize)]
pub struct CalendarView {
    pub year: i32,
    pub month: u32,
    pub posts: Vec<Post>,
    pub by_date: BTreeMap<String, Vec<Post>>,
}

/// Half-open [start, end) date window of a month, as the YYYY-MM-DD strings
/// the storage layer compares against. Returns None for an invalid month.
pub fn month_window(year: i32, month: u32) -> Option<(String, String)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((
        start.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    ))
}

/// Groups posts under their effective date. Posts whose effective date falls
/// outside the month (or cannot be parsed) stay in the flat list but get no
/// index entry. Pure compute: no storage access, no caching.
pub fn build_calendar_view(posts: Vec<Post>, year: i32, month: u32) -> CalendarView {
    let mut by_date: BTreeMap<String, Vec<Post>> = BTreeMap::new();
    for post in &posts {
        if let Some(date) = post.effective_date() {
            if date.year() == year && date.month() == month {
                by_date
                    .entry(date.format("%Y-%m-%d").to_string())
                    .or_default()
                    .push(post.clone());
            }
        }
    }
    CalendarView {
        year,
        month,
        posts,
        by_date,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_post;

    #[test]
    fn month_window_handles_year_rollover() {
        assert_eq!(
            month_window(2024, 12),
            Some(("2024-12-01".to_string(), "2025-01-01".to_string()))
        );
        assert_eq!(
            month_window(2024, 2),
            Some(("2024-02-01".to_string(), "2024-03-01".to_string()))
        );
        assert_eq!(month_window(2024, 13), None);
    }

    #[test]
    fn groups_posts_under_their_effective_date() {
        let mut scheduled = sample_post();
        scheduled.id = 1;
        scheduled.scheduled_at = Some("2024-02-09T10:00".to_string());

        let mut unscheduled = sample_post();
        unscheduled.id = 2;
        unscheduled.scheduled_at = None;
        unscheduled.created_at = "2024-02-12 09:30:00".to_string();

        let view = build_calendar_view(vec![scheduled, unscheduled], 2024, 2);
        assert_eq!(view.posts.len(), 2);
        assert_eq!(view.by_date["2024-02-09"].len(), 1);
        assert_eq!(view.by_date["2024-02-09"][0].id, 1);
        assert_eq!(view.by_date["2024-02-12"][0].id, 2);
    }

    #[test]
    fn out_of_month_posts_are_listed_but_not_indexed() {
        let mut post = sample_post();
        post.scheduled_at = Some("2024-03-01T08:00".to_string());
        let view = build_calendar_view(vec![post], 2024, 2);
        assert_eq!(view.posts.len(), 1);
        assert!(view.by_date.is_empty());
    }

    #[test]
    fn identical_input_builds_identical_output() {
        let mut a = sample_post();
        a.scheduled_at = Some("2024-02-09T10:00".to_string());
        let posts = vec![a];

        let first = build_calendar_view(posts.clone(), 2024, 2);
        let second = build_calendar_view(posts, 2024, 2);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
