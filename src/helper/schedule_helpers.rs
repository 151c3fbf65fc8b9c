use chrono::{Datelike, NaiveDate, Weekday};

use crate::models::{Post, PostingRule, Slot};

/// Parsed form of the posting-rule day-code mini-language.
///
/// "fri" hits every Friday of a month, "fri_2" only the second one,
/// "fri_last" only the final one. Keeping this a tagged variant makes the
/// short-month edge case (a month with no 5th Friday) explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayCode {
    Weekly(Weekday),
    NthWeek(Weekday, u32),
    LastWeek(Weekday),
}

fn weekday_from_token(token: &str) -> Option<Weekday> {
    match token {
        "mon" => Some(Weekday::Mon),
        "tue" => Some(Weekday::Tue),
        "wed" => Some(Weekday::Wed),
        "thu" => Some(Weekday::Thu),
        "fri" => Some(Weekday::Fri),
        "sat" => Some(Weekday::Sat),
        "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn parse_day_code(token: &str) -> Option<DayCode> {
    let token = token.trim();
    match token.split_once('_') {
        None => weekday_from_token(token).map(DayCode::Weekly),
        Some((day, "last")) => weekday_from_token(day).map(DayCode::LastWeek),
        Some((day, ordinal)) => {
            let weekday = weekday_from_token(day)?;
            let n: u32 = ordinal.parse().ok()?;
            if n == 0 {
                return None;
            }
            Some(DayCode::NthWeek(weekday, n))
        }
    }
}

fn month_days(year: i32, month: u32) -> impl Iterator<Item = NaiveDate> {
    (1..=31).filter_map(move |day| NaiveDate::from_ymd_opt(year, month, day))
}

/// All dates of (year, month) matched by a day code. A nth-occurrence code
/// past the month's supply of that weekday yields nothing; that is not an
/// error.
pub fn expand_day_code(code: DayCode, year: i32, month: u32) -> Vec<NaiveDate> {
    let weekday = match code {
        DayCode::Weekly(w) | DayCode::NthWeek(w, _) | DayCode::LastWeek(w) => w,
    };
    let occurrences: Vec<NaiveDate> = month_days(year, month)
        .filter(|d| d.weekday() == weekday)
        .collect();

    match code {
        DayCode::Weekly(_) => occurrences,
        DayCode::NthWeek(_, n) => occurrences
            .get(n as usize - 1)
            .map(|d| vec![*d])
            .unwrap_or_default(),
        DayCode::LastWeek(_) => occurrences.last().map(|d| vec![*d]).unwrap_or_default(),
    }
}

/// Expands one rule into its unfilled slots for a month: every matched date,
/// times every configured hour, times posts_per_day. Slots at the same
/// nominal time are intentionally not de-duplicated; each one stands for an
/// independent required post.
pub fn expand_rule(rule: &PostingRule, year: i32, month: u32) -> Vec<Slot> {
    let mut slots = Vec::new();
    for token in &rule.posting_days {
        let Some(code) = parse_day_code(token) else {
            log::warn!(
                "Skipping unparseable day code '{}' on posting rule {}",
                token,
                rule.id
            );
            continue;
        };
        for date in expand_day_code(code, year, month) {
            for time in &rule.posting_hours {
                for _ in 0..rule.posts_per_day.max(1) {
                    slots.push(Slot {
                        date,
                        time: time.clone(),
                        platform: rule.platform.clone(),
                        content_type: rule.content_type.clone(),
                        client_id: rule.client_id,
                        filled: false,
                    });
                }
            }
        }
    }
    slots
}

/// Marks each slot filled when at least one post of the same client targets
/// the slot's platform, has the slot's content type, and lands on the slot's
/// date. Matching is deliberately many-to-one: a single post can satisfy
/// several slots of the same platform/type/date.
pub fn fill_slots(slots: &mut [Slot], posts: &[Post]) {
    for slot in slots.iter_mut() {
        slot.filled = posts.iter().any(|post| {
            post.client_id == slot.client_id
                && post.post_type == slot.content_type
                && post.platforms.iter().any(|p| p == &slot.platform)
                && post.effective_date() == Some(slot.date)
        });
    }
}

/// Full monthly obligation set for one client: expand every active rule,
/// reconcile against the month's posts, sort by date/time/platform.
pub fn expand_posting_slots(
    rules: &[PostingRule],
    posts: &[Post],
    year: i32,
    month: u32,
) -> Vec<Slot> {
    let mut slots: Vec<Slot> = rules
        .iter()
        .filter(|r| r.is_active)
        .flat_map(|r| expand_rule(r, year, month))
        .collect();
    fill_slots(&mut slots, posts);
    slots.sort_by(|a, b| {
        (a.date, &a.time, &a.platform).cmp(&(b.date, &b.time, &b.platform))
    });
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_post;

    fn rule(days: &[&str], hours: &[&str], per_day: u32) -> PostingRule {
        PostingRule {
            id: 1,
            client_id: 1,
            platform: "instagram".to_string(),
            content_type: "post".to_string(),
            posting_days: days.iter().map(|s| s.to_string()).collect(),
            posting_hours: hours.iter().map(|s| s.to_string()).collect(),
            posts_per_day: per_day,
            is_active: true,
            notes: String::new(),
        }
    }

    #[test]
    fn parses_the_three_code_shapes() {
        assert_eq!(parse_day_code("fri"), Some(DayCode::Weekly(Weekday::Fri)));
        assert_eq!(
            parse_day_code("fri_2"),
            Some(DayCode::NthWeek(Weekday::Fri, 2))
        );
        assert_eq!(
            parse_day_code("fri_last"),
            Some(DayCode::LastWeek(Weekday::Fri))
        );
        assert_eq!(parse_day_code("friday"), None);
        assert_eq!(parse_day_code("fri_0"), None);
        assert_eq!(parse_day_code("fri_x"), None);
    }

    #[test]
    fn second_friday_of_february_2024() {
        // February 2024 has Fridays on the 2nd, 9th, 16th and 23rd.
        let dates = expand_day_code(DayCode::NthWeek(Weekday::Fri, 2), 2024, 2);
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2024, 2, 9).unwrap()]);
    }

    #[test]
    fn fifth_friday_of_a_four_friday_month_is_empty() {
        assert!(expand_day_code(DayCode::NthWeek(Weekday::Fri, 5), 2024, 2).is_empty());
    }

    #[test]
    fn last_friday_of_february_2024() {
        let dates = expand_day_code(DayCode::LastWeek(Weekday::Fri), 2024, 2);
        assert_eq!(dates, vec![NaiveDate::from_ymd_opt(2024, 2, 23).unwrap()]);
    }

    #[test]
    fn nth_slot_rule_yields_one_slot_per_hour_on_that_date_only() {
        let rule = rule(&["fri_2"], &["10:00", "14:00"], 1);
        let slots = expand_rule(&rule, 2024, 2);
        assert_eq!(slots.len(), 2);
        let expected = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert!(slots.iter().all(|s| s.date == expected));
    }

    #[test]
    fn plain_weekday_with_two_hours_gives_two_slots_per_occurrence() {
        // February 2024 has Mondays on the 5th, 12th, 19th and 26th.
        let rule = rule(&["mon"], &["10:00", "14:00"], 1);
        let slots = expand_rule(&rule, 2024, 2);
        assert_eq!(slots.len(), 8);
        let mondays: Vec<NaiveDate> = slots.iter().map(|s| s.date).collect();
        assert!(mondays.contains(&NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()));
    }

    #[test]
    fn posts_per_day_multiplies_slots_without_deduplication() {
        let rule = rule(&["fri_2"], &["10:00"], 3);
        let slots = expand_rule(&rule, 2024, 2);
        assert_eq!(slots.len(), 3);
        assert!(slots.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn a_multi_platform_post_fills_a_matching_slot() {
        let mut post = sample_post();
        post.platforms = vec!["instagram".to_string(), "facebook".to_string()];
        post.post_type = "post".to_string();
        post.scheduled_at = Some("2024-02-09T10:00".to_string());

        let rule = rule(&["fri_2"], &["10:00"], 1);
        let slots = expand_posting_slots(&[rule], &[post], 2024, 2);
        assert_eq!(slots.len(), 1);
        assert!(slots[0].filled);
    }

    #[test]
    fn wrong_platform_or_type_leaves_the_slot_unfilled() {
        let mut post = sample_post();
        post.platforms = vec!["linkedin".to_string()];
        post.scheduled_at = Some("2024-02-09T10:00".to_string());

        let rule = rule(&["fri_2"], &["10:00"], 1);
        let slots = expand_posting_slots(&[rule.clone()], &[post.clone()], 2024, 2);
        assert!(!slots[0].filled);

        post.platforms = vec!["instagram".to_string()];
        post.post_type = "reel".to_string();
        let slots = expand_posting_slots(&[rule], &[post], 2024, 2);
        assert!(!slots[0].filled);
    }

    #[test]
    fn one_post_may_satisfy_several_same_day_slots() {
        let mut post = sample_post();
        post.scheduled_at = Some("2024-02-09T10:00".to_string());

        let rule = rule(&["fri_2"], &["10:00"], 2);
        let slots = expand_posting_slots(&[rule], &[post], 2024, 2);
        assert_eq!(slots.len(), 2);
        assert!(slots.iter().all(|s| s.filled));
    }

    #[test]
    fn inactive_rules_are_ignored() {
        let mut inactive = rule(&["mon"], &["10:00"], 1);
        inactive.is_active = false;
        assert!(expand_posting_slots(&[inactive], &[], 2024, 2).is_empty());
    }

    #[test]
    fn unparseable_tokens_are_skipped_not_fatal() {
        let rule = rule(&["mon", "someday"], &["10:00"], 1);
        let slots = expand_rule(&rule, 2024, 2);
        assert_eq!(slots.len(), 4);
    }
}
