pub mod clients_db_operations;
pub mod notifications_db_operations;
pub mod posts_db_operations;
pub mod rules_db_operations;
pub mod tasks_db_operations;
pub mod users_db_operations;

/// Comma-joined multi-value columns (platforms, asset URL lists) cross the
/// storage boundary here and nowhere else; the domain structs only ever see
/// ordered `Vec<String>`s.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_blanks_and_trims() {
        assert_eq!(
            split_list(" instagram, facebook ,,linkedin"),
            vec!["instagram", "facebook", "linkedin"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn join_is_the_inverse_on_clean_input() {
        let list = vec!["a.png".to_string(), "b.png".to_string()];
        assert_eq!(split_list(&join_list(&list)), list);
    }
}
