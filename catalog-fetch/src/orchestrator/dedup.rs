//! Record deduplication by normalized title.
//!
//! Two records are the same product when their titles agree after
//! lower-casing, dropping all whitespace and keeping only the first
//! [`TITLE_KEY_LEN`] characters. The first occurrence is kept and input
//! order is preserved, so records appended earlier (the primary provider's)
//! win ties.

use std::collections::HashSet;

use crate::types::ProductRecord;

/// Characters of the normalized title that take part in the key.
pub const TITLE_KEY_LEN: usize = 50;

/// Dedup key for `title`.
pub fn title_key(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .take(TITLE_KEY_LEN)
        .collect()
}

/// Drop every record whose [`title_key`] was already seen.
pub fn deduplicate(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(title_key(&record.title)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::sample_record;

    #[test]
    fn key_ignores_case_and_whitespace() {
        assert_eq!(title_key("Acme Pro 15"), "acmepro15");
        assert_eq!(title_key("acme pro   15"), "acmepro15");
        assert_eq!(title_key("\tACME\nPRO 15 "), "acmepro15");
    }

    #[test]
    fn key_is_truncated() {
        let long = "x".repeat(80);
        assert_eq!(title_key(&long).chars().count(), TITLE_KEY_LEN);
    }

    #[test]
    fn titles_differing_only_past_prefix_collide() {
        let base = "a".repeat(TITLE_KEY_LEN);
        assert_eq!(title_key(&format!("{base} v1")), title_key(&format!("{base} v2")));
    }

    #[test]
    fn first_occurrence_wins_and_order_is_kept() {
        let records = vec![
            sample_record("Acme Pro 15", "retail", 4.0, 10),
            sample_record("Other Thing", "retail", 3.0, 5),
            sample_record("acme pro   15", "walmart", 5.0, 999),
        ];
        let deduped = deduplicate(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "Acme Pro 15");
        assert_eq!(deduped[0].source_id, "retail");
        assert_eq!(deduped[1].title, "Other Thing");
    }

    #[test]
    fn empty_input() {
        assert!(deduplicate(Vec::new()).is_empty());
    }
}
