use log::warn;

use crate::model::WordDatabase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthCount {
    pub length: u32,
    pub count: usize,
}

/// Per-length entry counts in ascending numeric key order.
pub fn length_counts(database: &WordDatabase) -> Vec<LengthCount> {
    let mut counts: Vec<LengthCount> = database
        .groups
        .iter()
        .filter_map(|(key, group)| match key.parse::<u32>() {
            Ok(length) => Some(LengthCount {
                length,
                count: group.len(),
            }),
            Err(_) => {
                warn!("ignoring non-numeric length key: {key}");
                None
            }
        })
        .collect();
    counts.sort_by_key(|entry| entry.length);
    counts
}

/// Render the fixed count report: one line per length, then a banner with
/// the aggregate total.
pub fn render_report(database: &WordDatabase) -> String {
    let counts = length_counts(database);
    let total: usize = counts.iter().map(|entry| entry.count).sum();
    let mut lines = Vec::with_capacity(counts.len() + 4);
    for entry in &counts {
        lines.push(format!(
            "Level {} ({}-letter words): {} words",
            entry.length - 1,
            entry.length,
            group_thousands(entry.count)
        ));
    }
    lines.push(String::new());
    lines.push("=".repeat(50));
    lines.push(format!(
        "TOTAL WORDS IN DATABASE: {}",
        group_thousands(total)
    ));
    lines.push("=".repeat(50));
    lines.join("\n")
}

/// Format a count with comma-grouped thousands.
pub fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (position, ch) in digits.chars().enumerate() {
        if position > 0 && (digits.len() - position) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    output
}

#[cfg(test)]
mod tests {
    use crate::model::{WordDatabase, WordEntry};

    use super::{group_thousands, length_counts, render_report};

    fn sample_database() -> WordDatabase {
        let mut database = WordDatabase::default();
        database.push(WordEntry::placeholder("cat"));
        database.push(WordEntry::placeholder("dog"));
        database.push(WordEntry::placeholder("tree"));
        database
    }

    #[test]
    fn counts_follow_numeric_key_order() {
        let mut database = sample_database();
        database.push(WordEntry::placeholder("chrysanthemum"));
        let counts = length_counts(&database);
        let lengths: Vec<u32> = counts.iter().map(|entry| entry.length).collect();
        assert_eq!(lengths, vec![3, 4, 13]);
        assert_eq!(counts[0].count, 2);
    }

    #[test]
    fn report_totals_match_entry_count() {
        let database = sample_database();
        let report = render_report(&database);
        assert!(report.contains("Level 2 (3-letter words): 2 words"));
        assert!(report.contains("Level 3 (4-letter words): 1 words"));
        assert!(report.contains("TOTAL WORDS IN DATABASE: 3"));
        assert!(report.contains(&"=".repeat(50)));
    }

    #[test]
    fn thousands_are_comma_grouped() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_000), "1,000");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }
}
