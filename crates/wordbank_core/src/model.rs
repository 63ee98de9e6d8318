use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use serde::{Deserialize, Serialize};

/// Sentinel definition marking an entry as not yet enriched. External
/// consumers match on this exact text, so it must never change.
pub const PLACEHOLDER_DEFINITION: &str = "A valid English word - definition not available";

pub const UNKNOWN_POS: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordEntry {
    pub word: String,
    pub pos: String,
    pub definition: String,
}

impl WordEntry {
    pub fn placeholder(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            pos: UNKNOWN_POS.to_string(),
            definition: PLACEHOLDER_DEFINITION.to_string(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.definition == PLACEHOLDER_DEFINITION
    }
}

/// Length-keyed word database: decimal-string keys map to ordered entry
/// lists. Duplicates are intentionally kept when sources overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordDatabase {
    pub groups: BTreeMap<String, Vec<WordEntry>>,
}

impl WordDatabase {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let database: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(database)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut rendered =
            serde_json::to_string_pretty(self).context("failed to serialize word database")?;
        rendered.push('\n');
        fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Append an entry to the group matching its word length.
    pub fn push(&mut self, entry: WordEntry) {
        let key = entry.word.chars().count().to_string();
        self.groups.entry(key).or_default().push(entry);
    }

    /// Sort every length group alphabetically by word.
    pub fn sort_groups(&mut self) {
        for group in self.groups.values_mut() {
            group.sort_by(|left, right| left.word.cmp(&right.word));
        }
    }

    pub fn entry_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Iterate every entry alongside its length key and in-group index.
    pub fn iter_entries(&self) -> impl Iterator<Item = (&String, usize, &WordEntry)> {
        self.groups.iter().flat_map(|(key, group)| {
            group
                .iter()
                .enumerate()
                .map(move |(index, entry)| (key, index, entry))
        })
    }

    /// Check the structural invariant: every entry's word length equals its
    /// containing key.
    pub fn verify(&self) -> Result<()> {
        for (key, group) in &self.groups {
            let expected: usize = key
                .parse()
                .with_context(|| format!("non-numeric length key: {key}"))?;
            for entry in group {
                let actual = entry.word.chars().count();
                if actual != expected {
                    bail!(
                        "word '{}' has length {actual} but sits under key {key}",
                        entry.word
                    );
                }
            }
        }
        Ok(())
    }
}

/// Copy the database file into the backup directory under a timestamped
/// name. Called before every non-resumed backfill run; failure is fatal to
/// the caller, a run must never mutate the database without a backup.
pub fn create_backup(data_file: &Path, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)
        .with_context(|| format!("failed to create {}", backup_dir.display()))?;
    let stem = data_file
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("words_data");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup_path = backup_dir.join(format!("{stem}_{stamp}.json"));
    fs::copy(data_file, &backup_path).with_context(|| {
        format!(
            "failed to back up {} to {}",
            data_file.display(),
            backup_path.display()
        )
    })?;
    Ok(backup_path)
}
