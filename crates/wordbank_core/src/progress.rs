use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Checkpoint of a backfill run: every word visited so far, regardless of
/// fetch outcome. A set in memory, a sorted array on disk so saved files
/// diff cleanly between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub processed_words: BTreeSet<String>,
    #[serde(default)]
    pub processed_count: u64,
}

impl Progress {
    /// Load a checkpoint, tolerating a missing or corrupt file. The backfill
    /// loop must be able to start even when the previous run left nothing
    /// usable behind, so failures degrade to empty progress with a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!("no checkpoint at {}; starting fresh", path.display());
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Self>(&content) {
                Ok(progress) => {
                    info!(
                        "loaded checkpoint: {} words processed",
                        progress.processed_count
                    );
                    progress
                }
                Err(error) => {
                    warn!("could not parse checkpoint {}: {error}", path.display());
                    Self::default()
                }
            },
            Err(error) => {
                warn!("could not read checkpoint {}: {error}", path.display());
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut rendered =
            serde_json::to_string_pretty(self).context("failed to serialize checkpoint")?;
        rendered.push('\n');
        fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Record a word as visited. The counter advances for every call, even
    /// when the word was already in the set.
    pub fn mark(&mut self, word: &str) {
        self.processed_words.insert(word.to_string());
        self.processed_count += 1;
    }

    pub fn contains(&self, word: &str) -> bool {
        self.processed_words.contains(word)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::Progress;

    #[test]
    fn mark_tracks_words_and_count() {
        let mut progress = Progress::default();
        progress.mark("cat");
        progress.mark("dog");
        progress.mark("cat");
        assert!(progress.contains("cat"));
        assert!(!progress.contains("bird"));
        assert_eq!(progress.processed_words.len(), 2);
        assert_eq!(progress.processed_count, 3);
    }

    #[test]
    fn missing_checkpoint_yields_empty_progress() {
        let temp = tempdir().expect("tempdir");
        let progress = Progress::load_or_default(&temp.path().join("missing.json"));
        assert_eq!(progress, Progress::default());
    }

    #[test]
    fn corrupt_checkpoint_yields_empty_progress() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("fetch_progress.json");
        fs::write(&path, "{ truncated").expect("write");
        let progress = Progress::load_or_default(&path);
        assert_eq!(progress, Progress::default());
    }

    #[test]
    fn save_serializes_words_in_sorted_order() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("fetch_progress.json");
        let mut progress = Progress::default();
        progress.mark("zebra");
        progress.mark("apple");
        progress.save(&path).expect("save");

        let rendered = fs::read_to_string(&path).expect("read");
        let apple = rendered.find("apple").expect("apple present");
        let zebra = rendered.find("zebra").expect("zebra present");
        assert!(apple < zebra);

        let loaded = Progress::load_or_default(&path);
        assert_eq!(loaded, progress);
    }
}
