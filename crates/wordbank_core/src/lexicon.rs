use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::warn;

/// One lexical sense: part-of-speech tag plus a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sense {
    pub pos: String,
    pub definition: String,
}

/// Local lexical resource backing the importer: a tab-separated file with
/// `word<TAB>pos<TAB>definition` lines. The file lists senses in source
/// order, and only the first sense per word is kept.
#[derive(Debug, Default)]
pub struct Lexicon {
    senses: HashMap<String, Sense>,
}

impl Lexicon {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut senses = HashMap::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.splitn(3, '\t');
            let (Some(word), Some(pos), Some(definition)) =
                (fields.next(), fields.next(), fields.next())
            else {
                warn!(
                    "skipping malformed lexicon line {} in {}",
                    number + 1,
                    path.display()
                );
                continue;
            };
            senses
                .entry(word.trim().to_lowercase())
                .or_insert_with(|| Sense {
                    pos: pos.trim().to_string(),
                    definition: definition.trim().to_string(),
                });
        }
        Ok(Self { senses })
    }

    /// First-sense lookup, case-insensitive.
    pub fn lookup(&self, word: &str) -> Option<&Sense> {
        self.senses.get(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.senses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senses.is_empty()
    }
}
