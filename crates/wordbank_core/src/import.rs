use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::filter::is_usable;
use crate::lexicon::Lexicon;
use crate::model::{UNKNOWN_POS, WordDatabase, WordEntry};

pub const MIN_WORD_LENGTH: usize = 2;
pub const DEFAULT_MAX_WORD_LENGTH: usize = 9;

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub max_length: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_WORD_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub source_tokens: usize,
    pub unique_tokens: usize,
    pub imported: usize,
    pub skipped: usize,
    pub defined: usize,
}

/// Build a length-keyed database from raw tokens.
///
/// The source is deduplicated into a set before filtering; survivors are
/// lowercased and grouped by character length, and each group is sorted
/// alphabetically. With a lexicon, entries get the first-sense definition
/// and part-of-speech; words the lexicon does not know, or every word when
/// no lexicon is supplied, get the placeholder definition.
pub fn build_database<'a, I>(
    tokens: I,
    lexicon: Option<&Lexicon>,
    options: &ImportOptions,
) -> (WordDatabase, ImportReport)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut report = ImportReport::default();
    let mut unique = BTreeSet::new();
    for token in tokens {
        report.source_tokens += 1;
        let token = token.trim();
        if !token.is_empty() {
            unique.insert(token.to_string());
        }
    }
    report.unique_tokens = unique.len();

    let mut database = WordDatabase::default();
    for token in &unique {
        let length = token.chars().count();
        if !is_usable(token) || length < MIN_WORD_LENGTH || length > options.max_length {
            report.skipped += 1;
            continue;
        }
        let word = token.to_lowercase();
        let entry = match lexicon.and_then(|lexicon| lexicon.lookup(&word)) {
            Some(sense) => {
                report.defined += 1;
                WordEntry {
                    word,
                    pos: if sense.pos.is_empty() {
                        UNKNOWN_POS.to_string()
                    } else {
                        sense.pos.clone()
                    },
                    definition: sense.definition.clone(),
                }
            }
            None => WordEntry::placeholder(word),
        };
        database.push(entry);
        report.imported += 1;
    }
    database.sort_groups();
    (database, report)
}

/// Read a word-list file (one token per line), build the database, and write
/// it to the data file as pretty-printed JSON.
pub fn run_import(
    wordlist: &Path,
    lexicon_path: Option<&Path>,
    options: &ImportOptions,
    data_file: &Path,
) -> Result<(WordDatabase, ImportReport)> {
    let content = fs::read_to_string(wordlist)
        .with_context(|| format!("failed to read {}", wordlist.display()))?;

    let lexicon = match lexicon_path {
        Some(path) => {
            let lexicon = Lexicon::load(path)?;
            info!("loaded lexicon with {} senses from {}", lexicon.len(), path.display());
            Some(lexicon)
        }
        None => None,
    };

    info!("importing word list from {}", wordlist.display());
    let (database, report) = build_database(content.lines(), lexicon.as_ref(), options);
    database.save(data_file)?;
    info!(
        "imported {} of {} unique tokens ({} skipped, {} with definitions) into {}",
        report.imported,
        report.unique_tokens,
        report.skipped,
        report.defined,
        data_file.display()
    );
    Ok((database, report))
}
