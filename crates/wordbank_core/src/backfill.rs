use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::{ApiSettings, StorePaths};
use crate::model::{WordDatabase, create_backup};
use crate::progress::Progress;

/// Persist database, checkpoint, and statistics every this many words.
pub const SAVE_INTERVAL: usize = 100;
/// Candidate cap for `--test-mode` runs.
pub const TEST_MODE_LIMIT: usize = 50;

/// One placeholder entry awaiting enrichment, addressed by its length group
/// and in-group index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub word: String,
    pub length_key: String,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BackfillOptions {
    pub resume: bool,
    pub test_mode: bool,
}

#[derive(Debug, Clone)]
pub struct BackfillReport {
    pub processed: usize,
    pub updated: usize,
    pub api_failures: usize,
    pub network_errors: usize,
    pub cancelled: bool,
    pub backup_path: Option<PathBuf>,
}

/// Outcome of one dictionary lookup. Only `Found` mutates the database;
/// every variant still marks the word as processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Found { definition: String, pos: String },
    NotFound,
    ApiFailure(u16),
    NetworkError(String),
}

/// Collect every entry still carrying the placeholder definition.
pub fn placeholder_candidates(database: &WordDatabase) -> Vec<Candidate> {
    database
        .iter_entries()
        .filter(|(_, _, entry)| entry.is_placeholder())
        .map(|(key, index, entry)| Candidate {
            word: entry.word.clone(),
            length_key: key.clone(),
            index,
        })
        .collect()
}

/// Apply resume filtering and the test-mode cap to the candidate scan.
pub fn plan_candidates(
    database: &WordDatabase,
    progress: Option<&Progress>,
    test_mode: bool,
) -> Vec<Candidate> {
    let mut candidates = placeholder_candidates(database);
    info!(
        "found {} words with placeholder definitions",
        candidates.len()
    );

    if let Some(progress) = progress
        && !progress.processed_words.is_empty()
    {
        let before = candidates.len();
        candidates.retain(|candidate| !progress.contains(&candidate.word));
        info!("resuming: {} words already processed", before - candidates.len());
    }

    if test_mode && candidates.len() > TEST_MODE_LIMIT {
        candidates.truncate(TEST_MODE_LIMIT);
        info!("test mode: limiting to {} words", candidates.len());
    }
    candidates
}

/// Extract `(definition, pos)` from a Free Dictionary API payload: first
/// element, first meaning, first definition. Any missing nesting means "no
/// definition found", not an error.
pub fn parse_definition_payload(payload: &Value) -> Option<(String, String)> {
    let meaning = payload
        .as_array()?
        .first()?
        .get("meanings")?
        .as_array()?
        .first()?;
    let pos = meaning
        .get("partOfSpeech")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let definition = meaning
        .get("definitions")?
        .as_array()?
        .first()?
        .get("definition")?
        .as_str()?;
    if definition.is_empty() {
        return None;
    }
    Some((definition.to_string(), pos.to_string()))
}

/// Overwrite a candidate's definition and part-of-speech in place. Returns
/// false when the entry no longer matches the scanned position, which is
/// logged and skipped rather than aborting the run.
pub fn apply_definition(
    database: &mut WordDatabase,
    candidate: &Candidate,
    definition: &str,
    pos: &str,
) -> bool {
    match database
        .groups
        .get_mut(&candidate.length_key)
        .and_then(|group| group.get_mut(candidate.index))
    {
        Some(entry) if entry.word == candidate.word => {
            entry.definition = definition.to_string();
            entry.pos = pos.to_string();
            true
        }
        _ => {
            error!(
                "entry for '{}' moved under key {} index {}; skipping update",
                candidate.word, candidate.length_key, candidate.index
            );
            false
        }
    }
}

/// Blocking dictionary API client with fixed-rate pacing between requests.
pub struct DictionaryClient {
    client: Client,
    api_url: String,
    user_agent: String,
    rate_limit: Duration,
    last_request_at: Option<Instant>,
}

impl DictionaryClient {
    pub fn new(api: &ApiSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(api.timeout)
            .build()
            .context("failed to build dictionary HTTP client")?;
        Ok(Self {
            client,
            api_url: api.url.trim_end_matches('/').to_string(),
            user_agent: api.user_agent.clone(),
            rate_limit: api.rate_limit,
            last_request_at: None,
        })
    }

    /// Look up one word, classifying the response. Never returns an error:
    /// per-word failures are outcomes, not aborts.
    pub fn fetch_definition(&mut self, word: &str) -> FetchOutcome {
        self.pace();
        let url = format!("{}/{}", self.api_url, word.to_lowercase());
        let response = self
            .client
            .get(&url)
            .header("User-Agent", self.user_agent.clone())
            .send();
        self.last_request_at = Some(Instant::now());

        match response {
            Ok(response) => {
                let status = response.status();
                if status == StatusCode::NOT_FOUND {
                    debug!("word not found in dictionary: {word}");
                    return FetchOutcome::NotFound;
                }
                if !status.is_success() {
                    warn!("API returned {} for word: {word}", status.as_u16());
                    return FetchOutcome::ApiFailure(status.as_u16());
                }
                match response.json::<Value>() {
                    Ok(payload) => match parse_definition_payload(&payload) {
                        Some((definition, pos)) => FetchOutcome::Found { definition, pos },
                        None => {
                            debug!("no usable definition in payload for: {word}");
                            FetchOutcome::NotFound
                        }
                    },
                    Err(error) => {
                        warn!("malformed API payload for '{word}': {error}");
                        FetchOutcome::NotFound
                    }
                }
            }
            Err(error) => {
                warn!("network error for word '{word}': {error}");
                FetchOutcome::NetworkError(error.to_string())
            }
        }
    }

    /// Hold until at least the configured delay has passed since the last
    /// request.
    fn pace(&self) {
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < self.rate_limit {
                sleep(self.rate_limit - elapsed);
            }
        }
    }
}

/// Per-run statistics; lives for one run and is never persisted.
#[derive(Debug)]
pub struct RunStats {
    pub processed: usize,
    pub updated: usize,
    pub api_failures: usize,
    pub network_errors: usize,
    started_at: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            processed: 0,
            updated: 0,
            api_failures: 0,
            network_errors: 0,
            started_at: Instant::now(),
        }
    }

    pub fn record(&mut self, outcome: &FetchOutcome) {
        self.processed += 1;
        match outcome {
            FetchOutcome::Found { .. } => self.updated += 1,
            FetchOutcome::NotFound => {}
            FetchOutcome::ApiFailure(_) => self.api_failures += 1,
            FetchOutcome::NetworkError(_) => self.network_errors += 1,
        }
    }

    pub fn report(&self) -> String {
        let elapsed = self.started_at.elapsed();
        format!(
            "statistics: elapsed {} | processed {} | updated {} | api failures {} | network errors {} | success rate {:.1}% | rate {:.0} words/hour",
            format_elapsed(elapsed.as_secs()),
            self.processed,
            self.updated,
            self.api_failures,
            self.network_errors,
            success_rate(self.updated, self.processed),
            words_per_hour(self.processed, elapsed),
        )
    }
}

pub fn success_rate(updated: usize, processed: usize) -> f64 {
    if processed == 0 {
        return 0.0;
    }
    updated as f64 / processed as f64 * 100.0
}

pub fn words_per_hour(processed: usize, elapsed: Duration) -> f64 {
    let hours = elapsed.as_secs_f64() / 3600.0;
    if hours <= 0.0 {
        return 0.0;
    }
    processed as f64 / hours
}

pub fn format_elapsed(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

fn save_checkpoint_best_effort(progress: &Progress, path: &Path) {
    if let Err(error) = progress.save(path) {
        error!("failed to save checkpoint: {error:#}");
    }
}

/// Run one backfill pass over the database file.
///
/// Fatal: backup copy failure, database load failure, database save failure.
/// Recoverable per word: every lookup outcome. Best-effort: checkpoint
/// saves. Cancellation stops after the current word and still runs the
/// final save.
pub fn run_backfill(
    paths: &StorePaths,
    api: &ApiSettings,
    options: &BackfillOptions,
    cancel: &AtomicBool,
) -> Result<BackfillReport> {
    info!(
        "starting definition backfill ({})",
        if options.resume { "resume" } else { "full run" }
    );
    info!(
        "test mode: {}",
        if options.test_mode { "on" } else { "off" }
    );

    let backup_path = if options.resume {
        None
    } else {
        let backup_path = create_backup(&paths.data_file, &paths.backup_dir)?;
        info!("backup created: {}", backup_path.display());
        Some(backup_path)
    };

    let mut database = WordDatabase::load(&paths.data_file)?;
    info!("loaded database from {}", paths.data_file.display());

    let progress_seed = if options.resume {
        Progress::load_or_default(&paths.progress_file)
    } else {
        Progress::default()
    };
    let candidates = plan_candidates(
        &database,
        options.resume.then_some(&progress_seed),
        options.test_mode,
    );
    let mut progress = progress_seed;
    let total = candidates.len();
    info!("words to process: {total}");

    let mut client = DictionaryClient::new(api)?;
    let mut stats = RunStats::new();
    let mut since_save = 0usize;
    let mut cancelled = false;

    for (position, candidate) in candidates.iter().enumerate() {
        if cancel.load(Ordering::SeqCst) {
            info!("cancellation requested; saving progress");
            cancelled = true;
            break;
        }
        info!("[{}/{total}] processing: {}", position + 1, candidate.word);

        let outcome = client.fetch_definition(&candidate.word);
        match &outcome {
            FetchOutcome::Found { definition, pos } => {
                if apply_definition(&mut database, candidate, definition, pos) {
                    info!(
                        "updated {}: {pos} - {}",
                        candidate.word,
                        truncate_chars(definition, 100)
                    );
                }
            }
            _ => info!("no definition found for: {}", candidate.word),
        }

        stats.record(&outcome);
        progress.mark(&candidate.word);
        since_save += 1;

        if since_save >= SAVE_INTERVAL {
            database.save(&paths.data_file)?;
            save_checkpoint_best_effort(&progress, &paths.progress_file);
            info!("{}", stats.report());
            since_save = 0;
        }
    }

    info!("saving final data");
    database.save(&paths.data_file)?;
    save_checkpoint_best_effort(&progress, &paths.progress_file);
    info!("{}", stats.report());
    info!("definition backfill {}", if cancelled { "interrupted" } else { "complete" });

    Ok(BackfillReport {
        processed: stats.processed,
        updated: stats.updated,
        api_failures: stats.api_failures,
        network_errors: stats.network_errors,
        cancelled,
        backup_path,
    })
}

fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut output: String = text.chars().take(limit).collect();
    output.push_str("...");
    output
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    use serde_json::json;
    use tempfile::tempdir;

    use crate::config::{ApiSettings, StorePaths};
    use crate::model::{PLACEHOLDER_DEFINITION, WordDatabase, WordEntry};
    use crate::progress::Progress;

    use super::{
        BackfillOptions, Candidate, FetchOutcome, RunStats, TEST_MODE_LIMIT, apply_definition,
        format_elapsed, parse_definition_payload, placeholder_candidates, plan_candidates,
        run_backfill, success_rate, truncate_chars, words_per_hour,
    };

    fn test_paths(root: &std::path::Path) -> StorePaths {
        StorePaths {
            data_file: root.join("words_data.json"),
            backup_dir: root.join("backups"),
            progress_file: root.join("fetch_progress.json"),
            log_file: root.join("wordbank.log"),
        }
    }

    fn test_api() -> ApiSettings {
        ApiSettings {
            url: "http://127.0.0.1:9/entries/en".to_string(),
            user_agent: "wordbank-tests".to_string(),
            timeout: Duration::from_millis(100),
            rate_limit: Duration::ZERO,
        }
    }

    fn database_with_placeholders(words: &[&str]) -> WordDatabase {
        let mut database = WordDatabase::default();
        for word in words {
            database.push(WordEntry::placeholder(*word));
        }
        database
    }

    #[test]
    fn scan_selects_exactly_placeholder_entries() {
        let mut database = database_with_placeholders(&["cat", "dog"]);
        database.push(WordEntry {
            word: "tree".to_string(),
            pos: "noun".to_string(),
            definition: "A perennial woody plant.".to_string(),
        });

        let candidates = placeholder_candidates(&database);
        assert_eq!(candidates.len(), 2);
        assert_eq!(
            candidates[0],
            Candidate {
                word: "cat".to_string(),
                length_key: "3".to_string(),
                index: 0,
            }
        );
        assert_eq!(candidates[1].word, "dog");
        assert_eq!(candidates[1].index, 1);
    }

    #[test]
    fn resume_filtering_drops_only_processed_words() {
        let database = database_with_placeholders(&["cat", "dog", "ant"]);
        let mut progress = Progress::default();
        progress.mark("dog");

        let candidates = plan_candidates(&database, Some(&progress), false);
        let words: Vec<&str> = candidates
            .iter()
            .map(|candidate| candidate.word.as_str())
            .collect();
        assert_eq!(words, vec!["cat", "ant"]);
    }

    #[test]
    fn test_mode_caps_the_candidate_list() {
        let words: Vec<String> = (0..80).map(|index| format!("wd{index:03}")).collect();
        let refs: Vec<&str> = words.iter().map(String::as_str).collect();
        let database = database_with_placeholders(&refs);

        let candidates = plan_candidates(&database, None, true);
        assert_eq!(candidates.len(), TEST_MODE_LIMIT);
    }

    #[test]
    fn payload_parsing_follows_first_sense() {
        let payload = json!([{
            "word": "cat",
            "meanings": [
                {
                    "partOfSpeech": "noun",
                    "definitions": [
                        {"definition": "A small domesticated carnivorous mammal."},
                        {"definition": "A spiteful woman."}
                    ]
                },
                {"partOfSpeech": "verb", "definitions": [{"definition": "To vomit."}]}
            ]
        }]);
        let (definition, pos) = parse_definition_payload(&payload).expect("parsed");
        assert_eq!(definition, "A small domesticated carnivorous mammal.");
        assert_eq!(pos, "noun");
    }

    #[test]
    fn degenerate_payloads_yield_no_definition() {
        assert!(parse_definition_payload(&json!([])).is_none());
        assert!(parse_definition_payload(&json!([{"word": "cat"}])).is_none());
        assert!(parse_definition_payload(&json!([{"meanings": []}])).is_none());
        assert!(
            parse_definition_payload(&json!([{
                "meanings": [{"partOfSpeech": "noun", "definitions": []}]
            }]))
            .is_none()
        );
        assert!(
            parse_definition_payload(&json!([{
                "meanings": [{"partOfSpeech": "noun", "definitions": [{"definition": ""}]}]
            }]))
            .is_none()
        );
        assert!(parse_definition_payload(&json!({"word": "cat"})).is_none());
    }

    #[test]
    fn missing_part_of_speech_defaults_to_unknown() {
        let payload = json!([{
            "meanings": [{"definitions": [{"definition": "Something."}]}]
        }]);
        let (_, pos) = parse_definition_payload(&payload).expect("parsed");
        assert_eq!(pos, "unknown");
    }

    #[test]
    fn successful_lookup_updates_the_entry_in_place() {
        let mut database = database_with_placeholders(&["cat"]);
        let candidate = placeholder_candidates(&database).remove(0);

        let applied = apply_definition(
            &mut database,
            &candidate,
            "A small domesticated carnivorous mammal.",
            "noun",
        );
        assert!(applied);

        let entry = &database.groups["3"][0];
        assert_eq!(entry.word, "cat");
        assert_eq!(entry.pos, "noun");
        assert_eq!(entry.definition, "A small domesticated carnivorous mammal.");
        assert!(placeholder_candidates(&database).is_empty());
    }

    #[test]
    fn stale_candidate_positions_are_skipped() {
        let mut database = database_with_placeholders(&["cat"]);
        let candidate = Candidate {
            word: "dog".to_string(),
            length_key: "3".to_string(),
            index: 0,
        };
        assert!(!apply_definition(&mut database, &candidate, "x", "noun"));
        assert_eq!(database.groups["3"][0].definition, PLACEHOLDER_DEFINITION);
    }

    #[test]
    fn stats_classify_outcomes() {
        let mut stats = RunStats::new();
        stats.record(&FetchOutcome::Found {
            definition: "A small domesticated carnivorous mammal.".to_string(),
            pos: "noun".to_string(),
        });
        stats.record(&FetchOutcome::NotFound);
        stats.record(&FetchOutcome::ApiFailure(500));
        stats.record(&FetchOutcome::NetworkError("timed out".to_string()));

        assert_eq!(stats.processed, 4);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.api_failures, 1);
        assert_eq!(stats.network_errors, 1);
    }

    #[test]
    fn not_found_carries_no_failure_penalty() {
        let mut stats = RunStats::new();
        stats.record(&FetchOutcome::NotFound);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.api_failures, 0);
        assert_eq!(stats.network_errors, 0);
    }

    #[test]
    fn rate_and_elapsed_arithmetic() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(1, 4), 25.0);
        assert_eq!(words_per_hour(0, Duration::ZERO), 0.0);
        assert_eq!(words_per_hour(100, Duration::from_secs(3600)), 100.0);
        assert_eq!(format_elapsed(0), "0:00:00");
        assert_eq!(format_elapsed(3_725), "1:02:05");
    }

    #[test]
    fn resumed_run_with_everything_processed_fetches_nothing() {
        let temp = tempdir().expect("tempdir");
        let paths = test_paths(temp.path());

        let database = database_with_placeholders(&["cat"]);
        database.save(&paths.data_file).expect("save database");
        let mut progress = Progress::default();
        progress.mark("cat");
        progress.save(&paths.progress_file).expect("save checkpoint");
        let before = fs::read_to_string(&paths.data_file).expect("read");

        let cancel = AtomicBool::new(false);
        let report = run_backfill(
            &paths,
            &test_api(),
            &BackfillOptions {
                resume: true,
                test_mode: false,
            },
            &cancel,
        )
        .expect("run");

        assert_eq!(report.processed, 0);
        assert_eq!(report.updated, 0);
        assert!(!report.cancelled);
        assert!(report.backup_path.is_none());
        let after = fs::read_to_string(&paths.data_file).expect("read");
        assert_eq!(before, after);
    }

    #[test]
    fn fresh_run_aborts_when_backup_cannot_be_made() {
        let temp = tempdir().expect("tempdir");
        let paths = test_paths(temp.path());
        // No database file, so the backup copy has no source.
        let cancel = AtomicBool::new(false);
        let result = run_backfill(&paths, &test_api(), &BackfillOptions::default(), &cancel);
        assert!(result.is_err());
        assert!(!paths.data_file.exists());
    }

    #[test]
    fn cancellation_still_runs_the_final_save() {
        let temp = tempdir().expect("tempdir");
        let paths = test_paths(temp.path());
        database_with_placeholders(&["cat"])
            .save(&paths.data_file)
            .expect("save database");

        let cancel = AtomicBool::new(true);
        let report = run_backfill(&paths, &test_api(), &BackfillOptions::default(), &cancel)
            .expect("run");

        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
        let backup_path = report.backup_path.expect("backup");
        assert!(backup_path.exists());
        assert!(paths.progress_file.exists());
        let loaded = WordDatabase::load(&paths.data_file).expect("load");
        assert_eq!(loaded.groups["3"][0].definition, PLACEHOLDER_DEFINITION);
    }

    #[test]
    fn long_definitions_are_truncated_for_logging() {
        let long = "x".repeat(150);
        let truncated = truncate_chars(&long, 100);
        assert_eq!(truncated.chars().count(), 103);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
