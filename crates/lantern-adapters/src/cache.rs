//! Suggestion persistence for Lantern
//!
//! Stores the suggestion list in `.lantern/v1/suggestions.json` under the
//! project root, as a plain JSON array of records.
//!
//! # Error Handling
//!
//! Loading is forgiving: a missing file is an empty list, a corrupt file is
//! moved aside and also reads as an empty list, and individual bad records
//! are dropped later by [`SuggestionState::initialize`]. Saving reports
//! errors, since losing a user's rating or message is not recoverable.

use fs2::FileExt;
use lantern_core::{Suggestion, SuggestionRepository, SuggestionState};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::fsutil::{preserve_corrupt, write_atomic};

const CACHE_DIR: &str = ".lantern";
const CACHE_LAYOUT_DIR: &str = "v1";
const SUGGESTIONS_FILE: &str = "suggestions.json";
const CACHE_LOCK_TIMEOUT_SECS: u64 = 5;
const CACHE_LOCK_RETRY_MS: u64 = 50;

/// The on-disk suggestion store for one project
pub struct Cache {
    cache_root: PathBuf,
    cache_dir: PathBuf,
}

struct CacheLock {
    file: std::fs::File,
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl Cache {
    pub fn new(project_root: &Path) -> Self {
        let cache_root = project_root.join(CACHE_DIR);
        let cache_dir = cache_root.join(CACHE_LAYOUT_DIR);
        Self {
            cache_root,
            cache_dir,
        }
    }

    pub fn suggestions_path(&self) -> PathBuf {
        self.cache_dir.join(SUGGESTIONS_FILE)
    }

    fn ensure_dir(&self) -> anyhow::Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
            self.ensure_ignored()?;
        }
        Ok(())
    }

    /// Keep `.lantern/` out of version control.
    fn ensure_ignored(&self) -> anyhow::Result<()> {
        let Some(repo_root) = self.cache_root.parent() else {
            return Ok(());
        };

        let gitignore_path = repo_root.join(".gitignore");
        if gitignore_path.exists() {
            return append_ignore_entry(&gitignore_path, ".lantern/");
        }

        let git_dir = repo_root.join(".git");
        if git_dir.is_dir() {
            let info_dir = git_dir.join("info");
            if fs::create_dir_all(&info_dir).is_ok()
                && append_ignore_entry(&info_dir.join("exclude"), ".lantern/").is_ok()
            {
                return Ok(());
            }
            return append_ignore_entry(&gitignore_path, ".lantern/");
        }

        // Not a git checkout; nothing to ignore.
        Ok(())
    }

    fn lock(&self, exclusive: bool) -> anyhow::Result<CacheLock> {
        if exclusive {
            self.ensure_dir()?;
        } else if !self.cache_dir.exists() {
            return Err(anyhow::anyhow!("Cache directory missing"));
        }

        let lock_path = self.cache_dir.join(".lock");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let start = Instant::now();
        loop {
            let result = if exclusive {
                FileExt::try_lock_exclusive(&file)
            } else {
                FileExt::try_lock_shared(&file)
            };
            match result {
                Ok(()) => break,
                Err(err) => {
                    if err.kind() != ErrorKind::WouldBlock {
                        return Err(err.into());
                    }
                    if start.elapsed() >= Duration::from_secs(CACHE_LOCK_TIMEOUT_SECS) {
                        return Err(anyhow::anyhow!(
                            "Timed out waiting for cache lock ({}s)",
                            CACHE_LOCK_TIMEOUT_SECS
                        ));
                    }
                    std::thread::sleep(Duration::from_millis(CACHE_LOCK_RETRY_MS));
                }
            }
        }

        Ok(CacheLock { file })
    }

    /// Read the raw persisted candidates without validating them.
    pub fn load_candidates(&self) -> anyhow::Result<Vec<Value>> {
        let path = self.suggestions_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = {
            let _lock = self.lock(false)?;
            fs::read_to_string(&path)?
        };

        match parse_candidates(&content) {
            Ok(items) => {
                debug!(count = items.len(), path = %path.display(), "loaded stored suggestions");
                Ok(items)
            }
            Err(_) => self.recover_unreadable(),
        }
    }

    /// Settle a failed read under the exclusive lock.
    ///
    /// The file is read again first: a writer may have replaced it after the
    /// shared lock was released, and a valid file must never be moved aside.
    fn recover_unreadable(&self) -> anyhow::Result<Vec<Value>> {
        let path = self.suggestions_path();
        let _lock = self.lock(true)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        match parse_candidates(&content) {
            Ok(items) => {
                debug!(count = items.len(), "stored suggestions were rewritten while loading");
                Ok(items)
            }
            Err(reason) => {
                warn!(reason = %reason, path = %path.display(), "stored suggestions are unreadable");
                preserve_corrupt(&path, &content);
                Ok(Vec::new())
            }
        }
    }

    /// Write the full record list, replacing what was stored.
    pub fn save_suggestions(&self, records: &[Suggestion]) -> anyhow::Result<()> {
        let _lock = self.lock(true)?;
        let content = serde_json::to_string_pretty(records)?;
        write_atomic(&self.suggestions_path(), &content)?;
        debug!(count = records.len(), "saved suggestions");
        Ok(())
    }

    /// Delete the stored list. Returns whether anything was removed.
    pub fn clear(&self) -> anyhow::Result<bool> {
        let path = self.suggestions_path();
        if !path.exists() {
            return Ok(false);
        }
        let _lock = self.lock(true)?;
        fs::remove_file(&path)?;
        Ok(true)
    }
}

impl SuggestionRepository for Cache {
    fn load_candidates(&self) -> anyhow::Result<Vec<Value>> {
        Cache::load_candidates(self)
    }

    fn save(&self, records: &[Suggestion]) -> anyhow::Result<()> {
        self.save_suggestions(records)
    }
}

/// Load the project's suggestions straight into a store snapshot.
pub fn load_state(project_root: &Path) -> anyhow::Result<SuggestionState> {
    Cache::new(project_root).load_state()
}

/// The stored file must be a JSON array.
fn parse_candidates(content: &str) -> Result<Vec<Value>, String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(format!("expected a list, found {}", json_kind(&other))),
        Err(err) => Err(err.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn append_ignore_entry(path: &Path, entry: &str) -> anyhow::Result<()> {
    let content = fs::read_to_string(path).unwrap_or_default();
    let already_present = content.lines().any(|line| {
        let trimmed = line.trim();
        trimmed == entry || trimmed == CACHE_DIR
    });
    if already_present {
        return Ok(());
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    use std::io::Write;
    if !content.trim().is_empty() && !content.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "# Lantern suggestion store")?;
    writeln!(file, "{}", entry)?;
    Ok(())
}
