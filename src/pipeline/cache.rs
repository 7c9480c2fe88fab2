use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub answer: String,
    pub sql_query: String,
}

/// Question → answer cache persisted as a JSON map.
///
/// Keys are the trimmed, lowercased question text. Every `set` rewrites the
/// whole file. I/O problems never reach the caller: an unreadable file loads
/// as an empty cache and a failed write is logged and dropped. There is no
/// internal locking, so concurrent writers must be serialized by the owner.
#[derive(Debug)]
pub struct QueryCache {
    path: PathBuf,
    enabled: bool,
    entries: HashMap<String, CacheEntry>,
}

impl QueryCache {
    pub fn open(path: impl Into<PathBuf>, enabled: bool) -> Self {
        let path = path.into();
        let entries = if enabled { load(&path) } else { HashMap::new() };

        Self {
            path,
            enabled,
            entries,
        }
    }

    /// A cache that always misses and never touches the disk.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
            entries: HashMap::new(),
        }
    }

    pub fn normalize(question: &str) -> String {
        question.trim().to_lowercase()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, question: &str) -> Option<&CacheEntry> {
        if !self.enabled {
            return None;
        }
        self.entries.get(&Self::normalize(question))
    }

    pub fn set(&mut self, question: &str, entry: CacheEntry) {
        if !self.enabled {
            return;
        }
        self.entries.insert(Self::normalize(question), entry);
        if let Err(e) = self.save() {
            warn!("Failed to persist cache to {}: {}", self.path.display(), e);
        }
    }

    /// Drops every entry and deletes the backing file.
    pub fn clear(&mut self) {
        self.entries.clear();
        if self.path.as_os_str().is_empty() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed cache file {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove cache file {}: {}", self.path.display(), e),
        }
    }

    fn save(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, data)
    }
}

fn load(path: &Path) -> HashMap<String, CacheEntry> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("Failed to read cache file {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    match serde_json::from_str(&data) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(answer: &str) -> CacheEntry {
        CacheEntry {
            answer: answer.to_string(),
            sql_query: "SELECT 1".to_string(),
        }
    }

    #[test]
    fn test_case_and_whitespace_share_a_key() {
        assert_eq!(QueryCache::normalize(" What Is X? "), QueryCache::normalize("what is x?"));

        let dir = TempDir::new().unwrap();
        let mut cache = QueryCache::open(dir.path().join("cache.json"), true);
        cache.set(" What Is X? ", entry("42"));
        assert_eq!(cache.get("what is x?"), Some(&entry("42")));
    }

    #[test]
    fn test_set_writes_through_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = QueryCache::open(&path, true);
        cache.set("How many orders?", entry("830"));
        assert!(path.exists());

        let reopened = QueryCache::open(&path, true);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("how many orders?").map(|e| e.answer.as_str()), Some("830"));
    }

    #[test]
    fn test_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let mut cache = QueryCache::open(dir.path().join("cache.json"), true);
        cache.set("q", entry("first"));
        cache.set("Q", entry("second"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("q").unwrap().answer, "second");
    }

    #[test]
    fn test_file_format_is_a_plain_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = QueryCache::open(&path, true);
        cache.set("Top customer?", entry("ALFKI"));

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["top customer?"]["answer"], "ALFKI");
        assert_eq!(raw["top customer?"]["sql_query"], "SELECT 1");
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let cache = QueryCache::open(&path, true);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path().join("absent.json"), true);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unwritable_path_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes every write fail
        let path = dir.path().join("cache.json");
        fs::create_dir(&path).unwrap();

        let mut cache = QueryCache::open(&path, true);
        cache.set("q", entry("a"));
        assert_eq!(cache.get("q"), Some(&entry("a")));
    }

    #[test]
    fn test_disabled_cache_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = QueryCache::open(&path, false);
        cache.set("q", entry("a"));
        assert_eq!(cache.get("q"), None);
        assert!(!path.exists());

        let mut detached = QueryCache::disabled();
        detached.set("q", entry("a"));
        assert!(detached.get("q").is_none());
        detached.clear();
    }

    #[test]
    fn test_disabled_cache_ignores_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        QueryCache::open(&path, true).set("q", entry("a"));

        let cache = QueryCache::open(&path, false);
        assert!(cache.get("q").is_none());
    }

    #[test]
    fn test_clear_removes_entries_and_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = QueryCache::open(&path, true);
        cache.set("q", entry("a"));

        cache.clear();
        assert!(cache.get("q").is_none());
        assert!(!path.exists());

        // Clearing again with nothing on disk is fine
        cache.clear();
    }
}
