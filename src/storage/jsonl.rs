//! JSONL flat-file storage backend.
//!
//! Each non-event collection is one JSON array document, overwritten
//! wholesale on save. The event stream is append-only JSON-Lines. Reads are
//! tolerant: a missing, unreadable, or corrupt file reads as "no data", and
//! a corrupt event line is skipped. The storage layer degrades instead of
//! failing the caller.
//!
//! The target directory is re-resolved through [`StorageLocation`] on every
//! access because the configured location can change between runs.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;
use crate::models::{Event, Habit, MoodEntry, QuickLogTag, SleepSession, Task, TaskList};
use crate::storage::backend::StorageBackend;
use crate::storage::location::StorageLocation;
use crate::storage::logger::StorageLogger;

pub const PLUGIN_ID: &str = "jsonl";

pub const EVENTS_FILE: &str = "events.jsonl";
pub const HABITS_FILE: &str = "habits.json";
pub const TAGS_FILE: &str = "tags.json";
pub const TASK_LISTS_FILE: &str = "task_lists.json";
pub const TASKS_FILE: &str = "tasks.json";
pub const MOOD_ENTRIES_FILE: &str = "mood_entries.json";
pub const SLEEP_SESSIONS_FILE: &str = "sleep_sessions.json";

/// Every file this backend owns, in export order. Also the migration set
/// when the storage location changes.
pub const DATA_FILES: &[&str] = &[
    EVENTS_FILE,
    HABITS_FILE,
    TAGS_FILE,
    TASK_LISTS_FILE,
    TASKS_FILE,
    MOOD_ENTRIES_FILE,
    SLEEP_SESSIONS_FILE,
];

/// JSONL implementation of [`StorageBackend`].
#[derive(Clone)]
pub struct JsonlStorage {
    location: Arc<StorageLocation>,
    logger: Arc<dyn StorageLogger>,
}

impl JsonlStorage {
    pub fn new(location: Arc<StorageLocation>, logger: Arc<dyn StorageLogger>) -> Self {
        Self { location, logger }
    }

    fn file(&self, name: &str) -> Result<PathBuf> {
        Ok(self.location.resolve()?.join(name))
    }

    /// Read the full event history, skipping corrupt lines.
    ///
    /// Public because the SQLite backend seeds its event table from here.
    pub fn read_events(&self) -> Result<Vec<Event>> {
        let path = self.file(EVENTS_FILE)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) => events.push(event.ensure_metadata()),
                Err(e) => self.logger.warn(
                    PLUGIN_ID,
                    "failed to decode event line; skipping",
                    Some(&e),
                ),
            }
        }
        Ok(events)
    }

    fn write_list<T: Serialize>(&self, name: &str, items: &[T]) -> Result<()> {
        let json = serde_json::to_string(items)?;
        fs::write(self.file(name)?, json)?;
        Ok(())
    }

    /// Read a JSON array document, degrading to empty on any failure.
    ///
    /// An unreadable file logs at error level, invalid JSON at warn level;
    /// neither propagates; reads must not fail because one file is bad.
    fn read_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let path = self.file(name)?;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                self.logger
                    .error(PLUGIN_ID, &format!("failed to read {name}"), Some(&e));
                return Ok(Vec::new());
            }
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                self.logger.warn(
                    PLUGIN_ID,
                    &format!("failed to decode {name}; returning default"),
                    Some(&e),
                );
                Ok(Vec::new())
            }
        }
    }
}

impl StorageBackend for JsonlStorage {
    fn append_event(&self, event: &Event) -> Result<()> {
        let enriched = event.clone().ensure_metadata();
        let json = serde_json::to_string(&enriched)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file(EVENTS_FILE)?)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    fn read_events_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        Ok(self
            .read_events()?
            .into_iter()
            .filter(|event| event.timestamp >= start && event.timestamp <= end)
            .collect())
    }

    fn export_files(&self) -> Result<Vec<PathBuf>> {
        DATA_FILES.iter().map(|name| self.file(name)).collect()
    }

    fn save_habits(&self, habits: &[Habit]) -> Result<()> {
        self.write_list(HABITS_FILE, habits)
    }

    fn read_habits(&self) -> Result<Vec<Habit>> {
        self.read_list(HABITS_FILE)
    }

    fn save_tags(&self, tags: &[QuickLogTag]) -> Result<()> {
        self.write_list(TAGS_FILE, tags)
    }

    fn read_tags(&self) -> Result<Vec<QuickLogTag>> {
        self.read_list(TAGS_FILE)
    }

    fn save_task_lists(&self, lists: &[TaskList]) -> Result<()> {
        self.write_list(TASK_LISTS_FILE, lists)
    }

    fn read_task_lists(&self) -> Result<Vec<TaskList>> {
        self.read_list(TASK_LISTS_FILE)
    }

    fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.write_list(TASKS_FILE, tasks)
    }

    fn read_tasks(&self) -> Result<Vec<Task>> {
        self.read_list(TASKS_FILE)
    }

    fn save_mood_entries(&self, entries: &[MoodEntry]) -> Result<()> {
        self.write_list(MOOD_ENTRIES_FILE, entries)
    }

    fn read_mood_entries(&self) -> Result<Vec<MoodEntry>> {
        self.read_list(MOOD_ENTRIES_FILE)
    }

    fn save_sleep_sessions(&self, sessions: &[SleepSession]) -> Result<()> {
        self.write_list(SLEEP_SESSIONS_FILE, sessions)
    }

    fn read_sleep_sessions(&self) -> Result<Vec<SleepSession>> {
        self.read_list(SLEEP_SESSIONS_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventPayload, LogType, MoodSlot, SleepSource};
    use crate::storage::logger::LogLevel;
    use crate::test_utils::TestEnv;
    use chrono::TimeZone;
    use std::fs;

    fn event_at(ts: &str) -> Event {
        let mut event = Event::new(EventPayload::QuickLog {
            tag: "water".to_string(),
            value: Some(1.0),
            context: None,
        });
        event.timestamp = ts.parse().unwrap();
        event
    }

    #[test]
    fn test_event_append_and_read_roundtrip() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        let a = event_at("2025-01-01T08:00:00Z");
        let b = event_at("2025-01-02T08:00:00Z");
        storage.append_event(&a).unwrap();
        storage.append_event(&b).unwrap();

        let events = storage.read_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, a.id);
        assert_eq!(events[1].id, b.id);
        // Appends enrich metadata before writing.
        assert!(!events[0].metadata.is_empty());
    }

    #[test]
    fn test_corrupt_event_lines_are_skipped_with_warnings() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        storage.append_event(&event_at("2025-01-01T08:00:00Z")).unwrap();
        storage.append_event(&event_at("2025-01-02T08:00:00Z")).unwrap();

        // Interleave corrupt lines among the valid ones.
        let path = env.files_path().join(EVENTS_FILE);
        let mut raw = fs::read_to_string(&path).unwrap();
        raw = format!("not json\n{raw}{{\"id\": truncated\n");
        fs::write(&path, raw).unwrap();
        storage.append_event(&event_at("2025-01-03T08:00:00Z")).unwrap();

        let events = storage.read_events().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(env.logger.count_at(LogLevel::Warn), 2);
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        for ts in [
            "2025-01-01T00:00:00Z",
            "2025-01-02T00:00:00Z",
            "2025-01-03T00:00:00Z",
        ] {
            storage.append_event(&event_at(ts)).unwrap();
        }

        let start = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = chrono::Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let events = storage.read_events_by_date_range(start, end).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_read_missing_files_returns_empty() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        assert!(storage.read_events().unwrap().is_empty());
        assert!(storage.read_habits().unwrap().is_empty());
        assert!(storage.read_tasks().unwrap().is_empty());
        assert_eq!(env.logger.count_at(LogLevel::Warn), 0);
    }

    #[test]
    fn test_invalid_task_lists_json_reads_empty_and_warns() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        fs::write(env.files_path().join(TASK_LISTS_FILE), "{BROKEN").unwrap();

        let lists = storage.read_task_lists().unwrap();
        assert!(lists.is_empty());

        let warnings = env.logger.messages_at(LogLevel::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains(TASK_LISTS_FILE));
    }

    #[test]
    fn test_save_is_replace_all() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        let habits = vec![Habit::new("run"), Habit::new("read")];
        storage.save_habits(&habits).unwrap();
        assert_eq!(storage.read_habits().unwrap(), habits);

        let shorter = vec![habits[1].clone()];
        storage.save_habits(&shorter).unwrap();
        assert_eq!(storage.read_habits().unwrap(), shorter);
    }

    #[test]
    fn test_collection_roundtrips_preserve_order() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        let tags = vec![
            QuickLogTag::new("water", LogType::Numeric),
            QuickLogTag::new("focus", LogType::Scale),
        ];
        storage.save_tags(&tags).unwrap();
        assert_eq!(storage.read_tags().unwrap(), tags);

        let lists = vec![TaskList::new("inbox"), TaskList::new("errands")];
        storage.save_task_lists(&lists).unwrap();
        assert_eq!(storage.read_task_lists().unwrap(), lists);

        let tasks = vec![Task::new(&lists[0].id, "water plants")];
        storage.save_tasks(&tasks).unwrap();
        assert_eq!(storage.read_tasks().unwrap(), tasks);

        let moods = vec![MoodEntry::new(MoodSlot::Morning, 4)];
        storage.save_mood_entries(&moods).unwrap();
        assert_eq!(storage.read_mood_entries().unwrap(), moods);

        let sleeps = vec![SleepSession::new(
            "2025-01-01T22:00:00Z".parse().unwrap(),
            "2025-01-02T06:00:00Z".parse().unwrap(),
            SleepSource::Manual,
        )];
        storage.save_sleep_sessions(&sleeps).unwrap();
        assert_eq!(storage.read_sleep_sessions().unwrap(), sleeps);
    }

    #[test]
    fn test_export_files_lists_all_data_files() {
        let env = TestEnv::new();
        let storage = env.jsonl();

        let files = storage.export_files().unwrap();
        assert_eq!(files.len(), DATA_FILES.len());
        assert!(files.iter().all(|f| f.starts_with(env.files_path())));
    }
}
