//! SQLite storage backend.
//!
//! Source of truth for reads. Each table keeps the full entity as a JSON
//! blob next to a few indexed columns for range and order queries. Event
//! appends enqueue an outbox row in the same transaction; a background relay
//! mirrors them to the JSONL backend (see [`crate::storage::outbox`]).
//! Non-event saves are written through to the JSONL mirror synchronously.
//!
//! On the first read after construction the backend seeds any empty table
//! from the flat-file data, so pointing the SQLite plugin at an existing
//! JSONL dataset migrates it without data loss or duplication.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::de::DeserializeOwned;

use crate::Result;
use crate::models::{Event, EventType, Habit, MoodEntry, QuickLogTag, SleepSession, Task, TaskList};
use crate::storage::backend::StorageBackend;
use crate::storage::jsonl::JsonlStorage;
use crate::storage::location::StorageLocation;
use crate::storage::logger::StorageLogger;
use crate::storage::outbox::{self, OutboxScheduler};

pub const PLUGIN_ID: &str = "sqlite";

/// Database filename inside the data directory.
pub const DB_FILE: &str = "daylog.db";

/// Shared handle to the SQLite connection.
///
/// One connection per backend instance, shared with the outbox relay
/// worker; all access serializes through the mutex.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Open (creating if needed) the database and initialize the schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// File path of the database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock poisons it; the connection itself
        // is still consistent, so keep serving.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS task_lists (
            id TEXT PRIMARY KEY,
            sort_order INTEGER NOT NULL DEFAULT 0,
            json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            list_id TEXT NOT NULL,
            created_ms INTEGER NOT NULL,
            json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS habits (
            id TEXT PRIMARY KEY,
            created_ms INTEGER NOT NULL,
            json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS quick_log_tags (
            id TEXT PRIMARY KEY,
            created_ms INTEGER NOT NULL,
            json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            ts_ms INTEGER NOT NULL,
            type TEXT NOT NULL,
            json TEXT NOT NULL,
            tags_json TEXT NOT NULL,
            details_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS json_outbox (
            id TEXT PRIMARY KEY,
            payload_json TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            processed_at INTEGER
        );

        CREATE TABLE IF NOT EXISTS mood_entries (
            id TEXT PRIMARY KEY,
            recorded_ms INTEGER NOT NULL,
            slot TEXT NOT NULL,
            json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sleep_sessions (
            id TEXT PRIMARY KEY,
            started_ms INTEGER NOT NULL,
            ended_ms INTEGER NOT NULL,
            source TEXT NOT NULL,
            json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_ts ON events(ts_ms);
        CREATE INDEX IF NOT EXISTS idx_events_type_ts ON events(type, ts_ms);
        CREATE INDEX IF NOT EXISTS idx_outbox_pending ON json_outbox(processed_at, created_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_list ON tasks(list_id);
        "#,
    )?;
    Ok(())
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn table_empty(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count == 0)
}

fn insert_event_row(conn: &Connection, event: &Event, json: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO events (id, ts_ms, type, json, tags_json, details_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id,
            event.timestamp.timestamp_millis(),
            event.event_type().as_str(),
            json,
            serde_json::to_string(&event.metadata.tags)?,
            serde_json::to_string(&event.metadata.details)?,
        ],
    )?;
    Ok(())
}

fn insert_task_list_row(conn: &Connection, list: &TaskList) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO task_lists (id, sort_order, json) VALUES (?1, ?2, ?3)",
        params![list.id, list.sort_order, serde_json::to_string(list)?],
    )?;
    Ok(())
}

fn insert_task_row(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO tasks (id, list_id, created_ms, json) VALUES (?1, ?2, ?3, ?4)",
        params![
            task.id,
            task.list_id,
            task.created_at.timestamp_millis(),
            serde_json::to_string(task)?,
        ],
    )?;
    Ok(())
}

fn insert_habit_row(conn: &Connection, habit: &Habit) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO habits (id, created_ms, json) VALUES (?1, ?2, ?3)",
        params![
            habit.id,
            habit.created_at.timestamp_millis(),
            serde_json::to_string(habit)?,
        ],
    )?;
    Ok(())
}

fn insert_tag_row(conn: &Connection, tag: &QuickLogTag) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO quick_log_tags (id, created_ms, json) VALUES (?1, ?2, ?3)",
        params![
            tag.id,
            tag.created_at.timestamp_millis(),
            serde_json::to_string(tag)?,
        ],
    )?;
    Ok(())
}

fn insert_mood_row(conn: &Connection, entry: &MoodEntry) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO mood_entries (id, recorded_ms, slot, json) VALUES (?1, ?2, ?3, ?4)",
        params![
            entry.id,
            entry.recorded_at.timestamp_millis(),
            entry.slot.as_str(),
            serde_json::to_string(entry)?,
        ],
    )?;
    Ok(())
}

fn insert_sleep_row(conn: &Connection, session: &SleepSession) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sleep_sessions (id, started_ms, ended_ms, source, json)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.id,
            session.started_at.timestamp_millis(),
            session.ended_at.timestamp_millis(),
            session.source.as_str(),
            serde_json::to_string(session)?,
        ],
    )?;
    Ok(())
}

/// SQLite implementation of [`StorageBackend`].
pub struct SqliteStorage {
    db: Database,
    jsonl: JsonlStorage,
    logger: Arc<dyn StorageLogger>,
    seeded: AtomicBool,
    scheduler: OutboxScheduler,
}

impl SqliteStorage {
    /// Open the backend: database at `db_path`, JSONL mirror in the
    /// directory resolved through `location`. Event appends schedule the
    /// background outbox relay.
    pub fn open(
        db_path: impl Into<PathBuf>,
        location: Arc<StorageLocation>,
        logger: Arc<dyn StorageLogger>,
    ) -> Result<Self> {
        Self::open_with(db_path, location, logger, true)
    }

    /// Like [`SqliteStorage::open`] but without the background relay
    /// worker; the owner drives [`SqliteStorage::sync_outbox`] itself.
    pub fn open_manual(
        db_path: impl Into<PathBuf>,
        location: Arc<StorageLocation>,
        logger: Arc<dyn StorageLogger>,
    ) -> Result<Self> {
        Self::open_with(db_path, location, logger, false)
    }

    fn open_with(
        db_path: impl Into<PathBuf>,
        location: Arc<StorageLocation>,
        logger: Arc<dyn StorageLogger>,
        background_relay: bool,
    ) -> Result<Self> {
        let db = Database::open(db_path)?;
        let jsonl = JsonlStorage::new(location, logger.clone());
        let scheduler = if background_relay {
            OutboxScheduler::spawn(db.clone(), jsonl.clone(), logger.clone())
        } else {
            OutboxScheduler::disabled()
        };
        Ok(Self {
            db,
            jsonl,
            logger,
            seeded: AtomicBool::new(false),
            scheduler,
        })
    }

    /// Shared database handle (used by the relay and by `dl sync`).
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Drain the outbox synchronously until no full batch remains.
    pub fn sync_outbox(&self) -> Result<usize> {
        outbox::drain(&self.db, &self.jsonl, self.logger.as_ref())
    }

    /// Events of one type within the (inclusive) range, in timestamp order.
    pub fn read_events_by_type(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        event_type: EventType,
    ) -> Result<Vec<Event>> {
        self.ensure_seeded();
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT id, json FROM events
             WHERE ts_ms >= ?1 AND ts_ms <= ?2 AND type = ?3
             ORDER BY ts_ms ASC",
        )?;
        let rows = stmt.query_map(
            params![
                start.timestamp_millis(),
                end.timestamp_millis(),
                event_type.as_str()
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;
        self.decode_events(rows)
    }

    /// Per-type event counts within the (inclusive) range.
    pub fn count_events_by_type(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(EventType, u64)>> {
        self.ensure_seeded();
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT type, COUNT(*) FROM events
             WHERE ts_ms >= ?1 AND ts_ms <= ?2
             GROUP BY type",
        )?;
        let rows = stmt.query_map(
            params![start.timestamp_millis(), end.timestamp_millis()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
        )?;
        let mut counts = Vec::new();
        for row in rows {
            let (raw, count) = row?;
            // Rows with an unrecognized discriminator are skipped.
            if let Some(event_type) = EventType::parse(&raw) {
                counts.push((event_type, count as u64));
            }
        }
        Ok(counts)
    }

    fn decode_events(
        &self,
        rows: impl Iterator<Item = rusqlite::Result<(String, String)>>,
    ) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for row in rows {
            let (id, json) = row?;
            match serde_json::from_str::<Event>(&json) {
                Ok(event) => events.push(event.ensure_metadata()),
                Err(e) => self.logger.warn(
                    PLUGIN_ID,
                    &format!("failed to decode event {id}"),
                    Some(&e),
                ),
            }
        }
        Ok(events)
    }

    /// Replace-all save: clear the table and bulk-insert inside one
    /// transaction, so a partial overwrite is never visible.
    fn replace_all<T>(
        &self,
        table: &str,
        items: &[T],
        insert: fn(&Connection, &T) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.db.lock();
        let tx = conn.transaction()?;
        tx.execute(&format!("DELETE FROM {table}"), [])?;
        for item in items {
            insert(&tx, item)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_entities<T: DeserializeOwned>(&self, sql: &str, entity: &str) -> Result<Vec<T>> {
        self.ensure_seeded();
        let conn = self.db.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut items = Vec::new();
        for row in rows {
            let (id, json) = row?;
            match serde_json::from_str(&json) {
                Ok(item) => items.push(item),
                Err(e) => self.logger.warn(
                    PLUGIN_ID,
                    &format!("failed to decode {entity} {id}"),
                    Some(&e),
                ),
            }
        }
        Ok(items)
    }

    /// Run the seed reconciler at most once per instance.
    ///
    /// Compare-and-set guards the attempt: under concurrent first reads one
    /// caller seeds while the rest proceed against whatever the database
    /// already holds. A failed attempt resets the flag so a later read
    /// retries, and the triggering read continues (fail open).
    fn ensure_seeded(&self) {
        if self
            .seeded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Err(e) = self.seed_from_files() {
            self.seeded.store(false, Ordering::Release);
            self.logger.error(
                PLUGIN_ID,
                "failed to seed database from flat files",
                Some(&e),
            );
        }
    }

    /// Backfill every empty table from the flat-file store, in one
    /// transaction. Non-empty tables are left untouched, which makes the
    /// whole pass idempotent.
    fn seed_from_files(&self) -> Result<()> {
        let mut conn = self.db.lock();

        let lists = if table_empty(&conn, "task_lists")? {
            self.jsonl.read_task_lists()?
        } else {
            Vec::new()
        };
        let tasks = if table_empty(&conn, "tasks")? {
            self.jsonl.read_tasks()?
        } else {
            Vec::new()
        };
        let habits = if table_empty(&conn, "habits")? {
            self.jsonl.read_habits()?
        } else {
            Vec::new()
        };
        let tags = if table_empty(&conn, "quick_log_tags")? {
            self.jsonl.read_tags()?
        } else {
            Vec::new()
        };
        let events = if table_empty(&conn, "events")? {
            self.jsonl.read_events()?
        } else {
            Vec::new()
        };
        let moods = if table_empty(&conn, "mood_entries")? {
            self.jsonl.read_mood_entries()?
        } else {
            Vec::new()
        };
        let sleeps = if table_empty(&conn, "sleep_sessions")? {
            self.jsonl.read_sleep_sessions()?
        } else {
            Vec::new()
        };

        let tx = conn.transaction()?;
        for list in &lists {
            insert_task_list_row(&tx, list)?;
        }
        for task in &tasks {
            insert_task_row(&tx, task)?;
        }
        for habit in &habits {
            insert_habit_row(&tx, habit)?;
        }
        for tag in &tags {
            insert_tag_row(&tx, tag)?;
        }
        for event in &events {
            let json = serde_json::to_string(event)?;
            insert_event_row(&tx, event, &json)?;
        }
        for entry in &moods {
            insert_mood_row(&tx, entry)?;
        }
        for session in &sleeps {
            insert_sleep_row(&tx, session)?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl StorageBackend for SqliteStorage {
    /// Insert the event and its outbox record in one transaction: they
    /// commit together or not at all.
    fn append_event(&self, event: &Event) -> Result<()> {
        let enriched = event.clone().ensure_metadata();
        let payload = serde_json::to_string(&enriched)?;
        {
            let mut conn = self.db.lock();
            let tx = conn.transaction()?;
            insert_event_row(&tx, &enriched, &payload)?;
            outbox::insert_pending(&tx, &enriched.id, &payload, now_ms())?;
            tx.commit()?;
        }
        self.scheduler.schedule();
        self.logger
            .info(PLUGIN_ID, "event appended and queued for JSONL sync");
        Ok(())
    }

    fn read_events_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        self.ensure_seeded();
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT id, json FROM events
             WHERE ts_ms >= ?1 AND ts_ms <= ?2
             ORDER BY ts_ms ASC",
        )?;
        let rows = stmt.query_map(
            params![start.timestamp_millis(), end.timestamp_millis()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )?;
        self.decode_events(rows)
    }

    /// The database file plus everything the JSONL mirror exports.
    fn export_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if self.db.path().exists() {
            files.push(self.db.path().to_path_buf());
        }
        files.extend(self.jsonl.export_files()?);
        Ok(files)
    }

    fn save_habits(&self, habits: &[Habit]) -> Result<()> {
        self.replace_all("habits", habits, insert_habit_row)?;
        self.jsonl.save_habits(habits)
    }

    fn read_habits(&self) -> Result<Vec<Habit>> {
        self.read_entities("SELECT id, json FROM habits ORDER BY created_ms ASC", "habit")
    }

    fn save_tags(&self, tags: &[QuickLogTag]) -> Result<()> {
        self.replace_all("quick_log_tags", tags, insert_tag_row)?;
        self.jsonl.save_tags(tags)
    }

    fn read_tags(&self) -> Result<Vec<QuickLogTag>> {
        self.read_entities(
            "SELECT id, json FROM quick_log_tags ORDER BY created_ms ASC",
            "tag",
        )
    }

    fn save_task_lists(&self, lists: &[TaskList]) -> Result<()> {
        self.replace_all("task_lists", lists, insert_task_list_row)?;
        self.jsonl.save_task_lists(lists)
    }

    fn read_task_lists(&self) -> Result<Vec<TaskList>> {
        self.read_entities(
            "SELECT id, json FROM task_lists ORDER BY sort_order ASC",
            "task list",
        )
    }

    fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.replace_all("tasks", tasks, insert_task_row)?;
        self.jsonl.save_tasks(tasks)
    }

    fn read_tasks(&self) -> Result<Vec<Task>> {
        self.read_entities("SELECT id, json FROM tasks ORDER BY created_ms ASC", "task")
    }

    fn save_mood_entries(&self, entries: &[MoodEntry]) -> Result<()> {
        self.replace_all("mood_entries", entries, insert_mood_row)?;
        self.jsonl.save_mood_entries(entries)
    }

    fn read_mood_entries(&self) -> Result<Vec<MoodEntry>> {
        self.read_entities(
            "SELECT id, json FROM mood_entries ORDER BY recorded_ms DESC",
            "mood entry",
        )
    }

    fn save_sleep_sessions(&self, sessions: &[SleepSession]) -> Result<()> {
        self.replace_all("sleep_sessions", sessions, insert_sleep_row)?;
        self.jsonl.save_sleep_sessions(sessions)
    }

    fn read_sleep_sessions(&self) -> Result<Vec<SleepSession>> {
        self.read_entities(
            "SELECT id, json FROM sleep_sessions ORDER BY started_ms DESC",
            "sleep session",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventPayload, LogType, MoodSlot, SleepSource};
    use crate::storage::logger::LogLevel;
    use crate::test_utils::TestEnv;
    use chrono::{Duration, TimeZone};

    fn event_at(ts: &str) -> Event {
        let mut event = Event::new(EventPayload::TaskCompleted {
            task_id: "t1".to_string(),
            project_id: None,
            completion_notes: None,
        });
        event.timestamp = ts.parse().unwrap();
        event
    }

    fn outbox_rows(db: &Database) -> Vec<(String, Option<i64>)> {
        let conn = db.lock();
        let mut stmt = conn
            .prepare("SELECT id, processed_at FROM json_outbox ORDER BY created_at ASC")
            .unwrap();
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_append_event_creates_pending_outbox_row() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        let event = event_at("2025-01-01T00:00:00Z");
        storage.append_event(&event).unwrap();

        let rows = outbox_rows(storage.database());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, event.id);
        assert_eq!(rows[0].1, None);
    }

    #[test]
    fn test_event_reaches_mirror_after_relay() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        let mut event = event_at("2025-01-01T00:00:00Z");
        event.id = "e1".to_string();
        storage.append_event(&event).unwrap();

        // Pending until the relay runs.
        assert_eq!(outbox_rows(storage.database()), vec![("e1".to_string(), None)]);
        assert!(env.jsonl().read_events().unwrap().is_empty());

        assert_eq!(storage.sync_outbox().unwrap(), 1);

        let rows = outbox_rows(storage.database());
        assert_eq!(rows[0].0, "e1");
        assert!(rows[0].1.is_some());

        let start = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let mirrored = env.jsonl().read_events_by_date_range(start, end).unwrap();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].id, "e1");

        // A second relay run finds nothing to do.
        assert_eq!(storage.sync_outbox().unwrap(), 0);
        assert_eq!(env.jsonl().read_events().unwrap().len(), 1);
    }

    #[test]
    fn test_event_range_read_is_inclusive_and_ordered() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        // Insert out of order; reads come back in timestamp order.
        for ts in [
            "2025-01-03T00:00:00Z",
            "2025-01-01T00:00:00Z",
            "2025-01-02T00:00:00Z",
        ] {
            storage.append_event(&event_at(ts)).unwrap();
        }

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let events = storage.read_events_by_date_range(start, end).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp < events[1].timestamp);
    }

    #[test]
    fn test_type_filtered_reads_and_counts() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        storage.append_event(&event_at("2025-01-01T06:00:00Z")).unwrap();
        let mut quick = Event::new(EventPayload::QuickLog {
            tag: "water".to_string(),
            value: None,
            context: None,
        });
        quick.timestamp = "2025-01-01T07:00:00Z".parse().unwrap();
        storage.append_event(&quick).unwrap();

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();

        let tasks = storage
            .read_events_by_type(start, end, EventType::TaskCompleted)
            .unwrap();
        assert_eq!(tasks.len(), 1);

        let mut counts = storage.count_events_by_type(start, end).unwrap();
        counts.sort_by_key(|(t, _)| t.as_str());
        assert_eq!(
            counts,
            vec![(EventType::QuickLog, 1), (EventType::TaskCompleted, 1)]
        );
    }

    #[test]
    fn test_collection_roundtrips() {
        let env = TestEnv::new();
        let storage = env.sqlite();
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let mut habits = vec![Habit::new("run"), Habit::new("read")];
        habits[0].created_at = base;
        habits[1].created_at = base + Duration::hours(1);
        storage.save_habits(&habits).unwrap();
        assert_eq!(storage.read_habits().unwrap(), habits);

        let tags = vec![QuickLogTag::new("water", LogType::Numeric)];
        storage.save_tags(&tags).unwrap();
        assert_eq!(storage.read_tags().unwrap(), tags);

        let mut lists = vec![TaskList::new("inbox"), TaskList::new("errands")];
        lists[1].sort_order = 1;
        storage.save_task_lists(&lists).unwrap();
        assert_eq!(storage.read_task_lists().unwrap(), lists);

        let mut tasks = vec![
            Task::new(&lists[0].id, "water plants"),
            Task::new(&lists[0].id, "buy soil"),
        ];
        tasks[0].created_at = base;
        tasks[1].created_at = base + Duration::hours(1);
        storage.save_tasks(&tasks).unwrap();
        assert_eq!(storage.read_tasks().unwrap(), tasks);

        // Mood and sleep read newest-first.
        let mut moods = vec![
            MoodEntry::new(MoodSlot::Morning, 3),
            MoodEntry::new(MoodSlot::Night, 4),
        ];
        moods[0].recorded_at = base;
        moods[1].recorded_at = base + Duration::hours(12);
        storage.save_mood_entries(&moods).unwrap();
        assert_eq!(
            storage.read_mood_entries().unwrap(),
            vec![moods[1].clone(), moods[0].clone()]
        );

        let sleeps = vec![SleepSession::new(
            base,
            base + Duration::hours(8),
            SleepSource::Manual,
        )];
        storage.save_sleep_sessions(&sleeps).unwrap();
        assert_eq!(storage.read_sleep_sessions().unwrap(), sleeps);
    }

    #[test]
    fn test_save_mirrors_to_flat_files() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        let habits = vec![Habit::new("run")];
        storage.save_habits(&habits).unwrap();

        // The JSONL mirror is written through synchronously.
        assert_eq!(env.jsonl().read_habits().unwrap(), habits);
    }

    #[test]
    fn test_replace_all_save_drops_stale_rows() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        let habits = vec![Habit::new("run"), Habit::new("read")];
        storage.save_habits(&habits).unwrap();
        let shorter = vec![habits[0].clone()];
        storage.save_habits(&shorter).unwrap();

        assert_eq!(storage.read_habits().unwrap(), shorter);
    }

    #[test]
    fn test_first_read_seeds_empty_tables_from_flat_files() {
        let env = TestEnv::new();

        // Existing flat-file data from a previous installation.
        let jsonl = env.jsonl();
        let habits = vec![Habit::new("run")];
        jsonl.save_habits(&habits).unwrap();
        jsonl.append_event(&event_at("2025-01-01T00:00:00Z")).unwrap();

        let storage = env.sqlite();
        assert_eq!(storage.read_habits().unwrap(), habits);

        let start = Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(storage.read_events_by_date_range(start, end).unwrap().len(), 1);
    }

    #[test]
    fn test_seeding_runs_once_and_counts_stay_stable() {
        let env = TestEnv::new();

        let jsonl = env.jsonl();
        jsonl.save_habits(&[Habit::new("run")]).unwrap();

        let storage = env.sqlite();
        assert_eq!(storage.read_habits().unwrap().len(), 1);
        assert_eq!(storage.read_habits().unwrap().len(), 1);
        assert_eq!(storage.read_tasks().unwrap().len(), 0);

        // Writing to the flat files after seeding must not re-seed.
        jsonl
            .save_habits(&[Habit::new("run"), Habit::new("read")])
            .unwrap();
        assert_eq!(storage.read_habits().unwrap().len(), 1);
    }

    #[test]
    fn test_seeding_preserves_existing_tables() {
        let env = TestEnv::new();

        let jsonl = env.jsonl();
        jsonl.save_habits(&[Habit::new("stale")]).unwrap();
        jsonl.save_tasks(&[Task::new("l1", "from files")]).unwrap();

        // Habit table already has data; only the empty tables seed.
        let storage = env.sqlite();
        let kept = vec![Habit::new("kept")];
        storage.save_habits(&kept).unwrap();

        // save_habits mirrored to JSONL, so re-point the mirror content.
        jsonl.save_habits(&[Habit::new("stale")]).unwrap();

        assert_eq!(storage.read_habits().unwrap(), kept);
        assert_eq!(storage.read_tasks().unwrap().len(), 1);
    }

    #[test]
    fn test_seeding_failure_resets_flag_for_retry() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        env.jsonl().save_tasks(&[Task::new("l1", "t")]).unwrap();

        // Sabotage the schema so the seed transaction fails.
        storage
            .database()
            .lock()
            .execute_batch("DROP TABLE tasks")
            .unwrap();

        // Read proceeds despite the failed seed, and each read retries.
        assert!(storage.read_habits().unwrap().is_empty());
        assert!(storage.read_habits().unwrap().is_empty());
        assert_eq!(env.logger.count_at(LogLevel::Error), 2);
    }

    #[test]
    fn test_corrupt_row_is_skipped_with_warning() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        storage.save_habits(&[Habit::new("run")]).unwrap();
        storage
            .database()
            .lock()
            .execute(
                "INSERT INTO habits (id, created_ms, json) VALUES ('bad', 0, '{nope')",
                [],
            )
            .unwrap();

        assert_eq!(storage.read_habits().unwrap().len(), 1);
        assert_eq!(env.logger.count_at(LogLevel::Warn), 1);
    }

    #[test]
    fn test_export_files_includes_db_and_mirror() {
        let env = TestEnv::new();
        let storage = env.sqlite();

        let files = storage.export_files().unwrap();
        assert_eq!(files[0], env.db_path());
        assert_eq!(files.len(), 1 + crate::storage::jsonl::DATA_FILES.len());
    }
}
