//! Storage contract and plugin registry.
//!
//! [`StorageBackend`] is the sole persistence interface surfaced to the rest
//! of the application. Concrete backends are registered as
//! [`StoragePlugin`]s and selected by id; the SQLite plugin is the default.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::models::{Event, Habit, MoodEntry, QuickLogTag, SleepSession, Task, TaskList};
use crate::storage::jsonl::JsonlStorage;
use crate::storage::location::StorageLocation;
use crate::storage::logger::StorageLogger;
use crate::storage::sqlite::{DB_FILE, SqliteStorage};

/// Persistence contract implemented by every storage backend.
///
/// Collection saves are replace-all: the given slice is the complete
/// authoritative list. Reads return an empty vec for never-written
/// collections. Backends are internally synchronized; callers may share one
/// instance across threads without external locking.
pub trait StorageBackend: Send + Sync {
    /// Durably append one event to the stream.
    fn append_event(&self, event: &Event) -> Result<()>;

    /// Events with `start <= timestamp <= end` (inclusive bounds), in
    /// timestamp order.
    fn read_events_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>>;

    /// Files a user-facing export of this backend should include.
    fn export_files(&self) -> Result<Vec<PathBuf>>;

    fn save_habits(&self, habits: &[Habit]) -> Result<()>;
    fn read_habits(&self) -> Result<Vec<Habit>>;

    fn save_tags(&self, tags: &[QuickLogTag]) -> Result<()>;
    fn read_tags(&self) -> Result<Vec<QuickLogTag>>;

    fn save_task_lists(&self, lists: &[TaskList]) -> Result<()>;
    fn read_task_lists(&self) -> Result<Vec<TaskList>>;

    fn save_tasks(&self, tasks: &[Task]) -> Result<()>;
    fn read_tasks(&self) -> Result<Vec<Task>>;

    fn save_mood_entries(&self, entries: &[MoodEntry]) -> Result<()>;
    fn read_mood_entries(&self) -> Result<Vec<MoodEntry>>;

    fn save_sleep_sessions(&self, sessions: &[SleepSession]) -> Result<()>;
    fn read_sleep_sessions(&self) -> Result<Vec<SleepSession>>;
}

/// Everything a plugin factory needs to build a backend.
pub struct PluginContext {
    /// Directory for backend-private files (the SQLite database).
    pub data_dir: PathBuf,
    /// Resolver for the flat-file directory.
    pub location: Arc<StorageLocation>,
    /// Logging sink shared by all backends.
    pub logger: Arc<dyn StorageLogger>,
}

/// A registered persistence backend.
pub struct StoragePlugin {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    factory: fn(&PluginContext) -> Result<Arc<dyn StorageBackend>>,
}

impl StoragePlugin {
    /// Build a backend instance for this plugin.
    pub fn create(&self, ctx: &PluginContext) -> Result<Arc<dyn StorageBackend>> {
        (self.factory)(ctx)
    }
}

fn create_sqlite(ctx: &PluginContext) -> Result<Arc<dyn StorageBackend>> {
    let storage = SqliteStorage::open(
        ctx.data_dir.join(DB_FILE),
        ctx.location.clone(),
        ctx.logger.clone(),
    )?;
    Ok(Arc::new(storage))
}

fn create_jsonl(ctx: &PluginContext) -> Result<Arc<dyn StorageBackend>> {
    Ok(Arc::new(JsonlStorage::new(
        ctx.location.clone(),
        ctx.logger.clone(),
    )))
}

static PLUGINS: &[StoragePlugin] = &[
    StoragePlugin {
        id: "sqlite",
        display_name: "SQLite Storage",
        description: "Persists data in SQLite with a JSONL outbox mirror.",
        factory: create_sqlite,
    },
    StoragePlugin {
        id: "jsonl",
        display_name: "JSONL Storage",
        description: "Stores data as JSON lines files. Lightweight and portable.",
        factory: create_jsonl,
    },
];

/// All registered plugins.
pub fn plugins() -> &'static [StoragePlugin] {
    PLUGINS
}

/// Look up a plugin by id. Unknown ids yield `None`, not an error.
pub fn plugin_by_id(id: &str) -> Option<&'static StoragePlugin> {
    PLUGINS.iter().find(|p| p.id == id)
}

/// The backend used when no plugin is selected.
pub fn default_plugin() -> &'static StoragePlugin {
    &PLUGINS[0]
}
