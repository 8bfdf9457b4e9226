//! Command implementations for the daylog CLI.
//!
//! Each handler resolves a storage backend through the plugin registry,
//! performs the operation against the [`StorageBackend`] contract, and
//! returns an [`Output`] carrying both JSON and human-readable renderings.
//! Backend-specific operations (outbox sync, indexed type queries) open the
//! SQLite backend directly.

use std::fs::File;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};

use crate::cli::{
    Commands, HabitCommands, ListCommands, LocationCommands, LogCommands, MoodCommands,
    PluginCommands, SleepCommands, TagCommands, TaskCommands,
};
use crate::models::{
    Event, EventPayload, EventType, Habit, LogType, MoodEntry, MoodSlot, PomodoroTarget,
    QuickLogTag, SleepQuality, SleepSession, SleepSource, Task, TaskList,
};
use crate::storage::sqlite::{DB_FILE, SqliteStorage};
use crate::storage::{
    PluginContext, StorageBackend, StorageLocation, StoragePlugin, TracingLogger, default_plugin,
    plugin_by_id, plugins,
};
use crate::{Error, Result, config};

/// Result of a command: JSON by default, prose with `-H`.
pub struct Output {
    json: Value,
    human: String,
}

impl Output {
    fn new(json: Value, human: impl Into<String>) -> Self {
        Self {
            json,
            human: human.into(),
        }
    }

    pub fn print(&self, human: bool) {
        if human {
            println!("{}", self.human);
        } else {
            println!("{}", self.json);
        }
    }
}

/// Dispatch a parsed command.
pub fn run(command: Commands, backend_flag: Option<String>) -> Result<Output> {
    match command {
        Commands::Log { command } => cmd_log(backend_flag, command),
        Commands::Events {
            from,
            to,
            event_type,
        } => cmd_events(backend_flag, from, to, event_type),
        Commands::Stats { from, to } => cmd_stats(backend_flag, from, to),
        Commands::Habit { command } => cmd_habit(backend_flag, command),
        Commands::Tag { command } => cmd_tag(backend_flag, command),
        Commands::List { command } => cmd_list(backend_flag, command),
        Commands::Task { command } => cmd_task(backend_flag, command),
        Commands::Mood { command } => cmd_mood(backend_flag, command),
        Commands::Sleep { command } => cmd_sleep(backend_flag, command),
        Commands::Sync => cmd_sync(backend_flag),
        Commands::Export { output } => cmd_export(backend_flag, output),
        Commands::Plugin { command } => cmd_plugin(command),
        Commands::Location { command } => cmd_location(command),
        Commands::Version => Ok(cmd_version()),
    }
}

fn active_plugin(backend_flag: Option<String>) -> Result<&'static StoragePlugin> {
    let configured = match backend_flag {
        Some(id) => Some(id),
        None => config::load()?.backend,
    };
    match configured {
        Some(id) => {
            plugin_by_id(&id).ok_or_else(|| Error::InvalidInput(format!("unknown storage plugin: {id}")))
        }
        None => Ok(default_plugin()),
    }
}

fn plugin_context() -> Result<PluginContext> {
    Ok(PluginContext {
        data_dir: config::data_dir()?,
        location: Arc::new(StorageLocation::from_config()),
        logger: Arc::new(TracingLogger),
    })
}

fn open_backend(backend_flag: Option<String>) -> Result<Arc<dyn StorageBackend>> {
    active_plugin(backend_flag)?.create(&plugin_context()?)
}

/// The SQLite backend without its background relay, for commands that
/// drive the outbox or the indexed query paths themselves.
fn open_sqlite() -> Result<SqliteStorage> {
    let ctx = plugin_context()?;
    SqliteStorage::open_manual(ctx.data_dir.join(DB_FILE), ctx.location, ctx.logger)
}

/// Parse an RFC 3339 timestamp, or a bare date as midnight UTC.
fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
    }
    Err(Error::InvalidInput(format!("invalid timestamp: {raw}")))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| Error::InvalidInput(format!("invalid date: {raw}")))
}

/// Resolve an optional range; defaults to everything up to now.
fn range(from: Option<String>, to: Option<String>) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = match from {
        Some(raw) => parse_ts(&raw)?,
        None => Utc.timestamp_opt(0, 0).unwrap(),
    };
    let end = match to {
        Some(raw) => parse_ts(&raw)?,
        None => Utc::now(),
    };
    Ok((start, end))
}

fn append(backend: &dyn StorageBackend, payload: EventPayload) -> Result<Output> {
    let event = Event::new(payload).ensure_metadata();
    backend.append_event(&event)?;
    Ok(Output::new(
        json!({"logged": event.id, "type": event.event_type().as_str()}),
        format!("Logged {} event {}", event.event_type(), event.id),
    ))
}

fn cmd_log(backend_flag: Option<String>, command: LogCommands) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    match command {
        LogCommands::Habit { habit_id, notes } => {
            append(backend.as_ref(), EventPayload::HabitCompleted { habit_id, notes })
        }
        LogCommands::Task {
            task_id,
            project,
            notes,
        } => append(
            backend.as_ref(),
            EventPayload::TaskCompleted {
                task_id,
                project_id: project,
                completion_notes: notes,
            },
        ),
        LogCommands::Quick {
            tag,
            value,
            context,
        } => append(backend.as_ref(), EventPayload::QuickLog { tag, value, context }),
        LogCommands::Pomodoro {
            focus_secs,
            target_type,
            target_id,
            break_secs,
            started_at,
            ended_at,
            interrupted,
        } => {
            let target_type = PomodoroTarget::parse(&target_type)
                .ok_or_else(|| Error::InvalidInput(format!("invalid target type: {target_type}")))?;
            let ended = match ended_at {
                Some(raw) => parse_ts(&raw)?,
                None => Utc::now(),
            };
            let started = match started_at {
                Some(raw) => parse_ts(&raw)?,
                None => ended - Duration::seconds(i64::from(focus_secs)),
            };
            append(
                backend.as_ref(),
                EventPayload::PomodoroCompleted {
                    target_type,
                    target_id,
                    focus_duration_seconds: focus_secs,
                    break_duration_seconds: break_secs,
                    started_at: started,
                    ended_at: ended,
                    interrupted,
                },
            )
        }
    }
}

fn cmd_events(
    backend_flag: Option<String>,
    from: Option<String>,
    to: Option<String>,
    event_type: Option<String>,
) -> Result<Output> {
    let (start, end) = range(from, to)?;
    let type_filter = event_type
        .map(|raw| {
            EventType::parse(&raw)
                .ok_or_else(|| Error::InvalidInput(format!("invalid event type: {raw}")))
        })
        .transpose()?;

    let plugin = active_plugin(backend_flag)?;
    let events = match type_filter {
        // The SQLite backend answers type filters from its index.
        Some(t) if plugin.id == "sqlite" => open_sqlite()?.read_events_by_type(start, end, t)?,
        Some(t) => plugin
            .create(&plugin_context()?)?
            .read_events_by_date_range(start, end)?
            .into_iter()
            .filter(|e| e.event_type() == t)
            .collect(),
        None => plugin
            .create(&plugin_context()?)?
            .read_events_by_date_range(start, end)?,
    };

    let human = events
        .iter()
        .map(|e| format!("{}  {:<19} {}", e.timestamp.to_rfc3339(), e.event_type(), e.id))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(Output::new(
        json!({"count": events.len(), "events": events}),
        if human.is_empty() { "No events".to_string() } else { human },
    ))
}

fn cmd_stats(
    backend_flag: Option<String>,
    from: Option<String>,
    to: Option<String>,
) -> Result<Output> {
    let (start, end) = range(from, to)?;
    let plugin = active_plugin(backend_flag)?;
    let counts: Vec<(EventType, u64)> = if plugin.id == "sqlite" {
        open_sqlite()?.count_events_by_type(start, end)?
    } else {
        let mut counts = std::collections::BTreeMap::new();
        for event in plugin
            .create(&plugin_context()?)?
            .read_events_by_date_range(start, end)?
        {
            *counts.entry(event.event_type().as_str()).or_insert(0u64) += 1;
        }
        counts
            .into_iter()
            .filter_map(|(t, n)| EventType::parse(t).map(|t| (t, n)))
            .collect()
    };

    let human = counts
        .iter()
        .map(|(t, n)| format!("{:<19} {n}", t.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    let map: serde_json::Map<String, Value> = counts
        .iter()
        .map(|(t, n)| (t.as_str().to_string(), json!(n)))
        .collect();
    Ok(Output::new(
        json!({"counts": map}),
        if human.is_empty() { "No events".to_string() } else { human },
    ))
}

fn cmd_habit(backend_flag: Option<String>, command: HabitCommands) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    match command {
        HabitCommands::Add {
            name,
            description,
            color,
            icon,
        } => {
            let mut habits = backend.read_habits()?;
            let mut habit = Habit::new(name);
            if let Some(description) = description {
                habit.description = description;
            }
            if let Some(color) = color {
                habit.color = color;
            }
            if let Some(icon) = icon {
                habit.icon = icon;
            }
            habits.push(habit.clone());
            backend.save_habits(&habits)?;
            Ok(Output::new(
                json!({"habit": habit}),
                format!("Added habit '{}' ({})", habit.name, habit.id),
            ))
        }
        HabitCommands::List => {
            let habits = backend.read_habits()?;
            let human = habits
                .iter()
                .map(|h| {
                    let marker = if h.is_archived { " (archived)" } else { "" };
                    format!("{}  {}{}", h.id, h.name, marker)
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Output::new(
                json!({"count": habits.len(), "habits": habits}),
                if human.is_empty() { "No habits".to_string() } else { human },
            ))
        }
        HabitCommands::Archive { id } => {
            let mut habits = backend.read_habits()?;
            let habit = habits
                .iter_mut()
                .find(|h| h.id == id)
                .ok_or_else(|| Error::NotFound(format!("habit {id}")))?;
            habit.is_archived = true;
            let name = habit.name.clone();
            backend.save_habits(&habits)?;
            Ok(Output::new(
                json!({"archived": id}),
                format!("Archived habit '{name}'"),
            ))
        }
    }
}

fn cmd_tag(backend_flag: Option<String>, command: TagCommands) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    match command {
        TagCommands::Add {
            name,
            log_type,
            unit,
            min,
            max,
        } => {
            let log_type = LogType::parse(&log_type)
                .ok_or_else(|| Error::InvalidInput(format!("invalid log type: {log_type}")))?;
            let mut tags = backend.read_tags()?;
            let mut tag = QuickLogTag::new(name, log_type);
            tag.unit = unit;
            tag.min = min;
            tag.max = max;
            tags.push(tag.clone());
            backend.save_tags(&tags)?;
            Ok(Output::new(
                json!({"tag": tag}),
                format!("Added tag '{}' ({})", tag.name, tag.id),
            ))
        }
        TagCommands::List => {
            let tags = backend.read_tags()?;
            let human = tags
                .iter()
                .map(|t| format!("{}  {}", t.id, t.name))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Output::new(
                json!({"count": tags.len(), "tags": tags}),
                if human.is_empty() { "No tags".to_string() } else { human },
            ))
        }
    }
}

fn cmd_list(backend_flag: Option<String>, command: ListCommands) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    match command {
        ListCommands::Add { name } => {
            let mut lists = backend.read_task_lists()?;
            let mut list = TaskList::new(name);
            list.sort_order = lists.len() as i64;
            lists.push(list.clone());
            backend.save_task_lists(&lists)?;
            Ok(Output::new(
                json!({"list": list}),
                format!("Added list '{}' ({})", list.name, list.id),
            ))
        }
        ListCommands::List => {
            let lists = backend.read_task_lists()?;
            let human = lists
                .iter()
                .map(|l| format!("{}  {}", l.id, l.name))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Output::new(
                json!({"count": lists.len(), "lists": lists}),
                if human.is_empty() { "No lists".to_string() } else { human },
            ))
        }
    }
}

fn cmd_task(backend_flag: Option<String>, command: TaskCommands) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    match command {
        TaskCommands::Add {
            title,
            list,
            notes,
            important,
            due,
            my_day,
        } => {
            let lists = backend.read_task_lists()?;
            if !lists.iter().any(|l| l.id == list) {
                return Err(Error::NotFound(format!("task list {list}")));
            }
            let mut tasks = backend.read_tasks()?;
            let mut task = Task::new(list, title);
            task.notes = notes;
            task.is_important = important;
            task.is_in_my_day = my_day;
            if let Some(raw) = due {
                task.due_date = Some(parse_date(&raw)?);
            }
            tasks.push(task.clone());
            backend.save_tasks(&tasks)?;
            Ok(Output::new(
                json!({"task": task}),
                format!("Added task '{}' ({})", task.title, task.id),
            ))
        }
        TaskCommands::List { list } => {
            let mut tasks = backend.read_tasks()?;
            if let Some(list) = list {
                tasks.retain(|t| t.list_id == list);
            }
            let human = tasks
                .iter()
                .map(|t| {
                    let marker = if t.is_completed { "x" } else { " " };
                    format!("[{marker}] {}  {}", t.id, t.title)
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Output::new(
                json!({"count": tasks.len(), "tasks": tasks}),
                if human.is_empty() { "No tasks".to_string() } else { human },
            ))
        }
        TaskCommands::Done { id } => {
            let mut tasks = backend.read_tasks()?;
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::NotFound(format!("task {id}")))?;
            task.is_completed = true;
            task.completed_at = Some(Utc::now());
            let (task_id, list_id, title) =
                (task.id.clone(), task.list_id.clone(), task.title.clone());
            backend.save_tasks(&tasks)?;

            // Completion also lands in the event stream.
            let event = Event::new(EventPayload::TaskCompleted {
                task_id: task_id.clone(),
                project_id: Some(list_id),
                completion_notes: None,
            })
            .ensure_metadata();
            backend.append_event(&event)?;

            Ok(Output::new(
                json!({"done": task_id, "event": event.id}),
                format!("Completed task '{title}'"),
            ))
        }
    }
}

fn cmd_mood(backend_flag: Option<String>, command: MoodCommands) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    match command {
        MoodCommands::Add { score, slot, note } => {
            let slot = MoodSlot::parse(&slot)
                .ok_or_else(|| Error::InvalidInput(format!("invalid mood slot: {slot}")))?;
            let mut entries = backend.read_mood_entries()?;
            let mut entry = MoodEntry::new(slot, score);
            entry.note = note;
            entries.push(entry.clone());
            backend.save_mood_entries(&entries)?;
            Ok(Output::new(
                json!({"entry": entry}),
                format!("Recorded {} mood {}", entry.slot.as_str(), entry.score),
            ))
        }
        MoodCommands::List => {
            let entries = backend.read_mood_entries()?;
            let human = entries
                .iter()
                .map(|e| format!("{}  {:<7} {}", e.recorded_at.to_rfc3339(), e.slot.as_str(), e.score))
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Output::new(
                json!({"count": entries.len(), "entries": entries}),
                if human.is_empty() { "No mood entries".to_string() } else { human },
            ))
        }
    }
}

fn cmd_sleep(backend_flag: Option<String>, command: SleepCommands) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    match command {
        SleepCommands::Add {
            start,
            end,
            source,
            quality,
            note,
        } => {
            let source = SleepSource::parse(&source)
                .ok_or_else(|| Error::InvalidInput(format!("invalid sleep source: {source}")))?;
            let quality = quality
                .map(|raw| {
                    SleepQuality::parse(&raw)
                        .ok_or_else(|| Error::InvalidInput(format!("invalid sleep quality: {raw}")))
                })
                .transpose()?;
            let started_at = parse_ts(&start)?;
            let ended_at = parse_ts(&end)?;
            if ended_at <= started_at {
                return Err(Error::InvalidInput(
                    "sleep session must end after it starts".to_string(),
                ));
            }
            let mut sessions = backend.read_sleep_sessions()?;
            let mut session = SleepSession::new(started_at, ended_at, source);
            session.quality = quality;
            session.note = note;
            sessions.push(session.clone());
            backend.save_sleep_sessions(&sessions)?;
            Ok(Output::new(
                json!({"session": session}),
                format!("Recorded sleep session {}", session.id),
            ))
        }
        SleepCommands::List => {
            let sessions = backend.read_sleep_sessions()?;
            let human = sessions
                .iter()
                .map(|s| {
                    format!(
                        "{} -> {}  {}",
                        s.started_at.to_rfc3339(),
                        s.ended_at.to_rfc3339(),
                        s.source.as_str()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Output::new(
                json!({"count": sessions.len(), "sessions": sessions}),
                if human.is_empty() { "No sleep sessions".to_string() } else { human },
            ))
        }
    }
}

fn cmd_sync(backend_flag: Option<String>) -> Result<Output> {
    let plugin = active_plugin(backend_flag)?;
    if plugin.id != "sqlite" {
        return Ok(Output::new(
            json!({"synced": 0}),
            "Nothing to sync: this backend writes events directly".to_string(),
        ));
    }
    let synced = open_sqlite()?.sync_outbox()?;
    Ok(Output::new(
        json!({"synced": synced}),
        format!("Synced {synced} events to the JSONL mirror"),
    ))
}

fn cmd_export(
    backend_flag: Option<String>,
    output: Option<std::path::PathBuf>,
) -> Result<Output> {
    let backend = open_backend(backend_flag)?;
    let files: Vec<_> = backend
        .export_files()?
        .into_iter()
        .filter(|f| f.exists())
        .collect();

    let Some(archive_path) = output else {
        let listed: Vec<_> = files.iter().map(|f| f.display().to_string()).collect();
        return Ok(Output::new(
            json!({"count": listed.len(), "files": listed}),
            listed.join("\n"),
        ));
    };

    let archive = File::create(&archive_path)?;
    let encoder = flate2::write::GzEncoder::new(archive, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for file in &files {
        let name = file
            .file_name()
            .ok_or_else(|| Error::Other(format!("unexpected export path: {}", file.display())))?;
        builder.append_path_with_name(file, name)?;
    }
    builder.into_inner()?.finish()?;

    Ok(Output::new(
        json!({"archive": archive_path.display().to_string(), "count": files.len()}),
        format!("Exported {} files to {}", files.len(), archive_path.display()),
    ))
}

fn cmd_plugin(command: PluginCommands) -> Result<Output> {
    match command {
        PluginCommands::List => {
            let default_id = default_plugin().id;
            let listed: Vec<_> = plugins()
                .iter()
                .map(|p| {
                    json!({
                        "id": p.id,
                        "name": p.display_name,
                        "description": p.description,
                        "default": p.id == default_id,
                    })
                })
                .collect();
            let human = plugins()
                .iter()
                .map(|p| {
                    let marker = if p.id == default_id { " (default)" } else { "" };
                    format!("{:<8} {}{} - {}", p.id, p.display_name, marker, p.description)
                })
                .collect::<Vec<_>>()
                .join("\n");
            Ok(Output::new(json!({"plugins": listed}), human))
        }
    }
}

fn cmd_location(command: LocationCommands) -> Result<Output> {
    let location = StorageLocation::from_config();
    match command {
        LocationCommands::Get => {
            let dir = location.resolve()?;
            Ok(Output::new(
                json!({"location": dir.display().to_string()}),
                dir.display().to_string(),
            ))
        }
        LocationCommands::Set { path } => {
            let dir = location.set(&path)?;
            Ok(Output::new(
                json!({"location": dir.display().to_string()}),
                format!("Storage location set to {}", dir.display()),
            ))
        }
    }
}

fn cmd_version() -> Output {
    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("DL_GIT_COMMIT");
    let built_at = env!("DL_BUILD_TIMESTAMP");
    Output::new(
        json!({"version": version, "commit": commit, "built_at": built_at}),
        format!("daylog {version} ({commit}, built {built_at})"),
    )
}
