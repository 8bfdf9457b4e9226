//! CLI argument definitions for daylog.

use clap::{Parser, Subcommand};

/// Daylog - personal life tracking from the command line.
#[derive(Parser, Debug)]
#[command(name = "dl")]
#[command(author, version, about = "Track habits, tasks, mood and sleep", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Storage plugin to use (overrides the configured default).
    /// Can also be set via the DAYLOG_BACKEND environment variable.
    #[arg(short = 'b', long = "backend", global = true, env = "DAYLOG_BACKEND")]
    pub backend: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record an event in the stream
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },

    /// Read events, optionally filtered by date range and type
    Events {
        /// Range start (RFC 3339, inclusive). Defaults to the epoch.
        #[arg(long)]
        from: Option<String>,
        /// Range end (RFC 3339, inclusive). Defaults to now.
        #[arg(long)]
        to: Option<String>,
        /// Event type filter (habit, task, quick, pomodoro)
        #[arg(long = "type")]
        event_type: Option<String>,
    },

    /// Per-type event counts for a date range
    Stats {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },

    /// Habit management commands
    Habit {
        #[command(subcommand)]
        command: HabitCommands,
    },

    /// Quick-log tag management commands
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },

    /// Task list management commands
    List {
        #[command(subcommand)]
        command: ListCommands,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Mood tracking commands
    Mood {
        #[command(subcommand)]
        command: MoodCommands,
    },

    /// Sleep tracking commands
    Sleep {
        #[command(subcommand)]
        command: SleepCommands,
    },

    /// Drain the outbox: replay pending events to the JSONL mirror
    Sync,

    /// Bundle all data files into a .tar.gz archive (or list them)
    Export {
        /// Archive to write; with no value the export paths are listed
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Storage plugin commands
    Plugin {
        #[command(subcommand)]
        command: PluginCommands,
    },

    /// Show or change the flat-file storage directory
    Location {
        #[command(subcommand)]
        command: LocationCommands,
    },

    /// Show version and build information
    Version,
}

#[derive(Subcommand, Debug)]
pub enum LogCommands {
    /// Record a habit completion
    Habit {
        habit_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a task completion
    Task {
        task_id: String,
        #[arg(long)]
        project: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a quick log
    Quick {
        tag: String,
        #[arg(long)]
        value: Option<f64>,
        #[arg(long)]
        context: Option<String>,
    },
    /// Record a completed pomodoro session
    Pomodoro {
        /// Focus duration in seconds
        #[arg(long)]
        focus_secs: u32,
        /// What the session was for (none, task, habit)
        #[arg(long, default_value = "none")]
        target_type: String,
        #[arg(long)]
        target_id: Option<String>,
        #[arg(long)]
        break_secs: Option<u32>,
        /// Session start (RFC 3339); defaults to focus_secs before the end
        #[arg(long)]
        started_at: Option<String>,
        /// Session end (RFC 3339); defaults to now
        #[arg(long)]
        ended_at: Option<String>,
        #[arg(long)]
        interrupted: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum HabitCommands {
    /// Create a habit
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        icon: Option<String>,
    },
    /// List habits
    List,
    /// Archive a habit
    Archive { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TagCommands {
    /// Create a quick-log tag
    Add {
        name: String,
        /// Value kind (numeric, boolean, scale)
        #[arg(long = "type", default_value = "numeric")]
        log_type: String,
        #[arg(long)]
        unit: Option<String>,
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
    },
    /// List quick-log tags
    List,
}

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// Create a task list
    Add { name: String },
    /// List task lists
    List,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Create a task
    Add {
        title: String,
        /// Task list id the task belongs to
        #[arg(long)]
        list: String,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        important: bool,
        /// Due date (yyyy-mm-dd)
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        my_day: bool,
    },
    /// List tasks, optionally for one list
    List {
        #[arg(long)]
        list: Option<String>,
    },
    /// Complete a task (also records a task-completed event)
    Done { id: String },
}

#[derive(Subcommand, Debug)]
pub enum MoodCommands {
    /// Record a mood entry
    Add {
        /// Score, e.g. 1-5
        score: i32,
        /// Day slot (morning, noon, night)
        #[arg(long)]
        slot: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// List mood entries (newest first)
    List,
}

#[derive(Subcommand, Debug)]
pub enum SleepCommands {
    /// Record a sleep session
    Add {
        /// Session start (RFC 3339)
        #[arg(long)]
        start: String,
        /// Session end (RFC 3339)
        #[arg(long)]
        end: String,
        /// Origin (manual, device, health)
        #[arg(long, default_value = "manual")]
        source: String,
        /// Assessment (poor, okay, good)
        #[arg(long)]
        quality: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// List sleep sessions (newest first)
    List,
}

#[derive(Subcommand, Debug)]
pub enum PluginCommands {
    /// List registered storage plugins
    List,
}

#[derive(Subcommand, Debug)]
pub enum LocationCommands {
    /// Show the resolved flat-file directory
    Get,
    /// Set the flat-file directory, migrating existing data files
    Set { path: std::path::PathBuf },
}
