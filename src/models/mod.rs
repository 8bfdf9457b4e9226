//! Data models for daylog entities.
//!
//! This module defines the core data structures:
//! - `Event` - Immutable facts in the append-only event stream
//! - `Habit` / `QuickLogTag` - Definitions for recurring and ad-hoc logging
//! - `TaskList` / `Task` - To-do data
//! - `MoodEntry` / `SleepSession` - Wellness data
//!
//! Mutable entities are identified by stable string ids and are always
//! persisted as complete collections (replace-all saves). Events are
//! append-only and never mutated.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type discriminator, stored alongside each event row for
/// indexed type-filtered queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    HabitCompleted,
    TaskCompleted,
    QuickLog,
    PomodoroCompleted,
}

impl EventType {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "habit_completed" | "habit" => Some(Self::HabitCompleted),
            "task_completed" | "task" => Some(Self::TaskCompleted),
            "quick_log" | "quick" => Some(Self::QuickLog),
            "pomodoro_completed" | "pomodoro" => Some(Self::PomodoroCompleted),
            _ => None,
        }
    }

    /// Get the string representation (matches the serialized form).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HabitCompleted => "habit_completed",
            Self::TaskCompleted => "task_completed",
            Self::QuickLog => "quick_log",
            Self::PomodoroCompleted => "pomodoro_completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a pomodoro session was focused on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroTarget {
    #[default]
    None,
    Task,
    Habit,
}

impl PomodoroTarget {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "task" => Some(Self::Task),
            "habit" => Some(Self::Habit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Task => "task",
            Self::Habit => "habit",
        }
    }
}

/// Event payloads, one variant per event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    HabitCompleted {
        habit_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    TaskCompleted {
        task_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completion_notes: Option<String>,
    },
    QuickLog {
        tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
    PomodoroCompleted {
        #[serde(default)]
        target_type: PomodoroTarget,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<String>,
        focus_duration_seconds: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        break_duration_seconds: Option<u32>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        #[serde(default)]
        interrupted: bool,
    },
}

impl EventPayload {
    /// The type discriminator for this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::HabitCompleted { .. } => EventType::HabitCompleted,
            Self::TaskCompleted { .. } => EventType::TaskCompleted,
            Self::QuickLog { .. } => EventType::QuickLog,
            Self::PomodoroCompleted { .. } => EventType::PomodoroCompleted,
        }
    }
}

/// Derived metadata attached to events for filtering and aggregation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl EventMetadata {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.details.is_empty()
    }
}

/// Immutable event recorded in the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// When the fact occurred
    pub timestamp: DateTime<Utc>,

    /// Which surface recorded the event
    #[serde(default = "default_source")]
    pub source: String,

    /// Discriminated payload
    pub payload: EventPayload,

    /// Derived metadata; populated once and never recomputed
    #[serde(default)]
    pub metadata: EventMetadata,
}

fn default_source() -> String {
    "cli".to_string()
}

impl Event {
    /// Create a new event for the given payload, stamped now.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source: default_source(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// The type discriminator for this event.
    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Populate derived metadata if missing.
    ///
    /// Invariant: metadata is derived at most once. Legacy records without
    /// metadata get it filled in from the payload on first read; records
    /// that already carry metadata are returned untouched.
    pub fn ensure_metadata(mut self) -> Self {
        if !self.metadata.is_empty() {
            return self;
        }
        self.metadata = derive_metadata(&self.payload);
        self
    }
}

fn derive_metadata(payload: &EventPayload) -> EventMetadata {
    let mut tags = Vec::new();
    let mut details = BTreeMap::new();
    let mut detail = |key: &str, value: Option<String>| {
        if let Some(v) = value {
            details.insert(key.to_string(), v);
        }
    };

    match payload {
        EventPayload::HabitCompleted { habit_id, notes } => {
            tags.push("habit".to_string());
            tags.push(habit_id.clone());
            detail("habitId", Some(habit_id.clone()));
            detail("notes", notes.clone());
        }
        EventPayload::TaskCompleted {
            task_id,
            project_id,
            completion_notes,
        } => {
            tags.push("task".to_string());
            tags.push(task_id.clone());
            if let Some(project) = project_id {
                tags.push(project.clone());
            }
            detail("taskId", Some(task_id.clone()));
            detail("projectId", project_id.clone());
            detail("notes", completion_notes.clone());
        }
        EventPayload::QuickLog {
            tag,
            value,
            context,
        } => {
            tags.push("quick-log".to_string());
            tags.push(tag.clone());
            detail("tag", Some(tag.clone()));
            detail("value", value.map(|v| v.to_string()));
            detail("context", context.clone());
        }
        EventPayload::PomodoroCompleted {
            target_type,
            target_id,
            focus_duration_seconds,
            break_duration_seconds,
            started_at,
            ended_at,
            interrupted,
        } => {
            tags.push("pomodoro".to_string());
            tags.push(target_type.as_str().to_string());
            if let Some(target) = target_id {
                tags.push(target.clone());
            }
            detail("targetType", Some(target_type.as_str().to_string()));
            detail("targetId", target_id.clone());
            detail("focusSeconds", Some(focus_duration_seconds.to_string()));
            detail("breakSeconds", break_duration_seconds.map(|s| s.to_string()));
            detail("startedAt", Some(started_at.to_rfc3339()));
            detail("endedAt", Some(ended_at.to_rfc3339()));
            detail("interrupted", Some(interrupted.to_string()));
        }
    }

    EventMetadata { tags, details }
}

/// Habit definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_habit_color")]
    pub color: String,
    #[serde(default = "default_habit_icon")]
    pub icon: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_archived: bool,
}

fn default_habit_color() -> String {
    "#6200EE".to_string()
}

fn default_habit_icon() -> String {
    "\u{1F4AA}".to_string()
}

impl Habit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            color: default_habit_color(),
            icon: default_habit_icon(),
            created_at: Utc::now(),
            is_archived: false,
        }
    }
}

/// Value kind captured by a quick-log tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    Numeric,
    Boolean,
    Scale,
}

impl LogType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "numeric" => Some(Self::Numeric),
            "boolean" | "bool" => Some(Self::Boolean),
            "scale" => Some(Self::Scale),
            _ => None,
        }
    }
}

/// Quick log tags let users capture frequently used metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickLogTag {
    pub id: String,
    pub name: String,
    pub log_type: LogType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl QuickLogTag {
    pub fn new(name: impl Into<String>, log_type: LogType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            log_type,
            unit: None,
            min: None,
            max: None,
            created_at: Utc::now(),
        }
    }
}

/// A named list that groups tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub name: String,
    #[serde(default = "default_list_icon")]
    pub icon: String,
    #[serde(default = "default_list_color")]
    pub color: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub sort_order: i64,
}

fn default_list_icon() -> String {
    "\u{1F4DD}".to_string()
}

fn default_list_color() -> String {
    "#2196F3".to_string()
}

impl TaskList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            icon: default_list_icon(),
            color: default_list_color(),
            created_at: Utc::now(),
            is_archived: false,
            sort_order: 0,
        }
    }
}

/// Sub-task belonging to a parent task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub is_completed: bool,
}

/// Supported repeat rules for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskRepeatRule {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl TaskRepeatRule {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// A to-do item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub list_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_important: bool,
    /// Calendar date the task is due (no time component)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_in_my_day: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<TaskStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_rule: Option<TaskRepeatRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_detail: Option<String>,
}

impl Task {
    pub fn new(list_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            list_id: list_id.into(),
            title: title.into(),
            notes: None,
            is_completed: false,
            is_important: false,
            due_date: None,
            reminder_time: None,
            is_in_my_day: false,
            created_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
            repeat_rule: None,
            repeat_detail: None,
        }
    }
}

/// Day partition used when collecting mood samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodSlot {
    Morning,
    Noon,
    Night,
}

impl MoodSlot {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "morning" => Some(Self::Morning),
            "noon" => Some(Self::Noon),
            "night" => Some(Self::Night),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Noon => "noon",
            Self::Night => "night",
        }
    }
}

/// Mood tracking entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub slot: MoodSlot,
    pub score: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl MoodEntry {
    pub fn new(slot: MoodSlot, score: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            slot,
            score,
            note: None,
            tags: Vec::new(),
        }
    }
}

/// Origin of a recorded sleep session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepSource {
    Manual,
    DeviceUsage,
    HealthConnect,
}

impl SleepSource {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "device_usage" | "device" => Some(Self::DeviceUsage),
            "health_connect" | "health" => Some(Self::HealthConnect),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::DeviceUsage => "device_usage",
            Self::HealthConnect => "health_connect",
        }
    }
}

/// Qualitative assessment recorded alongside a sleep session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SleepQuality {
    Poor,
    Okay,
    Good,
}

impl SleepQuality {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "poor" => Some(Self::Poor),
            "okay" => Some(Self::Okay),
            "good" => Some(Self::Good),
            _ => None,
        }
    }
}

/// Sleep session captured manually or imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub source: SleepSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<SleepQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SleepSession {
    pub fn new(started_at: DateTime<Utc>, ended_at: DateTime<Utc>, source: SleepSource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at,
            ended_at,
            source,
            quality: None,
            note: None,
            tags: Vec::new(),
        }
    }
}
