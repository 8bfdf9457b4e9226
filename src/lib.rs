//! Daylog - a personal life-tracking library with pluggable local storage.
//!
//! This library provides the core functionality for the `dl` CLI tool:
//! event logging (habits, tasks, quick logs, pomodoro sessions), wellness
//! data (mood, sleep), and a storage layer that keeps a SQLite store and a
//! JSONL flat-file mirror consistent through a durable outbox queue.

pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod storage;

/// Library-level error type for daylog operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for daylog operations.
pub type Result<T> = std::result::Result<T, Error>;
