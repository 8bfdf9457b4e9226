//! Storage layer for daylog data.
//!
//! Two interchangeable backends implement the [`backend::StorageBackend`]
//! contract:
//!
//! - **JSONL backend**: flat files in a user-configurable directory,
//!   append-only `events.jsonl` plus one JSON document per collection.
//! - **SQLite backend** (default): indexed queries over the same entities,
//!   kept consistent with the JSONL files through a transactional outbox
//!   and a background relay. On first read it seeds empty tables from any
//!   existing flat-file data.
//!
//! Backends are selected through the plugin registry in [`backend`].

pub mod backend;
pub mod jsonl;
pub mod location;
pub mod logger;
pub mod outbox;
pub mod sqlite;

pub use backend::{PluginContext, StorageBackend, StoragePlugin, default_plugin, plugin_by_id, plugins};
pub use location::StorageLocation;
pub use logger::{StorageLogger, TracingLogger};
