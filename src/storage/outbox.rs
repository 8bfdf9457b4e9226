//! Outbox relay: mirrors events from SQLite to the JSONL backend.
//!
//! Every event append writes a `json_outbox` row in the same transaction as
//! the event itself (see [`crate::storage::sqlite`]). This module drains
//! those rows oldest-first in capped batches, appending each payload to the
//! flat-file store and stamping it processed. Failures leave the remaining
//! rows pending; they are durable and retried on the next run, so the
//! mirror is eventually consistent with the database.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use rusqlite::{Connection, params};

use crate::Result;
use crate::models::Event;
use crate::storage::backend::StorageBackend;
use crate::storage::jsonl::JsonlStorage;
use crate::storage::logger::StorageLogger;
use crate::storage::sqlite::{Database, PLUGIN_ID};

/// Most records one relay pass will replay.
pub const MAX_BATCH: usize = 128;

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// A pending outbox record.
struct OutboxRow {
    id: String,
    payload_json: String,
}

/// Enqueue a pending record. Must run inside the same transaction as the
/// event insert it accompanies.
pub(crate) fn insert_pending(
    conn: &Connection,
    id: &str,
    payload_json: &str,
    created_ms: i64,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO json_outbox (id, payload_json, created_at, processed_at)
         VALUES (?1, ?2, ?3, NULL)",
        params![id, payload_json, created_ms],
    )?;
    Ok(())
}

fn pending_batch(conn: &Connection, limit: usize) -> Result<Vec<OutboxRow>> {
    let mut stmt = conn.prepare(
        // rowid breaks ties so same-millisecond appends keep insertion order
        "SELECT id, payload_json FROM json_outbox
         WHERE processed_at IS NULL
         ORDER BY created_at ASC, rowid ASC
         LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit], |row| {
        Ok(OutboxRow {
            id: row.get(0)?,
            payload_json: row.get(1)?,
        })
    })?;
    rows.map(|r| r.map_err(Into::into)).collect()
}

fn mark_processed(conn: &Connection, id: &str, processed_ms: i64) -> Result<()> {
    conn.execute(
        "UPDATE json_outbox SET processed_at = ?1 WHERE id = ?2",
        params![processed_ms, id],
    )?;
    Ok(())
}

/// Replay one batch of pending records to the JSONL store.
///
/// Returns the number of records processed. An error aborts the batch:
/// records already stamped processed stay processed, the rest are retried
/// on a later run.
pub fn sync_once(db: &Database, jsonl: &JsonlStorage, logger: &dyn StorageLogger) -> Result<usize> {
    let pending = {
        let conn = db.lock();
        pending_batch(&conn, MAX_BATCH)?
    };
    if pending.is_empty() {
        return Ok(0);
    }

    for row in &pending {
        let event: Event = serde_json::from_str(&row.payload_json)?;
        jsonl.append_event(&event.ensure_metadata())?;
        let conn = db.lock();
        mark_processed(&conn, &row.id, Utc::now().timestamp_millis())?;
    }

    logger.info(PLUGIN_ID, &format!("synced {} events to JSONL", pending.len()));
    Ok(pending.len())
}

/// Drain batch after batch until fewer than [`MAX_BATCH`] records remain
/// to process. Returns the total processed.
pub fn drain(db: &Database, jsonl: &JsonlStorage, logger: &dyn StorageLogger) -> Result<usize> {
    let mut total = 0;
    loop {
        let processed = sync_once(db, jsonl, logger)?;
        total += processed;
        if processed < MAX_BATCH {
            return Ok(total);
        }
    }
}

/// Schedules relay runs on a dedicated worker thread.
///
/// `schedule` is safe to call from any thread and at any rate: a pending
/// flag collapses bursts into a single queued run, so at most one relay job
/// is ever waiting. Dropping the scheduler lets the worker finish queued
/// work, then joins it.
pub struct OutboxScheduler {
    pending: Arc<AtomicBool>,
    tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl OutboxScheduler {
    /// Spawn the background worker.
    pub fn spawn(db: Database, jsonl: JsonlStorage, logger: Arc<dyn StorageLogger>) -> Self {
        let pending = Arc::new(AtomicBool::new(false));
        let flag = pending.clone();
        let (tx, rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            while rx.recv().is_ok() {
                flag.store(false, Ordering::Release);
                run_with_retry(&db, &jsonl, logger.as_ref());
            }
        });
        Self {
            pending,
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// No background worker; the owner drives the relay explicitly
    /// (tests, one-shot `dl sync` style callers).
    pub fn disabled() -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            tx: None,
            worker: None,
        }
    }

    /// Request a relay run. Idempotent while a run is already queued.
    pub fn schedule(&self) {
        let Some(tx) = &self.tx else { return };
        if self.pending.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = tx.send(());
    }
}

impl Drop for OutboxScheduler {
    fn drop(&mut self) {
        // Disconnect the channel; the worker drains queued wakeups first.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_with_retry(db: &Database, jsonl: &JsonlStorage, logger: &dyn StorageLogger) {
    let mut delay = INITIAL_BACKOFF;
    let mut attempts = 0;
    loop {
        match sync_once(db, jsonl, logger) {
            Ok(n) if n < MAX_BATCH => return,
            Ok(_) => continue,
            Err(e) => {
                attempts += 1;
                if attempts >= MAX_ATTEMPTS {
                    logger.error(
                        PLUGIN_ID,
                        "outbox sync failed; leaving records pending",
                        Some(&e),
                    );
                    return;
                }
                logger.error(PLUGIN_ID, "outbox sync failed; retrying", Some(&e));
                thread::sleep(delay);
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }
}
