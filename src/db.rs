//! Local durable store: one keyed slot for the last full batch of merged
//! records, plus the remote configuration row. The local write path must
//! never lose data when the remote store is unreachable.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::config::RemoteConfig;
use crate::model::DetailRecord;

const DB_PATH: &str = "data/gigs.sqlite";
const BATCH_SLOT: &str = "last_batch";

pub fn connect() -> Result<Connection> {
    connect_at(Path::new(DB_PATH))
}

pub fn connect_at(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS gig_cache (
            slot       TEXT PRIMARY KEY,
            payload    TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS remote_config (
            id         INTEGER PRIMARY KEY CHECK (id = 1),
            url        TEXT NOT NULL,
            key        TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Batch cache ──

/// Overwrite the cached batch wholesale.
pub fn save_batch(conn: &Connection, records: &[DetailRecord]) -> Result<()> {
    let payload = serde_json::to_string(records)?;
    conn.execute(
        "INSERT OR REPLACE INTO gig_cache (slot, payload, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        rusqlite::params![BATCH_SLOT, payload],
    )?;
    Ok(())
}

pub fn load_batch(conn: &Connection) -> Result<Vec<DetailRecord>> {
    let payload: Option<String> = conn
        .query_row(
            "SELECT payload FROM gig_cache WHERE slot = ?1",
            rusqlite::params![BATCH_SLOT],
            |r| r.get(0),
        )
        .optional()?;
    match payload {
        Some(json) => serde_json::from_str(&json).context("Corrupt cached batch"),
        None => Ok(Vec::new()),
    }
}

pub struct CacheInfo {
    pub count: usize,
    pub updated_at: Option<String>,
}

pub fn cache_info(conn: &Connection) -> Result<CacheInfo> {
    let updated_at: Option<String> = conn
        .query_row(
            "SELECT updated_at FROM gig_cache WHERE slot = ?1",
            rusqlite::params![BATCH_SLOT],
            |r| r.get(0),
        )
        .optional()?;
    let count = load_batch(conn)?.len();
    Ok(CacheInfo { count, updated_at })
}

// ── Remote configuration ──

pub fn save_config(conn: &Connection, cfg: &RemoteConfig) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO remote_config (id, url, key, updated_at)
         VALUES (1, ?1, ?2, datetime('now'))",
        rusqlite::params![cfg.url, cfg.key],
    )?;
    Ok(())
}

pub fn load_config(conn: &Connection) -> Result<Option<RemoteConfig>> {
    let row = conn
        .query_row("SELECT url, key FROM remote_config WHERE id = 1", [], |r| {
            Ok(RemoteConfig {
                url: r.get(0)?,
                key: r.get(1)?,
            })
        })
        .optional()?;
    Ok(row)
}
