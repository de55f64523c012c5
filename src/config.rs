//! Remote store configuration: an owned service object rather than
//! ambient globals. Consumers read through `get` or hold a `subscribe`
//! receiver; `set` persists and fans the change out to every subscriber.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub key: String,
}

impl RemoteConfig {
    /// Credentials baked into the build, applied when nothing usable is
    /// stored yet.
    pub fn built_in_default() -> Self {
        RemoteConfig {
            url: "https://example.supabase.co".into(),
            key: "public-anon-key".into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.url.is_empty() || self.key.is_empty()
    }
}

pub struct ConfigService {
    conn: Connection,
    tx: watch::Sender<RemoteConfig>,
}

impl ConfigService {
    /// Open over its own DB connection. The built-in default is written
    /// whenever nothing is stored or the stored value does not match it,
    /// so a stale deployment picks up rotated credentials on restart.
    pub fn open(conn: Connection) -> Result<Self> {
        crate::db::init_schema(&conn)?;
        let default = RemoteConfig::built_in_default();
        let cfg = match crate::db::load_config(&conn)? {
            Some(stored) if stored == default => stored,
            _ => {
                crate::db::save_config(&conn, &default)?;
                info!("seeded built-in remote config");
                default
            }
        };
        let (tx, _) = watch::channel(cfg);
        Ok(ConfigService { conn, tx })
    }

    pub fn get(&self) -> RemoteConfig {
        self.tx.borrow().clone()
    }

    /// Persist and notify all subscribers.
    pub fn set(&self, cfg: RemoteConfig) -> Result<()> {
        crate::db::save_config(&self.conn, &cfg)?;
        self.tx.send_replace(cfg);
        Ok(())
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoteConfig> {
        self.tx.subscribe()
    }
}
