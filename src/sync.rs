//! Sync pipeline: the local cache is the source of truth and is written
//! first, unconditionally. The remote push is best effort on top of it,
//! gated on the last connectivity probe, and idempotent because every
//! record is deleted by its (owner, url) key before re-insertion.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::model::DetailRecord;
use crate::remote::{RemoteGigRow, RemoteService};

/// Pause between remote writes so a large batch does not hammer the store.
const WRITE_PAUSE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Local cache write succeeded.
    pub success: bool,
    /// The remote phase ran without a connectivity failure. Per-record
    /// rejections do not clear this; they surface via `written`/`error`.
    pub synced: bool,
    pub written: usize,
    pub error: Option<String>,
}

pub struct SyncService<'a> {
    conn: &'a Connection,
    remote: &'a RemoteService,
    owner: String,
}

impl<'a> SyncService<'a> {
    pub fn new(conn: &'a Connection, remote: &'a RemoteService, owner: impl Into<String>) -> Self {
        SyncService {
            conn,
            remote,
            owner: owner.into(),
        }
    }

    /// Cache locally, then push each record remotely (delete + insert).
    /// Remote failures never fail the call; they surface in the report.
    pub async fn sync_gigs(&self, records: &[DetailRecord]) -> SyncReport {
        if let Err(e) = crate::db::save_batch(self.conn, records) {
            warn!("Local cache write failed: {e:#}");
            return SyncReport {
                success: false,
                synced: false,
                written: 0,
                error: Some(format!("{e:#}")),
            };
        }

        if !self.remote.refresh().await.connected {
            info!("Remote offline, cached {} gigs locally only", records.len());
            return SyncReport {
                success: true,
                synced: false,
                written: 0,
                error: Some("remote not connected".into()),
            };
        }

        let mut written = 0usize;
        let mut last_err: Option<String> = None;
        for record in records {
            let row = RemoteGigRow::from_record(record, &self.owner);
            if row.url.is_empty() {
                debug!("Skipping record with no url");
                continue;
            }
            if let Err(e) = self.remote.gigs().delete_by_key(&self.owner, &row.url).await {
                debug!("Pre-delete failed for {}: {e:#}", row.url);
            }
            match self.remote.gigs().insert(&row).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!("Remote insert failed for {}: {e:#}", row.url);
                    last_err = Some(format!("{e:#}"));
                }
            }
            tokio::time::sleep(WRITE_PAUSE).await;
        }

        info!("Synced {}/{} gigs to remote", written, records.len());
        SyncReport {
            success: true,
            synced: true,
            written,
            error: last_err,
        }
    }
}
