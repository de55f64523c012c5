//! Remote gig store over a PostgREST-style HTTP API.
//!
//! The trait seam exists so the sync layer can be exercised against an
//! in-memory store; `RestRemote` is the production implementation and
//! reads the live `RemoteConfig` on every request, so credential changes
//! apply without rebuilding the client.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::model::DetailRecord;

const TABLE: &str = "gigs";

/// Flattened row shape for the remote table. Nested sections are stored
/// as JSON-encoded text columns so the table stays wide and queryable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteGigRow {
    pub user_id: String,
    pub url: String,
    pub title: Option<String>,
    pub overview_title: Option<String>,
    pub overview_description: Option<String>,
    pub tags: String,
    pub images: String,
    pub packages: String,
    pub description_content: Option<String>,
    pub faq: String,
    pub requirements: String,
    pub gallery_images: String,
    pub gallery_videos: String,
    pub seller_name: Option<String>,
    pub seller_rating: Option<String>,
    pub error: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl RemoteGigRow {
    pub fn from_record(record: &DetailRecord, owner: &str) -> Self {
        fn json<T: Serialize>(v: &T) -> String {
            serde_json::to_string(v).unwrap_or_default()
        }
        RemoteGigRow {
            user_id: owner.to_string(),
            url: record.url.clone().unwrap_or_default(),
            title: record.title.clone(),
            overview_title: record.overview.title.clone(),
            overview_description: record.overview.description.clone(),
            tags: json(&record.overview.tags),
            images: json(&record.overview.images),
            packages: json(&record.pricing_packages),
            description_content: record.description_faq.description.clone(),
            faq: json(&record.description_faq.faq),
            requirements: json(&record.requirements),
            gallery_images: json(&record.gallery.images),
            gallery_videos: json(&record.gallery.videos),
            seller_name: record.seller.name.clone(),
            seller_rating: record.seller.rating.clone(),
            error: record.error.clone(),
            scraped_at: record.scraped_at,
        }
    }
}

#[async_trait]
pub trait RemoteGigs: Send + Sync {
    /// Lightweight read used purely to test reachability and credentials.
    async fn probe(&self) -> Result<()>;
    async fn delete_by_key(&self, owner: &str, url: &str) -> Result<()>;
    async fn insert(&self, row: &RemoteGigRow) -> Result<()>;
    async fn fetch_owned(&self, owner: &str) -> Result<Vec<RemoteGigRow>>;
}

pub struct RestRemote {
    client: reqwest::Client,
    config: watch::Receiver<RemoteConfig>,
}

impl RestRemote {
    pub fn new(config: watch::Receiver<RemoteConfig>) -> Self {
        RestRemote {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn current(&self) -> Result<RemoteConfig> {
        let cfg = self.config.borrow().clone();
        if cfg.is_empty() {
            bail!("remote configuration missing");
        }
        Ok(cfg)
    }

    fn endpoint(cfg: &RemoteConfig) -> String {
        format!("{}/rest/v1/{}", cfg.url.trim_end_matches('/'), TABLE)
    }

    fn authed(&self, req: reqwest::RequestBuilder, cfg: &RemoteConfig) -> reqwest::RequestBuilder {
        req.header("apikey", &cfg.key)
            .header("Authorization", format!("Bearer {}", cfg.key))
            .header("Content-Type", "application/json")
    }
}

#[async_trait]
impl RemoteGigs for RestRemote {
    async fn probe(&self) -> Result<()> {
        let cfg = self.current()?;
        let resp = self
            .authed(self.client.get(Self::endpoint(&cfg)), &cfg)
            .query(&[("select", "count")])
            .send()
            .await
            .context("Remote probe failed")?;
        resp.error_for_status().context("Remote probe rejected")?;
        Ok(())
    }

    async fn delete_by_key(&self, owner: &str, url: &str) -> Result<()> {
        let cfg = self.current()?;
        let resp = self
            .authed(self.client.delete(Self::endpoint(&cfg)), &cfg)
            .header("Prefer", "return=minimal")
            .query(&[
                ("user_id", format!("eq.{owner}")),
                ("url", format!("eq.{url}")),
            ])
            .send()
            .await
            .with_context(|| format!("Delete failed for {url}"))?;
        resp.error_for_status()
            .with_context(|| format!("Delete rejected for {url}"))?;
        Ok(())
    }

    async fn insert(&self, row: &RemoteGigRow) -> Result<()> {
        let cfg = self.current()?;
        let resp = self
            .authed(self.client.post(Self::endpoint(&cfg)), &cfg)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .with_context(|| format!("Insert failed for {}", row.url))?;
        resp.error_for_status()
            .with_context(|| format!("Insert rejected for {}", row.url))?;
        Ok(())
    }

    async fn fetch_owned(&self, owner: &str) -> Result<Vec<RemoteGigRow>> {
        let cfg = self.current()?;
        let resp = self
            .authed(self.client.get(Self::endpoint(&cfg)), &cfg)
            .query(&[("user_id", format!("eq.{owner}")), ("select", "*".into())])
            .send()
            .await
            .context("Fetch failed")?;
        let rows = resp
            .error_for_status()
            .context("Fetch rejected")?
            .json::<Vec<RemoteGigRow>>()
            .await
            .context("Fetch returned malformed rows")?;
        Ok(rows)
    }
}

/// Process-wide connectivity state, refreshed by every probe.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

pub struct RemoteService {
    remote: Box<dyn RemoteGigs>,
    status: Mutex<ConnectionStatus>,
    config: Mutex<watch::Receiver<RemoteConfig>>,
}

impl RemoteService {
    /// Starts disconnected; call `check` before relying on `status`.
    pub fn new(remote: Box<dyn RemoteGigs>, config: watch::Receiver<RemoteConfig>) -> Self {
        RemoteService {
            remote,
            status: Mutex::new(ConnectionStatus::default()),
            config: Mutex::new(config),
        }
    }

    /// Probe the store and record the outcome.
    pub async fn check(&self) -> ConnectionStatus {
        let result = self.remote.probe().await;
        let status = ConnectionStatus {
            connected: result.is_ok(),
            last_checked: Some(Utc::now()),
            error: result.err().map(|e| format!("{e:#}")),
        };
        debug!(connected = status.connected, "remote probe");
        *self.status.lock().unwrap() = status.clone();
        status
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.lock().unwrap().clone()
    }

    /// Current status, re-probing first when the configuration changed
    /// since the last look.
    pub async fn refresh(&self) -> ConnectionStatus {
        let changed = {
            let mut rx = self.config.lock().unwrap();
            let changed = rx.has_changed().unwrap_or(false);
            if changed {
                rx.borrow_and_update();
            }
            changed
        };
        if changed {
            self.reset();
            return self.check().await;
        }
        self.status()
    }

    /// Forget the last probe outcome, e.g. after a configuration change.
    pub fn reset(&self) {
        *self.status.lock().unwrap() = ConnectionStatus::default();
    }

    pub fn gigs(&self) -> &dyn RemoteGigs {
        self.remote.as_ref()
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// In-memory store for sync tests. `fail_inserts` makes every insert
    /// error without touching the stored rows.
    #[derive(Default)]
    pub struct FakeRemote {
        pub rows: Mutex<Vec<RemoteGigRow>>,
        pub reachable: std::sync::atomic::AtomicBool,
        pub fail_inserts: std::sync::atomic::AtomicBool,
    }

    impl FakeRemote {
        pub fn reachable() -> Self {
            let fake = FakeRemote::default();
            fake.reachable
                .store(true, std::sync::atomic::Ordering::SeqCst);
            fake
        }
    }

    #[async_trait]
    impl RemoteGigs for FakeRemote {
        async fn probe(&self) -> Result<()> {
            if self.reachable.load(std::sync::atomic::Ordering::SeqCst) {
                Ok(())
            } else {
                bail!("unreachable")
            }
        }

        async fn delete_by_key(&self, owner: &str, url: &str) -> Result<()> {
            self.rows
                .lock()
                .unwrap()
                .retain(|r| !(r.user_id == owner && r.url == url));
            Ok(())
        }

        async fn insert(&self, row: &RemoteGigRow) -> Result<()> {
            if self.fail_inserts.load(std::sync::atomic::Ordering::SeqCst) {
                bail!("insert rejected");
            }
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }

        async fn fetch_owned(&self, owner: &str) -> Result<Vec<RemoteGigRow>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == owner)
                .cloned()
                .collect())
        }
    }

    // Shared-handle form, for tests that flip flags after construction.
    #[async_trait]
    impl RemoteGigs for std::sync::Arc<FakeRemote> {
        async fn probe(&self) -> Result<()> {
            self.as_ref().probe().await
        }

        async fn delete_by_key(&self, owner: &str, url: &str) -> Result<()> {
            self.as_ref().delete_by_key(owner, url).await
        }

        async fn insert(&self, row: &RemoteGigRow) -> Result<()> {
            self.as_ref().insert(row).await
        }

        async fn fetch_owned(&self, owner: &str) -> Result<Vec<RemoteGigRow>> {
            self.as_ref().fetch_owned(owner).await
        }
    }
}
