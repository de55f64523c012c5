//! Boundary to the host automation surface. The pipeline only ever talks
//! to these traits; the real browser driver lives outside this crate. A
//! file-backed replay implementation ships here so the full pipeline can
//! run against saved page snapshots.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::protocol::{Request, Response};

/// One live, possibly still-rendering page.
#[async_trait]
pub trait LivePage: Send + Sync {
    /// Navigate and wait for load completion. A timeout is recoverable:
    /// callers proceed with whatever DOM is present.
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Serialized current DOM.
    async fn snapshot(&self) -> Result<String>;

    /// Scroll position of the best-known scrollable container.
    async fn scroll_offset(&self) -> i64;
    async fn set_scroll_offset(&self, offset: i64);

    async fn current_url(&self) -> String;
}

pub type PageId = u64;

/// Script modules injected into a page before messaging it.
pub const PAGE_MODULES: &[&str] = &["state", "gig_scraper"];

/// Tab-level automation: navigation-complete detection, code injection,
/// request/response messaging with the page context.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn wait_for_navigation(&self, page: PageId, timeout: Duration) -> Result<()>;
    async fn inject(&self, page: PageId, modules: &[&str]) -> Result<()>;
    async fn send(&self, page: PageId, request: &Request) -> Result<Response>;
}

const REINJECT_SETTLE: Duration = Duration::from_millis(400);

/// Messaging wrapper: when the target page has no listener yet (not
/// injected, or navigated away), re-inject and retry exactly once. A
/// second failure propagates to the caller.
pub struct Messenger<'a> {
    browser: &'a dyn Browser,
}

impl<'a> Messenger<'a> {
    pub fn new(browser: &'a dyn Browser) -> Self {
        Messenger { browser }
    }

    pub async fn send(&self, page: PageId, request: &Request) -> Result<Response> {
        match self.browser.send(page, request).await {
            Ok(resp) => Ok(resp),
            Err(first) => {
                debug!("no listener on page {page} ({first}); re-injecting");
                self.browser.inject(page, PAGE_MODULES).await?;
                tokio::time::sleep(REINJECT_SETTLE).await;
                self.browser
                    .send(page, request)
                    .await
                    .context("message failed after re-injection")
            }
        }
    }
}

// ── File-backed replay ──

struct ReplayState {
    url: String,
    scroll: i64,
}

/// Replays saved snapshots: each navigation resolves the target URL to an
/// HTML file under the snapshot directory. Missing files behave like a
/// page that never finished rendering (empty snapshot), which is exactly
/// the degraded state the extraction engines are built to survive.
pub struct ReplayPage {
    root: PathBuf,
    state: Mutex<ReplayState>,
}

impl ReplayPage {
    pub fn new(root: PathBuf, start_url: &str) -> Self {
        ReplayPage {
            root,
            state: Mutex::new(ReplayState {
                url: start_url.to_string(),
                scroll: 0,
            }),
        }
    }

    /// "https://x.test/a/b?c=1" → "x.test_a_b_c_1.html"
    fn file_for(&self, url: &str) -> PathBuf {
        let stripped = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        let mut name = String::with_capacity(stripped.len());
        let mut last_sep = false;
        for ch in stripped.chars() {
            if ch.is_ascii_alphanumeric() || ch == '.' || ch == '-' {
                name.push(ch);
                last_sep = false;
            } else if !last_sep {
                name.push('_');
                last_sep = true;
            }
        }
        self.root.join(format!("{}.html", name.trim_end_matches('_')))
    }
}

#[async_trait]
impl LivePage for ReplayPage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state.lock().await;
        state.url = url.to_string();
        state.scroll = 0;
        debug!(url, "replay navigate");
        Ok(())
    }

    async fn snapshot(&self) -> Result<String> {
        let url = self.state.lock().await.url.clone();
        let path = self.file_for(&url);
        match std::fs::read_to_string(&path) {
            Ok(html) => Ok(html),
            Err(_) => {
                warn!("no snapshot {} for {}", path.display(), url);
                Ok(String::new())
            }
        }
    }

    async fn scroll_offset(&self) -> i64 {
        self.state.lock().await.scroll
    }

    async fn set_scroll_offset(&self, offset: i64) {
        self.state.lock().await.scroll = offset;
    }

    async fn current_url(&self) -> String {
        self.state.lock().await.url.clone()
    }
}

// ── Test double ──

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;

    use super::*;

    /// In-memory page: either a fixed sequence of snapshots (last one
    /// repeats) or a URL → HTML map.
    #[derive(Default)]
    pub struct FakePage {
        pub sequence: Vec<String>,
        pub by_url: HashMap<String, String>,
        pub current: Mutex<String>,
        pub scroll: Mutex<i64>,
        pub visits: Mutex<Vec<String>>,
        pub snapshots_taken: Mutex<usize>,
    }

    impl FakePage {
        pub fn with_sequence(sequence: Vec<String>) -> Self {
            FakePage {
                sequence,
                ..Default::default()
            }
        }

        pub fn with_pages(by_url: HashMap<String, String>, start_url: &str) -> Self {
            FakePage {
                by_url,
                current: Mutex::new(start_url.to_string()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl LivePage for FakePage {
        async fn navigate(&self, url: &str, _timeout: Duration) -> Result<()> {
            self.visits.lock().await.push(url.to_string());
            *self.current.lock().await = url.to_string();
            Ok(())
        }

        async fn snapshot(&self) -> Result<String> {
            if !self.sequence.is_empty() {
                let mut taken = self.snapshots_taken.lock().await;
                let idx = (*taken).min(self.sequence.len() - 1);
                *taken += 1;
                return Ok(self.sequence[idx].clone());
            }
            let url = self.current.lock().await.clone();
            Ok(self.by_url.get(&url).cloned().unwrap_or_default())
        }

        async fn scroll_offset(&self) -> i64 {
            *self.scroll.lock().await
        }

        async fn set_scroll_offset(&self, offset: i64) {
            *self.scroll.lock().await = offset;
        }

        async fn current_url(&self) -> String {
            self.current.lock().await.clone()
        }
    }
}
