//! Convergence loop: keep re-querying a lazily-rendering page until rows
//! appear or the deadline passes. Returning empty at the deadline is a
//! soft-fail, never an error.

use std::time::Duration;

use scraper::Html;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::extract::rows::{collect_rows, collect_rows_from_links};
use crate::filters::Filters;
use crate::model::ListingSummary;
use crate::session::LivePage;

#[derive(Debug, Clone)]
pub struct ConvergeOptions {
    /// Hard bound on the whole loop.
    pub deadline: Duration,
    /// Pause between attempts.
    pub poll: Duration,
    /// Scroll perturbation used to force lazy rows to render.
    pub nudge_delta: i64,
    pub nudge_pause: Duration,
}

impl Default for ConvergeOptions {
    fn default() -> Self {
        ConvergeOptions {
            deadline: Duration::from_secs(12),
            poll: Duration::from_millis(300),
            nudge_delta: 200,
            nudge_pause: Duration::from_millis(100),
        }
    }
}

/// Drive the row engine against `page` until it yields something or the
/// deadline elapses. After half the deadline, the alternative link-based
/// strategy joins each attempt.
pub async fn collect_until_stable(
    page: &dyn LivePage,
    filters: &Filters,
    opts: &ConvergeOptions,
) -> Vec<ListingSummary> {
    let start = Instant::now();
    let mut attempts = 0u32;

    let gigs = loop {
        attempts += 1;
        let found = match page.snapshot().await {
            Ok(html) => {
                let doc = Html::parse_document(&html);
                let mut found = collect_rows(&doc, filters);
                if found.is_empty() && start.elapsed() >= opts.deadline / 2 {
                    found = collect_rows_from_links(&doc, filters);
                }
                found
            }
            Err(e) => {
                warn!("snapshot failed during convergence: {e}");
                Vec::new()
            }
        };

        if !found.is_empty() || start.elapsed() >= opts.deadline {
            break found;
        }

        nudge(page, opts).await;
        tokio::time::sleep(opts.poll).await;
    };

    debug!(
        attempts,
        found = gigs.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "convergence finished"
    );
    gigs
}

/// Perturb the scroll position and put it back. Virtualized lists only
/// materialize rows near the viewport, so this is enough to force a
/// render without visibly moving the page.
async fn nudge(page: &dyn LivePage, opts: &ConvergeOptions) {
    let top = page.scroll_offset().await;
    page.set_scroll_offset(top + opts.nudge_delta).await;
    tokio::time::sleep(opts.nudge_pause).await;
    page.set_scroll_offset(top).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::FakePage;

    const ROWS: &str = r#"<table><tbody><tr>
        <td class="title"><a href="/gig/logo-pro">Professional Logo Design</a></td>
        </tr></tbody></table>"#;

    const LINKS_ONLY: &str = r#"<main>
        <a href="/gig/video">I Will Edit Your Videos Professionally</a>
        </main>"#;

    fn opts_ms(deadline: u64) -> ConvergeOptions {
        ConvergeOptions {
            deadline: Duration::from_millis(deadline),
            poll: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_once_rows_appear() {
        let page = FakePage::with_sequence(vec![
            String::new(),
            String::new(),
            ROWS.to_string(),
        ]);
        let gigs = collect_until_stable(&page, &Filters::default(), &opts_ms(5_000)).await;
        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].title, "Professional Logo Design");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_page_returns_empty_at_deadline() {
        let page = FakePage::with_sequence(vec![String::new()]);
        let start = Instant::now();
        let gigs = collect_until_stable(&page, &Filters::default(), &opts_ms(800)).await;
        assert!(gigs.is_empty());
        // Bounded: the loop gave up at its deadline instead of spinning.
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn switches_to_link_strategy_after_half_deadline() {
        let page = FakePage::with_sequence(vec![LINKS_ONLY.to_string()]);
        let gigs = collect_until_stable(&page, &Filters::default(), &opts_ms(600)).await;
        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].title, "I Will Edit Your Videos Professionally");
    }

    #[tokio::test(start_paused = true)]
    async fn nudge_restores_scroll_offset() {
        let page = FakePage::with_sequence(vec![String::new()]);
        page.set_scroll_offset(140).await;
        collect_until_stable(&page, &Filters::default(), &opts_ms(300)).await;
        assert_eq!(page.scroll_offset().await, 140);
    }
}
