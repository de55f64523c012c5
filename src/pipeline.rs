//! End-to-end orchestration: dashboard scan, per-gig step walk, merge,
//! and the optional sync tail. The pipeline is deliberately sequential;
//! one live page services the whole run and courtesy pauses keep the
//! target site comfortable.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use scraper::Html;
use tracing::{debug, info, warn};
use url::Url;

use crate::convergence::{collect_until_stable, ConvergeOptions};
use crate::extract::detail::extract_detail;
use crate::filters::Filters;
use crate::login::is_logged_in;
use crate::merge::Merge;
use crate::model::{DetailRecord, ListingSummary};
use crate::protocol::ScrapeStatus;
use crate::session::LivePage;
use crate::sync::{SyncReport, SyncService};

pub const DEFAULT_GIGS_URL: &str = "https://www.fiverr.com/seller_dashboard/gigs";
pub const LOGIN_URL: &str = "https://www.fiverr.com/login";

/// (step index, tab name) pairs for the gig edit wizard.
const EDIT_STEPS: &[(u32, &str)] = &[
    (0, "general"),
    (1, "pricing"),
    (2, "faq_description"),
    (3, "requirements"),
    (4, "gallery"),
];

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub gigs_url: String,
    pub nav_timeout: Duration,
    /// Pause after each edit-step navigation so the form hydrates.
    pub step_pause: Duration,
    /// Pause between gigs.
    pub gig_pause: Duration,
    pub converge: ConvergeOptions,
    pub progress: bool,
    /// Cap on how many scanned gigs get the full detail walk.
    pub limit: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            gigs_url: DEFAULT_GIGS_URL.to_string(),
            nav_timeout: Duration::from_secs(30),
            step_pause: Duration::from_millis(500),
            gig_pause: Duration::from_millis(1200),
            converge: ConvergeOptions::default(),
            progress: false,
            limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    LoginRequired,
    Gigs(Vec<ListingSummary>),
}

/// Scan the seller dashboard for gig rows. Checks the session first and
/// short-circuits when logged out; a failed navigation is tolerated and
/// the scan proceeds on whatever page is showing.
pub async fn scan_gigs(
    page: &dyn LivePage,
    filters: &Filters,
    opts: &PipelineOptions,
) -> anyhow::Result<ScanOutcome> {
    let url = page.current_url().await;
    let html = page.snapshot().await.unwrap_or_default();
    let logged_in = {
        let doc = Html::parse_document(&html);
        is_logged_in(&doc, &url, filters)
    };
    if !logged_in {
        info!("No session detected, scan aborted");
        return Ok(ScanOutcome::LoginRequired);
    }

    let on_gigs_page = Url::parse(&url)
        .map(|u| filters.gigs_page_path.is_match(u.path()))
        .unwrap_or(false);
    if !on_gigs_page {
        if let Err(e) = page.navigate(&opts.gigs_url, opts.nav_timeout).await {
            warn!("Navigation to gigs page failed, scanning current page: {e:#}");
        }
    }

    let gigs = collect_until_stable(page, filters, &opts.converge).await;
    info!("Scan found {} gigs", gigs.len());
    Ok(ScanOutcome::Gigs(gigs))
}

/// Expand a gig edit URL into one URL per wizard step. Query and fragment
/// are replaced wholesale; a relative or unparseable base keeps its path.
pub fn build_step_urls(base: &str) -> Vec<String> {
    let stem = match Url::parse(base) {
        Ok(u) => format!("{}{}", u.origin().ascii_serialization(), u.path()),
        Err(_) => base
            .split(['?', '#'])
            .next()
            .unwrap_or(base)
            .to_string(),
    };
    EDIT_STEPS
        .iter()
        .map(|(step, tab)| format!("{stem}?step={step}&tab={tab}"))
        .collect()
}

/// Visit every edit step of every gig and merge what each page yields.
/// Per-gig failures become error records; the walk always completes.
pub async fn scrape_details(
    page: &dyn LivePage,
    gigs: &[ListingSummary],
    opts: &PipelineOptions,
) -> Vec<DetailRecord> {
    let bar = if opts.progress {
        let bar = ProgressBar::new(gigs.len() as u64);
        if let Ok(style) =
            ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Some(bar)
    } else {
        None
    };

    let mut records = Vec::with_capacity(gigs.len());
    for gig in gigs {
        if let Some(bar) = &bar {
            bar.set_message(gig.title.clone());
        }

        let base = gig
            .edit_url
            .clone()
            .filter(|u| !u.is_empty())
            .or_else(|| Some(gig.url.clone()).filter(|u| !u.is_empty()));
        let Some(base) = base else {
            warn!("Gig {:?} has no url, recording failure", gig.title);
            let mut record = DetailRecord::from_summary(gig);
            record.error = Some("no_url".into());
            records.push(record);
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            continue;
        };

        let mut record = DetailRecord::from_summary(gig);
        let mut visited_any = false;
        for step_url in build_step_urls(&base) {
            if let Err(e) = page.navigate(&step_url, opts.nav_timeout).await {
                debug!("Step navigation failed for {step_url}: {e:#}");
                continue;
            }
            tokio::time::sleep(opts.step_pause).await;
            match page.snapshot().await {
                Ok(html) => {
                    let extracted = {
                        let doc = Html::parse_document(&html);
                        extract_detail(&doc, &step_url)
                    };
                    record.merge_from(extracted);
                    visited_any = true;
                }
                Err(e) => debug!("Snapshot failed for {step_url}: {e:#}"),
            }
        }

        if !visited_any {
            record.error = Some("no_response".into());
        }
        record.scraped_at = Some(chrono::Utc::now());
        records.push(record);

        if let Some(bar) = &bar {
            bar.inc(1);
        }
        tokio::time::sleep(opts.gig_pause).await;
    }

    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    records
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: ScrapeStatus,
    pub gigs: Vec<ListingSummary>,
    pub records: Vec<DetailRecord>,
    pub sync: Option<SyncReport>,
    pub error: Option<String>,
}

///// Full run: scan, detail walk, then sync when a service is supplied.
pub async fn run(
    page: &dyn LivePage,
    filters: &Filters,
    opts: &PipelineOptions,
    sync: Option<&SyncService<'_>>,
) -> RunOutcome {
    match scan_gigs(page, filters, opts).await {
        Ok(ScanOutcome::LoginRequired) => RunOutcome {
            status: ScrapeStatus::LoginRequired,
            gigs: Vec::new(),
            records: Vec::new(),
            sync: None,
            error: None,
        },
        Ok(ScanOutcome::Gigs(gigs)) => {
            let gigs: Vec<_> = match opts.limit {
                Some(n) => gigs.into_iter().take(n).collect(),
                None => gigs,
            };
            let records = scrape_details(page, &gigs, opts).await;
            let report = match sync {
                Some(service) => Some(service.sync_gigs(&records).await),
                None => None,
            };
            RunOutcome {
                status: ScrapeStatus::Ok,
                gigs,
                records,
                sync: report,
                error: None,
            }
        }
        Err(e) => RunOutcome {
            status: ScrapeStatus::Err,
            gigs: Vec::new(),
            records: Vec::new(),
            sync: None,
            error: Some(format!("{e:#}")),
        },
    }
}
