//! Wire messages exchanged with the host automation surface, plus the
//! dispatcher that maps them onto the pipeline. Every request produces a
//! well-formed response; failures travel in the payload, never as a
//! transport error.

use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::filters::Filters;
use crate::login::is_logged_in;
use crate::merge::Merge;
use crate::model::{DetailRecord, ListingSummary};
use crate::session::LivePage;
use crate::sync::{SyncReport, SyncService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "ENSURE_LOGIN")]
    EnsureLogin,
    #[serde(rename = "CHECK_LOGIN")]
    CheckLogin,
    #[serde(rename = "NAV_TO_GIGS_AND_SCRAPE")]
    NavToGigsAndScrape,
    #[serde(rename = "SCRAPE_GIG")]
    ScrapeGig { gig: ListingSummary },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScrapeStatus {
    Ok,
    LoginRequired,
    Err,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub logged_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub logged_in: bool,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub status: ScrapeStatus,
    pub gigs: Vec<ListingSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_result: Option<SyncReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailResponse {
    pub status: ScrapeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Untagged: variant order is load-bearing for deserialization. Narrower
// shapes come first so a wider variant with optional fields cannot
// swallow them (`LoginCheck` before `Login`, `Scan` with its required
// `gigs` before `Detail`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    LoginCheck(CheckResponse),
    Login(LoginResponse),
    Scan(ScanResponse),
    Detail(DetailResponse),
}

async fn login_state(page: &dyn LivePage, filters: &Filters) -> (bool, String) {
    let url = page.current_url().await;
    let html = page.snapshot().await.unwrap_or_default();
    let logged_in = {
        let doc = Html::parse_document(&html);
        is_logged_in(&doc, &url, filters)
    };
    (logged_in, url)
}

/// Handle one request against a live page. Never errors outward; every
/// failure maps to a status or error field in the response. When a sync
/// service is supplied, a successful scan-and-scrape carries its report.
pub async fn dispatch(
    request: &Request,
    page: &dyn LivePage,
    filters: &Filters,
    sync: Option<&SyncService<'_>>,
) -> Response {
    match request {
        Request::CheckLogin => {
            let (logged_in, url) = login_state(page, filters).await;
            Response::LoginCheck(CheckResponse { logged_in, url })
        }
        Request::EnsureLogin => {
            let (logged_in, _) = login_state(page, filters).await;
            if logged_in {
                return Response::Login(LoginResponse {
                    logged_in: true,
                    ..Default::default()
                });
            }
            let opts = crate::pipeline::PipelineOptions::default();
            if let Err(e) = page.navigate(crate::pipeline::LOGIN_URL, opts.nav_timeout).await {
                warn!("Login navigation failed: {e:#}");
                return Response::Login(LoginResponse {
                    logged_in: false,
                    action: None,
                    error: Some(format!("{e:#}")),
                });
            }
            Response::Login(LoginResponse {
                logged_in: false,
                action: Some("NAVIGATE_LOGIN".into()),
                error: None,
            })
        }
        Request::NavToGigsAndScrape => {
            let opts = crate::pipeline::PipelineOptions::default();
            let outcome = crate::pipeline::run(page, filters, &opts, sync).await;
            Response::Scan(ScanResponse {
                status: outcome.status,
                gigs: outcome.gigs,
                sync_result: outcome.sync,
                error: outcome.error,
            })
        }
        Request::ScrapeGig { gig } => {
            let mut record = DetailRecord::from_summary(gig);
            let url = page.current_url().await;
            match page.snapshot().await {
                Ok(html) => {
                    let extracted = {
                        let doc = Html::parse_document(&html);
                        crate::extract::detail::extract_detail(&doc, &url)
                    };
                    record.merge_from(extracted);
                    record.scraped_at = Some(chrono::Utc::now());
                    Response::Detail(DetailResponse {
                        status: ScrapeStatus::Ok,
                        details: Some(record),
                        error: None,
                    })
                }
                Err(e) => Response::Detail(DetailResponse {
                    status: ScrapeStatus::Err,
                    details: None,
                    error: Some(format!("{e:#}")),
                }),
            }
        }
    }
}
