//! Acceptance and rejection lists for scraped text.
//!
//! All of these are tuned empirically against the target site's current
//! markup and will need retuning when it changes, so they live in one
//! place as data: the defaults below can be replaced wholesale by loading
//! a JSON file with `Filters::from_file`.

use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

const ACTION_WORDS: &str =
    r"(?i)^(preview|edit|share|add\s+video|live\s+portfolio|edit\s+video|actions?|manage)$";
const SKIP_WORDS: &str = r"(?i)^(impressions|clicks|views|orders|revenue|earnings|status|active|pending|approval|requires|modification|draft|denied|paused|accepting|custom|delete|activate|pause)$";
const CHROME_WORDS: &str = r"(?i)(gig|edit|preview|share|manage|dashboard|impressions|clicks)";
const EDIT_TOKENS: &str = r"(?i)(edit|manage|edit-gig|update)";
const GIG_PATH: &str = r"(?i)/gig/";
const MANAGE_PATH: &str = r#"a[href*="/manage_gigs"], a[href*="/seller_dashboard/gigs"], a[href*="/users/"]"#;
const GIGS_PAGE_PATH: &str = r"(?i)(seller_dashboard/gigs|/users/[^/]+/manage_gigs)";

/// Serializable form of the tuned lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub action_words: String,
    pub skip_words: String,
    pub chrome_words: String,
    pub edit_tokens: String,
    pub gig_path: String,
    pub gigs_page_path: String,
    pub min_title_len: usize,
    pub min_link_title_len: usize,
    /// Selectors whose presence means a user session exists.
    pub login_positive: Vec<String>,
    /// Selectors whose presence means the user is logged out.
    pub login_negative: Vec<String>,
    /// Path fragment that by itself proves a session (dashboard pages).
    pub login_path: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            action_words: ACTION_WORDS.into(),
            skip_words: SKIP_WORDS.into(),
            chrome_words: CHROME_WORDS.into(),
            edit_tokens: EDIT_TOKENS.into(),
            gig_path: GIG_PATH.into(),
            gigs_page_path: GIGS_PAGE_PATH.into(),
            min_title_len: 5,
            min_link_title_len: 10,
            login_positive: vec![
                r#"a[href*="/logout"]"#.into(),
                r#"a[href*="/seller_dashboard"]"#.into(),
                r#"a[href^="/users/"][aria-label]"#.into(),
            ],
            login_negative: vec![
                r#"a[href*="/login"]"#.into(),
                r#"a[data-testid="sign-in-button"]"#.into(),
            ],
            login_path: r"(?i)/seller_dashboard".into(),
        }
    }
}

/// Compiled filter set consulted by the extraction engines.
pub struct Filters {
    pub action_words: Regex,
    pub skip_words: Regex,
    pub chrome_words: Regex,
    pub edit_tokens: Regex,
    pub gig_path: Regex,
    pub gigs_page_path: Regex,
    pub manage_path_selector: String,
    pub min_title_len: usize,
    pub min_link_title_len: usize,
    pub login_positive: Vec<String>,
    pub login_negative: Vec<String>,
    pub login_path: Regex,
}

impl Filters {
    pub fn compile(cfg: &FilterConfig) -> Result<Self> {
        Ok(Filters {
            action_words: Regex::new(&cfg.action_words)?,
            skip_words: Regex::new(&cfg.skip_words)?,
            chrome_words: Regex::new(&cfg.chrome_words)?,
            edit_tokens: Regex::new(&cfg.edit_tokens)?,
            gig_path: Regex::new(&cfg.gig_path)?,
            gigs_page_path: Regex::new(&cfg.gigs_page_path)?,
            manage_path_selector: MANAGE_PATH.into(),
            min_title_len: cfg.min_title_len,
            min_link_title_len: cfg.min_link_title_len,
            login_positive: cfg.login_positive.clone(),
            login_negative: cfg.login_negative.clone(),
            login_path: Regex::new(&cfg.login_path)?,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read filter config {}", path.display()))?;
        let cfg: FilterConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid filter config {}", path.display()))?;
        Self::compile(&cfg)
    }

    /// The row-level acceptance test applied to every candidate title.
    pub fn accept_title(&self, title: &str) -> bool {
        if title.is_empty() || title.len() < self.min_title_len {
            return false;
        }
        if self.action_words.is_match(title) || self.skip_words.is_match(title) {
            return false;
        }
        // Script leakage shows up as brace-laden pseudo-titles.
        if title.contains('{') || title.contains('}') || title.contains("window.initialData") {
            return false;
        }
        true
    }
}

impl Default for Filters {
    fn default() -> Self {
        // The built-in patterns are known-valid.
        Self::compile(&FilterConfig::default()).expect("default filter patterns must compile")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_words_rejected() {
        let f = Filters::default();
        assert!(!f.accept_title("Edit"));
        assert!(!f.accept_title("Preview"));
        assert!(!f.accept_title("preview"));
        assert!(!f.accept_title("Add Video"));
    }

    #[test]
    fn metric_words_rejected() {
        let f = Filters::default();
        assert!(!f.accept_title("Impressions"));
        assert!(!f.accept_title("paused"));
    }

    #[test]
    fn real_titles_accepted() {
        let f = Filters::default();
        assert!(f.accept_title("Professional Logo Design Service"));
        assert!(f.accept_title("Video Editing Pro"));
    }

    #[test]
    fn code_fragments_rejected() {
        let f = Filters::default();
        assert!(!f.accept_title("window.initialData = foo"));
        assert!(!f.accept_title("{\"a\":1} something long enough"));
        assert!(!f.accept_title("abc"));
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = FilterConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: FilterConfig = serde_json::from_str(&json).unwrap();
        assert!(Filters::compile(&back).is_ok());
    }
}
