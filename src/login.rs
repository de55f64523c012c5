//! Login detection over a page snapshot. DOM heuristics, in fixed order:
//! a dashboard path proves a session; then positive probes (logout link,
//! dashboard link, profile link with a label); then negative probes
//! (sign-in affordances); otherwise assume logged out.

use scraper::Html;
use url::Url;

use crate::dom::select_first;
use crate::filters::Filters;

pub fn is_logged_in(doc: &Html, page_url: &str, filters: &Filters) -> bool {
    let path = Url::parse(page_url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| page_url.to_string());
    if filters.login_path.is_match(&path) {
        return true;
    }

    let root = doc.root_element();
    for sel in &filters.login_positive {
        if select_first(root, sel).is_some() {
            return true;
        }
    }
    for sel in &filters.login_negative {
        if select_first(root, sel).is_some() {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(html: &str, url: &str) -> bool {
        let doc = Html::parse_document(html);
        is_logged_in(&doc, url, &Filters::default())
    }

    #[test]
    fn dashboard_path_is_enough() {
        assert!(check("<html></html>", "https://x.test/seller_dashboard"));
    }

    #[test]
    fn logout_link_means_logged_in() {
        assert!(check(
            r#"<a href="/logout">Sign out</a>"#,
            "https://x.test/"
        ));
    }

    #[test]
    fn sign_in_button_means_logged_out() {
        assert!(!check(
            r#"<a href="/login">Sign in</a>"#,
            "https://x.test/"
        ));
    }

    #[test]
    fn positive_probe_wins_over_negative() {
        assert!(check(
            r#"<a href="/seller_dashboard">Dashboard</a><a href="/login">Sign in</a>"#,
            "https://x.test/"
        ));
    }

    #[test]
    fn bare_page_defaults_to_logged_out() {
        assert!(!check("<html><body></body></html>", "https://x.test/"));
    }
}
