//! Row Extraction Engine: turn one document snapshot into zero or more
//! listing summaries. Each strategy is a pure function over a row scope;
//! the cascade stops at the first one that produces a title. A row that
//! satisfies no strategy contributes nothing, and the overall call never
//! fails.

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::dom::{clean, first_text, humanize_slug, select_all, select_first, text_of};
use crate::extract::region::active_region;
use crate::filters::Filters;
use crate::model::ListingSummary;

/// Broad union covering the current table markup plus older layouts.
const ROW_SELECTORS: &str = "table tbody tr, tr[data-id], tr[data-slug], \
     [data-testid='gig-row'], .gig-row, [role='row'], tbody > tr, .table-row";

/// Known title-bearing elements, in preference order.
const TITLE_SELECTORS: &[&str] = &[
    r#"[data-testid="gig-title"]"#,
    r#"[data-test="gig-title"]"#,
    ".gig-title",
    r#"h3 a[href*="/gig/"]"#,
    r#"a[href*="/gig/"] h3"#,
    ".gig-name",
    r#"[data-qa="gig-title"]"#,
];

const TITLE_CELL_SELECTOR: &str = r#".title, [class*="title"], td:nth-child(2), td:nth-child(3)"#;

/// Minimum cleaned-text length for the substantial-cell fallback strategy.
const MIN_CELL_TEXT: usize = 10;

/// Scan the active region of `doc` for listing rows, deduplicated by
/// normalized title and filtered of UI chrome.
pub fn collect_rows(doc: &Html, filters: &Filters) -> Vec<ListingSummary> {
    let region = active_region(doc);
    let rows = select_all(region, ROW_SELECTORS);
    debug!(candidates = rows.len(), "row scan");

    let mut seen: HashSet<String> = HashSet::new();
    let mut gigs = Vec::new();

    for row in rows {
        let Some((title, url)) = extract_row(row, filters) else {
            continue;
        };
        if !filters.accept_title(&title) {
            continue;
        }
        if !seen.insert(title.to_lowercase()) {
            continue;
        }
        let edit_url = find_edit_url(row, filters);
        gigs.push(ListingSummary { title, url, edit_url });
    }

    gigs
}

/// The fixed-priority strategy cascade for one row.
fn extract_row(row: ElementRef, filters: &Filters) -> Option<(String, String)> {
    from_data_slug(row, filters)
        .or_else(|| from_title_cell(row))
        .or_else(|| from_known_selectors(row))
        .or_else(|| from_listing_link(row, filters))
        .or_else(|| from_cell_text(row, filters))
}

/// Strategy 1: a slug baked into a data attribute, humanized into a title.
fn from_data_slug(row: ElementRef, filters: &Filters) -> Option<(String, String)> {
    let slug = row.value().attr("data-slug")?;
    let title = humanize_slug(slug);
    if title.is_empty() {
        return None;
    }
    let url = select_first(row, &filters.manage_path_selector)
        .and_then(|a| a.value().attr("href"))
        .unwrap_or_default()
        .to_string();
    Some((title, url))
}

/// Strategy 2: a conventional title cell, preferring its anchor.
fn from_title_cell(row: ElementRef) -> Option<(String, String)> {
    let cell = select_first(row, TITLE_CELL_SELECTOR)?;
    let anchor = select_first(cell, "a[href]");
    let title = match anchor {
        Some(a) => text_of(a),
        None => text_of(cell),
    };
    if title.is_empty() {
        return None;
    }
    let url = anchor
        .and_then(|a| a.value().attr("href"))
        .unwrap_or_default()
        .to_string();
    Some((title, url))
}

/// Strategy 3: known title-bearing selectors tried in order.
fn from_known_selectors(row: ElementRef) -> Option<(String, String)> {
    for sel in TITLE_SELECTORS {
        let Some(el) = select_first(row, sel) else {
            continue;
        };
        let title = text_of(el);
        if title.is_empty() {
            continue;
        }
        // href from the element itself, an enclosing anchor, or a nested one.
        let url = el
            .value()
            .attr("href")
            .map(str::to_string)
            .or_else(|| enclosing_href(el))
            .or_else(|| {
                select_first(el, "a[href]")
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string)
            })
            .unwrap_or_default();
        return Some((title, url));
    }
    None
}

/// Strategy 4: any link whose target path looks listing-specific.
fn from_listing_link(row: ElementRef, filters: &Filters) -> Option<(String, String)> {
    select_all(row, "a[href]").into_iter().find_map(|a| {
        let href = a.value().attr("href")?;
        if !filters.gig_path.is_match(href) {
            return None;
        }
        let title = text_of(a);
        (!title.is_empty()).then(|| (title, href.to_string()))
    })
}

/// Strategy 5: first table cell with substantial, non-action text.
fn from_cell_text(row: ElementRef, filters: &Filters) -> Option<(String, String)> {
    select_all(row, "td").into_iter().find_map(|cell| {
        let text = text_of(cell);
        if text.len() <= MIN_CELL_TEXT || filters.action_words.is_match(&text) {
            return None;
        }
        let url = select_first(cell, "a[href]")
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .to_string();
        Some((text, url))
    })
}

fn enclosing_href(el: ElementRef) -> Option<String> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "a" && a.value().attr("href").is_some())
        .and_then(|a| a.value().attr("href").map(str::to_string))
}

/// Second, independent link classification: an edit/manage link for the
/// accepted row, falling back to any manage-path link.
fn find_edit_url(row: ElementRef, filters: &Filters) -> Option<String> {
    let candidate = select_all(row, "a[href]").into_iter().find_map(|a| {
        let href = a.value().attr("href")?;
        let text = text_of(a);
        (filters.edit_tokens.is_match(href) || filters.edit_tokens.is_match(&text))
            .then(|| href.to_string())
    });
    candidate.or_else(|| {
        select_first(row, &filters.manage_path_selector)
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string)
    })
}

/// Alternative strategy for non-table layouts: collect listing-detail
/// hyperlinks directly from the active region. No row-level filtering is
/// available here, so a longer minimum title length applies. As a last
/// resort, substantial plain-text nodes that avoid the chrome deny-list
/// are taken as titles without URLs.
pub fn collect_rows_from_links(doc: &Html, filters: &Filters) -> Vec<ListingSummary> {
    let region = active_region(doc);
    let mut seen: HashSet<String> = HashSet::new();
    let mut gigs = Vec::new();

    for a in select_all(region, "a[href]") {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        if !filters.gig_path.is_match(href) {
            continue;
        }
        let title = text_of(a);
        if title.len() < filters.min_link_title_len {
            continue;
        }
        if !seen.insert(title.to_lowercase()) {
            continue;
        }
        gigs.push(ListingSummary {
            title,
            url: href.to_string(),
            edit_url: None,
        });
    }

    if gigs.is_empty() {
        for el in select_all(region, "*") {
            // Leaf elements only; container text concatenates everything.
            if el.children().any(|c| c.value().is_element()) {
                continue;
            }
            let text = clean(&el.text().collect::<Vec<_>>().join(" "));
            if text.len() <= 15 || text.len() >= 200 || filters.chrome_words.is_match(&text) {
                continue;
            }
            if !seen.insert(text.to_lowercase()) {
                continue;
            }
            gigs.push(ListingSummary {
                title: text,
                url: String::new(),
                edit_url: None,
            });
        }
    }

    debug!(found = gigs.len(), "link-based scan");
    gigs
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(html: &str) -> Vec<ListingSummary> {
        let doc = Html::parse_document(html);
        collect_rows(&doc, &Filters::default())
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn data_slug_is_humanized() {
        let gigs = scan(
            r#"<table><tbody><tr data-slug="video-editing-pro"><td></td></tr></tbody></table>"#,
        );
        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].title, "Video Editing Pro");
    }

    #[test]
    fn action_only_rows_yield_nothing() {
        let gigs = scan(
            "<table><tbody>\
             <tr><td>Edit</td></tr>\
             <tr><td>Preview</td></tr>\
             </tbody></table>",
        );
        assert!(gigs.is_empty());
    }

    #[test]
    fn dedup_is_case_insensitive() {
        let gigs = scan(
            r#"<table><tbody>
               <tr><td>x</td><td class="title"><a href="/gig/logo">Logo Design Shop</a></td></tr>
               <tr><td>x</td><td class="title"><a href="/gig/logo2">logo design shop</a></td></tr>
               </tbody></table>"#,
        );
        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].title, "Logo Design Shop");
    }

    #[test]
    fn title_cell_prefers_anchor() {
        let gigs = scan(
            r#"<table><tbody><tr>
               <td>1</td>
               <td class="title"><a href="/gig/seo-audit">Complete SEO Audit</a> extra</td>
               </tr></tbody></table>"#,
        );
        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].title, "Complete SEO Audit");
        assert_eq!(gigs[0].url, "/gig/seo-audit");
    }

    #[test]
    fn edit_link_found_by_second_heuristic() {
        let gigs = scan(
            r#"<table><tbody><tr>
               <td class="title"><a href="/gig/banner-pack">Banner Pack Deluxe</a></td>
               <td><a href="/manage_gigs/banner-pack/edit">Edit</a></td>
               </tr></tbody></table>"#,
        );
        assert_eq!(gigs.len(), 1);
        assert_eq!(
            gigs[0].edit_url.as_deref(),
            Some("/manage_gigs/banner-pack/edit")
        );
    }

    #[test]
    fn rows_outside_active_panel_ignored() {
        let gigs = scan(&fixture("gig_rows"));
        let titles: Vec<&str> = gigs.iter().map(|g| g.title.as_str()).collect();
        assert!(titles.contains(&"Professional Logo Design Service"));
        assert!(titles.contains(&"Video Editing Pro"));
        assert!(!titles.iter().any(|t| t.contains("Archived")));
    }

    #[test]
    fn link_scan_requires_longer_titles() {
        let doc = Html::parse_document(
            r#"<main>
               <a href="/gig/one">short</a>
               <a href="/gig/two">I Will Design A Modern Minimal Logo</a>
               <a href="/other/x">I Will Also Do Something Entirely Different</a>
               </main>"#,
        );
        let gigs = collect_rows_from_links(&doc, &Filters::default());
        assert_eq!(gigs.len(), 1);
        assert_eq!(gigs[0].title, "I Will Design A Modern Minimal Logo");
    }

    #[test]
    fn empty_document_yields_empty_list() {
        assert!(scan("<html><body></body></html>").is_empty());
    }
}
