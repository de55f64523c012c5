//! Active-region detection: the subtree of the page currently visible to
//! the user, used to scope row extraction away from hidden duplicate
//! markup. Inherently fragile against markup changes, so the heuristic is
//! a prioritized list of predicates rather than one selector.

use scraper::{ElementRef, Html};
use tracing::debug;

use crate::dom::{select_all, select_first};

/// Selectors that explicitly mark the visible tab panel.
const ACTIVE_PANEL_SELECTORS: &[&str] = &[
    r#"[role="tabpanel"][aria-hidden="false"]"#,
    ".tab-panel.active",
    ".tab-content.active",
    r#"[data-testid="active-tab"]"#,
    ".active-tab-content",
];

/// Candidate tab panels checked for visibility when nothing is marked active.
const PANEL_SELECTORS: &str = r#"[role="tabpanel"], .tab-panel, .tab-content"#;

/// Generic main-content containers, the last resort before the whole document.
const MAIN_SELECTORS: &[&str] = &[
    "main",
    ".main-content",
    ".content-area",
    r#"[data-testid="gig-list"]"#,
    ".gig-list",
    "table tbody",
];

/// Resolve the scope row extraction should run against. Falls back to the
/// document root when no narrower region can be identified.
pub fn active_region(doc: &Html) -> ElementRef<'_> {
    let root = doc.root_element();

    for sel in ACTIVE_PANEL_SELECTORS {
        if let Some(el) = select_first(root, sel) {
            debug!(selector = sel, "active region: marked panel");
            return el;
        }
    }

    for panel in select_all(root, PANEL_SELECTORS) {
        if is_visible(panel) {
            debug!("active region: first visible panel");
            return panel;
        }
    }

    for sel in MAIN_SELECTORS {
        if let Some(el) = select_first(root, sel) {
            debug!(selector = sel, "active region: main container");
            return el;
        }
    }

    root
}

/// Static-markup approximation of "non-hidden computed style".
fn is_visible(el: ElementRef) -> bool {
    let v = el.value();
    if v.attr("hidden").is_some() || v.attr("aria-hidden").is_some() {
        return false;
    }
    match v.attr("style") {
        Some(style) => {
            let style = style.replace(' ', "").to_ascii_lowercase();
            !style.contains("display:none") && !style.contains("visibility:hidden")
        }
        None => true,
    }
}
