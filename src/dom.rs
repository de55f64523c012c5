//! Text and DOM helpers shared by every extractor.

use scraper::{ElementRef, Selector};

/// Collapse whitespace runs and trim, the normalization applied to every
/// piece of text read out of the page.
pub fn clean(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text content of an element and its descendants.
pub fn text_of(el: ElementRef) -> String {
    clean(&el.text().collect::<Vec<_>>().join(" "))
}

/// First element under `scope` matching `selector`. Invalid selectors
/// yield nothing rather than failing the extraction pass.
pub fn select_first<'a>(scope: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    scope.select(&sel).next()
}

pub fn select_all<'a>(scope: ElementRef<'a>, selector: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(selector) {
        Ok(sel) => scope.select(&sel).collect(),
        Err(_) => Vec::new(),
    }
}

/// Cleaned text of the first match, filtered to non-empty.
pub fn first_text(scope: ElementRef, selector: &str) -> Option<String> {
    select_first(scope, selector)
        .map(text_of)
        .filter(|t| !t.is_empty())
}

/// Cleaned texts of all matches, empties dropped.
pub fn all_texts(scope: ElementRef, selector: &str) -> Vec<String> {
    select_all(scope, selector)
        .into_iter()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect()
}

/// `src` attributes of all matches (images, video sources).
pub fn all_srcs(scope: ElementRef, selector: &str) -> Vec<String> {
    select_all(scope, selector)
        .into_iter()
        .filter_map(|el| el.value().attr("src"))
        .map(str::to_string)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Value of a form control: the `value` attribute for inputs, the text
/// content for textareas. Empty after cleaning counts as absent.
pub fn form_value(scope: ElementRef, selector: &str) -> Option<String> {
    let el = select_first(scope, selector)?;
    let raw = match el.value().attr("value") {
        Some(v) => v.to_string(),
        None => el.text().collect::<Vec<_>>().join(" "),
    };
    let v = clean(&raw);
    (!v.is_empty()).then_some(v)
}

/// Turn a URL slug into a display title: "video-editing-pro" → "Video Editing Pro".
pub fn humanize_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// First-match combinator: evaluate strategies in order, returning the
/// first present value. The building block for every fallback chain.
pub fn first_match<'a, T>(
    scope: ElementRef<'a>,
    strategies: &[&dyn Fn(ElementRef<'a>) -> Option<T>],
) -> Option<T> {
    strategies.iter().find_map(|s| s(scope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean("  a \n\t b  "), "a b");
        assert_eq!(clean(""), "");
    }

    #[test]
    fn humanize_basic() {
        assert_eq!(humanize_slug("video-editing-pro"), "Video Editing Pro");
        assert_eq!(humanize_slug("logo"), "Logo");
        assert_eq!(humanize_slug(""), "");
    }

    #[test]
    fn form_value_prefers_value_attr() {
        let doc = Html::parse_document(
            r#"<form><input name="title" value="My Gig"><textarea name="description">  Long
            text  </textarea></form>"#,
        );
        let root = doc.root_element();
        assert_eq!(
            form_value(root, r#"input[name="title"]"#).as_deref(),
            Some("My Gig")
        );
        assert_eq!(
            form_value(root, r#"textarea[name="description"]"#).as_deref(),
            Some("Long text")
        );
        assert_eq!(form_value(root, r#"input[name="missing"]"#), None);
    }

    #[test]
    fn first_match_stops_at_first_hit() {
        let doc = Html::parse_document("<div><h1>Heading</h1><p>Para</p></div>");
        let root = doc.root_element();
        let miss = |scope: ElementRef| first_text(scope, ".nope");
        let h1 = |scope: ElementRef| first_text(scope, "h1");
        let p = |scope: ElementRef| first_text(scope, "p");
        let got = first_match(root, &[&miss, &h1, &p]);
        assert_eq!(got.as_deref(), Some("Heading"));
    }
}
