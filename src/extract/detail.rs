//! Detail Extraction Engine: one page (a public gig view or one step of
//! the multi-step editor) in, one partial `DetailRecord` out. Every
//! section extractor stands alone with its own fallback chain, so a
//! missing element degrades that field only, never the whole record.

use scraper::{ElementRef, Html};

use crate::dom::{
    all_srcs, all_texts, first_match, first_text, form_value, select_all, select_first, text_of,
};
use crate::model::{
    DescriptionFaq, DetailRecord, FaqItem, Gallery, Overview, Package, Requirement, Seller,
};

pub fn extract_detail(doc: &Html, page_url: &str) -> DetailRecord {
    let scope = doc.root_element();

    let overview = extract_overview(scope, doc);
    let pricing_packages = extract_packages(scope);
    let description_faq = extract_description_faq(scope);
    let requirements = extract_requirements(scope);
    let gallery = extract_gallery(scope);
    let seller = extract_seller(scope);

    DetailRecord {
        url: Some(page_url.to_string()).filter(|u| !u.is_empty()),
        title: overview.title.clone(),
        overview,
        pricing_packages,
        description_faq,
        requirements,
        gallery,
        seller,
        error: None,
        scraped_at: None,
    }
}

fn extract_overview(scope: ElementRef, doc: &Html) -> Overview {
    // Title: editable form field, heading, test-hook element, page title.
    let edit_title = |s: ElementRef| {
        form_value(
            s,
            r#"input[name="title"], input[id*="title"], textarea[name="title"]"#,
        )
    };
    let h1 = |s: ElementRef| first_text(s, "h1");
    let hook = |s: ElementRef| first_text(s, r#"[data-testid="gig-title"]"#);
    let title = first_match(scope, &[&edit_title, &h1, &hook]).or_else(|| page_title(doc));

    let edit_desc = |s: ElementRef| {
        form_value(s, r#"textarea[name="description"], textarea[id*="description"]"#)
    };
    let body_desc = |s: ElementRef| {
        first_text(
            s,
            r#"[data-testid="description"], .gig-description, #overview, .description, .about"#,
        )
    };
    let meta_desc = |s: ElementRef| {
        select_first(s, r#"meta[name="description"]"#)
            .and_then(|el| el.value().attr("content"))
            .map(str::to_string)
            .filter(|t| !t.is_empty())
    };
    let description = first_match(scope, &[&edit_desc, &body_desc, &meta_desc]);

    let tags = all_texts(
        scope,
        r#".tags a, [data-testid="tags"] a, .gig-tags a, [data-testid*="skills"] [role="option"], [data-testid*="tags"] [role="option"]"#,
    );
    let images = gallery_images(scope);

    Overview {
        title,
        description,
        tags,
        images,
    }
}

fn page_title(doc: &Html) -> Option<String> {
    first_text(doc.root_element(), "title")
}

/// Package-style pricing: structured package cards, else repeating edit-form
/// rows, else one synthesized "Standard" package from a generic price element.
fn extract_packages(scope: ElementRef) -> Vec<Package> {
    let cards = select_all(
        scope,
        r#"[data-testid*="package"], .packages .package, .gig-packages .package"#,
    );
    if !cards.is_empty() {
        return cards.into_iter().map(package_from_card).collect();
    }

    let rows = select_all(
        scope,
        r#".package-row, .package-item, [data-testid*="package-row"]"#,
    );
    if !rows.is_empty() {
        return rows.into_iter().map(package_from_edit_row).collect();
    }

    let single = first_text(
        scope,
        r#".price, [data-testid="gig-price"], .gig-price, .start-price"#,
    );
    match single {
        Some(price) => vec![Package {
            name: Some("Standard".into()),
            price: Some(price),
            desc: None,
        }],
        None => Vec::new(),
    }
}

fn package_from_card(card: ElementRef) -> Package {
    Package {
        name: first_text(card, "h3").or_else(|| first_text(card, ".package-name")),
        price: first_text(card, r#"[data-testid*="price"], .price, .package-price"#),
        desc: first_text(card, ".description, .package-description"),
    }
}

fn package_from_edit_row(row: ElementRef) -> Package {
    Package {
        name: form_value(row, r#"input[name*="package_name"], input[name*="name"]"#)
            .or_else(|| first_text(row, "h3")),
        price: form_value(row, r#"input[name*="package_price"], input[name*="price"]"#)
            .or_else(|| first_text(row, ".price")),
        desc: form_value(row, r#"textarea[name*="package_desc"], textarea[name*="description"]"#)
            .or_else(|| first_text(row, ".desc")),
    }
}

fn extract_description_faq(scope: ElementRef) -> DescriptionFaq {
    let description = form_value(
        scope,
        r#"textarea[name="description"], textarea[id*="description"], [data-testid*="description"] textarea"#,
    );

    let mut faq = Vec::new();
    for row in select_all(scope, r#"[data-testid*="faq"], .faq-item, .faq-row"#) {
        let question = form_value(row, r#"input[name*="question"], textarea[name*="question"]"#)
            .or_else(|| form_value(row, "input, textarea"))
            .or_else(|| first_text(row, "h4"));
        let answer = form_value(row, r#"textarea[name*="answer"]"#)
            .or_else(|| first_text(row, "p, .answer"));
        // A row with neither side is markup noise.
        if question.is_some() || answer.is_some() {
            faq.push(FaqItem { question, answer });
        }
    }

    DescriptionFaq { description, faq }
}

fn extract_requirements(scope: ElementRef) -> Vec<Requirement> {
    let mut out = Vec::new();
    for row in select_all(
        scope,
        r#"[data-testid*="requirement"], .requirement-row, .requirement-item"#,
    ) {
        let label = form_value(row, r#"input[name*="label"], textarea[name*="label"]"#)
            .or_else(|| first_text(row, "label"));
        let Some(label) = label else { continue };

        let kind = select_first(row, "select option[selected]")
            .map(text_of)
            .or_else(|| row.value().attr("data-type").map(str::to_string))
            .map(|v| v.to_ascii_lowercase())
            .filter(|v| !v.is_empty());
        let required = {
            let text = text_of(row).to_ascii_lowercase();
            text.contains("required") || text.contains("mandatory")
        };
        out.push(Requirement {
            label: Some(label),
            kind,
            required,
        });
    }
    out
}

fn extract_gallery(scope: ElementRef) -> Gallery {
    Gallery {
        images: gallery_images(scope),
        videos: all_srcs(scope, r#"video source, [data-testid*="video"] source"#),
    }
}

fn gallery_images(scope: ElementRef) -> Vec<String> {
    all_srcs(
        scope,
        r#".gallery img, .gig-gallery img, [data-testid="gallery"] img, [data-testid*="image"] img"#,
    )
}

fn extract_seller(scope: ElementRef) -> Seller {
    let page_name = first_text(
        scope,
        r#"[data-testid="seller-name"], .seller-name, a[href*="/users/"]"#,
    );
    let edit_name = form_value(scope, r#"input[name="seller_name"], input[id*="seller_name"]"#);
    Seller {
        name: edit_name.or(page_name),
        rating: first_text(scope, r#".rating, [data-testid="rating"], .seller-rating"#),
        sold: first_text(scope, ".orders-sold, .seller-deliveries"),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(fixture: &str) -> DetailRecord {
        let html =
            std::fs::read_to_string(format!("tests/fixtures/{}.html", fixture)).unwrap();
        let doc = Html::parse_document(&html);
        extract_detail(&doc, "https://example.test/gig/sample")
    }

    #[test]
    fn edit_general_step() {
        let d = extract("gig_edit_general");
        assert_eq!(
            d.overview.title.as_deref(),
            Some("I Will Design A Professional Logo")
        );
        assert!(d
            .overview
            .description
            .as_deref()
            .unwrap()
            .starts_with("Unique logo design"));
        assert_eq!(d.overview.tags, vec!["logo", "branding", "design"]);
        // Nothing pricing-related on this step.
        assert!(d.pricing_packages.is_empty());
    }

    #[test]
    fn edit_pricing_step_reads_package_rows() {
        let d = extract("gig_edit_pricing");
        assert_eq!(d.pricing_packages.len(), 2);
        assert_eq!(d.pricing_packages[0].name.as_deref(), Some("Basic"));
        assert_eq!(d.pricing_packages[0].price.as_deref(), Some("$5"));
        assert_eq!(d.pricing_packages[1].name.as_deref(), Some("Premium"));
    }

    #[test]
    fn faq_rows_need_question_or_answer() {
        let d = extract("gig_edit_faq");
        assert_eq!(d.description_faq.faq.len(), 2);
        assert_eq!(
            d.description_faq.faq[0].question.as_deref(),
            Some("Do you provide source files?")
        );
        assert_eq!(d.description_faq.faq[1].answer.as_deref(), Some("Three."));
    }

    #[test]
    fn requirements_and_flags() {
        let d = extract("gig_edit_requirements");
        assert_eq!(d.requirements.len(), 2);
        assert_eq!(d.requirements[0].label.as_deref(), Some("Brand name"));
        assert!(d.requirements[0].required);
        assert_eq!(d.requirements[1].kind.as_deref(), Some("file"));
        assert!(!d.requirements[1].required);
    }

    #[test]
    fn public_view_falls_back_to_headings_and_price() {
        let d = extract("gig_public_view");
        assert_eq!(d.overview.title.as_deref(), Some("Video Editing Pro"));
        assert_eq!(d.pricing_packages.len(), 1);
        assert_eq!(d.pricing_packages[0].name.as_deref(), Some("Standard"));
        assert_eq!(d.pricing_packages[0].price.as_deref(), Some("$25"));
        assert_eq!(d.seller.name.as_deref(), Some("jo_edits"));
        assert_eq!(d.gallery.images.len(), 2);
    }

    #[test]
    fn empty_page_degrades_to_empty_record() {
        let doc = Html::parse_document("<html><head></head><body></body></html>");
        let d = extract_detail(&doc, "https://example.test/gig/none");
        assert!(d.overview.title.is_none());
        assert!(d.pricing_packages.is_empty());
        assert!(d.requirements.is_empty());
        assert!(d.description_faq.faq.is_empty());
    }
}
