use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimal record discovered during the row-scan phase. Held only until
/// detail extraction consumes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Package {
    pub name: Option<String>,
    pub price: Option<String>,
    pub desc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: Option<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptionFaq {
    pub description: Option<String>,
    #[serde(default)]
    pub faq: Vec<FaqItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gallery {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    pub name: Option<String>,
    pub rating: Option<String>,
    pub sold: Option<String>,
}

/// Full structured record for one listing. Every leaf is optional: a field
/// missing on one sub-view is legitimate absence, not an error, and the
/// merge policy guarantees it never overwrites an earlier observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub url: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub overview: Overview,
    #[serde(default)]
    pub pricing_packages: Vec<Package>,
    #[serde(default)]
    pub description_faq: DescriptionFaq,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub gallery: Gallery,
    #[serde(default)]
    pub seller: Seller,
    pub error: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl DetailRecord {
    /// Seed record for a listing before any step visit.
    pub fn from_summary(summary: &ListingSummary) -> Self {
        let base = summary
            .edit_url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| summary.url.clone());
        DetailRecord {
            url: Some(base),
            title: Some(summary.title.clone()),
            ..Default::default()
        }
    }
}
