//! Deterministic field-level merge of partial detail records.
//!
//! One typed policy, applied everywhere a later observation folds into an
//! accumulator: nested records recurse, sequences take the set union in
//! first-seen order, scalars overwrite only when the incoming value is
//! present and non-blank. A later, less-informative visit can therefore
//! never blank out a field an earlier visit populated.

use chrono::{DateTime, Utc};

use crate::model::{
    DescriptionFaq, DetailRecord, FaqItem, Gallery, Overview, Package, Requirement, Seller,
};

pub trait Merge {
    fn merge_from(&mut self, incoming: Self);
}

impl Merge for Option<String> {
    fn merge_from(&mut self, incoming: Self) {
        if let Some(v) = incoming {
            if !v.trim().is_empty() {
                *self = Some(v);
            }
        }
    }
}

impl Merge for Option<DateTime<Utc>> {
    fn merge_from(&mut self, incoming: Self) {
        if incoming.is_some() {
            *self = incoming;
        }
    }
}

/// Set union preserving first-seen order, never a replacement.
impl<T: PartialEq> Merge for Vec<T> {
    fn merge_from(&mut self, incoming: Self) {
        for item in incoming {
            if !self.contains(&item) {
                self.push(item);
            }
        }
    }
}

impl Merge for Overview {
    fn merge_from(&mut self, incoming: Self) {
        self.title.merge_from(incoming.title);
        self.description.merge_from(incoming.description);
        self.tags.merge_from(incoming.tags);
        self.images.merge_from(incoming.images);
    }
}

impl Merge for DescriptionFaq {
    fn merge_from(&mut self, incoming: Self) {
        self.description.merge_from(incoming.description);
        self.faq.merge_from(incoming.faq);
    }
}

impl Merge for Gallery {
    fn merge_from(&mut self, incoming: Self) {
        self.images.merge_from(incoming.images);
        self.videos.merge_from(incoming.videos);
    }
}

impl Merge for Seller {
    fn merge_from(&mut self, incoming: Self) {
        self.name.merge_from(incoming.name);
        self.rating.merge_from(incoming.rating);
        self.sold.merge_from(incoming.sold);
    }
}

impl Merge for DetailRecord {
    fn merge_from(&mut self, incoming: Self) {
        self.url.merge_from(incoming.url);
        self.title.merge_from(incoming.title);
        self.overview.merge_from(incoming.overview);
        self.pricing_packages.merge_from(incoming.pricing_packages);
        self.description_faq.merge_from(incoming.description_faq);
        self.requirements.merge_from(incoming.requirements);
        self.gallery.merge_from(incoming.gallery);
        self.seller.merge_from(incoming.seller);
        self.error.merge_from(incoming.error);
        self.scraped_at.merge_from(incoming.scraped_at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec() -> DetailRecord {
        DetailRecord::default()
    }

    #[test]
    fn blank_never_overwrites() {
        let mut acc = rec();
        acc.title = Some("Logo Design".into());
        acc.seller.name = Some("Jo".into());

        let mut later = rec();
        later.title = Some("   ".into());
        later.seller.name = None;
        acc.merge_from(later);

        assert_eq!(acc.title.as_deref(), Some("Logo Design"));
        assert_eq!(acc.seller.name.as_deref(), Some("Jo"));
    }

    #[test]
    fn nonblank_overwrites() {
        let mut acc = rec();
        acc.title = Some("Old".into());
        let mut later = rec();
        later.title = Some("New Title".into());
        acc.merge_from(later);
        assert_eq!(acc.title.as_deref(), Some("New Title"));
    }

    #[test]
    fn arrays_union_in_first_seen_order() {
        let mut acc = rec();
        acc.overview.tags = vec!["a".into()];
        let mut later = rec();
        later.overview.tags = vec!["a".into(), "b".into()];
        acc.merge_from(later);
        assert_eq!(acc.overview.tags, vec!["a", "b"]);
    }

    #[test]
    fn packages_not_duplicated_across_visits() {
        let basic = Package {
            name: Some("Basic".into()),
            price: Some("$5".into()),
            desc: None,
        };

        let mut acc = rec();
        acc.pricing_packages = vec![basic.clone()];

        let mut later = rec();
        later.pricing_packages = vec![basic.clone()];
        later.seller.name = Some("Jo".into());
        acc.merge_from(later);

        assert_eq!(acc.pricing_packages, vec![basic]);
        assert_eq!(acc.seller.name.as_deref(), Some("Jo"));
    }

    #[test]
    fn monotone_over_a_sequence_of_visits() {
        let mut acc = rec();

        let mut v1 = rec();
        v1.overview.description = Some("full description".into());
        v1.description_faq.faq = vec![FaqItem {
            question: Some("Q1".into()),
            answer: Some("A1".into()),
        }];
        acc.merge_from(v1);

        let mut v2 = rec();
        v2.overview.description = Some(String::new());
        v2.requirements = vec![Requirement {
            label: Some("Brand name".into()),
            kind: None,
            required: true,
        }];
        acc.merge_from(v2);

        let v3 = rec();
        acc.merge_from(v3);

        assert_eq!(acc.overview.description.as_deref(), Some("full description"));
        assert_eq!(acc.description_faq.faq.len(), 1);
        assert_eq!(acc.requirements.len(), 1);
    }
}
