//! Groups documents by the calendar year (UTC) they were created in. The
//! resulting [`Summary`] drives the post-list page and is handed to every
//! page template for navigation.

use crate::document::Document;
use chrono::Datelike;
use std::collections::BTreeMap;

/// The documents created in one year, newest first.
#[derive(Debug)]
pub struct Category<'a> {
    /// The four-digit year.
    pub key: String,
    pub documents: Vec<&'a Document>,
}

/// Year [`Category`]s, newest year first.
#[derive(Debug, Default)]
pub struct Summary<'a> {
    pub categories: Vec<Category<'a>>,
}

impl<'a> Summary<'a> {
    /// The most recently created document.
    pub fn newest(&self) -> Option<&'a Document> {
        self.categories
            .first()
            .and_then(|category| category.documents.first().copied())
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Builds the [`Summary`] of `documents`. The input need not be sorted.
pub fn summarize<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Summary<'a> {
    let mut years: BTreeMap<String, Vec<&'a Document>> = BTreeMap::new();
    for document in documents {
        years
            .entry(format!("{:04}", document.created_at.year()))
            .or_default()
            .push(document);
    }

    Summary {
        categories: years
            .into_iter()
            .rev()
            .map(|(key, mut documents)| {
                documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Category { key, documents }
            })
            .collect(),
    }
}
