//! Defines the [`Document`] type: one markdown source tracked through the
//! pipeline, from the bytes read at discovery to the rendered HTML written
//! to disk. Rendering is memoized on the document and the first render also
//! fills in the title and description when they were not given explicitly.

use crate::markdown::{escape, Renderer};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// The creation and update times of a [`Document`], as resolved from the
/// commit history. Both are the Unix epoch until resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timestamps {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A blog post or static page.
#[derive(Clone, Debug)]
pub struct Document {
    /// The repository-relative, `/`-separated path of the markdown source.
    pub source_path: String,

    /// The file the rendered page is written to. Assigned by the site
    /// assembler once the documents are sorted.
    pub output_path: PathBuf,

    /// [`Document::output_path`] relative to the output root, used for links
    /// between pages.
    pub link: String,

    pub title: Option<String>,
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    markdown: Vec<u8>,
    html: Option<String>,
}

impl Document {
    /// Reads the whole of `reader` as the document's markdown.
    pub fn from_reader<R: Read>(source_path: impl Into<String>, mut reader: R) -> io::Result<Self> {
        let mut markdown = Vec::new();
        reader.read_to_end(&mut markdown)?;
        Ok(Document {
            source_path: source_path.into(),
            output_path: PathBuf::new(),
            link: String::new(),
            title: None,
            description: None,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
            markdown,
            html: None,
        })
    }

    /// Renders the markdown to HTML on the first call and returns the
    /// memoized HTML on every later call. The first render extracts the
    /// title from the first `<h1>` and the description from the first
    /// `<blockquote>`, each only if not already set.
    pub fn render_html(&mut self, renderer: &dyn Renderer) -> &str {
        if self.html.is_none() {
            let html = renderer.render(&String::from_utf8_lossy(&self.markdown));
            if self.title.is_none() {
                self.title = extract_title(&html);
            }
            if self.description.is_none() {
                self.description = extract_description(&html);
            }
            self.html = Some(html);
        }
        self.html.as_deref().unwrap_or_default()
    }

    /// Sets an explicit plain-text title. It is stored HTML-escaped, like
    /// the titles extracted from the rendered HTML.
    pub fn set_title(&mut self, title: &str) {
        self.title = Some(escape(title));
    }

    /// The rendered HTML, if [`Document::render_html`] has run.
    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    /// The creation time in whole seconds since the Unix epoch. This is the
    /// prefix of the output file name.
    pub fn uid(&self) -> i64 {
        self.created_at.timestamp()
    }

    /// The source file name without its extension.
    pub fn stem(&self) -> &str {
        let name = self.source_path.rsplit('/').next().unwrap_or_default();
        Path::new(name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(name)
    }

    pub fn timestamps(&self) -> Timestamps {
        Timestamps {
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn set_timestamps(&mut self, timestamps: Timestamps) {
        self.created_at = timestamps.created_at;
        self.updated_at = timestamps.updated_at;
    }

    /// Copies the document under a different output path and link. The
    /// rendered HTML is shared as-is.
    pub fn duplicate(&self, output_path: PathBuf, link: impl Into<String>) -> Document {
        Document {
            output_path,
            link: link.into(),
            ..self.clone()
        }
    }
}

/// Sorts newest first by creation time. The sort is stable, so documents
/// created at the same instant keep their relative order.
pub fn sort_newest_first(documents: &mut [Document]) {
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn extract_title(html: &str) -> Option<String> {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    let title = TITLE.get_or_init(|| Regex::new(r"(?s)<h1 id=[^>]*>(.+?)</h1>").unwrap());
    title
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .map(|inner| inner_text(inner.as_str()))
        .find(|text| !text.is_empty())
}

fn extract_description(html: &str) -> Option<String> {
    static DESCRIPTION: OnceLock<Regex> = OnceLock::new();
    let description = DESCRIPTION
        .get_or_init(|| Regex::new(r"(?s)<blockquote>(.*?)</blockquote>").unwrap());
    description
        .captures(html)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner_text(inner.as_str()))
        .filter(|text| !text.is_empty())
}

/// Strips tags and collapses whitespace.
fn inner_text(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").unwrap());
    tag.replace_all(html, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
