//! Converts markdown to HTML. The [`Renderer`] trait is the seam between a
//! [`crate::document::Document`] and the conversion itself, and
//! [`MarkdownRenderer`] is the fixed profile every page is rendered with:
//!
//! * headings get unique ids derived from their text,
//! * a leading `% ` title block becomes the first `<h1>`,
//! * a `<nav>` table of contents is emitted before the body,
//! * absolute links open in a new tab without leaking the referrer,
//! * images are lazy-loaded,
//! * `^sup^` and `~sub~` work inside words too (`mc^2^`, `H~2~O`).
//!
//! The conversion is total: every byte sequence renders to something.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use pulldown_cmark_escape::{escape_href, escape_html};
use std::collections::HashMap;

/// Converts a complete markdown document into HTML in a single pass.
pub trait Renderer {
    fn render(&self, markdown: &str) -> String;
}

/// The pulldown-cmark based [`Renderer`] used for every page.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, markdown: &str) -> String {
        let (title, body) = split_title_block(markdown);

        let mut converter = EventConverter::default();
        if let Some(title) = title {
            converter.push_title(&title);
        }
        for event in Parser::new_ext(body, options()) {
            converter.convert(event);
        }
        converter.flush_text();

        let mut out = String::with_capacity(markdown.len() * 2);
        if !converter.headings.is_empty() {
            push_toc(&mut out, &converter.headings);
        }
        html::push_html(&mut out, converter.events.into_iter());
        out
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_SUPERSCRIPT);
    options.insert(Options::ENABLE_SUBSCRIPT);
    options.insert(Options::ENABLE_DEFINITION_LIST);
    options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
    options
}

/// Splits a Pandoc-style title block (consecutive lines starting with `%` at
/// the very top of the document) from the rest of the markdown.
fn split_title_block(markdown: &str) -> (Option<String>, &str) {
    let mut lines = Vec::new();
    let mut rest = markdown;
    while let Some(line) = rest.strip_prefix('%') {
        let (line, tail) = match line.find('\n') {
            Some(i) => (&line[..i], &line[i + 1..]),
            None => (line, ""),
        };
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line);
        }
        rest = tail;
    }
    match lines.is_empty() {
        true => (None, markdown),
        false => (Some(lines.join(" ")), rest),
    }
}

/// A heading recorded for the table of contents.
struct TocEntry {
    level: usize,
    id: String,

    /// Escaped heading text.
    text: String,
}

struct PendingHeading {
    /// Index of the heading's `Start` event in the output.
    start: usize,
    explicit_id: Option<String>,
    text: String,
}

struct PendingImage {
    src: String,
    title: String,
    alt: String,

    /// Images nested in the alt text of this one.
    depth: usize,
}

/// Rewrites parser events into the events handed to
/// [`pulldown_cmark::html::push_html`], collecting headings on the way.
#[derive(Default)]
struct EventConverter<'a> {
    events: Vec<Event<'a>>,
    headings: Vec<TocEntry>,
    ids: HeadingIds,
    heading: Option<PendingHeading>,
    image: Option<PendingImage>,
    external_link: bool,
    code_block: bool,

    /// Consecutive text, held back until the next non-text event so that
    /// script markers split across events are seen together.
    text: String,
}

impl<'a> EventConverter<'a> {
    fn push_title(&mut self, title: &str) {
        let id = self.ids.claim(slug_of(title));
        let text = escape(title);
        self.events.push(Event::Html(CowStr::from(format!(
            "<h1 id=\"{}\" class=\"title\">{}</h1>\n",
            escape(&id),
            text
        ))));
        self.headings.push(TocEntry { level: 1, id, text });
    }

    fn convert(&mut self, event: Event<'a>) {
        if let Some(image) = self.image.as_mut() {
            match event {
                Event::Start(Tag::Image { .. }) => image.depth += 1,
                Event::End(TagEnd::Image) if image.depth > 0 => image.depth -= 1,
                Event::End(TagEnd::Image) => {
                    if let Some(image) = self.image.take() {
                        self.events.push(Event::InlineHtml(CowStr::from(image_tag(&image))));
                    }
                }
                Event::Text(text) | Event::Code(text) => image.alt.push_str(&text),
                _ => {}
            }
            return;
        }

        match event {
            Event::Text(text) if !self.code_block => {
                self.text.push_str(&text);
                return;
            }
            _ => self.flush_text(),
        }

        match event {
            Event::Start(Tag::CodeBlock(_)) => {
                self.code_block = true;
                self.events.push(event);
            }
            Event::End(TagEnd::CodeBlock) => {
                self.code_block = false;
                self.events.push(event);
            }
            Event::Start(Tag::Heading {
                level,
                id,
                classes,
                attrs,
            }) => {
                self.heading = Some(PendingHeading {
                    start: self.events.len(),
                    explicit_id: id.map(|id| id.into_string()),
                    text: String::new(),
                });
                self.events.push(Event::Start(Tag::Heading {
                    level,
                    id: None,
                    classes,
                    attrs,
                }));
            }
            Event::End(TagEnd::Heading(level)) => {
                if let Some(pending) = self.heading.take() {
                    let id = self
                        .ids
                        .claim(pending.explicit_id.unwrap_or_else(|| slug_of(&pending.text)));
                    if let Some(Event::Start(Tag::Heading { id: slot, .. })) =
                        self.events.get_mut(pending.start)
                    {
                        *slot = Some(CowStr::from(id.clone()));
                    }
                    self.headings.push(TocEntry {
                        level: level as usize,
                        id,
                        text: escape(pending.text.trim()),
                    });
                }
                self.events.push(Event::End(TagEnd::Heading(level)));
            }
            Event::Start(Tag::Image {
                dest_url, title, ..
            }) => {
                self.image = Some(PendingImage {
                    src: dest_url.into_string(),
                    title: title.into_string(),
                    alt: String::new(),
                    depth: 0,
                });
            }
            Event::Start(Tag::Link {
                dest_url, title, ..
            }) if is_external(&dest_url) => {
                self.external_link = true;
                self.events
                    .push(Event::InlineHtml(CowStr::from(external_anchor(&dest_url, &title))));
            }
            Event::End(TagEnd::Link) if self.external_link => {
                self.external_link = false;
                self.events.push(Event::InlineHtml(CowStr::Borrowed("</a>")));
            }
            event => {
                if let (Some(heading), Event::Text(text) | Event::Code(text)) =
                    (self.heading.as_mut(), &event)
                {
                    heading.text.push_str(text);
                }
                self.events.push(event);
            }
        }
    }

    /// Emits the held-back text, turning `^x^` into superscript and `~x~`
    /// into subscript. The parser already handles markers between words;
    /// what is left here are markers inside a word.
    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        let mut plain = String::new();
        let mut rest = text.as_str();

        while let Some(i) = rest.find(['^', '~']) {
            plain.push_str(&rest[..i]);
            let marker = &rest[i..i + 1];
            let after = &rest[i + 1..];
            let script = match after.find(marker) {
                Some(j) if !plain.ends_with(marker) => {
                    let inner = &after[..j];
                    let valid = !inner.is_empty()
                        && !inner.contains(char::is_whitespace)
                        && !after[j + 1..].starts_with(marker);
                    valid.then_some((inner, &after[j + 1..]))
                }
                _ => None,
            };
            match script {
                Some((inner, tail)) => {
                    self.push_plain(std::mem::take(&mut plain));
                    let (start, end) = match marker {
                        "^" => (Tag::Superscript, TagEnd::Superscript),
                        _ => (Tag::Subscript, TagEnd::Subscript),
                    };
                    self.events.push(Event::Start(start));
                    self.push_plain(inner.to_owned());
                    self.events.push(Event::End(end));
                    rest = tail;
                }
                None => {
                    plain.push_str(marker);
                    rest = after;
                }
            }
        }
        plain.push_str(rest);
        self.push_plain(plain);
    }

    fn push_plain(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        if let Some(heading) = self.heading.as_mut() {
            heading.text.push_str(&text);
        }
        self.events.push(Event::Text(CowStr::from(text)));
    }
}

/// Hands out heading ids, suffixing repeats with `-1`, `-2`, ...
#[derive(Default)]
struct HeadingIds(HashMap<String, usize>);

impl HeadingIds {
    fn claim(&mut self, base: String) -> String {
        let seen = self.0.entry(base.clone()).or_insert(0);
        let id = match *seen {
            0 => base,
            n => format!("{}-{}", base, n),
        };
        *seen += 1;
        id
    }
}

fn slug_of(text: &str) -> String {
    match slug::slugify(text) {
        slug if slug.is_empty() => String::from("section"),
        slug => slug,
    }
}

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

fn external_anchor(href: &str, title: &str) -> String {
    let title = match title.is_empty() {
        true => String::new(),
        false => format!(" title=\"{}\"", escape(title)),
    };
    format!(
        "<a href=\"{}\"{} target=\"_blank\" rel=\"nofollow noopener noreferrer\">",
        escape_url(href),
        title
    )
}

fn image_tag(image: &PendingImage) -> String {
    let title = match image.title.is_empty() {
        true => String::new(),
        false => format!(" title=\"{}\"", escape(&image.title)),
    };
    format!(
        "<img src=\"{}\" alt=\"{}\"{} loading=\"lazy\" />",
        escape_url(&image.src),
        escape(&image.alt),
        title
    )
}

/// Writes the nested `<nav>` table of contents for `headings`.
fn push_toc(out: &mut String, headings: &[TocEntry]) {
    let base = headings.iter().map(|h| h.level).min().unwrap_or(1);
    let mut depth = 0;
    let mut open_item = false;

    out.push_str("<nav>\n<ul>\n");
    for heading in headings {
        let target = heading.level - base;
        while depth < target {
            if !open_item {
                out.push_str("<li>");
            }
            out.push_str("\n<ul>\n");
            depth += 1;
            open_item = false;
        }
        while depth > target {
            if open_item {
                out.push_str("</li>\n");
            }
            out.push_str("</ul>\n");
            depth -= 1;
            open_item = true;
        }
        if open_item {
            out.push_str("</li>\n");
        }
        out.push_str(&format!("<li><a href=\"#{}\">{}</a>", escape(&heading.id), heading.text));
        open_item = true;
    }
    while depth > 0 {
        if open_item {
            out.push_str("</li>\n");
        }
        out.push_str("</ul>\n");
        depth -= 1;
        open_item = true;
    }
    if open_item {
        out.push_str("</li>\n");
    }
    out.push_str("</ul>\n</nav>\n\n");
}

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    // writing into a String cannot fail
    let _ = escape_html(&mut out, s);
    out
}

/// Escapes a link or image destination for an `href`/`src` attribute,
/// percent-encoding what is not allowed in a URL.
fn escape_url(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let _ = escape_href(&mut out, s);
    out
}
