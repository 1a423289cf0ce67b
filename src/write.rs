//! Applies the [`Theme`] templates to documents and summaries and writes the
//! resulting pages. Pages go to a [`Sink`]: standard output for the
//! single-file command, or a file created with truncate semantics.

use crate::config::Config;
use crate::document::Document;
use crate::summary::Summary;
use crate::template::{self, Theme};
use chrono::{DateTime, SecondsFormat, Utc};
use gtmpl::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Where a page is written. `-` on the command line means standard output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sink {
    Stdout,
    File(PathBuf),
}

impl FromStr for Sink {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "" | "-" => Sink::Stdout,
            path => Sink::File(PathBuf::from(path)),
        })
    }
}

impl Sink {
    /// Opens the sink for writing. Dropping the writer closes it.
    pub fn open(&self) -> io::Result<Box<dyn Write>> {
        match self {
            Sink::Stdout => Ok(Box::new(io::stdout())),
            Sink::File(path) => Ok(Box::new(create(path)?)),
        }
    }
}

/// Creates (or truncates) `path` for writing, readable and writable by its
/// owner and readable by its group.
pub fn create(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }
    options.open(path)
}

/// Renders pages through a [`Theme`]. Every page sees the site settings, the
/// inlined stylesheet and the time the run started.
pub struct Writer<'a> {
    pub theme: &'a Theme,
    pub config: &'a Config,
    pub now: DateTime<Utc>,
}

impl Writer<'_> {
    fn page(&self, summary: &Summary) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site".to_owned(), self.config.into());
        m.insert("summary".to_owned(), summary.into());
        m.insert("style".to_owned(), Value::String(self.theme.style.clone()));
        m.insert(
            "utc_now".to_owned(),
            Value::String(self.now.to_rfc3339_opts(SecondsFormat::Secs, true)),
        );
        m
    }

    /// Writes `document` through the post template. The document must have
    /// been rendered.
    pub fn write_document<W: Write>(&self, w: &mut W, document: &Document, summary: &Summary) -> Result<()> {
        if document.html().is_none() {
            return Err(Error::NotRendered(document.source_path.clone()));
        }
        let mut page = self.page(summary);
        page.insert("post".to_owned(), document.into());
        template::execute(&self.theme.post, Value::Object(page), w)?;
        w.flush()?;
        Ok(())
    }

    /// Writes the post-list page for `summary`.
    pub fn write_summary<W: Write>(&self, w: &mut W, summary: &Summary) -> Result<()> {
        template::execute(&self.theme.list, Value::Object(self.page(summary)), w)?;
        w.flush()?;
        Ok(())
    }

    /// Writes `document` to its own [`Document::output_path`].
    pub fn write_document_file(&self, document: &Document, summary: &Summary) -> Result<()> {
        debug!(path = %document.output_path.display(), source = %document.source_path, "write page");
        let mut file = create(&document.output_path).map_err(|err| Error::Create {
            path: document.output_path.clone(),
            err,
        })?;
        self.write_document(&mut file, document, summary)
    }

    /// Writes the post-list page for `summary` to `path`.
    pub fn write_summary_file(&self, path: &Path, summary: &Summary) -> Result<()> {
        debug!(path = %path.display(), "write post list");
        let mut file = create(path).map_err(|err| Error::Create {
            path: path.to_owned(),
            err,
        })?;
        self.write_summary(&mut file, summary)
    }
}

/// The result of a page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug, Error)]
pub enum Error {
    /// An error during templating.
    #[error(transparent)]
    Template(#[from] template::Error),

    /// Returned when an output file can't be created.
    #[error("creating `{}`: {err}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when a document is written before it was rendered.
    #[error("document `{0}` was never rendered")]
    NotRendered(String),

    /// An error writing the output.
    #[error(transparent)]
    Io(#[from] io::Error),
}
