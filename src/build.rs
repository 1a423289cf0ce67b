//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output site: cloning the repository into a private
//! workspace, discovering and rendering the documents ([`crate::discover`]),
//! dating them from the commit log ([`crate::history`]), grouping them by
//! year ([`crate::summary`]) and writing every page ([`crate::write`]).

use crate::config::{self, Config};
use crate::discover::{self, discover};
use crate::document::{sort_newest_first, Document};
use crate::git::{self, Remote};
use crate::history::{self, CommitLog};
use crate::markdown::MarkdownRenderer;
use crate::sandbox;
use crate::summary::summarize;
use crate::template::{self, Theme, FAVICON};
use crate::write::{self, create, Writer};
use chrono::Utc;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// The home page: a copy of the newest listed document.
pub const INDEX_PAGE: &str = "index.htm";

/// The page listing every listed document by year.
pub const POST_LIST_PAGE: &str = "post-list.htm";

pub const ABOUT_ME_PAGE: &str = "about-me.htm";
pub const LICENSE_PAGE: &str = "license.htm";

/// What to build and where.
#[derive(Clone, Debug)]
pub struct Options {
    pub remote: Remote,

    /// The output root. It is deleted and recreated on every build.
    pub output: PathBuf,

    /// Whether the cloned workspace is removed once the build is over,
    /// successful or not.
    pub purge: bool,
}

/// Builds the site described by `config` from the repository named in
/// `options`. The repository is cloned into `<tmp>/gitleaf.<pid>`.
pub fn build_site(config: Config, options: &Options) -> Result<()> {
    let workspace = Workspace::create(
        std::env::temp_dir().join(format!("gitleaf.{}", std::process::id())),
        options.purge,
    )?;
    let repository = options.remote.clone_into(&workspace.path).map_err(|err| {
        warn!(repository = %options.remote.redacted(), error = %err, "clone repository");
        err
    })?;
    generate(config, repository.root(), &repository, &options.output)
}

/// Generates the site from the checked-out repository at `root`, dating
/// documents with `log`, into `output`.
pub fn generate<L: CommitLog>(mut config: Config, root: &Path, log: &L, output: &Path) -> Result<()> {
    config.load_overrides(root)?;
    let theme = Theme::load(&config, root)?;

    let renderer = MarkdownRenderer;
    let mut documents = Vec::new();
    for workdir in &config.workdir {
        documents.extend(discover(root, workdir, &renderer)?);
    }
    info!(documents = documents.len(), "discovered documents");

    recreate(output)?;

    // Nothing is written back until the whole log has been read.
    let timestamps = history::resolve(log, &documents).map_err(|err| {
        warn!(error = %err, "cannot resolve document history");
        Error::History(Box::new(err))
    })?;
    history::apply(&mut documents, timestamps);
    sort_newest_first(&mut documents);
    assign_output_paths(&mut documents, output, config.timestamp_prefix)?;

    let summary = summarize(
        documents
            .iter()
            .filter(|doc| !config.is_hidden(&doc.source_path)),
    );
    let writer = Writer {
        theme: &theme,
        config: &config,
        now: Utc::now(),
    };

    for document in &documents {
        writer.write_document_file(document, &summary)?;
    }

    match summary.newest() {
        Some(newest) => {
            let index = newest.duplicate(sandbox::join(output, INDEX_PAGE)?, INDEX_PAGE);
            writer.write_document_file(&index, &summary)?;
        }
        None => warn!(path = %output.display(), "no listed documents, skipping {}", INDEX_PAGE),
    }
    writer.write_summary_file(&sandbox::join(output, POST_LIST_PAGE)?, &summary)?;

    for (source, page) in [
        (&config.about_me, ABOUT_ME_PAGE),
        (&config.license, LICENSE_PAGE),
    ] {
        if let Some(source) = source {
            let mut document = read_page(root, source)?;
            document.render_html(&renderer);
            let document = document.duplicate(sandbox::join(output, page)?, page);
            writer.write_document_file(&document, &summary)?;
        }
    }

    write_favicon(&config, root, output)?;
    info!(path = %output.display(), pages = documents.len(), "site generated");
    Ok(())
}

/// Names every document's output file `<uid>-<stem>.htm` (or `<stem>.htm`)
/// below `output`. Documents sharing a name overwrite each other in write
/// order.
fn assign_output_paths(documents: &mut [Document], output: &Path, timestamp_prefix: bool) -> Result<()> {
    let mut seen: HashMap<String, String> = HashMap::new();
    for document in documents.iter_mut() {
        let link = match timestamp_prefix {
            true => format!("{}-{}.htm", document.uid(), document.stem()),
            false => format!("{}.htm", document.stem()),
        };
        if let Some(previous) = seen.insert(link.clone(), document.source_path.clone()) {
            warn!(
                file = %link,
                path = %document.source_path,
                previous = %previous,
                "output name collision, the last document written wins"
            );
        }
        document.output_path = sandbox::join(output, &link)?;
        document.link = link;
    }
    Ok(())
}

fn read_page(root: &Path, source: &Path) -> Result<Document> {
    let path = sandbox::resolve(root, source)?;
    debug!(path = %path.display(), "read page source");
    let read = |err| Error::Read {
        path: path.clone(),
        err,
    };
    let file = File::open(&path).map_err(read)?;
    Document::from_reader(source.to_string_lossy(), file).map_err(read)
}

/// Writes the favicon: the configured file copied byte-for-byte, else the
/// built-in icon.
fn write_favicon(config: &Config, root: &Path, output: &Path) -> Result<()> {
    let contents = match &config.favicon {
        None => FAVICON.to_vec(),
        Some(source) => {
            let path = sandbox::resolve(root, source)?;
            fs::read(&path).map_err(|err| {
                warn!(path = %path.display(), error = %err, "cannot open favicon");
                Error::Read { path, err }
            })?
        }
    };
    let path = sandbox::join(output, config.favicon_link())?;
    debug!(path = %path.display(), bytes = contents.len(), "write favicon");
    create(&path)
        .and_then(|mut file| file.write_all(&contents))
        .map_err(|err| Error::Write { path, err })
}

/// Deletes `output` if it exists and creates it empty.
fn recreate(output: &Path) -> Result<()> {
    if !sandbox::normalize(output)
        .components()
        .any(|component| matches!(component, Component::Normal(_)))
    {
        return Err(Error::Output(output.to_owned()));
    }
    rmdir(output)?;
    debug!(path = %output.display(), "create output directory");
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(output).map_err(|err| Error::Write {
        path: output.to_owned(),
        err,
    })
}

fn rmdir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

/// The private directory the repository is cloned into. Dropping it removes
/// the directory when purging is on.
struct Workspace {
    path: PathBuf,
    purge: bool,
}

impl Workspace {
    /// Creates an empty workspace at `path`, clearing whatever a previous
    /// run with the same process id left behind.
    fn create(path: PathBuf, purge: bool) -> Result<Workspace> {
        rmdir(&path)?;
        fs::create_dir_all(&path).map_err(|err| Error::Write {
            path: path.clone(),
            err,
        })?;
        debug!(path = %path.display(), purge, "created workspace");
        Ok(Workspace { path, purge })
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.purge {
            info!(path = %self.path.display(), "keeping workspace");
            return;
        }
        if let Err(err) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %err, "cannot purge workspace");
        }
    }
}

/// The result of a site build.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Any of them aborts the whole build.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error(transparent)]
    Theme(#[from] template::Error),

    #[error(transparent)]
    Discover(#[from] discover::Error),

    #[error(transparent)]
    Git(#[from] git::Error),

    /// Returned when the commit log can't be read.
    #[error("resolving document history: {0}")]
    History(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Returned when an output path escapes the output root.
    #[error(transparent)]
    Sandbox(#[from] sandbox::Error),

    /// Returned for errors writing pages.
    #[error(transparent)]
    Page(#[from] write::Error),

    /// Returned when the output root names no directory of its own, such as
    /// `.`, `..` or `/`.
    #[error("refusing to use `{}` as the output directory", .0.display())]
    Output(PathBuf),

    /// Returned when a page source or the favicon can't be read.
    #[error("reading `{}`: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when an output file or directory can't be written.
    #[error("writing `{}`: {err}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned for I/O problems while cleaning output directories.
    #[error("cleaning directory `{}`: {err}", path.display())]
    Clean {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
}
