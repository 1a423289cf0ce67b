//! Discovery: finds the markdown documents of one content directory of the
//! checked-out repository and renders each of them.
//!
//! Only the directory's own entries are considered. Hidden entries, anything
//! that isn't a regular file (symlinks included) and files without an `.md`
//! or `.markdown` extension are skipped. A content directory that is itself a
//! symlink must resolve to a directory inside the repository. The first
//! unreadable file aborts the scan of the whole directory.

use crate::document::Document;
use crate::markdown::Renderer;
use crate::sandbox;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

const EXTENSIONS: [&str; 2] = ["md", "markdown"];

/// Reads and renders the documents of `subdirectory`, a path relative to
/// `repository`. Documents come back in file name order with their
/// `source_path` relative to `repository`.
pub fn discover(repository: &Path, subdirectory: &str, renderer: &dyn Renderer) -> Result<Vec<Document>> {
    let root = sandbox::normalize(repository);
    let dir = sandbox::resolve(&root, subdirectory)?;
    debug!(path = %dir.display(), "discovering documents");

    let mut documents = Vec::new();
    for result in WalkDir::new(&dir)
        .follow_root_links(false)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name() {
        let entry = result.map_err(|err| {
            warn!(path = %dir.display(), error = %err, "listing content directory");
            Error::List {
                path: dir.clone(),
                err,
            }
        })?;

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            trace!(file = %name, "skipping hidden entry");
            continue;
        }
        if !entry.file_type().is_file() {
            trace!(file = %name, "skipping non-file entry");
            continue;
        }
        if !is_markdown(entry.path()) {
            trace!(file = %name, "skipping non-markdown file");
            continue;
        }

        let path = sandbox::resolve(&dir, entry.file_name())?;
        let source_path = source_path(&root, &path);
        let file = File::open(&path).map_err(|err| read_error(&path, err))?;
        let mut document =
            Document::from_reader(source_path, file).map_err(|err| read_error(&path, err))?;
        document.render_html(renderer);
        trace!(file = %document.source_path, title = ?document.title, "discovered document");
        documents.push(document);
    }

    debug!(path = %dir.display(), documents = documents.len(), "discovery done");
    Ok(documents)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| EXTENSIONS.contains(&ext))
}

/// `path` relative to `root`, `/`-separated the way git names files.
fn source_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: &Path, err: io::Error) -> Error {
    warn!(path = %path.display(), error = %err, "reading document");
    Error::Read {
        path: path.to_owned(),
        err,
    }
}

/// The result of a discovery.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error discovering documents.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the content directory, or a file in it, escapes the
    /// repository.
    #[error(transparent)]
    Sandbox(#[from] sandbox::Error),

    /// Returned when the content directory can't be listed.
    #[error("listing `{}`: {err}", path.display())]
    List {
        path: PathBuf,
        #[source]
        err: walkdir::Error,
    },

    /// Returned when a document can't be read.
    #[error("reading `{}`: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::markdown::MarkdownRenderer;
    use std::fs;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("posts");
        fs::create_dir_all(posts.join("nested")).unwrap();
        fs::write(posts.join("b.md"), "# Bravo\n").unwrap();
        fs::write(posts.join("a.markdown"), "# Alpha\n> first\n").unwrap();
        fs::write(posts.join("notes.txt"), "not markdown").unwrap();
        fs::write(posts.join(".draft.md"), "# Hidden\n").unwrap();
        fs::write(posts.join("nested").join("deep.md"), "# Deep\n").unwrap();
        dir
    }

    #[test]
    fn test_discover() -> Result<()> {
        let dir = fixture();
        let documents = discover(dir.path(), "posts", &MarkdownRenderer)?;

        let paths: Vec<&str> = documents.iter().map(|d| d.source_path.as_str()).collect();
        assert_eq!(paths, ["posts/a.markdown", "posts/b.md"]);
        assert_eq!(documents[0].title.as_deref(), Some("Alpha"));
        assert_eq!(documents[0].description.as_deref(), Some("first"));
        assert!(documents[1].html().unwrap().contains("Bravo"));
        Ok(())
    }

    #[test]
    fn test_discover_normalizes_subdirectory() -> Result<()> {
        let dir = fixture();
        let documents = discover(dir.path(), "./posts/nested/..", &MarkdownRenderer)?;
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[1].source_path, "posts/b.md");
        Ok(())
    }

    #[test]
    fn test_discover_rejects_escaping_subdirectory() {
        let dir = fixture();
        for subdirectory in ["..", "posts/../..", "/etc", "."] {
            assert!(
                matches!(
                    discover(dir.path(), subdirectory, &MarkdownRenderer),
                    Err(Error::Sandbox(_))
                ),
                "{}",
                subdirectory
            );
        }
    }

    #[test]
    fn test_discover_missing_directory() {
        let dir = fixture();
        assert!(matches!(
            discover(dir.path(), "drafts", &MarkdownRenderer),
            Err(Error::List { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_skips_symlinks() -> Result<()> {
        let dir = fixture();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.md"), "# Secret\n").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.md"),
            dir.path().join("posts").join("link.md"),
        )
        .unwrap();

        let documents = discover(dir.path(), "posts", &MarkdownRenderer)?;
        assert!(documents.iter().all(|d| d.source_path != "posts/link.md"));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_rejects_symlinked_directory() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.md"), "# Secret\n").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("posts")).unwrap();

        assert!(matches!(
            discover(dir.path(), "posts", &MarkdownRenderer),
            Err(Error::Sandbox(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_follows_symlinked_directory_inside() -> Result<()> {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path().join("posts"), dir.path().join("blog")).unwrap();

        let documents = discover(dir.path(), "blog", &MarkdownRenderer)?;
        let paths: Vec<&str> = documents.iter().map(|d| d.source_path.as_str()).collect();
        assert_eq!(paths, ["blog/a.markdown", "blog/b.md"]);
        Ok(())
    }

    #[test]
    fn test_source_path() {
        assert_eq!(
            source_path(Path::new("/srv/repo"), Path::new("/srv/repo/posts/a.md")),
            "posts/a.md"
        );
    }
}
