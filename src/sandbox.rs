//! Lexical path containment. Every path derived from configuration or from
//! repository contents is joined through [`join`] so that `..` segments can
//! never walk out of the directory they are meant to live in. Paths that are
//! read from, rather than written to, go through [`resolve`], which also
//! follows symlinks.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Normalizes `path` without touching the file system: `.` segments and
/// repeated separators disappear and `..` removes the preceding segment. A
/// `..` that has nothing left to remove is kept for relative paths and
/// dropped for absolute ones (`/..` is `/`).
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Reports whether `candidate` resolves strictly below `root`. Both sides
/// are normalized first; `root` itself is not contained in `root`.
pub fn contain(root: &Path, candidate: &Path) -> bool {
    let root = normalize(root);
    let candidate = normalize(candidate);
    match candidate.strip_prefix(&root) {
        Ok(rest) => {
            rest.components().next().is_some()
                && rest
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)))
        }
        Err(_) => false,
    }
}

/// Joins `relative` onto `root` and returns the normalized result, or
/// [`Error`] when the result is not strictly below `root`. An absolute
/// `relative` replaces `root` entirely and is therefore rejected unless it
/// happens to point below `root`.
pub fn join(root: &Path, relative: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let candidate = root.join(relative.as_ref());
    if contain(root, &candidate) {
        Ok(normalize(&candidate))
    } else {
        Err(Error {
            root: root.to_owned(),
            path: candidate,
        })
    }
}

/// Like [`join`], for paths that are about to be read: when the result
/// exists, its symlinks are followed and the real path must still lie below
/// the real `root`. A path that doesn't exist is returned as joined, so that
/// opening it reports the missing file.
pub fn resolve(root: &Path, relative: impl AsRef<Path>) -> Result<PathBuf, Error> {
    let path = join(root, relative)?;
    if let (Ok(real_root), Ok(real_path)) = (root.canonicalize(), path.canonicalize()) {
        if !contain(&real_root, &real_path) {
            return Err(Error {
                root: root.to_owned(),
                path: real_path,
            });
        }
    }
    Ok(path)
}

/// Returned when a path escapes the directory it must stay within.
#[derive(Debug, Error)]
#[error("path `{}` escapes `{}`", path.display(), root.display())]
pub struct Error {
    /// The directory the path had to stay within.
    pub root: PathBuf,

    /// The offending path, as joined but before normalization.
    pub path: PathBuf,
}
