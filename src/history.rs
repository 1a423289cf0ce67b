//! Dates documents by their commit history. [`resolve`] walks a
//! [`CommitLog`] restricted to the documents' paths and works out each
//! document's [`Timestamps`] without touching the documents; [`apply`]
//! writes them back once resolution has fully succeeded.

use crate::document::{Document, Timestamps};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A commit as seen by the history resolver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub id: String,
    pub authored_at: DateTime<Utc>,

    /// Repository-relative, `/`-separated paths changed by the commit.
    pub paths: Vec<String>,
}

/// A source of commits.
pub trait CommitLog {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the commits that touch at least one of `paths`, **newest
    /// first**. [`resolve`] depends on this order: the first commit it visits
    /// for a path is the update time and the last one the creation time.
    fn commits(&self, paths: &[&str]) -> Result<Vec<Commit>, Self::Error>;
}

/// Resolves the [`Timestamps`] of every document, in the same order as
/// `documents`. For each path the first visited commit (the newest) sets
/// `updated_at` and every visited commit overwrites `created_at`, which
/// therefore ends on the oldest. Documents without any commit keep the zero
/// timestamps.
pub fn resolve<L: CommitLog>(log: &L, documents: &[Document]) -> Result<Vec<Timestamps>, L::Error> {
    let index: HashMap<&str, usize> = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| (doc.source_path.as_str(), i))
        .collect();

    let mut created: Vec<Option<DateTime<Utc>>> = vec![None; documents.len()];
    let mut updated: Vec<Option<DateTime<Utc>>> = vec![None; documents.len()];

    if !index.is_empty() {
        let mut paths: Vec<&str> = index.keys().copied().collect();
        paths.sort_unstable();

        for commit in log.commits(&paths)? {
            for path in &commit.paths {
                match index.get(path.as_str()) {
                    Some(&i) => {
                        updated[i].get_or_insert(commit.authored_at);
                        created[i] = Some(commit.authored_at);
                    }
                    None => warn!(
                        commit = %commit.id,
                        file = %path,
                        "commit touches a file outside the document set"
                    ),
                }
            }
        }
    }

    Ok(documents
        .iter()
        .zip(created.into_iter().zip(updated))
        .map(|(doc, times)| match times {
            (Some(created_at), Some(updated_at)) => {
                debug!(path = %doc.source_path, %created_at, %updated_at, "resolved history");
                Timestamps {
                    created_at,
                    updated_at,
                }
            }
            _ => {
                warn!(path = %doc.source_path, "no commit history for document");
                Timestamps::default()
            }
        })
        .collect())
}

/// Writes resolved timestamps back onto the documents they were resolved
/// for.
pub fn apply(documents: &mut [Document], timestamps: Vec<Timestamps>) {
    for (doc, timestamps) in documents.iter_mut().zip(timestamps) {
        doc.set_timestamps(timestamps);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::fmt;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn commit(id: &str, secs: i64, paths: &[&str]) -> Commit {
        Commit {
            id: id.to_owned(),
            authored_at: at(secs),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn document(path: &str) -> Document {
        Document::from_reader(path, &b""[..]).unwrap()
    }

    /// An in-memory, newest-first log that records the queried paths.
    struct MemoryLog {
        commits: Vec<Commit>,
        queried: RefCell<Vec<String>>,
    }

    impl MemoryLog {
        fn new(commits: Vec<Commit>) -> Self {
            MemoryLog {
                commits,
                queried: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommitLog for MemoryLog {
        type Error = Infallible;

        fn commits(&self, paths: &[&str]) -> Result<Vec<Commit>, Infallible> {
            self.queried
                .borrow_mut()
                .extend(paths.iter().map(|p| p.to_string()));
            Ok(self
                .commits
                .iter()
                .filter(|c| c.paths.iter().any(|p| paths.contains(&p.as_str())))
                .cloned()
                .collect())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "broken log")
        }
    }

    impl std::error::Error for Broken {}

    struct BrokenLog;

    impl CommitLog for BrokenLog {
        type Error = Broken;

        fn commits(&self, _: &[&str]) -> Result<Vec<Commit>, Broken> {
            Err(Broken)
        }
    }

    #[test]
    fn test_resolve_first_and_last_seen() {
        let log = MemoryLog::new(vec![
            commit("c3", 3, &["a.md"]),
            commit("c2", 2, &["b.md"]),
            commit("c1", 1, &["a.md"]),
        ]);
        let docs = vec![document("a.md"), document("b.md")];
        let resolved = resolve(&log, &docs).unwrap();

        assert_eq!(
            resolved[0],
            Timestamps {
                created_at: at(1),
                updated_at: at(3)
            }
        );
        assert_eq!(
            resolved[1],
            Timestamps {
                created_at: at(2),
                updated_at: at(2)
            }
        );
        assert_eq!(*log.queried.borrow(), ["a.md", "b.md"]);
    }

    #[test]
    fn test_resolve_skips_unknown_paths() {
        let log = MemoryLog::new(vec![commit("c1", 5, &["a.md", "README.md"])]);
        let docs = vec![document("a.md")];
        let resolved = resolve(&log, &docs).unwrap();
        assert_eq!(resolved[0].created_at, at(5));
    }

    #[test]
    fn test_resolve_leaves_untracked_documents_at_zero() {
        let log = MemoryLog::new(vec![commit("c1", 5, &["a.md"])]);
        let docs = vec![document("a.md"), document("draft.md")];
        let resolved = resolve(&log, &docs).unwrap();
        assert_eq!(resolved[1], Timestamps::default());
    }

    #[test]
    fn test_resolve_without_documents_skips_the_log() {
        let log = MemoryLog::new(vec![commit("c1", 5, &["a.md"])]);
        assert!(resolve(&log, &[]).unwrap().is_empty());
        assert!(log.queried.borrow().is_empty());
    }

    #[test]
    fn test_resolve_failure_leaves_documents_untouched() {
        let mut docs = vec![document("a.md")];
        match resolve(&BrokenLog, &docs) {
            Ok(resolved) => apply(&mut docs, resolved),
            Err(err) => assert_eq!(err.to_string(), "broken log"),
        }
        assert_eq!(docs[0].timestamps(), Timestamps::default());
    }

    #[test]
    fn test_apply() {
        let mut docs = vec![document("a.md"), document("b.md")];
        let times = Timestamps {
            created_at: at(1),
            updated_at: at(2),
        };
        apply(&mut docs, vec![Timestamps::default(), times]);
        assert_eq!(docs[1].created_at, at(1));
        assert_eq!(docs[1].updated_at, at(2));
    }
}
