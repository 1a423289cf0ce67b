//! The library code for the `gitleaf` blog generator. A build takes a git
//! repository of markdown documents and turns it into a flat directory of
//! HTML pages, dating every document by its commit history instead of its
//! file metadata. The steps, in order:
//!
//! 1. Clone the repository into a private workspace ([`crate::git`]) and
//!    apply the configuration overrides it carries ([`crate::config`])
//! 2. Discover and render the markdown documents of every configured content
//!    directory ([`crate::discover`], [`crate::markdown`])
//! 3. Resolve each document's creation and update time from the commit log
//!    ([`crate::history`])
//! 4. Sort the documents newest first, name their output files and group
//!    them by year ([`crate::summary`])
//! 5. Apply the templates and write every page ([`crate::write`])
//!
//! [`crate::build`] drives the whole sequence. Every path that comes from
//! configuration or from the repository goes through [`crate::sandbox`] so
//! that nothing is read or written outside the directory it belongs to.

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod discover;
pub mod document;
pub mod git;
pub mod history;
pub mod markdown;
pub mod sandbox;
pub mod summary;
pub mod template;
pub mod value;
pub mod write;
