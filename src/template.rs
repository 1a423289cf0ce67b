//! The [`Theme`]: the post and post-list templates plus the stylesheet that
//! is inlined into every page. Each part is the built-in asset unless the
//! configuration points at a replacement inside the repository.

use crate::config::Config;
use crate::sandbox;
use gtmpl::{Context, Template, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const POST_TEMPLATE: &str = include_str!("../assets/post.htm");
const LIST_TEMPLATE: &str = include_str!("../assets/list.htm");
const STYLE: &str = include_str!("../assets/style.css");

/// The built-in favicon.
pub const FAVICON: &[u8] = include_bytes!("../assets/favicon.svg");

pub struct Theme {
    pub post: Template,
    pub list: Template,
    pub style: String,
}

impl Theme {
    /// Loads the theme named by `config`, resolving configured paths against
    /// `root`.
    pub fn load(config: &Config, root: &Path) -> Result<Theme> {
        Ok(Theme {
            post: parse_template(&read_or(root, config.html.as_deref(), POST_TEMPLATE)?)?,
            list: parse_template(&read_or(root, config.list_html.as_deref(), LIST_TEMPLATE)?)?,
            style: read_or(root, config.style.as_deref(), STYLE)?,
        })
    }

    /// The built-in theme.
    pub fn builtin() -> Result<Theme> {
        Ok(Theme {
            post: parse_template(POST_TEMPLATE)?,
            list: parse_template(LIST_TEMPLATE)?,
            style: String::from(STYLE),
        })
    }
}

/// Renders `template` with `value` as the dot into `w`.
pub fn execute<W: Write>(template: &Template, value: Value, w: &mut W) -> Result<()> {
    let context = Context::from(value).map_err(Error::Execute)?;
    template.execute(w, &context).map_err(Error::Execute)
}

fn read_or(root: &Path, path: Option<&Path>, builtin: &str) -> Result<String> {
    match path {
        None => Ok(String::from(builtin)),
        Some(path) => {
            let path = sandbox::resolve(root, path)?;
            debug!(path = %path.display(), "load theme file");
            fs::read_to_string(&path).map_err(|err| Error::Read { path, err })
        }
    }
}

fn parse_template(contents: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(contents).map_err(Error::Parse)?;
    Ok(template)
}

/// The result of a theme operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or applying a theme.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a configured theme file can't be read.
    #[error("reading theme file `{}`: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when a theme file path escapes its root.
    #[error(transparent)]
    Sandbox(#[from] sandbox::Error),

    /// Returned for errors parsing a template.
    #[error("parsing template: {0}")]
    Parse(String),

    /// Returned for errors executing a template.
    #[error("executing template: {0}")]
    Execute(String),
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_builtin_theme_parses() {
        let theme = Theme::builtin().unwrap();
        assert!(!theme.style.is_empty());
        assert!(std::str::from_utf8(FAVICON).unwrap().contains("<svg"));
    }

    #[test]
    fn test_load_overrides_from_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("post.htm"), "<p>{{ .name }}</p>").unwrap();
        fs::write(dir.path().join("site.css"), "body{}").unwrap();
        let config = Config {
            html: Some(PathBuf::from("post.htm")),
            style: Some(PathBuf::from("./site.css")),
            ..Config::default()
        };
        let theme = Theme::load(&config, dir.path()).unwrap();
        assert_eq!(theme.style, "body{}");

        let mut m = HashMap::new();
        m.insert(String::from("name"), Value::String(String::from("gitleaf")));
        let mut out = Vec::new();
        execute(&theme.post, Value::Object(m), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<p>gitleaf</p>");
    }

    #[test]
    fn test_load_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            style: Some(PathBuf::from("../outside.css")),
            ..Config::default()
        };
        assert!(matches!(
            Theme::load(&config, dir.path()),
            Err(Error::Sandbox(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_load_rejects_symlinks_leaving_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("shadow"), "root:x:0:0").unwrap();
        std::os::unix::fs::symlink(outside.path().join("shadow"), dir.path().join("site.css")).unwrap();
        let config = Config {
            style: Some(PathBuf::from("site.css")),
            ..Config::default()
        };
        assert!(matches!(
            Theme::load(&config, dir.path()),
            Err(Error::Sandbox(_))
        ));
    }

    #[test]
    fn test_load_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            list_html: Some(PathBuf::from("missing.htm")),
            ..Config::default()
        };
        assert!(matches!(
            Theme::load(&config, dir.path()),
            Err(Error::Read { .. })
        ));
    }
}
