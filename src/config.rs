//! Site configuration. A [`Config`] starts from its defaults, is replaced by
//! the settings file given on the command line, and is then overridden key
//! by key from the `.gitleaf.yml`/`.gitleaf.yaml` files at the root of the
//! cloned repository.

use crate::sandbox;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

/// The override files looked up at the repository root, in load order.
pub const OVERRIDE_FILES: [&str; 2] = [".gitleaf.yml", ".gitleaf.yaml"];

/// The favicon file name when no favicon is configured.
pub const DEFAULT_FAVICON_LINK: &str = "favicon.svg";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The content directories to scan, relative to the repository root.
    pub workdir: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    /// Post page template, replacing the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<PathBuf>,

    /// Post-list page template, replacing the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_html: Option<PathBuf>,

    /// Stylesheet inlined into every page, replacing the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<PathBuf>,

    /// Markdown source of `about-me.htm`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about_me: Option<PathBuf>,

    /// Markdown source of `license.htm`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<PathBuf>,

    /// Source paths of posts that are rendered but not listed.
    pub hidden: Vec<String>,

    /// Whether output file names start with the creation time.
    pub timestamp_prefix: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            workdir: vec![String::from("posts")],
            project: None,
            author: None,
            brand: None,
            html: None,
            list_html: None,
            style: None,
            about_me: None,
            license: None,
            favicon: None,
            hidden: Vec::new(),
            timestamp_prefix: true,
        }
    }
}

/// The keys an override file may set. Absent keys leave the [`Config`]
/// untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Overrides {
    workdir: Option<Vec<String>>,
    project: Option<String>,
    author: Option<String>,
    brand: Option<String>,
    html: Option<PathBuf>,
    list_html: Option<PathBuf>,
    style: Option<PathBuf>,
    about_me: Option<PathBuf>,
    license: Option<PathBuf>,
    favicon: Option<PathBuf>,
    hidden: Option<Vec<String>>,
    timestamp_prefix: Option<bool>,
}

impl Config {
    /// Loads a settings file. Keys missing from the file take their default
    /// value.
    pub fn from_file(path: &Path) -> Result<Config> {
        Ok(parse(path)?.unwrap_or_default())
    }

    /// Applies the override files found at the root of `repository`.
    pub fn load_overrides(&mut self, repository: &Path) -> Result<()> {
        for name in OVERRIDE_FILES {
            let path = sandbox::resolve(repository, name)?;
            if !path.is_file() {
                trace!(path = %path.display(), "no configuration override");
                continue;
            }
            debug!(path = %path.display(), "load configuration override");
            if let Some(overrides) = parse::<Overrides>(&path)? {
                self.merge(overrides);
            }
        }
        Ok(())
    }

    fn merge(&mut self, overrides: Overrides) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn replace<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut self.workdir, overrides.workdir);
        replace(&mut self.project, overrides.project);
        replace(&mut self.author, overrides.author);
        replace(&mut self.brand, overrides.brand);
        replace(&mut self.html, overrides.html);
        replace(&mut self.list_html, overrides.list_html);
        replace(&mut self.style, overrides.style);
        replace(&mut self.about_me, overrides.about_me);
        replace(&mut self.license, overrides.license);
        replace(&mut self.favicon, overrides.favicon);
        set(&mut self.hidden, overrides.hidden);
        set(&mut self.timestamp_prefix, overrides.timestamp_prefix);
    }

    /// The configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Error::Serialize)
    }

    /// The output file name of the favicon: `favicon.svg` for the built-in
    /// icon, else `favicon` with the configured file's extension.
    pub fn favicon_link(&self) -> String {
        match &self.favicon {
            None => String::from(DEFAULT_FAVICON_LINK),
            Some(path) => match path.extension().and_then(|ext| ext.to_str()) {
                Some(ext) => format!("favicon.{}", ext),
                None => String::from("favicon"),
            },
        }
    }

    /// Whether the document at `source_path` is left out of listings.
    pub fn is_hidden(&self, source_path: &str) -> bool {
        self.hidden.iter().any(|hidden| {
            hidden.trim_start_matches("./") == source_path
        })
    }
}

/// Reads and parses a YAML file. A file holding nothing but whitespace or
/// comments parses to `None`.
fn parse<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = fs::read_to_string(path).map_err(|err| Error::Open {
        path: path.to_owned(),
        err,
    })?;
    if text
        .lines()
        .all(|line| line.trim().is_empty() || line.trim_start().starts_with('#') || line.trim() == "---")
    {
        return Ok(None);
    }
    serde_yaml::from_str(&text)
        .map(Some)
        .map_err(|err| Error::Parse {
            path: path.to_owned(),
            err,
        })
}

/// The result of a configuration operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a configuration file can't be opened.
    #[error("opening configuration file `{}`: {err}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when a configuration file isn't valid YAML or has keys of
    /// the wrong type.
    #[error("parsing configuration file `{}`: {err}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        err: serde_yaml::Error,
    },

    /// Returned when the configuration can't be written out as YAML.
    #[error("serializing configuration: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// Returned when an override file path escapes the repository.
    #[error(transparent)]
    Sandbox(#[from] sandbox::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("---\n{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.workdir, ["posts"]);
        assert!(config.timestamp_prefix);
        assert_eq!(config.favicon_link(), "favicon.svg");
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yml");
        fs::write(
            &path,
            "workdir: [blog, notes]\nproject: Journal\nfavicon: assets/icon.png\n",
        )
        .unwrap();

        let config = Config::from_file(&path)?;
        assert_eq!(config.workdir, ["blog", "notes"]);
        assert_eq!(config.project.as_deref(), Some("Journal"));
        assert_eq!(config.favicon_link(), "favicon.png");
        assert!(config.timestamp_prefix);
        Ok(())
    }

    #[test]
    fn test_from_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::from_file(&dir.path().join("missing.yml")),
            Err(Error::Open { .. })
        ));

        let path = dir.path().join("bad.yml");
        fs::write(&path, "workdir: 12\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_overrides_replace_only_named_keys() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitleaf.yml"), "brand: Mine\nhidden: [posts/draft.md]\n").unwrap();
        fs::write(dir.path().join(".gitleaf.yaml"), "timestamp_prefix: false\n").unwrap();

        let mut config = Config {
            project: Some(String::from("Journal")),
            brand: Some(String::from("Theirs")),
            ..Config::default()
        };
        config.load_overrides(dir.path())?;

        assert_eq!(config.project.as_deref(), Some("Journal"));
        assert_eq!(config.brand.as_deref(), Some("Mine"));
        assert!(config.is_hidden("posts/draft.md"));
        assert!(!config.is_hidden("posts/other.md"));
        assert!(!config.timestamp_prefix);
        assert_eq!(config.workdir, ["posts"]);
        Ok(())
    }

    #[test]
    fn test_empty_override_file_changes_nothing() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitleaf.yml"), "---\n# nothing yet\n").unwrap();
        let mut config = Config::default();
        config.load_overrides(dir.path())?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_missing_overrides_are_skipped() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.load_overrides(dir.path())?;
        assert_eq!(config, Config::default());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_override_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("settings.yml"), "project: Elsewhere\n").unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("settings.yml"),
            dir.path().join(".gitleaf.yml"),
        )
        .unwrap();

        let mut config = Config::default();
        assert!(matches!(
            config.load_overrides(dir.path()),
            Err(Error::Sandbox(_))
        ));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_to_yaml_skips_unset_paths() -> Result<()> {
        let config = Config {
            about_me: Some(PathBuf::from("about.md")),
            ..Config::default()
        };
        let yaml = config.to_yaml()?;
        assert!(yaml.contains("about_me: about.md"));
        assert!(!yaml.contains("license"));
        Ok(())
    }
}
