//! Conversions from pipeline types into template [`Value`]s. Every key a
//! template may look up is always present; missing text is the empty
//! string so that `{{ if }}` treats it as false.

use crate::config::Config;
use crate::document::Document;
use crate::summary::{Category, Summary};
use chrono::{DateTime, SecondsFormat, Utc};
use gtmpl_value::Value;
use std::collections::HashMap;

fn text(s: Option<&str>) -> Value {
    Value::String(s.unwrap_or_default().to_owned())
}

fn rfc3339(t: &DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn date(t: &DateTime<Utc>) -> Value {
    Value::String(t.format("%Y-%m-%d").to_string())
}

impl From<&Document> for Value {
    /// Converts a [`Document`] into the `post` object of the templates. The
    /// rendered HTML is the empty string if the document was never rendered.
    fn from(doc: &Document) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), text(doc.title.as_deref()));
        m.insert("description".to_owned(), text(doc.description.as_deref()));
        m.insert("link".to_owned(), Value::String(doc.link.clone()));
        m.insert("source".to_owned(), Value::String(doc.source_path.clone()));
        m.insert("uid".to_owned(), Value::from(doc.uid()));
        m.insert("created_at".to_owned(), rfc3339(&doc.created_at));
        m.insert("created_date".to_owned(), date(&doc.created_at));
        m.insert("updated_at".to_owned(), rfc3339(&doc.updated_at));
        m.insert("updated_date".to_owned(), date(&doc.updated_at));
        m.insert("html".to_owned(), text(doc.html()));
        Value::Object(m)
    }
}

impl From<&Category<'_>> for Value {
    fn from(category: &Category<'_>) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("key".to_owned(), Value::String(category.key.clone()));
        m.insert(
            "posts".to_owned(),
            Value::Array(category.documents.iter().map(|&doc| doc.into()).collect()),
        );
        Value::Object(m)
    }
}

impl From<&Summary<'_>> for Value {
    /// A [`Summary`] is an array of categories, newest year first.
    fn from(summary: &Summary<'_>) -> Value {
        Value::Array(summary.categories.iter().map(Value::from).collect())
    }
}

impl From<&Config> for Value {
    /// Converts the site-wide settings into the `site` object.
    fn from(config: &Config) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("project".to_owned(), text(config.project.as_deref()));
        m.insert("author".to_owned(), text(config.author.as_deref()));
        m.insert("brand".to_owned(), text(config.brand.as_deref()));
        m.insert("favicon".to_owned(), Value::String(config.favicon_link()));
        m.insert("about_me".to_owned(), Value::Bool(config.about_me.is_some()));
        m.insert("license".to_owned(), Value::Bool(config.license.is_some()));
        Value::Object(m)
    }
}
