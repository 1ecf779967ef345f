//! `{{ key }}` templates for emails and invoices.
//!
//! Keys are dotted paths into a JSON value; anything that does not resolve
//! renders as an empty string. `{{ key }}` output is HTML-escaped;
//! `{{{ key }}}` inserts the value as is and is only for fragments the server
//! built itself.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use parking_lot::RwLock;
use regex::{Captures, Regex};
use serde_json::Value;

const BUILTIN: &[(&str, &str)] = &[
    ("welcome.html", include_str!("../../templates/welcome.html")),
    ("otp.html", include_str!("../../templates/otp.html")),
    ("order_reply.html", include_str!("../../templates/order_reply.html")),
    ("invoice.html", include_str!("../../templates/invoice.html")),
];

fn placeholder() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\{\s*([A-Za-z0-9_.]+)\s*\}\}\}|\{\{\s*([A-Za-z0-9_.]+)\s*\}\}").ok()
    })
    .as_ref()
}

/// Substitutes every placeholder in `template` from `data`.
pub fn render(template: &str, data: &Value) -> String {
    match placeholder() {
        Some(re) => re
            .replace_all(template, |caps: &Captures<'_>| match (caps.get(1), caps.get(2)) {
                (Some(raw), _) => lookup(data, raw.as_str()),
                (None, Some(key)) => escape_html(&lookup(data, key.as_str())),
                (None, None) => String::new(),
            })
            .into_owned(),
        None => template.to_string(),
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn lookup(data: &Value, path: &str) -> String {
    let mut current = data;
    for key in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return String::new(),
        }
    }
    match current {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loads templates from a directory, falling back to the built-in set, and
/// keeps them cached for the life of the process.
#[derive(Default)]
pub struct TemplateStore {
    dir: Option<PathBuf>,
    cache: RwLock<HashMap<String, String>>,
}

impl TemplateStore {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir, cache: RwLock::new(HashMap::new()) }
    }

    /// Raw template text. Unknown names yield an empty template.
    pub async fn load(&self, name: &str) -> String {
        let cached = self.cache.read().get(name).cloned();
        if let Some(hit) = cached {
            return hit;
        }
        let content = match self.read_from_dir(name).await {
            Some(text) => text,
            None => match BUILTIN.iter().find(|(n, _)| *n == name) {
                Some((_, text)) => text.to_string(),
                None => {
                    tracing::error!(template = name, "template not found");
                    String::new()
                }
            },
        };
        self.cache.write().insert(name.to_string(), content.clone());
        content
    }

    pub async fn render(&self, name: &str, data: &Value) -> String {
        render(&self.load(name).await, data)
    }

    async fn read_from_dir(&self, name: &str) -> Option<String> {
        let dir = self.dir.as_ref()?;
        match tokio::fs::read_to_string(dir.join(name)).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(template = name, error = %e, "template not in directory, using built-in");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn substitutes_dotted_paths() {
        let data = json!({"user": {"name": "Asha"}, "otp": "042137", "items": [{"name": "Tee"}]});
        assert_eq!(render("Hi {{ user.name }}, code {{otp}}", &data), "Hi Asha, code 042137");
        assert_eq!(render("{{ items.0.name }}", &data), "Tee");
    }

    #[test]
    fn missing_keys_render_empty() {
        let data = json!({"user": {"name": null}});
        assert_eq!(render("[{{user.name}}][{{user.email}}][{{nope.deep}}]", &data), "[][][]");
    }

    #[test]
    fn values_are_escaped_unless_triple_braced() {
        let data = json!({"city": "<iframe src=\"file:///etc/passwd\"></iframe>", "rows": "<tr><td>1</td></tr>"});
        assert_eq!(
            render("{{ city }}", &data),
            "&lt;iframe src=&quot;file:///etc/passwd&quot;&gt;&lt;/iframe&gt;"
        );
        assert_eq!(render("{{{ rows }}}", &data), "<tr><td>1</td></tr>");
        assert_eq!(render("{{{rows}}} {{ nope }}", &data), "<tr><td>1</td></tr> ");
    }

    #[test]
    fn numbers_render_plainly() {
        assert_eq!(render("{{ total }}", &json!({"total": 250})), "250");
    }

    #[tokio::test]
    async fn directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("otp.html"), "custom {{otp}}").unwrap();
        let store = TemplateStore::new(Some(dir.path().to_path_buf()));
        assert_eq!(store.render("otp.html", &json!({"otp": "1"})).await, "custom 1");
        assert!(store.load("welcome.html").await.contains("{{"));
        assert_eq!(store.load("missing.html").await, "");
    }
}
