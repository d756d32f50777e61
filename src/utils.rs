//! Path, URL and string helpers.
//!
//! - Separator normalization for paths embedded in generated JS
//! - URL joining against a base that may or may not carry an origin
//! - The `{name}` / `{version}` / `{origin}` templater
//! - Library (UMD global) name derivation

use std::path::{Component, Path};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

use crate::BuildError;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"));

static ORIGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(https?:)?//([^/]+)").expect("valid origin regex"));

static LIBRARY_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[/@-](\w)").expect("valid library regex"));

static ENTRY_EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(jsx?|vue)$").expect("valid extension regex"));

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Replace backslashes with forward slashes.
pub fn slash(s: &str) -> String {
    s.replace('\\', "/")
}

/// `slash` for filesystem paths.
pub fn slash_path(path: &Path) -> String {
    slash(&path.to_string_lossy())
}

/// POSIX-style join + normalize, matching `path.posix.join`.
///
/// Empty segments are skipped, `.` and `..` are resolved, a trailing slash
/// on the last segment is kept, and an empty result becomes `"."`.
pub fn posix_join(segments: &[&str]) -> String {
    let joined = segments
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return ".".to_string();
    }

    let absolute = joined.starts_with('/');
    let trailing = joined.ends_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let mut out = parts.join("/");
    if absolute {
        out.insert(0, '/');
    }
    if out.is_empty() {
        return ".".to_string();
    }
    if trailing && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Path of `target` relative to `base`, with forward slashes.
///
/// Both paths are compared component-wise; no filesystem access happens.
pub fn relative_path(base: &Path, target: &Path) -> String {
    let base: Vec<Component<'_>> = base.components().collect();
    let target: Vec<Component<'_>> = target.components().collect();
    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base.len() {
        parts.push("..".to_string());
    }
    for component in &target[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }
    slash(&parts.join("/"))
}

// ---------------------------------------------------------------------------
// URLs
// ---------------------------------------------------------------------------

/// Join a base (bare prefix or full URL) with relative segments.
///
/// A base starting with `http` is split into origin and pathname; only the
/// pathname is joined, so `https://host/p` + `dist` + `index.js` gives
/// `https://host/p/dist/index.js`. Anything else is joined as a path.
pub fn join_url(base: &str, segments: &[&str]) -> Result<String, BuildError> {
    if base.starts_with("http") {
        let url = Url::parse(base)
            .map_err(|e| BuildError::Config(format!("invalid base URL `{base}`: {e}")))?;
        let origin = url.origin().ascii_serialization();
        let mut parts = vec![url.path()];
        parts.extend_from_slice(segments);
        return Ok(format!("{origin}{}", posix_join(&parts)));
    }

    let mut parts = vec![base];
    parts.extend_from_slice(segments);
    Ok(posix_join(&parts))
}

/// Extract the `(https?:)?//host` prefix of a URL, or `""`.
pub fn get_origin(url: &str) -> String {
    ORIGIN_RE
        .find(url)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// Values for the fixed set of template keys.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub origin: &'a str,
}

impl<'a> Placeholders<'a> {
    pub fn lookup(&self, key: &str) -> Option<&'a str> {
        match key {
            "name" => Some(self.name),
            "version" => Some(self.version),
            "origin" => Some(self.origin),
            _ => None,
        }
    }

    /// Strict rendering: any `{ident}` that is not a known key is an error.
    pub fn render(&self, template: &str) -> Result<String, BuildError> {
        if let Some(caps) = PLACEHOLDER_RE
            .captures_iter(template)
            .find(|caps| self.lookup(&caps[1]).is_none())
        {
            return Err(BuildError::Template {
                placeholder: caps[1].to_string(),
                template: template.to_string(),
            });
        }
        Ok(self.substitute(template))
    }

    /// Lenient rendering: known keys are replaced, unknown tokens stay.
    pub fn substitute(&self, text: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(text, |caps: &Captures<'_>| {
                self.lookup(&caps[1])
                    .map(str::to_string)
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Apply `substitute` to every string and object key of a JSON value.
    pub fn substitute_json(&self, value: serde_json::Value) -> serde_json::Value {
        use serde_json::Value;

        match value {
            Value::String(s) => Value::String(self.substitute(&s)),
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.substitute_json(v)).collect())
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (self.substitute(&k), self.substitute_json(v)))
                    .collect(),
            ),
            other => other,
        }
    }
}

// ---------------------------------------------------------------------------
// Naming
// ---------------------------------------------------------------------------

/// Derive the UMD global name.
///
/// `@k/example` → `KExample`, `my-lib` → `MyLib`. Without a package name
/// the entry file's basename is used, minus a `.js`/`.jsx`/`.vue` extension.
pub fn library_name(package_name: Option<&str>, entry: &str) -> String {
    match package_name.filter(|name| !name.is_empty()) {
        Some(name) => {
            let camel = LIBRARY_SEP_RE.replace_all(name, |caps: &Captures<'_>| caps[1].to_uppercase());
            upper_first(&camel)
        }
        None => {
            let base = Path::new(entry)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            ENTRY_EXT_RE.replace(&base, "").into_owned()
        }
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// JS String Escaping
// ---------------------------------------------------------------------------

/// Escape a string for embedding inside a quoted JS string literal.
pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash() {
        assert_eq!(slash(r"C:\work\src\meta.ts"), "C:/work/src/meta.ts");
        assert_eq!(slash("/already/posix"), "/already/posix");
    }

    #[test]
    fn test_posix_join() {
        assert_eq!(posix_join(&["/static", "dist", "index.js"]), "/static/dist/index.js");
        assert_eq!(posix_join(&["", "dist", "index.js"]), "dist/index.js");
        assert_eq!(posix_join(&["/p/", "./dist", "../lib", "a.js"]), "/p/lib/a.js");
        assert_eq!(posix_join(&["a", "../../b"]), "../b");
        assert_eq!(posix_join(&["/", "..", "x"]), "/x");
        assert_eq!(posix_join(&["", ""]), ".");
        assert_eq!(posix_join(&["dist/"]), "dist/");
    }

    #[test]
    fn test_join_url_full_url() {
        assert_eq!(
            join_url("https://host/p", &["dist", "index.js"]).unwrap(),
            "https://host/p/dist/index.js"
        );
        assert_eq!(
            join_url("http://127.0.0.1:9000", &["", "index.js"]).unwrap(),
            "http://127.0.0.1:9000/index.js"
        );
    }

    #[test]
    fn test_join_url_scoped_package() {
        assert_eq!(
            join_url("https://cdn/@k/example@1.0.0", &["dist", "index.js"]).unwrap(),
            "https://cdn/@k/example@1.0.0/dist/index.js"
        );
    }

    #[test]
    fn test_join_url_bare_prefix() {
        assert_eq!(
            join_url("/static", &["dist", "index.js"]).unwrap(),
            "/static/dist/index.js"
        );
    }

    #[test]
    fn test_join_url_invalid() {
        assert!(matches!(
            join_url("http//broken", &["a.js"]),
            Err(BuildError::Config(_))
        ));
    }

    #[test]
    fn test_get_origin() {
        assert_eq!(get_origin("https://cdn.example.com/pkg@1.0.0"), "https://cdn.example.com");
        assert_eq!(get_origin("//cdn.example.com/x"), "//cdn.example.com");
        assert_eq!(get_origin("/static"), "");
        assert_eq!(get_origin(""), "");
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path(Path::new("/proj"), Path::new("/proj/dist")), "dist");
        assert_eq!(relative_path(Path::new("/proj"), Path::new("/proj/out/lib")), "out/lib");
        assert_eq!(relative_path(Path::new("/proj"), Path::new("/other")), "../other");
        assert_eq!(relative_path(Path::new("/proj"), Path::new("/proj")), "");
    }

    #[test]
    fn test_placeholders_render() {
        let p = Placeholders { name: "@k/example", version: "1.0.0", origin: "https://cdn" };
        assert_eq!(
            p.render("{origin}/{name}@{version}").unwrap(),
            "https://cdn/@k/example@1.0.0"
        );
    }

    #[test]
    fn test_placeholders_render_unknown_key() {
        let p = Placeholders { name: "a", version: "1", origin: "" };
        let err = p.render("https://cdn/{tag}/{name}").unwrap_err();
        match err {
            BuildError::Template { placeholder, .. } => assert_eq!(placeholder, "tag"),
            other => panic!("Expected Template error, got {other:?}"),
        }
    }

    #[test]
    fn test_placeholders_missing_values_are_empty() {
        let p = Placeholders { name: "", version: "", origin: "" };
        assert_eq!(p.render("https://unpkg.com/{name}@{version}").unwrap(), "https://unpkg.com/@");
    }

    #[test]
    fn test_placeholders_substitute_keeps_unknown() {
        let p = Placeholders { name: "pkg", version: "2", origin: "" };
        assert_eq!(p.substitute("{name}-{other}-{version}"), "pkg-{other}-2");
    }

    #[test]
    fn test_placeholders_substitute_json() {
        let p = Placeholders { name: "pkg", version: "2", origin: "https://o" };
        let value = serde_json::json!({
            "urls": ["{origin}/{name}@{version}/x.js"],
            "{name}": true,
            "n": 1
        });
        let out = p.substitute_json(value);
        assert_eq!(out["urls"][0], "https://o/pkg@2/x.js");
        assert_eq!(out["pkg"], true);
        assert_eq!(out["n"], 1);
    }

    #[test]
    fn test_library_name() {
        assert_eq!(library_name(Some("@k/example"), "src/index.ts"), "KExample");
        assert_eq!(library_name(Some("my-lib"), "src/index.ts"), "MyLib");
        assert_eq!(library_name(Some("@knxcloud/lowcode-demo"), "x"), "KnxcloudLowcodeDemo");
        assert_eq!(library_name(None, "src/components.jsx"), "components");
        assert_eq!(library_name(Some(""), "src/view.vue"), "view");
    }

    #[test]
    fn test_escape_js_string() {
        assert_eq!(escape_js_string(r#"he said "hi""#), r#"he said \"hi\""#);
        assert_eq!(escape_js_string("it's"), "it\\'s");
        assert_eq!(escape_js_string("line1\nline2"), "line1\\nline2");
    }
}
