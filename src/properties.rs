//! Property lookup backing value injection.
//!
//! Values come from three layers, checked in order: explicit overrides, environment
//! variables, then a Java `.properties` file. Environment lookups use relaxed
//! binding so `project.root.package` also matches `PROJECT_ROOT_PACKAGE`.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct PropertySource {
    overrides: HashMap<String, String>,
    env: HashMap<String, String>,
    file: HashMap<String, String>,
    origin: Option<PathBuf>,
}

impl PropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read properties file: {}", path.display()))?;
        let mut source = Self::parse(&content);
        source.origin = Some(path.to_path_buf());
        Ok(source)
    }

    /// Parses `.properties` content into the file layer.
    pub fn parse(content: &str) -> Self {
        Self {
            file: parse_properties(content),
            ..Self::default()
        }
    }

    pub fn with_env_vars<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// Like [`with_env_vars`](Self::with_env_vars), skipping pairs that are not valid UTF-8.
    pub fn with_os_env_vars<I>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let vars = vars
            .into_iter()
            .filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
                (Ok(k), Ok(v)) => Some((k, v)),
                (Ok(k), Err(_)) => {
                    debug!("Skipping environment variable {k}: value is not valid UTF-8");
                    None
                }
                (Err(k), _) => {
                    debug!(
                        "Skipping environment variable {}: name is not valid UTF-8",
                        k.to_string_lossy()
                    );
                    None
                }
            });
        self.with_env_vars(vars)
    }

    pub fn with_system_env(self) -> Self {
        self.with_os_env_vars(std::env::vars_os())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.overrides.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        if let Some(v) = self.overrides.get(key) {
            return Some(v);
        }
        if let Some(v) = self.env.get(key) {
            return Some(v);
        }
        if let Some(v) = self.env.get(&relaxed_env_name(key)) {
            return Some(v);
        }
        self.file.get(key).map(String::as_str)
    }

    /// The file the file layer was loaded from, if any.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }
}

fn relaxed_env_name(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn parse_properties(content: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    let mut logical = String::new();
    let mut continuing = false;

    for raw in content.lines() {
        let line = raw.trim_start();
        if !continuing && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }

        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }

        logical.push_str(line);
        continuing = false;
        let (key, value) = split_key_value(&logical);
        entries.insert(unescape(key), unescape(value));
        logical.clear();
    }

    if !logical.is_empty() {
        let (key, value) = split_key_value(&logical);
        entries.insert(unescape(key), unescape(value));
    }

    entries
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut key_end = line.len();
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if c.is_whitespace() => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start();
    }
    (key, rest)
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(ch) => out.push(ch),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_separators_comments_and_continuations() {
        let content = r"
# comment
! another comment
project.root.package=com.acme
payment.api.key : secret
spaced.key value with spaces
multi.line = first, \
              second
escaped\=key = a\tb
unicode = café
empty.value=
";
        let props = PropertySource::parse(content);
        assert_eq!(props.get("project.root.package"), Some("com.acme"));
        assert_eq!(props.get("payment.api.key"), Some("secret"));
        assert_eq!(props.get("spaced.key"), Some("value with spaces"));
        assert_eq!(props.get("multi.line"), Some("first, second"));
        assert_eq!(props.get("escaped=key"), Some("a\tb"));
        assert_eq!(props.get("unicode"), Some("café"));
        assert_eq!(props.get("empty.value"), Some(""));
        assert_eq!(props.get("# comment"), None);
    }

    #[test]
    fn env_overrides_file_with_relaxed_names() {
        let props = PropertySource::parse("project.root.package=com.file\nother=1")
            .with_env_vars([("PROJECT_ROOT_PACKAGE".to_string(), "com.env".to_string())]);
        assert_eq!(props.get("project.root.package"), Some("com.env"));
        assert_eq!(props.get("other"), Some("1"));
    }

    #[test]
    fn explicit_overrides_win() {
        let mut props = PropertySource::parse("a=file")
            .with_env_vars([("A".to_string(), "env".to_string())]);
        props.set("a", "cli");
        assert_eq!(props.get("a"), Some("cli"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_environment_is_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let props = PropertySource::new().with_os_env_vars([
            (OsString::from("BAD_VALUE"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0xff]), OsString::from("x")),
            (OsString::from("PROJECT_ROOT_PACKAGE"), OsString::from("com.env")),
        ]);
        assert_eq!(props.get("bad.value"), None);
        assert_eq!(props.get("project.root.package"), Some("com.env"));
    }

    #[test]
    fn system_env_loads_without_panicking() {
        let props = PropertySource::new().with_system_env();
        assert_eq!(props.get("definitely.not.set.anywhere.xyz"), None);
    }

    #[test]
    fn relaxed_name_maps_dashes_and_dots() {
        assert_eq!(
            relaxed_env_name("inject-value.scan.cron"),
            "INJECT_VALUE_SCAN_CRON"
        );
    }
}
