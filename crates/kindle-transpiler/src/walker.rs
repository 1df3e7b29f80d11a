//! Typed access to a parsed YAML tree with diagnostics.
//!
//! Every accessor records a fatal entry when a value has the wrong type and
//! returns `None`, so conversion keeps going and reports every problem in
//! one pass instead of stopping at the first one.

use kindle_core::Report;
use serde_yaml::{Mapping, Value};

/// Joins a key onto a dotted path.
pub(crate) fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// Joins a sequence index onto a path.
pub(crate) fn index(path: &str, i: usize) -> String {
    format!("{path}[{i}]")
}

fn at(path: &str) -> Option<&str> {
    (!path.is_empty()).then_some(path)
}

pub(crate) struct Walker {
    report: Report,
}

impl Walker {
    pub(crate) fn new() -> Self {
        Self {
            report: Report::new(),
        }
    }

    pub(crate) fn into_report(self) -> Report {
        self.report
    }

    pub(crate) fn warn(&mut self, message: impl Into<String>, path: &str) {
        self.report.warn(message, at(path));
    }

    pub(crate) fn fatal(&mut self, message: impl Into<String>, path: &str) {
        self.report.fatal(message, at(path));
    }

    /// Views `value` as a mapping, warning about keys outside `known`.
    ///
    /// `null` is treated as an empty mapping.
    pub(crate) fn table<'v>(
        &mut self,
        value: &'v Value,
        path: &str,
        known: &[&str],
    ) -> Option<&'v Mapping> {
        match value {
            Value::Mapping(map) => {
                for key in map.keys() {
                    match key.as_str() {
                        Some(k) if known.contains(&k) => {}
                        Some(k) => self.warn(
                            format!("Config has unrecognized key: {k}"),
                            &child(path, k),
                        ),
                        None => self.fatal("mapping keys must be strings", path),
                    }
                }
                Some(map)
            }
            Value::Null => None,
            _ => {
                self.fatal("expected a mapping", path);
                None
            }
        }
    }

    /// Looks up `key` in `map` and views it as a mapping.
    pub(crate) fn table_field<'v>(
        &mut self,
        map: &'v Mapping,
        key: &str,
        path: &str,
        known: &[&str],
    ) -> Option<&'v Mapping> {
        let value = map.get(key)?;
        self.table(value, &child(path, key), known)
    }

    pub(crate) fn string(&mut self, map: &Mapping, key: &str, path: &str) -> Option<String> {
        match map.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            _ => {
                self.fatal("expected a string", &child(path, key));
                None
            }
        }
    }

    pub(crate) fn boolean(&mut self, map: &Mapping, key: &str, path: &str) -> Option<bool> {
        match map.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Null => None,
            _ => {
                self.fatal("expected a boolean", &child(path, key));
                None
            }
        }
    }

    pub(crate) fn integer(&mut self, map: &Mapping, key: &str, path: &str) -> Option<i64> {
        match map.get(key)? {
            Value::Number(n) if n.as_i64().is_some() => n.as_i64(),
            Value::Null => None,
            _ => {
                self.fatal("expected an integer", &child(path, key));
                None
            }
        }
    }

    /// Reads a permission mode.
    ///
    /// Integers are taken as-is; strings such as `"0644"` or `"0o644"` are
    /// read as octal. Modes outside `0..=0o7777` are fatal.
    pub(crate) fn mode(&mut self, map: &Mapping, key: &str, path: &str) -> Option<i64> {
        let path = child(path, key);
        let mode = match map.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => {
                let digits = s.strip_prefix("0o").unwrap_or(s);
                i64::from_str_radix(digits, 8).ok()
            }
            Value::Null => return None,
            _ => None,
        };

        match mode {
            Some(mode) if (0..=0o7777).contains(&mode) => Some(mode),
            Some(_) => {
                self.fatal("illegal file mode", &path);
                None
            }
            None => {
                self.fatal("expected a file mode", &path);
                None
            }
        }
    }

    /// Looks up `key` as a sequence; absent or `null` is empty.
    pub(crate) fn list<'v>(&mut self, map: &'v Mapping, key: &str, path: &str) -> &'v [Value] {
        match map.get(key) {
            Some(Value::Sequence(seq)) => seq.as_slice(),
            None | Some(Value::Null) => &[],
            Some(_) => {
                self.fatal("expected a list", &child(path, key));
                &[]
            }
        }
    }

    /// Looks up `key` as a list of strings.
    pub(crate) fn strings(&mut self, map: &Mapping, key: &str, path: &str) -> Vec<String> {
        let list_path = child(path, key);
        let mut out = Vec::new();
        for (i, item) in self.list(map, key, path).iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => self.fatal("expected a string", &index(&list_path, i)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(doc: &str) -> Value {
        serde_yaml::from_str(doc).unwrap()
    }

    #[test]
    fn test_unknown_keys_are_warnings() {
        let value = parse("name: core\nshell_name: zsh\n");
        let mut walker = Walker::new();
        let map = walker.table(&value, "passwd.users[0]", &["name"]);

        assert!(map.is_some());
        let report = walker.into_report();
        assert!(!report.is_fatal());
        assert_eq!(
            report.entries()[0].path.as_deref(),
            Some("passwd.users[0].shell_name")
        );
    }

    #[test]
    fn test_wrong_type_is_fatal() {
        let value = parse("name: [a, b]\n");
        let mut walker = Walker::new();
        let map = walker.table(&value, "", &["name"]).unwrap();

        assert_eq!(walker.string(map, "name", ""), None);
        assert!(walker.into_report().is_fatal());
    }

    #[test]
    fn test_mode_accepts_octal_strings() {
        let value = parse("a: \"0644\"\nb: \"0o755\"\nc: 420\n");
        let mut walker = Walker::new();
        let map = walker.table(&value, "", &["a", "b", "c"]).unwrap();

        assert_eq!(walker.mode(map, "a", ""), Some(0o644));
        assert_eq!(walker.mode(map, "b", ""), Some(0o755));
        assert_eq!(walker.mode(map, "c", ""), Some(420));
        assert!(walker.into_report().is_empty());
    }

    #[test]
    fn test_mode_out_of_range_is_fatal() {
        let value = parse("mode: 99999\n");
        let mut walker = Walker::new();
        let map = walker.table(&value, "", &["mode"]).unwrap();

        assert_eq!(walker.mode(map, "mode", ""), None);
        let report = walker.into_report();
        assert_eq!(report.entries()[0].message, "illegal file mode");
    }

    #[test]
    fn test_null_list_is_empty() {
        let value = parse("units:\n");
        let mut walker = Walker::new();
        let map = walker.table(&value, "", &["units"]).unwrap();

        assert!(walker.list(map, "units", "").is_empty());
        assert!(walker.into_report().is_empty());
    }
}
