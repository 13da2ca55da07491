//! Flat key/value config store (spec.md §6's external config collaborator).
//!
//! Format: line-oriented `key=value`. Keys are flat strings, `.`-separated
//! by convention for nesting (no structural nesting is parsed). Blank lines
//! are skipped. A line with no `=` is malformed and is dropped with a
//! WARN log rather than failing the whole load (spec.md §9 Open Question,
//! resolved in DESIGN.md).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::log::{Level, Logger};

/// An in-memory config table, loadable from and savable to a flat
/// `key=value` file.
///
/// Backed by a `BTreeMap` so [`Config::save`] writes keys in a stable,
/// sorted order regardless of insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    entries: BTreeMap<String, String>,
}

impl Config {
    /// An empty table.
    pub fn new() -> Config {
        Config::default()
    }

    /// Parse `text` into a table, dropping malformed lines (WARN-logged
    /// through `logger`) and skipping blank lines.
    pub fn parse(text: &str, logger: &Logger) -> Config {
        let mut entries = BTreeMap::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.is_empty() {
                continue;
            }
            match line.split_once('=') {
                Some((key, value)) if !key.is_empty() => {
                    entries.insert(key.to_owned(), value.to_owned());
                }
                _ => {
                    logger.log(
                        Level::Warn,
                        format!("config: dropping malformed line {}", lineno + 1),
                    );
                }
            }
        }
        Config { entries }
    }

    /// Load from `path`, replacing any in-memory state a fresh [`Config`]
    /// would otherwise hold. See [`Config::parse`] for the malformed-line
    /// policy.
    pub fn load(path: &Path, logger: &Logger) -> Result<Config> {
        let text = fs::read_to_string(path)?;
        Ok(Config::parse(&text, logger))
    }

    /// Serialize to `key=value\n` lines in sorted key order and write to
    /// `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }

    /// Render as `key=value\n` lines in sorted key order.
    pub fn to_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jayc.conf");

        let mut config = Config::new();
        config.set("server.ip", "127.0.0.1");
        config.set("server.port", "1234");
        config.set("hash.algorithm", "md5");
        config.save(&path).unwrap();

        let loaded = Config::load(&path, &Logger::noop()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get("server.port"), Some("1234"));

        // save(load(f)) == f byte-for-byte, per spec.md §8's round-trip
        // property.
        let reserialized = loaded.to_string();
        assert_eq!(reserialized, fs::read_to_string(&path).unwrap());
    }

    #[test]
    fn blank_and_malformed_lines_are_dropped() {
        let text = "a=1\n\nno-equals-sign\nb=2\n";
        let config = Config::parse(text, &Logger::noop());
        assert_eq!(config.len(), 2);
        assert_eq!(config.get("a"), Some("1"));
        assert_eq!(config.get("b"), Some("2"));
    }

    #[test]
    fn key_with_empty_name_is_malformed() {
        let text = "=value\n";
        let config = Config::parse(text, &Logger::noop());
        assert!(config.is_empty());
    }
}
