// src/keyfile.rs

//! INI-style repository file parser
//!
//! Repository files hold one `[section]` per repository followed by
//! `key=value` lines. Blank lines and lines starting with `#` or `;` are
//! ignored. Keys and values are trimmed; values keep inner whitespace.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// One `key=value` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    /// 1-based line number, kept for error reporting
    pub line: usize,
}

/// A named `[section]` and its entries, in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub line: usize,
    pub entries: Vec<Entry>,
}

impl Group {
    /// Last value for `key` (later lines override earlier ones)
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Entry for `key`, for callers that need the line number
    pub fn entry(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().rev().find(|e| e.key == key)
    }
}

/// A parsed repository file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFile {
    pub path: PathBuf,
    pub groups: Vec<Group>,
}

impl KeyFile {
    /// Read and parse a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    /// Parse `content`; `path` is only used in error messages
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let parse_error = |line: usize, message: String| Error::ConfigParse {
            path: path.to_path_buf(),
            line,
            message,
        };

        let mut groups: Vec<Group> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .ok_or_else(|| parse_error(line, format!("unterminated group header '{}'", trimmed)))?
                    .trim();
                if name.is_empty() {
                    return Err(parse_error(line, "empty group name".to_string()));
                }
                groups.push(Group {
                    name: name.to_string(),
                    line,
                    entries: Vec::new(),
                });
                continue;
            }

            let (key, value) = trimmed
                .split_once('=')
                .ok_or_else(|| parse_error(line, format!("expected key=value, found '{}'", trimmed)))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(parse_error(line, "empty key".to_string()));
            }

            let group = groups
                .last_mut()
                .ok_or_else(|| parse_error(line, format!("key '{}' outside of any group", key)))?;
            group.entries.push(Entry {
                key: key.to_string(),
                value: value.trim().to_string(),
                line,
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEDORA: &str = "\
# Fedora repositories
[fedora]
name=Fedora $releasever - $basearch
baseurl=http://download.fedoraproject.org/pub/fedora/linux/releases/$releasever/Everything/$basearch/os/
enabled=1

; disabled by default
[fedora-debuginfo]
name = Fedora $releasever - Debug
enabled = 0
";

    #[test]
    fn test_parse_groups_and_entries() {
        let kf = KeyFile::parse(Path::new("fedora.repo"), FEDORA).unwrap();
        assert_eq!(kf.groups.len(), 2);

        let fedora = &kf.groups[0];
        assert_eq!(fedora.name, "fedora");
        assert_eq!(fedora.get("enabled"), Some("1"));
        assert_eq!(fedora.get("name"), Some("Fedora $releasever - $basearch"));
        assert_eq!(fedora.line, 2);

        let debug = &kf.groups[1];
        assert_eq!(debug.name, "fedora-debuginfo");
        assert_eq!(debug.get("name"), Some("Fedora $releasever - Debug"));
        assert_eq!(debug.entry("enabled").unwrap().line, 10);
        assert!(debug.get("baseurl").is_none());
    }

    #[test]
    fn test_later_key_overrides() {
        let kf = KeyFile::parse(Path::new("x.repo"), "[a]\nenabled=1\nenabled=0\n").unwrap();
        assert_eq!(kf.groups[0].get("enabled"), Some("0"));
    }

    #[test]
    fn test_parse_errors_carry_line() {
        let err = KeyFile::parse(Path::new("bad.repo"), "enabled=1\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { line: 1, .. }));

        let err = KeyFile::parse(Path::new("bad.repo"), "[a]\n\nnot a pair\n").unwrap_err();
        assert!(matches!(err, Error::ConfigParse { line: 3, .. }));

        let err = KeyFile::parse(Path::new("bad.repo"), "[broken\n").unwrap_err();
        assert!(err.to_string().contains("bad.repo:1"));
    }

    #[test]
    fn test_empty_file_has_no_groups() {
        let kf = KeyFile::parse(Path::new("empty.repo"), "\n# nothing here\n").unwrap();
        assert!(kf.groups.is_empty());
    }
}
