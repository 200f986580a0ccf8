// src/package.rs

//! Package and category value types
//!
//! Stores return plain values; nothing here knows where the data came from
//! except the `data` field, which carries the store id (`installed` for the
//! local store, the repository id otherwise).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store id used for installed packages
pub const INSTALLED_DATA: &str = "installed";

/// A package as reported by a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    #[serde(default = "default_arch")]
    pub arch: String,
    /// Store the package was found in
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group: Option<String>,
    /// Category ids (comps groups) the package belongs to
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,
}

fn default_arch() -> String {
    "noarch".to_string()
}

impl Package {
    /// Create a package with no metadata beyond its identity
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
        data: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
            data: data.into(),
            summary: String::new(),
            description: String::new(),
            group: None,
            categories: Vec::new(),
            files: Vec::new(),
            provides: Vec::new(),
        }
    }

    /// The package id (`name;version;arch;data`)
    pub fn id(&self) -> PackageId {
        PackageId {
            name: self.name.clone(),
            version: self.version.clone(),
            arch: self.arch.clone(),
            data: self.data.clone(),
        }
    }

    /// Key used to drop duplicates from merged results
    pub fn dedup_key(&self) -> (String, String) {
        (self.name.clone(), self.version.clone())
    }

    /// Case-insensitive substring match on the name
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Case-insensitive substring match on name, summary or description
    pub fn details_contain(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.name, &self.summary, &self.description]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }

    /// Whether the package provides `what`, either by name or explicitly
    pub fn provides(&self, what: &str) -> bool {
        self.name == what || self.provides.iter().any(|p| p == what)
    }

    /// Whether the package owns the file at `path`
    pub fn has_file(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}

/// Parsed `name;version;arch;data` identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub data: String,
}

impl PackageId {
    /// Parse a package id
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(';').collect();
        if parts.len() != 4 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(Error::InvalidPackageId(s.to_string()));
        }
        Ok(Self {
            name: parts[0].to_string(),
            version: parts[1].to_string(),
            arch: parts[2].to_string(),
            data: parts[3].to_string(),
        })
    }

    /// Whether `package` is the one this id names
    pub fn matches(&self, package: &Package) -> bool {
        package.name == self.name
            && package.version == self.version
            && package.arch == self.arch
            && package.data == self.data
    }
}

impl FromStr for PackageId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{};{};{}", self.name, self.version, self.arch, self.data)
    }
}

/// A category (comps group) as reported by a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Parent category id, `None` for top-level categories
    #[serde(default)]
    pub parent_id: Option<String>,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub icon: Option<String>,
}

impl Category {
    pub fn new(parent_id: Option<&str>, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.map(str::to_string),
            id: id.into(),
            name: name.into(),
            summary: String::new(),
            icon: None,
        }
    }

    /// Key used to drop duplicates from merged results
    pub fn dedup_key(&self) -> (Option<String>, String) {
        (self.parent_id.clone(), self.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_display_and_parse() {
        let pkg = Package::new("hal", "0.5.7-1.fc11", "i386", "fedora");
        let id = pkg.id();
        assert_eq!(id.to_string(), "hal;0.5.7-1.fc11;i386;fedora");

        let parsed: PackageId = "hal;0.5.7-1.fc11;i386;fedora".parse().unwrap();
        assert_eq!(parsed, id);
        assert!(parsed.matches(&pkg));
    }

    #[test]
    fn test_package_id_rejects_malformed() {
        assert!(PackageId::parse("hal;0.5.7").is_err());
        assert!(PackageId::parse(";1.0;noarch;fedora").is_err());
        assert!(PackageId::parse("a;b;c;d;e").is_err());
    }

    #[test]
    fn test_matching_helpers() {
        let mut pkg = Package::new("gnome-power-manager", "2.26.0", "x86_64", "fedora");
        pkg.summary = "Power management for GNOME".to_string();
        pkg.files = vec!["/usr/bin/gnome-power-manager".to_string()];
        pkg.provides = vec!["config(gnome-power-manager)".to_string()];

        assert!(pkg.name_contains("POWER"));
        assert!(pkg.details_contain("management"));
        assert!(pkg.has_file("/usr/bin/gnome-power-manager"));
        assert!(pkg.provides("gnome-power-manager"));
        assert!(pkg.provides("config(gnome-power-manager)"));
        assert!(!pkg.provides("kernel"));
    }

    #[test]
    fn test_metadata_defaults() {
        let pkg: Package = serde_json::from_str(r#"{"name": "bash", "version": "4.0"}"#).unwrap();
        assert_eq!(pkg.arch, "noarch");
        assert!(pkg.data.is_empty());
        assert!(pkg.files.is_empty());
    }
}
