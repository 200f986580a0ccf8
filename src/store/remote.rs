// src/store/remote.rs

//! Repository store
//!
//! One [`RemoteStore`] per `[section]` of a repository file. Metadata is a
//! single JSON document (`repomd.json`) holding the repository's packages
//! and categories, fetched from `baseurl` into `cache_dir/<id>/` and parsed
//! on first use.
//!
//! `baseurl` may be an `http(s)://` URL, a `file://` URL or a plain path.

use super::Store;
use crate::cancel::Cancellable;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::keyfile::Group;
use crate::package::{Category, Package, PackageId};
use crate::progress::Completion;
use crate::version;
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Metadata document name, both upstream and in the cache
pub const METADATA_FILE: &str = "repomd.json";

/// Timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Attempts before a metadata download is given up
const MAX_RETRIES: u32 = 3;

const RETRY_DELAY_MS: u64 = 500;

/// Repository metadata document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

/// Settings read from one repository file section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    /// Section name
    pub id: String,
    pub name: String,
    pub baseurl: String,
    /// Raw `enabled` value and its line, parsed by [`RemoteStore::enabled`]
    pub enabled: Option<(String, usize)>,
    pub metadata_expire: Duration,
    /// File the section came from
    pub file: PathBuf,
}

impl RemoteSettings {
    /// Read a section, expanding `$releasever` and `$basearch`
    pub fn from_group(group: &Group, file: &Path, config: &Config) -> Result<Self> {
        let parse_error = |line: usize, message: String| Error::ConfigParse {
            path: file.to_path_buf(),
            line,
            message,
        };

        if group.name.is_empty() {
            return Err(Error::MissingStoreId);
        }

        let baseurl = group.get("baseurl").ok_or_else(|| {
            parse_error(group.line, format!("repository '{}' has no baseurl", group.name))
        })?;
        let baseurl = config.expand_substitutions(baseurl)?;

        let name = match group.get("name") {
            Some(name) => config.expand_substitutions(name)?,
            None => group.name.clone(),
        };

        let metadata_expire = match group.entry("metadata_expire") {
            Some(entry) => parse_expire(&entry.value).ok_or_else(|| {
                parse_error(entry.line, format!("invalid metadata_expire '{}'", entry.value))
            })?,
            None => config.metadata_expire(),
        };

        Ok(Self {
            id: group.name.clone(),
            name,
            baseurl,
            enabled: group.entry("enabled").map(|e| (e.value.clone(), e.line)),
            metadata_expire,
            file: file.to_path_buf(),
        })
    }
}

/// Parse `3600`, `90m`, `6h`, `7d` or `never`
fn parse_expire(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("never") {
        return Some(Duration::MAX);
    }
    let (digits, unit) = match value.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => value.split_at(idx),
        None => (value, ""),
    };
    let amount: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return None,
    };
    Some(Duration::from_secs(amount.checked_mul(multiplier)?))
}

enum Source {
    Path(PathBuf),
    Http(Url),
}

/// A configured repository
#[derive(Debug)]
pub struct RemoteStore {
    settings: RemoteSettings,
    cache_dir: PathBuf,
    metadata: Mutex<Option<Arc<RepoMetadata>>>,
    installed: Mutex<Option<Arc<dyn Store>>>,
}

impl RemoteStore {
    pub fn new(settings: RemoteSettings, config: &Config) -> Self {
        let cache_dir = config.cache_dir.join(&settings.id);
        Self {
            settings,
            cache_dir,
            metadata: Mutex::new(None),
            installed: Mutex::new(None),
        }
    }

    /// Build a store from a repository file section
    pub fn from_group(group: &Group, file: &Path, config: &Config) -> Result<Self> {
        Ok(Self::new(RemoteSettings::from_group(group, file, config)?, config))
    }

    pub fn settings(&self) -> &RemoteSettings {
        &self.settings
    }

    /// Human readable repository name
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_file(&self) -> PathBuf {
        self.cache_dir.join(METADATA_FILE)
    }

    /// Whether the repository is enabled
    ///
    /// Accepts `1/0`, `true/false` and `yes/no`; a missing key means
    /// enabled.
    pub fn enabled(&self) -> Result<bool> {
        let Some((raw, line)) = &self.settings.enabled else {
            return Ok(true);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(Error::ConfigParse {
                path: self.settings.file.clone(),
                line: *line,
                message: format!("invalid enabled value '{}' for repository {}", raw, self.settings.id),
            }),
        }
    }

    /// Attach the installed-package store used by `get_updates`
    pub fn set_installed(&self, store: Arc<dyn Store>) {
        *self.installed.lock().unwrap_or_else(PoisonError::into_inner) = Some(store);
    }

    fn installed(&self) -> Option<Arc<dyn Store>> {
        self.installed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Whether metadata is parsed and in memory
    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<RepoMetadata>> {
        self.metadata.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_current(&self, metadata: Option<Arc<RepoMetadata>>) {
        *self.metadata.lock().unwrap_or_else(PoisonError::into_inner) = metadata;
    }

    /// Whether the cached metadata is younger than `metadata_expire`
    pub fn cache_is_fresh(&self) -> Result<bool> {
        let meta = match fs::metadata(self.cache_file()) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let modified: DateTime<Utc> = meta.modified()?.into();
        let age = Utc::now().signed_duration_since(modified);
        // a timestamp in the future counts as fresh
        Ok(age.to_std().map_or(true, |age| age < self.settings.metadata_expire))
    }

    fn source(&self) -> Result<Source> {
        let baseurl = &self.settings.baseurl;
        match Url::parse(baseurl) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Source::Path)
                .map_err(|_| Error::Download(format!("invalid file URL {}", baseurl))),
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Source::Http(url)),
            Ok(url) => Err(Error::Download(format!(
                "unsupported URL scheme '{}' in {}",
                url.scheme(),
                baseurl
            ))),
            Err(_) => Ok(Source::Path(PathBuf::from(baseurl))),
        }
    }

    fn fetch(&self, cancellable: &Cancellable) -> Result<Vec<u8>> {
        match self.source()? {
            Source::Path(dir) => {
                let path = dir.join(METADATA_FILE);
                debug!("reading {} metadata from {}", self.settings.id, path.display());
                Ok(fs::read(&path)?)
            }
            Source::Http(base) => self.fetch_http(&base, cancellable),
        }
    }

    fn fetch_http(&self, base: &Url, cancellable: &Cancellable) -> Result<Vec<u8>> {
        let mut base = base.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let url = base
            .join(METADATA_FILE)
            .map_err(|e| Error::Download(format!("invalid metadata URL: {e}")))?;

        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Download(format!("failed to create HTTP client: {e}")))?;

        info!("fetching {} metadata from {}", self.settings.id, url);

        let mut attempt = 0;
        loop {
            cancellable.check()?;
            attempt += 1;
            match client.get(url.clone()).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::Download(format!("HTTP {} from {}", response.status(), url)));
                    }
                    let body = response
                        .bytes()
                        .map_err(|e| Error::Download(format!("failed to read {}: {e}", url)))?;
                    return Ok(body.to_vec());
                }
                Err(e) => {
                    if attempt >= MAX_RETRIES {
                        return Err(Error::Download(format!(
                            "failed to fetch {} after {attempt} attempts: {e}",
                            url
                        )));
                    }
                    warn!("fetch attempt {} for {} failed: {}, retrying", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    fn parse_metadata(&self, bytes: &[u8]) -> Result<RepoMetadata> {
        let mut metadata: RepoMetadata = serde_json::from_slice(bytes)?;
        for package in &mut metadata.packages {
            package.data = self.settings.id.clone();
        }
        Ok(metadata)
    }

    fn write_cache(&self, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let tmp = self.cache_dir.join(format!("{}.tmp", METADATA_FILE));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.cache_file())?;
        Ok(())
    }

    /// Download, validate and cache metadata
    fn download(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Arc<RepoMetadata>> {
        completion.set_total_steps(2)?;

        cancellable.check()?;
        let bytes = self.fetch(cancellable)?;
        completion.step_done()?;

        cancellable.check()?;
        let metadata = Arc::new(self.parse_metadata(&bytes)?);
        self.write_cache(&bytes)?;
        self.set_current(Some(Arc::clone(&metadata)));
        info!(
            "refreshed {}: {} packages, {} categories",
            self.settings.id,
            metadata.packages.len(),
            metadata.categories.len()
        );
        completion.step_done()?;
        Ok(metadata)
    }

    /// Metadata in memory, reading (or first downloading) the cache if needed
    fn ensure_loaded(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Arc<RepoMetadata>> {
        if let Some(metadata) = self.current() {
            completion.finish();
            return Ok(metadata);
        }

        completion.set_total_steps(2)?;

        cancellable.check()?;
        let child = completion.get_child()?;
        if !self.cache_file().exists() {
            let metadata = self.download(cancellable, &child)?;
            completion.finish();
            return Ok(metadata);
        }
        completion.step_done()?;

        cancellable.check()?;
        let bytes = fs::read(self.cache_file())?;
        let metadata = Arc::new(self.parse_metadata(&bytes)?);
        self.set_current(Some(Arc::clone(&metadata)));
        debug!("loaded {} packages for {}", metadata.packages.len(), self.settings.id);
        completion.step_done()?;
        Ok(metadata)
    }

    fn filter<F>(&self, cancellable: &Cancellable, completion: &Completion, predicate: F) -> Result<Vec<Package>>
    where
        F: Fn(&Package) -> bool,
    {
        completion.set_total_steps(2)?;
        let metadata = self.ensure_loaded(cancellable, &completion.get_child()?)?;
        completion.step_done()?;

        cancellable.check()?;
        let found = metadata.packages.iter().filter(|p| predicate(p)).cloned().collect();
        completion.step_done()?;
        Ok(found)
    }
}

impl Store for RemoteStore {
    fn id(&self) -> &str {
        &self.settings.id
    }

    fn load(&self, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        self.ensure_loaded(cancellable, completion).map(|_| ())
    }

    fn clean(&self, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        cancellable.check()?;
        match fs::remove_dir_all(&self.cache_dir) {
            Ok(()) => info!("removed cache for {}", self.settings.id),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.set_current(None);
        completion.finish();
        Ok(())
    }

    fn refresh(&self, force: bool, cancellable: &Cancellable, completion: &Completion) -> Result<()> {
        cancellable.check()?;
        if !force && self.cache_is_fresh()? {
            debug!("metadata for {} is still valid", self.settings.id);
            completion.finish();
            return Ok(());
        }
        self.download(cancellable, completion).map(|_| ())
    }

    fn search_name(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |p| p.name_contains(search))
    }

    fn search_details(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |p| p.details_contain(search))
    }

    fn search_group(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |p| p.group.as_deref() == Some(search))
    }

    fn search_category(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |p| p.in_category(search))
    }

    fn search_file(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |p| p.has_file(search))
    }

    fn resolve(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |p| p.name == search)
    }

    fn what_provides(&self, search: &str, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |p| p.provides(search))
    }

    fn get_packages(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        self.filter(cancellable, completion, |_| true)
    }

    fn get_updates(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Package>> {
        let installed = self.installed().ok_or_else(|| {
            Error::Config(format!(
                "no installed package store attached to repository {}",
                self.settings.id
            ))
        })?;

        completion.set_total_steps(3)?;

        let metadata = self.ensure_loaded(cancellable, &completion.get_child()?)?;
        completion.step_done()?;

        cancellable.check()?;
        let current = installed.get_packages(cancellable, &completion.get_child()?)?;
        completion.step_done()?;

        cancellable.check()?;
        let updates = metadata
            .packages
            .iter()
            .filter(|candidate| {
                current
                    .iter()
                    .filter(|i| {
                        i.name == candidate.name
                            && (i.arch == candidate.arch || candidate.arch == "noarch")
                    })
                    .max_by(|a, b| version::compare(&a.version, &b.version))
                    .is_some_and(|newest| version::is_newer(&candidate.version, &newest.version))
            })
            .cloned()
            .collect();
        completion.step_done()?;
        Ok(updates)
    }

    fn find_package(&self, id: &PackageId, cancellable: &Cancellable, completion: &Completion) -> Result<Option<Package>> {
        if id.data != self.settings.id {
            completion.finish();
            return Ok(None);
        }
        let found = self.filter(cancellable, completion, |p| id.matches(p))?;
        Ok(found.into_iter().next())
    }

    fn get_categories(&self, cancellable: &Cancellable, completion: &Completion) -> Result<Vec<Category>> {
        completion.set_total_steps(2)?;
        let metadata = self.ensure_loaded(cancellable, &completion.get_child()?)?;
        completion.step_done()?;
        cancellable.check()?;
        let categories = metadata.categories.clone();
        completion.step_done()?;
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyfile::KeyFile;
    use crate::package::INSTALLED_DATA;
    use crate::store::LocalStore;
    use tempfile::TempDir;

    const METADATA: &str = r#"{
        "packages": [
            {"name": "hal", "version": "0.5.12", "arch": "x86_64", "summary": "Hardware Abstraction Layer",
             "files": ["/usr/sbin/hald"], "group": "system"},
            {"name": "hal-info", "version": "20090414", "categories": ["base-system"]},
            {"name": "kernel", "version": "2.6.29", "arch": "x86_64", "provides": ["kernel-drm"]}
        ],
        "categories": [
            {"id": "base-system", "name": "Base System"},
            {"parent_id": "base-system", "id": "hal-info", "name": "HAL info"}
        ]
    }"#;

    struct Fixture {
        _temp: TempDir,
        config: Config,
        upstream: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let upstream = temp.path().join("upstream");
        fs::create_dir_all(&upstream).unwrap();
        fs::write(upstream.join(METADATA_FILE), METADATA).unwrap();
        let config = Config {
            cache_dir: temp.path().join("cache"),
            releasever: Some("11".to_string()),
            basearch: "x86_64".to_string(),
            ..Config::default()
        };
        Fixture {
            _temp: temp,
            config,
            upstream,
        }
    }

    fn store(fx: &Fixture, extra: &str) -> RemoteStore {
        let text = format!("[fedora]\nname=Fedora $releasever\nbaseurl={}\n{}", fx.upstream.display(), extra);
        let kf = KeyFile::parse(Path::new("fedora.repo"), &text).unwrap();
        RemoteStore::from_group(&kf.groups[0], &kf.path, &fx.config).unwrap()
    }

    #[test]
    fn test_settings_from_group() {
        let fx = fixture();
        let store = store(&fx, "metadata_expire=2h\n");
        assert_eq!(store.id(), "fedora");
        assert_eq!(store.name(), "Fedora 11");
        assert_eq!(store.settings().metadata_expire, Duration::from_secs(7200));
        assert_eq!(store.cache_dir(), fx.config.cache_dir.join("fedora"));
    }

    #[test]
    fn test_missing_baseurl_is_parse_error() {
        let fx = fixture();
        let kf = KeyFile::parse(Path::new("x.repo"), "[x]\nname=X\n").unwrap();
        let err = RemoteStore::from_group(&kf.groups[0], &kf.path, &fx.config).err().unwrap();
        assert!(matches!(err, Error::ConfigParse { line: 1, .. }));
    }

    #[test]
    fn test_enabled_values() {
        let fx = fixture();
        assert!(store(&fx, "").enabled().unwrap());
        assert!(store(&fx, "enabled=yes\n").enabled().unwrap());
        assert!(!store(&fx, "enabled=0\n").enabled().unwrap());
        assert!(!store(&fx, "enabled=False\n").enabled().unwrap());

        let err = store(&fx, "enabled=maybe\n").enabled().unwrap_err();
        assert!(matches!(err, Error::ConfigParse { line: 4, .. }));
    }

    #[test]
    fn test_parse_expire() {
        assert_eq!(parse_expire("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_expire("90m"), Some(Duration::from_secs(5400)));
        assert_eq!(parse_expire("7d"), Some(Duration::from_secs(604800)));
        assert_eq!(parse_expire("never"), Some(Duration::MAX));
        assert_eq!(parse_expire("soon"), None);
        assert_eq!(parse_expire("5w"), None);
    }

    #[test]
    fn test_load_downloads_into_cache() {
        let fx = fixture();
        let store = store(&fx, "");
        let completion = Completion::new();
        store.load(&Cancellable::new(), &completion).unwrap();

        assert!(store.is_loaded());
        assert!(store.cache_dir().join(METADATA_FILE).exists());
        assert!(store.cache_is_fresh().unwrap());
        assert_eq!(completion.percentage(), 100);
    }

    #[test]
    fn test_queries_tag_packages_with_store_id() {
        let fx = fixture();
        let store = store(&fx, "");
        let c = Cancellable::new();

        let found = store.search_name("hal", &c, &Completion::new()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.data == "fedora"));

        let found = store.what_provides("kernel-drm", &c, &Completion::new()).unwrap();
        assert_eq!(found[0].name, "kernel");

        let found = store.search_file("/usr/sbin/hald", &c, &Completion::new()).unwrap();
        assert_eq!(found[0].name, "hal");

        let found = store.search_category("base-system", &c, &Completion::new()).unwrap();
        assert_eq!(found[0].name, "hal-info");

        assert_eq!(store.get_categories(&c, &Completion::new()).unwrap().len(), 2);

        let id = PackageId::parse("kernel;2.6.29;x86_64;fedora").unwrap();
        assert!(store.find_package(&id, &c, &Completion::new()).unwrap().is_some());
        let elsewhere = PackageId::parse("kernel;2.6.29;x86_64;updates").unwrap();
        assert!(store.find_package(&elsewhere, &c, &Completion::new()).unwrap().is_none());
    }

    #[test]
    fn test_refresh_skips_fresh_cache_unless_forced() {
        let fx = fixture();
        let store = store(&fx, "");
        let c = Cancellable::new();
        store.refresh(false, &c, &Completion::new()).unwrap();

        // upstream changes are only seen on a forced refresh
        fs::write(fx.upstream.join(METADATA_FILE), r#"{"packages": []}"#).unwrap();
        store.refresh(false, &c, &Completion::new()).unwrap();
        assert_eq!(store.get_packages(&c, &Completion::new()).unwrap().len(), 3);

        store.refresh(true, &c, &Completion::new()).unwrap();
        assert!(store.get_packages(&c, &Completion::new()).unwrap().is_empty());
    }

    #[test]
    fn test_clean_removes_cache() {
        let fx = fixture();
        let store = store(&fx, "");
        let c = Cancellable::new();
        store.load(&c, &Completion::new()).unwrap();

        store.clean(&c, &Completion::new()).unwrap();
        assert!(!store.is_loaded());
        assert!(!store.cache_dir().exists());

        // cleaning twice is fine
        store.clean(&c, &Completion::new()).unwrap();
    }

    #[test]
    fn test_get_updates_against_installed() {
        let fx = fixture();
        let store = store(&fx, "");
        let c = Cancellable::new();
        assert!(matches!(store.get_updates(&c, &Completion::new()), Err(Error::Config(_))));

        let local = LocalStore::in_memory().unwrap();
        local.add_package(&Package::new("hal", "0.5.11", "x86_64", INSTALLED_DATA)).unwrap();
        local.add_package(&Package::new("kernel", "2.6.29", "x86_64", INSTALLED_DATA)).unwrap();
        store.set_installed(Arc::new(local));

        let completion = Completion::new();
        let updates = store.get_updates(&c, &completion).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name, "hal");
        assert_eq!(completion.percentage(), 100);
    }

    #[test]
    fn test_cancelled_refresh() {
        let fx = fixture();
        let store = store(&fx, "");
        let c = Cancellable::new();
        c.cancel();
        assert!(matches!(store.refresh(true, &c, &Completion::new()), Err(Error::Cancelled)));
        assert!(!store.cache_dir().exists());
    }

    #[test]
    fn test_unreachable_baseurl() {
        let fx = fixture();
        let text = "[broken]\nbaseurl=file:///nonexistent/zif/repo\n";
        let kf = KeyFile::parse(Path::new("broken.repo"), text).unwrap();
        let store = RemoteStore::from_group(&kf.groups[0], &kf.path, &fx.config).unwrap();
        assert!(matches!(
            store.refresh(true, &Cancellable::new(), &Completion::new()),
            Err(Error::Io(_))
        ));
    }
}
