//! Persistent HTTP cache with polite-fetch discipline.
//!
//! Requested files are mirrored under the cache root (`https://host/a/b.xml`
//! maps to `<root>/host/a/b.xml`) and served from disk on every later
//! request. Network fetches are serialized process-wide so the configured
//! delay holds across threads sharing one cache, retried with exponential
//! backoff on server errors, and written atomically (temp file + rename) so
//! readers never observe partial files.
//!
//! No default headers are shipped; callers talking to SEC EDGAR must inject
//! `User-Agent` (and ideally `From`) themselves.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::xml::{self, XmlDocument};
use crate::{Error, Result};

/// Cooperative cancellation flag, checked before every network request and
/// at element boundaries in the parsers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

enum Backend {
    Disk(PathBuf),
    /// Ephemeral in-memory store. Same fetch discipline, nothing touches
    /// the filesystem.
    Memory(DashMap<String, Vec<u8>>),
}

pub struct HttpCache {
    backend: Backend,
    headers: Vec<(String, String)>,
    delay: Duration,
    retries: u32,
    backoff_factor: f64,
    verbose: bool,
    client: reqwest::blocking::Client,
    /// Gate serializing network fetches; holds the instant the last fetch
    /// completed.
    last_fetch: Mutex<Option<Instant>>,
    /// Single-flight latches keyed by URL so concurrent requests for one
    /// URL coalesce onto one fetch.
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    cancel: CancelToken,
}

impl HttpCache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self::with_backend(Backend::Disk(cache_root.into()))
    }

    /// In-memory variant: identical fetch behavior, no disk mirror. Useful
    /// for short-lived parses that should leave no files behind.
    pub fn ephemeral() -> Self {
        Self::with_backend(Backend::Memory(DashMap::new()))
    }

    fn with_backend(backend: Backend) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        Self {
            backend,
            headers: Vec::new(),
            delay: Duration::ZERO,
            retries: 5,
            backoff_factor: 0.8,
            verbose: false,
            client,
            last_fetch: Mutex::new(None),
            in_flight: DashMap::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the headers sent with every following request, e.g.
    /// `[("User-Agent", "ExampleBot/1.0 (contact@example.com)"), ("From", ...)]`.
    pub fn set_headers<K: Into<String>, V: Into<String>>(
        &mut self,
        headers: impl IntoIterator<Item = (K, V)>,
    ) {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
    }

    /// `delay_ms` is the minimum wall-clock gap between two successive
    /// network fetches from this cache; retries/backoff follow
    /// `backoff_factor * 2^(attempt - 1)` seconds between failed attempts.
    pub fn set_connection_params(
        &mut self,
        delay_ms: u64,
        retries: u32,
        backoff_factor: f64,
        verbose: bool,
    ) {
        self.delay = Duration::from_millis(delay_ms);
        self.retries = retries.max(1);
        self.backoff_factor = backoff_factor;
        self.verbose = verbose;
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Local mirror path for a URL: scheme stripped, authority and path
    /// joined under the cache root.
    pub fn url_to_path(&self, url: &str) -> PathBuf {
        let root = match &self.backend {
            Backend::Disk(root) => root.clone(),
            Backend::Memory(_) => PathBuf::new(),
        };
        root.join(strip_scheme(url))
    }

    /// Returns the cached bytes for `url`, fetching and storing them first
    /// if absent.
    pub fn get(&self, url: &str) -> Result<Vec<u8>> {
        if !url.starts_with("http") {
            // local file passed through a URL slot
            return Ok(std::fs::read(url)?);
        }
        let latch = self
            .in_flight
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = latch.lock();
        let result = self.get_locked(url);
        drop(guard);
        self.in_flight.remove(url);
        result
    }

    fn get_locked(&self, url: &str) -> Result<Vec<u8>> {
        match &self.backend {
            Backend::Disk(_) => {
                let path = self.url_to_path(url);
                if path.exists() {
                    return Ok(std::fs::read(&path)?);
                }
                let bytes = self.fetch(url)?;
                write_atomic(&path, &bytes)?;
                Ok(bytes)
            }
            Backend::Memory(map) => {
                if let Some(bytes) = map.get(url) {
                    return Ok(bytes.value().clone());
                }
                let bytes = self.fetch(url)?;
                map.insert(url.to_string(), bytes.clone());
                Ok(bytes)
            }
        }
    }

    /// Like [`get`](Self::get) but returns the local mirror path. Only
    /// meaningful for disk-backed caches.
    pub fn get_path(&self, url: &str) -> Result<PathBuf> {
        match &self.backend {
            Backend::Disk(_) => {
                self.get(url)?;
                Ok(self.url_to_path(url))
            }
            Backend::Memory(_) => Err(Error::RemoteFetch {
                url: url.to_string(),
                reason: "ephemeral cache has no local paths".into(),
            }),
        }
    }

    pub fn get_and_parse_xml(&self, url: &str) -> Result<XmlDocument> {
        let bytes = self.get(url)?;
        xml::read(&bytes, url)
    }

    /// Removes a cached file. Returns whether anything was removed.
    pub fn purge(&self, url: &str) -> bool {
        match &self.backend {
            Backend::Disk(_) => std::fs::remove_file(self.url_to_path(url)).is_ok(),
            Backend::Memory(map) => map.remove(url).is_some(),
        }
    }

    /// Downloads a zip enclosure (the SEC ships one archive per filing),
    /// extracts every member beside the archive's mirror location and
    /// returns the directory the filing now lives in. Disk-backed caches
    /// only.
    pub fn cache_edgar_enclosure(&self, enclosure_url: &str) -> Result<PathBuf> {
        if !enclosure_url.ends_with(".zip") {
            return Err(Error::Archive {
                url: enclosure_url.to_string(),
                reason: "not a zip enclosure".into(),
            });
        }
        let Backend::Disk(_) = &self.backend else {
            return Err(Error::Archive {
                url: enclosure_url.to_string(),
                reason: "ephemeral cache cannot extract enclosures".into(),
            });
        };

        let bytes = self.get(enclosure_url)?;
        let dir_url = enclosure_url
            .rsplit_once('/')
            .map(|(dir, _)| dir)
            .unwrap_or(enclosure_url);
        let target_dir = self.url_to_path(dir_url);

        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| {
            Error::Archive {
                url: enclosure_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        for index in 0..archive.len() {
            let mut member = archive.by_index(index).map_err(|e| Error::Archive {
                url: enclosure_url.to_string(),
                reason: e.to_string(),
            })?;
            let Some(relative) = member.enclosed_name() else {
                continue;
            };
            if member.is_dir() {
                continue;
            }
            let mut contents = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut contents)?;
            write_atomic(&target_dir.join(relative), &contents)?;
        }
        Ok(target_dir)
    }

    /// One polite network fetch: waits out the configured delay since the
    /// previous fetch, then retries server errors with exponential backoff.
    /// Client errors (4xx) fail immediately.
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut gate = self.last_fetch.lock();
        self.cancel.check()?;
        if let Some(last) = *gate {
            let since = last.elapsed();
            if since < self.delay {
                std::thread::sleep(self.delay - since);
            }
        }

        let mut last_reason = String::new();
        for attempt in 1..=self.retries {
            if attempt > 1 {
                let seconds = self.backoff_factor * f64::powi(2.0, attempt as i32 - 2);
                std::thread::sleep(Duration::from_secs_f64(seconds));
                self.cancel.check()?;
            }
            let mut request = self.client.get(url);
            for (name, value) in &self.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    if self.verbose {
                        log::info!("{} {}", status.as_u16(), url);
                    }
                    if status.is_success() {
                        let bytes = response.bytes().map_err(|e| Error::RemoteFetch {
                            url: url.to_string(),
                            reason: e.to_string(),
                        })?;
                        *gate = Some(Instant::now());
                        return Ok(bytes.to_vec());
                    }
                    if status.is_client_error() {
                        *gate = Some(Instant::now());
                        return Err(Error::RemoteFetch {
                            url: url.to_string(),
                            reason: format!("HTTP {}", status.as_u16()),
                        });
                    }
                    last_reason = format!("HTTP {}", status.as_u16());
                }
                Err(e) => {
                    if self.verbose {
                        log::info!("ERR {url}: {e}");
                    }
                    last_reason = e.to_string();
                }
            }
        }
        *gate = Some(Instant::now());
        Err(Error::RemoteFetch {
            url: url.to_string(),
            reason: format!("{last_reason} (after {} attempts)", self.retries),
        })
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");
    let tmp = dir.join(format!(".{}.{}.part", file_name, std::process::id()));
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}

/// Key for visited sets: scheme-insensitive so `http://` and `https://`
/// spellings of one schema don't get discovered twice.
pub(crate) fn url_key(url: &str) -> String {
    strip_scheme(url).trim_end_matches('/').to_string()
}

/// Resolves `relative` against the document at `base`. Absolute inputs pass
/// through; URL bases use proper URL resolution, filesystem bases use path
/// joining with `..` normalization.
pub fn resolve_uri(base: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    if base.starts_with("http://") || base.starts_with("https://") {
        if let Ok(base_url) = url::Url::parse(base) {
            if let Ok(joined) = base_url.join(relative) {
                return joined.to_string();
            }
        }
        return relative.to_string();
    }
    // filesystem base: resolve against the containing directory
    let base_path = Path::new(base);
    let dir = if base_path.extension().is_some() {
        base_path.parent().unwrap_or_else(|| Path::new(""))
    } else {
        base_path
    };
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    let joined = dir.join(relative);
    for component in joined.components() {
        match component {
            std::path::Component::ParentDir => {
                if parts.pop().is_none() {
                    parts.push(std::ffi::OsStr::new(".."));
                }
            }
            std::path::Component::CurDir => {}
            other => parts.push(other.as_os_str()),
        }
    }
    let mut out = PathBuf::new();
    for part in parts {
        out.push(part);
    }
    out.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_to_path_mirrors_authority_and_path() {
        let cache = HttpCache::new("/tmp/xbrl-cache");
        assert_eq!(
            cache.url_to_path("https://www.sec.gov/a/b.xml"),
            PathBuf::from("/tmp/xbrl-cache/www.sec.gov/a/b.xml")
        );
        assert_eq!(
            cache.url_to_path("http://www.sec.gov/a/b.xml"),
            PathBuf::from("/tmp/xbrl-cache/www.sec.gov/a/b.xml")
        );
    }

    #[test]
    fn resolve_uri_urls() {
        assert_eq!(
            resolve_uri("https://example.com/a/b/entry.xsd", "lab.xml"),
            "https://example.com/a/b/lab.xml"
        );
        assert_eq!(
            resolve_uri("https://example.com/a/b/entry.xsd", "../elts/us-gaap.xsd"),
            "https://example.com/a/elts/us-gaap.xsd"
        );
        assert_eq!(
            resolve_uri("https://example.com/a/", "http://other.org/x.xsd"),
            "http://other.org/x.xsd"
        );
    }

    #[test]
    fn resolve_uri_paths() {
        assert_eq!(
            resolve_uri("/data/filing/instance.xml", "extension.xsd"),
            "/data/filing/extension.xsd"
        );
        assert_eq!(
            resolve_uri("/data/filing/instance.xml", "../base/core.xsd"),
            "/data/base/core.xsd"
        );
    }

    #[test]
    fn cached_file_served_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = HttpCache::new(dir.path());
        let url = "https://unreachable.invalid/doc.xml";
        write_atomic(&cache.url_to_path(url), b"<doc/>").unwrap();
        // any network attempt against .invalid would error; the mirror hit
        // must short-circuit before that
        assert_eq!(cache.get(url).unwrap(), b"<doc/>");
        assert_eq!(cache.get(url).unwrap(), b"<doc/>");
    }

    #[test]
    fn ephemeral_cache_purges() {
        let cache = HttpCache::ephemeral();
        match &cache.backend {
            Backend::Memory(map) => {
                map.insert("https://x.invalid/a".into(), b"payload".to_vec());
            }
            _ => unreachable!(),
        }
        assert_eq!(cache.get("https://x.invalid/a").unwrap(), b"payload");
        assert!(cache.purge("https://x.invalid/a"));
        assert!(!cache.purge("https://x.invalid/a"));
    }

    #[test]
    fn cancelled_fetch_aborts() {
        let cache = HttpCache::new("/tmp/xbrl-cache-cancel");
        cache.cancel_token().cancel();
        match cache.fetch("https://unreachable.invalid/doc.xml") {
            Err(Error::Cancelled) => {}
            other => panic!("expected cancellation, got {other:?}"),
        }
    }
}
