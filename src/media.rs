use dashmap::DashMap;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::constants::MAX_MEDIA_BYTES;
use crate::error::AppError;
use crate::retry::RetryPolicy;

/// Recognized image extensions, in lookup order.
pub(crate) const EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const DEFAULT_EXTENSION: &str = "jpg";

/// A media file stored under the cache root.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocalMedia {
    pub(crate) fingerprint: String,
    pub(crate) path: PathBuf,
}

impl LocalMedia {
    /// Chat marker referencing the local file. Uses `file=` so it never
    /// matches the remote `url=` form again.
    pub(crate) fn marker(&self) -> String {
        let path = self.path.to_string_lossy();
        format!("[CQ:image,file=file:///{}]", path.trim_start_matches('/'))
    }
}

pub(crate) fn fingerprint(locator: &str) -> String {
    hex::encode(Sha256::digest(locator.as_bytes()))
}

/// First recognized extension appearing anywhere in the locator
/// (case-insensitive), e.g. `.../a.PNG?x=1` gives `png`.
pub(crate) fn extension_for(locator: &str) -> Option<&'static str> {
    let lower = locator.to_ascii_lowercase();
    EXTENSIONS.into_iter().find(|ext| lower.contains(ext))
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let subtype = content_type
        .split(';')
        .next()?
        .trim()
        .strip_prefix("image/")?;
    match subtype {
        "jpeg" | "jpg" | "pjpeg" => Some("jpg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        "bmp" | "x-ms-bmp" => Some("bmp"),
        "webp" => Some("webp"),
        _ => None,
    }
}

/// Files live at `<root>/<fingerprint>.<ext>` and are never rewritten once
/// stored; the fingerprint covers the locator string, not the bytes.
pub(crate) struct MediaFetcher {
    http: Client,
    root: PathBuf,
    timeout: Duration,
    retry: RetryPolicy,
    max_bytes: u64,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

/// Drops the in-flight lock for a fingerprint once no fetch holds it, even
/// when the fetching future is cancelled.
struct InflightSlot<'a> {
    inflight: &'a DashMap<String, Arc<Mutex<()>>>,
    fp: &'a str,
}

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        self.inflight
            .remove_if(self.fp, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl MediaFetcher {
    pub(crate) fn new(http: Client, root: PathBuf, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            http,
            root,
            timeout,
            retry,
            max_bytes: MAX_MEDIA_BYTES,
            inflight: DashMap::new(),
        }
    }

    /// Existing local copy for a fingerprint, if any.
    async fn cached(&self, fp: &str) -> Option<LocalMedia> {
        for ext in EXTENSIONS {
            let path = self.root.join(format!("{fp}.{ext}"));
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
                return Some(LocalMedia {
                    fingerprint: fp.to_string(),
                    path,
                });
            }
        }
        None
    }

    /// Return a local copy of `locator`, downloading it on first use.
    /// Concurrent first fetches of one locator share a single download.
    pub(crate) async fn fetch(&self, locator: &str) -> Result<LocalMedia, AppError> {
        let fp = fingerprint(locator);
        if let Some(hit) = self.cached(&fp).await {
            debug!(fingerprint = %fp, "Media cache hit");
            return Ok(hit);
        }

        // Declared first so it drops after the lock below is released.
        let _slot = InflightSlot {
            inflight: &self.inflight,
            fp: &fp,
        };
        let lock = self
            .inflight
            .entry(fp.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;
        match self.cached(&fp).await {
            Some(hit) => Ok(hit),
            None => self.download(locator, &fp).await,
        }
    }

    async fn download(&self, locator: &str, fp: &str) -> Result<LocalMedia, AppError> {
        let http = &self.http;
        let timeout = self.timeout;
        let max_bytes = self.max_bytes;
        let (content_type, bytes) = self
            .retry
            .run("media_fetch", move || async move {
                let mut resp = http.get(locator).timeout(timeout).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    let body = resp.text().await.unwrap_or_default();
                    return Err(AppError::upstream(status, body));
                }
                let content_type = resp
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let too_large = || AppError::Other(format!("media exceeds {max_bytes} bytes"));
                if resp.content_length().is_some_and(|len| len > max_bytes) {
                    return Err(too_large());
                }
                let mut body = Vec::new();
                while let Some(chunk) = resp.chunk().await? {
                    if (body.len() + chunk.len()) as u64 > max_bytes {
                        return Err(too_large());
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok::<_, AppError>((content_type, body))
            })
            .await?;

        let ext = extension_for(locator)
            .or_else(|| content_type.as_deref().and_then(extension_for_content_type))
            .unwrap_or(DEFAULT_EXTENSION);

        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(format!("{fp}.{ext}"));
        let tmp = self
            .root
            .join(format!(".{fp}.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        info!(fingerprint = %fp, bytes = bytes.len(), path = %path.display(), "Stored media");
        Ok(LocalMedia {
            fingerprint: fp.to_string(),
            path,
        })
    }

    /// Delete stored media whose modification time is older than `max_age`.
    /// Returns the number of files removed.
    pub(crate) fn sweep_older_than(&self, max_age: Duration) -> Result<usize, AppError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut removed = 0;
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else { continue };
            if modified < cutoff {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!(path = %entry.path().display(), "Failed to remove media: {e}"),
                }
            }
        }
        Ok(removed)
    }
}
