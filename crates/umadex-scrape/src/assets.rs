//! Thumbnail download cache.
//!
//! Files are named after a stable identity (slug, then numeric id), so a
//! second run finds them on disk and makes no request at all.

use crate::error::{Result, ScrapeError};
use crate::extract::support::id_from_img_src;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
enum DownloadError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("write failed: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("write task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
    dir: PathBuf,
    delay: Duration,
}

impl AssetFetcher {
    /// Fetcher writing into `dir`, with a per-request `timeout` and a pause
    /// of `delay` after every download.
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration, delay: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ScrapeError::Config(format!("thumbnail http client: {e}")))?;
        Ok(Self {
            client,
            dir: dir.into(),
            delay,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Local file `url` is stored as.
    pub fn local_path(&self, url: &str, slug: Option<&str>, id: Option<&str>) -> PathBuf {
        let base = slug
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .or_else(|| id.filter(|s| !s.is_empty()).map(str::to_string))
            .or_else(|| id_from_img_src(url))
            .unwrap_or_else(|| "support".to_string());
        self.dir.join(format!("{}{}", sanitize(&base), extension(url)))
    }

    /// Download `url` unless it is already cached and return the
    /// site-relative path. Failures are logged and give `None`.
    pub async fn fetch(&self, url: &str, slug: Option<&str>, id: Option<&str>) -> Option<String> {
        if url.is_empty() {
            return None;
        }
        let dest = self.local_path(url, slug, id);

        let cached = tokio::fs::metadata(&dest)
            .await
            .map(|m| m.len() > 0)
            .unwrap_or(false);
        if !cached {
            if let Err(e) = self.download(url, &dest).await {
                tracing::warn!("thumbnail {url} failed: {e}");
                return None;
            }
            tokio::time::sleep(self.delay).await;
        }
        Some(site_path(&dest))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), DownloadError> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // A partial file must never appear at `dest`.
        let dir = self.dir.clone();
        let target = dest.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), DownloadError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&bytes)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target)?;
            Ok(())
        })
        .await??;
        tracing::debug!(url, path = %dest.display(), "saved thumbnail");
        Ok(())
    }
}

fn sanitize(base: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^a-z0-9\-_.]").expect("valid regex"));
    re.replace_all(&base.to_lowercase(), "-").into_owned()
}

/// Extension of the URL path including the dot, `.png` when there is none.
fn extension(url: &str) -> String {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rfind('.') {
        Some(i) if i > 0 && i + 1 < file.len() => file[i..].to_string(),
        _ => ".png".to_string(),
    }
}

/// `/`-rooted forward-slash form of a local path.
fn site_path(path: &Path) -> String {
    let posix = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    let mut rel = format!("/{}", posix.trim_start_matches('/'));
    while rel.contains("//") {
        rel = rel.replace("//", "/");
    }
    rel
}
