//! Retrieval of remote files (structures, derived-data indices).
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::cell::OnceCell;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Anything that can turn a URL into bytes.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches `http(s)://` URLs with a blocking reqwest client and reads `file://`
/// URLs from the local filesystem (local mirrors).
#[derive(Debug, Default)]
pub struct UrlFetcher {
    client: OnceCell<Client>,
}

impl UrlFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .user_agent(concat!("pdbchains/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl Fetch for UrlFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = url.strip_prefix("file://") {
            return std::fs::read(path).with_context(|| format!("failed to read {url}"));
        }
        let response = self
            .client()?
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("download of {url} failed"))?;
        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read response body of {url}"))?;
        Ok(bytes.to_vec())
    }
}

pub fn join_url(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Write through `write` into a temporary file next to `path`, then rename it into
/// place. `path` either keeps its old content or holds the complete new one.
pub fn persist_with<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut NamedTempFile) -> Result<()>,
{
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
    write(&mut temp)?;
    temp.persist(path)
        .with_context(|| format!("failed to rename temporary file to {}", path.display()))?;
    Ok(())
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    persist_with(path, |temp| {
        temp.write_all(bytes)?;
        temp.flush()?;
        Ok(())
    })
    .with_context(|| format!("failed to write {}", path.display()))
}
