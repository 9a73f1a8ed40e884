//! HTTP access to the public content APIs the commands are built on, and the
//! local directory where downloaded media is kept.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ProvidersConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("provider reported failure (code {code}): {message}")]
    Api { code: i64, message: String },

    #[error("unexpected payload: {0}")]
    Payload(String),

    #[error("local storage: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// The content API hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Host {
    Pearktrue,
    Vvhan,
    Cenguigui,
    Aa1,
    Lolimi,
    Photos,
}

/// Shared client for every content provider call.
///
/// All calls carry the configured timeout so one stuck provider can't stall
/// the message loop.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    hosts: ProvidersConfig,
}

impl ApiClient {
    pub fn new(config: &ProvidersConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            hosts: config.clone(),
        })
    }

    pub fn url(&self, host: Host, path: &str) -> String {
        let base = match host {
            Host::Pearktrue => &self.hosts.pearktrue,
            Host::Vvhan => &self.hosts.vvhan,
            Host::Cenguigui => &self.hosts.cenguigui,
            Host::Aa1 => &self.hosts.aa1,
            Host::Lolimi => &self.hosts.lolimi,
            Host::Photos => &self.hosts.photos,
        };
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    async fn get<Q>(&self, url: &str, query: &Q) -> ProviderResult<reqwest::Response>
    where
        Q: Serialize + ?Sized,
    {
        debug!("GET {}", url);
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    pub async fn get_json<T, Q>(&self, host: Host, path: &str, query: &Q) -> ProviderResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(host, path);
        let body = self.get(&url, query).await?.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Payload(format!("{}: {}", url, e)))
    }

    /// Plain-text or HTML body
    pub async fn get_text<Q>(&self, host: Host, path: &str, query: &Q) -> ProviderResult<String>
    where
        Q: Serialize + ?Sized,
    {
        let url = self.url(host, path);
        Ok(self.get(&url, query).await?.text().await?)
    }

    pub async fn get_bytes<Q>(&self, host: Host, path: &str, query: &Q) -> ProviderResult<Vec<u8>>
    where
        Q: Serialize + ?Sized,
    {
        let url = self.url(host, path);
        Ok(self.get(&url, query).await?.bytes().await?.to_vec())
    }

    /// Download an absolute URL handed back by a provider
    pub async fn download(&self, url: &str) -> ProviderResult<Vec<u8>> {
        let no_query: [(&str, &str); 0] = [];
        Ok(self.get(url, &no_query).await?.bytes().await?.to_vec())
    }

    /// Upload a local file as multipart field `file` and parse the JSON reply
    pub async fn upload_json<T>(
        &self,
        host: Host,
        path: &str,
        file: &Path,
        mime: &str,
    ) -> ProviderResult<T>
    where
        T: DeserializeOwned,
    {
        let url = self.url(host, path);
        let bytes = tokio::fs::read(file).await?;
        let file_name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        debug!("POST {} ({})", url, file.display());
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::Payload(format!("{}: {}", url, e)))
    }
}

/// Fail unless a provider's `code` field says 200
pub fn expect_code(code: i64, message: Option<&str>) -> ProviderResult<()> {
    if code == 200 {
        Ok(())
    } else {
        Err(ProviderError::Api {
            code,
            message: message.unwrap_or("no message").to_string(),
        })
    }
}

/// Render a JSON scalar without quotes, so numbers and strings print alike
pub fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Directory for media the bot downloads or generates
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// A sub-directory of the store, created on demand
    pub async fn dir(&self, name: &str) -> ProviderResult<PathBuf> {
        let dir = self.root.join(name);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Write bytes to a fresh `{stem}-{uuid}.{ext}` file and return its path
    pub async fn save(&self, stem: &str, ext: &str, bytes: &[u8]) -> ProviderResult<PathBuf> {
        if bytes.is_empty() {
            return Err(ProviderError::Payload(format!("empty {} download", stem)));
        }
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self
            .root
            .join(format!("{}-{}.{}", stem, Uuid::new_v4().simple(), ext));
        tokio::fs::write(&path, bytes).await?;
        debug!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Delete files in the store and its sub-directories that were last
    /// modified at least `max_age` ago. Returns how many were removed.
    pub async fn prune(&self, max_age: Duration) -> ProviderResult<usize> {
        let mut removed = 0;
        let mut dirs = vec![self.root.clone()];
        while let Some(dir) = dirs.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    dirs.push(entry.path());
                    continue;
                }
                let age = meta.modified()?.elapsed().unwrap_or_default();
                if age >= max_age {
                    tokio::fs::remove_file(entry.path()).await?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            info!("Pruned {} media files from {}", removed, self.root.display());
        }
        Ok(removed)
    }
}

/// Path as the string form a reply carries
pub fn path_reply(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
