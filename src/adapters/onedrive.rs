use std::path::{Path, PathBuf};

use error_stack::{report, ResultExt};
use reqwest::{Client, StatusCode};
use tracing::instrument;
use url::Url;

use crate::config::drive_config::DriveConfig;
use crate::ports::file_store::{FetchError, RemoteFileStore};
use crate::ports::token_provider::AccessToken;

/// OneDrive through Microsoft Graph, addressing files by path below the
/// signed-in user's drive root.
#[derive(Debug, Clone)]
pub struct GraphFileStore {
    client: Client,
    base_url: Url,
    folder: Vec<String>,
}

impl GraphFileStore {
    pub fn new(client: Client, config: &DriveConfig) -> error_stack::Result<Self, FetchError> {
        let base_url = Url::parse(&config.graph_base_url)
            .change_context(FetchError::InvalidLocation)
            .attach_printable_lazy(|| format!("graph_base_url: {}", config.graph_base_url))?;

        if base_url.cannot_be_a_base() {
            return Err(report!(FetchError::InvalidLocation))
                .attach_printable(format!("graph_base_url: {}", config.graph_base_url));
        }

        Ok(Self {
            client,
            base_url,
            folder: config
                .folder
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        })
    }

    /// `{base}/me/drive/root:/{folder...}/{file_name}:/content`
    pub fn content_url(&self, file_name: &str) -> error_stack::Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| report!(FetchError::InvalidLocation))?;
            segments.pop_if_empty().extend(["me", "drive", "root:"]);
            segments.extend(&self.folder);
            segments.push(&format!("{}:", file_name));
            segments.push("content");
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl RemoteFileStore for GraphFileStore {
    #[instrument(skip(self, token, scratch_dir), name = "GraphFileStore::download")]
    async fn download(
        &self,
        token: &AccessToken,
        file_name: &str,
        scratch_dir: &Path,
    ) -> error_stack::Result<PathBuf, FetchError> {
        let url = self.content_url(file_name)?;
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(token.secret())
            .send()
            .await
            .change_context(FetchError::Http)
            .attach_printable_lazy(|| format!("GET {}", url))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(report!(FetchError::Status {
                status: status.as_u16()
            }))
            .attach_printable(format!("GET {}", url))
            .attach_printable(body.chars().take(300).collect::<String>());
        }

        let bytes = response.bytes().await.change_context(FetchError::Http)?;
        let destination = scratch_dir.join(file_name);
        tokio::fs::write(&destination, &bytes)
            .await
            .change_context(FetchError::Io)
            .attach_printable_lazy(|| format!("destination: {}", destination.display()))?;

        tracing::info!(
            "Downloaded {} ({} bytes) to {}",
            file_name,
            bytes.len(),
            destination.display()
        );
        Ok(destination)
    }
}
