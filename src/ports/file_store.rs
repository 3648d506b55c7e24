use std::path::{Path, PathBuf};

use thiserror::Error;

use super::token_provider::AccessToken;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid remote file location")]
    InvalidLocation,
    #[error("request to the file store failed")]
    Http,
    #[error("file store answered with status {status}")]
    Status { status: u16 },
    #[error("failed to write the downloaded file")]
    Io,
}

#[async_trait::async_trait]
pub trait RemoteFileStore: Send + Sync {
    /// Downloads `file_name` into `scratch_dir` and returns the local path.
    async fn download(
        &self,
        token: &AccessToken,
        file_name: &str,
        scratch_dir: &Path,
    ) -> error_stack::Result<PathBuf, FetchError>;
}
