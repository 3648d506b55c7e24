//! On-disk token cache shared between runs.
//!
//! The cache is loaded once when a run starts, mutated by the authenticator
//! and written back when the run ends, only if something changed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use error_stack::{report, ResultExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tokens closer than this to expiry are treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

#[derive(Error, Debug)]
pub enum TokenCacheError {
    #[error("failed to serialize the token cache")]
    Serialize,
    #[error("failed to write the token cache")]
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccount {
    #[serde(default)]
    pub username: Option<String>,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CachedAccount {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now > Duration::seconds(EXPIRY_MARGIN_SECS)
    }

    /// Case-insensitive, ignoring the resource prefix the provider may add
    /// (`https://graph.microsoft.com/Files.ReadWrite`).
    pub fn covers(&self, scopes: &[String]) -> bool {
        scopes.iter().all(|wanted| {
            self.scopes.iter().any(|granted| {
                let granted = granted.rsplit('/').next().unwrap_or(granted);
                granted.eq_ignore_ascii_case(wanted)
            })
        })
    }

    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown account")
    }
}

#[derive(Debug)]
pub struct TokenCache {
    path: PathBuf,
    account: Option<CachedAccount>,
    dirty: bool,
}

impl TokenCache {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            account: None,
            dirty: false,
        }
    }

    /// A missing file is an empty cache. An unreadable one is logged and
    /// also treated as empty, so the next sign-in overwrites it.
    #[tracing::instrument(name = "TokenCache::load")]
    pub fn load(path: &Path) -> Self {
        let mut cache = Self::empty(path);

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::trace!("No token cache at {}", path.display());
                return cache;
            }
            Err(err) => {
                tracing::warn!("Ignoring unreadable token cache {}: {}", path.display(), err);
                return cache;
            }
        };

        match serde_json::from_str::<CachedAccount>(&content) {
            Ok(account) => {
                tracing::trace!("Loaded cached account {}", account.display_name());
                cache.account = Some(account);
            }
            Err(err) => {
                tracing::warn!("Ignoring corrupt token cache {}: {}", path.display(), err);
            }
        }
        cache
    }

    pub fn account(&self) -> Option<&CachedAccount> {
        self.account.as_ref()
    }

    pub fn store(&mut self, account: CachedAccount) {
        self.account = Some(account);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Writes the cache if it changed since it was loaded. Returns whether a
    /// write happened.
    #[tracing::instrument(name = "TokenCache::persist", skip(self), fields(path = %self.path.display()))]
    pub fn persist(&mut self) -> error_stack::Result<bool, TokenCacheError> {
        let Some(account) = self.account.as_ref().filter(|_| self.dirty) else {
            return Ok(false);
        };

        let content =
            serde_json::to_string_pretty(account).change_context(TokenCacheError::Serialize)?;
        write_private_file(&self.path, &content)
            .change_context(TokenCacheError::Write)
            .attach_printable_lazy(|| format!("token cache path: {}", self.path.display()))?;

        self.dirty = false;
        tracing::trace!("Token cache written");
        Ok(true)
    }
}

/// Temp file + rename in the target directory; mode 0600 on Unix.
fn write_private_file(path: &Path, content: &str) -> error_stack::Result<(), std::io::Error> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| report!(err))?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, content).map_err(|err| report!(err))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .map_err(|err| report!(err))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|err| report!(err))?;
    Ok(())
}
