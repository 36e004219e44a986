use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const CREDENTIALS_DIR: &str = ".credentials";
const TOKEN_CACHE_NAME: &str = "sheets.googleapis.com-sheets2csv.json";

/// Tokens count as expired this many seconds before their recorded expiry.
const EXPIRY_DELTA_SECS: i64 = 10;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// A token without an expiry is never considered expired. Go clients
    /// write their zero time (`0001-01-01T00:00:00Z`) for "no expiry", so
    /// anything at or before the Unix epoch counts as unset.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) if expiry > DateTime::UNIX_EPOCH => {
                expiry <= now + Duration::seconds(EXPIRY_DELTA_SECS)
            }
            _ => false,
        }
    }
}

/// File-backed cache for a single OAuth token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache path under the current user's home directory.
    pub fn locate() -> Result<PathBuf> {
        let home = home::home_dir().ok_or_else(|| {
            AppError::PathResolution("unable to determine home directory".to_string())
        })?;
        Self::locate_in(&home)
    }

    /// `<home>/.credentials/<escaped name>`, creating `.credentials` (0700) if needed.
    pub fn locate_in(home: &Path) -> Result<PathBuf> {
        let dir = home.join(CREDENTIALS_DIR);
        create_private_dir(&dir).map_err(|e| {
            AppError::PathResolution(format!("failed to create {}: {}", dir.display(), e))
        })?;

        let name: String =
            url::form_urlencoded::byte_serialize(TOKEN_CACHE_NAME.as_bytes()).collect();
        Ok(dir.join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Token> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::TokenNotFound(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents).map_err(|source| AppError::TokenDecode {
            path: self.path.clone(),
            source,
        })
    }

    #[instrument(name = "Saving token cache", skip_all, fields(path = %self.path.display()))]
    pub fn save(&self, token: &Token) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent)?;
        }

        let contents = serde_json::to_string_pretty(token)?;

        // Mode applies only when the file is created; an existing cache keeps its permissions.
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.path)?;
        file.write_all(contents.as_bytes())?;

        debug!("Token cache written");
        Ok(())
    }

    /// Delete the cached token, if any.
    #[instrument(name = "Clearing cached token", skip_all, fields(path = %self.path.display()))]
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared cached token");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cached token to clear");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    DirBuilder::new().recursive(true).mode(0o700).create(dir)
}
