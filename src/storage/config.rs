//! Persistence configuration.
//!
//! These structs are consumed, not produced, by the journal: an external
//! option parser fills them (every field has a serde default) and the
//! aggregator snapshots them at save time.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Connection parameters for the external document store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Remote writes happen only when this is true.
    pub enable: bool,
    /// Store host name.
    pub host: String,
    /// Store port; 0 is rejected when enabled.
    pub port: u16,
    /// User name; empty means no credentials.
    pub user: String,
    /// Password; never logged.
    pub password: String,
    /// Database used to authenticate the user.
    pub auth_source: String,
    /// Database receiving records.
    pub database: String,
    /// Collection receiving records.
    pub collection: String,
    /// Upper bound on connect + insert, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: "localhost".to_string(),
            port: 27017,
            user: String::new(),
            password: String::new(),
            auth_source: "admin".to_string(),
            database: "telemetry".to_string(),
            collection: "journal".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl RemoteConfig {
    /// Connection string, credentials included.
    #[must_use]
    pub fn uri(&self) -> String {
        self.build_uri(&self.password)
    }

    /// Connection string safe for logs.
    #[must_use]
    pub fn redacted_uri(&self) -> String {
        if self.password.is_empty() {
            self.uri()
        } else {
            self.build_uri("****")
        }
    }

    fn build_uri(&self, password: &str) -> String {
        let credentials = match (self.user.is_empty(), password.is_empty()) {
            (true, _) => String::new(),
            (false, true) => format!("{}@", self.user),
            (false, false) => format!("{}:{}@", self.user, password),
        };
        format!(
            "mongodb://{credentials}{}:{}/?authSource={}",
            self.host, self.port, self.auth_source
        )
    }

    /// `timeout_ms` as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Check the fields a remote write needs. A disabled config always passes.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !self.enable {
            return Ok(self);
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "host" });
        }
        if self.port == 0 {
            return Err(ValidationError::InvalidPort { port: self.port });
        }
        if self.database.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "database" });
        }
        if self.collection.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "collection" });
        }
        Ok(self)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("enable", &self.enable)
            .field("uri", &self.redacted_uri())
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Journal persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Default output path, without the `.json` extension.
    pub file_stem: String,
    /// External document store settings.
    pub remote: RemoteConfig,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            file_stem: "journal".to_string(),
            remote: RemoteConfig::default(),
        }
    }
}

impl JournalConfig {
    /// Check the file stem and the remote settings.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.file_stem.trim().is_empty() {
            return Err(ValidationError::InvalidFileStem {
                stem: self.file_stem,
                reason: "must not be empty".to_string(),
            });
        }
        if self.file_stem.ends_with('/') || self.file_stem.ends_with(std::path::MAIN_SEPARATOR) {
            return Err(ValidationError::InvalidFileStem {
                stem: self.file_stem,
                reason: "must name a file, not a directory".to_string(),
            });
        }
        let remote = self.remote.validate()?;
        Ok(Self {
            file_stem: self.file_stem,
            remote,
        })
    }
}
