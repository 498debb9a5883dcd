//! Service configuration.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration:
//!
//! ```toml
//! bind_address   = "0.0.0.0:3000"
//! log_filter     = "info,apibase=debug"
//! upload_dir     = "/var/tmp/uploads"
//! max_body_bytes = 2097152
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Default request body limit: 2 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// `host:port` the server listens on.
    pub bind_address: String,
    /// `tracing` filter directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Where multipart uploads are spooled. In memory when unset.
    pub upload_dir: Option<PathBuf>,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_owned(),
            log_filter: "info".to_owned(),
            upload_dir: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    /// Reads a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_owned(),
            message: e.to_string(),
        })
    }

    /// Applies `PORT` (keeping the configured host) and `APIBASE_UPLOAD_DIR`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = var("PORT").filter(|p| !p.is_empty()) {
            let host = self.bind_address.rsplit_once(':').map_or("0.0.0.0", |(host, _)| host);
            self.bind_address = format!("{host}:{port}");
        }
        if let Some(dir) = var("APIBASE_UPLOAD_DIR").filter(|d| !d.is_empty()) {
            self.upload_dir = Some(PathBuf::from(dir));
        }
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        self.bind_address.parse().map_err(|source| Error::InvalidAddress {
            addr: self.bind_address.clone(),
            source,
        })
    }
}
