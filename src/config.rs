// src/config.rs
//! Runtime settings for the front end.
//!
//! Values are layered, lowest precedence first:
//! 1. Built-in defaults (authority on `http://localhost:8080`)
//! 2. Optional `vc-portal.toml` in the working directory
//! 3. Environment variables prefixed with `VC_PORTAL_` (a `.env` file is
//!    loaded first when present)
//!
//! ## Environment Variables
//! - `VC_PORTAL_AUTHORITY_URL`: base URL of the credential authority
//! - `VC_PORTAL_REQUEST_TIMEOUT_SECS`: bound on every authority call
//! - `VC_PORTAL_LISTEN_ADDR`: socket address of the JSON front end

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_AUTHORITY_URL: &str = "http://localhost:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Process-wide settings, loaded once at startup.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the credential authority, without a trailing slash.
    pub authority_url: String,

    /// Upper bound, in seconds, on any single authority call.
    pub request_timeout_secs: u64,

    /// Address the JSON front end binds to.
    pub listen_addr: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            authority_url: DEFAULT_AUTHORITY_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from defaults, `vc-portal.toml` and the environment.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a source cannot be parsed or the result
    /// fails [`Settings::validate`].
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let settings: Settings = Config::builder()
            .set_default("authority_url", DEFAULT_AUTHORITY_URL)?
            .set_default("request_timeout_secs", DEFAULT_TIMEOUT_SECS)?
            .set_default("listen_addr", DEFAULT_LISTEN_ADDR)?
            .add_source(File::with_name("vc-portal").required(false))
            .add_source(Environment::with_prefix("VC_PORTAL").try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Checks that the settings can drive a working client.
    pub fn validate(&self) -> Result<()> {
        if !(self.authority_url.starts_with("http://") || self.authority_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "authority_url must be an http(s) URL, got {:?}",
                self.authority_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        self.socket_addr()?;
        Ok(())
    }

    /// Authority base URL with any trailing slash removed.
    pub fn authority_base(&self) -> &str {
        self.authority_url.trim_end_matches('/')
    }

    /// Per-call timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Parsed listen address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen_addr {:?}: {}", self.listen_addr, e)))
    }
}
