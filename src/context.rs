// src/context.rs
//! Process-scoped context shared by every lifecycle component.
//!
//! Built once at startup and handed to each component explicitly; there is
//! no global state.

use std::sync::Arc;
#[cfg(test)]
use std::time::Duration;

use crate::authority::client::AuthorityClient;
use crate::config::Settings;
use crate::error::Result;

/// Settings plus the shared authority client.
pub struct Context {
    pub settings: Settings,
    pub authority: AuthorityClient,
}

impl Context {
    /// Validates `settings` and builds the authority client from them.
    pub fn new(settings: Settings) -> Result<Arc<Self>> {
        settings.validate()?;
        let authority = AuthorityClient::from_settings(&settings)?;
        Ok(Arc::new(Self { settings, authority }))
    }

    /// Context pointing at `authority_url` with default settings otherwise.
    pub fn for_authority(authority_url: &str) -> Result<Arc<Self>> {
        Self::new(Settings {
            authority_url: authority_url.to_string(),
            ..Settings::default()
        })
    }

    /// Context whose authority calls give up after `timeout`.
    #[cfg(test)]
    pub(crate) fn with_timeout(authority_url: &str, timeout: Duration) -> Arc<Self> {
        let settings = Settings {
            authority_url: authority_url.to_string(),
            ..Settings::default()
        };
        let authority = AuthorityClient::new(settings.authority_base(), timeout).unwrap();
        Arc::new(Self { settings, authority })
    }
}
