//! Client configuration.
//!
//! Everything a client or session instance needs is carried in one value
//! passed at construction, so independent instances can target different
//! deployments from the same process.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection and rendering configuration threaded into [`SpaceClient`] and
/// every [`Space`] it opens.
///
/// [`SpaceClient`]: crate::client::SpaceClient
/// [`Space`]: crate::session::Space
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin serving the workspace surfaces, e.g. `https://strata.example.com`.
    pub host: String,
    /// Cookie scope used when injecting the credential string into a session.
    pub domain: String,
    /// Deadline applied to navigation and to the readiness handshake.
    pub timeout: Duration,
    /// Boolean global the remote surface flips once its own initialization
    /// is finished.
    pub ready_flag: String,
    pub render: RenderOptions,
}

/// How the session browser is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderOptions {
    pub headless: bool,
    /// Applied only to headless launches; headed windows size themselves.
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:3000".to_string(),
            domain: "localhost".to_string(),
            timeout: Duration::from_millis(60_000),
            ready_flag: "isLoaded".to_string(),
            render: RenderOptions::default(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
        }
    }
}

impl ClientConfig {
    /// Build a configuration from `STRATA_HOST`, `STRATA_DOMAIN`,
    /// `STRATA_TIMEOUT_MS` and `STRATA_READY_FLAG`, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("STRATA_HOST", defaults.host),
            domain: env_or("STRATA_DOMAIN", defaults.domain),
            timeout: std::env::var("STRATA_TIMEOUT_MS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
            ready_flag: env_or("STRATA_READY_FLAG", defaults.ready_flag),
            render: defaults.render,
        }
    }
}

fn env_or(key: &str, fallback: String) -> String {
    std::env::var(key).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_localhost() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "http://localhost:3000");
        assert_eq!(config.domain, "localhost");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.ready_flag, "isLoaded");
        assert!(config.render.headless);
    }
}
