use std::fmt;

use color_eyre::{Result, eyre::eyre};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.infip.pro/v1/images/generations";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const ENV_FILE: &str = ".env.local";

/// The upstream API key. Never printed, never serialized.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }

    /// Replaces every occurrence of the secret in `text`.
    pub fn scrub(&self, text: &str) -> String {
        if self.0.is_empty() {
            text.to_string()
        } else {
            text.replace(&self.0, "<redacted>")
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub credential: Credential,
    pub port: u16,
    pub upstream_url: String,
    pub image_size: String,
}

impl GatewayConfig {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            port: DEFAULT_PORT,
            upstream_url: DEFAULT_UPSTREAM_URL.into(),
            image_size: DEFAULT_IMAGE_SIZE.into(),
        }
    }

    /// Reads `API_KEY`, `GATEWAY_PORT` and `UPSTREAM_URL` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let key = lookup("API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(eyre!("API_KEY is not set (checked the environment and {ENV_FILE})"))?;

        let mut cfg = Self::new(Credential::new(key.trim()));

        if let Some(port) = lookup("GATEWAY_PORT") {
            cfg.port = port
                .trim()
                .parse()
                .map_err(|e| eyre!("Invalid GATEWAY_PORT {port:?}: {e}"))?;
        }

        if let Some(url) = lookup("UPSTREAM_URL") {
            cfg.upstream_url = url;
        }

        Ok(cfg)
    }
}

/// Loads `.env.local` from the working directory if present. Existing variables win.
pub fn load_env_file() {
    match dotenv::from_filename(ENV_FILE) {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => log::warn!("Couldn't read {ENV_FILE}: {e}"),
    }
}
