use std::time::Duration;

use engine::{Model, RetryPolicy};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:5000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub gateway_url: String,
    #[serde(with = "model_id")]
    pub default_model: Model,
    pub attempt_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.into(),
            default_model: Model::default(),
            attempt_timeout_secs: policy.attempt_timeout.as_secs(),
            max_attempts: policy.max_attempts,
        }
    }
}

impl ClientConfig {
    /// Command line flags win over the stored values.
    pub fn merge_cli(mut self, cli: &Cli) -> Self {
        if let Some(url) = &cli.gateway_url {
            self.gateway_url = url.clone();
        }
        if let Some(model) = cli.model {
            self.default_model = model;
        }
        if let Some(secs) = cli.timeout_secs {
            self.attempt_timeout_secs = secs;
        }
        if let Some(n) = cli.max_attempts {
            self.max_attempts = n;
        }
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_attempt_timeout(Duration::from_secs(self.attempt_timeout_secs))
    }
}

// Model ids like "gemini2.0" aren't valid RON identifiers, so store them as strings.
mod model_id {
    use engine::Model;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(model: &Model, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(model.id())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Model, D::Error> {
        let id = String::deserialize(d)?;
        Model::parse(&id).map_err(D::Error::custom)
    }
}
