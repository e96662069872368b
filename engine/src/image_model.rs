use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{FailureKind, GenerationError};

pub const MAX_PROMPT_CHARS: usize = 200;

#[derive(
    Debug,
    Clone,
    Copy,
    Display,
    EnumString,
    clap::ValueEnum,
    Serialize,
    Deserialize,
    Hash,
    PartialEq,
    Eq,
    EnumIter,
    Default,
)]
pub enum Model {
    #[default]
    #[strum(serialize = "img3")]
    #[serde(rename = "img3")]
    #[value(name = "img3")]
    Img3,

    #[strum(serialize = "img4")]
    #[serde(rename = "img4")]
    #[value(name = "img4")]
    Img4,

    #[strum(serialize = "uncen")]
    #[serde(rename = "uncen")]
    #[value(name = "uncen")]
    Uncen,

    #[strum(serialize = "qwen")]
    #[serde(rename = "qwen")]
    #[value(name = "qwen")]
    Qwen,

    #[strum(serialize = "gemini2.0")]
    #[serde(rename = "gemini2.0")]
    #[value(name = "gemini2.0")]
    Gemini2,
}

impl Model {
    /// The identifier the upstream API expects.
    pub fn id(&self) -> &'static str {
        match self {
            Model::Img3 => "img3",
            Model::Img4 => "img4",
            Model::Uncen => "uncen",
            Model::Qwen => "qwen",
            Model::Gemini2 => "gemini2.0",
        }
    }

    pub fn parse(id: &str) -> Result<Self, GenerationError> {
        id.trim()
            .parse()
            .map_err(|_| GenerationError::validation(format!("Unknown model: {id:?}")))
    }
}

/// A validated `{prompt, model}` pair. Only constructible through [`GenerationRequest::new`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    model: Model,
}

impl GenerationRequest {
    pub fn new(prompt: &str, model: Model) -> Result<Self, GenerationError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(GenerationError::validation("Please enter a prompt."));
        }

        let len = prompt.chars().count();
        if len > MAX_PROMPT_CHARS {
            return Err(GenerationError::validation(format!(
                "Prompt is {len} characters long, the limit is {MAX_PROMPT_CHARS}."
            )));
        }

        Ok(Self {
            prompt: prompt.to_string(),
            model,
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn model(&self) -> Model {
        self.model
    }
}

/// The single terminal value a logical generate operation produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success { url: String },
    Failure { kind: FailureKind, message: String },
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Success { url } => Some(url),
            Self::Failure { .. } => None,
        }
    }
}

impl From<GenerationError> for GenerationResult {
    fn from(err: GenerationError) -> Self {
        Self::Failure {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
