//! Backend client configuration loaded from environment variables.
//!
//! | Env Var                 | Default                                             |
//! |-------------------------|-----------------------------------------------------|
//! | `IDEOGRAM_API_KEY`      | required                                            |
//! | `IDEOGRAM_BASE_URL`     | `https://api.ideogram.ai`                           |
//! | `IDEOGRAM_MODEL`        | `V_2_TURBO`                                         |
//! | `GEMINI_API_KEY`        | required                                            |
//! | `GEMINI_BASE_URL`       | `https://generativelanguage.googleapis.com/v1beta`  |
//! | `GEMINI_IMAGE_MODEL`    | `gemini-2.0-flash-exp`                              |
//! | `GEMINI_MODEL`          | `gemini-1.5-flash`                                  |
//! | `OLLAMA_HOST`           | `http://localhost:11434`                            |
//! | `OLLAMA_EMBED_MODEL`    | `nomic-embed-text`                                  |
//! | `OPENAI_BASE_URL`       | `https://api.openai.com/v1`                         |
//! | `OPENAI_API_KEY`        | required                                            |
//! | `OPENAI_MODEL`          | `gpt-4o-mini`                                       |
//! | `UPSTREAM_TIMEOUT_SECS` | `120`                                               |

use std::fmt;
use std::time::Duration;

use retouch_core::config::{env_or, parse_env, required_env, ConfigError};

/// Masked-edit and upscale backend.
#[derive(Clone)]
pub struct IdeogramConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub magic_prompt_option: String,
    pub style_type: String,
}

impl IdeogramConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: "V_2_TURBO".into(),
            magic_prompt_option: "ON".into(),
            style_type: "AUTO".into(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            model: env_or("IDEOGRAM_MODEL", "V_2_TURBO"),
            ..Self::new(
                required_env("IDEOGRAM_API_KEY")?,
                env_or("IDEOGRAM_BASE_URL", "https://api.ideogram.ai"),
            )
        })
    }
}

impl fmt::Debug for IdeogramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdeogramConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Multimodal generation backend.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model used for mask-free image edits (must support image output).
    pub image_model: String,
    /// Model used for instruction rewriting (structured text output).
    pub text_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            image_model: "gemini-2.0-flash-exp".into(),
            text_model: "gemini-1.5-flash".into(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            image_model: env_or("GEMINI_IMAGE_MODEL", "gemini-2.0-flash-exp"),
            text_model: env_or("GEMINI_MODEL", "gemini-1.5-flash"),
            ..Self::new(
                required_env("GEMINI_API_KEY")?,
                env_or(
                    "GEMINI_BASE_URL",
                    "https://generativelanguage.googleapis.com/v1beta",
                ),
            )
        })
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url)
            .field("image_model", &self.image_model)
            .field("text_model", &self.text_model)
            .finish_non_exhaustive()
    }
}

/// Embedding host.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
}

impl OllamaConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            model: "nomic-embed-text".into(),
        }
    }

    pub fn from_env() -> Self {
        Self {
            model: env_or("OLLAMA_EMBED_MODEL", "nomic-embed-text"),
            ..Self::new(env_or("OLLAMA_HOST", "http://localhost:11434"))
        }
    }
}

/// OpenAI-compatible chat-completions endpoint used for captioning.
#[derive(Clone)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            api_key: required_env("OPENAI_API_KEY")?,
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
        })
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Per-request timeout applied to every upstream call.
pub fn upstream_timeout_from_env() -> Result<Duration, ConfigError> {
    parse_env("UPSTREAM_TIMEOUT_SECS", 120u64).map(Duration::from_secs)
}
