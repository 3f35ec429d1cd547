//! HTTP clients for the third-party backends the services delegate to.
//!
//! Each backend sits behind an async trait in [`backend`] so pipeline
//! services can be exercised with test doubles. Concrete clients:
//!
//! - [`ideogram::IdeogramClient`] -- masked edit and upscale (multipart).
//! - [`gemini::GeminiClient`] -- mask-free edit and instruction rewriting.
//! - [`ollama::OllamaEmbedder`] -- text embeddings.
//! - [`openai::OpenAiCaptioner`] -- structured image captions for ingestion.
//! - [`fetch::HttpImageFetcher`] -- source image download.

pub mod backend;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gemini;
mod http;
pub mod ideogram;
pub mod ollama;
pub mod openai;

pub use error::UpstreamError;
pub use http::build_http_client;
