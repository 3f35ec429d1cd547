//! Request flows built on the core logic and the backend clients.
//!
//! - [`edit`] -- mask construction, optional rewrite, and dispatch to the
//!   masked or mask-free edit backend.
//! - [`rewrite`] -- structured instruction rewriting.
//! - [`catalog`] -- random sample and nearest-neighbour search.
//! - [`ingest`] -- captioning and embedding for catalog ingestion.

pub mod catalog;
pub mod edit;
pub mod error;
pub mod ingest;
pub mod rewrite;

pub use error::PipelineError;
