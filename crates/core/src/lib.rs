//! Domain types and pure logic for the retouch services.
//!
//! Everything here is free of network and database concerns so it can be
//! shared by the API, the pipeline services and the ingestion tooling.

pub mod catalog;
pub mod config;
pub mod error;
pub mod mask;
pub mod prompt;
pub mod retry;
