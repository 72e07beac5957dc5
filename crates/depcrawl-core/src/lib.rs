//! # depcrawl core
//!
//! IO-free logic shared by the depcrawl engine: the data model, manifest
//! dependency extraction, dependency-graph flattening, and the storage
//! traits the crawl driver persists through.
//!
//! This crate contains no tokio, HTTP, or filesystem code.

pub mod extract;
pub mod graph;
pub mod models;
pub mod store;
