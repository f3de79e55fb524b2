//! Ingestion pipeline and the pieces it is assembled from.

pub mod buffer;
pub mod classifier;
pub mod ingest_service;
pub mod key_generator;
pub mod probe;
