//! Core data models for the media ingestion service.
//!
//! `Video` maps to the `videos` table via `sqlx::FromRow` and is returned
//! to clients as JSON. The asset types describe uploads in flight.

pub mod asset;
pub mod video;
