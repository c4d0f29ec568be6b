//! sightline-core – storage, generation and service layer for sightline.
//!
//! The crate is transport-agnostic: `sightline-server` wraps these services in
//! an Axum router, but every operation here can be driven directly (tests do).
//!
//! Layout:
//! - [`entities`]: SQLite-backed image store and chat transcript.
//! - [`generation`]: the vision / text generation client seam.
//! - [`services`]: describe, chat routing, upload and gallery listing.
//! - [`views`]: per-view revision counters used for cache invalidation.
//! - [`realtime`]: HTTP client for the external real-time companion.

pub mod entities;
pub mod error;
pub mod generation;
pub mod realtime;
pub mod services;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;

pub use error::CoreError;
