//! Build-time photo recompression for the race-series website
//!
//! Walks the per-round photo folders, caps each JPEG's long edge and
//! re-encodes it at the highest quality that fits a byte budget, replacing
//! files atomically in place.

pub mod app;
pub mod error;
pub mod image;
pub mod models;

pub use error::{Error, Result};
