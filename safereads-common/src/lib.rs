//! # SafeReads Common Library
//!
//! Shared code for the SafeReads services including:
//! - Domain models (books, analyses, sensitivity profiles, users)
//! - Sensitivity profile hashing (analysis cache keys)
//! - Configuration loading and root folder resolution
//! - Database schema initialization
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod profile_hash;

pub use error::{Error, Result};
pub use profile_hash::compute_profile_hash;
