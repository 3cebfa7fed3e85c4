//! Database access for safereads-api
//!
//! Schema creation lives in `safereads_common::db`; the modules here are the
//! per-table repositories.

pub mod analyses;
pub mod books;
pub mod profiles;
pub mod search_history;
pub mod settings;
pub mod stats;
pub mod users;

use safereads_common::{Error, Result};
use uuid::Uuid;

/// RFC 3339 UTC timestamp, fixed width so TEXT ordering is chronological
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Parse a UUID stored as TEXT
pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| Error::Internal(format!("Corrupt UUID '{}': {}", value, e)))
}
