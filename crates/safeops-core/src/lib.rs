//! Data model and pure transformations behind the SafeOps dashboard.
//!
//! Nothing in this crate performs I/O: payloads come in as `serde_json::Value`
//! and leave as fully-populated view records.

pub mod approvals;
pub mod locale;
pub mod mock;
pub mod model;
pub mod normalize;
pub mod view;

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, Utc};

pub use approvals::parse_approvals;
pub use locale::{DashboardLabels, Lang, ManagerLabels};
pub use model::*;
pub use normalize::{NOT_AVAILABLE, Normalizer};

#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[must_use]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
