//! Async clients for the SafeOps backend: the dashboard aggregator, the
//! mission manager, action triggers and the competition event stream.

pub mod actions;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod fetch;
pub mod manager;
pub mod sse;

pub use actions::{ApprovalForm, DEFAULT_PLAN_GOAL, Notification, NotificationLevel};
pub use config::{ClientConfig, ConfigOverrides, feature_flag, normalize_base_url};
pub use dashboard::{Dashboard, DashboardState, Endpoint};
pub use error::{ActionError, ConfigError, FetchError};
pub use fetch::Fetcher;
pub use manager::{DataSource, Manager, ManagerSnapshot, StatusCounts, decide_source};
pub use sse::{SseClosed, SseHandle, consume_sse, drive_events};
