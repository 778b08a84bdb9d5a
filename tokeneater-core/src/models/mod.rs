//! Domain models for TokenEater.
//!
//! ## Submodules
//!
//! - [`usage`] - Buckets, snapshots, and the cached state
//! - [`credential`] - Opaque credential handle
//! - [`level`] - Thresholds, levels, and metric identifiers
//! - [`pacing`] - Weekly pacing projection
//! - [`proxy`] - SOCKS proxy settings
//! - [`stats`] - Per-model token totals

pub mod credential;
pub mod level;
pub mod pacing;
pub mod proxy;
pub mod stats;
pub mod usage;

pub use credential::Credential;
pub use level::{MetricId, MetricType, UsageLevel, UsageThresholds};
pub use pacing::{PACING_TOLERANCE, PACING_WINDOW_DAYS, PacingCalculator, PacingResult, PacingZone};
pub use proxy::ProxyConfig;
pub use stats::{ModelTokenStats, short_model_name};
pub use usage::{BucketKind, CachedState, UsageBucket, UsageSnapshot, parse_timestamp};
