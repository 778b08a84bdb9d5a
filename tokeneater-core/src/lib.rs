// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TokenEater` Core
//!
//! Core types and pure computations shared by every `TokenEater` crate.
//!
//! ## Key Types
//!
//! ### Usage
//! - [`UsageSnapshot`] - One fetch worth of usage buckets
//! - [`UsageBucket`] - A utilization percentage and its reset time
//! - [`CachedState`] - The last good snapshot plus its fetch time
//!
//! ### Credentials
//! - [`Credential`] - Opaque, redacted bearer token
//!
//! ### Levels and Pacing
//! - [`UsageThresholds`] / [`UsageLevel`] - Green, orange, red classification
//! - [`MetricId`] - The metrics shown and watched for alerts
//! - [`PacingCalculator`] - Weekly consumption against a linear burn
//!
//! ### Settings Fragments
//! - [`ProxyConfig`] - SOCKS5 proxy used for outbound requests
//! - [`ModelTokenStats`] - Token totals per model

pub mod error;
pub mod models;

pub use error::CoreError;

pub use models::{
    // Usage
    BucketKind,
    CachedState,
    UsageBucket,
    UsageSnapshot,
    parse_timestamp,
    // Credentials
    Credential,
    // Levels
    MetricId,
    MetricType,
    UsageLevel,
    UsageThresholds,
    // Pacing
    PACING_TOLERANCE,
    PACING_WINDOW_DAYS,
    PacingCalculator,
    PacingResult,
    PacingZone,
    // Settings fragments
    ModelTokenStats,
    ProxyConfig,
    short_model_name,
};
