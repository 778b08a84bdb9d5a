// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `TokenEater` Fetch
//!
//! Credential sources and the remote usage client.
//!
//! ## Host APIs
//!
//! - [`host::keychain`] - Read-only system keychain access, with silent reads
//! - [`host::http`] - HTTP client with tracing and SOCKS proxy support
//!
//! ## Services
//!
//! - [`CredentialSource`] - Interactive and silent reads of the bearer token
//! - [`RemoteUsageClient`] - Fetches a [`UsageSnapshot`](tokeneater_core::UsageSnapshot)
//! - [`ModelStatsReader`] - Token totals per model from local CLI state
//!
//! Each service trait has a production implementation and an in-memory one
//! in [`memory`].

pub mod client;
pub mod credential;
pub mod error;
pub mod host;
pub mod memory;
pub mod stats;

// Errors
pub use error::{FetchError, HttpError, KeychainError};

// Host APIs
pub use host::{HttpClient, HttpClientBuilder, KeychainApi, SystemKeychain};

// Services
pub use client::{AnthropicUsageClient, ConnectionTestResult, RemoteUsageClient};
pub use credential::{ClaudeCredentialSource, CredentialSource};
pub use stats::ModelStatsReader;

// In-memory implementations
pub use memory::{MemoryCredentialSource, MemoryKeychain, ScriptedResponse, ScriptedUsageClient};
