//! Host APIs used by the fetch layer.
//!
//! - [`keychain`] - Read access to the system keychain
//! - [`http`] - HTTP client with tracing and SOCKS proxy support

pub mod http;
pub mod keychain;

pub use http::{HttpClient, HttpClientBuilder};
pub use keychain::{KeychainApi, SystemKeychain};
