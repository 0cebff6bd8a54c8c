//! Purpose: Public API boundary: transport seam, HTTP connection, configuration and client.
//! Exports: `Client`, `ClientConfig`, `Connection`, `Transport` and request types, error types.
//! Role: What library callers and the CLI import; model internals are reached through `models`.
//! Invariants: All fallible calls return `ApiResult` with the crate-wide `Error`.

mod client;
mod config;
mod connection;
pub mod transport;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{ApiResult, Error, ErrorKind};
pub use client::Client;
pub use config::{
    ClientConfig, DEFAULT_API_ROOT, DEFAULT_TIMEOUT, ENV_API_KEY, ENV_API_ROOT, ENV_EMAIL,
    ENV_INSTANCE, ENV_PASSWORD,
};
pub use connection::Connection;
pub use transport::{Body, Method, Request, Transport, not_found_as};
