//! Purpose: Client-side model layer over the Syncano HTTP API, used by the `syncano` CLI and tests.
//! Exports: `core` (errors), `api` (transport, connection, client), `models` (fields, registry, managers).
//! Role: Library backing the binary; callers inject a `Registry` and a `Transport`.
//! Invariants: No global state; registries and transports are explicit values.
//! Invariants: Network calls happen only inside `Transport::request`.
pub mod api;
pub mod core;
pub mod models;
