//! Skywatch telemetry server library.
//!
//! Everything the `skywatch-server` binary does is reachable from here so
//! integration tests can drive the router without binding a socket:
//!
//! - [`telemetry`]: re-derives station state and capture history from the
//!   log/artifact directories on every call
//! - [`artifacts`]: locates frames and plots on disk
//! - [`system`]: host health snapshot
//! - [`network`]: optional external meteor-network statistics
//! - [`server`]: axum routes over all of the above

pub mod artifacts;
pub mod network;
pub mod server;
pub mod system;
pub mod telemetry;
