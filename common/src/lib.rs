//! Shared types and log parsing for the skywatch telemetry server.

pub mod logparse;
pub mod state;
