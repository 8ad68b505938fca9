//! Provides types and functions shared by the deployer and tooling around the load generator.
#![deny(missing_docs)]
pub mod config;
#[cfg(feature = "telemetry")]
pub mod telemetry;
