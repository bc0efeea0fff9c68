//! HTTP surface and command-line front end for the location aggregator.
//!
//! - `api`: axum router exposing `/aggregate`, `/stats` and `/health`
//! - `cli`: clap commands for serving, one-shot aggregation and interactive configuration
//! - `telemetry`: tracing subscriber setup

pub mod api;
pub mod cli;
pub mod telemetry;
