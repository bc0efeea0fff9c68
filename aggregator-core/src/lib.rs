//! Core library for the location aggregator.
//!
//! This crate defines:
//! - Configuration for upstream providers and latency thresholds
//! - The provider abstraction and its HTTP-backed implementations
//! - Per-provider response-time statistics
//! - The aggregation engine that resolves a place and fans out to every provider
//!
//! It is used by `aggregator-server`, but can also be embedded in other binaries.

pub mod aggregation;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod stats;

pub use aggregation::Aggregator;
pub use config::{Config, HttpConfig, ProviderConfig, ServerConfig};
pub use error::{AggregationError, ConfigError, FailureKind, ProviderError, ProviderResult};
pub use model::{AggregatedResult, Article, Coordinates, NewsDigest, WeatherReport};
pub use provider::{Provider, ProviderId};
pub use stats::{PerformanceBucket, StatSample, StatSummary, StatsCollector, Thresholds};
