use reqwest::StatusCode;
use thiserror::Error;

use crate::provider::ProviderId;

/// Machine-readable token for a 2xx response with nothing in it.
pub const EMPTY_RESPONSE: &str = "EMPTY_RESPONSE";
/// Machine-readable token for a body that did not match the expected shape.
pub const PARSE_ERROR: &str = "PARSE_ERROR";

/// What went wrong during one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Input rejected before any network activity.
    Validation,
    /// The resolver found no candidate for the place name.
    NotFound,
    /// Connect, DNS, timeout or body-read failure.
    Transport,
    /// Non-2xx status, or a provider error payload on a 2xx.
    UpstreamStatus,
    EmptyBody,
    Parse,
    Cancelled,
}

/// Failure half of a provider outcome.
///
/// `code` is the short token surfaced to callers (`EMPTY_RESPONSE`, `PARSE_ERROR`, a status
/// code such as `"503"`); it is absent for validation, not-found and transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: FailureKind,
    pub message: String,
    pub code: Option<String>,
}

impl ProviderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Validation, message: message.into(), code: None }
    }

    pub fn not_found(place: &str) -> Self {
        Self {
            kind: FailureKind::NotFound,
            message: format!("Location '{place}' not found."),
            code: None,
        }
    }

    /// Builds a transport failure from a reqwest error. The URL is stripped because it
    /// carries the API key in its query string.
    pub fn transport(provider: ProviderId, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "could not connect to upstream".to_string()
        } else {
            err.without_url().to_string()
        };

        Self {
            kind: FailureKind::Transport,
            message: format!("{} request failed: {reason}", provider.display_name()),
            code: None,
        }
    }

    pub fn status(provider: ProviderId, status: StatusCode) -> Self {
        Self {
            kind: FailureKind::UpstreamStatus,
            message: format!("{} returned error status: {status}", provider.display_name()),
            code: Some(status.as_u16().to_string()),
        }
    }

    /// A provider that answers 2xx but reports an error in its body.
    pub fn upstream(provider: ProviderId, code: impl Into<String>, detail: &str) -> Self {
        Self {
            kind: FailureKind::UpstreamStatus,
            message: format!("{} reported an error: {detail}", provider.display_name()),
            code: Some(code.into()),
        }
    }

    pub fn empty(provider: ProviderId) -> Self {
        Self {
            kind: FailureKind::EmptyBody,
            message: format!("{} returned empty response.", provider.display_name()),
            code: Some(EMPTY_RESPONSE.to_string()),
        }
    }

    pub fn parse(provider: ProviderId) -> Self {
        Self {
            kind: FailureKind::Parse,
            message: format!("Failed to parse {} data.", provider.display_name()),
            code: Some(PARSE_ERROR.to_string()),
        }
    }

    pub fn cancelled(provider: ProviderId) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: format!("{} request was cancelled.", provider.display_name()),
            code: None,
        }
    }
}

/// Outcome of a single provider call.
pub type ProviderResult<T> = Result<T, ProviderError>;

pub const INVALID_LOCATION: &str = "INVALID_LOCATION";
pub const LOCATION_NOT_FOUND: &str = "LOCATION_NOT_FOUND";
pub const LOCATION_LOOKUP_FAILED: &str = "LOCATION_LOOKUP_FAILED";
pub const API_UNAVAILABLE: &str = "API_UNAVAILABLE";
pub const WEATHER_QUERY_FAILED: &str = "WEATHER_QUERY_FAILED";
pub const NEWS_QUERY_FAILED: &str = "NEWS_QUERY_FAILED";
pub const ALTERNATE_WEATHER_QUERY_FAILED: &str = "ALTERNATE_WEATHER_QUERY_FAILED";

/// Terminal failure of one aggregation request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct AggregationError {
    pub message: String,
    pub code: String,
}

impl AggregationError {
    pub fn new(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self { message: message.into(), code: code.into() }
    }

    pub fn invalid_location() -> Self {
        Self::new("Location parameter is required.", INVALID_LOCATION)
    }

    /// Lifts a provider failure, keeping its code when it has one.
    pub fn from_provider(err: ProviderError, default_code: &str) -> Self {
        let code = err.code.unwrap_or_else(|| default_code.to_string());
        Self { message: err.message, code }
    }
}

/// Problems found while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "No configuration for provider '{0}'.\n\
         Hint: run `aggregator configure {0}` first."
    )]
    MissingProvider(ProviderId),

    #[error("Provider '{provider}' has an empty {field}.")]
    EmptyField { provider: ProviderId, field: &'static str },

    #[error(
        "Provider '{provider}' fast threshold ({fast} ms) exceeds its average threshold ({average} ms)."
    )]
    ThresholdOrder { provider: ProviderId, fast: u64, average: u64 },

    #[error("HTTP timeout must be greater than zero.")]
    ZeroTimeout,

    #[error("Failed to build HTTP client for provider '{provider}'")]
    HttpClient {
        provider: ProviderId,
        #[source]
        source: reqwest::Error,
    },
}
