use reqwest::Client;
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    config::{HttpConfig, ProviderConfig},
    error::{ConfigError, ProviderError, ProviderResult},
    provider::ProviderId,
    stats::StatsCollector,
};

/// Shared request plumbing for every provider: one GET, timing, statistics and the
/// status / empty-body classification. Parsing is left to the caller.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    id: ProviderId,
    base_url: String,
    api_key: String,
    http: Client,
    stats: Arc<StatsCollector>,
}

impl UpstreamClient {
    pub fn new(
        id: ProviderId,
        provider: &ProviderConfig,
        http: &HttpConfig,
        stats: Arc<StatsCollector>,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(http.user_agent.as_str())
            .build()
            .map_err(|source| ConfigError::HttpClient { provider: id, source })?;

        Ok(Self {
            id,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone(),
            http: client,
            stats,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one GET and return the non-empty body of a 2xx response.
    ///
    /// A statistics sample is recorded once response headers arrive; attempts that never
    /// got a response (transport failure, cancellation) leave no sample.
    pub async fn get_text(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> ProviderResult<String> {
        let request = self.http.get(self.url(path)).query(query);

        debug!(provider = %self.id, path, "sending upstream request");
        let started = Instant::now();

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(provider = %self.id, "upstream request cancelled before response");
                return Err(ProviderError::cancelled(self.id));
            }
            res = request.send() => res,
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;

        let response = sent.map_err(|err| {
            let failure = ProviderError::transport(self.id, err);
            warn!(provider = %self.id, elapsed_ms, error = %failure, "upstream transport failure");
            failure
        })?;

        let status = response.status();
        self.stats.record(self.id.as_str(), elapsed_ms, status.as_u16());

        if !status.is_success() {
            warn!(
                provider = %self.id,
                status = status.as_u16(),
                elapsed_ms,
                "upstream returned error status"
            );
            return Err(ProviderError::status(self.id, status));
        }

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::cancelled(self.id)),
            res = response.text() => res.map_err(|err| ProviderError::transport(self.id, err))?,
        };

        if body.trim().is_empty() {
            warn!(provider = %self.id, "upstream returned empty body");
            return Err(ProviderError::empty(self.id));
        }

        debug!(provider = %self.id, status = status.as_u16(), elapsed_ms, "upstream responded");
        Ok(body)
    }
}

/// Decode a JSON body. The parser's own message is logged but never returned.
pub fn parse_json<T: DeserializeOwned>(id: ProviderId, body: &str) -> ProviderResult<T> {
    serde_json::from_str(body).map_err(|err| {
        warn!(provider = %id, error = %err, "failed to parse upstream body");
        ProviderError::parse(id)
    })
}
