use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::{ProviderError, ProviderResult},
    model::{Coordinates, WeatherReport},
    provider::http::{UpstreamClient, parse_json},
};

use super::{Provider, ProviderId};

/// Second opinion on current conditions from Weatherstack.
#[derive(Debug, Clone)]
pub struct WeatherStackProvider {
    upstream: UpstreamClient,
}

impl WeatherStackProvider {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[derive(Debug, Deserialize)]
struct WsError {
    code: i64,
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsLocation {
    name: String,
    country: Option<String>,
    localtime_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WsCurrent {
    temperature: f64,
    feelslike: f64,
    humidity: u8,
    /// km/h with `units=m`.
    wind_speed: f64,
    #[serde(default)]
    weather_descriptions: Vec<String>,
}

/// Weatherstack answers 200 for failures too, with `success: false` and an `error` object.
#[derive(Debug, Deserialize)]
struct WsResponse {
    error: Option<WsError>,
    location: Option<WsLocation>,
    current: Option<WsCurrent>,
}

#[async_trait]
impl Provider for WeatherStackProvider {
    type Params = Coordinates;
    type Output = WeatherReport;

    fn id(&self) -> ProviderId {
        ProviderId::WeatherStack
    }

    async fn fetch(
        &self,
        place: &Coordinates,
        cancel: &CancellationToken,
    ) -> ProviderResult<WeatherReport> {
        if !place.is_valid() {
            return Err(ProviderError::validation(format!(
                "Coordinates out of range: lat={}, lon={}",
                place.latitude, place.longitude
            )));
        }

        info!(provider = %self.id(), location = %place.resolved_name, "fetching alternate weather");

        let query = [
            ("query", place.as_query()),
            ("units", "m".to_string()),
            ("access_key", self.upstream.api_key().to_string()),
        ];

        let body = self.upstream.get_text("current", &query, cancel).await?;
        let parsed: WsResponse = parse_json(self.id(), &body)?;

        if let Some(error) = parsed.error {
            warn!(provider = %self.id(), code = error.code, "upstream reported an error payload");
            let detail = error.info.unwrap_or_else(|| "unknown error".to_string());
            return Err(ProviderError::upstream(self.id(), error.code.to_string(), &detail));
        }

        let (Some(location), Some(current)) = (parsed.location, parsed.current) else {
            warn!(provider = %self.id(), "response missing location or current block");
            return Err(ProviderError::parse(self.id()));
        };

        let location_name = match location.country {
            Some(country) if !country.is_empty() => format!("{}, {}", location.name, country),
            _ => location.name,
        };

        let observation_time = location
            .localtime_epoch
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        let condition = current
            .weather_descriptions
            .into_iter()
            .next()
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(WeatherReport {
            provider: self.id().as_str().to_string(),
            location_name,
            temperature_c: current.temperature,
            feels_like_c: current.feelslike,
            condition,
            humidity_pct: current.humidity,
            wind_speed_mps: current.wind_speed / 3.6,
            observation_time,
        })
    }
}
