use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    error::{ProviderError, ProviderResult},
    model::{Coordinates, WeatherReport},
    provider::http::{UpstreamClient, parse_json},
};

use super::{Provider, ProviderId};

/// Current conditions from OpenWeather's One Call API, keyed by coordinates.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    upstream: UpstreamClient,
}

impl OpenWeatherProvider {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwCurrent {
    dt: i64,
    temp: f64,
    feels_like: f64,
    humidity: u8,
    wind_speed: f64,
    #[serde(default)]
    weather: Vec<OwWeather>,
}

#[derive(Debug, Deserialize)]
struct OwOneCallResponse {
    current: OwCurrent,
}

#[async_trait]
impl Provider for OpenWeatherProvider {
    type Params = Coordinates;
    type Output = WeatherReport;

    fn id(&self) -> ProviderId {
        ProviderId::Weather
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

        info!(provider = %self.id(), lat = place.latitude, lon = place.longitude, "fetching weather");

        let query = [
            ("lat", place.latitude.to_string()),
            ("lon", place.longitude.to_string()),
            ("exclude", "minutely,hourly,daily".to_string()),
            ("units", "metric".to_string()),
            ("appid", self.upstream.api_key().to_string()),
        ];

        let body = self.upstream.get_text("onecall", &query, cancel).await?;
        let parsed: OwOneCallResponse = parse_json(self.id(), &body)?;

        let observation_time = unix_to_utc(parsed.current.dt).unwrap_or_else(Utc::now);

        let condition = parsed
            .current
            .weather
            .first()
            .map(|w| w.description.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(WeatherReport {
            provider: self.id().as_str().to_string(),
            location_name: place.resolved_name.clone(),
            temperature_c: parsed.current.temp,
            feels_like_c: parsed.current.feels_like,
            condition,
            humidity_pct: parsed.current.humidity,
            wind_speed_mps: parsed.current.wind_speed,
            observation_time,
        })
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}
