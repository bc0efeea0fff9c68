use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderResult;

pub mod geocoding;
pub mod http;
pub mod newsapi;
pub mod openweather;
pub mod weatherstack;

pub use geocoding::GeocodingProvider;
pub use http::UpstreamClient;
pub use newsapi::NewsApiProvider;
pub use openweather::OpenWeatherProvider;
pub use weatherstack::WeatherStackProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderId {
    Geocoding,
    Weather,
    News,
    WeatherStack,
}

impl ProviderId {
    /// Config section and statistics key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Geocoding => "geocoding",
            ProviderId::Weather => "openweather",
            ProviderId::News => "newsapi",
            ProviderId::WeatherStack => "weatherstack",
        }
    }

    /// Human-facing name used in failure messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Geocoding => "Geocoding API",
            ProviderId::Weather => "OpenWeather",
            ProviderId::News => "News API",
            ProviderId::WeatherStack => "Weatherstack",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderId::Geocoding => "https://api.openweathermap.org/geo/1.0",
            ProviderId::Weather => "https://api.openweathermap.org/data/3.0",
            ProviderId::News => "https://newsapi.org/v2",
            ProviderId::WeatherStack => "http://api.weatherstack.com",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::Geocoding, ProviderId::Weather, ProviderId::News, ProviderId::WeatherStack]
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "geocoding" => Ok(ProviderId::Geocoding),
            "openweather" => Ok(ProviderId::Weather),
            "newsapi" => Ok(ProviderId::News),
            "weatherstack" => Ok(ProviderId::WeatherStack),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: geocoding, openweather, newsapi, weatherstack."
            )),
        }
    }
}

/// One upstream data source: takes typed parameters, makes at most one network call and
/// returns a typed outcome.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    type Params: Send + Sync + ?Sized;
    type Output: Send;

    fn id(&self) -> ProviderId;

    async fn fetch(
        &self,
        params: &Self::Params,
        cancel: &CancellationToken,
    ) -> ProviderResult<Self::Output>;
}
