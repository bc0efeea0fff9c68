use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    error::{FailureKind, ProviderError, ProviderResult},
    model::Coordinates,
    provider::http::{UpstreamClient, parse_json},
};

use super::{Provider, ProviderId};

/// Resolves a free-text place name through OpenWeather's direct geocoding API.
#[derive(Debug, Clone)]
pub struct GeocodingProvider {
    upstream: UpstreamClient,
}

impl GeocodingProvider {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[derive(Debug, Deserialize)]
struct GeoCandidate {
    name: String,
    lat: f64,
    lon: f64,
    country: Option<String>,
    state: Option<String>,
}

#[async_trait]
impl Provider for GeocodingProvider {
    type Params = str;
    type Output = Coordinates;

    fn id(&self) -> ProviderId {
        ProviderId::Geocoding
    }

    async fn fetch(&self, place: &str, cancel: &CancellationToken) -> ProviderResult<Coordinates> {
        let place = place.trim();
        if place.is_empty() {
            return Err(ProviderError::validation("Place name cannot be null or empty."));
        }

        info!(provider = %self.id(), place, "resolving place name");

        let query = [
            ("q", place.to_string()),
            ("limit", "1".to_string()),
            ("appid", self.upstream.api_key().to_string()),
        ];

        let body = match self.upstream.get_text("direct", &query, cancel).await {
            Ok(body) => body,
            // An empty body from the geocoder means nothing matched.
            Err(err) if err.kind == FailureKind::EmptyBody => {
                warn!(provider = %self.id(), place, "no coordinates found");
                return Err(ProviderError::not_found(place));
            }
            Err(err) => return Err(err),
        };

        // `null` and `[]` both mean nothing matched.
        let candidates: Option<Vec<GeoCandidate>> = parse_json(self.id(), &body)?;

        // First candidate wins; the upstream already orders by relevance.
        let Some(first) = candidates.into_iter().flatten().next() else {
            warn!(provider = %self.id(), place, "no coordinates found");
            return Err(ProviderError::not_found(place));
        };

        let coordinates = Coordinates {
            latitude: first.lat,
            longitude: first.lon,
            resolved_name: first.name,
            country: first.country,
            state: first.state,
        };

        info!(
            provider = %self.id(),
            place,
            lat = coordinates.latitude,
            lon = coordinates.longitude,
            "resolved place"
        );

        Ok(coordinates)
    }
}
