use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};


/// A place name resolved to a point on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
    pub resolved_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64, resolved_name: impl Into<String>) -> Self {
        Self { latitude, longitude, resolved_name: resolved_name.into(), country: None, state: None }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// `"lat,lon"` form accepted by most weather APIs as a free-text query.
    pub fn as_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Current conditions, normalised across weather providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub provider: String,
    pub location_name: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub condition: String,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub observation_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub source: String,
    pub author: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsDigest {
    pub query: String,
    pub total_results: u64,
    pub articles: Vec<Article>,
}

/// Everything gathered for one location. Only built once every provider succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub place: Coordinates,
    pub weather: WeatherReport,
    pub news: NewsDigest,
    pub alternate_weather: WeatherReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_range_check() {
        assert!(Coordinates::new(37.98, 23.73, "Athens").is_valid());
        assert!(!Coordinates::new(91.0, 0.0, "nowhere").is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0, "nowhere").is_valid());
    }

    #[test]
    fn coordinates_serialize_camel_case() {
        let json = serde_json::to_value(Coordinates::new(1.5, 2.5, "X")).unwrap();
        assert_eq!(json["resolvedName"], "X");
        assert!(json.get("country").is_none());
    }
}
