//! Resolve a place, fan out to the data providers, and merge the results.
//!
//! Resolution always runs first because the weather providers need coordinates. The
//! remaining providers run concurrently and are all awaited before any result is looked at.
//! Results are then checked in a fixed order (weather, news, alternate weather) and the
//! first failure ends the request, regardless of which call finished first.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::Config,
    error::{
        ALTERNATE_WEATHER_QUERY_FAILED, AggregationError, ConfigError, FailureKind,
        LOCATION_LOOKUP_FAILED, LOCATION_NOT_FOUND, NEWS_QUERY_FAILED, ProviderError,
        WEATHER_QUERY_FAILED,
    },
    model::{AggregatedResult, Coordinates, NewsDigest, WeatherReport},
    provider::{
        GeocodingProvider, NewsApiProvider, OpenWeatherProvider, Provider, ProviderId,
        UpstreamClient, WeatherStackProvider,
    },
    stats::StatsCollector,
};

pub type PlaceResolver = dyn Provider<Params = str, Output = Coordinates>;
pub type WeatherSource = dyn Provider<Params = Coordinates, Output = WeatherReport>;
pub type NewsSource = dyn Provider<Params = str, Output = NewsDigest>;

#[derive(Debug, Clone)]
pub struct Aggregator {
    resolver: Arc<PlaceResolver>,
    weather: Arc<WeatherSource>,
    news: Arc<NewsSource>,
    alternate_weather: Arc<WeatherSource>,
}

impl Aggregator {
    pub fn new(
        resolver: Arc<PlaceResolver>,
        weather: Arc<WeatherSource>,
        news: Arc<NewsSource>,
        alternate_weather: Arc<WeatherSource>,
    ) -> Self {
        Self { resolver, weather, news, alternate_weather }
    }

    /// Wire up the HTTP-backed providers. Every client records into `stats`.
    pub fn from_config(config: &Config, stats: Arc<StatsCollector>) -> Result<Self, ConfigError> {
        let client = |id: ProviderId| -> Result<UpstreamClient, ConfigError> {
            UpstreamClient::new(id, config.require_provider(id)?, &config.http, Arc::clone(&stats))
        };

        Ok(Self::new(
            Arc::new(GeocodingProvider::new(client(ProviderId::Geocoding)?)),
            Arc::new(OpenWeatherProvider::new(client(ProviderId::Weather)?)),
            Arc::new(NewsApiProvider::new(client(ProviderId::News)?)),
            Arc::new(WeatherStackProvider::new(client(ProviderId::WeatherStack)?)),
        ))
    }

    /// Run one aggregation. `news_query` falls back to the resolved place name when absent
    /// or blank.
    ///
    /// Cancelling `cancel`, or dropping the returned future, aborts every provider call
    /// still in flight for this request.
    pub async fn aggregate(
        &self,
        location: &str,
        news_query: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<AggregatedResult, AggregationError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(AggregationError::invalid_location());
        }

        info!(location, "starting aggregation");

        let cancel = cancel.child_token();
        let _abort_on_drop = cancel.clone().drop_guard();

        let place = self.resolver.fetch(location, &cancel).await.map_err(|err| {
            warn!(location, error = %err, "failed to resolve location");
            resolution_failure(err)
        })?;

        let news_query = news_query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(place.resolved_name.as_str());

        let (weather, news, alternate_weather) = tokio::join!(
            self.weather.fetch(&place, &cancel),
            self.news.fetch(news_query, &cancel),
            self.alternate_weather.fetch(&place, &cancel),
        );

        let weather = weather
            .map_err(|err| provider_failure(ProviderId::Weather, err, WEATHER_QUERY_FAILED))?;
        let news = news.map_err(|err| provider_failure(ProviderId::News, err, NEWS_QUERY_FAILED))?;
        let alternate_weather = alternate_weather.map_err(|err| {
            provider_failure(ProviderId::WeatherStack, err, ALTERNATE_WEATHER_QUERY_FAILED)
        })?;

        info!(location, resolved = %place.resolved_name, "aggregation completed");

        Ok(AggregatedResult { place, weather, news, alternate_weather })
    }
}

fn resolution_failure(err: ProviderError) -> AggregationError {
    if err.kind == FailureKind::NotFound {
        AggregationError::new(err.message, LOCATION_NOT_FOUND)
    } else {
        AggregationError::from_provider(err, LOCATION_LOOKUP_FAILED)
    }
}

fn provider_failure(id: ProviderId, err: ProviderError, default_code: &str) -> AggregationError {
    warn!(provider = %id, error = %err, code = ?err.code, "aggregation aborted by provider failure");
    AggregationError::from_provider(err, default_code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EMPTY_RESPONSE, INVALID_LOCATION, ProviderResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::{
        fmt,
        marker::PhantomData,
        sync::atomic::{AtomicUsize, Ordering},
        time::{Duration, Instant},
    };

    trait Describe {
        fn describe(&self) -> String;
    }

    impl Describe for str {
        fn describe(&self) -> String {
            self.to_string()
        }
    }

    impl Describe for Coordinates {
        fn describe(&self) -> String {
            self.resolved_name.clone()
        }
    }

    struct Fake<P: ?Sized, T> {
        id: ProviderId,
        outcome: ProviderResult<T>,
        delay: Duration,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        _params: PhantomData<fn(&P)>,
    }

    impl<P: ?Sized, T> fmt::Debug for Fake<P, T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("Fake").field("id", &self.id).finish()
        }
    }

    impl<P: ?Sized, T> Fake<P, T> {
        fn new(id: ProviderId, outcome: ProviderResult<T>) -> Arc<Self> {
            Self::delayed(id, outcome, Duration::ZERO)
        }

        fn delayed(id: ProviderId, outcome: ProviderResult<T>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id,
                outcome,
                delay,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
                _params: PhantomData,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<P, T> Provider for Fake<P, T>
    where
        P: Describe + Send + Sync + ?Sized,
        T: Clone + Send + Sync + 'static,
    {
        type Params = P;
        type Output = T;

        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch(&self, params: &P, cancel: &CancellationToken) -> ProviderResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(params.describe());

            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::cancelled(self.id)),
                _ = tokio::time::sleep(self.delay) => {}
            }

            self.outcome.clone()
        }
    }

    fn athens() -> Coordinates {
        Coordinates::new(37.98, 23.73, "Athens")
    }

    fn report(provider: &str) -> WeatherReport {
        WeatherReport {
            provider: provider.to_string(),
            location_name: "Athens".into(),
            temperature_c: 24.0,
            feels_like_c: 25.0,
            condition: "clear sky".into(),
            humidity_pct: 40,
            wind_speed_mps: 3.0,
            observation_time: Utc::now(),
        }
    }

    fn digest() -> NewsDigest {
        NewsDigest { query: "Athens".into(), total_results: 0, articles: Vec::new() }
    }

    struct Harness {
        resolver: Arc<Fake<str, Coordinates>>,
        weather: Arc<Fake<Coordinates, WeatherReport>>,
        news: Arc<Fake<str, NewsDigest>>,
        alternate: Arc<Fake<Coordinates, WeatherReport>>,
    }

    impl Harness {
        fn happy() -> Self {
            Self {
                resolver: Fake::new(ProviderId::Geocoding, Ok(athens())),
                weather: Fake::new(ProviderId::Weather, Ok(report("openweather"))),
                news: Fake::new(ProviderId::News, Ok(digest())),
                alternate: Fake::new(ProviderId::WeatherStack, Ok(report("weatherstack"))),
            }
        }

        fn aggregator(&self) -> Aggregator {
            Aggregator::new(
                self.resolver.clone(),
                self.weather.clone(),
                self.news.clone(),
                self.alternate.clone(),
            )
        }

        fn fan_out_calls(&self) -> usize {
            self.weather.calls() + self.news.calls() + self.alternate.calls()
        }
    }

    #[tokio::test]
    async fn blank_location_makes_no_calls() {
        let h = Harness::happy();

        for input in ["", "   ", "\t\n"] {
            let err = h.aggregator().aggregate(input, None, &CancellationToken::new()).await.unwrap_err();
            assert_eq!(err.code, INVALID_LOCATION);
        }

        assert_eq!(h.resolver.calls(), 0);
        assert_eq!(h.fan_out_calls(), 0);
    }

    #[tokio::test]
    async fn success_merges_every_payload_and_calls_each_provider_once() {
        let h = Harness::happy();

        let result = h
            .aggregator()
            .aggregate("Athens", None, &CancellationToken::new())
            .await
            .expect("aggregation succeeds");

        assert_eq!(result.place, athens());
        assert_eq!(result.weather.provider, "openweather");
        assert_eq!(result.alternate_weather.provider, "weatherstack");
        assert_eq!(result.news, digest());

        assert_eq!(h.resolver.calls(), 1);
        assert_eq!(h.weather.calls(), 1);
        assert_eq!(h.news.calls(), 1);
        assert_eq!(h.alternate.calls(), 1);
    }

    #[tokio::test]
    async fn news_query_defaults_to_resolved_name() {
        let mut h = Harness::happy();
        h.resolver = Fake::new(ProviderId::Geocoding, Ok(Coordinates::new(37.98, 23.73, "Athína")));

        h.aggregator().aggregate("athens", Some("   "), &CancellationToken::new()).await.unwrap();

        assert_eq!(*h.news.seen.lock(), vec!["Athína".to_string()]);
        assert_eq!(*h.resolver.seen.lock(), vec!["athens".to_string()]);
    }

    #[tokio::test]
    async fn explicit_news_query_is_used() {
        let h = Harness::happy();

        h.aggregator()
            .aggregate("Athens", Some(" olympics "), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*h.news.seen.lock(), vec!["olympics".to_string()]);
    }

    #[tokio::test]
    async fn not_found_stops_before_fan_out() {
        let mut h = Harness::happy();
        h.resolver = Fake::new(ProviderId::Geocoding, Err(ProviderError::not_found("Atlantis")));

        let err = h
            .aggregator()
            .aggregate("Atlantis", None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code, LOCATION_NOT_FOUND);
        assert_eq!(err.message, "Location 'Atlantis' not found.");
        assert_eq!(h.fan_out_calls(), 0);
    }

    #[tokio::test]
    async fn resolver_failure_forwards_code_or_defaults() {
        let mut h = Harness::happy();
        h.resolver = Fake::new(
            ProviderId::Geocoding,
            Err(ProviderError::status(ProviderId::Geocoding, reqwest::StatusCode::UNAUTHORIZED)),
        );
        let err = h.aggregator().aggregate("Athens", None, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, "401");

        h.resolver = Fake::new(ProviderId::Geocoding, Err(ProviderError::cancelled(ProviderId::Geocoding)));
        let err = h.aggregator().aggregate("Athens", None, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, LOCATION_LOOKUP_FAILED);
        assert_eq!(h.fan_out_calls(), 0);
    }

    #[tokio::test]
    async fn weather_failure_wins_over_news_failure() {
        let mut h = Harness::happy();
        // Weather finishes last but is still the one reported.
        h.weather = Fake::delayed(
            ProviderId::Weather,
            Err(ProviderError::validation("weather broke")),
            Duration::from_millis(50),
        );
        h.news = Fake::new(ProviderId::News, Err(ProviderError::empty(ProviderId::News)));

        let err = h.aggregator().aggregate("Athens", None, &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.code, WEATHER_QUERY_FAILED);
        assert_eq!(err.message, "weather broke");
        assert_eq!(h.fan_out_calls(), 3);
    }

    #[tokio::test]
    async fn news_empty_body_is_forwarded() {
        let mut h = Harness::happy();
        h.news = Fake::new(ProviderId::News, Err(ProviderError::empty(ProviderId::News)));

        let err = h.aggregator().aggregate("Athens", None, &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.code, EMPTY_RESPONSE);
        assert_eq!(err.message, "News API returned empty response.");
    }

    #[tokio::test]
    async fn alternate_weather_failure_uses_default_code() {
        let mut h = Harness::happy();
        h.alternate = Fake::new(
            ProviderId::WeatherStack,
            Err(ProviderError::validation("no coordinates")),
        );

        let err = h.aggregator().aggregate("Athens", None, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.code, ALTERNATE_WEATHER_QUERY_FAILED);
    }

    #[tokio::test]
    async fn fan_out_runs_concurrently() {
        let mut h = Harness::happy();
        let delay = Duration::from_millis(300);
        h.weather = Fake::delayed(ProviderId::Weather, Ok(report("openweather")), delay);
        h.news = Fake::delayed(ProviderId::News, Ok(digest()), delay);
        h.alternate = Fake::delayed(ProviderId::WeatherStack, Ok(report("weatherstack")), delay);

        let started = Instant::now();
        h.aggregator().aggregate("Athens", None, &CancellationToken::new()).await.unwrap();

        assert!(started.elapsed() < Duration::from_millis(800), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_calls() {
        let mut h = Harness::happy();
        let long = Duration::from_secs(30);
        h.weather = Fake::delayed(ProviderId::Weather, Ok(report("openweather")), long);
        h.news = Fake::delayed(ProviderId::News, Ok(digest()), long);
        h.alternate = Fake::delayed(ProviderId::WeatherStack, Ok(report("weatherstack")), long);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = h.aggregator().aggregate("Athens", None, &cancel).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(err.code, WEATHER_QUERY_FAILED);
        assert!(err.message.contains("cancelled"));
    }
}
