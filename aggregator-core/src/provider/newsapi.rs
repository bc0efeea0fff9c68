use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    error::{ProviderError, ProviderResult},
    model::{Article, NewsDigest},
    provider::http::{UpstreamClient, parse_json},
};

use super::{Provider, ProviderId};

/// Keyword search against NewsAPI's `everything` endpoint.
#[derive(Debug, Clone)]
pub struct NewsApiProvider {
    upstream: UpstreamClient,
}

impl NewsApiProvider {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }
}

#[derive(Debug, Deserialize)]
struct NaSource {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NaArticle {
    source: NaSource,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NaResponse {
    #[serde(default)]
    total_results: u64,
    articles: Vec<NaArticle>,
}

impl From<NaArticle> for Article {
    fn from(a: NaArticle) -> Self {
        Article {
            source: a.source.name.unwrap_or_default(),
            author: a.author,
            title: a.title.unwrap_or_default(),
            description: a.description,
            url: a.url.unwrap_or_default(),
            published_at: a
                .published_at
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

#[async_trait]
impl Provider for NewsApiProvider {
    type Params = str;
    type Output = NewsDigest;

    fn id(&self) -> ProviderId {
        ProviderId::News
    }

    async fn fetch(&self, query: &str, cancel: &CancellationToken) -> ProviderResult<NewsDigest> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ProviderError::validation("News query cannot be null or empty."));
        }

        info!(provider = %self.id(), query, "fetching news");

        let params = [("q", query.to_string()), ("apiKey", self.upstream.api_key().to_string())];

        let body = self.upstream.get_text("everything", &params, cancel).await?;
        let parsed: NaResponse = parse_json(self.id(), &body)?;

        info!(provider = %self.id(), query, total = parsed.total_results, "retrieved news");

        Ok(NewsDigest {
            query: query.to_string(),
            total_results: parsed.total_results,
            articles: parsed.articles.into_iter().map(Article::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_tolerates_missing_fields_and_bad_dates() {
        let raw: NaArticle = serde_json::from_str(
            r#"{"source":{"id":null,"name":null},"author":null,"title":"T","description":null,
                "url":"https://x.test/a","publishedAt":"yesterday"}"#,
        )
        .unwrap();

        let article = Article::from(raw);
        assert_eq!(article.title, "T");
        assert_eq!(article.source, "");
        assert!(article.published_at.is_none());
    }

    #[test]
    fn article_parses_rfc3339_timestamp() {
        let raw: NaArticle = serde_json::from_str(
            r#"{"source":{"name":"Reuters"},"title":"T","url":"u","publishedAt":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();

        let article = Article::from(raw);
        assert_eq!(article.published_at.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }
}
