//! Best-effort crypto headline fetching.
//!
//! Failures never propagate: the client logs a warning and returns an empty
//! list, and there is no retry.

use crate::config::NewsConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(thiserror::Error, Debug)]
pub enum NewsError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API key not set (expected in ${0})")]
    MissingApiKey(String),

    #[error("Unexpected status: {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Headline {
    pub title: String,
    pub source: String,
}

pub struct NewsClient {
    config: NewsConfig,
    api_key: Option<String>,
}

impl NewsClient {
    /// Build a client, reading the API key from the configured env var.
    pub fn from_config(config: NewsConfig) -> Self {
        let api_key = config.api_key();
        NewsClient { config, api_key }
    }

    pub fn with_api_key(config: NewsConfig, api_key: impl Into<String>) -> Self {
        NewsClient {
            config,
            api_key: Some(api_key.into()),
        }
    }

    fn build_client(&self) -> Result<reqwest::Client, NewsError> {
        Ok(reqwest::Client::builder()
            .user_agent(format!("aether/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .build()?)
    }

    async fn try_fetch(&self) -> Result<Vec<Headline>, NewsError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| NewsError::MissingApiKey(self.config.api_key_env.clone()))?;

        let resp = self
            .build_client()?
            .get(&self.config.endpoint)
            .query(&[("lang", "EN")])
            .header("authorization", format!("Apikey {}", key))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(NewsError::Status(resp.status()));
        }

        let body: serde_json::Value = resp.json().await?;
        Ok(parse_articles(&body))
    }

    /// Fetch the latest headlines. Any failure yields an empty list.
    pub async fn fetch_latest(&self) -> Vec<Headline> {
        match self.try_fetch().await {
            Ok(headlines) => {
                info!(count = headlines.len(), "fetched headlines");
                headlines
            }
            Err(e) => {
                warn!(error = %e, "headline fetch failed; continuing without headlines");
                Vec::new()
            }
        }
    }
}

/// Extract headlines from a CryptoCompare-style `{"Data": [...]}` payload.
pub fn parse_articles(body: &serde_json::Value) -> Vec<Headline> {
    let Some(articles) = body["Data"].as_array() else {
        return Vec::new();
    };
    articles
        .iter()
        .map(|article| Headline {
            title: article["title"].as_str().unwrap_or("No title").to_string(),
            source: article["source_info"]["name"]
                .as_str()
                .unwrap_or("Unknown source")
                .to_string(),
        })
        .collect()
}

/// One `- title (source)` line per headline.
pub fn summarize(headlines: &[Headline]) -> String {
    headlines
        .iter()
        .map(|h| format!("- {} ({})\n", h.title, h.source))
        .collect()
}
