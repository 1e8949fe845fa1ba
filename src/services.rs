use crate::cache::FileCache;
use crate::circuit_breaker::{create_insights_circuit_breaker, InsightsCircuitBreaker};
use crate::config::Config;
use crate::errors::AppError;
use failsafe::futures::CircuitBreaker;
use reqwest::Client;
use serde_json::Value;
use url::Url;

/// Client for the Syntage business-insights API.
///
/// Successful responses are cached in the durable TTL store under their
/// upstream URL; upstream failures trip a circuit breaker so a degraded
/// provider fails fast instead of piling up requests.
pub struct SyntageService {
    client: Client,
    base_url: String,
    api_key: String,
    breaker: InsightsCircuitBreaker,
}

impl SyntageService {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.syntage_base_url.clone(),
            api_key: config.syntage_api_key.clone(),
            breaker: create_insights_circuit_breaker(),
        }
    }

    /// Fetches one insight document, serving from cache when the URL was
    /// requested within its TTL.
    pub async fn fetch_insight(&self, cache: &FileCache, path: &str) -> Result<Value, AppError> {
        let url = self.insight_url(path)?;

        if let Some(cached) = cache.get(url.as_str()).await {
            tracing::debug!("Cache hit for {}", path);
            return Ok(cached);
        }

        tracing::info!("Fetching insight from upstream: {}", path);
        match self.breaker.call(self.request_insight(url.as_str())).await {
            Ok(data) => {
                cache.set(url.as_str(), data.clone()).await;
                Ok(data)
            }
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Circuit open, rejecting upstream call for {}", path);
                Err(AppError::ExternalApiError(
                    "Insights provider temporarily unavailable".to_string(),
                ))
            }
        }
    }

    fn insight_url(&self, path: &str) -> Result<Url, AppError> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))
    }

    async fn request_insight(&self, url: &str) -> Result<Value, AppError> {
        let response = self
            .client
            .get(url)
            .header("X-API-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Syntage request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Syntage returned error {}: {}", status, error_text);
            // The caller sees the upstream status, as the gateway contract
            // promises.
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                detail: format!("Error from external API: {}", error_text),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Failed to parse Syntage response: {}", e)))
    }
}
