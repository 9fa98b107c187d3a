use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient};
use reqwest::Client as HttpClient;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{CatalogMovie, Category, MovieDetails, TmdbPage, TmdbVideoList};
use crate::services::providers::MovieCatalog;

const DETAIL_CACHE_TTL: u64 = 604800; // 1 week in seconds

/// TMDB-backed catalog
///
/// Detail and trailer lookups are deterministic per movie id and cached in
/// Redis; listing pages are never cached so discovery stays stochastic.
/// Cache failures degrade to a direct API call.
pub struct TmdbCatalog {
    http_client: HttpClient,
    redis_client: RedisClient,
    api_key: String,
    api_url: String,
    language: String,
}

impl TmdbCatalog {
    pub fn new(
        redis_client: RedisClient,
        api_key: String,
        api_url: String,
        language: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            redis_client,
            api_key,
            api_url,
            language,
        })
    }

    /// GET a TMDB endpoint with the standard key/language parameters
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        extra: &[(&str, String)],
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_url, path);
        let mut query: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("language", self.language.clone()),
        ];
        query.extend_from_slice(extra);

        let response = self.http_client.get(&url).query(&query).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::debug!(path = %path, status = %status, "TMDB request failed");
            return Err(AppError::ExternalApi(format!(
                "TMDB returned status {} for {}",
                status, path
            )));
        }

        Ok(response.json::<T>().await?)
    }

    /// Attempts a cache read; any Redis problem reads as a miss
    async fn get_cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = match self.redis_client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(error = %e, "Redis unavailable, skipping cache read");
                return None;
            }
        };

        let cached: Option<String> = match conn.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Redis get failed");
                return None;
            }
        };

        cached.and_then(|json| serde_json::from_str(&json).ok())
    }

    /// Best-effort cache write
    async fn store_cached<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(_) => return,
        };

        match self.redis_client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                let result: Result<(), _> = conn.set_ex(key, json, DETAIL_CACHE_TTL).await;
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Redis set failed");
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Redis unavailable, skipping cache write");
            }
        }
    }
}

#[async_trait]
impl MovieCatalog for TmdbCatalog {
    async fn fetch_page(&self, category: Category, page: u32) -> AppResult<Vec<CatalogMovie>> {
        let listing: TmdbPage = self
            .get_json(
                &format!("/movie/{}", category.as_path()),
                &[("page", page.to_string())],
            )
            .await?;

        tracing::debug!(
            category = %category,
            page,
            results = listing.results.len(),
            "Fetched listing page"
        );

        Ok(listing.results)
    }

    async fn fetch_details(&self, movie_id: i64) -> AppResult<MovieDetails> {
        let cache_key = format!("tmdb:details:{}", movie_id);
        if let Some(cached) = self.get_cached::<MovieDetails>(&cache_key).await {
            tracing::debug!(movie_id, "Details cache hit");
            return Ok(cached);
        }

        let details: MovieDetails = self.get_json(&format!("/movie/{}", movie_id), &[]).await?;
        self.store_cached(&cache_key, &details).await;

        Ok(details)
    }

    async fn fetch_trailer(&self, movie_id: i64) -> AppResult<Option<String>> {
        let cache_key = format!("tmdb:trailer:{}", movie_id);
        if let Some(cached) = self.get_cached::<Option<String>>(&cache_key).await {
            return Ok(cached);
        }

        let videos: TmdbVideoList = self
            .get_json(&format!("/movie/{}/videos", movie_id), &[])
            .await?;
        let trailer = videos.trailer_url();
        self.store_cached(&cache_key, &trailer).await;

        Ok(trailer)
    }
}
