//! Request execution
//!
//! Every call goes through [`GridClient::request`], which holds a
//! concurrency permit for the whole exchange and retries transient failures
//! according to the client's [`RetryConfig`](crate::rate_limit::RetryConfig).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::de::DeserializeOwned;

use super::DeleteRequest;
use super::ScrollRequest;
use super::ScrollResponse;
use super::UpsertRequest;
use crate::GridClient;
use crate::error::ApiError;
use crate::error::Error;
use crate::model::TableMetadata;
use crate::page::Cursor;
use crate::remote::Point;
use crate::remote::RemoteStore;
use crate::remote::ScrollPage;
use crate::remote::SourceKey;

impl GridClient {
    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url().trim_end_matches('/'), path)
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers
    }

    fn metadata_url(&self, table_id: &str) -> String {
        self.build_url(&format!(
            "/tables/{}/metadata",
            urlencoding::encode(table_id)
        ))
    }

    /// Makes an HTTP request with retry logic.
    ///
    /// Non-success statuses become [`ApiError::Http`]; a 429 that survives
    /// all retries becomes [`Error::RateLimit`].
    pub(crate) async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<reqwest::Response, Error> {
        let _permit = self.inner.concurrency_limiter.acquire().await?;

        let retry_config = &self.inner.retry_config;
        let mut attempts = 0;

        loop {
            let response = match self.send_request_inner(method.clone(), url, body.clone()).await {
                Ok(response) => response,
                Err(Error::Api(error)) if retry_config.should_retry(&error, attempts) => {
                    let wait = retry_config.delay_for(attempts);
                    log::debug!("Retrying {method} {url} in {wait:?}: {error}");
                    tokio::time::sleep(wait).await;
                    attempts += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let retry_after = parse_retry_after(&response);
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body
            };
            let error = ApiError::http(status.as_u16(), message);

            if retry_config.should_retry(&error, attempts) {
                let wait = retry_after
                    .filter(|_| status == StatusCode::TOO_MANY_REQUESTS)
                    .unwrap_or_else(|| retry_config.delay_for(attempts));
                log::debug!("Retrying {method} {url} in {wait:?}: HTTP {status}");
                tokio::time::sleep(wait).await;
                attempts += 1;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::RateLimit { retry_after });
            }
            return Err(error.into());
        }
    }

    /// Inner request method without retry logic.
    async fn send_request_inner(
        &self,
        method: Method,
        url: &str,
        body: Option<String>,
    ) -> Result<reqwest::Response, Error> {
        let token = self
            .inner
            .token_provider
            .get_token(self.base_url())
            .await?;

        let mut request = self
            .inner
            .http_client
            .request(method, url)
            .headers(self.default_headers())
            .bearer_auth(&token.access_token);

        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        if let Some(body) = body {
            request = request.body(body);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Api(ApiError::Timeout(self.inner.timeout.unwrap_or_default()))
            } else {
                Error::Api(ApiError::from(e))
            }
        })
    }
}

/// Reads a JSON body, keeping the raw text on parse failure.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
    let body = response.text().await.map_err(ApiError::from)?;
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(e) => Err(ApiError::parse_with_body(e.to_string(), body).into()),
    }
}

/// Parses the Retry-After header value (seconds).
fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("Retry-After")?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn encode<T: serde::Serialize>(body: &T) -> Result<String, Error> {
    serde_json::to_string(body).map_err(|e| ApiError::parse(e.to_string()).into())
}

#[async_trait]
impl RemoteStore for GridClient {
    async fn scroll(
        &self,
        source: &SourceKey,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<ScrollPage, Error> {
        let body = encode(&ScrollRequest {
            source_name: &source.source_name,
            context_id: &source.context_id,
            cursor: cursor.map(Cursor::as_str),
            limit,
        })?;

        let response = self
            .request(Method::POST, &self.build_url("/scroll"), Some(body))
            .await?;
        let scroll: ScrollResponse = read_json(response).await?;
        Ok(scroll.into_scroll_page())
    }

    async fn upsert(&self, table_id: &str, points: Vec<Point>) -> Result<(), Error> {
        let body = encode(&UpsertRequest {
            table_id,
            points: &points,
        })?;
        self.request(Method::POST, &self.build_url("/upsert"), Some(body))
            .await?;
        Ok(())
    }

    async fn delete(&self, table_id: &str, ids: Vec<String>) -> Result<(), Error> {
        let body = encode(&DeleteRequest {
            table_id,
            ids: &ids,
        })?;
        self.request(Method::POST, &self.build_url("/delete"), Some(body))
            .await?;
        Ok(())
    }

    async fn metadata(&self, table_id: &str) -> Result<Option<TableMetadata>, Error> {
        match self
            .request(Method::GET, &self.metadata_url(table_id), None)
            .await
        {
            Ok(response) => Ok(Some(read_json(response).await?)),
            Err(Error::Api(e)) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn put_metadata(&self, table_id: &str, metadata: &TableMetadata) -> Result<(), Error> {
        let body = encode(metadata)?;
        self.request(Method::PUT, &self.metadata_url(table_id), Some(body))
            .await?;
        Ok(())
    }
}
