//! GitLab API client.
//!
//! HTTP client for GitLab API v4 with private-token authentication and
//! pagination. Every request carries a bounded timeout, and TLS
//! certificates are always verified. Transient failures (5xx, 429,
//! timeouts) are retried with exponential backoff; 4xx responses fail
//! immediately.

use backon::{ExponentialBuilder, Retryable};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::GitLabConfig;
use crate::error::BackupError;
use crate::models::{Pipeline, Project, User};

/// Fixed page size for catalog listing endpoints.
pub const PAGE_SIZE: u32 = 100;

/// GitLab API client.
#[derive(Debug, Clone)]
pub struct GitLabClient {
    client: Client,
    base_url: String,
}

impl GitLabClient {
    /// Create a new client from connection settings.
    pub fn new(config: &GitLabConfig) -> Result<Self, BackupError> {
        let mut headers = header::HeaderMap::new();

        let token_value = header::HeaderValue::from_str(&config.token)
            .map_err(|_| BackupError::authentication("invalid token format"))?;
        headers.insert("PRIVATE-TOKEN", token_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackupError::internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for an API path.
    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4{}", self.base_url, path)
    }

    /// Map a response to a typed value or the matching error variant.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: Response,
        endpoint: &str,
    ) -> Result<T, BackupError> {
        let status = response.status();

        if status.is_success() {
            response.json::<T>().await.map_err(|e| {
                BackupError::internal(format!("failed to parse response: {}", e))
            })
        } else if status == StatusCode::UNAUTHORIZED {
            Err(BackupError::authentication(
                "GitLab token rejected (401); check gitlab.token",
            ))
        } else {
            let status_code = status.as_u16();
            let body = response.text().await.unwrap_or_default();
            // GitLab returns errors as {"message": "..."} or {"error": "..."}
            let body_message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("error"))
                        .map(|m| match m.as_str() {
                            Some(s) => s.to_string(),
                            None => m.to_string(),
                        })
                });

            let message = match body_message {
                Some(msg) => msg,
                None => format!("request failed with status {}", status_code),
            };

            Err(BackupError::remote_fetch_full(message, status_code, endpoint))
        }
    }

    /// Request a single page of a listing endpoint.
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        page: u32,
    ) -> Result<Vec<T>, BackupError> {
        let url = self.api_url(endpoint);
        let response = self
            .client
            .get(&url)
            .query(&[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())])
            .send()
            .await?;

        self.handle_response(response, endpoint).await
    }

    /// Fetch every page of a listing endpoint.
    ///
    /// Pages start at 1 and the loop terminates on the first empty page;
    /// there is no upper bound on page count. Any non-success status aborts
    /// the whole fetch: partial catalogs are not usable.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Vec<T>, BackupError> {
        let mut all_data = Vec::new();
        let mut page = 1u32;

        loop {
            let fetch = || self.fetch_page::<T>(endpoint, page);
            let data = fetch
                .retry(retry_backoff())
                .when(BackupError::is_transient)
                .notify(|err, dur| {
                    log::warn!("transient error on {}, retrying in {:?}: {}", endpoint, dur, err);
                })
                .await?;

            if data.is_empty() {
                break;
            }
            all_data.extend(data);
            page += 1;
        }

        Ok(all_data)
    }

    /// Fetch the full user catalog.
    pub async fn fetch_users(&self) -> Result<Vec<User>, BackupError> {
        self.get_all_pages("/users").await
    }

    /// Fetch the full project catalog.
    pub async fn fetch_projects(&self) -> Result<Vec<Project>, BackupError> {
        self.get_all_pages("/projects").await
    }

    /// Fetch the pipeline history of one project.
    pub async fn fetch_pipelines(&self, project_id: i64) -> Result<Vec<Pipeline>, BackupError> {
        let endpoint = format!("/projects/{}/pipelines", project_id);
        self.get_all_pages(&endpoint).await
    }

    /// Validate the token by fetching the current user.
    pub async fn validate_token(&self) -> Result<User, BackupError> {
        let url = self.api_url("/user");
        let response = self.client.get(&url).send().await?;
        self.handle_response(response, "/user").await
    }
}

/// Backoff for transient request failures: 500ms doubling to 10s, three
/// retries, with jitter.
fn retry_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(500))
        .with_max_delay(Duration::from_secs(10))
        .with_max_times(3)
        .with_jitter()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: &str) -> GitLabConfig {
        GitLabConfig {
            base_url: base_url.to_string(),
            token: "glpat-test".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_api_url_strips_trailing_slash() {
        let client = GitLabClient::new(&test_config("https://gitlab.example.com/")).unwrap();
        assert_eq!(
            client.api_url("/users"),
            "https://gitlab.example.com/api/v4/users"
        );
    }

    #[test]
    fn test_invalid_token_rejected_at_construction() {
        let mut config = test_config("https://gitlab.example.com");
        config.token = "bad\ntoken".to_string();
        let err = GitLabClient::new(&config).unwrap_err();
        assert!(matches!(err, BackupError::Authentication { .. }));
    }
}
