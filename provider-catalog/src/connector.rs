//! Catalog REST connector implementation
//!
//! Implements the `RemoteCatalog` trait over the hosted backend's REST
//! interface (`/rest/v1/<table>`).

use async_trait::async_trait;
use bridge_traits::catalog::{RemoteCatalog, RemoteSong, RemoteUser, SongId, UserId};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use core_runtime::config::CatalogApiConfig;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::CatalogError;
use crate::types::{SongRow, UserRow, SONG_COLUMNS, USER_COLUMNS};

/// Timeout for a single catalog query
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Catalog API connector
///
/// # Example
///
/// ```ignore
/// use provider_catalog::RestCatalogConnector;
/// use bridge_traits::RemoteCatalog;
///
/// let connector = RestCatalogConnector::new(http_client, config.catalog.clone());
/// let song = connector.get_song(&SongId::from("42")).await?;
/// ```
pub struct RestCatalogConnector {
    http_client: Arc<dyn HttpClient>,
    config: CatalogApiConfig,
    retry_policy: RetryPolicy,
}

impl RestCatalogConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, config: CatalogApiConfig) -> Self {
        Self {
            http_client,
            config,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// `{base}/rest/v1/{table}?{column}=eq.{value}&select={columns}`
    fn row_url(&self, table: &str, column: &str, value: &str, columns: &str) -> String {
        format!(
            "{}/rest/v1/{}?{}=eq.{}&select={}",
            self.config.base_url.trim_end_matches('/'),
            table,
            column,
            urlencoding::encode(value),
            columns
        )
    }

    fn build_request(&self, url: String) -> HttpRequest {
        HttpRequest::get(url)
            .header("apikey", self.config.api_key.clone())
            .bearer_token(self.config.api_key.clone())
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    /// Run a row query and decode the JSON array.
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_rows<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>> {
        let request = self.build_request(url);
        let response = self
            .http_client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        check_status(&response)?;

        let rows: Vec<T> = response
            .json()
            .map_err(|e| CatalogError::ParseError(e.to_string()))?;
        debug!(rows = rows.len(), "Catalog query succeeded");
        Ok(rows)
    }
}

fn check_status(response: &HttpResponse) -> std::result::Result<(), CatalogError> {
    let status = response.status;
    if response.is_success() {
        return Ok(());
    }

    warn!(status, "Catalog query failed");
    Err(match status {
        401 | 403 => CatalogError::Unauthorized {
            status_code: status,
        },
        429 => CatalogError::RateLimitExceeded {
            retry_after_seconds: response
                .header("retry-after")
                .and_then(|value| value.trim().parse().ok()),
        },
        _ => CatalogError::ApiError {
            status_code: status,
            message: String::from_utf8_lossy(&response.body).to_string(),
        },
    })
}

#[async_trait]
impl RemoteCatalog for RestCatalogConnector {
    #[instrument(skip(self), fields(song_id = %id))]
    async fn get_song(&self, id: &SongId) -> Result<Option<RemoteSong>> {
        let url = self.row_url(&self.config.songs_table, "id", id.as_str(), SONG_COLUMNS);
        let rows: Vec<SongRow> = self.fetch_rows(url).await?;
        Ok(rows.into_iter().next().map(RemoteSong::from))
    }

    #[instrument(skip(self), fields(user_id = %id))]
    async fn get_user(&self, id: &UserId) -> Result<Option<RemoteUser>> {
        let url = self.row_url(&self.config.users_table, "id", id.as_str(), USER_COLUMNS);
        let rows: Vec<UserRow> = self.fetch_rows(url).await?;
        Ok(rows.into_iter().next().map(RemoteUser::from))
    }
}
