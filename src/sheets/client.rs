//! Google Sheets v4 values API backend

use super::auth::{ServiceAccountKey, TokenProvider};
use super::backoff::ExponentialBackoff;
use super::{Cell, SheetRange, StoreError, TabularStore};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

enum Credentials {
    ServiceAccount(TokenProvider),
    /// Pre-issued bearer token (emulators, local testing)
    Bearer(String),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Cell>>,
}

#[derive(Debug, Serialize)]
struct ValueRangeBody<'a> {
    range: String,
    #[serde(rename = "majorDimension")]
    major_dimension: &'static str,
    values: &'a [Vec<Cell>],
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    credentials: Credentials,
    spreadsheet_id: String,
    base_url: String,
}

impl GoogleSheetsClient {
    /// Client authenticated by the service-account key at `credentials_path`.
    pub fn from_service_account(credentials_path: &Path, spreadsheet_id: &str) -> Result<Self, StoreError> {
        let key = ServiceAccountKey::from_file(credentials_path)?;
        let http = build_http()?;
        log::info!("🔑 Sheets service account: {}", key.client_email);
        Ok(Self {
            credentials: Credentials::ServiceAccount(TokenProvider::new(key, http.clone())),
            http,
            spreadsheet_id: spreadsheet_id.to_string(),
            base_url: SHEETS_API_BASE.to_string(),
        })
    }

    pub fn with_bearer_token(spreadsheet_id: &str, token: &str, base_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            http: build_http()?,
            credentials: Credentials::Bearer(token.to_string()),
            spreadsheet_id: spreadsheet_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}` with the range as one escaped segment
    pub fn values_url(&self, range: &SheetRange) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::InvalidRange(format!("bad API base {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRange(format!("API base {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values"])
            .push(&range.to_a1());
        Ok(url)
    }

    async fn bearer(&self) -> Result<String, StoreError> {
        match &self.credentials {
            Credentials::ServiceAccount(provider) => provider.access_token().await,
            Credentials::Bearer(token) => Ok(token.clone()),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let request = request.bearer_auth(self.bearer().await?);
        let response = send_with_retry(request, ExponentialBackoff::for_sheets()).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|parsed| parsed.error.message)
            .unwrap_or(body);
        Err(StoreError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn build_http() -> Result<reqwest::Client, StoreError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?)
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Send, retrying rate-limit and server errors and connect/timeout failures.
/// The last response is returned as-is once retries run out.
async fn send_with_retry(
    request: reqwest::RequestBuilder,
    mut backoff: ExponentialBackoff,
) -> Result<reqwest::Response, StoreError> {
    loop {
        let Some(attempt) = request.try_clone() else {
            return Ok(request.send().await?);
        };

        match attempt.send().await {
            Ok(response) => {
                let status = response.status();
                if is_retryable_status(status) {
                    log::warn!("⚠️  Sheets API returned {}", status);
                    if backoff.sleep().await.is_ok() {
                        continue;
                    }
                }
                return Ok(response);
            }
            Err(err) if err.is_timeout() || err.is_connect() => {
                log::warn!("⚠️  Sheets API transport error: {}", err);
                if backoff.sleep().await.is_err() {
                    return Err(StoreError::Http(err));
                }
            }
            Err(err) => return Err(StoreError::Http(err)),
        }
    }
}

#[async_trait]
impl TabularStore for GoogleSheetsClient {
    async fn read_range(&self, range: &SheetRange) -> Result<Vec<Vec<Cell>>, StoreError> {
        let url = self.values_url(range)?;
        let request = self.http.get(url).query(&[
            ("valueRenderOption", "UNFORMATTED_VALUE"),
            ("majorDimension", "ROWS"),
        ]);
        let response = self.send(request).await?;
        let body: ValueRange = response.json().await?;
        log::debug!("📖 Read {} rows from {}", body.values.len(), range);
        Ok(body.values)
    }

    async fn write_range(&self, range: &SheetRange, values: Vec<Vec<Cell>>) -> Result<(), StoreError> {
        let url = self.values_url(range)?;
        let body = ValueRangeBody {
            range: range.to_a1(),
            major_dimension: "ROWS",
            values: &values,
        };
        let request = self
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&body);
        self.send(request).await?;
        log::debug!("✏️  Wrote {}", range);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "google-sheets"
    }
}
