//! Client for the presentation conversion service.
//!
//! The service takes a multipart upload with a single `file` field and
//! answers `{ "url": ... }` on success, or a non-2xx status with
//! `{ "error": ..., "details": ... }`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{PreviewError, Result};

const UPLOAD_FIELD: &str = "file";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Turns a presentation into a PDF reachable by URL, and fetches such URLs.
pub trait RemoteConverter: Send + Sync {
    fn convert<'a>(&'a self, name: &'a str, bytes: Arc<[u8]>) -> BoxFuture<'a, Result<String>>;

    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<[u8]>>>;
}

#[derive(Debug, Deserialize)]
struct ConversionResponse {
    url: Option<String>,
    error: Option<String>,
    details: Option<String>,
}

/// HTTP client for a conversion endpoint such as `http://localhost:5000/convert`.
#[derive(Debug, Clone)]
pub struct ConversionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ConversionClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PreviewError::RemoteConversionFailed(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn upload(&self, name: &str, bytes: Arc<[u8]>) -> Result<String> {
        tracing::info!("uploading {} ({} bytes) to {}", name, bytes.len(), self.endpoint);
        let part = Part::bytes(bytes.to_vec()).file_name(name.to_string());
        let form = Form::new().part(UPLOAD_FIELD, part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PreviewError::RemoteConversionFailed(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PreviewError::RemoteConversionFailed(e.to_string()))?;

        let url = parse_response(status, &body)?;
        tracing::info!("{} converted to {}", name, url);
        Ok(url)
    }

    async fn download(&self, url: &str) -> Result<Arc<[u8]>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PreviewError::RemoteConversionFailed(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PreviewError::RemoteConversionFailed(e.to_string()))?;
        tracing::debug!("fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec().into())
    }
}

impl RemoteConverter for ConversionClient {
    fn convert<'a>(&'a self, name: &'a str, bytes: Arc<[u8]>) -> BoxFuture<'a, Result<String>> {
        Box::pin(self.upload(name, bytes))
    }

    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<[u8]>>> {
        Box::pin(self.download(url))
    }
}

/// Interpret a conversion response.
fn parse_response(status: StatusCode, body: &str) -> Result<String> {
    let parsed: Option<ConversionResponse> = serde_json::from_str(body).ok();

    if !status.is_success() {
        let reason = match parsed {
            Some(ConversionResponse { error, details, .. }) => {
                let error = error.unwrap_or_else(|| "conversion failed".to_string());
                match details {
                    Some(details) => format!("{} ({}): {}", error, status, details),
                    None => format!("{} ({})", error, status),
                }
            }
            None => format!("service answered {}", status),
        };
        return Err(PreviewError::RemoteConversionFailed(reason));
    }

    parsed
        .and_then(|r| r.url)
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| PreviewError::RemoteConversionFailed("response carried no url".to_string()))
}
