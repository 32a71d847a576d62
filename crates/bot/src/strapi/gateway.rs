//! Authenticated HTTP transport to the commerce backend.
//!
//! The gateway wraps `reqwest` with a fixed base URL, a bearer token on
//! every request, and a bounded per-call timeout. It exposes raw parsed
//! payloads and performs no business-level interpretation.
//!
//! Retry policy: idempotent reads (`get`, `get_bytes`) are retried a bounded
//! number of times with exponential backoff; writes (`post`) are never
//! retried, the backend's own conflict handling is the only recovery path.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{instrument, warn};
use url::Url;

use crate::config::StrapiConfig;

use super::StrapiError;

/// Attempts per idempotent read, including the first.
const MAX_READ_ATTEMPTS: u32 = 3;

/// Initial backoff delay; doubles on each retry.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Authenticated HTTP gateway to the Strapi backend.
///
/// Cheap to clone; the underlying `reqwest::Client` is an `Arc` internally.
#[derive(Clone)]
pub struct ApiGateway {
    client: reqwest::Client,
    base_url: Url,
    api_token: SecretString,
}

impl std::fmt::Debug for ApiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiGateway")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl ApiGateway {
    /// Create a gateway from backend configuration.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` if the HTTP client cannot be constructed.
    pub fn new(config: &StrapiConfig) -> Result<Self, StrapiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// Perform a GET request and parse the JSON payload.
    ///
    /// Retried with backoff on transient failures; `NotFound` is returned
    /// immediately without retrying.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` on 404, `RemoteUnavailable` on transport failure
    /// or any other non-2xx status.
    #[instrument(skip(self, params), fields(path = %path))]
    pub async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, StrapiError> {
        let mut backoff = RETRY_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.get_once(path, params).await {
                Ok(value) => return Ok(value),
                Err(err @ StrapiError::NotFound(_)) => return Err(err),
                Err(err) if attempt < MAX_READ_ATTEMPTS => {
                    warn!(%err, attempt, "backend read failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Perform a GET request and return the raw response body.
    ///
    /// Used for image downloads. Same retry policy as [`Self::get`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` on 404, `RemoteUnavailable` otherwise.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>, StrapiError> {
        let mut backoff = RETRY_BACKOFF;
        let mut attempt = 1;
        loop {
            match self.get_bytes_once(path).await {
                Ok(bytes) => return Ok(bytes),
                Err(err @ StrapiError::NotFound(_)) => return Err(err),
                Err(err) if attempt < MAX_READ_ATTEMPTS => {
                    warn!(%err, attempt, "backend download failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Perform a POST request with a JSON body and parse the JSON payload.
    ///
    /// Never retried: cart creation and mutation are not idempotent.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` on 404, `RemoteUnavailable` on transport failure
    /// or any other non-2xx status.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, StrapiError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .bearer_auth(self.api_token.expose_secret())
            .json(body)
            .send()
            .await?;

        let response = check_status(response, path)?;
        Ok(response.json::<Value>().await?)
    }

    async fn get_once(&self, path: &str, params: &[(&str, String)]) -> Result<Value, StrapiError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(self.api_token.expose_secret())
            .query(params)
            .send()
            .await?;

        let response = check_status(response, path)?;
        Ok(response.json::<Value>().await?)
    }

    async fn get_bytes_once(&self, path: &str) -> Result<Vec<u8>, StrapiError> {
        let response = self
            .client
            .get(self.endpoint(path)?)
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await?;

        let response = check_status(response, path)?;
        Ok(response.bytes().await?.to_vec())
    }

    fn endpoint(&self, path: &str) -> Result<Url, StrapiError> {
        self.base_url
            .join(path)
            .map_err(|e| StrapiError::RemoteUnavailable(format!("invalid path {path:?}: {e}")))
    }
}

/// Map a non-2xx response to the error taxonomy.
fn check_status(response: reqwest::Response, path: &str) -> Result<reqwest::Response, StrapiError> {
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StrapiError::NotFound(path.to_string()));
    }
    if !status.is_success() {
        return Err(StrapiError::RemoteUnavailable(format!(
            "HTTP {status} from {path}"
        )));
    }
    Ok(response)
}
