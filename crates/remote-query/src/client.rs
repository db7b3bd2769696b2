//! JSON REST client for plugin endpoints.

use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Thin wrapper around [`reqwest::Client`] bound to an API base URL.
///
/// Every call maps its failure into a [`FetchError`]: transport problems
/// become `Network`, non-2xx responses become `Api` with the `error` field of
/// the body (if any), and bodies that do not decode become `Unknown`.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL of `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET path?query` decoding a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let response = self.request(Method::GET, path, query).send().await?;
        decode(response).await
    }

    /// `POST path?query` with a JSON body, decoding a JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, FetchError> {
        let response = self
            .request(Method::POST, path, query)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    /// `POST path?query` without a body, ignoring the response body on success.
    pub async fn post_action(&self, path: &str, query: &[(&str, String)]) -> Result<(), FetchError> {
        let response = self.request(Method::POST, path, query).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await?;
        Err(error_from_body(status.as_u16(), &body))
    }

    fn request(&self, method: Method, path: &str, query: &[(&str, String)]) -> RequestBuilder {
        let url = self.url(path);
        tracing::trace!(%method, %url, "request");
        let builder = self.http.request(method, url);
        if query.is_empty() {
            builder
        } else {
            builder.query(query)
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &body));
    }
    Ok(serde_json::from_slice(&body)?)
}

/// Build the error of a non-2xx response from its body.
///
/// The `error` field of a JSON object body is used as the message; anything
/// else leaves the message empty.
pub fn error_from_body(status: u16, body: &[u8]) -> FetchError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.error)
        .filter(|message| !message.trim().is_empty());
    FetchError::Api { status, message }
}
