//! HTTPS remote backed by reqwest.

use super::{Endpoint, RemoteError, RemoteSource};
use crate::config::RemoteConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;

const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Remote tracker reached over its REST API.
#[derive(Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for HttpRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The client carries the token in its default headers.
        f.debug_struct("HttpRemote")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpRemote {
    /// Build a client for `config.api_url` authenticating with `token`.
    pub fn new(config: &RemoteConfig, token: &str) -> Result<Self, RemoteError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| RemoteError::Validation("token contains invalid characters".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|_| RemoteError::Validation("user agent contains invalid characters".into()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success response into a status error carrying its body.
    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

fn transport(e: reqwest::Error) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

#[async_trait]
impl RemoteSource for HttpRemote {
    async fn validate(&self) -> Result<(), RemoteError> {
        let response = self
            .client
            .get(self.url("/user"))
            .send()
            .await
            .map_err(transport)?;
        Self::check(response).await?;
        tracing::debug!(base_url = %self.base_url, "Credential accepted");
        Ok(())
    }

    async fn fetch_page(
        &self,
        endpoint: &Endpoint,
        params: &[(String, String)],
    ) -> Result<Vec<Value>, RemoteError> {
        let response = self
            .client
            .get(self.url(&endpoint.path()))
            .query(params)
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check(response).await?;

        let text = response.text().await.map_err(transport)?;
        match serde_json::from_str(&text) {
            Ok(Value::Array(records)) => Ok(records),
            Ok(other) => Err(RemoteError::Validation(format!(
                "{endpoint} returned a JSON {} instead of an array",
                json_kind(&other)
            ))),
            Err(e) => Err(RemoteError::Validation(format!(
                "{endpoint} returned invalid JSON: {e}"
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
