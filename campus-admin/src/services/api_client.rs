//! REST transport to the console backend.
//!
//! Every call except the public auth endpoints carries the session's bearer
//! token. A `401` on such a call logs the session out before the error is
//! returned, so stale credentials are never retried silently.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BackendSettings;
use crate::services::error::ClientError;
use crate::services::session::SessionStore;

pub struct BackendClient {
    client: Client,
    base_url: String,
    session: Arc<SessionStore>,
}

impl BackendClient {
    pub fn new(settings: &BackendSettings, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with the session's bearer token.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.authorized(self.client.get(self.url(path))).await
    }

    /// GET with query parameters and the session's bearer token.
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.authorized(self.client.get(self.url(path)).query(query))
            .await
    }

    /// POST with the session's bearer token.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.authorized(self.client.post(self.url(path)).json(body))
            .await
    }

    /// PATCH with the session's bearer token.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.authorized(self.client.request(Method::PATCH, self.url(path)).json(body))
            .await
    }

    /// POST without credentials, for login, registration and recovery flows.
    pub async fn post_public<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send POST request to {}: {}", path, e);
                ClientError::Transport(e)
            })?;
        Self::decode(path, response).await
    }

    async fn authorized<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        // Capture the generation with the token so a late 401 cannot log out
        // a session established after this request was sent.
        let generation = self.session.generation();
        let token = self.session.token().ok_or(ClientError::NotAuthenticated)?;

        let request = request.bearer_auth(token).build()?;
        let path = request.url().path().to_string();

        let response = self.client.execute(request).await.map_err(|e| {
            tracing::error!("Failed to send request to {}: {}", path, e);
            ClientError::Transport(e)
        })?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.session.expire(generation);
            return Err(ClientError::SessionExpired);
        }

        Self::decode(&path, response).await
    }

    async fn decode<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(path = %path, status = %status, "Backend response");

        if !status.is_success() {
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message: extract_message(&body),
            });
        }

        let body = if body.trim().is_empty() { "null" } else { &body };
        serde_json::from_str(body).map_err(|e| {
            tracing::error!(path = %path, "Malformed backend response: {}", e);
            ClientError::Decode(e.to_string())
        })
    }
}

/// Pull a human-readable message out of an error body, if it has one.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error"].iter().find_map(|key| match &value[*key] {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        serde_json::Value::Object(inner) => inner
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        _ => None,
    })
}
