//! HTTP adapter for a hosted Postgres backend exposing PostgREST and GoTrue.
//!
//! [`RestStore`] implements [`todo_sync_app::RemoteTaskRepository`] over the
//! `/rest/v1/<table>` endpoint; row ownership is enforced server side by the
//! access token. [`AuthClient`] performs the password grant flow and
//! publishes the resulting identity to its [`todo_sync_app::SessionHandle`].

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use todo_sync_app::BackendConfig;

pub mod auth;
pub mod error;
pub mod rest;

pub use auth::{AuthClient, Credentials, SignUpOutcome};
pub use error::RemoteError;
pub use rest::RestStore;

/// Shared HTTP plumbing: base URL, API key and the current access token.
///
/// Clones share the token, so an [`AuthClient`] and a [`RestStore`] built
/// from the same `Backend` see the same sign-in.
#[derive(Clone)]
pub struct Backend {
    client: Client,
    base_url: String,
    anon_key: String,
    token: Arc<RwLock<Option<String>>>,
}

impl Backend {
    /// Build a client for `config`.
    ///
    /// # Errors
    /// Returns [`RemoteError::Config`] when the URL is missing or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &BackendConfig) -> Result<Self, RemoteError> {
        let base_url = config
            .require_url()
            .map_err(|err| RemoteError::Config(err.to_string()))?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|err| RemoteError::Config(err.to_string()))?;
        Ok(Self::with_client(client, base_url, config.anon_key().unwrap_or_default()))
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            anon_key: anon_key.to_owned(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Project base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn set_access_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// True while an access token is held.
    pub fn is_signed_in(&self) -> bool {
        self.token.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Request carrying the API key and, when signed in, the user's token.
    /// Without a token the API key doubles as the bearer.
    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Request that must carry a user token.
    pub(crate) fn authed(&self, method: Method, url: &str) -> Result<RequestBuilder, RemoteError> {
        if !self.is_signed_in() {
            return Err(RemoteError::NotSignedIn);
        }
        Ok(self.request(method, url))
    }
}

/// Send `request`, map non-success statuses to errors, and return the body.
pub(crate) async fn send(request: RequestBuilder) -> Result<String, RemoteError> {
    let response: Response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(RemoteError::from_response(status, &body));
    }
    Ok(body)
}

/// Like [`send`] but decode a JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RemoteError> {
    let body = send(request).await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn urls_are_built_from_trimmed_base() {
        let backend = Backend::with_client(Client::new(), "https://demo.supabase.co/", "anon");
        assert_eq!(backend.base_url(), "https://demo.supabase.co");
        assert_eq!(backend.rest_url("todos"), "https://demo.supabase.co/rest/v1/todos");
        assert_eq!(
            backend.auth_url("token?grant_type=password"),
            "https://demo.supabase.co/auth/v1/token?grant_type=password"
        );
    }

    #[test]
    fn requests_fall_back_to_anon_key_as_bearer() {
        let backend = Backend::with_client(Client::new(), "https://demo.supabase.co", "anon");
        let request = backend
            .request(Method::GET, &backend.rest_url("todos"))
            .build()
            .expect("request builds");
        assert_eq!(request.headers()["apikey"], "anon");
        assert_eq!(request.headers()["authorization"], "Bearer anon");

        backend.set_access_token(Some("user-jwt".to_owned()));
        let request = backend
            .request(Method::GET, &backend.rest_url("todos"))
            .build()
            .expect("request builds");
        assert_eq!(request.headers()["authorization"], "Bearer user-jwt");
    }

    #[test]
    fn token_is_shared_between_clones() {
        let backend = Backend::with_client(Client::new(), "https://demo.supabase.co", "anon");
        let clone = backend.clone();
        assert!(clone.authed(Method::GET, "https://demo.supabase.co").is_err());
        backend.set_access_token(Some("t".to_owned()));
        assert!(clone.is_signed_in());
        backend.set_access_token(None);
        assert!(!clone.is_signed_in());
    }

    #[test]
    fn from_config_requires_url() {
        let err = Backend::from_config(&BackendConfig::default()).err().expect("missing url");
        assert!(matches!(err, RemoteError::Config(_)));
        let backend = Backend::from_config(&BackendConfig::new("https://x.supabase.co").with_anon_key("k"))
            .expect("valid config");
        assert_eq!(backend.base_url(), "https://x.supabase.co");
    }
}
