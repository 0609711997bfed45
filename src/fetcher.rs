use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::settings::HttpSettings;

/// Credential attached to a remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

impl Credential {
    pub fn bearer(content: impl Into<String>) -> Self {
        Credential::Bearer(content.into())
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credential::Basic {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Minimal HTTP access shared by every remote provider.
///
/// Both methods return `None` on transport errors, non-success statuses and
/// empty bodies. Whether that is fatal is for the caller to decide.
#[async_trait]
pub trait RemoteResourceFetcher: Send + Sync {
    async fn get(&self, url: &str, credential: &Credential) -> Option<String>;

    async fn post_form(
        &self,
        url: &str,
        credential: &Credential,
        form: &[(&str, &str)],
    ) -> Option<String>;
}

/// Join a base URL and a relative path with exactly one slash between them
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn authorize(builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        match credential {
            Credential::None => builder,
            Credential::Bearer(token) => builder.bearer_auth(token),
            Credential::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    async fn read_body(method: &str, url: &str, request: RequestBuilder) -> Option<String> {
        debug!(method, url, "RESOURCE CALL");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(method, url, error = %e, "Remote call failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(method, url, status = status.as_u16(), "Remote call returned error status");
            return None;
        }

        match response.text().await {
            Ok(body) if body.is_empty() => {
                debug!(method, url, "Remote call returned empty body");
                None
            }
            Ok(body) => Some(body),
            Err(e) => {
                warn!(method, url, error = %e, "Failed to read response body");
                None
            }
        }
    }
}

#[async_trait]
impl RemoteResourceFetcher for HttpFetcher {
    async fn get(&self, url: &str, credential: &Credential) -> Option<String> {
        let request = Self::authorize(self.client.get(url), credential);
        Self::read_body("GET", url, request).await
    }

    async fn post_form(
        &self,
        url: &str,
        credential: &Credential,
        form: &[(&str, &str)],
    ) -> Option<String> {
        let request = Self::authorize(self.client.post(url), credential).form(form);
        Self::read_body("POST", url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Form,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Router,
    };
    use std::collections::HashMap;

    async fn spawn_server(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&HttpSettings::default()).unwrap()
    }

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://quay.io/api/v1/", "/repository/acme/flow"),
            "https://quay.io/api/v1/repository/acme/flow"
        );
        assert_eq!(
            join_url("https://quay.io/api/v1", "user/"),
            "https://quay.io/api/v1/user/"
        );
    }

    #[tokio::test]
    async fn test_get_applies_bearer_credential() {
        let app = Router::new().route(
            "/user/",
            get(|headers: HeaderMap| async move {
                headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        );
        let base = spawn_server(app).await;

        let body = fetcher()
            .get(&format!("{}/user/", base), &Credential::bearer("abc"))
            .await;
        assert_eq!(body.as_deref(), Some("Bearer abc"));
    }

    #[tokio::test]
    async fn test_get_error_status_is_absent() {
        let app = Router::new().route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "nope") }),
        );
        let base = spawn_server(app).await;

        let body = fetcher()
            .get(&format!("{}/missing", base), &Credential::None)
            .await;
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_get_empty_body_is_absent() {
        let app = Router::new().route("/empty", get(|| async { "" }));
        let base = spawn_server(app).await;

        let body = fetcher()
            .get(&format!("{}/empty", base), &Credential::None)
            .await;
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_absent() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let body = fetcher()
            .get(&format!("http://{}/user/", addr), &Credential::None)
            .await;
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_post_form_sends_fields_and_basic_auth() {
        let app = Router::new().route(
            "/token",
            post(
                |headers: HeaderMap, Form(form): Form<HashMap<String, String>>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    format!(
                        "{}|{}|{}",
                        auth,
                        form.get("grant_type").cloned().unwrap_or_default(),
                        form.get("code").cloned().unwrap_or_default()
                    )
                },
            ),
        );
        let base = spawn_server(app).await;

        let body = fetcher()
            .post_form(
                &format!("{}/token", base),
                &Credential::basic("client", "secret"),
                &[("grant_type", "authorization_code"), ("code", "xyz")],
            )
            .await
            .unwrap();

        // base64("client:secret")
        assert_eq!(body, "Basic Y2xpZW50OnNlY3JldA==|authorization_code|xyz");
    }
}
