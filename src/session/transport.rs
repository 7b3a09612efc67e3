//! How a [`SessionContext`](super::SessionContext) reaches the auth endpoints.

use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::future::Future;
use url::Url;

use crate::auth::{CSRF_COOKIE_NAME, CSRF_HEADER_NAME};
use crate::credentials::AdminRole;

/// The user a session belongs to, as returned by login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub role: AdminRole,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginReply {
    pub token: String,
    pub user: SessionUser,
    /// Seconds until the token expires
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReply {
    pub token: String,
    pub expires_in: u64,
}

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with an error status
    Rejected { status: u16, message: String },
    /// The request never got an answer, or the answer was unreadable
    Network(String),
}

impl TransportError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Rejected { status: 401, .. })
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Rejected { status, message } => write!(f, "{}: {}", status, message),
            TransportError::Network(msg) => write!(f, "Request failed: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// The three auth calls a session makes.
pub trait AuthTransport: Send + Sync + 'static {
    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<LoginReply, TransportError>> + Send;

    fn refresh(&self, token: &str) -> impl Future<Output = Result<RefreshReply, TransportError>> + Send;

    fn logout(&self, token: Option<&str>) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsrfBody {
    csrf_token: String,
}

/// [`AuthTransport`] over HTTP.
///
/// Holds no cookie jar: the bearer token and CSRF pair are attached to each
/// request explicitly.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base: Url) -> Self {
        Self::with_client(Client::new(), base)
    }

    pub fn with_client(client: Client, base: Url) -> Self {
        Self { client, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    async fn csrf_token(&self) -> Result<String, TransportError> {
        let response = self
            .client
            .get(self.endpoint("/api/auth/csrf")?)
            .send()
            .await
            .map_err(network)?;
        let body: CsrfBody = read_json(response).await?;
        Ok(body.csrf_token)
    }
}

fn network(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(rejected(status, response).await);
    }
    response.json().await.map_err(network)
}

async fn rejected(status: StatusCode, response: reqwest::Response) -> TransportError {
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("").to_string(),
    };
    TransportError::Rejected {
        status: status.as_u16(),
        message,
    }
}

impl AuthTransport for HttpTransport {
    async fn login(&self, email: &str, password: &str) -> Result<LoginReply, TransportError> {
        let response = self
            .client
            .post(self.endpoint("/api/auth/login")?)
            .json(&LoginBody { email, password })
            .send()
            .await
            .map_err(network)?;
        read_json(response).await
    }

    async fn refresh(&self, token: &str) -> Result<RefreshReply, TransportError> {
        let csrf = self.csrf_token().await?;
        let response = self
            .client
            .post(self.endpoint("/api/auth/refresh")?)
            .bearer_auth(token)
            .header(header::COOKIE, format!("{}={}", CSRF_COOKIE_NAME, csrf))
            .header(CSRF_HEADER_NAME, csrf)
            .send()
            .await
            .map_err(network)?;
        read_json(response).await
    }

    async fn logout(&self, token: Option<&str>) -> Result<(), TransportError> {
        let mut request = self.client.post(self.endpoint("/api/auth/logout")?);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(rejected(status, response).await);
        }
        Ok(())
    }
}
