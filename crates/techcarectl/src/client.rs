//! HTTP client for communicating with techcared.

use crate::errors::CliError;
use crate::session::Session;
use anyhow::Result;
use chrono::Utc;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use techcare_shared::api::{ApiErrorBody, LoginRequest, RefreshResponse, TokenResponse};
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the techcared HTTP API
pub struct TechcareClient {
    http: reqwest::Client,
    base_url: String,
    session_path: PathBuf,
    session: Option<Session>,
}

impl TechcareClient {
    /// `server` wins over the saved session's server, which wins over the default
    pub fn new(server: Option<String>, session_path: PathBuf) -> Result<Self> {
        let session = Session::load(&session_path)?;
        let base_url = server
            .or_else(|| session.as_ref().map(|s| s.server.clone()))
            .unwrap_or_else(|| techcare_shared::DEFAULT_SERVER_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url,
            session_path,
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn send_once<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<&str>,
    ) -> std::result::Result<Response, CliError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);
        let mut req = self.http.request(method, &url);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await.map_err(|e| CliError::Unavailable {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })
    }

    /// Send with the saved access token, refreshing it once on 401
    async fn execute<B: Serialize + ?Sized>(
        &mut self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> std::result::Result<Response, CliError> {
        let token = self
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .ok_or(CliError::NotLoggedIn)?;

        let resp = self.send_once(method.clone(), path, body, Some(&token)).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let Some(token) = self.refresh().await? else {
            return Ok(resp);
        };
        self.send_once(method, path, body, Some(&token)).await
    }

    /// Swap the refresh token for a new access token and save it
    async fn refresh(&mut self) -> std::result::Result<Option<String>, CliError> {
        let Some(refresh_token) = self.session.as_ref().map(|s| s.refresh_token.clone()) else {
            return Ok(None);
        };
        let resp = self
            .send_once(
                Method::POST,
                "/v1/auth/refresh",
                Some(&json!({ "refresh_token": refresh_token })),
                None,
            )
            .await?;
        if !resp.status().is_success() {
            debug!("Refresh rejected with {}", resp.status());
            return Ok(None);
        }
        let refreshed: RefreshResponse = decode(resp).await?;

        if let Some(session) = self.session.as_mut() {
            session.access_token = refreshed.access_token.clone();
            session.saved_at = Utc::now();
            if let Err(e) = session.save(&self.session_path) {
                debug!("Could not save refreshed session: {}", e);
            }
        }
        Ok(Some(refreshed.access_token))
    }

    pub async fn get<T: DeserializeOwned>(&mut self, path: &str) -> std::result::Result<T, CliError> {
        let resp = self.execute::<()>(Method::GET, path, None).await?;
        decode(resp).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &mut self,
        path: &str,
        body: &B,
    ) -> std::result::Result<T, CliError> {
        let resp = self.execute(Method::POST, path, Some(body)).await?;
        decode(resp).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &mut self,
        path: &str,
        body: &B,
    ) -> std::result::Result<T, CliError> {
        let resp = self.execute(Method::PUT, path, Some(body)).await?;
        decode(resp).await
    }

    pub async fn delete(&mut self, path: &str) -> std::result::Result<(), CliError> {
        let resp = self.execute::<()>(Method::DELETE, path, None).await?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(error_from(resp).await)
        }
    }

    /// Unauthenticated GET
    pub async fn get_public<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, CliError> {
        let resp = self.send_once::<()>(Method::GET, path, None, None).await?;
        decode(resp).await
    }

    /// POST that sends the saved token when there is one
    pub async fn post_optional_auth<T: DeserializeOwned, B: Serialize + ?Sized>(
        &mut self,
        path: &str,
        body: &B,
    ) -> std::result::Result<T, CliError> {
        let resp = if self.session.is_some() {
            self.execute(Method::POST, path, Some(body)).await?
        } else {
            self.send_once(Method::POST, path, Some(body), None).await?
        };
        decode(resp).await
    }

    /// Log in and save the session
    pub async fn login(&mut self, username: &str, password: &str) -> Result<TokenResponse> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self
            .send_once(Method::POST, "/v1/auth/login", Some(&req), None)
            .await?;
        let tokens: TokenResponse = decode(resp).await?;

        let session = Session {
            server: self.base_url.clone(),
            username: tokens.user.username.clone(),
            role: tokens.role,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            saved_at: Utc::now(),
        };
        session.save(&self.session_path)?;
        self.session = Some(session);
        Ok(tokens)
    }

    /// Forget the saved session; true if one existed
    pub fn logout(&mut self) -> Result<bool> {
        self.session = None;
        Session::clear(&self.session_path)
    }
}

async fn error_from(resp: Response) -> CliError {
    let status = resp.status();
    let body = resp.json::<ApiErrorBody>().await.ok();
    CliError::from_response(status, body)
}

async fn decode<T: DeserializeOwned>(resp: Response) -> std::result::Result<T, CliError> {
    if !resp.status().is_success() {
        return Err(error_from(resp).await);
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| CliError::InvalidResponse(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| CliError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use techcare_shared::Role;

    #[test]
    fn test_server_precedence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");

        let client = TechcareClient::new(None, path.clone()).unwrap();
        assert_eq!(client.base_url(), techcare_shared::DEFAULT_SERVER_URL);

        Session {
            server: "http://saved:7870/".into(),
            username: "u".into(),
            role: Role::Viewer,
            access_token: "a".into(),
            refresh_token: "r".into(),
            saved_at: Utc::now(),
        }
        .save(&path)
        .unwrap();
        let client = TechcareClient::new(None, path.clone()).unwrap();
        assert_eq!(client.base_url(), "http://saved:7870");

        let client = TechcareClient::new(Some("http://flag:1".into()), path).unwrap();
        assert_eq!(client.base_url(), "http://flag:1");
    }

    #[tokio::test]
    async fn test_requires_login() {
        let dir = TempDir::new().unwrap();
        let mut client =
            TechcareClient::new(None, dir.path().join("session.json")).unwrap();
        let err = client.get::<serde_json::Value>("/v1/me").await.unwrap_err();
        assert!(matches!(err, CliError::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_unreachable_daemon() {
        let dir = TempDir::new().unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let client =
            TechcareClient::new(Some("http://127.0.0.1:9".into()), dir.path().join("s.json"))
                .unwrap();
        let err = client
            .get_public::<serde_json::Value>("/v1/health")
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Unavailable { .. }));
    }
}
