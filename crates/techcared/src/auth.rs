//! Bearer tokens and the authenticated-user extractor.
//!
//! Access and refresh tokens are HS256 JWTs carrying the user id, role and
//! token kind. A refresh token is only accepted by the refresh endpoint.

use crate::error::ApiError;
use crate::state::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use techcare_shared::error::Result;
use techcare_shared::{Permission, Role, TechcareError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: u64,
    refresh_ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl_secs: u64, refresh_ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    /// Issuer from config; an empty secret gets a random per-process one
    pub fn from_config(config: &crate::config::AuthConfig) -> Self {
        let secret = if config.jwt_secret.is_empty() {
            warn!("auth.jwt_secret is not set; tokens will not survive a restart");
            let mut bytes = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut bytes);
            bytes.to_vec()
        } else {
            config.jwt_secret.as_bytes().to_vec()
        };
        Self::new(
            &secret,
            config.effective_access_ttl(),
            config.effective_refresh_ttl(),
        )
    }

    pub fn access_ttl_secs(&self) -> u64 {
        self.access_ttl_secs
    }

    pub fn issue(&self, user_id: &str, role: Role, kind: TokenKind) -> Result<String> {
        self.issue_at(user_id, role, kind, Utc::now().timestamp())
    }

    fn issue_at(&self, user_id: &str, role: Role, kind: TokenKind, now: i64) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        };
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            kind,
            iat: now,
            exp: now + ttl as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TechcareError::Internal(format!("token encoding failed: {}", e)))
    }

    /// Decode and check signature, expiry and kind
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            debug!("Rejected token: {}", e);
            TechcareError::Unauthenticated
        })?;
        if data.claims.kind != kind {
            return Err(TechcareError::Unauthenticated);
        }
        Ok(data.claims)
    }
}

/// The caller, resolved from a valid access token of an active account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, permission: Permission) -> std::result::Result<(), ApiError> {
        if self.role.can(permission) {
            Ok(())
        } else {
            Err(ApiError(TechcareError::Forbidden(format!(
                "{} lacks {:?}",
                self.role, permission
            ))))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.can(Permission::AdminAccess)
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError(TechcareError::Unauthenticated))?;
        let claims = state.tokens.verify(token, TokenKind::Access)?;

        // Role changes and deactivation take effect without waiting for expiry
        let user = state
            .users
            .read()
            .await
            .get(&claims.sub)
            .map_err(|_| ApiError(TechcareError::Unauthenticated))?;
        if !user.active {
            return Err(ApiError(TechcareError::Forbidden(
                "account is disabled".to_string(),
            )));
        }
        Ok(AuthUser {
            id: user.id,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret", 900, 7 * 24 * 3600)
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let token = issuer.issue("u1", Role::Technician, TokenKind::Access).unwrap();
        let claims = issuer.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Technician);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_kind_is_enforced() {
        let issuer = issuer();
        let refresh = issuer.issue("u1", Role::Viewer, TokenKind::Refresh).unwrap();
        assert!(issuer.verify(&refresh, TokenKind::Access).is_err());
        assert!(issuer.verify(&refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = issuer();
        let long_ago = Utc::now().timestamp() - 3600;
        let token = issuer
            .issue_at("u1", Role::Viewer, TokenKind::Access, long_ago)
            .unwrap();
        assert!(matches!(
            issuer.verify(&token, TokenKind::Access),
            Err(TechcareError::Unauthenticated)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issuer().issue("u1", Role::Viewer, TokenKind::Access).unwrap();
        let other = TokenIssuer::new(b"other-secret", 900, 900);
        assert!(other.verify(&token, TokenKind::Access).is_err());
    }

    #[test]
    fn test_require_permission() {
        let viewer = AuthUser {
            id: "u1".into(),
            role: Role::Viewer,
        };
        assert!(viewer.require(Permission::ViewDashboard).is_ok());
        assert!(viewer.require(Permission::RunDiagnostics).is_err());
        assert!(!viewer.is_admin());
    }
}
