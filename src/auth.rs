//! Caller identity for the admin surface.
//!
//! The service performs no authentication of its own: an `IdentityProvider`
//! turns a bearer token into a subject and role set, and admin routes only
//! check the role.

use axum::Json;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::warn;

/// Role required by every admin endpoint.
pub const ADMIN_ROLE: &str = "admin";

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    pub subject: String,
    pub roles: Vec<String>,
}

impl CallerIdentity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Resolves bearer tokens to identities.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, bearer_token: &str) -> Option<CallerIdentity>;
}

/// A configured static token.
#[derive(Debug)]
pub struct AdminToken {
    pub token: SecretString,
    pub subject: String,
    pub roles: Vec<String>,
}

impl AdminToken {
    /// Parse `token:subject[:role+role]`. Roles default to `admin`.
    pub fn parse(entry: &str) -> Result<Self, String> {
        let mut parts = entry.trim().splitn(3, ':');
        let token = parts.next().unwrap_or_default().trim();
        let subject = parts.next().unwrap_or_default().trim();
        if token.is_empty() || subject.is_empty() {
            return Err(format!("expected token:subject[:roles], got '{}'", redact(entry)));
        }
        let roles: Vec<String> = match parts.next() {
            Some(list) => list
                .split('+')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            None => vec![ADMIN_ROLE.to_string()],
        };
        Ok(Self {
            token: SecretString::from(token.to_string()),
            subject: subject.to_string(),
            roles,
        })
    }
}

/// Keep only the subject side of an entry for error messages.
fn redact(entry: &str) -> String {
    match entry.split_once(':') {
        Some((_, rest)) => format!("***:{rest}"),
        None => "***".to_string(),
    }
}

/// Identity provider backed by tokens from configuration.
pub struct StaticTokenIdentity {
    tokens: Vec<AdminToken>,
}

impl StaticTokenIdentity {
    pub fn new(tokens: Vec<AdminToken>) -> Self {
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl IdentityProvider for StaticTokenIdentity {
    fn identify(&self, bearer_token: &str) -> Option<CallerIdentity> {
        self.tokens
            .iter()
            .find(|t| t.token.expose_secret() == bearer_token)
            .map(|t| CallerIdentity {
                subject: t.subject.clone(),
                roles: t.roles.clone(),
            })
    }
}

/// Authorization failures on the admin surface.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Unknown bearer token")]
    UnknownToken,

    #[error("Caller {subject} lacks role {role}")]
    Forbidden { subject: String, role: String },
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::MissingToken | Self::UnknownToken => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
        };
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Resolve the caller and require `role`.
pub fn authorize(
    provider: &dyn IdentityProvider,
    headers: &HeaderMap,
    role: &str,
) -> Result<CallerIdentity, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    let caller = provider.identify(token).ok_or_else(|| {
        warn!("Rejected unknown bearer token");
        AuthError::UnknownToken
    })?;
    if !caller.has_role(role) {
        warn!(subject = %caller.subject, role, "Caller lacks required role");
        return Err(AuthError::Forbidden {
            subject: caller.subject,
            role: role.to_string(),
        });
    }
    Ok(caller)
}
