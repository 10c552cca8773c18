//! Cookie-backed caller sessions.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::Response,
};
use cardlink_core::{ServerConfig, SessionId};
use std::convert::Infallible;

/// The browser session behind a request.
///
/// Reuses the session cookie when present, otherwise issues a fresh token
/// that [`CallerSession::attach`] hands back to the browser.
#[derive(Debug, Clone)]
pub struct CallerSession {
    pub id: SessionId,
    issued: bool,
}

impl CallerSession {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match session_cookie(headers) {
            Some(token) => Self {
                id: SessionId::new(token),
                issued: false,
            },
            None => Self {
                id: SessionId::new(uuid::Uuid::new_v4().to_string()),
                issued: true,
            },
        }
    }

    /// Whether this request started a new session.
    pub fn is_new(&self) -> bool {
        self.issued
    }

    /// Add a `Set-Cookie` header for a newly issued session.
    pub fn attach(&self, response: &mut Response) {
        if !self.issued {
            return;
        }
        let cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            ServerConfig::SESSION_COOKIE,
            self.id
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ServerConfig::SESSION_COOKIE)
        .map(|(_, token)| token.trim())
        .filter(|token| {
            !token.is_empty()
                && token.len() <= 64
                && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
        .map(String::from)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
