/**
 * AUTH - Gate on the mutating routes
 *
 * A request is privileged when it carries either:
 * - header `x-api-key` equal to FLEET_API_KEY, or
 * - a live `fleet_session` cookie issued by POST /login (FLEET_ADMIN_PASSWORD).
 *
 * With neither secret configured every privileged request is refused.
 * Sessions live in memory and expire after `auth.session_ttl_minutes`.
 */

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const SESSION_COOKIE: &str = "fleet_session";
pub const API_KEY_ENV: &str = "FLEET_API_KEY";
pub const ADMIN_PASSWORD_ENV: &str = "FLEET_ADMIN_PASSWORD";

#[derive(Clone)]
pub struct Auth {
    api_key: Option<String>,
    admin_password: Option<String>,
    sessions: Arc<Mutex<HashMap<String, OffsetDateTime>>>,
    ttl: Duration,
}

fn secret(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl Auth {
    pub fn new(api_key: Option<String>, admin_password: Option<String>, ttl: Duration) -> Self {
        Self {
            api_key: secret(api_key),
            admin_password: secret(admin_password),
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    pub fn from_env(ttl: Duration) -> Self {
        let auth = Self::new(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(ADMIN_PASSWORD_ENV).ok(),
            ttl,
        );
        if !auth.is_configured() {
            warn!("SECURITY: neither {API_KEY_ENV} nor {ADMIN_PASSWORD_ENV} set - privileged access denied");
        }
        auth
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.admin_password.is_some()
    }

    /// Opens a session for the right password and returns its token.
    pub fn login(&self, password: &str) -> Option<String> {
        let expected = self.admin_password.as_deref()?;
        if password != expected {
            warn!("login refused");
            return None;
        }
        let token = uuid::Uuid::new_v4().to_string();
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock();
        sessions.retain(|_, expires| *expires > now);
        sessions.insert(token.clone(), now + self.ttl);
        info!(active = sessions.len(), "session opened");
        Some(token)
    }

    pub fn logout(&self, headers: &HeaderMap) -> bool {
        match session_token(headers) {
            Some(token) => self.sessions.lock().remove(token).is_some(),
            None => false,
        }
    }

    pub fn is_privileged(&self, headers: &HeaderMap) -> bool {
        let key_ok = match (&self.api_key, headers.get(API_KEY_HEADER)) {
            (Some(expected), Some(given)) => given.to_str().map(|v| v == expected).unwrap_or(false),
            _ => false,
        };
        key_ok || session_token(headers).is_some_and(|token| self.session_alive(token))
    }

    fn session_alive(&self, token: &str) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get(token) {
            Some(expires) if *expires > OffsetDateTime::now_utc() => true,
            Some(_) => {
                sessions.remove(token);
                false
            }
            None => false,
        }
    }
}

pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; HttpOnly; Path=/; SameSite=Strict; Max-Age={}",
        ttl.whole_seconds()
    )
}

pub fn expired_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; Path=/; SameSite=Strict; Max-Age=0")
}

pub async fn require_privilege(
    State(auth): State<Auth>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if !auth.is_privileged(req.headers()) {
        warn!(path = %req.uri().path(), "unauthorized request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_api_key() {
        let auth = Auth::new(Some("k".into()), None, Duration::minutes(5));
        assert!(auth.is_privileged(&headers(&[("x-api-key", "k")])));
        assert!(!auth.is_privileged(&headers(&[("x-api-key", "nope")])));
        assert!(!auth.is_privileged(&HeaderMap::new()));
    }

    #[test]
    fn test_unconfigured_denies_everything() {
        let auth = Auth::new(Some(String::new()), None, Duration::minutes(5));
        assert!(!auth.is_configured());
        assert!(!auth.is_privileged(&headers(&[("x-api-key", "")])));
        assert!(auth.login("").is_none());
    }

    #[test]
    fn test_login_session_and_logout() {
        let auth = Auth::new(None, Some("secret".into()), Duration::minutes(5));
        assert!(auth.login("wrong").is_none());

        let token = auth.login("secret").unwrap();
        let cookie = format!("theme=dark; {SESSION_COOKIE}={token}");
        let with_cookie = headers(&[("cookie", cookie.as_str())]);
        assert_eq!(session_token(&with_cookie), Some(token.as_str()));
        assert!(auth.is_privileged(&with_cookie));

        assert!(auth.logout(&with_cookie));
        assert!(!auth.is_privileged(&with_cookie));
        assert!(!auth.logout(&with_cookie));
    }

    #[test]
    fn test_expired_session_is_rejected() {
        let auth = Auth::new(None, Some("secret".into()), Duration::seconds(-1));
        let token = auth.login("secret").unwrap();
        let cookie = format!("{SESSION_COOKIE}={token}");
        assert!(!auth.is_privileged(&headers(&[("cookie", cookie.as_str())])));
    }

    #[test]
    fn test_cookie_strings() {
        let cookie = session_cookie("abc", Duration::minutes(1));
        assert!(cookie.starts_with("fleet_session=abc;"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(expired_cookie().contains("Max-Age=0"));
    }
}
