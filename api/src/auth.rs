//! Password login and sessions
//!
//! A single shared password protects the tree. Its PBKDF2 hash lives in the
//! store's app settings; until one is stored the configured default password
//! is accepted and saved on first use. Sessions are opaque tokens kept in
//! memory and carried in an HttpOnly cookie.

use axum::extract::{Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use familytree_databases::settings::PASSWORD_HASH_KEY;
use familytree_databases::FamilyStore;
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiState;
use crate::models::AuthConfig;

pub const SESSION_COOKIE: &str = "familytree_session";

/// Shortest accepted password, in characters
pub const MIN_PASSWORD_CHARS: usize = 4;

/// PHC string of a freshly salted PBKDF2-SHA256 hash
pub fn hash_password(password: &str, rounds: u32) -> anyhow::Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| anyhow::anyhow!("Failed to encode salt: {e}"))?;
    let params = Params {
        rounds,
        output_length: 32,
    };
    let hash = Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. Unparsable hashes never match.
pub fn verify_hash(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {e}");
            false
        }
    }
}

/// Store a new password hash
pub fn set_password(store: &FamilyStore, password: &str, rounds: u32) -> anyhow::Result<()> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(anyhow::anyhow!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        ));
    }
    let hash = hash_password(password, rounds)?;
    store.set_app_setting(PASSWORD_HASH_KEY, &hash, Utc::now())?;
    info!("Password updated");
    Ok(())
}

/// Check a login password. With no stored hash the default password is
/// accepted and becomes the stored one.
pub fn verify_password(
    store: &FamilyStore,
    config: &AuthConfig,
    password: &str,
) -> anyhow::Result<bool> {
    match store.app_setting(PASSWORD_HASH_KEY)? {
        Some(stored) => Ok(verify_hash(password, &stored)),
        None if password == config.default_password => {
            let hash = hash_password(password, config.hash_rounds)?;
            store.set_app_setting(PASSWORD_HASH_KEY, &hash, Utc::now())?;
            info!("Default password stored as initial password");
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Validate and store a password change
pub fn change_password(
    store: &FamilyStore,
    config: &AuthConfig,
    current: &str,
    new: &str,
) -> ApiResult<()> {
    if new.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::bad_request(format!(
            "The new password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    if !verify_password(store, config, current)? {
        return Err(ApiError::bad_request("The current password is incorrect"));
    }
    set_password(store, new, config.hash_rounds)?;
    Ok(())
}

/// In-memory session registry
pub struct SessionStore {
    sessions: DashMap<String, DateTime<Utc>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(session_days: i64) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::days(session_days.max(1)),
        }
    }

    /// Open a session and return its token. Expired sessions are dropped
    /// on the way.
    pub fn create(&self) -> String {
        let now = Utc::now();
        self.prune_expired(now);
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), now + self.ttl);
        debug!("Session opened ({} active)", self.sessions.len());
        token
    }

    pub fn is_valid(&self, token: &str) -> bool {
        let expires = self.sessions.get(token).map(|entry| *entry.value());
        match expires {
            Some(at) if at > Utc::now() => true,
            Some(_) => {
                self.sessions.remove(token);
                false
            }
            None => false,
        }
    }

    /// Forget every session that expired before `now`
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, expires| *expires > now);
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            debug!("Pruned {pruned} expired sessions");
        }
        pruned
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Session token from the request's cookies
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

pub fn is_authenticated(state: &ApiState, headers: &HeaderMap) -> bool {
    session_token(headers).is_some_and(|token| state.sessions.is_valid(&token))
}

/// `Set-Cookie` value opening a session
pub fn session_cookie(token: &str, ttl: Duration) -> ApiResult<HeaderValue> {
    let cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.num_seconds()
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Failed to build session cookie: {e}")))
}

/// `Set-Cookie` value ending a session
pub fn expired_cookie() -> HeaderValue {
    HeaderValue::from_static("familytree_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Reject requests without a valid session when login is required
pub async fn require_session(
    State(state): State<Arc<ApiState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.auth.required || is_authenticated(&state, request.headers()) {
        return next.run(request).await;
    }
    debug!("Rejected unauthenticated request to {}", request.uri().path());
    ApiError::Unauthorized("Login required".to_string()).into_response()
}

/// Attach a `Set-Cookie` header to a response
pub fn with_cookie(mut response: Response, cookie: HeaderValue) -> Response {
    response.headers_mut().append(SET_COOKIE, cookie);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST_ROUNDS: u32 = 1_000;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("titkos", FAST_ROUNDS).unwrap();
        assert!(hash.starts_with("$pbkdf2-sha256$"));
        assert!(verify_hash("titkos", &hash));
        assert!(!verify_hash("other", &hash));
        assert!(!verify_hash("titkos", "not-a-phc-string"));
    }

    #[test]
    fn test_default_password_is_stored_on_first_login() {
        let store = FamilyStore::open_in_memory().unwrap();
        let config = AuthConfig {
            hash_rounds: FAST_ROUNDS,
            ..AuthConfig::default()
        };
        assert!(!verify_password(&store, &config, "wrong").unwrap());
        assert!(verify_password(&store, &config, "familytree").unwrap());
        assert!(store.app_setting(PASSWORD_HASH_KEY).unwrap().is_some());
    }

    #[test]
    fn test_change_password() {
        let store = FamilyStore::open_in_memory().unwrap();
        let config = AuthConfig {
            hash_rounds: FAST_ROUNDS,
            ..AuthConfig::default()
        };
        assert!(change_password(&store, &config, "familytree", "abc").is_err());
        assert!(change_password(&store, &config, "nope", "abcd").is_err());
        change_password(&store, &config, "familytree", "abcd").unwrap();
        assert!(verify_password(&store, &config, "abcd").unwrap());
        assert!(!verify_password(&store, &config, "familytree").unwrap());
    }

    #[test]
    fn test_sessions() {
        let sessions = SessionStore::new(31);
        let token = sessions.create();
        assert!(sessions.is_valid(&token));
        assert!(!sessions.is_valid("forged"));
        sessions.revoke(&token);
        assert!(!sessions.is_valid(&token));
        assert_eq!(sessions.ttl().num_days(), 31);
    }

    #[test]
    fn test_expired_sessions_are_pruned_on_create() {
        let sessions = SessionStore::new(1);
        let past = Utc::now() - Duration::hours(1);
        sessions.sessions.insert("stale-1".to_string(), past);
        sessions.sessions.insert("stale-2".to_string(), past);
        assert_eq!(sessions.len(), 2);

        let token = sessions.create();
        assert_eq!(sessions.len(), 1);
        assert!(sessions.is_valid(&token));
        assert_eq!(sessions.prune_expired(Utc::now()), 0);
    }

    #[test]
    fn test_session_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; familytree_session=abc123; lang=hu"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
