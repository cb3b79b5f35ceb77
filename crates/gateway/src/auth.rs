//! Shared-password gate.
//!
//! A successful login sets the `workshop-auth` cookie to the SHA-256 hex
//! digest of the trimmed portal password. The middleware compares that
//! cookie against the digest, which is computed once per process.

use std::sync::OnceLock;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum::routing::post;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::SharedState;

pub const AUTH_COOKIE: &str = "workshop-auth";

const LOGIN_ERROR_MESSAGE: &str = "Invalid password. Please try again.";

/// Paths reachable without a session cookie.
const PUBLIC_PATH_PREFIXES: [&str; 2] = ["/login", "/api/auth/login"];

/// The configured portal password and its memoized digest.
pub struct PortalAuth {
    password: Option<String>,
    digest: OnceLock<Option<String>>,
    secure_cookie: bool,
}

impl PortalAuth {
    pub fn new(password: Option<String>, secure_cookie: bool) -> Self {
        Self {
            password,
            digest: OnceLock::new(),
            secure_cookie,
        }
    }

    /// True when a non-blank password is set.
    pub fn is_configured(&self) -> bool {
        self.expected_digest().is_some()
    }

    /// The digest a valid session cookie carries.
    pub fn expected_digest(&self) -> Option<&str> {
        self.digest
            .get_or_init(|| {
                self.password
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(hash_password)
            })
            .as_deref()
    }

    /// Check a login candidate. Surrounding whitespace is ignored.
    pub fn verify(&self, candidate: &str) -> bool {
        match self.expected_digest() {
            Some(expected) => hash_password(candidate.trim()) == expected,
            None => false,
        }
    }

    fn session_cookie(&self, digest: &str) -> Cookie<'static> {
        Cookie::build((AUTH_COOKIE, digest.to_string()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookie)
            .max_age(time::Duration::hours(12))
            .path("/")
            .build()
    }
}

pub fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// An already-expired session cookie, sent whether or not the request
/// carried one.
fn expired_cookie() -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, ""))
        .http_only(true)
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

pub fn auth_router() -> Router<SharedState> {
    Router::new().route("/api/auth/login", post(login_handler))
}

/// POST /api/auth/login `{password}`
async fn login_handler(State(state): State<SharedState>, jar: CookieJar, body: Bytes) -> Response {
    let Some(expected) = state.auth.expected_digest() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "Portal password not configured."})),
        )
            .into_response();
    };

    // Unparseable bodies count as an empty password.
    let provided = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("password").and_then(|p| p.as_str()).map(str::to_owned))
        .unwrap_or_default();

    let rejected = || Json(json!({"error": LOGIN_ERROR_MESSAGE}));

    if provided.trim().is_empty() {
        return (StatusCode::UNAUTHORIZED, rejected()).into_response();
    }

    if !state.auth.verify(&provided) {
        warn!("Portal login rejected");
        return (StatusCode::UNAUTHORIZED, jar.add(expired_cookie()), rejected()).into_response();
    }

    info!("Portal login accepted");
    let jar = jar.add(state.auth.session_cookie(expected));
    (jar, Json(json!({"success": true}))).into_response()
}

/// The password gate, applied to every route except `/health`.
pub async fn require_password(
    State(state): State<SharedState>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let is_api = path.starts_with("/api/");

    let Some(expected) = state.auth.expected_digest() else {
        if is_api {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "Portal password is not configured."})),
            )
                .into_response();
        }
        if path.starts_with("/login") {
            return no_store(next.run(req).await);
        }
        return no_store(Redirect::temporary("/login").into_response());
    };

    if PUBLIC_PATH_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return next.run(req).await;
    }

    let stale = match jar.get(AUTH_COOKIE).map(|cookie| cookie.value()) {
        Some(value) if value == expected => return next.run(req).await,
        Some(_) => true,
        None => false,
    };
    debug!(path = %path, stale, "Rejecting unauthenticated request");

    let jar = if stale { jar.add(expired_cookie()) } else { jar };

    if is_api {
        return (
            StatusCode::UNAUTHORIZED,
            jar,
            Json(json!({"error": "Authentication required."})),
        )
            .into_response();
    }

    let location = if accepts_html(&req) {
        format!("/login?returnUrl={}", urlencoding::encode(&return_url(&req)))
    } else {
        "/login".to_string()
    };
    no_store((jar, Redirect::temporary(&location)).into_response())
}

fn accepts_html(req: &Request) -> bool {
    req.headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

/// Path plus query of the rejected request; `/` for anything that is not a
/// plain local path.
fn return_url(req: &Request) -> String {
    let path = req.uri().path();
    if !path.starts_with('/') || path.starts_with("//") {
        return "/".to_string();
    }
    match req.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    }
}

fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
