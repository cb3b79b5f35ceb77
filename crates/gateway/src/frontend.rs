//! Embedded portal pages.
//!
//! The HTML files from `frontend/` are compiled into the binary using
//! `include_str!`, so the portal ships as a single binary.

use axum::{Router, response::Html, routing::get};

const INDEX_HTML: &str = include_str!("../../../frontend/index.html");
const LOGIN_HTML: &str = include_str!("../../../frontend/login.html");

/// Build a router that serves the embedded pages.
pub fn frontend_router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/login", get(login_handler))
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn login_handler() -> Html<&'static str> {
    Html(LOGIN_HTML)
}
