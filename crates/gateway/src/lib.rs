//! HTTP gateway for the workshop portal.
//!
//! Serves the embedded portal pages, the password login, the AI routes
//! (agent, chat, image) and the workshop module content. Everything except
//! `/health` sits behind the password gate.
//!
//! Built on Axum.

pub mod api;
pub mod auth;
pub mod error;
pub mod frontend;
pub mod workshop;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{Router, extract::State, middleware, response::Json, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use workshop_config::{AgentConfig, AppConfig};
use workshop_core::knowledge::{KnowledgeSource, ModuleCatalog};
use workshop_core::provider::SamplingParams;
use workshop_core::tool::ToolRegistry;
use workshop_knowledge::{KnowledgeStore, WorkshopDirectory};
use workshop_providers::ProviderSet;

pub use auth::PortalAuth;
pub use error::ApiError;

/// Shared application state for the gateway.
pub struct AppState {
    pub auth: PortalAuth,
    pub providers: ProviderSet,
    pub tools: Arc<ToolRegistry>,
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub modules: Arc<dyn ModuleCatalog>,
    pub agent: AgentConfig,
    pub started_at: DateTime<Utc>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Assemble state from already-built collaborators.
    pub fn new(
        config: &AppConfig,
        providers: ProviderSet,
        knowledge: Arc<dyn KnowledgeSource>,
        modules: Arc<dyn ModuleCatalog>,
    ) -> workshop_core::Result<Self> {
        let tools = workshop_tools::default_registry(knowledge.clone(), modules.clone())?;
        Ok(Self {
            auth: PortalAuth::new(config.portal.password.clone(), config.portal.secure_cookie),
            providers,
            tools: Arc::new(tools),
            knowledge,
            modules,
            agent: config.agent.clone(),
            started_at: Utc::now(),
        })
    }

    /// Build every subsystem named in `config`.
    pub fn from_config(config: &AppConfig) -> workshop_core::Result<Self> {
        let providers = ProviderSet::build_from_config(config)?;
        let knowledge = Arc::new(KnowledgeStore::new(&config.portal.knowledge_base_path));
        let modules = Arc::new(WorkshopDirectory::new(&config.portal.workshop_dir));
        Self::new(config, providers, knowledge, modules)
    }

    /// Sampling used when a request leaves temperature or top_p out.
    pub fn default_sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.agent.default_temperature,
            top_p: self.agent.default_top_p,
        }
    }
}

/// Build the full router.
///
/// Layers applied:
/// - Password gate on everything except `/health`
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let gated = Router::new()
        .merge(auth::auth_router())
        .merge(api::api_router())
        .merge(workshop::workshop_router())
        .with_state(state.clone())
        .merge(frontend::frontend_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_password));

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .merge(gated)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let state = Arc::new(AppState::from_config(&config)?);
    if !state.auth.is_configured() {
        tracing::warn!("Portal password is not configured; every page and API route is locked");
    }
    let app = build_router(state);

    info!(addr = %addr, "Workshop portal starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    started_at: DateTime<Utc>,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
    })
}
