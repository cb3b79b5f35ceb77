//! Workshop module content routes.

use axum::Router;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use serde::Serialize;

use workshop_core::knowledge::{DEFAULT_MODULE_TITLE, ModuleListing};

use crate::SharedState;
use crate::error::ApiError;

pub fn workshop_router() -> Router<SharedState> {
    Router::new()
        .route("/api/workshop", get(list_handler))
        .route("/api/workshop/{slug}", get(module_handler))
}

#[derive(Debug, Serialize)]
pub struct ModuleList {
    pub modules: Vec<ModuleListing>,
}

#[derive(Debug, Serialize)]
pub struct ModuleContent {
    pub content: String,
}

/// GET /api/workshop
async fn list_handler(State(state): State<SharedState>) -> Result<Json<ModuleList>, ApiError> {
    let modules = state.modules.list_modules().await.map_err(ApiError::knowledge)?;
    let modules = modules.iter().map(|m| m.listing(DEFAULT_MODULE_TITLE)).collect();
    Ok(Json(ModuleList { modules }))
}

/// GET /api/workshop/{slug}
async fn module_handler(
    State(state): State<SharedState>,
    Path(slug): Path<String>,
) -> Result<Json<ModuleContent>, ApiError> {
    let content = state.modules.read_module(&slug).await.map_err(ApiError::knowledge)?;
    Ok(Json(ModuleContent { content }))
}
