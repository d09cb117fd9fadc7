//! HTTP surface
//!
//! - `POST /api/edition/*` - [`EditionService`] operations, JSON in and out
//! - `/edition/{session}/...` - [`SessionFileStore`] list/read/write/delete
//!
//! OPTIONS on any route, the file API capability probe included, is answered
//! by the CORS layer with the methods listed in [`ALLOWED_METHODS`].

mod edition;
mod error;
mod files;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::Config;
use crate::edition::EditionService;
use crate::error::Result;
use crate::session::{SessionFileStore, StaticTokenAuthorizer};

pub use edition::EditionRequest;
pub use error::ApiErr;
pub use files::WriteQuery;

/// Uploads are written in chunks but a single chunk may still be large
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<EditionService>,
    pub files: Arc<SessionFileStore>,
}

impl AppState {
    /// Wire the service and a file store authorizing with `config.api_token`
    pub fn from_config(config: &Config) -> Result<Self> {
        let service = EditionService::from_config(config)?;
        Ok(Self::with_service(service, &config.api_token))
    }

    pub fn with_service(service: EditionService, api_token: &str) -> Self {
        let files = SessionFileStore::new(
            service.workspace().clone(),
            Arc::new(StaticTokenAuthorizer::new(api_token)),
        );
        Self {
            service: Arc::new(service),
            files: Arc::new(files),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/checkoutEdition", post(edition::checkout_edition))
        .route("/prepareEdition", post(edition::prepare_edition))
        .route("/historyEdition", post(edition::history_edition))
        .route("/checkoutHashEdition", post(edition::checkout_hash_edition))
        .route("/getLastCommits", post(edition::last_commits))
        .route("/commitEdition", post(edition::commit_edition))
        .route("/publishEdition", post(edition::publish_edition))
        .route("/diffEdition", post(edition::diff_edition));

    let files = Router::new()
        .route("/{session}/list", get(files::list_files))
        .route(
            "/{session}/file/{*path}",
            get(files::read_file)
                .put(files::write_file)
                .delete(files::delete_file),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    Router::new()
        .nest("/api/edition", api)
        .nest("/edition", files)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(ALLOWED_METHODS)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind `config.bind` and serve until the process is stopped
pub async fn serve(config: &Config) -> Result<()> {
    config.ensure_directories()?;
    let state = AppState::from_config(config)?;

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("Listening on {}", config.bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
