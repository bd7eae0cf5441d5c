//! Rapport: a follow graph with public and private accounts, plus
//! one-to-one messaging over HTTP and a realtime WebSocket channel.
//!
//! Layers, top to bottom:
//!
//! - `api`: Axum handlers, including the realtime socket
//! - `realtime`: presence registry and event routing
//! - `service`: relationship mutations, the messaging gate, message log,
//!   conversation aggregation
//! - `data`: SQLite persistence via sqlx
//!
//! `auth`, `config`, `error` and `metrics` are shared by all layers.

pub mod api;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod realtime;
pub mod service;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Follow graph mutations and queries
    pub relationships: Arc<service::RelationshipService>,

    /// Messaging authorization
    pub gate: Arc<service::AuthorizationGate>,

    /// Gate-checked chat operations
    pub chat: Arc<service::ChatService>,

    /// Inbox aggregation
    pub conversations: Arc<service::ConversationService>,

    /// Online accounts (volatile)
    pub presence: Arc<realtime::PresenceRegistry>,

    /// Realtime event routing
    pub realtime: Arc<realtime::RealtimeEngine>,
}

impl AppState {
    /// Open (and migrate) the database, then wire services over it
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        let db = data::Database::connect_with_pool_size(
            &config.database.path,
            config.database.max_connections,
        )
        .await?;
        tracing::info!("Database connected");

        Ok(Self::with_database(config, Arc::new(db)))
    }

    /// Build state around an already connected database
    pub fn with_database(config: config::AppConfig, db: Arc<data::Database>) -> Self {
        let relationships = Arc::new(service::RelationshipService::new(db.clone()));
        let gate = Arc::new(service::AuthorizationGate::new(db.clone()));
        let log = Arc::new(service::MessageLog::new(
            db.clone(),
            config.chat.max_message_chars,
        ));
        let chat = Arc::new(service::ChatService::new(gate.clone(), log.clone()));
        let conversations = Arc::new(service::ConversationService::new(gate.clone(), log));

        let presence = Arc::new(realtime::PresenceRegistry::new());
        let realtime = Arc::new(realtime::RealtimeEngine::new(
            chat.clone(),
            presence.clone(),
            realtime::EngineLimits {
                max_connections: config.realtime.max_connections,
                outbound_buffer: config.realtime.outbound_buffer,
                preview_chars: config.chat.preview_chars,
            },
        ));

        tracing::info!(
            max_connections = config.realtime.max_connections,
            "Application state initialized"
        );

        Self {
            config: Arc::new(config),
            db,
            relationships,
            gate,
            chat,
            conversations,
            presence,
            realtime,
        }
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::{
        compression::CompressionLayer, limit::RequestBodyLimitLayer, trace::TraceLayer,
    };

    const MAX_BODY_BYTES: usize = 64 * 1024;

    let cors_layer = build_cors_layer(&state.config.server);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .nest("/api", api::api_router())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
        .merge(api::metrics_router())
}

fn build_cors_layer(server: &config::ServerConfig) -> tower_http::cors::CorsLayer {
    use axum::http::HeaderValue;
    use tower_http::cors::{Any, CorsLayer};

    if server.cors_origin.trim() == "*" {
        return CorsLayer::permissive();
    }

    match HeaderValue::from_str(server.cors_origin.trim()) {
        Ok(origin) => CorsLayer::new()
            .allow_origin([origin])
            .allow_methods(Any)
            .allow_headers(Any),
        Err(error) => {
            tracing::error!(
                %error,
                origin = %server.cors_origin,
                "Failed to parse CORS origin; denying cross-origin requests"
            );
            CorsLayer::new().allow_methods(Any).allow_headers(Any)
        }
    }
}

async fn health_check() -> &'static str {
    "OK"
}
