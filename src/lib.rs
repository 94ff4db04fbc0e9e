// src/lib.rs
use anyhow::Result;
use authorization::AuthorizationCodeService;
use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use ceremony::CredentialOrchestrator;
use domain::{ClientRegistry, MetricsPtr, SessionStoragePtr, UserStoragePtr};
use handlers::*;
use infrastructure::storage::{FilesystemUserStorage, ObjectStoreUserStorage, RedisSessionStorage};
use std::sync::Arc;

// Public exports (visible outside this module)
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod authorization;
mod ceremony;
mod config;
mod error;
mod handlers;
mod infrastructure;
mod session;

// Hoist up only the public symbol(s)
pub use app_state::AppState;
pub use error::{AuthError, ErrorResponse};
pub use handlers::{session_id_from_headers, SESSION_COOKIE, SESSION_HEADER};
pub use infrastructure::storage::{MemoryStorage, SweepHandle};
pub use session::{generate_token, SessionInfo};

pub use config::*;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_noop_metrics, // ---
    create_prom_metrics,
    create_webauthn,
};

/// A ready-to-serve application.
///
/// `sweeper` is only present with in-memory session storage; stop it after
/// the server has drained.
pub struct App {
    pub router: Router,
    pub sweeper: Option<SweepHandle>,
}

/// Build the application from configuration: choose the metrics and storage
/// backends, wire the services and mount every route.
pub async fn create_app(config: &AppConfig) -> Result<App> {
    // ---
    let metrics = match config.metrics.metrics_type {
        MetricsType::Prometheus => create_prom_metrics()?,
        MetricsType::Noop => create_noop_metrics()?,
    };

    // One in-memory instance serves both roles when both are memory-backed.
    let mut memory: Option<Arc<MemoryStorage>> = None;
    let mut shared_memory =
        || Arc::clone(memory.get_or_insert_with(|| Arc::new(MemoryStorage::new())));

    let users: UserStoragePtr = match config.storage.mode {
        UserStorageMode::Filesystem => {
            Arc::new(FilesystemUserStorage::new(&config.storage.data_path).await?)
        }
        UserStorageMode::S3 => Arc::new(ObjectStoreUserStorage::s3(&config.storage.s3)?),
        UserStorageMode::Memory => {
            tracing::warn!("Using in-memory user storage; users are lost on restart");
            let storage: UserStoragePtr = shared_memory();
            storage
        }
    };

    let (sessions, sweeper): (SessionStoragePtr, Option<SweepHandle>) = match config.session.mode
    {
        SessionStorageMode::Redis => {
            let client = redis::Client::open(config.session.redis_url.as_str())?;
            tracing::info!("Using Redis session storage");
            let storage: SessionStoragePtr = Arc::new(RedisSessionStorage::new(client));
            (storage, None)
        }
        SessionStorageMode::Memory => {
            let memory = shared_memory();
            let sweeper = memory.start_sweeper(config.session.sweep_interval);
            let storage: SessionStoragePtr = memory;
            (storage, Some(sweeper))
        }
    };

    let state = build_state(
        users,
        sessions,
        &config.webauthn,
        &config.lifetimes,
        config.oauth.clients.clone(),
        metrics,
    )?;

    Ok(App {
        router: build_router(state),
        sweeper,
    })
}

/// Wire the three services over the given backends.
pub fn build_state(
    users: UserStoragePtr,
    sessions: SessionStoragePtr,
    webauthn: &WebAuthnConfig,
    lifetimes: &LifetimeConfig,
    clients: ClientRegistry,
    metrics: MetricsPtr,
) -> Result<AppState> {
    // ---
    let engine = Arc::new(infrastructure::WebauthnEngine::new(create_webauthn(webauthn)?));

    let orchestrator = CredentialOrchestrator::new(
        Arc::clone(&users),
        Arc::clone(&sessions),
        engine,
        chrono::Duration::from_std(lifetimes.ceremony_ttl)?,
    );
    let validator = session::SessionValidator::new(
        Arc::clone(&sessions),
        chrono::Duration::from_std(lifetimes.session_ttl)?,
    );
    let authorization = AuthorizationCodeService::new(
        Arc::new(clients),
        Arc::clone(&sessions),
        chrono::Duration::from_std(lifetimes.code_ttl)?,
    );

    Ok(AppState::new(
        users,
        sessions,
        orchestrator,
        validator,
        authorization,
        metrics,
    ))
}

/// Mount every route on the given state.
pub fn build_router(state: AppState) -> Router {
    // ---
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Passkey ceremonies
        .route("/register/begin", post(register_begin))
        .route("/register/finish", post(register_finish))
        .route("/login/begin", post(login_begin))
        .route("/login/finish", post(login_finish))
        // Sessions
        .route("/validate/{session_id}", get(validate_session))
        .route("/logout", post(logout))
        // Authorization-code flow
        .route("/authorize", get(authorize))
        .route("/oauth/complete", post(oauth_complete))
        .route("/oauth/token", post(oauth_token))
        // Self-service
        .nest(
            "/user",
            Router::new()
                .route("/credentials", get(list_credentials))
                .route("/credentials/{id}", delete(delete_credential))
                .route("/sessions", get(list_sessions))
                .route("/sessions/{id}", delete(delete_session)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), track_metrics))
        .with_state(state)
}
