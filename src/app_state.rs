//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers via the `State` extractor. It bundles the storage backends,
//! the three core services and the metrics implementation.
//!
//! The state is cheaply cloneable (everything heavy sits behind an `Arc`)
//! so Axum can hand a copy to each request handler.

use crate::authorization::AuthorizationCodeService;
use crate::ceremony::CredentialOrchestrator;
use crate::domain::{MetricsPtr, SessionStoragePtr, UserStoragePtr};
use crate::session::SessionValidator;
use std::sync::Arc;

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the Dependency Injection container for the
/// application. It is built once at startup, never mutated, and cloned by
/// Axum for every incoming request.
///
/// # Design Principles
///
/// - **Dependency Inversion**: handlers and services depend on the storage
///   traits (`UserStorage`, `SessionStorage`), never on a concrete backend.
/// - **Immutable After Initialization**: the backends are chosen from
///   configuration once; the client registry is read-only for the process
///   lifetime.
#[derive(Clone)]
pub struct AppState {
    /// User records (filesystem, object store or memory).
    users: UserStoragePtr,

    /// Ceremonies, sessions and authorization codes (memory or Redis).
    sessions: SessionStoragePtr,

    /// Registration and login ceremonies.
    orchestrator: Arc<CredentialOrchestrator>,

    /// Session lookup, creation and revocation.
    validator: SessionValidator,

    /// Authorization-code issuance and exchange.
    authorization: Arc<AuthorizationCodeService>,

    /// Either Prometheus-backed or no-op.
    metrics: MetricsPtr,
}

impl AppState {
    // ---

    pub fn new(
        users: UserStoragePtr,
        sessions: SessionStoragePtr,
        orchestrator: CredentialOrchestrator,
        validator: SessionValidator,
        authorization: AuthorizationCodeService,
        metrics: MetricsPtr,
    ) -> Self {
        // ---
        AppState {
            users,
            sessions,
            orchestrator: Arc::new(orchestrator),
            validator,
            authorization: Arc::new(authorization),
            metrics,
        }
    }

    /// Get a reference to the user storage backend.
    pub fn users(&self) -> &UserStoragePtr {
        // ---
        &self.users
    }

    /// Get a reference to the session storage backend.
    pub fn sessions(&self) -> &SessionStoragePtr {
        // ---
        &self.sessions
    }

    pub fn orchestrator(&self) -> &CredentialOrchestrator {
        // ---
        &self.orchestrator
    }

    pub fn validator(&self) -> &SessionValidator {
        // ---
        &self.validator
    }

    pub fn authorization(&self) -> &AuthorizationCodeService {
        // ---
        &self.authorization
    }

    /// Get a reference to the metrics implementation.
    pub fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    // ---

    use super::*;
    use crate::domain::ClientRegistry;
    use crate::infrastructure::create_noop_metrics;
    use crate::infrastructure::storage::MemoryStorage;
    use crate::infrastructure::{create_webauthn, WebauthnEngine};
    use crate::config::WebAuthnConfig;
    use chrono::Duration;

    #[test]
    fn test_app_state_creation_and_clone() {
        // ---
        let storage = Arc::new(MemoryStorage::new());
        let webauthn = create_webauthn(&WebAuthnConfig {
            rp_id: "localhost".to_string(),
            rp_name: "Test App".to_string(),
            origin: "http://localhost:8443".to_string(),
        })
        .unwrap();

        let orchestrator = CredentialOrchestrator::new(
            storage.clone(),
            storage.clone(),
            Arc::new(WebauthnEngine::new(webauthn)),
            Duration::minutes(5),
        );
        let validator = SessionValidator::new(storage.clone(), Duration::hours(24));
        let authorization = AuthorizationCodeService::new(
            Arc::new(ClientRegistry::with_defaults()),
            storage.clone(),
            Duration::minutes(10),
        );

        let app_state = AppState::new(
            storage.clone(),
            storage,
            orchestrator,
            validator,
            authorization,
            create_noop_metrics().unwrap(),
        );
        let cloned = app_state.clone();

        // Clones share the same backends.
        assert!(Arc::ptr_eq(app_state.users(), cloned.users()));
        assert!(Arc::ptr_eq(app_state.sessions(), cloned.sessions()));
        assert!(app_state.metrics().render().is_empty());
    }
}
