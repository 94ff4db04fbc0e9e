// Test helpers are intentionally partially used
#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, Utc};
use passkey_auth::domain::{
    ClientRegistry, Credential, MetricsPtr, Session, SessionStorage, User, UserStorage,
};
use passkey_auth::{
    build_router, build_state, create_noop_metrics, generate_token, LifetimeConfig,
    MemoryStorage, WebAuthnConfig,
};
use reqwest::{redirect, Client};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;

pub const TEST_ORIGIN: &str = "http://localhost:8443";

static INIT: Once = Once::new();

// ============================================================================
// Test Setup
// ============================================================================

/// Route server logs through the test harness once per binary; `RUST_LOG`
/// raises the level when debugging a failure.
pub fn init_tracing() {
    // ---
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn webauthn_config() -> WebAuthnConfig {
    // ---
    WebAuthnConfig {
        rp_id: "localhost".to_string(),
        rp_name: "Test App".to_string(),
        origin: TEST_ORIGIN.to_string(),
    }
}

/// A server on an ephemeral port over one in-memory store. The store is
/// exposed so tests can seed users and sessions directly.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub client: Client,
    pub storage: Arc<MemoryStorage>,
}

impl TestServer {
    // ---
    pub async fn new() -> Self {
        // ---
        Self::with_metrics(create_noop_metrics().expect("noop metrics")).await
    }

    pub async fn with_metrics(metrics: MetricsPtr) -> Self {
        // ---
        init_tracing();
        let storage = Arc::new(MemoryStorage::new());
        let state = build_state(
            storage.clone(),
            storage.clone(),
            &webauthn_config(),
            &LifetimeConfig::default(),
            ClientRegistry::with_defaults(),
            metrics,
        )
        .expect("Should be able to build application state");

        let app = build_router(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start
        sleep(Duration::from_millis(50)).await;

        // Redirects are asserted on, never followed
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            addr,
            client,
            storage,
        }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }

    /// Store a user owning one placeholder credential per id.
    pub async fn seed_user(&self, username: &str, credential_ids: &[&[u8]]) -> User {
        // ---
        let mut user = User::new(username);
        for id in credential_ids {
            user.credentials
                .push(Credential::new(id.to_vec(), b"placeholder".to_vec(), 0));
        }
        self.storage.save(&user).await.expect("Failed to save user");
        user
    }

    /// Store a live login session for `user` and return its id.
    pub async fn seed_session(&self, user: &User) -> String {
        // ---
        let now = Utc::now();
        let session = Session {
            id: generate_token(),
            username: user.name.clone(),
            user_id: user.id,
            created_at: now,
            expires_at: now + ChronoDuration::hours(1),
            grant: None,
        };
        self.storage
            .save_session(&session)
            .await
            .expect("Failed to save session");
        session.id
    }

    /// Seeded user with one credential and a session; returns the session id.
    pub async fn signed_in(&self, username: &str) -> (User, String) {
        // ---
        let user = self.seed_user(username, &[b"credential-1"]).await;
        let session_id = self.seed_session(&user).await;
        (user, session_id)
    }
}
