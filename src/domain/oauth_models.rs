use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A registered third-party application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    // ---
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Client {
    // ---
    pub fn new(id: &str, name: &str, redirect_uris: &[&str]) -> Self {
        // ---
        Self {
            id: id.to_string(),
            name: name.to_string(),
            redirect_uris: redirect_uris.iter().map(|u| u.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    /// Exact, byte-for-byte match against the pre-registered URIs.
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        // ---
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

/// Immutable set of clients, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ClientRegistry {
    // ---
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    // ---
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        // ---
        Self {
            clients: clients.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Development clients used when no registry file is configured.
    pub fn with_defaults() -> Self {
        // ---
        Self::new([
            Client::new(
                "demo-app",
                "Demo Application",
                &[
                    "http://localhost:3000/callback",
                    "https://localhost:3000/callback",
                    "http://localhost:8080/callback",
                    "https://localhost:8080/callback",
                ],
            ),
            Client::new(
                "test-app",
                "Test Application",
                &[
                    "http://localhost:3001/callback",
                    "https://localhost:3001/callback",
                ],
            ),
        ])
    }

    pub fn get(&self, client_id: &str) -> Option<&Client> {
        // ---
        self.clients.get(client_id)
    }

    pub fn len(&self) -> usize {
        // ---
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        // ---
        self.clients.is_empty()
    }
}

/// A validated, not yet authenticated authorization attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    // ---
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// An issued code, or the metadata returned when one is exchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    // ---
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
    pub username: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
