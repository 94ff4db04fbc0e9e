mod engine;
mod metrics;
mod oauth_models;
mod session_models;
mod storage;
mod webauthn_models;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr};

// Storage capabilities and their records
pub use session_models::{
    is_auth_code_id, CeremonySession, CodeGrant, Session, AUTH_CODE_PREFIX,
};
pub use storage::{
    SessionStorage, SessionStoragePtr, StorageError, StorageResult, UserStorage, UserStoragePtr,
};
pub use webauthn_models::{is_valid_username, Credential, User, MAX_USERNAME_LEN};

// Ceremony engine boundary
pub use engine::{CeremonyEngine, CeremonyEnginePtr, CeremonyStart, UserResolver};

// Authorization-code flow
pub use oauth_models::{AuthorizationCode, AuthorizationRequest, Client, ClientRegistry};

pub(crate) use session_models::is_past;
