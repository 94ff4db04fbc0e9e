// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod health;
mod metrics;
mod oauth;
mod root;
mod sessions;
mod shared_types;
mod webauthn_authenticate;
mod webauthn_credentials;
mod webauthn_register;

// Core handlers
pub use health::health_check;
pub use metrics::{metrics_handler, track_metrics};
pub use root::root_handler;

// WebAuthn registration handlers
pub use webauthn_register::{register_begin, register_finish};

// WebAuthn authentication handlers
pub use webauthn_authenticate::{login_begin, login_finish};

// Session handlers
pub use sessions::{delete_session, list_sessions, logout, validate_session};

// WebAuthn credential management handlers
pub use webauthn_credentials::{delete_credential, list_credentials};

// Authorization-code flow
pub use oauth::{authorize, oauth_complete, oauth_token};

// Session lookup shared with other crates' middleware
pub use shared_types::{session_id_from_headers, SESSION_COOKIE, SESSION_HEADER};
