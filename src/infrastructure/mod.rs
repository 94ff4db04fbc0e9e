pub mod metrics;
pub mod storage;
pub mod webauthn;

// Re-export the factory functions for easy access
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use webauthn::{create_webauthn, WebauthnEngine};
