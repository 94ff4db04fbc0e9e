//! WebAuthn configuration and the ceremony engine built on webauthn-rs.
//!
//! This module provides a factory function for creating a WebAuthn instance
//! configured for the application's relying party identity.

mod engine;

pub use engine::WebauthnEngine;

use std::str::FromStr;

use crate::config::WebAuthnConfig;
use anyhow::Result;
use reqwest::Url;
use webauthn_rs::{Webauthn, WebauthnBuilder};

/// Creates a configured WebAuthn instance from application config.
///
/// # Parameters
/// - `config`: WebAuthn configuration (RP ID, origin, display name)
///
/// # Errors
/// Returns an error if the origin is not a URL or does not belong to the
/// RP ID's effective domain.
pub fn create_webauthn(config: &WebAuthnConfig) -> Result<Webauthn> {
    // ---
    tracing::debug!("Creating with config:{:?}", config);

    let url = Url::from_str(config.origin.as_str())?;
    let builder = WebauthnBuilder::new(&config.rp_id, &url)?;
    let webauthn = builder.rp_name(&config.rp_name).build()?;

    Ok(webauthn)
}
