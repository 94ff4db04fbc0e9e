use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Passkey Authentication Service
Version: {version}

Available endpoints:
  - POST   /register/begin?username=   - Start passkey registration
  - POST   /register/finish?username=  - Complete passkey registration
  - POST   /login/begin                - Start discoverable (username-less) login
  - POST   /login/finish?sessionId=    - Complete login, returns a session id
  - GET    /validate/{{sessionId}}       - Validate a session
  - POST   /logout                     - End the current session
  - GET    /user/credentials           - List your passkeys
  - DELETE /user/credentials/{{id}}      - Remove a passkey (not the last one)
  - GET    /user/sessions              - List your sessions
  - DELETE /user/sessions/{{id}}         - Revoke one of your sessions
  - GET    /authorize                  - Start the authorization-code flow
  - POST   /oauth/complete             - Issue a code after login
  - POST   /oauth/token                - Exchange a code for the user's identity
  - GET    /health                     - Light health check
  - GET    /health?mode=full           - Full health check (includes storage backends)
  - GET    /metrics                    - Prometheus metrics
"#
    )
}
