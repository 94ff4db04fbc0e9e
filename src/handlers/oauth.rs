//! Authorization-code flow for third-party clients.
//!
//! 1. `authorize` - validate the client and render the sign-in page
//! 2. `oauth_complete` - after login, mint a code and hand back the redirect
//! 3. `oauth_token` - the client trades the code for the user's identity

use super::shared_types::require_session;
use crate::app_state::AppState;
use crate::authorization::{build_error_redirect_url, build_redirect_url};
use crate::error::AuthError;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    // ---
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    // ---
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    // ---
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    // ---
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    // ---
    pub username: String,
    pub user_id: Uuid,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// HTML rendering
// ============================================================================

fn escape_html(text: &str) -> String {
    // ---
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// JSON safe to inline in a `<script>` element.
fn script_json(value: &serde_json::Value) -> String {
    // ---
    value
        .to_string()
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

fn error_page(status: StatusCode, message: &str) -> Response {
    // ---
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Authorization error</title></head>
<body>
  <h1>Authorization error</h1>
  <p>{}</p>
  <p>The application that sent you here is misconfigured. You have not been redirected.</p>
</body>
</html>
"#,
        escape_html(message)
    );
    (status, Html(body)).into_response()
}

fn sign_in_page(client_name: &str, auth_data: &serde_json::Value) -> Response {
    // ---
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in to {name}</title></head>
<body>
  <h1>Sign in to {name}</h1>
  <p>Use your passkey to continue to <strong>{name}</strong>.</p>
  <button id="signin">Sign in with a passkey</button>
  <p id="status" role="status"></p>
  <script id="auth-data" type="application/json">{data}</script>
  <script>
    const authData = JSON.parse(document.getElementById("auth-data").textContent);
    const status = document.getElementById("status");
    const b64 = (s) => Uint8Array.from(atob(s.replace(/-/g, "+").replace(/_/g, "/")), (c) => c.charCodeAt(0));
    const enc = (buf) => btoa(String.fromCharCode(...new Uint8Array(buf)))
      .replace(/\+/g, "-").replace(/\//g, "_").replace(/=+$/, "");

    document.getElementById("signin").addEventListener("click", async () => {{
      try {{
        const begin = await (await fetch("/login/begin", {{ method: "POST" }})).json();
        const pk = begin.publicKey;
        pk.challenge = b64(pk.challenge);
        (pk.allowCredentials || []).forEach((c) => (c.id = b64(c.id)));
        const cred = await navigator.credentials.get({{ publicKey: pk }});
        const assertion = {{
          id: cred.id,
          rawId: enc(cred.rawId),
          type: cred.type,
          response: {{
            authenticatorData: enc(cred.response.authenticatorData),
            clientDataJSON: enc(cred.response.clientDataJSON),
            signature: enc(cred.response.signature),
            userHandle: cred.response.userHandle ? enc(cred.response.userHandle) : null,
          }},
          extensions: {{}},
        }};
        const finish = await fetch("/login/finish?sessionId=" + encodeURIComponent(begin.sessionId), {{
          method: "POST",
          headers: {{ "Content-Type": "application/json" }},
          body: JSON.stringify(assertion),
        }});
        if (!finish.ok) throw new Error((await finish.json()).error);
        const session = await finish.json();
        const complete = await fetch("/oauth/complete", {{
          method: "POST",
          headers: {{ "Content-Type": "application/json", "X-Session-ID": session.sessionId }},
          body: JSON.stringify(authData),
        }});
        if (!complete.ok) throw new Error((await complete.json()).error);
        window.location = (await complete.json()).redirect_url;
      }} catch (err) {{
        status.textContent = "Sign-in failed: " + err.message;
      }}
    }});
  </script>
</body>
</html>
"#,
        name = escape_html(client_name),
        data = script_json(auth_data),
    );
    Html(body).into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /authorize?client_id=&redirect_uri=&state=
///
/// A bad client or redirect URI renders an error page and never redirects:
/// bouncing the browser to an unverified URI is exactly what this guards
/// against. Failures after validation redirect back with `error` params.
pub async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    // ---
    let client_name = match state
        .authorization()
        .validate_request(&query.client_id, &query.redirect_uri)
    {
        Ok(client) => client.name.clone(),
        Err(e) => return error_page(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let request = match state.authorization().create_request(
        &query.client_id,
        &query.redirect_uri,
        &query.state,
    ) {
        Ok(request) => request,
        Err(e) => {
            tracing::error!("Failed to create authorization request: {}", e);
            let url = build_error_redirect_url(
                &query.redirect_uri,
                "server_error",
                "failed to create authorization request",
                &query.state,
            );
            return (StatusCode::FOUND, [(header::LOCATION, url)]).into_response();
        }
    };

    let auth_data = serde_json::json!({
        "client_id": request.client_id,
        "redirect_uri": request.redirect_uri,
        "state": request.state,
        "expires_at": request.expires_at,
    });

    sign_in_page(&client_name, &auth_data)
}

/// POST /oauth/complete
///
/// Requires an authenticated session. Issues a code for the session's owner
/// and returns the URL the browser should be sent to.
pub async fn oauth_complete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, AuthError> {
    // ---
    let caller = require_session(&state, &headers).await?;

    let request = state
        .authorization()
        .create_request(&req.client_id, &req.redirect_uri, &req.state)?;
    let user = state.orchestrator().user(&caller.username).await?;

    let code = state.authorization().issue_code(&request, &user).await?;
    state.metrics().record_code_issued();

    Ok(Json(CompleteResponse {
        redirect_url: build_redirect_url(&code.redirect_uri, &code.code, &code.state),
    }))
}

/// POST /oauth/token
///
/// Exchanges a code, once, for the identity it was issued to. The client id
/// and redirect URI must match those used at issuance.
pub async fn oauth_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    // ---
    let result = state
        .authorization()
        .exchange(&req.code, &req.client_id, &req.redirect_uri)
        .await;
    state.metrics().record_code_exchanged(result.is_ok());

    let code = result?;
    Ok(Json(TokenResponse {
        username: code.username,
        user_id: code.user_id,
        client_id: code.client_id,
        expires_at: code.expires_at,
    }))
}
