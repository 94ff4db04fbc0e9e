//! Authorization-code hand-off to registered third-party clients.
//!
//! A client sends the user to `/authorize`; once the user has logged in a
//! short-lived code is issued and the browser is redirected back. The client
//! then trades the code for the user's identity, exactly once.

use crate::domain::{
    AuthorizationCode, AuthorizationRequest, Client, ClientRegistry, CodeGrant, Session,
    SessionStoragePtr, StorageError, User, AUTH_CODE_PREFIX,
};
use crate::error::AuthError;
use crate::session::{generate_token, redact};
use chrono::{Duration, Utc};
use reqwest::Url;
use std::sync::Arc;

pub struct AuthorizationCodeService {
    // ---
    clients: Arc<ClientRegistry>,
    sessions: SessionStoragePtr,
    code_ttl: Duration,
}

impl AuthorizationCodeService {
    // ---
    pub fn new(
        clients: Arc<ClientRegistry>,
        sessions: SessionStoragePtr,
        code_ttl: Duration,
    ) -> Self {
        // ---
        Self {
            clients,
            sessions,
            code_ttl,
        }
    }

    /// The client must be registered and `redirect_uri` must equal one of its
    /// URIs byte for byte.
    pub fn validate_request(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<&Client, AuthError> {
        // ---
        let client = self.clients.get(client_id).ok_or_else(|| {
            tracing::warn!("Unknown client_id: {:?}", client_id);
            AuthError::InvalidClient
        })?;

        if !client.allows_redirect(redirect_uri) {
            tracing::warn!(
                "Unregistered redirect_uri {:?} for client {}",
                redirect_uri,
                client_id
            );
            return Err(AuthError::InvalidRedirectUri);
        }

        Ok(client)
    }

    /// Validates and stamps a new authorization attempt. `state` is carried
    /// through untouched.
    pub fn create_request(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: &str,
    ) -> Result<AuthorizationRequest, AuthError> {
        // ---
        self.validate_request(client_id, redirect_uri)?;

        let now = Utc::now();
        Ok(AuthorizationRequest {
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            state: state.to_string(),
            created_at: now,
            expires_at: now + self.code_ttl,
        })
    }

    /// Issues a single-use code for `user`, bound to the request's client
    /// and redirect URI.
    pub async fn issue_code(
        &self,
        request: &AuthorizationRequest,
        user: &User,
    ) -> Result<AuthorizationCode, AuthError> {
        // ---
        if Utc::now() > request.expires_at {
            return Err(AuthError::Expired("authorization request".to_string()));
        }

        let now = Utc::now();
        let code = generate_token();
        let record = Session {
            id: format!("{AUTH_CODE_PREFIX}{code}"),
            username: user.name.clone(),
            user_id: user.id,
            created_at: now,
            expires_at: now + self.code_ttl,
            grant: Some(CodeGrant {
                client_id: request.client_id.clone(),
                redirect_uri: request.redirect_uri.clone(),
                state: request.state.clone(),
            }),
        };
        self.sessions.save_session(&record).await?;

        tracing::info!(
            "Issued authorization code {}... for user '{}' to client {}",
            redact(&code),
            user.name,
            request.client_id
        );

        Ok(AuthorizationCode {
            code,
            client_id: request.client_id.clone(),
            redirect_uri: request.redirect_uri.clone(),
            state: request.state.clone(),
            username: record.username,
            user_id: record.user_id,
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
    }

    /// Redeems a code. The record is consumed atomically before its binding
    /// is checked, so a code presented with the wrong client is burnt too.
    pub async fn exchange(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<AuthorizationCode, AuthError> {
        // ---
        self.validate_request(client_id, redirect_uri)?;

        if code.is_empty() || !code.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AuthError::InvalidGrant);
        }

        let record = match self.sessions.take_session(&format!("{AUTH_CODE_PREFIX}{code}")).await {
            Ok(record) => record,
            Err(StorageError::NotFound) => {
                tracing::warn!(
                    "Exchange of unknown or spent code {}... by {}",
                    redact(code),
                    client_id
                );
                return Err(AuthError::InvalidGrant);
            }
            Err(e) => return Err(e.into()),
        };

        let grant = record.grant.ok_or(AuthError::InvalidGrant)?;
        if grant.client_id != client_id || grant.redirect_uri != redirect_uri {
            tracing::warn!(
                "Code {}... issued to {} presented by {} / {:?}",
                redact(code),
                grant.client_id,
                client_id,
                redirect_uri
            );
            return Err(AuthError::InvalidGrant);
        }

        tracing::info!(
            "Exchanged authorization code for user '{}' (client {})",
            record.username,
            client_id
        );

        Ok(AuthorizationCode {
            code: code.to_string(),
            client_id: grant.client_id,
            redirect_uri: grant.redirect_uri,
            state: grant.state,
            username: record.username,
            user_id: record.user_id,
            created_at: record.created_at,
            expires_at: record.expires_at,
        })
    }
}

/// Sets `params` on the query of `redirect_uri`, replacing any pair with the
/// same key already there. Empty values are skipped.
fn append_query(redirect_uri: &str, params: &[(&str, &str)]) -> String {
    // ---
    let Ok(mut url) = Url::parse(redirect_uri) else {
        return redirect_uri.to_string();
    };

    let params: Vec<(&str, &str)> = params
        .iter()
        .copied()
        .filter(|(_, v)| !v.is_empty())
        .collect();
    if params.is_empty() {
        return url.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !params.iter().any(|(key, _)| k == key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(&kept)
        .extend_pairs(&params);
    url.to_string()
}

/// `redirect_uri?code=..&state=..`; `state` only when non-empty.
pub fn build_redirect_url(redirect_uri: &str, code: &str, state: &str) -> String {
    // ---
    append_query(redirect_uri, &[("code", code), ("state", state)])
}

pub fn build_error_redirect_url(
    redirect_uri: &str,
    error: &str,
    description: &str,
    state: &str,
) -> String {
    // ---
    append_query(
        redirect_uri,
        &[
            ("error", error),
            ("error_description", description),
            ("state", state),
        ],
    )
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::SessionStorage;
    use crate::infrastructure::storage::MemoryStorage;

    const CALLBACK: &str = "http://localhost:3000/callback";

    fn service_with_ttl(ttl: Duration) -> (Arc<MemoryStorage>, AuthorizationCodeService) {
        // ---
        let storage = Arc::new(MemoryStorage::new());
        let service = AuthorizationCodeService::new(
            Arc::new(ClientRegistry::with_defaults()),
            storage.clone(),
            ttl,
        );
        (storage, service)
    }

    fn service() -> (Arc<MemoryStorage>, AuthorizationCodeService) {
        // ---
        service_with_ttl(Duration::minutes(10))
    }

    async fn issue(service: &AuthorizationCodeService, user: &User) -> AuthorizationCode {
        // ---
        let request = service.create_request("demo-app", CALLBACK, "xyz123").unwrap();
        service.issue_code(&request, user).await.unwrap()
    }

    #[test]
    fn redirect_uri_must_match_exactly() {
        // ---
        let (_storage, service) = service();
        assert!(service.validate_request("demo-app", CALLBACK).is_ok());

        for variant in [
            "http://localhost:3000/callback/",
            "https://localhost:3000/callback/x",
            "http://localhost:3001/callback",
            "http://localhost:3000/Callback",
            "http://localhost:3000/callback?x=1",
            "http://evil.example/callback",
        ] {
            assert!(
                matches!(
                    service.validate_request("demo-app", variant),
                    Err(AuthError::InvalidRedirectUri)
                ),
                "{variant}"
            );
        }
    }

    #[test]
    fn unknown_client_is_rejected() {
        // ---
        let (_storage, service) = service();
        assert!(matches!(
            service.create_request("nope", CALLBACK, ""),
            Err(AuthError::InvalidClient)
        ));
    }

    #[tokio::test]
    async fn code_exchanges_once() {
        // ---
        let (_storage, service) = service();
        let user = User::new("alice");
        let issued = issue(&service, &user).await;

        assert_eq!(issued.code.len(), 64);

        let exchanged = service.exchange(&issued.code, "demo-app", CALLBACK).await.unwrap();
        assert_eq!(exchanged.username, "alice");
        assert_eq!(exchanged.user_id, user.id);
        assert_eq!(exchanged.client_id, "demo-app");
        assert_eq!(exchanged.state, "xyz123");
        assert_eq!(exchanged.expires_at, issued.expires_at);

        let again = service.exchange(&issued.code, "demo-app", CALLBACK).await;
        assert!(matches!(again, Err(AuthError::InvalidGrant)));
    }

    #[tokio::test]
    async fn concurrent_exchanges_have_one_winner() {
        // ---
        let (_storage, service) = service();
        let service = Arc::new(service);
        let issued = issue(&service, &User::new("alice")).await;

        let attempts = (0..16).map(|_| {
            let service = Arc::clone(&service);
            let code = issued.code.clone();
            tokio::spawn(async move { service.exchange(&code, "demo-app", CALLBACK).await.is_ok() })
        });
        let results = futures::future::join_all(attempts).await;
        let winners = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn code_bound_to_issuing_client_and_redirect() {
        // ---
        let (_storage, service) = service();
        let user = User::new("alice");

        // Registered for demo-app, but not the URI the code was issued for.
        let issued = issue(&service, &user).await;
        let other_uri = "http://localhost:8080/callback";
        assert!(matches!(
            service.exchange(&issued.code, "demo-app", other_uri).await,
            Err(AuthError::InvalidGrant)
        ));

        let issued = issue(&service, &user).await;
        assert!(matches!(
            service
                .exchange(&issued.code, "test-app", "http://localhost:3001/callback")
                .await,
            Err(AuthError::InvalidGrant)
        ));
    }

    #[tokio::test]
    async fn expired_code_fails() {
        // ---
        let (storage, service) = service();
        let issued = issue(&service, &User::new("alice")).await;

        let key = format!("{AUTH_CODE_PREFIX}{}", issued.code);
        let mut record = storage.get_session(&key).await.unwrap();
        record.created_at -= Duration::minutes(11);
        record.expires_at -= Duration::minutes(11);
        storage.save_session(&record).await.unwrap();

        assert!(matches!(
            service.exchange(&issued.code, "demo-app", CALLBACK).await,
            Err(AuthError::InvalidGrant)
        ));
    }

    #[tokio::test]
    async fn expired_request_cannot_issue() {
        // ---
        let (_storage, service) = service_with_ttl(Duration::seconds(-1));
        let request = service.create_request("demo-app", CALLBACK, "").unwrap();

        let err = service.issue_code(&request, &User::new("alice")).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired(_)));
    }

    #[tokio::test]
    async fn codes_do_not_show_up_as_sessions() {
        // ---
        let (storage, service) = service();
        issue(&service, &User::new("alice")).await;

        assert!(storage.list_sessions_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_code_is_invalid_grant() {
        // ---
        let (_storage, service) = service();
        for code in ["", "not-hex", "../../session"] {
            assert!(matches!(
                service.exchange(code, "demo-app", CALLBACK).await,
                Err(AuthError::InvalidGrant)
            ));
        }
    }

    #[test]
    fn redirect_urls_echo_state_only_when_present() {
        // ---
        assert_eq!(
            build_redirect_url(CALLBACK, "abc", "xyz123"),
            "http://localhost:3000/callback?code=abc&state=xyz123"
        );
        assert_eq!(
            build_redirect_url(CALLBACK, "abc", ""),
            "http://localhost:3000/callback?code=abc"
        );
        assert_eq!(
            build_redirect_url("https://app.example/cb?tenant=7", "abc", ""),
            "https://app.example/cb?tenant=7&code=abc"
        );
    }

    #[test]
    fn redirect_params_replace_registered_ones() {
        // ---
        let registered = "https://app.example/cb?code=old&state=x&keep=1";
        assert_eq!(
            build_redirect_url(registered, "abc", "xyz"),
            "https://app.example/cb?keep=1&code=abc&state=xyz"
        );
        // An empty state leaves the registered one alone.
        assert_eq!(
            build_redirect_url(registered, "abc", ""),
            "https://app.example/cb?state=x&keep=1&code=abc"
        );
        assert_eq!(
            build_error_redirect_url(registered, "access_denied", "", "s1"),
            "https://app.example/cb?code=old&keep=1&error=access_denied&state=s1"
        );
    }

    #[test]
    fn error_redirect_encodes_description() {
        // ---
        assert_eq!(
            build_error_redirect_url(CALLBACK, "server_error", "try again later", "s1"),
            "http://localhost:3000/callback?error=server_error&error_description=try+again+later&state=s1"
        );
    }
}
