//! Account lifecycle against the GoTrue auth endpoints.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use todo_sync_app::{Identity, SessionHandle, SessionProvider, SessionState};
use todo_sync_core::UserId;
use tokio::sync::watch::Receiver;
use tracing::{info, warn};

use crate::error::RemoteError;
use crate::{Backend, send, send_json};

/// Email and password for the password grant.
#[derive(Clone, Serialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// Bundle a login.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Login email.
    pub fn email(&self) -> &str {
        &self.email
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The account is active and the user is now signed in.
    SignedIn(Identity),
    /// The account awaits email confirmation; nobody is signed in.
    ConfirmationPending(Identity),
}

#[derive(Debug, Deserialize)]
struct UserRow {
    id: UserId,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserRow> for Identity {
    fn from(row: UserRow) -> Self {
        let identity = Self::new(row.id);
        match row.email {
            Some(email) => identity.with_email(email),
            None => identity,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserRow,
}

/// Sign-up answers with a session when confirmation is off, and with the
/// bare user otherwise.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserRow),
}

/// Auth client that publishes every identity change to a [`SessionHandle`].
#[derive(Clone)]
pub struct AuthClient {
    backend: Backend,
    session: SessionHandle,
}

impl AuthClient {
    /// Client sharing `backend`'s token; starts in [`SessionState::Loading`].
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            session: SessionHandle::new(),
        }
    }

    /// The handle subscribers follow.
    pub const fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Register an account.
    ///
    /// # Errors
    /// Returns the backend's rejection (duplicate email, weak password, ...)
    /// or a transport error. A session still loading settles as anonymous.
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<SignUpOutcome, RemoteError> {
        let request = self
            .backend
            .request(Method::POST, &self.backend.auth_url("signup"))
            .json(credentials);
        match send_json::<SignUpResponse>(request).await {
            Ok(SignUpResponse::Session(token)) => {
                let identity = self.establish(token);
                Ok(SignUpOutcome::SignedIn(identity))
            }
            Ok(SignUpResponse::User(user)) => {
                info!(email = credentials.email(), "sign-up awaiting confirmation");
                self.settle_anonymous();
                Ok(SignUpOutcome::ConfirmationPending(user.into()))
            }
            Err(err) => {
                self.settle_anonymous();
                Err(err)
            }
        }
    }

    /// Password sign-in.
    ///
    /// # Errors
    /// Returns the backend's rejection or a transport error; any previous
    /// sign-in stays in place.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, RemoteError> {
        let request = self
            .backend
            .request(Method::POST, &self.backend.auth_url("token?grant_type=password"))
            .json(credentials);
        match send_json::<TokenResponse>(request).await {
            Ok(token) => Ok(self.establish(token)),
            Err(err) => {
                warn!(email = credentials.email(), error = %err, "sign-in failed");
                self.settle_anonymous();
                Err(err)
            }
        }
    }

    /// Resume a session from a previously issued access token.
    ///
    /// Publishes [`SessionState::Loading`] while the token is checked.
    ///
    /// # Errors
    /// Returns the backend's rejection of the token; the session then
    /// becomes anonymous.
    pub async fn restore(&self, access_token: impl Into<String>) -> Result<Identity, RemoteError> {
        self.session.begin_restore();
        self.backend.set_access_token(Some(access_token.into()));
        let request = self.backend.request(Method::GET, &self.backend.auth_url("user"));
        match send_json::<UserRow>(request).await {
            Ok(user) => {
                let identity = Identity::from(user);
                info!(user = %identity.user_id, "session restored");
                self.session.sign_in(identity.clone());
                Ok(identity)
            }
            Err(err) => {
                warn!(error = %err, "stored session rejected");
                self.backend.set_access_token(None);
                self.session.sign_out();
                Err(err)
            }
        }
    }

    /// End the session.
    ///
    /// The local session is cleared even when the logout call fails.
    ///
    /// # Errors
    /// Returns the logout call's failure after the local sign-out.
    pub async fn sign_out(&self) -> Result<(), RemoteError> {
        let outcome = match self.backend.authed(Method::POST, &self.backend.auth_url("logout")) {
            Ok(request) => send(request).await.map(drop),
            Err(RemoteError::NotSignedIn) => Ok(()),
            Err(err) => Err(err),
        };
        self.backend.set_access_token(None);
        self.session.sign_out();
        info!("signed out");
        outcome
    }

    fn establish(&self, token: TokenResponse) -> Identity {
        self.backend.set_access_token(Some(token.access_token));
        let identity = Identity::from(token.user);
        info!(user = %identity.user_id, "signed in");
        self.session.sign_in(identity.clone());
        identity
    }

    /// Leave `Loading` for `Anonymous` if no identity was ever resolved.
    fn settle_anonymous(&self) {
        if self.session.state() == SessionState::Loading {
            self.session.sign_out();
        }
    }
}

impl SessionProvider for AuthClient {
    fn current(&self) -> Option<Identity> {
        self.session.current()
    }

    fn subscribe(&self) -> Receiver<SessionState> {
        self.session.subscribe()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use reqwest::Client;

    const USER: &str = "7f3c2d9e-1b2a-4c3d-8e4f-5a6b7c8d9e0f";

    #[test]
    fn token_response_decodes_identity() {
        let body = format!(
            r#"{{"access_token":"jwt","token_type":"bearer","expires_in":3600,"refresh_token":"r","user":{{"id":"{USER}","email":"me@example.invalid","role":"authenticated"}}}}"#
        );
        let token: TokenResponse = serde_json::from_str(&body).expect("decode token");
        let identity = Identity::from(token.user);
        assert_eq!(identity.user_id.to_string(), USER);
        assert_eq!(identity.email.as_deref(), Some("me@example.invalid"));
    }

    #[test]
    fn sign_up_response_distinguishes_confirmation() {
        let pending = format!(r#"{{"id":"{USER}","email":"me@example.invalid","confirmation_sent_at":"2024-01-01T00:00:00Z"}}"#);
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(&pending).expect("decode"),
            SignUpResponse::User(_)
        ));

        let active = format!(r#"{{"access_token":"jwt","user":{{"id":"{USER}"}}}}"#);
        assert!(matches!(
            serde_json::from_str::<SignUpResponse>(&active).expect("decode"),
            SignUpResponse::Session(_)
        ));
    }

    #[test]
    fn establishing_a_session_publishes_identity_and_token() {
        let backend = Backend::with_client(Client::new(), "https://demo.supabase.co", "anon");
        let auth = AuthClient::new(backend.clone());
        let mut rx = auth.subscribe();
        assert_eq!(*rx.borrow_and_update(), SessionState::Loading);

        let user: UserRow = serde_json::from_str(&format!(r#"{{"id":"{USER}"}}"#)).expect("decode user");
        let identity = auth.establish(TokenResponse {
            access_token: "jwt".to_owned(),
            user,
        });

        assert!(backend.is_signed_in());
        assert_eq!(auth.current(), Some(identity));
        assert!(rx.has_changed().unwrap_or(false));
    }

    #[test]
    fn settle_only_resolves_loading() {
        let backend = Backend::with_client(Client::new(), "https://demo.supabase.co", "anon");
        let auth = AuthClient::new(backend);
        auth.settle_anonymous();
        assert_eq!(auth.session().state(), SessionState::Anonymous);

        let identity = Identity::new(UserId::random());
        auth.session().sign_in(identity.clone());
        auth.settle_anonymous();
        assert_eq!(auth.current(), Some(identity));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials::new("me@example.invalid", "hunter2");
        let debug = format!("{creds:?}");
        assert!(debug.contains("me@example.invalid"));
        assert!(!debug.contains("hunter2"));
    }
}
