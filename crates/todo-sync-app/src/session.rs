//! Identity observation and the auth gate state machine.

use serde::{Deserialize, Serialize};
use todo_sync_core::UserId;
use tokio::sync::watch;

/// Authenticated user context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id issued by the auth service.
    pub user_id: UserId,
    /// Account email, when known.
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    /// Identity with an id only.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self { user_id, email: None }
    }

    /// Attach an email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Where identity resolution currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// Resolution in flight (startup or session restore).
    #[default]
    Loading,
    /// No identity.
    Anonymous,
    /// A user is signed in.
    Authenticated(Identity),
}

impl SessionState {
    /// Identity when authenticated.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Loading | Self::Anonymous => None,
        }
    }

    /// True only in [`SessionState::Authenticated`].
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<Identity>> for SessionState {
    fn from(value: Option<Identity>) -> Self {
        value.map_or(Self::Anonymous, Self::Authenticated)
    }
}

/// How the store reacted to a session notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionTransition {
    /// Same state as before; nothing done.
    Unchanged,
    /// Identity resolution restarted; collection kept, mutations rejected.
    Restoring,
    /// An identity became available; the collection is (re)loaded.
    SignedIn,
    /// A different identity replaced the previous one; cleared then reloaded.
    SwitchedUser,
    /// Identity went away; the collection was cleared.
    SignedOut,
}

impl SessionTransition {
    /// Whether this transition is followed by exactly one load.
    #[must_use]
    pub const fn needs_load(self) -> bool {
        matches!(self, Self::SignedIn | Self::SwitchedUser)
    }
}

/// Classify a move from `previous` to `next`.
#[must_use]
pub fn classify(previous: &SessionState, next: &SessionState) -> SessionTransition {
    if previous == next {
        return SessionTransition::Unchanged;
    }
    match (previous, next) {
        (_, SessionState::Loading) => SessionTransition::Restoring,
        (SessionState::Anonymous, SessionState::Anonymous) => SessionTransition::Unchanged,
        (_, SessionState::Anonymous) => SessionTransition::SignedOut,
        (SessionState::Authenticated(before), SessionState::Authenticated(after)) => {
            if before.user_id == after.user_id {
                SessionTransition::Unchanged
            } else {
                SessionTransition::SwitchedUser
            }
        }
        (SessionState::Loading | SessionState::Anonymous, SessionState::Authenticated(_)) => {
            SessionTransition::SignedIn
        }
    }
}

/// Source of identity for the store.
///
/// Subscription first: the receiver from [`Self::subscribe`] already holds
/// the current state, so [`crate::TaskStore::start`] reads its initial
/// position from there and never calls [`Self::current`]. Change
/// notifications arrive through the same [`watch::Receiver`]; dropping it is
/// the unsubscription.
pub trait SessionProvider {
    /// Identity right now, if signed in. For front ends that need the user
    /// outside a store.
    fn current(&self) -> Option<Identity>;

    /// Subscribe to session changes. The receiver starts at the current state.
    fn subscribe(&self) -> watch::Receiver<SessionState>;
}

/// Channel-backed [`SessionProvider`] that auth front ends publish into.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: watch::Sender<SessionState>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    /// Start in [`SessionState::Loading`].
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SessionState::Loading);
        Self { sender }
    }

    /// Replace the session state and notify subscribers.
    pub fn publish(&self, state: SessionState) {
        self.sender.send_replace(state);
    }

    /// Publish an authenticated identity.
    pub fn sign_in(&self, identity: Identity) {
        self.publish(SessionState::Authenticated(identity));
    }

    /// Publish the anonymous state.
    pub fn sign_out(&self) {
        self.publish(SessionState::Anonymous);
    }

    /// Publish that identity is being resolved again.
    pub fn begin_restore(&self) {
        self.publish(SessionState::Loading);
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.sender.borrow().clone()
    }
}

impl SessionProvider for SessionHandle {
    fn current(&self) -> Option<Identity> {
        self.sender.borrow().identity().cloned()
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.sender.subscribe()
    }
}
