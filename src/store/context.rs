//! Ambient request context: who is asking.
//!
//! Session- and user-scoped cache accesses read the current session id and
//! user identity from a tokio task-local installed at the request boundary:
//!
//! ```rust
//! # use munin::{ScopeContext, UserIdentity};
//! # async fn handle() {}
//! # async fn serve() {
//! let ctx = ScopeContext::new()
//!     .with_session("session-1")
//!     .with_user(UserIdentity::named("alice"));
//! ctx.scope(handle()).await;
//! # }
//! ```
//!
//! Outside of a scope there is no context and scoped accesses fail with
//! [`MuninError::MissingScopeContext`](crate::MuninError::MissingScopeContext).

use std::future::Future;

use serde::{Deserialize, Serialize};

tokio::task_local! {
    static SCOPE_CONTEXT: ScopeContext;
}

/// Identity of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub identity_id: Option<String>,
    pub identity_name: String,
    #[serde(default)]
    pub identity_email: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserIdentity {
    /// Identity known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            identity_name: name.into(),
            ..Self::default()
        }
    }

    /// Set the stable identity id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.identity_id = Some(id.into());
        self
    }

    /// Set the user's email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.identity_email = Some(email.into());
        self
    }

    /// Key used to scope user caches: the id when known, else the name.
    pub fn scope_key(&self) -> &str {
        self.identity_id.as_deref().unwrap_or(&self.identity_name)
    }
}

/// Session id and user identity of the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeContext {
    pub session_id: Option<String>,
    pub user: Option<UserIdentity>,
}

impl ScopeContext {
    /// Create a context with no session and no user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session id.
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach an authenticated user.
    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }

    /// Run `fut` with this context installed. The previous context (if any)
    /// is restored when `fut` completes.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        SCOPE_CONTEXT.scope(self, fut).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope).
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        SCOPE_CONTEXT.sync_scope(self, f)
    }

    /// Context of the calling task, if one is installed.
    pub fn current() -> Option<ScopeContext> {
        SCOPE_CONTEXT.try_with(Clone::clone).ok()
    }

    pub(crate) fn current_session_id() -> Option<String> {
        SCOPE_CONTEXT
            .try_with(|ctx| ctx.session_id.clone())
            .ok()
            .flatten()
    }

    pub(crate) fn current_user_key() -> Option<String> {
        SCOPE_CONTEXT
            .try_with(|ctx| ctx.user.as_ref().map(|u| u.scope_key().to_string()))
            .ok()
            .flatten()
    }
}
