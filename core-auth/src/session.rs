//! # Session Provider
//!
//! Answers "who is signed in right now?" for the offline cache.
//!
//! The host owns the actual sign-in flow. It either implements
//! [`SessionProvider`] over its auth SDK, or pushes state into an
//! [`InMemorySessionProvider`] whenever the user signs in or out.

use crate::error::{AuthError, Result};
use crate::types::SessionUser;
use async_trait::async_trait;
use bridge_traits::UserId;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Source of the current authenticated user
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The signed-in user, or `None` when signed out.
    ///
    /// Errors mean the provider could not answer; callers treat that the same
    /// as being signed out.
    async fn current_user(&self) -> Result<Option<SessionUser>>;

    /// Current user or [`AuthError::NotAuthenticated`]
    async fn require_user(&self) -> Result<SessionUser> {
        self.current_user()
            .await?
            .ok_or(AuthError::NotAuthenticated)
    }

    /// Ensure `expected` is the signed-in user
    async fn require_user_id(&self, expected: &UserId) -> Result<SessionUser> {
        let user = self.require_user().await?;
        if &user.id != expected {
            return Err(AuthError::SessionMismatch {
                expected: expected.to_string(),
                actual: user.id.to_string(),
            });
        }
        Ok(user)
    }
}

/// Session state pushed by the host
#[derive(Default)]
pub struct InMemorySessionProvider {
    current: RwLock<Option<SessionUser>>,
    event_bus: Option<Arc<EventBus>>,
}

impl InMemorySessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that starts signed in as `user`
    pub fn signed_in(user: SessionUser) -> Self {
        Self {
            current: RwLock::new(Some(user)),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Replace the current session. Signing in as the same user again is a no-op.
    pub fn sign_in(&self, user: SessionUser) {
        let previous = self.current.write().replace(user.clone());
        if previous.as_ref().map(|p| &p.id) == Some(&user.id) {
            debug!(user_id = %user.id, "Session refreshed for same user");
            return;
        }

        if let Some(previous) = previous {
            self.emit(AuthEvent::SignedOut {
                user_id: previous.id.to_string(),
            });
        }
        info!(user_id = %user.id, "User signed in");
        self.emit(AuthEvent::SignedIn {
            user_id: user.id.to_string(),
        });
    }

    /// Clear the session; returns the user that was signed in.
    pub fn sign_out(&self) -> Option<SessionUser> {
        let previous = self.current.write().take();
        if let Some(user) = &previous {
            info!(user_id = %user.id, "User signed out");
            self.emit(AuthEvent::SignedOut {
                user_id: user.id.to_string(),
            });
        }
        previous
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }
}

#[async_trait]
impl SessionProvider for InMemorySessionProvider {
    async fn current_user(&self) -> Result<Option<SessionUser>> {
        Ok(self.current.read().clone())
    }
}
