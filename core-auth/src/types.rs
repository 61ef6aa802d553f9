use bridge_traits::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The user the host application currently has signed in.
///
/// Only the id takes part in offline-cache decisions; the e-mail is carried
/// for display and is masked in `Debug` output.
///
/// # Examples
///
/// ```
/// use core_auth::SessionUser;
///
/// let user = SessionUser::new("u1").with_email("ana@example.com");
/// assert_eq!(user.id.as_str(), "u1");
/// assert!(!format!("{:?}", user).contains("example.com"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Option<String>,
}

impl SessionUser {
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl fmt::Debug for SessionUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionUser")
            .field("id", &self.id)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
