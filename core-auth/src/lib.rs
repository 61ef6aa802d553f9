//! # Authentication Module
//!
//! Session lookup for the offline music core.
//!
//! ## Overview
//!
//! The core never runs a sign-in flow. It only asks a [`SessionProvider`]
//! which user is currently signed in, and refuses to download or sync when
//! the answer is "nobody". Hosts either implement the trait over their own
//! auth SDK or feed an [`InMemorySessionProvider`].

pub mod error;
pub mod session;
pub mod types;

pub use bridge_traits::UserId;
pub use error::{AuthError, Result};
pub use session::{InMemorySessionProvider, SessionProvider};
pub use types::SessionUser;
