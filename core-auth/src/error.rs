use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session for user {expected} required, but {actual} is signed in")]
    SessionMismatch { expected: String, actual: String },

    #[error("Session provider unavailable: {0}")]
    ProviderUnavailable(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
