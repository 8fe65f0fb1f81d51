use crate::store::StoreError;

/// Failures surfaced by [`crate::SessionService`].
///
/// Token problems are deliberately collapsed into `Unauthorized`; callers
/// never learn which check rejected a token.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("session failure: {0}")]
    Internal(String),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Internal(err.to_string())
    }
}
