use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Public view of an account. Never carries the password hash or the
/// refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
}

/// Identity plus the refresh token currently registered for it.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub identity: Identity,
    pub refresh_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("identity store: {0}")]
pub struct StoreError(String);

impl StoreError {
    pub fn new(err: impl std::fmt::Display) -> Self {
        Self(err.to_string())
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, StoreError>;

    async fn find_session(&self, id: Uuid) -> Result<Option<SessionRecord>, StoreError>;

    /// Overwrites the stored refresh token. Returns `false` if the identity
    /// does not exist.
    async fn store_refresh_token(&self, id: Uuid, token: &str) -> Result<bool, StoreError>;

    /// Replaces the stored refresh token only if it still equals `expected`.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        next: &str,
    ) -> Result<bool, StoreError>;

    async fn clear_refresh_token(&self, id: Uuid) -> Result<(), StoreError>;
}
