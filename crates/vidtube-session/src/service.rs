use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::store::{Identity, IdentityStore};
use crate::token::{self, AccessClaims, RefreshClaims, TokenKind};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, verifies, rotates and revokes session tokens.
pub struct SessionService {
    config: SessionConfig,
    store: Arc<dyn IdentityStore>,
}

impl SessionService {
    pub fn new(config: SessionConfig, store: Arc<dyn IdentityStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Mints a new token pair for `id` and registers the refresh token,
    /// replacing whatever session the identity had before.
    pub async fn issue(&self, id: Uuid) -> Result<TokenPair, SessionError> {
        let identity = self
            .store
            .find_identity(id)
            .await?
            .ok_or_else(|| SessionError::Internal(format!("identity {id} not found")))?;

        let pair = self.mint(&identity)?;
        if !self.store.store_refresh_token(id, &pair.refresh_token).await? {
            return Err(SessionError::Internal(format!(
                "identity {id} disappeared while storing refresh token"
            )));
        }

        tracing::debug!(user_id = %id, "issued session tokens");
        Ok(pair)
    }

    /// Resolves the identity behind an access token.
    pub async fn verify(&self, token: Option<&str>) -> Result<Identity, SessionError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::Unauthorized)?;

        let claims: AccessClaims = token::decode(token, &self.config.access_secret).map_err(|err| {
            tracing::debug!(%err, "access token rejected");
            SessionError::Unauthorized
        })?;
        if claims.typ != TokenKind::Access {
            return Err(SessionError::Unauthorized);
        }

        self.store
            .find_identity(claims.sub)
            .await?
            .ok_or(SessionError::Unauthorized)
    }

    /// Exchanges the current refresh token for a fresh pair. The presented
    /// token stops being valid once this returns `Ok`.
    pub async fn rotate(&self, token: Option<&str>) -> Result<TokenPair, SessionError> {
        let presented = token
            .filter(|t| !t.is_empty())
            .ok_or(SessionError::Unauthorized)?;

        let claims: RefreshClaims =
            token::decode(presented, &self.config.refresh_secret).map_err(|err| {
                tracing::debug!(%err, "refresh token rejected");
                SessionError::Unauthorized
            })?;
        if claims.typ != TokenKind::Refresh {
            return Err(SessionError::Unauthorized);
        }

        let record = self
            .store
            .find_session(claims.sub)
            .await?
            .ok_or(SessionError::Unauthorized)?;

        if record.refresh_token.as_deref() != Some(presented) {
            tracing::warn!(user_id = %claims.sub, "stale or revoked refresh token presented");
            return Err(SessionError::Unauthorized);
        }

        let pair = self.mint(&record.identity)?;
        let swapped = self
            .store
            .swap_refresh_token(claims.sub, presented, &pair.refresh_token)
            .await?;
        if !swapped {
            tracing::warn!(user_id = %claims.sub, "refresh token rotated concurrently");
            return Err(SessionError::Unauthorized);
        }

        tracing::debug!(user_id = %claims.sub, "rotated session tokens");
        Ok(pair)
    }

    /// Ends the session of `id`; its refresh token can no longer rotate.
    pub async fn revoke(&self, id: Uuid) -> Result<(), SessionError> {
        self.store.clear_refresh_token(id).await?;
        tracing::debug!(user_id = %id, "revoked session");
        Ok(())
    }

    fn mint(&self, identity: &Identity) -> Result<TokenPair, SessionError> {
        let now = OffsetDateTime::now_utc();
        let iat = now.unix_timestamp();
        let expiry = |ttl: time::Duration| {
            now.checked_add(ttl)
                .map(OffsetDateTime::unix_timestamp)
                .ok_or_else(|| SessionError::Internal(format!("token lifetime {ttl} out of range")))
        };

        let access = AccessClaims {
            sub: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            typ: TokenKind::Access,
            iat,
            exp: expiry(self.config.access_ttl)?,
        };
        let refresh = RefreshClaims {
            sub: identity.id,
            typ: TokenKind::Refresh,
            jti: Uuid::new_v4().to_string(),
            iat,
            exp: expiry(self.config.refresh_ttl)?,
        };

        let access_token = token::sign(&access, &self.config.access_secret)
            .map_err(|e| SessionError::Internal(format!("sign access token: {e}")))?;
        let refresh_token = token::sign(&refresh, &self.config.refresh_secret)
            .map_err(|e| SessionError::Internal(format!("sign refresh token: {e}")))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::{SessionRecord, StoreError};
    use async_trait::async_trait;
    use time::Duration;

    fn identity(name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            full_name: format!("{name} tester"),
        }
    }

    fn config() -> SessionConfig {
        SessionConfig::new("access-test-secret", "refresh-test-secret")
    }

    fn service_with(config: SessionConfig) -> (SessionService, Arc<MemoryStore>, Identity) {
        let store = Arc::new(MemoryStore::new());
        let who = identity("ada");
        store.insert(who.clone());
        (SessionService::new(config, store.clone()), store, who)
    }

    fn service() -> (SessionService, Arc<MemoryStore>, Identity) {
        service_with(config())
    }

    #[tokio::test]
    async fn issued_access_token_verifies_to_same_identity() {
        let (svc, _, who) = service();
        let pair = svc.issue(who.id).await.unwrap();
        let got = svc.verify(Some(&pair.access_token)).await.unwrap();
        assert_eq!(got, who);
    }

    #[tokio::test]
    async fn issue_registers_refresh_token() {
        let (svc, store, who) = service();
        let pair = svc.issue(who.id).await.unwrap();
        assert_eq!(store.refresh_token_of(who.id), Some(pair.refresh_token));
    }

    #[tokio::test]
    async fn issue_for_unknown_identity_is_internal() {
        let (svc, _, _) = service();
        let err = svc.issue(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SessionError::Internal(_)));
    }

    #[tokio::test]
    async fn second_login_invalidates_first_session() {
        let (svc, _, who) = service();
        let first = svc.issue(who.id).await.unwrap();
        let _second = svc.issue(who.id).await.unwrap();
        let err = svc.rotate(Some(&first.refresh_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn verify_without_token_is_unauthorized() {
        let (svc, _, _) = service();
        assert!(matches!(svc.verify(None).await, Err(SessionError::Unauthorized)));
        assert!(matches!(svc.verify(Some("")).await, Err(SessionError::Unauthorized)));
    }

    #[tokio::test]
    async fn verify_rejects_malformed_token() {
        let (svc, _, _) = service();
        let err = svc.verify(Some("definitely-not-a-jwt")).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn expired_access_token_is_unauthorized() {
        let (svc, _, who) = service_with(config().with_access_ttl(Duration::seconds(-120)));
        let pair = svc.issue(who.id).await.unwrap();
        let err = svc.verify(Some(&pair.access_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn refresh_token_is_not_an_access_token() {
        let (svc, _, who) = service();
        let pair = svc.issue(who.id).await.unwrap();
        let err = svc.verify(Some(&pair.refresh_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn access_token_cannot_rotate() {
        let (svc, _, who) = service();
        let pair = svc.issue(who.id).await.unwrap();
        let err = svc.rotate(Some(&pair.access_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn deleted_identity_is_unauthorized() {
        let (svc, store, who) = service();
        let pair = svc.issue(who.id).await.unwrap();
        store.remove(who.id);
        assert!(matches!(
            svc.verify(Some(&pair.access_token)).await,
            Err(SessionError::Unauthorized)
        ));
        assert!(matches!(
            svc.rotate(Some(&pair.refresh_token)).await,
            Err(SessionError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn rotation_scenario_rejects_replay() {
        let (svc, store, who) = service();
        let first = svc.issue(who.id).await.unwrap();

        let second = svc.rotate(Some(&first.refresh_token)).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(store.refresh_token_of(who.id), Some(second.refresh_token.clone()));
        assert_eq!(svc.verify(Some(&second.access_token)).await.unwrap(), who);

        let err = svc.rotate(Some(&first.refresh_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));

        // The replay attempt does not disturb the live session.
        assert!(svc.rotate(Some(&second.refresh_token)).await.is_ok());
    }

    #[tokio::test]
    async fn logout_revokes_refresh_token() {
        let (svc, store, who) = service();
        let pair = svc.issue(who.id).await.unwrap();
        svc.revoke(who.id).await.unwrap();
        assert_eq!(store.refresh_token_of(who.id), None);

        let err = svc.rotate(Some(&pair.refresh_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn expired_refresh_token_cannot_rotate() {
        let (svc, _, who) = service_with(config().with_refresh_ttl(Duration::seconds(-120)));
        let pair = svc.issue(who.id).await.unwrap();
        let err = svc.rotate(Some(&pair.refresh_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test]
    async fn refresh_token_signed_with_wrong_secret_is_rejected() {
        let (svc, store, who) = service();
        let (other, _, _) = service_with(SessionConfig::new("x", "y"));
        let forged = other.mint(&who).unwrap();
        // Even registered, a token under another secret must not verify.
        store.store_refresh_token(who.id, &forged.refresh_token).await.unwrap();
        let err = svc.rotate(Some(&forged.refresh_token)).await.unwrap_err();
        assert!(matches!(err, SessionError::Unauthorized));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_rotation_has_single_winner() {
        let (svc, _, who) = service();
        let svc = Arc::new(svc);
        let pair = svc.issue(who.id).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let svc = svc.clone();
            let token = pair.refresh_token.clone();
            handles.push(tokio::spawn(async move { svc.rotate(Some(&token)).await }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(SessionError::Unauthorized) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn unrepresentable_lifetime_is_internal_not_a_panic() {
        let (svc, store, who) = service_with(config().with_refresh_ttl(Duration::MAX));
        let err = svc.issue(who.id).await.unwrap_err();
        assert!(matches!(err, SessionError::Internal(_)));
        assert_eq!(store.refresh_token_of(who.id), None);
    }

    #[tokio::test]
    async fn longest_configured_lifetime_still_issues() {
        let config = SessionConfig::from_lookup(|key| {
            (key == "REFRESH_TOKEN_EXPIRY_SECS").then(|| i64::MAX.to_string())
        });
        let (svc, _, who) = service_with(config);
        let pair = svc.issue(who.id).await.unwrap();
        assert!(svc.rotate(Some(&pair.refresh_token)).await.is_ok());
    }

    struct BrokenStore;

    #[async_trait]
    impl IdentityStore for BrokenStore {
        async fn find_identity(&self, _: Uuid) -> Result<Option<Identity>, StoreError> {
            Err(StoreError::new("connection reset"))
        }
        async fn find_session(&self, _: Uuid) -> Result<Option<SessionRecord>, StoreError> {
            Err(StoreError::new("connection reset"))
        }
        async fn store_refresh_token(&self, _: Uuid, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::new("connection reset"))
        }
        async fn swap_refresh_token(&self, _: Uuid, _: &str, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::new("connection reset"))
        }
        async fn clear_refresh_token(&self, _: Uuid) -> Result<(), StoreError> {
            Err(StoreError::new("connection reset"))
        }
    }

    #[tokio::test]
    async fn store_failures_surface_as_internal() {
        let svc = SessionService::new(config(), Arc::new(BrokenStore));
        assert!(matches!(
            svc.issue(Uuid::new_v4()).await,
            Err(SessionError::Internal(_))
        ));
        assert!(matches!(
            svc.revoke(Uuid::new_v4()).await,
            Err(SessionError::Internal(_))
        ));
    }
}
