//! Token-based sessions: access/refresh token issuance, verification and
//! rotation on top of an [`IdentityStore`].
//!
//! Access tokens are stateless and only expire. Refresh tokens are only
//! valid while they match the single token stored against the identity, so
//! overwriting or clearing that value revokes them.

mod config;
mod error;
mod memory;
mod service;
mod store;
mod token;

pub use config::SessionConfig;
pub use error::SessionError;
pub use memory::MemoryStore;
pub use service::{SessionService, TokenPair};
pub use store::{Identity, IdentityStore, SessionRecord, StoreError};
pub use token::{AccessClaims, RefreshClaims, TokenKind};
