use std::fmt;

use time::Duration;

const DEV_ACCESS_SECRET: &str = "dev-insecure-access-secret";
const DEV_REFRESH_SECRET: &str = "dev-insecure-refresh-secret";

const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 10 * 24 * 60 * 60;
const MAX_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Signing secrets and lifetimes for both token kinds.
#[derive(Clone)]
pub struct SessionConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl SessionConfig {
    pub fn new(access_secret: impl Into<Vec<u8>>, refresh_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
        }
    }

    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    ///
    /// Keys: `ACCESS_TOKEN_SECRET`, `REFRESH_TOKEN_SECRET`,
    /// `ACCESS_TOKEN_EXPIRY_SECS`, `REFRESH_TOKEN_EXPIRY_SECS`. Lifetimes are
    /// capped at one year.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secret = |key: &str, fallback: &str| match lookup(key) {
            Some(v) if !v.trim().is_empty() => v.into_bytes(),
            _ => {
                tracing::warn!(key, "signing secret not set, using insecure development value");
                fallback.as_bytes().to_vec()
            }
        };
        let ttl = |key: &str, fallback: i64| {
            let secs = lookup(key)
                .and_then(|v| v.trim().parse::<i64>().ok())
                .filter(|v| *v > 0)
                .map(|v| v.clamp(1, MAX_TTL_SECS))
                .unwrap_or(fallback);
            Duration::seconds(secs)
        };

        Self {
            access_secret: secret("ACCESS_TOKEN_SECRET", DEV_ACCESS_SECRET),
            refresh_secret: secret("REFRESH_TOKEN_SECRET", DEV_REFRESH_SECRET),
            access_ttl: ttl("ACCESS_TOKEN_EXPIRY_SECS", DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: ttl("REFRESH_TOKEN_EXPIRY_SECS", DEFAULT_REFRESH_TTL_SECS),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = SessionConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.access_secret, DEV_ACCESS_SECRET.as_bytes());
        assert_eq!(cfg.refresh_secret, DEV_REFRESH_SECRET.as_bytes());
        assert_eq!(cfg.access_ttl, Duration::minutes(15));
        assert_eq!(cfg.refresh_ttl, Duration::days(10));
    }

    #[test]
    fn values_are_read_from_lookup() {
        let cfg = SessionConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_SECRET", "a-secret"),
            ("REFRESH_TOKEN_SECRET", "r-secret"),
            ("ACCESS_TOKEN_EXPIRY_SECS", "60"),
            ("REFRESH_TOKEN_EXPIRY_SECS", "3600"),
        ]));
        assert_eq!(cfg.access_secret, b"a-secret");
        assert_eq!(cfg.refresh_secret, b"r-secret");
        assert_eq!(cfg.access_ttl, Duration::seconds(60));
        assert_eq!(cfg.refresh_ttl, Duration::hours(1));
    }

    #[test]
    fn invalid_ttls_fall_back_to_defaults() {
        let cfg = SessionConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_EXPIRY_SECS", "soon"),
            ("REFRESH_TOKEN_EXPIRY_SECS", "-5"),
        ]));
        assert_eq!(cfg.access_ttl, Duration::seconds(DEFAULT_ACCESS_TTL_SECS));
        assert_eq!(cfg.refresh_ttl, Duration::seconds(DEFAULT_REFRESH_TTL_SECS));
    }

    #[test]
    fn oversized_ttls_are_capped() {
        let cfg = SessionConfig::from_lookup(lookup(&[
            ("ACCESS_TOKEN_EXPIRY_SECS", "9223372036854775807"),
            ("REFRESH_TOKEN_EXPIRY_SECS", "9223372036854775807"),
        ]));
        assert_eq!(cfg.access_ttl, Duration::seconds(MAX_TTL_SECS));
        assert_eq!(cfg.refresh_ttl, Duration::days(365));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = SessionConfig::new("top-secret", "also-secret");
        let out = format!("{cfg:?}");
        assert!(!out.contains("top-secret"));
        assert!(!out.contains("also-secret"));
    }
}
