use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub typ: TokenKind,
    // Keeps two tokens minted within the same second distinct.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

pub(crate) fn sign<C: Serialize>(claims: &C, secret: &[u8]) -> jsonwebtoken::errors::Result<String> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
}

pub(crate) fn decode<C: DeserializeOwned>(
    token: &str,
    secret: &[u8],
) -> jsonwebtoken::errors::Result<C> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = jsonwebtoken::decode::<C>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refresh_claims(exp_offset: i64) -> RefreshClaims {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        RefreshClaims {
            sub: Uuid::new_v4(),
            typ: TokenKind::Refresh,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn decode_accepts_token_signed_with_same_secret() {
        let claims = refresh_claims(60);
        let token = sign(&claims, b"secret").unwrap();
        let back: RefreshClaims = decode(&token, b"secret").unwrap();
        assert_eq!(back.sub, claims.sub);
        assert_eq!(back.jti, claims.jti);
    }

    #[test]
    fn decode_rejects_other_secret() {
        let token = sign(&refresh_claims(60), b"secret").unwrap();
        assert!(decode::<RefreshClaims>(&token, b"another").is_err());
    }

    #[test]
    fn decode_rejects_expired_token() {
        let token = sign(&refresh_claims(-5), b"secret").unwrap();
        assert!(decode::<RefreshClaims>(&token, b"secret").is_err());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode::<RefreshClaims>("not.a.jwt", b"secret").is_err());
        assert!(decode::<RefreshClaims>("", b"secret").is_err());
    }

    #[test]
    fn token_kind_is_encoded_lowercase() {
        #[derive(Deserialize)]
        struct RawKind {
            typ: String,
        }

        let token = sign(&refresh_claims(60), b"secret").unwrap();
        let raw: RawKind = decode(&token, b"secret").unwrap();
        assert_eq!(raw.typ, "refresh");
    }
}
