//! JWT token management
//!
//! Access tokens are HS256-signed JWTs. Refresh tokens are opaque random
//! strings whose validity lives entirely in the session store.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::auth::permissions::UserRole;
use crate::auth::types::{AccessClaims, TOKEN_TYPE_BEARER};
use crate::config::{JwtConfig, MIN_JWT_SECRET_LEN};
use crate::error::{GateError, Result};

/// Random bytes in a refresh token
const REFRESH_TOKEN_BYTES: usize = 32;

/// Token parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
    BadSignature,
}

impl From<TokenError> for GateError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::TokenExpired,
            TokenError::Invalid | TokenError::BadSignature => Self::TokenInvalid,
        }
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => TokenError::BadSignature,
        _ => TokenError::Invalid,
    }
}

/// JWT token codec
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Full validation: signature, issuer, exp, nbf
    validation: Validation,
    /// Signature and issuer only, for logout of expired tokens
    id_validation: Validation,
    issuer: String,
    access_expire: i64,
}

impl TokenCodec {
    /// Create new codec. A missing or short secret is a startup error.
    pub fn new(config: &JwtConfig) -> Result<Self> {
        if config.secret.len() < MIN_JWT_SECRET_LEN {
            return Err(GateError::config(format!(
                "jwt.secret 长度不能少于 {MIN_JWT_SECRET_LEN} 字节"
            )));
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        // Validation::new pins the accepted algorithm list to HS256 only
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "nbf"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        let mut id_validation = validation.clone();
        id_validation.validate_exp = false;
        id_validation.validate_nbf = false;

        Ok(Self {
            encoding_key,
            decoding_key,
            validation,
            id_validation,
            issuer: config.issuer.clone(),
            access_expire: i64::try_from(config.access_expire).unwrap_or(i64::MAX),
        })
    }

    /// Access token lifetime in seconds
    #[must_use]
    pub const fn access_expire(&self) -> i64 {
        self.access_expire
    }

    /// Generate access token with a fresh jti
    pub fn generate_access_token(&self, user_id: &str, role: UserRole) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            uid: user_id.to_string(),
            role,
            jti: uuid::Uuid::new_v4().to_string(),
            iss: self.issuer.clone(),
            iat: now,
            nbf: now,
            exp: now.saturating_add(self.access_expire),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| GateError::internal_with_source("Token generation failed", e))
    }

    /// Generate opaque refresh token
    #[must_use]
    pub fn generate_refresh_token(&self) -> String {
        let mut bytes = [0_u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Validate and parse token
    pub fn parse_token(&self, token: &str) -> std::result::Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| classify(&e))
    }

    /// Extract jti, accepting expired tokens. The signature is still verified.
    pub fn get_token_id(&self, token: &str) -> std::result::Result<AccessClaims, TokenError> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.id_validation)
            .map(|data| data.claims)
            .map_err(|e| classify(&e))
    }
}

/// Hash a raw refresh token for use as a store key
#[must_use]
pub fn hash_refresh_token(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Token pair structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub token_type: String,
}

impl TokenPair {
    #[must_use]
    pub fn bearer(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_in,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const SECRET: &str = "test-secret-key-for-jwt-testing-0123456789";

    fn create_test_codec() -> TokenCodec {
        TokenCodec::new(&JwtConfig {
            secret: SECRET.to_string(),
            access_expire: 3600,
            refresh_expire: 86400,
            issuer: "lex-veritas".to_string(),
        })
        .unwrap()
    }

    fn sign_with(claims: &AccessClaims, secret: &str, alg: Algorithm) -> String {
        encode(&Header::new(alg), claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn claims_at(offset: i64) -> AccessClaims {
        let now = Utc::now().timestamp();
        AccessClaims {
            uid: "u-1".to_string(),
            role: UserRole::User,
            jti: "jti-1".to_string(),
            iss: "lex-veritas".to_string(),
            iat: now + offset - 10,
            nbf: now + offset - 10,
            exp: now + offset,
        }
    }

    #[test]
    fn test_token_generation_and_validation() {
        let codec = create_test_codec();
        let token = codec.generate_access_token("u-1", UserRole::Admin).unwrap();

        let claims = codec.parse_token(&token).unwrap();
        assert_eq!(claims.uid, "u-1");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.iss, "lex-veritas");
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_jti_is_unique() {
        let codec = create_test_codec();
        let a = codec.generate_access_token("u-1", UserRole::User).unwrap();
        let b = codec.generate_access_token("u-1", UserRole::User).unwrap();
        assert_ne!(
            codec.parse_token(&a).unwrap().jti,
            codec.parse_token(&b).unwrap().jti
        );
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = TokenCodec::new(&JwtConfig {
            secret: "short".to_string(),
            ..JwtConfig::default()
        });
        assert!(matches!(result, Err(GateError::Config { .. })));
    }

    #[test]
    fn test_expired_token() {
        let codec = create_test_codec();
        let token = sign_with(&claims_at(-60), SECRET, Algorithm::HS256);
        assert_eq!(codec.parse_token(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let codec = create_test_codec();
        let token = sign_with(&claims_at(600), "another-secret-another-secret-0000", Algorithm::HS256);
        assert_eq!(codec.parse_token(&token), Err(TokenError::BadSignature));
        assert!(codec.get_token_id(&token).is_err());
    }

    #[test]
    fn test_algorithm_substitution_rejected() {
        let codec = create_test_codec();
        let token = sign_with(&claims_at(600), SECRET, Algorithm::HS512);
        assert!(codec.parse_token(&token).is_err());
        assert!(codec.get_token_id(&token).is_err());
    }

    #[test]
    fn test_unsigned_token_rejected() {
        let codec = create_test_codec();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims_at(600)).unwrap());
        let token = format!("{header}.{payload}.");
        assert!(codec.parse_token(&token).is_err());
        assert!(codec.get_token_id(&token).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let codec = create_test_codec();
        let mut claims = claims_at(600);
        claims.iss = "someone-else".to_string();
        let token = sign_with(&claims, SECRET, Algorithm::HS256);
        assert_eq!(codec.parse_token(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_get_token_id_tolerates_expiry() {
        let codec = create_test_codec();
        let token = sign_with(&claims_at(-3600), SECRET, Algorithm::HS256);
        assert_eq!(codec.get_token_id(&token).unwrap().jti, "jti-1");
    }

    #[test]
    fn test_invalid_token() {
        let codec = create_test_codec();
        assert_eq!(codec.parse_token("invalid-token"), Err(TokenError::Invalid));
        assert!(codec.parse_token("").is_err());
    }

    #[test]
    fn test_refresh_token_is_opaque() {
        let codec = create_test_codec();
        let a = codec.generate_refresh_token();
        let b = codec.generate_refresh_token();
        assert_eq!(a.len(), REFRESH_TOKEN_BYTES * 2);
        assert_ne!(a, b);
        assert!(codec.parse_token(&a).is_err());
        assert_eq!(hash_refresh_token(&a).len(), 64);
        assert_ne!(hash_refresh_token(&a), a);
    }
}
