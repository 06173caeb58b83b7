//! Access token issuing and validation, plus opaque token helpers.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::{
    config::{AuthConfig, expiry_after},
    errors::{AuthError, AuthResult},
    models::{AccessTokenClaims, UserId},
};

/// The only algorithm accepted for access tokens
pub const ACCESS_TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Number of random bytes behind every opaque token
const OPAQUE_TOKEN_BYTES: usize = 32;

/// Signs and verifies access tokens with a single shared secret.
///
/// Holds no mutable state, so one instance behind an `Arc` serves every request.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_ttl: Duration,
}

impl TokenService {
    /// Create a token service
    ///
    /// # Arguments
    ///
    /// * `secret` - HMAC signing secret
    /// * `access_token_ttl` - Lifetime of issued access tokens
    pub fn new(secret: &[u8], access_token_ttl: Duration) -> Self {
        let mut validation = Validation::new(ACCESS_TOKEN_ALGORITHM);
        // Expiry is checked by hand so a token is dead at exactly `exp`.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_token_ttl,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.access_token_ttl)
    }

    /// Access token lifetime in seconds
    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl.num_seconds()
    }

    /// Generate a signed access token for `user_id`
    pub fn issue_access_token(&self, user_id: UserId, email: &str) -> AuthResult<String> {
        self.issue_access_token_at(user_id, email, Utc::now())
    }

    /// Generate a signed access token as if issued at `now`
    pub fn issue_access_token_at(
        &self,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        let claims = AccessTokenClaims {
            sub: user_id,
            email: email.to_string(),
            iat: now.timestamp(),
            exp: expiry_after(now, self.access_token_ttl, "access")?.timestamp(),
        };

        let token = encode(
            &Header::new(ACCESS_TOKEN_ALGORITHM),
            &claims,
            &self.encoding_key,
        )?;

        Ok(token)
    }

    /// Verify an access token
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidToken` - Wrong algorithm, bad signature, malformed or expired.
    ///   The cause is logged at debug level only.
    pub fn verify_access_token(&self, token: &str) -> AuthResult<AccessTokenClaims> {
        self.verify_access_token_at(token, Utc::now())
    }

    /// Verify an access token against the clock value `now`
    pub fn verify_access_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<AccessTokenClaims> {
        let claims = decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                log::debug!("Access token rejected: {}", e);
                AuthError::InvalidToken
            })?
            .claims;

        if claims.exp <= now.timestamp() {
            log::debug!("Access token for user {} expired at {}", claims.sub, claims.exp);
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

/// Generate a high-entropy opaque token (hex encoded)
pub(crate) fn generate_opaque_token() -> String {
    let mut bytes = [0u8; OPAQUE_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One-way hash used to store and look up opaque tokens
pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &[u8] = b"test_secret_key_for_testing_only_0123456789";

    fn service() -> TokenService {
        TokenService::new(TEST_SECRET, Duration::minutes(15))
    }

    fn sign_with(algorithm: Algorithm, claims: &AccessTokenClaims) -> String {
        encode(
            &Header::new(algorithm),
            claims,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_token_is_accepted_before_expiry() {
        let tokens = service();
        let now = Utc::now();
        let token = tokens.issue_access_token_at(7, "user@example.com", now).unwrap();

        let claims = tokens.verify_access_token_at(&token, now).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.email, "user@example.com");
        assert_eq!(claims.exp - claims.iat, 15 * 60);

        let just_before = now + Duration::minutes(15) - Duration::seconds(1);
        assert!(tokens.verify_access_token_at(&token, just_before).is_ok());
    }

    #[test]
    fn test_token_rejected_at_and_after_expiry() {
        let tokens = service();
        let now = Utc::now();
        let token = tokens.issue_access_token_at(7, "user@example.com", now).unwrap();

        let at_exp = now + Duration::minutes(15);
        assert!(matches!(
            tokens.verify_access_token_at(&token, at_exp),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            tokens.verify_access_token_at(&token, at_exp + Duration::hours(1)),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_other_hmac_algorithms_rejected_with_same_secret() {
        let tokens = service();
        let now = Utc::now();
        let claims = AccessTokenClaims {
            sub: 1,
            email: "user@example.com".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::minutes(5)).timestamp(),
        };

        for algorithm in [Algorithm::HS384, Algorithm::HS512] {
            let forged = sign_with(algorithm, &claims);
            assert!(
                matches!(
                    tokens.verify_access_token_at(&forged, now),
                    Err(AuthError::InvalidToken)
                ),
                "{algorithm:?} token must be rejected"
            );
        }

        let genuine = sign_with(Algorithm::HS256, &claims);
        assert!(tokens.verify_access_token_at(&genuine, now).is_ok());
    }

    #[test]
    fn test_unsigned_none_token_rejected() {
        let tokens = service();
        // {"alg":"none","typ":"JWT"} . {"sub":1,"email":"a@b.co","iat":1700000000,"exp":4102444800} .
        let forged = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.\
                      eyJzdWIiOjEsImVtYWlsIjoiYUBiLmNvIiwiaWF0IjoxNzAwMDAwMDAwLCJleHAiOjQxMDI0NDQ4MDB9.";
        assert!(matches!(
            tokens.verify_access_token(forged),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let other = TokenService::new(b"a_completely_different_secret_value!!", Duration::minutes(15));
        let token = other.issue_access_token(1, "user@example.com").unwrap();
        assert!(matches!(
            service().verify_access_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = service();
        for input in ["", "not-a-jwt", "a.b.c", "Bearer x"] {
            assert!(matches!(
                tokens.verify_access_token(input),
                Err(AuthError::InvalidToken)
            ));
        }
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        let tokens = TokenService::new(TEST_SECRET, Duration::MAX);
        assert!(matches!(
            tokens.issue_access_token(1, "user@example.com"),
            Err(AuthError::LifetimeOutOfRange("access"))
        ));
    }

    #[test]
    fn test_opaque_tokens_are_unique_and_hashed() {
        let a = generate_opaque_token();
        let b = generate_opaque_token();
        assert_eq!(a.len(), OPAQUE_TOKEN_BYTES * 2);
        assert_ne!(a, b);

        let hash = hash_token(&a);
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, a);
        assert_eq!(hash, hash_token(&a));
        assert_ne!(hash, hash_token(&b));
    }
}
