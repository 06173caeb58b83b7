//! Password hashing and credential input validation.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng},
};

use super::errors::{AuthError, AuthResult};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_EMAIL_LEN: usize = 254;

/// Argon2id password hasher with a server-side pepper
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: String,
}

impl PasswordHasher {
    pub fn new(pepper: impl Into<String>) -> Self {
        Self {
            pepper: pepper.into(),
        }
    }

    /// Hash password with Argon2id + pepper
    pub fn hash(&self, password: &str) -> AuthResult<String> {
        let peppered = format!("{}{}", password, self.pepper);
        let salt = SaltString::generate(&mut OsRng);

        Ok(Argon2::default()
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::HashingFailed)?
            .to_string())
    }

    /// Verify password against a stored PHC hash
    ///
    /// Any failure, including an unparsable stored hash, is reported as
    /// `InvalidCredentials`.
    pub fn verify(&self, password: &str, hash: &str) -> AuthResult<()> {
        let peppered = format!("{}{}", password, self.pepper);
        let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

        Argon2::default()
            .verify_password(peppered.as_bytes(), &parsed_hash)
            .map_err(|_| AuthError::InvalidCredentials)
    }
}

/// Normalize and validate an email address
pub fn normalize_email(email: &str) -> AuthResult<String> {
    let email = email.trim().to_lowercase();

    if email.is_empty() {
        return Err(AuthError::invalid_input("email", "Email is required"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(AuthError::invalid_input(
            "email",
            format!("Email must be at most {MAX_EMAIL_LEN} characters"),
        ));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(AuthError::invalid_input("email", "Email address is malformed"));
    }

    Ok(email)
}

/// Validate password strength
pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::invalid_input(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    if password.len() > MAX_PASSWORD_LEN {
        return Err(AuthError::invalid_input(
            "password",
            format!("Password must be at most {MAX_PASSWORD_LEN} characters"),
        ));
    }

    // Check for at least one number, one uppercase, one lowercase
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lowercase = password.chars().any(|c| c.is_ascii_lowercase());

    if !has_digit || !has_uppercase || !has_lowercase {
        return Err(AuthError::invalid_input(
            "password",
            "Password must contain at least one number, one uppercase and one lowercase letter",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new("test_pepper_16ch");
        let hash = hasher.hash("SecurePass123").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("SecurePass123", &hash).is_ok());
        assert!(matches!(
            hasher.verify("WrongPass123", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_pepper_is_part_of_the_hash() {
        let hash = PasswordHasher::new("pepper_one_value").hash("SecurePass123").unwrap();
        let other = PasswordHasher::new("pepper_two_value");
        assert!(other.verify("SecurePass123", &hash).is_err());
    }

    #[test]
    fn test_unparsable_hash_is_invalid_credentials() {
        let hasher = PasswordHasher::new("pepper");
        assert!(matches!(
            hasher.verify("SecurePass123", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        for bad in ["", "alice", "alice@", "@example.com", "a@b@c.com", "a@example", "a b@c.com"] {
            assert!(
                matches!(normalize_email(bad), Err(AuthError::InvalidInput { field: "email", .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password("SecurePass123").is_ok());
        for weak in ["short1A", "alllowercase1", "ALLUPPERCASE1", "NoDigitsHere"] {
            assert!(
                matches!(validate_password(weak), Err(AuthError::InvalidInput { field: "password", .. })),
                "{weak:?} should be rejected"
            );
        }
    }
}
