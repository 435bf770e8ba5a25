/// Password Hashing and Verification
///
/// bcrypt with a configurable work factor. Strength rules live in
/// `validators::PasswordPolicy` and run before anything reaches here.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// Hash a password using bcrypt
///
/// # Arguments
/// * `password` - Plain text password to hash
/// * `cost` - bcrypt work factor (4..=31)
///
/// # Errors
/// Returns `AppError::Internal` if bcrypt rejects the input or the cost
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimum bcrypt cost keeps the suite fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "Teste@7890Ab";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_same_password_hashes_differently() {
        let first = hash_password("Teste@7890Ab", TEST_COST).unwrap();
        let second = hash_password("Teste@7890Ab", TEST_COST).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let password = "Teste@7890Ab";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        let is_valid = verify_password(password, &hash).expect("Failed to verify password");
        assert!(is_valid);
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("Teste@7890Ab", TEST_COST).expect("Failed to hash password");

        let is_valid = verify_password("Wrong@7890Ab", &hash).expect("Failed to verify password");
        assert!(!is_valid);
    }

    #[test]
    fn test_invalid_cost_is_internal_error() {
        let result = hash_password("Teste@7890Ab", 2);
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn test_corrupt_hash_is_error() {
        let result = verify_password("Teste@7890Ab", "not-a-bcrypt-hash");
        assert!(result.is_err());
    }
}
