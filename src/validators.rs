/// Input validators
///
/// Email normalization/format checks and the configurable password policy.
/// Each policy rule fails with its own `ValidationError` variant so the
/// client can be told exactly which rule was broken.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_LOCAL_PART_LENGTH: usize = 64;

lazy_static! {
    // Simplified RFC 5322 local part; domain must end in an alphabetic TLD
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)*\.[a-z]{2,}$"
    )
    .expect("email regex is valid");
}

/// Trim and lowercase an email without judging its format
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validates and normalizes an email address
/// - Trims and lowercases
/// - Verifies length constraints
/// - Checks format, requiring a dotted domain with a TLD
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let normalized = normalize_email(email);

    if normalized.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if normalized.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if normalized.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if has_suspicious_email_patterns(&normalized) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    if !EMAIL_REGEX.is_match(&normalized) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    Ok(normalized)
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    if email.contains('\0') || email.chars().any(|c| c.is_control()) {
        return true;
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    match email.find('@') {
        Some(at_pos) => at_pos > MAX_LOCAL_PART_LENGTH,
        None => true,
    }
}

fn default_min_length() -> usize {
    8
}

fn default_max_length() -> usize {
    128
}

fn default_true() -> bool {
    true
}

fn default_disallowed_words() -> Vec<String> {
    vec![
        "password".to_string(),
        "123456".to_string(),
        "qwerty".to_string(),
    ]
}

fn default_max_repeated_chars() -> usize {
    3
}

fn default_min_unique_chars() -> usize {
    5
}

/// Password strength rules
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PasswordPolicy {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Upper bound, bcrypt only reads the first 72 bytes anyway
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_true")]
    pub require_uppercase: bool,
    #[serde(default = "default_true")]
    pub require_lowercase: bool,
    #[serde(default = "default_true")]
    pub require_digit: bool,
    #[serde(default = "default_true")]
    pub require_special: bool,
    /// Matched case-insensitively anywhere in the password
    #[serde(default = "default_disallowed_words")]
    pub disallowed_words: Vec<String>,
    /// Longest allowed run of one repeated character
    #[serde(default = "default_max_repeated_chars")]
    pub max_repeated_chars: usize,
    #[serde(default = "default_min_unique_chars")]
    pub min_unique_chars: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_length: default_max_length(),
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: true,
            disallowed_words: default_disallowed_words(),
            max_repeated_chars: default_max_repeated_chars(),
            min_unique_chars: default_min_unique_chars(),
        }
    }
}

impl PasswordPolicy {
    /// Check `password` against every rule, reporting the first violation
    pub fn validate(&self, password: &str) -> Result<(), ValidationError> {
        let length = password.chars().count();

        if length < self.min_length {
            return Err(ValidationError::TooShort(
                "password".to_string(),
                self.min_length,
            ));
        }

        if length > self.max_length {
            return Err(ValidationError::TooLong(
                "password".to_string(),
                self.max_length,
            ));
        }

        if self.require_uppercase && !password.chars().any(char::is_uppercase) {
            return Err(ValidationError::MissingUppercase);
        }

        if self.require_lowercase && !password.chars().any(char::is_lowercase) {
            return Err(ValidationError::MissingLowercase);
        }

        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::MissingDigit);
        }

        if self.require_special && !password.chars().any(is_special) {
            return Err(ValidationError::MissingSpecialCharacter);
        }

        let lowered = password.to_lowercase();
        if self
            .disallowed_words
            .iter()
            .filter(|word| !word.is_empty())
            .any(|word| lowered.contains(&word.to_lowercase()))
        {
            return Err(ValidationError::DisallowedSubstring);
        }

        if longest_run(password) > self.max_repeated_chars {
            return Err(ValidationError::RepeatedCharacters(self.max_repeated_chars));
        }

        let mut unique: Vec<char> = password.chars().collect();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() < self.min_unique_chars {
            return Err(ValidationError::TooFewUniqueCharacters(
                self.min_unique_chars,
            ));
        }

        Ok(())
    }
}

fn is_special(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

/// Length of the longest run of one character repeated back to back
fn longest_run(s: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut previous = None;

    for c in s.chars() {
        if Some(c) == previous {
            current += 1;
        } else {
            current = 1;
            previous = Some(c);
        }
        longest = longest.max(current);
    }

    longest
}
