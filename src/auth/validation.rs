use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

pub const EMAIL_MIN: usize = 5;
pub const EMAIL_MAX: usize = 60;
pub const PASSWORD_MIN: usize = 8;
const SPECIAL_CHARS: &str = "@$!%*?&";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    if email.len() < EMAIL_MIN {
        return Err(ValidationError::EmailTooShort);
    }
    if email.len() > EMAIL_MAX {
        return Err(ValidationError::EmailTooLong);
    }
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::EmailFormat);
    }
    Ok(())
}

/// At least 8 characters with an uppercase letter, a lowercase letter, a
/// digit and one of `@$!%*?&`.
fn password_strong(password: &str) -> bool {
    password.len() >= PASSWORD_MIN
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| SPECIAL_CHARS.contains(c))
}

pub fn validate_signup(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    if !password_strong(password) {
        return Err(ValidationError::PasswordWeak);
    }
    Ok(())
}

/// Signin only requires a password to be present; strength was enforced at
/// signup.
pub fn validate_signin(email: &str, password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::PasswordRequired);
    }
    Ok(())
}

pub fn validate_accept_code(email: &str) -> Result<(), ValidationError> {
    validate_email(email)
}

pub fn validate_change_password(
    old_password: &str,
    new_password: &str,
) -> Result<(), ValidationError> {
    if old_password.is_empty() {
        return Err(ValidationError::OldPasswordRequired);
    }
    if !password_strong(new_password) {
        return Err(ValidationError::NewPasswordWeak);
    }
    Ok(())
}

pub fn validate_password_reset(email: &str, new_password: &str) -> Result<(), ValidationError> {
    validate_email(email)?;
    if !password_strong(new_password) {
        return Err(ValidationError::NewPasswordWeak);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_length_bounds() {
        assert_eq!(validate_email("a@b.c"), Ok(()));
        assert_eq!(validate_email("a@b."), Err(ValidationError::EmailTooShort));
        let long = format!("{}@test.com", "a".repeat(60));
        assert_eq!(validate_email(&long), Err(ValidationError::EmailTooLong));
    }

    #[test]
    fn email_shape() {
        assert_eq!(validate_email("user@example.com"), Ok(()));
        assert_eq!(
            validate_email("no-at-sign.com"),
            Err(ValidationError::EmailFormat)
        );
        assert_eq!(
            validate_email("user@no-dot-domain"),
            Err(ValidationError::EmailFormat)
        );
        assert_eq!(
            validate_email("spaces in@mail.com"),
            Err(ValidationError::EmailFormat)
        );
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  User@Test.COM  "), "user@test.com");
    }

    #[test]
    fn password_strength_needs_every_class() {
        assert!(validate_signup("a@test.com", "Abcdef1!").is_ok());
        assert_eq!(
            validate_signup("a@test.com", "Ab1!"),
            Err(ValidationError::PasswordWeak)
        );
        assert_eq!(
            validate_signup("a@test.com", "abcdef1!"),
            Err(ValidationError::PasswordWeak)
        );
        assert_eq!(
            validate_signup("a@test.com", "ABCDEF1!"),
            Err(ValidationError::PasswordWeak)
        );
        assert_eq!(
            validate_signup("a@test.com", "Abcdefg!"),
            Err(ValidationError::PasswordWeak)
        );
        assert_eq!(
            validate_signup("a@test.com", "Abcdefg1"),
            Err(ValidationError::PasswordWeak)
        );
    }

    #[test]
    fn signin_only_requires_presence() {
        assert!(validate_signin("a@test.com", "weak").is_ok());
        assert_eq!(
            validate_signin("a@test.com", ""),
            Err(ValidationError::PasswordRequired)
        );
        assert_eq!(
            validate_signin("bad", "pw"),
            Err(ValidationError::EmailTooShort)
        );
    }

    #[test]
    fn change_password_checks_both_fields() {
        assert!(validate_change_password("old-pw", "NewPass1!").is_ok());
        assert_eq!(
            validate_change_password("", "NewPass1!"),
            Err(ValidationError::OldPasswordRequired)
        );
        assert_eq!(
            validate_change_password("old-pw", "weak"),
            Err(ValidationError::NewPasswordWeak)
        );
    }

    #[test]
    fn password_reset_checks_email_and_strength() {
        assert!(validate_password_reset("a@test.com", "NewPass1!").is_ok());
        assert_eq!(
            validate_password_reset("a@test.com", "weak"),
            Err(ValidationError::NewPasswordWeak)
        );
    }
}
