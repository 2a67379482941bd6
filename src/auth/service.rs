use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::code::{expired, fingerprint, generate_code, CodePurpose, CodeState};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::session::{Claims, SessionKeys};
use crate::auth::store::User;
use crate::auth::validation;
use crate::error::{ApiError, ApiResult};
use crate::mailer::MailMessage;
use crate::state::AppState;

pub async fn signup(st: &AppState, email: &str, password: &str) -> ApiResult<User> {
    validation::validate_signup(email, password)?;

    if st.users.find_by_email(email).await?.is_some() {
        warn!(email = %email, "signup for an existing email");
        return Err(ApiError::Conflict);
    }

    let hash = hash_password(password, &st.config.hash)?;
    let user = st.users.create(email, &hash).await?;
    info!(user_id = %user.id, email = %user.email, "account created");
    Ok(user)
}

pub async fn signin(
    st: &AppState,
    keys: &SessionKeys,
    email: &str,
    password: &str,
) -> ApiResult<String> {
    validation::validate_signin(email, password)?;

    let user = st
        .users
        .find_for_signin(email)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "signin with an invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let token = keys.sign(user.id, &user.email, user.verified)?;
    info!(user_id = %user.id, "user signed in");
    Ok(token)
}

/// Generates a code, mails it and only then persists the fingerprint. A
/// rejected or failed delivery leaves the stored state untouched.
async fn issue_code(
    st: &AppState,
    user_id: Uuid,
    email: &str,
    purpose: CodePurpose,
) -> ApiResult<()> {
    let code = generate_code();
    let message = MailMessage {
        from: st.config.mail_from.clone(),
        to: email.to_string(),
        subject: purpose.subject().to_string(),
        html_body: format!("<h1>{code}</h1>"),
    };

    let delivery = match st.mailer.send(&message).await {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, email = %email, "mail transport failed");
            return Err(ApiError::DeliveryFailed(purpose.delivery_failure()));
        }
    };
    if !delivery.accepted_for(email) {
        warn!(email = %email, "mail gateway rejected the recipient");
        return Err(ApiError::DeliveryFailed(purpose.delivery_failure()));
    }

    let fp = fingerprint(&code, &st.config.hmac_secret)?;
    st.users
        .store_code(user_id, purpose, &fp, OffsetDateTime::now_utc())
        .await?;
    info!(user_id = %user_id, subject = purpose.subject(), "code issued");
    Ok(())
}

pub async fn send_verification_code(st: &AppState, email: &str) -> ApiResult<()> {
    let user = st
        .users
        .find_by_email(email)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    if user.verified {
        return Err(ApiError::AlreadyVerified);
    }
    issue_code(st, user.id, &user.email, CodePurpose::Verification).await
}

pub async fn verify_verification_code(
    st: &AppState,
    email: &str,
    provided_code: u64,
) -> ApiResult<()> {
    validation::validate_accept_code(email)?;
    let code = provided_code.to_string();

    let user = st
        .users
        .find_with_code(email, CodePurpose::Verification)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    if user.verified {
        return Err(ApiError::AlreadyVerified);
    }

    let (stored, issued_at) = match user.code {
        CodeState::None => return Err(ApiError::NoPendingCode),
        CodeState::Issued {
            fingerprint,
            issued_at,
        } => (fingerprint, issued_at),
    };
    if expired(issued_at, OffsetDateTime::now_utc()) {
        return Err(ApiError::CodeExpired);
    }
    if fingerprint(&code, &st.config.hmac_secret)? != stored {
        warn!(user_id = %user.id, "verification code mismatch");
        return Err(ApiError::InvalidCode);
    }

    // the conditional write is the arbiter under concurrency: losing it means
    // the pair is no longer pending
    if !st.users.consume_verification_code(user.id, &stored).await? {
        return Err(ApiError::NoPendingCode);
    }
    info!(user_id = %user.id, "user verified");
    Ok(())
}

pub async fn change_password(
    st: &AppState,
    claims: &Claims,
    old_password: &str,
    new_password: &str,
) -> ApiResult<()> {
    validation::validate_change_password(old_password, new_password)?;

    if !claims.verified {
        return Err(ApiError::NotVerified);
    }

    let user = st
        .users
        .find_for_password_change(claims.sub)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    if !verify_password(old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "change-password with an invalid old password");
        return Err(ApiError::InvalidCredentials);
    }

    let hash = hash_password(new_password, &st.config.hash)?;
    st.users.update_password(user.id, &hash).await?;
    info!(user_id = %user.id, "password updated");
    Ok(())
}

pub async fn send_forgot_password_code(st: &AppState, email: &str) -> ApiResult<()> {
    let user = st
        .users
        .find_by_email(email)
        .await?
        .ok_or(ApiError::UserNotFound)?;
    issue_code(st, user.id, &user.email, CodePurpose::PasswordReset).await
}

/// Unlike the verification flow there is no verified gate here: a reset must
/// work for accounts that never verified.
pub async fn verify_forgot_password_code(
    st: &AppState,
    email: &str,
    provided_code: u64,
    new_password: &str,
) -> ApiResult<()> {
    validation::validate_password_reset(email, new_password)?;
    let code = provided_code.to_string();

    let user = st
        .users
        .find_with_code(email, CodePurpose::PasswordReset)
        .await?
        .ok_or(ApiError::UserNotFound)?;

    let (stored, issued_at) = match user.code {
        CodeState::None => return Err(ApiError::NoPendingCode),
        CodeState::Issued {
            fingerprint,
            issued_at,
        } => (fingerprint, issued_at),
    };
    if expired(issued_at, OffsetDateTime::now_utc()) {
        return Err(ApiError::CodeExpired);
    }
    if fingerprint(&code, &st.config.hmac_secret)? != stored {
        warn!(user_id = %user.id, "reset code mismatch");
        return Err(ApiError::InvalidCode);
    }

    let hash = hash_password(new_password, &st.config.hash)?;
    if !st
        .users
        .consume_password_reset_code(user.id, &stored, &hash)
        .await?
    {
        return Err(ApiError::NoPendingCode);
    }
    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::InMemoryUserStore;
    use crate::error::ValidationError;
    use crate::mailer::MockMailer;
    use axum::extract::FromRef;
    use std::sync::Arc;
    use time::Duration;

    fn state() -> (AppState, Arc<InMemoryUserStore>, Arc<MockMailer>) {
        AppState::fake_parts()
    }

    fn claims_for(user: &User, verified: bool) -> Claims {
        Claims {
            sub: user.id,
            email: user.email.clone(),
            verified,
            iat: 0,
            exp: 0,
        }
    }

    async fn mailed_code(mailer: &MockMailer) -> u64 {
        let sent = mailer.sent().await;
        let body = &sent.last().expect("a mail was sent").html_body;
        body.trim_start_matches("<h1>")
            .trim_end_matches("</h1>")
            .parse()
            .expect("code is numeric")
    }

    #[tokio::test]
    async fn signup_creates_an_unverified_account() {
        let (st, _, _) = state();
        let user = signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");
        assert_eq!(user.email, "a@test.com");
        assert!(!user.verified);
    }

    #[tokio::test]
    async fn signup_rejects_duplicates_and_weak_passwords() {
        let (st, _, _) = state();
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");
        let err = signup(&st, "a@test.com", "Abcdef1!").await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict));

        let err = signup(&st, "b@test.com", "weak").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation(ValidationError::PasswordWeak)
        ));
    }

    #[tokio::test]
    async fn signin_issues_a_token_with_identity_claims() {
        let (st, _, _) = state();
        let keys = SessionKeys::from_ref(&st);
        let user = signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        let token = signin(&st, &keys, "a@test.com", "Abcdef1!")
            .await
            .expect("signin");
        let claims = keys.verify(&token).expect("claims");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, "a@test.com");
        assert!(!claims.verified);
    }

    #[tokio::test]
    async fn signin_distinguishes_unknown_email_from_bad_password() {
        let (st, _, _) = state();
        let keys = SessionKeys::from_ref(&st);
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        let err = signin(&st, &keys, "ghost@test.com", "Abcdef1!")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UserNotFound));

        let err = signin(&st, &keys, "a@test.com", "Wrong-pw1!")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn verification_flow_marks_the_account_verified() {
        let (st, _, mailer) = state();
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        send_verification_code(&st, "a@test.com").await.expect("send");
        let code = mailed_code(&mailer).await;

        verify_verification_code(&st, "a@test.com", code)
            .await
            .expect("verify");
        let user = st
            .users
            .find_by_email("a@test.com")
            .await
            .unwrap()
            .unwrap();
        assert!(user.verified);

        // gate closes for good once verified
        let err = verify_verification_code(&st, "a@test.com", code)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::AlreadyVerified));
        let err = send_verification_code(&st, "a@test.com").await.unwrap_err();
        assert!(matches!(err, ApiError::AlreadyVerified));
    }

    #[tokio::test]
    async fn wrong_code_and_missing_pair_are_distinct_failures() {
        let (st, _, mailer) = state();
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        let err = verify_verification_code(&st, "a@test.com", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NoPendingCode));

        send_verification_code(&st, "a@test.com").await.expect("send");
        let code = mailed_code(&mailer).await;
        let wrong = if code == 0 { 1 } else { code - 1 };
        let err = verify_verification_code(&st, "a@test.com", wrong)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCode));
    }

    #[tokio::test]
    async fn stale_codes_expire() {
        let (st, users, mailer) = state();
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");
        send_verification_code(&st, "a@test.com").await.expect("send");
        let code = mailed_code(&mailer).await;

        users
            .age_code("a@test.com", CodePurpose::Verification, Duration::minutes(6))
            .await;
        let err = verify_verification_code(&st, "a@test.com", code)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::CodeExpired));
    }

    #[tokio::test]
    async fn rejected_delivery_stores_nothing() {
        let (st, _, mailer) = state();
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        mailer.reject_deliveries();
        let err = send_verification_code(&st, "a@test.com").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::DeliveryFailed("Failed to send verification code")
        ));

        let user = st
            .users
            .find_with_code("a@test.com", CodePurpose::Verification)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.code, CodeState::None);
    }

    #[tokio::test]
    async fn transport_failure_reads_the_same_as_rejection() {
        let (st, _, mailer) = state();
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        mailer.fail_transport();
        let err = send_forgot_password_code(&st, "a@test.com")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::DeliveryFailed("Failed to send forgot password code")
        ));
    }

    #[tokio::test]
    async fn change_password_requires_a_verified_session() {
        let (st, _, _) = state();
        let user = signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        let err = change_password(&st, &claims_for(&user, false), "Abcdef1!", "NewPass1!")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotVerified));
    }

    #[tokio::test]
    async fn change_password_swaps_the_credential() {
        let (st, _, _) = state();
        let keys = SessionKeys::from_ref(&st);
        let user = signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        let err = change_password(&st, &claims_for(&user, true), "Wrong-pw1!", "NewPass1!")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));

        change_password(&st, &claims_for(&user, true), "Abcdef1!", "NewPass1!")
            .await
            .expect("change password");
        assert!(signin(&st, &keys, "a@test.com", "Abcdef1!").await.is_err());
        signin(&st, &keys, "a@test.com", "NewPass1!")
            .await
            .expect("signin with the new password");
    }

    #[tokio::test]
    async fn forgot_password_flow_resets_without_verification() {
        let (st, _, mailer) = state();
        let keys = SessionKeys::from_ref(&st);
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");

        send_forgot_password_code(&st, "a@test.com")
            .await
            .expect("send");
        let code = mailed_code(&mailer).await;

        verify_forgot_password_code(&st, "a@test.com", code, "NewPass1!")
            .await
            .expect("reset");
        signin(&st, &keys, "a@test.com", "NewPass1!")
            .await
            .expect("signin with the new password");

        // pair was consumed with the reset
        let err = verify_forgot_password_code(&st, "a@test.com", code, "NewPass1!")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NoPendingCode));
    }

    #[tokio::test]
    async fn forgot_password_codes_expire_too() {
        let (st, users, mailer) = state();
        signup(&st, "a@test.com", "Abcdef1!").await.expect("signup");
        send_forgot_password_code(&st, "a@test.com")
            .await
            .expect("send");
        let code = mailed_code(&mailer).await;

        users
            .age_code(
                "a@test.com",
                CodePurpose::PasswordReset,
                Duration::minutes(6),
            )
            .await;
        let err = verify_forgot_password_code(&st, "a@test.com", code, "NewPass1!")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::CodeExpired));
    }
}
