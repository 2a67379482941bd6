use axum::async_trait;
use serde::Serialize;
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::auth::code::{CodePurpose, CodeState};
use crate::error::ApiError;

/// Public projection of an account. This is what signup echoes back; the
/// password hash and code columns never leave the store in this shape.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Credential-check projection, loaded only where a password must be
/// verified.
#[derive(Debug, Clone, FromRow)]
pub struct UserAuth {
    pub id: Uuid,
    pub email: String,
    pub verified: bool,
    pub password_hash: String,
}

/// Code-check projection for one purpose.
#[derive(Debug, Clone)]
pub struct UserCode {
    pub id: Uuid,
    pub verified: bool,
    pub code: CodeState,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => ApiError::Conflict,
            StoreError::Other(e) => ApiError::Internal(e),
        }
    }
}

/// Persistence seam for accounts. The consume operations are the interesting
/// part: each checks its precondition and applies the write as one atomic
/// step, reporting through the bool whether the caller won the pair.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError>;

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    async fn find_for_signin(&self, email: &str) -> anyhow::Result<Option<UserAuth>>;

    async fn find_for_password_change(&self, id: Uuid) -> anyhow::Result<Option<UserAuth>>;

    async fn find_with_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> anyhow::Result<Option<UserCode>>;

    /// Overwrites any pending pair for the purpose.
    async fn store_code(
        &self,
        id: Uuid,
        purpose: CodePurpose,
        fingerprint: &str,
        issued_at: OffsetDateTime,
    ) -> anyhow::Result<()>;

    /// Marks the account verified and clears the pair, provided the stored
    /// fingerprint still matches. False means another request got there
    /// first or the pair is gone.
    async fn consume_verification_code(&self, id: Uuid, fingerprint: &str)
        -> anyhow::Result<bool>;

    /// Replaces the password and clears the reset pair, provided the stored
    /// fingerprint still matches.
    async fn consume_password_reset_code(
        &self,
        id: Uuid,
        fingerprint: &str,
        new_password_hash: &str,
    ) -> anyhow::Result<bool>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
struct StoredUser {
    id: Uuid,
    email: String,
    password_hash: String,
    verified: bool,
    verification: Option<(String, OffsetDateTime)>,
    password_reset: Option<(String, OffsetDateTime)>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl StoredUser {
    fn public(&self) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            verified: self.verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn auth(&self) -> UserAuth {
        UserAuth {
            id: self.id,
            email: self.email.clone(),
            verified: self.verified,
            password_hash: self.password_hash.clone(),
        }
    }

    fn pair_mut(&mut self, purpose: CodePurpose) -> &mut Option<(String, OffsetDateTime)> {
        match purpose {
            CodePurpose::Verification => &mut self.verification,
            CodePurpose::PasswordReset => &mut self.password_reset,
        }
    }
}

/// Backing store for tests and `AppState::fake()`. Single mutex, so every
/// trait method is as atomic as the conditional UPDATEs it stands in for.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<Vec<StoredUser>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: shift a pending pair's issue time into the past.
    pub async fn age_code(&self, email: &str, purpose: CodePurpose, by: Duration) {
        let mut users = self.users.lock().await;
        if let Some(user) = users.iter_mut().find(|u| u.email == email) {
            if let Some((_, issued_at)) = user.pair_mut(purpose) {
                *issued_at -= by;
            }
        }
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = StoredUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            verified: false,
            verification: None,
            password_reset: None,
            created_at: now,
            updated_at: now,
        };
        let public = user.public();
        users.push(user);
        Ok(public)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.email == email).map(|u| u.public()))
    }

    async fn find_for_signin(&self, email: &str) -> anyhow::Result<Option<UserAuth>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.email == email).map(|u| u.auth()))
    }

    async fn find_for_password_change(&self, id: Uuid) -> anyhow::Result<Option<UserAuth>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.id == id).map(|u| u.auth()))
    }

    async fn find_with_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> anyhow::Result<Option<UserCode>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.email == email).map(|u| {
            let pair = match purpose {
                CodePurpose::Verification => &u.verification,
                CodePurpose::PasswordReset => &u.password_reset,
            };
            UserCode {
                id: u.id,
                verified: u.verified,
                code: CodeState::from_parts(
                    pair.as_ref().map(|(fp, _)| fp.clone()),
                    pair.as_ref().map(|(_, at)| *at),
                ),
            }
        }))
    }

    async fn store_code(
        &self,
        id: Uuid,
        purpose: CodePurpose,
        fingerprint: &str,
        issued_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            *user.pair_mut(purpose) = Some((fingerprint.to_string(), issued_at));
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn consume_verification_code(
        &self,
        id: Uuid,
        fingerprint: &str,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.lock().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        match &user.verification {
            Some((stored, _)) if stored == fingerprint => {
                user.verified = true;
                user.verification = None;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn consume_password_reset_code(
        &self,
        id: Uuid,
        fingerprint: &str,
        new_password_hash: &str,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.lock().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        match &user.password_reset {
            Some((stored, _)) if stored == fingerprint => {
                user.password_hash = new_password_hash.to_string();
                user.password_reset = None;
                user.updated_at = OffsetDateTime::now_utc();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.iter_mut().find(|u| u.id == id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }
}
