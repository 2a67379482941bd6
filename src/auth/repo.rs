use axum::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::code::{CodePurpose, CodeState};
use crate::auth::store::{StoreError, User, UserAuth, UserCode, UserStore};

/// Postgres-backed [`UserStore`].
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(FromRow)]
struct CodeRow {
    id: Uuid,
    verified: bool,
    code: Option<String>,
    issued_at: Option<OffsetDateTime>,
}

fn code_select(purpose: CodePurpose) -> &'static str {
    match purpose {
        CodePurpose::Verification => {
            r#"
            SELECT id, verified,
                   verification_code AS code,
                   verification_issued_at AS issued_at
            FROM users
            WHERE email = $1
            "#
        }
        CodePurpose::PasswordReset => {
            r#"
            SELECT id, verified,
                   forgot_password_code AS code,
                   forgot_password_issued_at AS issued_at
            FROM users
            WHERE email = $1
            "#
        }
    }
}

fn code_store(purpose: CodePurpose) -> &'static str {
    match purpose {
        CodePurpose::Verification => {
            r#"
            UPDATE users
            SET verification_code = $2,
                verification_issued_at = $3,
                updated_at = now()
            WHERE id = $1
            "#
        }
        CodePurpose::PasswordReset => {
            r#"
            UPDATE users
            SET forgot_password_code = $2,
                forgot_password_issued_at = $3,
                updated_at = now()
            WHERE id = $1
            "#
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, verified, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            // unique index on email backstops the pre-check race
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                StoreError::DuplicateEmail
            } else {
                StoreError::Other(e.into())
            }
        })?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, verified, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_for_signin(&self, email: &str) -> anyhow::Result<Option<UserAuth>> {
        let user = sqlx::query_as::<_, UserAuth>(
            r#"
            SELECT id, email, verified, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_for_password_change(&self, id: Uuid) -> anyhow::Result<Option<UserAuth>> {
        let user = sqlx::query_as::<_, UserAuth>(
            r#"
            SELECT id, email, verified, password_hash
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_with_code(
        &self,
        email: &str,
        purpose: CodePurpose,
    ) -> anyhow::Result<Option<UserCode>> {
        let row = sqlx::query_as::<_, CodeRow>(code_select(purpose))
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(|r| UserCode {
            id: r.id,
            verified: r.verified,
            code: CodeState::from_parts(r.code, r.issued_at),
        }))
    }

    async fn store_code(
        &self,
        id: Uuid,
        purpose: CodePurpose,
        fingerprint: &str,
        issued_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(code_store(purpose))
            .bind(id)
            .bind(fingerprint)
            .bind(issued_at)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn consume_verification_code(
        &self,
        id: Uuid,
        fingerprint: &str,
    ) -> anyhow::Result<bool> {
        // conditional update: the fingerprint match and the write are one
        // statement, so concurrent verifies cannot both win
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verified = TRUE,
                verification_code = NULL,
                verification_issued_at = NULL,
                updated_at = now()
            WHERE id = $1
              AND verification_code = $2
              AND verification_issued_at IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(fingerprint)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn consume_password_reset_code(
        &self,
        id: Uuid,
        fingerprint: &str,
        new_password_hash: &str,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3,
                forgot_password_code = NULL,
                forgot_password_issued_at = NULL,
                updated_at = now()
            WHERE id = $1
              AND forgot_password_code = $2
              AND forgot_password_issued_at IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(fingerprint)
        .bind(new_password_hash)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
