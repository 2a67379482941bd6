use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Post row as stored; what mutations echo back.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Post with its author joined in; what reads return.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostWithAuthor {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub user: Author,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub email: String,
}

#[derive(FromRow)]
struct PostAuthorRow {
    id: Uuid,
    title: String,
    description: String,
    user_id: Uuid,
    user_email: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostAuthorRow> for PostWithAuthor {
    fn from(r: PostAuthorRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            description: r.description,
            user: Author {
                id: r.user_id,
                email: r.user_email,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub async fn list(db: &PgPool, limit: i64, offset: i64) -> anyhow::Result<Vec<PostWithAuthor>> {
    let rows = sqlx::query_as::<_, PostAuthorRow>(
        r#"
        SELECT p.id, p.title, p.description, p.user_id, u.email AS user_email,
               p.created_at, p.updated_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        ORDER BY p.created_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(PostWithAuthor::from).collect())
}

pub async fn get(db: &PgPool, post_id: Uuid) -> anyhow::Result<Option<PostWithAuthor>> {
    let row = sqlx::query_as::<_, PostAuthorRow>(
        r#"
        SELECT p.id, p.title, p.description, p.user_id, u.email AS user_email,
               p.created_at, p.updated_at
        FROM posts p
        JOIN users u ON u.id = p.user_id
        WHERE p.id = $1
        "#,
    )
    .bind(post_id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(PostWithAuthor::from))
}

pub async fn find(db: &PgPool, post_id: Uuid) -> anyhow::Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        SELECT id, title, description, user_id, created_at, updated_at
        FROM posts
        WHERE id = $1
        "#,
    )
    .bind(post_id)
    .fetch_optional(db)
    .await?;
    Ok(post)
}

pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    title: &str,
    description: &str,
) -> anyhow::Result<Post> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        INSERT INTO posts (title, description, user_id)
        VALUES ($1, $2, $3)
        RETURNING id, title, description, user_id, created_at, updated_at
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(post)
}

pub async fn update(
    db: &PgPool,
    post_id: Uuid,
    title: &str,
    description: &str,
) -> anyhow::Result<Post> {
    let post = sqlx::query_as::<_, Post>(
        r#"
        UPDATE posts
        SET title = $2, description = $3, updated_at = now()
        WHERE id = $1
        RETURNING id, title, description, user_id, created_at, updated_at
        "#,
    )
    .bind(post_id)
    .bind(title)
    .bind(description)
    .fetch_one(db)
    .await?;
    Ok(post)
}

pub async fn delete(db: &PgPool, post_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM posts WHERE id = $1"#)
        .bind(post_id)
        .execute(db)
        .await?;
    Ok(())
}
