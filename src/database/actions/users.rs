use crate::{
    error::QueryError,
    schema::{Id, NewUser, User, UserRole},
};

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, QueryError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Inserts an account whose password is already hashed.
pub async fn register_user(pool: &Pool<Postgres>, user: NewUser) -> Result<User, QueryError> {
    let is_superuser = user.role == UserRole::Superuser;

    let row: User = sqlx::query_as(
        "
        INSERT INTO users (email, password, first_name, last_name, is_staff, is_superuser)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
    ",
    )
    .bind(user.email)
    .bind(user.password)
    .bind(user.first_name)
    .bind(user.last_name)
    .bind(is_superuser)
    .bind(is_superuser)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn update_user(pool: &Pool<Postgres>, user: &User) -> Result<User, QueryError> {
    let row: User = sqlx::query_as(
        "
        UPDATE users SET
        email = $2,
        password = $3,
        first_name = $4,
        last_name = $5,
        is_active = $6,
        is_staff = $7,
        is_superuser = $8,
        last_login = $9
        WHERE id = $1
        RETURNING *
    ",
    )
    .bind(user.id)
    .bind(&user.email)
    .bind(&user.password)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(user.is_superuser)
    .bind(user.last_login)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn insert_token(
    pool: &Pool<Postgres>,
    user_id: Id,
    digest: &str,
    issued_at: DateTime<Utc>,
) -> Result<(), QueryError> {
    sqlx::query("INSERT INTO auth_tokens (digest, user_id, created_at) VALUES ($1, $2, $3)")
        .bind(digest)
        .bind(user_id)
        .bind(issued_at)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn find_token_user(
    pool: &Pool<Postgres>,
    digest: &str,
    issued_after: Option<DateTime<Utc>>,
) -> Result<Option<User>, QueryError> {
    let row: Option<User> = sqlx::query_as(
        "
        SELECT u.*
        FROM auth_tokens t
        INNER JOIN users u ON u.id = t.user_id
        WHERE t.digest = $1 AND ($2::timestamptz IS NULL OR t.created_at > $2)
    ",
    )
    .bind(digest)
    .bind(issued_after)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn delete_token(pool: &Pool<Postgres>, digest: &str) -> Result<bool, QueryError> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE digest = $1")
        .bind(digest)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn prune_tokens(
    pool: &Pool<Postgres>,
    user_id: Id,
    issued_before: DateTime<Utc>,
) -> Result<u64, QueryError> {
    let result = sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1 AND created_at <= $2")
        .bind(user_id)
        .bind(issued_before)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
