//! `PostgreSQL` repositories.
//!
//! Every statement runs inside a `db.query` span. Token replacement locks the
//! owning user row first, so two logins for the same user serialize and the
//! later one wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, Span};

use super::{TokenRepo, UserRepo};
use crate::auth::{
    error::StoreError,
    models::{NewUser, User, UserChanges, WriteOutcome, decode_scope},
    token::{Token, TokenDigest},
};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password, scope, created_at, updated_at";

fn query_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct PgUserRepo {
    pool: PgPool,
}

impl PgUserRepo {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        Ok(user)
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY last_name, first_name, id");
        let users = sqlx::query_as::<_, User>(&query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;
        Ok(users)
    }

    async fn insert(&self, user: &NewUser) -> Result<WriteOutcome, StoreError> {
        let query = format!(
            "INSERT INTO users (first_name, last_name, email, password, scope) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&query)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.scope.to_delimited())
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match result {
            Ok(user) => Ok(WriteOutcome::Written(user)),
            Err(err) if is_unique_violation(&err) => Ok(WriteOutcome::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    async fn update(&self, id: i64, changes: &UserChanges) -> Result<WriteOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4, \
             password = COALESCE($5, password), scope = COALESCE($6, scope), \
             updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&changes.first_name)
            .bind(&changes.last_name)
            .bind(&changes.email)
            .bind(changes.password_hash.as_deref())
            .bind(changes.scope.as_ref().map(|scope| scope.to_delimited()))
            .fetch_optional(&mut *tx)
            .instrument(query_span("UPDATE", &query))
            .await;

        let user = match result {
            Ok(Some(user)) => user,
            Ok(None) => return Ok(WriteOutcome::NotFound),
            Err(err) if is_unique_violation(&err) => return Ok(WriteOutcome::Conflict),
            Err(err) => return Err(err.into()),
        };

        if changes.revokes_tokens() {
            let delete = "DELETE FROM tokens WHERE user_id = $1";
            sqlx::query(delete)
                .bind(id)
                .execute(&mut *tx)
                .instrument(query_span("DELETE", delete))
                .await?;
        }

        tx.commit().await?;
        Ok(WriteOutcome::Written(user))
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let query = "DELETE FROM users WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let query = "SELECT 1";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct PgTokenRepo {
    pool: PgPool,
}

impl PgTokenRepo {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn token_from_row(row: &PgRow, user_id: i64) -> Result<Token, StoreError> {
    let hash: Vec<u8> = row.try_get("token_hash")?;
    let digest = TokenDigest::from_slice(&hash)
        .ok_or_else(|| StoreError::Corrupt(format!("token digest of {} bytes", hash.len())))?;
    let scope: String = row.try_get("token_scope")?;
    let expiry: DateTime<Utc> = row.try_get("expiry")?;
    Ok(Token {
        user_id,
        digest,
        scope: decode_scope(&scope)?,
        expiry,
    })
}

#[async_trait]
impl TokenRepo for PgTokenRepo {
    async fn replace_for_user(&self, token: &Token) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let lock = "SELECT id FROM users WHERE id = $1 FOR UPDATE";
        sqlx::query(lock)
            .bind(token.user_id)
            .fetch_one(&mut *tx)
            .instrument(query_span("SELECT", lock))
            .await?;

        let delete = "DELETE FROM tokens WHERE user_id = $1";
        sqlx::query(delete)
            .bind(token.user_id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", delete))
            .await?;

        let insert = "INSERT INTO tokens (user_id, token_hash, scope, expiry) VALUES ($1, $2, $3, $4)";
        sqlx::query(insert)
            .bind(token.user_id)
            .bind(token.digest.as_bytes())
            .bind(token.scope.to_delimited())
            .bind(token.expiry)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", insert))
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &TokenDigest,
    ) -> Result<Option<(User, Token)>, StoreError> {
        let query = "SELECT t.token_hash, t.scope AS token_scope, t.expiry, \
             u.id, u.first_name, u.last_name, u.email, u.password, u.scope, \
             u.created_at, u.updated_at \
             FROM tokens t INNER JOIN users u ON u.id = t.user_id \
             WHERE t.token_hash = $1";
        let row = sqlx::query(query)
            .bind(digest.as_bytes())
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = User::from_row(&row)?;
        let token = token_from_row(&row, user.id)?;
        Ok(Some((user, token)))
    }

    async fn delete_by_digest(&self, digest: &TokenDigest) -> Result<(), StoreError> {
        let query = "DELETE FROM tokens WHERE token_hash = $1";
        sqlx::query(query)
            .bind(digest.as_bytes())
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(())
    }

    async fn delete_for_user(&self, user_id: i64) -> Result<u64, StoreError> {
        let query = "DELETE FROM tokens WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;
        Ok(result.rows_affected())
    }
}
