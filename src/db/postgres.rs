use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};

use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{normalize_pair, Connection, ReactionKind, User};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Row shape for `connections`; the JSONB match list is decoded here, at
/// the storage boundary, and nowhere else.
#[derive(sqlx::FromRow)]
struct ConnectionRow {
    id: i64,
    user1_id: i64,
    user2_id: i64,
    connected_at: DateTime<Utc>,
    is_active: bool,
    match_count: i32,
    matched_movies: Json<Vec<i64>>,
    last_match_at: Option<DateTime<Utc>>,
}

impl From<ConnectionRow> for Connection {
    fn from(row: ConnectionRow) -> Self {
        Connection {
            id: row.id,
            user1_id: row.user1_id,
            user2_id: row.user2_id,
            connected_at: row.connected_at,
            is_active: row.is_active,
            match_count: row.match_count,
            matched_movies: row.matched_movies.0,
            last_match_at: row.last_match_at,
        }
    }
}

const CONNECTION_COLUMNS: &str =
    "id, user1_id, user2_id, connected_at, is_active, match_count, matched_movies, last_match_at";

#[async_trait]
impl Store for PgStore {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Username or email already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE username = $1 OR email = $1
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn record_reaction(
        &self,
        user_id: i64,
        movie_id: i64,
        kind: ReactionKind,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO reactions (user_id, movie_id, action, reacted_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id, movie_id)
            DO UPDATE SET action = EXCLUDED.action, reacted_at = EXCLUDED.reacted_at
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn positive_movie_ids(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT movie_id FROM reactions
            WHERE user_id = $1 AND action IN ('like', 'indicate')
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn reacted_movie_ids(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        let ids =
            sqlx::query_scalar::<_, i64>("SELECT movie_id FROM reactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids.into_iter().collect())
    }

    async fn has_positive_reaction(&self, user_id: i64, movie_id: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM reactions
                WHERE user_id = $1 AND movie_id = $2 AND action IN ('like', 'indicate')
            )
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_connection(&self, user_a: i64, user_b: i64) -> AppResult<Connection> {
        if user_a == user_b {
            return Err(AppError::InvalidInput(
                "Cannot connect a user to themselves".to_string(),
            ));
        }

        let (lo, hi) = normalize_pair(user_a, user_b);

        // Pre-check for a friendly error; the UNIQUE constraint still backs
        // this up under a check-then-insert race.
        if self.get_connection(lo, hi).await?.is_some() {
            return Err(AppError::Conflict(
                "A connection between these users already exists".to_string(),
            ));
        }

        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            "INSERT INTO connections (user1_id, user2_id) VALUES ($1, $2) RETURNING {}",
            CONNECTION_COLUMNS
        ))
        .bind(lo)
        .bind(hi)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("A connection between these users already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into())
    }

    async fn get_connection(&self, user_a: i64, user_b: i64) -> AppResult<Option<Connection>> {
        let (lo, hi) = normalize_pair(user_a, user_b);

        let row = sqlx::query_as::<_, ConnectionRow>(&format!(
            "SELECT {} FROM connections WHERE user1_id = $1 AND user2_id = $2",
            CONNECTION_COLUMNS
        ))
        .bind(lo)
        .bind(hi)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_active_connections(&self, user_id: i64) -> AppResult<Vec<Connection>> {
        let rows = sqlx::query_as::<_, ConnectionRow>(&format!(
            r#"
            SELECT {} FROM connections
            WHERE (user1_id = $1 OR user2_id = $1) AND is_active = TRUE
            ORDER BY connected_at DESC, id DESC
            "#,
            CONNECTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_connection_matches(
        &self,
        connection_id: i64,
        movies: &[i64],
        last_match_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        // List and count are written together; the count is derived from
        // the list so the two can never drift.
        sqlx::query(
            r#"
            UPDATE connections
            SET matched_movies = $2,
                match_count = jsonb_array_length($2),
                last_match_at = COALESCE($3, last_match_at)
            WHERE id = $1
            "#,
        )
        .bind(connection_id)
        .bind(Json(movies.to_vec()))
        .bind(last_match_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn append_match_if_absent(
        &self,
        connection_id: i64,
        movie_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        // Single conditional UPDATE: the containment guard and the append
        // execute atomically, so two racing reactors for the same
        // connection cannot both append the movie.
        let result = sqlx::query(
            r#"
            UPDATE connections
            SET matched_movies = matched_movies || to_jsonb($2::bigint),
                match_count = jsonb_array_length(matched_movies) + 1,
                last_match_at = $3
            WHERE id = $1 AND NOT matched_movies @> to_jsonb($2::bigint)
            "#,
        )
        .bind(connection_id)
        .bind(movie_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
