use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::models::{Connection, ReactionKind, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::{create_pool, PgStore};

/// Persistence seam consumed by the match engine, discovery, and the routes.
///
/// Passed explicitly wherever it is needed; nothing reaches for a global
/// handle. Every mutation is atomic on its own, and the match-cache writers
/// (`update_connection_matches`, `append_match_if_absent`) always write the
/// movie list and its count together.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<User>;

    async fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>>;

    /// Looks up a user by username or email
    async fn find_user_by_login(&self, login: &str) -> AppResult<Option<User>>;

    /// Upserts the reaction for (user, movie), last write wins
    async fn record_reaction(
        &self,
        user_id: i64,
        movie_id: i64,
        kind: ReactionKind,
    ) -> AppResult<()>;

    /// Movie ids the user reacted to with like or indicate
    async fn positive_movie_ids(&self, user_id: i64) -> AppResult<HashSet<i64>>;

    /// Movie ids the user reacted to with any action
    async fn reacted_movie_ids(&self, user_id: i64) -> AppResult<HashSet<i64>>;

    async fn has_positive_reaction(&self, user_id: i64, movie_id: i64) -> AppResult<bool>;

    /// Creates the connection for an unordered user pair.
    ///
    /// The pair is normalized to (min, max) before storage. Fails with a
    /// validation error when `user_a == user_b` and with a duplicate error
    /// when the pair is already connected in either order.
    async fn create_connection(&self, user_a: i64, user_b: i64) -> AppResult<Connection>;

    /// Fetches the connection for an unordered user pair, if any
    async fn get_connection(&self, user_a: i64, user_b: i64) -> AppResult<Option<Connection>>;

    /// Active connections containing the user, newest first
    async fn list_active_connections(&self, user_id: i64) -> AppResult<Vec<Connection>>;

    /// Replaces the matched-movie list; the count is derived from its
    /// length. `last_match_at` is left untouched when `None`.
    async fn update_connection_matches(
        &self,
        connection_id: i64,
        movies: &[i64],
        last_match_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;

    /// Appends the movie to the connection's match list unless already
    /// present, bumping the count and stamping `last_match_at` in the same
    /// write. Returns whether an append happened. The absence check and the
    /// mutation are one atomic step, so concurrent reactors cannot
    /// double-append.
    async fn append_match_if_absent(
        &self,
        connection_id: i64,
        movie_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;
}
