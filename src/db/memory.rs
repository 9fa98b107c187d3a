use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::db::Store;
use crate::error::{AppError, AppResult};
use crate::models::{normalize_pair, Connection, Reaction, ReactionKind, User};

/// In-memory store backing the test suites
///
/// Mirrors `PgStore` behavior, including the canonical pair ordering and
/// the derived match count. The write lock makes the conditional append a
/// single check-and-mutate step, matching the conditional UPDATE on the
/// Postgres side.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    reactions: HashMap<(i64, i64), Reaction>,
    connections: Vec<Connection>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> AppResult<User> {
        let mut inner = self.inner.write().await;

        if inner
            .users
            .iter()
            .any(|u| u.username == username || u.email == email)
        {
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        let user = User {
            id: inner.users.len() as i64 + 1,
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.users.push(user.clone());

        Ok(user)
    }

    async fn find_user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .iter()
            .find(|u| u.username == login || u.email == login)
            .cloned())
    }

    async fn record_reaction(
        &self,
        user_id: i64,
        movie_id: i64,
        kind: ReactionKind,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.reactions.insert(
            (user_id, movie_id),
            Reaction {
                user_id,
                movie_id,
                kind,
                reacted_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn positive_movie_ids(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reactions
            .values()
            .filter(|r| r.user_id == user_id && r.kind.is_positive())
            .map(|r| r.movie_id)
            .collect())
    }

    async fn reacted_movie_ids(&self, user_id: i64) -> AppResult<HashSet<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .reactions
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.movie_id)
            .collect())
    }

    async fn has_positive_reaction(&self, user_id: i64, movie_id: i64) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner
            .reactions
            .get(&(user_id, movie_id))
            .is_some_and(|r| r.kind.is_positive()))
    }

    async fn create_connection(&self, user_a: i64, user_b: i64) -> AppResult<Connection> {
        if user_a == user_b {
            return Err(AppError::InvalidInput(
                "Cannot connect a user to themselves".to_string(),
            ));
        }

        let (lo, hi) = normalize_pair(user_a, user_b);
        let mut inner = self.inner.write().await;

        if inner
            .connections
            .iter()
            .any(|c| c.user1_id == lo && c.user2_id == hi)
        {
            return Err(AppError::Conflict(
                "A connection between these users already exists".to_string(),
            ));
        }

        let conn = Connection {
            id: inner.connections.len() as i64 + 1,
            user1_id: lo,
            user2_id: hi,
            connected_at: Utc::now(),
            is_active: true,
            match_count: 0,
            matched_movies: vec![],
            last_match_at: None,
        };
        inner.connections.push(conn.clone());

        Ok(conn)
    }

    async fn get_connection(&self, user_a: i64, user_b: i64) -> AppResult<Option<Connection>> {
        let (lo, hi) = normalize_pair(user_a, user_b);
        let inner = self.inner.read().await;
        Ok(inner
            .connections
            .iter()
            .find(|c| c.user1_id == lo && c.user2_id == hi)
            .cloned())
    }

    async fn list_active_connections(&self, user_id: i64) -> AppResult<Vec<Connection>> {
        let inner = self.inner.read().await;
        let mut conns: Vec<Connection> = inner
            .connections
            .iter()
            .filter(|c| c.is_active && c.involves(user_id))
            .cloned()
            .collect();
        conns.sort_by(|a, b| {
            b.connected_at
                .cmp(&a.connected_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(conns)
    }

    async fn update_connection_matches(
        &self,
        connection_id: i64,
        movies: &[i64],
        last_match_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let conn = inner
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or_else(|| AppError::NotFound(format!("Connection {}", connection_id)))?;

        conn.matched_movies = movies.to_vec();
        conn.match_count = movies.len() as i32;
        if let Some(at) = last_match_at {
            conn.last_match_at = Some(at);
        }

        Ok(())
    }

    async fn append_match_if_absent(
        &self,
        connection_id: i64,
        movie_id: i64,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let conn = inner
            .connections
            .iter_mut()
            .find(|c| c.id == connection_id)
            .ok_or_else(|| AppError::NotFound(format!("Connection {}", connection_id)))?;

        if conn.matched_movies.contains(&movie_id) {
            return Ok(false);
        }

        conn.matched_movies.push(movie_id);
        conn.match_count = conn.matched_movies.len() as i32;
        conn.last_match_at = Some(at);

        Ok(true)
    }
}
