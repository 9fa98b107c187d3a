//! Match engine: keeps each connection's matched-movie cache consistent
//! with the intersection of both members' positively-reacted movies.
//!
//! Two modes. Full recompute re-derives the whole list from reactions and
//! replaces the stored one; the incremental check runs after a single new
//! positive reaction and only ever appends. The modes diverge on purpose
//! when a reaction flips from positive to negative: the incremental path
//! keeps the recorded match, a later full recompute drops it.

use std::collections::HashSet;

use chrono::Utc;

use crate::db::Store;
use crate::error::AppResult;
use crate::models::{Connection, ReactionKind};

/// Result of one full recompute
#[derive(Debug)]
pub struct RecomputeOutcome {
    /// Matched movie ids, ascending
    pub matched: Vec<i64>,
    /// Whether the stored set actually changed
    pub changed: bool,
}

/// Replaces the connection's match list with the intersection of both
/// members' positive reactions, sorted ascending.
///
/// `last_match_at` is stamped only when the recomputed set differs from
/// the stored one, so rerunning with no new reactions is a no-op.
pub async fn recompute_connection(
    store: &dyn Store,
    conn: &Connection,
) -> AppResult<RecomputeOutcome> {
    let user1_movies = store.positive_movie_ids(conn.user1_id).await?;
    let user2_movies = store.positive_movie_ids(conn.user2_id).await?;

    let mut matched: Vec<i64> = user1_movies.intersection(&user2_movies).copied().collect();
    matched.sort_unstable();

    // Compare as sets: incremental appends store in arrival order.
    let previous: HashSet<i64> = conn.matched_movies.iter().copied().collect();
    let changed =
        previous.len() != matched.len() || !matched.iter().all(|m| previous.contains(m));

    let last_match_at = changed.then(Utc::now);
    store
        .update_connection_matches(conn.id, &matched, last_match_at)
        .await?;

    tracing::debug!(
        connection_id = conn.id,
        matches = matched.len(),
        changed,
        "Recomputed connection matches"
    );

    Ok(RecomputeOutcome { matched, changed })
}

/// Full recompute across every active connection of the user (the
/// history-view trigger). Returns the total number of matched movies.
pub async fn recompute_user_connections(store: &dyn Store, user_id: i64) -> AppResult<usize> {
    let connections = store.list_active_connections(user_id).await?;

    let mut total_matches = 0;
    for conn in &connections {
        let outcome = recompute_connection(store, conn).await?;
        total_matches += outcome.matched.len();
    }

    tracing::info!(
        user_id,
        connections = connections.len(),
        total_matches,
        "Bulk match recompute finished"
    );

    Ok(total_matches)
}

/// Records a reaction and, when it is positive, runs the incremental match
/// check against all of the reactor's active connections. Returns how many
/// connections gained a new match.
pub async fn register_reaction(
    store: &dyn Store,
    user_id: i64,
    movie_id: i64,
    kind: ReactionKind,
) -> AppResult<usize> {
    store.record_reaction(user_id, movie_id, kind).await?;
    tracing::info!(user_id, movie_id, action = %kind, "Reaction recorded");

    if !kind.is_positive() {
        return Ok(0);
    }

    apply_positive_reaction(store, user_id, movie_id).await
}

/// Incremental check for one new positive reaction: for every active
/// connection of the reactor, append the movie when the partner has a
/// positive reaction for it too. Already-present movies are left alone, so
/// a retried reaction cannot double-count, and existing matches are never
/// removed.
pub async fn apply_positive_reaction(
    store: &dyn Store,
    user_id: i64,
    movie_id: i64,
) -> AppResult<usize> {
    let mut appended = 0;

    for conn in store.list_active_connections(user_id).await? {
        let partner = conn.partner_of(user_id);
        if !store.has_positive_reaction(partner, movie_id).await? {
            continue;
        }

        if store
            .append_match_if_absent(conn.id, movie_id, Utc::now())
            .await?
        {
            appended += 1;
            tracing::info!(
                connection_id = conn.id,
                movie_id,
                partner_id = partner,
                "New match"
            );
        }
    }

    Ok(appended)
}
