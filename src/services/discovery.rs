//! Movie discovery: serve one movie the user has not reacted to, drawn
//! from the external catalog with a bias toward higher-rated titles.
//!
//! Stateless and single-shot. Every upstream hiccup (timeout, non-200,
//! empty page, nothing qualifying) burns one attempt and is retried
//! silently; only exhaustion of the attempt budget is reported.

use std::collections::HashSet;

use rand::Rng;

use crate::db::Store;
use crate::error::AppResult;
use crate::models::{CatalogMovie, Category, DiscoveredMovie};
use crate::services::providers::MovieCatalog;

/// Quality floor for candidates
const MIN_RATING: f64 = 6.0;
/// Ratings below this sample size are too noisy to trust
const MIN_VOTE_COUNT: u32 = 100;
/// A synopsis shorter than this is treated as missing
const MIN_OVERVIEW_LEN: usize = 20;
/// Page/category draws before reporting exhaustion
const MAX_ATTEMPTS: u32 = 10;
/// Share of picks that go to the three highest-rated candidates
const TOP_PICK_PROBABILITY: f64 = 0.7;
const TOP_PICK_POOL: usize = 3;
/// Geometric decay per rank for the long-tail draw
const RANK_WEIGHT_DECAY: f64 = 0.8;

struct CategorySpec {
    category: Category,
    weight: u32,
    max_page: u32,
}

/// Draw weights favor the deep, high-quality listings over the small
/// rotating ones.
static CATEGORIES: [CategorySpec; 4] = [
    CategorySpec {
        category: Category::Popular,
        weight: 35,
        max_page: 700,
    },
    CategorySpec {
        category: Category::TopRated,
        weight: 35,
        max_page: 700,
    },
    CategorySpec {
        category: Category::NowPlaying,
        weight: 15,
        max_page: 10,
    },
    CategorySpec {
        category: Category::Upcoming,
        weight: 15,
        max_page: 10,
    },
];

/// Result of one discovery call
#[derive(Debug)]
pub enum DiscoveryOutcome {
    Found(DiscoveredMovie),
    /// Attempt budget spent without a qualifying candidate; a normal
    /// terminal state, not an error
    Exhausted { total_seen: usize },
}

/// Returns one qualifying movie for the user, or `Exhausted` after the
/// attempt budget. The RNG is injected so tests can seed it.
pub async fn discover<R: Rng + Send>(
    store: &dyn Store,
    catalog: &dyn MovieCatalog,
    rng: &mut R,
    user_id: i64,
) -> AppResult<DiscoveryOutcome> {
    let seen = store.reacted_movie_ids(user_id).await?;

    for attempt in 1..=MAX_ATTEMPTS {
        let spec = draw_category(rng);
        let page = draw_page(rng, spec);

        let movies = match catalog.fetch_page(spec.category, page).await {
            Ok(movies) => movies,
            Err(e) => {
                tracing::debug!(
                    category = %spec.category,
                    page,
                    attempt,
                    error = %e,
                    "Listing fetch failed, retrying"
                );
                continue;
            }
        };

        let pool = filter_candidates(movies, &seen);
        if pool.is_empty() {
            continue;
        }

        let movie = match select_candidate(pool, rng) {
            Some(movie) => movie,
            None => continue,
        };

        // Listing rows only carry genre ids; the detail record has names.
        let details = match catalog.fetch_details(movie.id).await {
            Ok(details) => details,
            Err(e) => {
                tracing::debug!(movie_id = movie.id, attempt, error = %e, "Detail fetch failed, retrying");
                continue;
            }
        };

        // Trailer is best-effort: a failed lookup is just "no trailer"
        let trailer_url = catalog.fetch_trailer(movie.id).await.unwrap_or(None);

        tracing::info!(
            movie_id = movie.id,
            category = %spec.category,
            attempt,
            "Discovery candidate selected"
        );

        return Ok(DiscoveryOutcome::Found(DiscoveredMovie {
            id: movie.id,
            title: movie.title.clone(),
            poster_path: movie.poster_url(),
            backdrop_path: movie.backdrop_url(),
            overview: movie.overview.clone().unwrap_or_default(),
            vote_average: (movie.vote_average * 10.0).round() / 10.0,
            release_year: movie.release_year(),
            genres: details.genres.into_iter().map(|g| g.name).collect(),
            category: spec.category,
            trailer_url,
            attempts: attempt,
            total_seen: seen.len(),
        }));
    }

    tracing::info!(user_id, total_seen = seen.len(), "Discovery exhausted");

    Ok(DiscoveryOutcome::Exhausted {
        total_seen: seen.len(),
    })
}

fn draw_category<R: Rng>(rng: &mut R) -> &'static CategorySpec {
    let total: u32 = CATEGORIES.iter().map(|c| c.weight).sum();
    let mut roll = rng.random_range(0..total);

    for spec in &CATEGORIES {
        if roll < spec.weight {
            return spec;
        }
        roll -= spec.weight;
    }

    // Unreachable: the roll is bounded by the weight sum
    &CATEGORIES[0]
}

/// Uniform page draw, except top_rated skews quadratically toward early
/// (higher-ranked) pages.
fn draw_page<R: Rng>(rng: &mut R, spec: &CategorySpec) -> u32 {
    match spec.category {
        Category::TopRated => {
            let r: f64 = rng.random();
            ((r * r * spec.max_page as f64) as u32 + 1).min(spec.max_page)
        }
        _ => rng.random_range(1..=spec.max_page),
    }
}

fn qualifies(movie: &CatalogMovie, seen: &HashSet<i64>) -> bool {
    movie.vote_average >= MIN_RATING
        && movie.vote_count >= MIN_VOTE_COUNT
        && movie.poster_path.is_some()
        && movie
            .overview
            .as_deref()
            .is_some_and(|o| o.trim().len() >= MIN_OVERVIEW_LEN)
        && !seen.contains(&movie.id)
}

/// Drops sub-threshold candidates and everything the user already
/// reacted to.
fn filter_candidates(movies: Vec<CatalogMovie>, seen: &HashSet<i64>) -> Vec<CatalogMovie> {
    movies
        .into_iter()
        .filter(|movie| qualifies(movie, seen))
        .collect()
}

/// Picks one candidate from a qualifying pool.
///
/// With three or more candidates, 70% of picks go uniformly to the three
/// highest-rated; the rest draw from the remaining candidates with
/// geometrically decaying weights by rank. Smaller pools always use the
/// weighted draw over the whole pool.
fn select_candidate<R: Rng>(mut pool: Vec<CatalogMovie>, rng: &mut R) -> Option<CatalogMovie> {
    if pool.is_empty() {
        return None;
    }

    pool.sort_by(|a, b| {
        b.vote_average
            .partial_cmp(&a.vote_average)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let index = if pool.len() >= TOP_PICK_POOL && rng.random::<f64>() < TOP_PICK_PROBABILITY {
        rng.random_range(0..TOP_PICK_POOL)
    } else {
        let tail_start = if pool.len() > TOP_PICK_POOL {
            TOP_PICK_POOL
        } else {
            0
        };
        tail_start + weighted_rank_draw(pool.len() - tail_start, rng)
    };

    Some(pool.swap_remove(index))
}

/// Weighted index draw over `n` ranks with weight `decay^rank`
fn weighted_rank_draw<R: Rng>(n: usize, rng: &mut R) -> usize {
    let total: f64 = (0..n).map(|i| RANK_WEIGHT_DECAY.powi(i as i32)).sum();
    let mut roll = rng.random::<f64>() * total;

    for i in 0..n {
        let weight = RANK_WEIGHT_DECAY.powi(i as i32);
        if roll < weight {
            return i;
        }
        roll -= weight;
    }

    n - 1
}
