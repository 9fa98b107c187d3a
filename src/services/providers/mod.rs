use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{CatalogMovie, Category, MovieDetails};

pub mod tmdb;

pub use tmdb::TmdbCatalog;

/// External movie-catalog collaborator
///
/// All calls are best-effort: non-200 responses and timeouts surface as
/// errors the discovery loop absorbs and retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovieCatalog: Send + Sync {
    /// One listing page for the category
    async fn fetch_page(&self, category: Category, page: u32) -> AppResult<Vec<CatalogMovie>>;

    /// Detail record for a movie (genre names)
    async fn fetch_details(&self, movie_id: i64) -> AppResult<MovieDetails>;

    /// First YouTube trailer for a movie, if any
    async fn fetch_trailer(&self, movie_id: i64) -> AppResult<Option<String>>;
}
