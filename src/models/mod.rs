use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base URL for TMDB image assets
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";

/// A registered user
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A user's verdict on one movie
///
/// `dislike` is recorded but excluded from matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Dislike,
    Indicate,
}

impl ReactionKind {
    /// Parses the wire representation (`like` / `dislike` / `indicate`)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(ReactionKind::Like),
            "dislike" => Some(ReactionKind::Dislike),
            "indicate" => Some(ReactionKind::Indicate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
            ReactionKind::Indicate => "indicate",
        }
    }

    /// Whether this reaction counts toward matches
    pub fn is_positive(&self) -> bool {
        matches!(self, ReactionKind::Like | ReactionKind::Indicate)
    }
}

impl std::fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (user, movie) reaction row, last-write-wins
#[derive(Debug, Clone, Serialize)]
pub struct Reaction {
    pub user_id: i64,
    pub movie_id: i64,
    pub kind: ReactionKind,
    pub reacted_at: DateTime<Utc>,
}

/// Normalizes an unordered user pair to its canonical (min, max) storage order
pub fn normalize_pair(a: i64, b: i64) -> (i64, i64) {
    (a.min(b), a.max(b))
}

/// A symmetric pairing of two users, with the denormalized match cache
///
/// Stored canonically with `user1_id < user2_id`. `match_count` always
/// equals `matched_movies.len()`; the store derives it on every write.
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    pub id: i64,
    pub user1_id: i64,
    pub user2_id: i64,
    pub connected_at: DateTime<Utc>,
    pub is_active: bool,
    pub match_count: i32,
    pub matched_movies: Vec<i64>,
    pub last_match_at: Option<DateTime<Utc>>,
}

impl Connection {
    /// Returns the member that is not `user_id`
    pub fn partner_of(&self, user_id: i64) -> i64 {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }

    pub fn involves(&self, user_id: i64) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Catalog listing category, drawn by weight during discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Popular,
    TopRated,
    NowPlaying,
    Upcoming,
}

impl Category {
    /// URL path segment for the TMDB listing endpoint
    pub fn as_path(&self) -> &'static str {
        match self {
            Category::Popular => "popular",
            Category::TopRated => "top_rated",
            Category::NowPlaying => "now_playing",
            Category::Upcoming => "upcoming",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_path())
    }
}

/// One movie entry from a TMDB listing page
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogMovie {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u32,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl CatalogMovie {
    /// Year component of the release date, empty when unknown
    pub fn release_year(&self) -> String {
        self.release_date
            .as_deref()
            .and_then(|d| d.split('-').next())
            .unwrap_or_default()
            .to_string()
    }

    pub fn poster_url(&self) -> String {
        self.poster_path
            .as_deref()
            .map(|p| format!("{}/w500{}", IMAGE_BASE_URL, p))
            .unwrap_or_default()
    }

    pub fn backdrop_url(&self) -> String {
        self.backdrop_path
            .as_deref()
            .map(|p| format!("{}/original{}", IMAGE_BASE_URL, p))
            .unwrap_or_default()
    }
}

/// Raw TMDB listing page response
#[derive(Debug, Deserialize)]
pub struct TmdbPage {
    #[serde(default)]
    pub results: Vec<CatalogMovie>,
}

/// Detail record for a single movie (genre names come from here, the
/// listing pages only carry genre ids)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MovieDetails {
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Genre {
    pub name: String,
}

/// Raw TMDB videos response
#[derive(Debug, Deserialize)]
pub struct TmdbVideoList {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideo {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub video_type: String,
}

impl TmdbVideoList {
    /// First YouTube trailer in the list, as a watch URL
    pub fn trailer_url(&self) -> Option<String> {
        self.results
            .iter()
            .find(|v| v.video_type == "Trailer" && v.site == "YouTube")
            .and_then(|v| v.key.as_deref())
            .map(|key| format!("https://www.youtube.com/watch?v={}", key))
    }
}

/// A discovery candidate returned to the client
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredMovie {
    pub id: i64,
    pub title: String,
    pub poster_path: String,
    pub backdrop_path: String,
    pub overview: String,
    pub vote_average: f64,
    pub release_year: String,
    pub genres: Vec<String>,
    pub category: Category,
    pub trailer_url: Option<String>,
    pub attempts: u32,
    pub total_seen: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_kind_parse() {
        assert_eq!(ReactionKind::parse("like"), Some(ReactionKind::Like));
        assert_eq!(ReactionKind::parse("dislike"), Some(ReactionKind::Dislike));
        assert_eq!(ReactionKind::parse("indicate"), Some(ReactionKind::Indicate));
        assert_eq!(ReactionKind::parse("love"), None);
        assert_eq!(ReactionKind::parse("LIKE"), None);
    }

    #[test]
    fn test_reaction_kind_positive() {
        assert!(ReactionKind::Like.is_positive());
        assert!(ReactionKind::Indicate.is_positive());
        assert!(!ReactionKind::Dislike.is_positive());
    }

    #[test]
    fn test_reaction_kind_serde_roundtrip() {
        let json = serde_json::to_string(&ReactionKind::Indicate).unwrap();
        assert_eq!(json, r#""indicate""#);
        let back: ReactionKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReactionKind::Indicate);
    }

    #[test]
    fn test_normalize_pair() {
        assert_eq!(normalize_pair(7, 3), (3, 7));
        assert_eq!(normalize_pair(3, 7), (3, 7));
    }

    #[test]
    fn test_partner_of() {
        let conn = Connection {
            id: 1,
            user1_id: 3,
            user2_id: 7,
            connected_at: Utc::now(),
            is_active: true,
            match_count: 0,
            matched_movies: vec![],
            last_match_at: None,
        };
        assert_eq!(conn.partner_of(3), 7);
        assert_eq!(conn.partner_of(7), 3);
        assert!(conn.involves(3));
        assert!(!conn.involves(4));
    }

    #[test]
    fn test_catalog_movie_deserialize_defaults() {
        // TMDB omits fields freely; everything but id/title must default
        let json = r#"{"id": 550, "title": "Fight Club"}"#;
        let movie: CatalogMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.id, 550);
        assert_eq!(movie.vote_average, 0.0);
        assert_eq!(movie.vote_count, 0);
        assert_eq!(movie.poster_path, None);
        assert_eq!(movie.release_year(), "");
    }

    #[test]
    fn test_catalog_movie_urls() {
        let json = r#"{
            "id": 550,
            "title": "Fight Club",
            "poster_path": "/poster.jpg",
            "backdrop_path": "/backdrop.jpg",
            "release_date": "1999-10-15"
        }"#;
        let movie: CatalogMovie = serde_json::from_str(json).unwrap();
        assert_eq!(movie.poster_url(), "https://image.tmdb.org/t/p/w500/poster.jpg");
        assert_eq!(
            movie.backdrop_url(),
            "https://image.tmdb.org/t/p/original/backdrop.jpg"
        );
        assert_eq!(movie.release_year(), "1999");
    }

    #[test]
    fn test_category_paths() {
        assert_eq!(Category::Popular.as_path(), "popular");
        assert_eq!(Category::TopRated.as_path(), "top_rated");
        assert_eq!(Category::NowPlaying.as_path(), "now_playing");
        assert_eq!(Category::Upcoming.as_path(), "upcoming");
    }

    #[test]
    fn test_trailer_url_picks_first_youtube_trailer() {
        let json = r#"{
            "results": [
                {"key": "clip1", "site": "YouTube", "type": "Clip"},
                {"key": "vimeo1", "site": "Vimeo", "type": "Trailer"},
                {"key": "abc123", "site": "YouTube", "type": "Trailer"},
                {"key": "def456", "site": "YouTube", "type": "Trailer"}
            ]
        }"#;
        let videos: TmdbVideoList = serde_json::from_str(json).unwrap();
        assert_eq!(
            videos.trailer_url(),
            Some("https://www.youtube.com/watch?v=abc123".to_string())
        );
    }

    #[test]
    fn test_trailer_url_none_when_no_youtube_trailer() {
        let json = r#"{"results": [{"key": "clip1", "site": "YouTube", "type": "Featurette"}]}"#;
        let videos: TmdbVideoList = serde_json::from_str(json).unwrap();
        assert_eq!(videos.trailer_url(), None);
    }
}
