use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::{TestServer, TestServerConfig};
use serde_json::{json, Value};

use matchmovies_api::db::MemoryStore;
use matchmovies_api::error::{AppError, AppResult};
use matchmovies_api::models::{CatalogMovie, Category, MovieDetails};
use matchmovies_api::routes::{create_router, AppState};
use matchmovies_api::services::providers::MovieCatalog;

/// Catalog stub serving a fixed listing page
struct StubCatalog {
    movies: Vec<CatalogMovie>,
}

#[async_trait]
impl MovieCatalog for StubCatalog {
    async fn fetch_page(&self, _category: Category, _page: u32) -> AppResult<Vec<CatalogMovie>> {
        Ok(self.movies.clone())
    }

    async fn fetch_details(&self, _movie_id: i64) -> AppResult<MovieDetails> {
        Ok(MovieDetails::default())
    }

    async fn fetch_trailer(&self, movie_id: i64) -> AppResult<Option<String>> {
        Ok(Some(format!("https://www.youtube.com/watch?v=t{}", movie_id)))
    }
}

/// Catalog stub where every call fails
struct DownCatalog;

#[async_trait]
impl MovieCatalog for DownCatalog {
    async fn fetch_page(&self, _category: Category, _page: u32) -> AppResult<Vec<CatalogMovie>> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }

    async fn fetch_details(&self, _movie_id: i64) -> AppResult<MovieDetails> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }

    async fn fetch_trailer(&self, _movie_id: i64) -> AppResult<Option<String>> {
        Err(AppError::ExternalApi("connection refused".to_string()))
    }
}

fn qualifying_movie(id: i64, rating: f64) -> CatalogMovie {
    CatalogMovie {
        id,
        title: format!("Movie {}", id),
        vote_average: rating,
        vote_count: 2000,
        poster_path: Some(format!("/poster{}.jpg", id)),
        backdrop_path: Some(format!("/backdrop{}.jpg", id)),
        overview: Some("A long enough synopsis for the quality filter to accept.".to_string()),
        release_date: Some("2019-06-01".to_string()),
    }
}

fn create_test_server(catalog: Arc<dyn MovieCatalog>) -> TestServer {
    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        catalog,
    };
    let app = create_router(state);
    let config = TestServerConfig {
        save_cookies: true,
        ..TestServerConfig::default()
    };
    TestServer::new_with_config(app, config).unwrap()
}

fn default_server() -> TestServer {
    create_test_server(Arc::new(StubCatalog {
        movies: vec![
            qualifying_movie(1, 8.5),
            qualifying_movie(2, 7.9),
            qualifying_movie(3, 7.2),
        ],
    }))
}

async fn register_and_login(server: &TestServer, username: &str) {
    let response = server
        .post("/register")
        .json(&json!({
            "email": format!("{}@example.com", username),
            "username": username,
            "password": "hunter2"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = server
        .post("/login")
        .json(&json!({ "username": username, "password": "hunter2" }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_health_check() {
    let server = default_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_register_rejects_missing_fields() {
    let server = default_server();
    let response = server
        .post("/register")
        .json(&json!({ "email": "", "username": "alice", "password": "pw" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejects_duplicates() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    let response = server
        .post("/register")
        .json(&json!({
            "email": "other@example.com",
            "username": "alice",
            "password": "pw"
        }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    let response = server
        .post("/login")
        .json(&json!({ "username": "alice", "password": "wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/login")
        .json(&json!({ "username": "nobody", "password": "hunter2" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_accepts_email_as_identifier() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    let response = server
        .post("/login")
        .json(&json!({ "username": "alice@example.com", "password": "hunter2" }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_movie_routes_require_session() {
    let server = default_server();

    let response = server
        .post("/api/movies/action")
        .json(&json!({ "movie_id": 1, "action": "like" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server.get("/api/movies/matches").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server.get("/api/movies/random").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_action_validates_input() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    let response = server
        .post("/api/movies/action")
        .json(&json!({ "movie_id": "abc", "action": "like" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/movies/action")
        .json(&json!({ "movie_id": 1, "action": "meh" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_connect_validation_and_errors() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    // Non-numeric target
    let response = server
        .post("/api/movies/connect")
        .json(&json!({ "target_user_id": "abc" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Self-connection
    let response = server
        .post("/api/movies/connect")
        .json(&json!({ "target_user_id": 1 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Unknown target
    let response = server
        .post("/api/movies/connect")
        .json(&json!({ "target_user_id": 999 }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connect_rejects_duplicates() {
    let server = default_server();
    register_and_login(&server, "bob").await;
    register_and_login(&server, "alice").await;

    // alice (user 2) connects to bob (user 1); numeric string is accepted
    let response = server
        .post("/api/movies/connect")
        .json(&json!({ "target_user_id": "1" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["partner_username"], "bob");

    let response = server
        .post("/api/movies/connect")
        .json(&json!({ "target_user_id": 1 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reaction_connect_and_match_flow() {
    let server = default_server();

    register_and_login(&server, "alice").await;
    let response = server
        .post("/api/movies/action")
        .json(&json!({ "movie_id": 42, "action": "like" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["new_matches"], 0);

    // bob logs in (session cookie now carries bob), connects and reacts
    register_and_login(&server, "bob").await;
    let response = server
        .post("/api/movies/connect")
        .json(&json!({ "target_user_id": 1 }))
        .await;
    response.assert_status_ok();

    let response = server
        .post("/api/movies/action")
        .json(&json!({ "movie_id": 42, "action": "like" }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["new_matches"], 1);

    // The match shows up for bob, attributed to alice
    let response = server.get("/api/movies/matches").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_matches"], 1);
    assert_eq!(body["matches"][0]["movie_id"], 42);
    assert_eq!(body["matches"][0]["partner_username"], "alice");

    // Connection listing reflects the cached count
    let response = server.get("/api/movies/connections").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["connections"][0]["match_count"], 1);
}

#[tokio::test]
async fn test_bulk_recompute_covers_reactions_before_connecting() {
    let server = default_server();

    // Both users react before any connection exists
    register_and_login(&server, "alice").await;
    server
        .post("/api/movies/action")
        .json(&json!({ "movie_id": 7, "action": "indicate" }))
        .await
        .assert_status_ok();

    register_and_login(&server, "bob").await;
    server
        .post("/api/movies/action")
        .json(&json!({ "movie_id": 7, "action": "like" }))
        .await
        .assert_status_ok();

    server
        .post("/api/movies/connect")
        .json(&json!({ "target_user_id": 1 }))
        .await
        .assert_status_ok();

    // Opening the history view reconciles the pre-existing reactions
    let response = server.post("/api/movies/check_and_create_matches").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_matches"], 1);

    let response = server.get("/api/movies/matches").await;
    let body: Value = response.json();
    assert_eq!(body["total_matches"], 1);
    assert_eq!(body["matches"][0]["movie_id"], 7);
}

#[tokio::test]
async fn test_discovery_excludes_reacted_movies() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    // React to two of the three stub movies
    for movie_id in [1, 2] {
        server
            .post("/api/movies/action")
            .json(&json!({ "movie_id": movie_id, "action": "dislike" }))
            .await
            .assert_status_ok();
    }

    let response = server.get("/api/movies/random").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["id"], 3);
    assert_eq!(body["trailer_url"], "https://www.youtube.com/watch?v=t3");
}

#[tokio::test]
async fn test_discovery_exhaustion_after_reacting_to_everything() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    for movie_id in [1, 2, 3] {
        server
            .post("/api/movies/action")
            .json(&json!({ "movie_id": movie_id, "action": "like" }))
            .await
            .assert_status_ok();
    }

    let response = server.get("/api/movies/random").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["total_seen"], 3);
}

#[tokio::test]
async fn test_discovery_survives_catalog_outage() {
    let server = create_test_server(Arc::new(DownCatalog));
    register_and_login(&server, "alice").await;

    // Every attempt fails upstream; the user sees plain exhaustion
    let response = server.get("/api/movies/random").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let server = default_server();
    register_and_login(&server, "alice").await;

    server.get("/logout").await.assert_status_ok();

    let response = server.get("/api/movies/matches").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}
