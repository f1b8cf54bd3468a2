use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::json;
use uuid::Uuid;

use crayon_api::error::AppResult;
use crayon_api::models::{AgeGroup, ContentItem, Difficulty, User};
use crayon_api::routes::{create_router, AppState};
use crayon_api::services::recommendation::{JitterSource, RecommendationService};
use crayon_api::services::store::{CatalogStore, InteractionLog, UserStore};

/// Pins the popularity jitter so ranking follows download counts alone
struct FixedJitter(f64);

impl JitterSource for FixedJitter {
    fn draw(&self) -> f64 {
        self.0
    }
}

struct InMemoryCatalog {
    items: Vec<ContentItem>,
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn most_downloaded(
        &self,
        age_group: Option<AgeGroup>,
        limit: i64,
    ) -> AppResult<Vec<ContentItem>> {
        let mut items: Vec<ContentItem> = self
            .items
            .iter()
            .filter(|item| age_group.map_or(true, |group| item.age_group == group))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.download_count.cmp(&a.download_count));
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn by_ids(&self, ids: &[Uuid]) -> AppResult<Vec<ContentItem>> {
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        Ok(self
            .items
            .iter()
            .filter(|item| wanted.contains(&item.id))
            .cloned()
            .collect())
    }

    async fn by_keywords(
        &self,
        age_group: Option<AgeGroup>,
        keywords: &[String],
    ) -> AppResult<Vec<ContentItem>> {
        Ok(self
            .items
            .iter()
            .filter(|item| age_group.map_or(true, |group| item.age_group == group))
            .filter(|item| item.keywords.iter().any(|k| keywords.contains(k)))
            .cloned()
            .collect())
    }

    async fn search(&self, query: &str) -> AppResult<Vec<ContentItem>> {
        let query = query.to_lowercase();
        Ok(self
            .items
            .iter()
            .filter(|item| item.character_name.to_lowercase().contains(&query))
            .cloned()
            .collect())
    }
}

struct InMemoryLog {
    downloads: Vec<(Uuid, Uuid)>,
}

#[async_trait]
impl InteractionLog for InMemoryLog {
    async fn downloads_by_user(&self, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .downloads
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, item)| *item)
            .collect())
    }

    async fn downloaders_of_item(&self, item_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self
            .downloads
            .iter()
            .filter(|(_, item)| *item == item_id)
            .map(|(user, _)| *user)
            .collect())
    }
}

struct InMemoryUsers {
    users: Vec<User>,
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn by_id(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.iter().find(|user| user.id == user_id).cloned())
    }
}

fn item(
    name: &str,
    keywords: &[&str],
    difficulty: Difficulty,
    age_group: AgeGroup,
    downloads: i64,
) -> ContentItem {
    ContentItem {
        id: Uuid::new_v4(),
        character_name: name.to_string(),
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        difficulty,
        age_group,
        download_count: downloads,
    }
}

fn user(id: Uuid, age_group: Option<AgeGroup>) -> User {
    User {
        id,
        age_group,
        preferences: None,
    }
}

fn create_test_server(
    items: Vec<ContentItem>,
    downloads: Vec<(Uuid, Uuid)>,
    users: Vec<User>,
) -> TestServer {
    let catalog: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog { items });
    let interactions: Arc<dyn InteractionLog> = Arc::new(InMemoryLog { downloads });
    let user_store: Arc<dyn UserStore> = Arc::new(InMemoryUsers { users });

    let recommender = Arc::new(RecommendationService::new(
        Arc::clone(&catalog),
        interactions,
        user_store,
        None,
        Arc::new(FixedJitter(0.5)),
        Duration::from_millis(1000),
    ));

    let state = AppState {
        recommender,
        catalog,
        cache: None,
    };

    TestServer::new(create_router(state)).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server(vec![], vec![], vec![]);
    let response = server.get("/health").await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_anonymous_age_scoped_request_uses_popularity() {
    let items = vec![
        item("Sleepy Dragon", &["dragon"], Difficulty::Easy, AgeGroup::Child, 50),
        item("Tiny Robot", &["robot"], Difficulty::Easy, AgeGroup::Child, 10),
        item("Castle Gate", &["castle"], Difficulty::Medium, AgeGroup::Child, 100),
        item("Mandala Garden", &["mandala"], Difficulty::Hard, AgeGroup::Adult, 500),
    ];
    let server = create_test_server(items, vec![], vec![]);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "ageGroup": "child" }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["strategyUsed"], "age_based_popularity");
    assert_eq!(body["confidence"], 0.7);

    let returned = body["items"].as_array().unwrap();
    assert_eq!(returned.len(), 3);
    for entry in returned {
        assert_eq!(entry["ageGroup"], "child");
    }

    // Fixed jitter, so download count decides the order
    assert_eq!(returned[0]["characterName"], "Castle Gate");
    assert_eq!(returned[1]["characterName"], "Sleepy Dragon");
    assert_eq!(returned[2]["characterName"], "Tiny Robot");
}

#[tokio::test]
async fn test_anonymous_global_request_is_hybrid() {
    let items = vec![item(
        "Sleepy Dragon",
        &["dragon"],
        Difficulty::Easy,
        AgeGroup::Child,
        5,
    )];
    let server = create_test_server(items, vec![], vec![]);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({}))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["strategyUsed"], "hybrid");
    assert_eq!(body["confidence"], 0.5);
}

#[tokio::test]
async fn test_user_without_history_falls_back_to_hybrid() {
    let user_id = Uuid::new_v4();
    let items = vec![item(
        "Tiny Robot",
        &["robot"],
        Difficulty::Easy,
        AgeGroup::Teen,
        7,
    )];
    let server = create_test_server(items, vec![], vec![user(user_id, Some(AgeGroup::Teen))]);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "userId": user_id }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["strategyUsed"], "hybrid");
    assert_eq!(body["confidence"], 0.6);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_collaborative_filtering_from_shared_downloads() {
    // U downloaded A and B; V and W downloaded A, B and C. Both share two
    // downloads with U, so C is recommended with two similar users backing it.
    let u = Uuid::new_v4();
    let v = Uuid::new_v4();
    let w = Uuid::new_v4();

    let a = item("Sleepy Dragon", &["dragon"], Difficulty::Easy, AgeGroup::Child, 30);
    let b = item("Castle Gate", &["castle"], Difficulty::Easy, AgeGroup::Child, 20);
    let c = item("Fire Dragon", &["dragon", "fire"], Difficulty::Medium, AgeGroup::Child, 10);

    let downloads = vec![
        (u, a.id),
        (u, b.id),
        (v, a.id),
        (v, b.id),
        (v, c.id),
        (w, a.id),
        (w, b.id),
        (w, c.id),
    ];
    let users = vec![
        user(u, Some(AgeGroup::Child)),
        user(v, Some(AgeGroup::Child)),
        user(w, Some(AgeGroup::Child)),
    ];
    let c_id = c.id;
    let server = create_test_server(vec![a, b, c], downloads, users);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "userId": u }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["strategyUsed"], "collaborative_filtering");
    // Two similar users out of a cap of ten
    assert_eq!(body["confidence"], 0.2);

    let returned = body["items"].as_array().unwrap();
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0]["id"], json!(c_id));
}

#[tokio::test]
async fn test_content_based_fallback_matches_attributes() {
    // U downloaded only one page, so no collaborative overlap exists; the
    // second dragon page must arrive via attribute similarity.
    let u = Uuid::new_v4();

    let a = item("Sleepy Dragon", &["dragon"], Difficulty::Easy, AgeGroup::Child, 30);
    let b = item("Fire Dragon", &["dragon", "fire"], Difficulty::Easy, AgeGroup::Child, 10);
    let unrelated = item("Space Rocket", &["space"], Difficulty::Hard, AgeGroup::Child, 99);

    let downloads = vec![(u, a.id)];
    let b_id = b.id;
    let server = create_test_server(
        vec![a, b, unrelated],
        downloads,
        vec![user(u, Some(AgeGroup::Child))],
    );

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "userId": u }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["strategyUsed"], "content_based");
    assert_eq!(body["confidence"], 0.8);

    let returned = body["items"].as_array().unwrap();
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0]["id"], json!(b_id));
}

#[tokio::test]
async fn test_exclude_downloaded_removes_history_items() {
    // Nothing in the catalog shares keywords with U's download, so the
    // request degrades to popularity, where the owned page would normally
    // rank first.
    let u = Uuid::new_v4();

    let owned = item("Sleepy Dragon", &["dragon"], Difficulty::Easy, AgeGroup::Child, 100);
    let fresh = item("Tiny Robot", &["robot"], Difficulty::Easy, AgeGroup::Child, 50);

    let downloads = vec![(u, owned.id)];
    let owned_id = owned.id;
    let fresh_id = fresh.id;
    let server = create_test_server(
        vec![owned, fresh],
        downloads,
        vec![user(u, Some(AgeGroup::Child))],
    );

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "userId": u, "excludeDownloaded": true }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["strategyUsed"], "hybrid");

    let ids: Vec<serde_json::Value> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].clone())
        .collect();
    assert!(!ids.contains(&json!(owned_id)));
    assert!(ids.contains(&json!(fresh_id)));
}

#[tokio::test]
async fn test_difficulty_preference_filters_results() {
    let items = vec![
        item("Sleepy Dragon", &["dragon"], Difficulty::Easy, AgeGroup::Child, 50),
        item("Castle Gate", &["castle"], Difficulty::Hard, AgeGroup::Child, 80),
        item("Tiny Robot", &["robot"], Difficulty::Easy, AgeGroup::Child, 10),
    ];
    let server = create_test_server(items, vec![], vec![]);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({
            "ageGroup": "child",
            "preferences": { "difficulties": ["easy"] }
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let returned = body["items"].as_array().unwrap();
    assert_eq!(returned.len(), 2);
    for entry in returned {
        assert_eq!(entry["difficulty"], "easy");
    }
}

#[tokio::test]
async fn test_limit_truncates_to_top_scored() {
    let items: Vec<ContentItem> = (0..30)
        .map(|i| {
            item(
                &format!("Page {}", i),
                &["page"],
                Difficulty::Easy,
                AgeGroup::Child,
                i,
            )
        })
        .collect();
    let server = create_test_server(items, vec![], vec![]);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "ageGroup": "child", "limit": 5 }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let returned = body["items"].as_array().unwrap();
    assert_eq!(returned.len(), 5);

    // Top five download counts, in order
    let counts: Vec<i64> = returned
        .iter()
        .map(|entry| entry["downloadCount"].as_i64().unwrap())
        .collect();
    assert_eq!(counts, vec![29, 28, 27, 26, 25]);

    // No duplicate ids in a single response
    let ids: HashSet<String> = returned
        .iter()
        .map(|entry| entry["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), returned.len());
}

#[tokio::test]
async fn test_invalid_limit_is_rejected() {
    let server = create_test_server(vec![], vec![], vec![]);

    for limit in [0, 101] {
        let response = server
            .post("/api/v1/recommendations")
            .json(&json!({ "limit": limit }))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_unknown_age_group_is_rejected() {
    let server = create_test_server(vec![], vec![], vec![]);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "ageGroup": "toddler" }))
        .await;
    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let server = create_test_server(vec![], vec![], vec![]);

    let response = server
        .post("/api/v1/recommendations")
        .json(&json!({ "userId": Uuid::new_v4() }))
        .await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_catalog_search_by_character_name() {
    let items = vec![
        item("Sleepy Dragon", &["dragon"], Difficulty::Easy, AgeGroup::Child, 50),
        item("Fire Dragon", &["dragon"], Difficulty::Medium, AgeGroup::Teen, 20),
        item("Tiny Robot", &["robot"], Difficulty::Easy, AgeGroup::Child, 10),
    ];
    let server = create_test_server(items, vec![], vec![]);

    let response = server.get("/api/v1/catalog/search").add_query_param("q", "dragon").await;
    response.assert_status_ok();

    let returned: Vec<serde_json::Value> = response.json();
    assert_eq!(returned.len(), 2);
    for entry in &returned {
        assert!(entry["characterName"].as_str().unwrap().contains("Dragon"));
    }
}

#[tokio::test]
async fn test_confidence_always_within_unit_interval() {
    let u = Uuid::new_v4();
    let items = vec![item(
        "Sleepy Dragon",
        &["dragon"],
        Difficulty::Easy,
        AgeGroup::Child,
        5,
    )];
    let server = create_test_server(items, vec![], vec![user(u, Some(AgeGroup::Child))]);

    for request in [
        json!({}),
        json!({ "ageGroup": "child" }),
        json!({ "userId": u }),
    ] {
        let response = server.post("/api/v1/recommendations").json(&request).await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        let confidence = body["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }
}
