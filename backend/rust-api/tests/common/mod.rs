#![allow(dead_code)]

use axum::Router;
use learnhub_api::{config::Config, create_router, services::AppState};
use mongodb::bson::doc;
use std::sync::Arc;

pub const TEST_MODULE: &str = "test-module";

// A second module with a single item, for isolation checks.
pub const OTHER_MODULE: &str = "test-module-other";

// Fixed item ids so every test run hits the same seeded content.
pub const DOC_ITEM: &str = "11111111-1111-4111-8111-111111111111";
pub const VIDEO_ITEM: &str = "22222222-2222-4222-8222-222222222222";
pub const QUIZ_ITEM: &str = "33333333-3333-4333-8333-333333333333";
pub const OTHER_DOC_ITEM: &str = "44444444-4444-4444-8444-444444444444";

pub async fn create_test_app() -> Option<Router> {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    // Integration tests need live MongoDB and Redis instances; skip otherwise.
    if std::env::var("MONGO_URI").is_err() || std::env::var("REDIS_URI").is_err() {
        eprintln!("MONGO_URI / REDIS_URI not set, skipping integration test");
        return None;
    }

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    eprintln!("Test config loaded - Redis URI: {}", config.redis_uri);

    // Connect to test databases
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    // Create app state (connection is established inside)
    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client.clone(), redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    eprintln!("AppState initialized successfully");

    // Seed test data
    seed_test_data(&mongo_client, &config.mongo_database).await;

    // Build test router (same as main app)
    Some(create_router(app_state))
}

async fn seed_test_data(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);

    // Upserts are safe against parallel test binaries seeding the same rows.
    for module_id in [TEST_MODULE, OTHER_MODULE] {
        db.collection::<mongodb::bson::Document>("modules")
            .update_one(
                doc! { "_id": module_id },
                doc! { "$setOnInsert": {
                    "title": "Test Module",
                    "upvotes": 0i64,
                }},
            )
            .upsert(true)
            .await
            .expect("Failed to seed test module");
    }

    for (collection, item_id, module_id) in [
        ("documents", DOC_ITEM, TEST_MODULE),
        ("embedded_videos", VIDEO_ITEM, TEST_MODULE),
        ("quiz_tasks", QUIZ_ITEM, TEST_MODULE),
        ("documents", OTHER_DOC_ITEM, OTHER_MODULE),
    ] {
        db.collection::<mongodb::bson::Document>(collection)
            .update_one(
                doc! { "_id": item_id },
                doc! { "$setOnInsert": {
                    "module_id": module_id,
                    "title": format!("Test item in {}", collection),
                }},
            )
            .upsert(true)
            .await
            .expect("Failed to seed test content item");
    }

    eprintln!("Test modules and content items seeded in MongoDB");
}
