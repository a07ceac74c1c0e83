use anyhow::Context;
use mongodb::bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::{Client as MongoClient, Database, IndexModel};
use redis::aio::ConnectionManager;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::models::ModuleRecord;
use crate::registry::ContentRegistry;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
    pub registry: ContentRegistry,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        // Test connection
        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        ensure_indexes(&mongo).await?;

        let registry = ContentRegistry::mongo_defaults(&mongo);

        Ok(Self {
            config,
            mongo,
            redis,
            registry,
        })
    }
}

/// The uniqueness constraints are load-bearing for correctness (concurrent
/// upserts serialize on them), so they live in the storage layer, not just in
/// application logic.
pub async fn ensure_indexes(mongo: &Database) -> anyhow::Result<()> {
    unique_index(
        mongo,
        "view_records",
        doc! { "user_id": 1, "kind": 1, "item_id": 1 },
    )
    .await?;
    unique_index(mongo, "module_progress", doc! { "user_id": 1, "module_id": 1 }).await?;
    unique_index(
        mongo,
        "daily_time_logs",
        doc! { "user_id": 1, "date": 1, "module_id": 1 },
    )
    .await?;
    Ok(())
}

async fn unique_index(mongo: &Database, collection: &str, keys: Document) -> anyhow::Result<()> {
    let index = IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build();
    mongo
        .collection::<Document>(collection)
        .create_index(index)
        .await
        .with_context(|| format!("Failed to create unique index on {}", collection))?;
    Ok(())
}

/// Module existence gate shared by every operation that takes a module id.
/// Fails with `NotFound` before any mutation happens.
pub(crate) async fn ensure_module_exists(mongo: &Database, module_id: &str) -> EngineResult<()> {
    let modules = mongo.collection::<ModuleRecord>("modules");
    modules
        .find_one(doc! { "_id": module_id })
        .await?
        .map(|_| ())
        .ok_or_else(|| EngineError::not_found(format!("Module {} not found", module_id)))
}

pub mod engagement_service;
pub mod interaction_service;
pub mod progress_service;
pub mod view_service;
