use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::Database;

use crate::error::{EngineError, EngineResult};
use crate::models::content::ContentKind;

/// The only two operations the engine needs from the content-authoring
/// subsystem, per kind: enumerate a module's items and resolve an item to its
/// owning module.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn list_item_ids(&self, module_id: &str) -> EngineResult<Vec<String>>;
    async fn resolve_module(&self, item_id: &str) -> EngineResult<Option<String>>;
}

/// Mongo-backed source reading a kind's own collection. Items carry a UUID
/// `_id` and a `module_id` field; nothing else is assumed about their shape.
pub struct MongoContentSource {
    mongo: Database,
    collection: &'static str,
}

impl MongoContentSource {
    pub fn new(mongo: Database, kind: ContentKind) -> Self {
        Self {
            mongo,
            collection: kind.collection(),
        }
    }
}

#[async_trait]
impl ContentSource for MongoContentSource {
    async fn list_item_ids(&self, module_id: &str) -> EngineResult<Vec<String>> {
        let collection = self.mongo.collection::<Document>(self.collection);
        let mut cursor = collection
            .find(doc! { "module_id": module_id })
            .projection(doc! { "_id": 1 })
            .await?;

        let mut ids = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            let raw = item.get_str("_id").map_err(|_| {
                EngineError::Internal(anyhow::anyhow!(
                    "{} item has a non-string _id",
                    self.collection
                ))
            })?;
            ids.push(raw.to_string());
        }
        Ok(ids)
    }

    async fn resolve_module(&self, item_id: &str) -> EngineResult<Option<String>> {
        let collection = self.mongo.collection::<Document>(self.collection);
        let item = collection.find_one(doc! { "_id": item_id }).await?;
        match item {
            Some(item) => {
                let module_id = item.get_str("module_id").map_err(|_| {
                    EngineError::Internal(anyhow::anyhow!(
                        "{} item {} has no module_id",
                        self.collection,
                        item_id
                    ))
                })?;
                Ok(Some(module_id.to_string()))
            }
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for dyn ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ContentSource")
    }
}

/// Kind-to-source dispatch table, built once at startup. The aggregation
/// services never touch concrete content collections directly; they only see
/// this registry.
#[derive(Clone, Default)]
pub struct ContentRegistry {
    sources: HashMap<ContentKind, Arc<dyn ContentSource>>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ContentKind, source: Arc<dyn ContentSource>) {
        self.sources.insert(kind, source);
    }

    /// All six kinds wired to their Mongo collections.
    pub fn mongo_defaults(mongo: &Database) -> Self {
        let mut registry = Self::new();
        for kind in ContentKind::ALL {
            registry.register(kind, Arc::new(MongoContentSource::new(mongo.clone(), kind)));
        }
        registry
    }

    pub fn source(&self, kind: ContentKind) -> EngineResult<&Arc<dyn ContentSource>> {
        self.sources.get(&kind).ok_or_else(|| {
            EngineError::invalid_argument(format!("Content kind {} is not registered", kind))
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = ContentKind> + '_ {
        self.sources.keys().copied()
    }
}
