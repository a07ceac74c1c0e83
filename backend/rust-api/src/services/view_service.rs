use anyhow::anyhow;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson};
use mongodb::Database;
use uuid::Uuid;

use crate::error::{is_duplicate_key, EngineError, EngineResult};
use crate::metrics::{track_db_operation, CONTENT_VIEWS_TOTAL};
use crate::models::content::ContentKind;
use crate::models::progress::{ModuleProgress, ViewRecord};
use crate::registry::ContentRegistry;

use super::ensure_module_exists;
use super::progress_service::ProgressService;

/// Upserts per-item view records and keeps the owning module's aggregate in
/// step. One record per (user, kind, item); marking viewed is one-way.
pub struct ViewService {
    mongo: Database,
    registry: ContentRegistry,
}

impl ViewService {
    pub fn new(mongo: Database, registry: ContentRegistry) -> Self {
        Self { mongo, registry }
    }

    /// Marks (user, kind, item) viewed and recomputes the owning module's
    /// progress. Idempotent: a repeat call returns the existing record with
    /// its original `viewed_at` and identical aggregate values, so blind
    /// client retries and double submissions are safe.
    pub async fn mark_viewed(
        &self,
        user_id: &str,
        kind: ContentKind,
        item_id: Uuid,
    ) -> EngineResult<(ViewRecord, ModuleProgress)> {
        let item_id = item_id.to_string();
        let source = self.registry.source(kind)?;
        let module_id = source.resolve_module(&item_id).await?.ok_or_else(|| {
            EngineError::not_found(format!("{} {} not found", kind, item_id))
        })?;

        let collection = self.mongo.collection::<ViewRecord>("view_records");
        let filter = doc! {
            "user_id": user_id,
            "kind": kind.as_str(),
            "item_id": &item_id,
        };

        let record = match collection.find_one(filter.clone()).await? {
            Some(existing) if existing.viewed => {
                tracing::debug!(
                    "{} {} already viewed by user {}, no-op",
                    kind,
                    item_id,
                    user_id
                );
                existing
            }
            _ => {
                let update = doc! {
                    "$set": {
                        "viewed": true,
                        "viewed_at": Utc::now().to_rfc3339(),
                    },
                };
                let write = track_db_operation("upsert", "view_records", async {
                    collection
                        .update_one(filter.clone(), update)
                        .upsert(true)
                        .await
                        .map_err(EngineError::from)
                })
                .await;
                match write {
                    // Only the winning write counts as a view.
                    Ok(_) => {
                        CONTENT_VIEWS_TOTAL.with_label_values(&[kind.as_str()]).inc();
                    }
                    // Concurrent first view: the unique index picks a winner;
                    // the loser reads the winning record below.
                    Err(EngineError::Storage(err)) if is_duplicate_key(&err) => {}
                    Err(err) => return Err(err),
                }

                tracing::info!("User {} viewed {} {}", user_id, kind, item_id);

                collection.find_one(filter.clone()).await?.ok_or_else(|| {
                    EngineError::Internal(anyhow!("view record missing after upsert"))
                })?
            }
        };

        // Aggregate recompute is idempotent, so running it on the no-op path
        // too keeps the response shape uniform. A failure here leaves the
        // aggregate stale, never wrong: the next recompute repairs it.
        let progress_service = ProgressService::new(self.mongo.clone(), self.registry.clone());
        let progress = progress_service.update_progress(user_id, &module_id).await?;

        Ok((record, progress))
    }

    /// Item ids the user has viewed in the module, across all registered
    /// kinds.
    pub async fn get_completed_content_ids(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> EngineResult<Vec<String>> {
        ensure_module_exists(&self.mongo, module_id).await?;

        let records = self.mongo.collection::<ViewRecord>("view_records");
        let mut completed = Vec::new();

        for kind in self.registry.kinds() {
            let source = self.registry.source(kind)?;
            let item_ids = source.list_item_ids(module_id).await?;
            if item_ids.is_empty() {
                continue;
            }

            let id_strings: Vec<Bson> = item_ids.iter().cloned().map(Bson::String).collect();
            let mut cursor = records
                .find(doc! {
                    "user_id": user_id,
                    "kind": kind.as_str(),
                    "item_id": { "$in": id_strings },
                    "viewed": true,
                })
                .await?;
            while let Some(record) = cursor.try_next().await? {
                completed.push(record.item_id);
            }
        }

        Ok(completed)
    }
}
