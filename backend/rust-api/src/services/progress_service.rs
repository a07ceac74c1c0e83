use anyhow::anyhow;
use chrono::Utc;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Database;
use validator::Validate;

use crate::error::{is_duplicate_key, EngineError, EngineResult};
use crate::metrics::{track_db_operation, PROGRESS_RECOMPUTES_TOTAL};
use crate::models::progress::{
    CreateProgressRequest, ModuleProgress, PatchProgressRequest, ProgressTotals,
};
use crate::registry::ContentRegistry;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

use super::ensure_module_exists;

/// Recomputes module completion aggregates. Always a full rescan of every
/// registered content kind: incremental counters drift when content is added
/// or removed after views exist, a recompute cannot.
pub struct ProgressService {
    mongo: Database,
    registry: ContentRegistry,
}

impl ProgressService {
    pub fn new(mongo: Database, registry: ContentRegistry) -> Self {
        Self { mongo, registry }
    }

    /// Recompute and persist the (user, module) aggregate. Idempotent: with no
    /// intervening view-record changes, re-running it is a pure no-op on
    /// stored values.
    pub async fn update_progress(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> EngineResult<ModuleProgress> {
        ensure_module_exists(&self.mongo, module_id).await?;

        let retry_cfg = RetryConfig::default();
        let mut totals = ProgressTotals::default();

        for kind in self.registry.kinds() {
            let source = self.registry.source(kind)?;
            let item_ids = retry_async_with_config(retry_cfg.clone(), || async {
                source.list_item_ids(module_id).await
            })
            .await?;

            totals.total_contents += item_ids.len() as i64;
            if item_ids.is_empty() {
                continue;
            }

            let id_strings: Vec<Bson> = item_ids
                .iter()
                .map(|id| Bson::String(id.to_string()))
                .collect();
            let filter = doc! {
                "user_id": user_id,
                "kind": kind.as_str(),
                "item_id": { "$in": id_strings },
                "viewed": true,
            };
            let viewed = retry_async_with_config(retry_cfg.clone(), || async {
                self.mongo
                    .collection::<Document>("view_records")
                    .count_documents(filter.clone())
                    .await
                    .map_err(EngineError::from)
            })
            .await?;
            totals.contents_completed += viewed as i64;
        }

        let progress = self.persist(user_id, module_id, totals).await?;
        PROGRESS_RECOMPUTES_TOTAL.inc();

        tracing::debug!(
            "Progress recomputed for user {} in module {}: {}/{} ({}%)",
            user_id,
            module_id,
            progress.contents_completed,
            progress.total_contents,
            progress.progress_percentage
        );

        Ok(progress)
    }

    async fn persist(
        &self,
        user_id: &str,
        module_id: &str,
        totals: ProgressTotals,
    ) -> EngineResult<ModuleProgress> {
        let collection = self.mongo.collection::<ModuleProgress>("module_progress");
        let filter = doc! { "user_id": user_id, "module_id": module_id };
        let update = doc! {
            "$set": {
                "contents_completed": totals.contents_completed,
                "total_contents": totals.total_contents,
                "progress_percentage": totals.percentage(),
                "completed": totals.is_complete(),
                "updated_at": Utc::now().to_rfc3339(),
            },
            "$setOnInsert": { "liked": false, "pinned": false },
        };

        track_db_operation("upsert", "module_progress", async {
            collection
                .update_one(filter.clone(), update)
                .upsert(true)
                .await
                .map_err(EngineError::from)
        })
        .await?;

        collection
            .find_one(filter)
            .await?
            .ok_or_else(|| EngineError::Internal(anyhow!("progress row missing after upsert")))
    }

    /// Administrative create. Duplicates surface as `Conflict` here, unlike
    /// the engine-driven upsert path.
    pub async fn create_progress(
        &self,
        request: CreateProgressRequest,
    ) -> EngineResult<ModuleProgress> {
        request.validate()?;
        ensure_module_exists(&self.mongo, &request.module_id).await?;

        let row = ModuleProgress {
            user_id: request.user_id.clone(),
            module_id: request.module_id.clone(),
            completed: request.completed,
            pinned: request.pinned,
            liked: request.liked,
            contents_completed: request.contents_completed,
            total_contents: request.total_contents,
            progress_percentage: request.progress_percentage,
            updated_at: Utc::now(),
        };

        let collection = self.mongo.collection::<ModuleProgress>("module_progress");
        match collection.insert_one(&row).await {
            Ok(_) => {
                tracing::info!(
                    "Progress row created for user {} in module {}",
                    row.user_id,
                    row.module_id
                );
                Ok(row)
            }
            Err(err) if is_duplicate_key(&err) => Err(EngineError::conflict(format!(
                "Progress for user {} in module {} already exists",
                request.user_id, request.module_id
            ))),
            Err(err) => Err(err.into()),
        }
    }

    /// Administrative partial update of an existing row.
    pub async fn patch_progress(
        &self,
        user_id: &str,
        module_id: &str,
        request: PatchProgressRequest,
    ) -> EngineResult<ModuleProgress> {
        request.validate()?;

        let mut set = doc! { "updated_at": Utc::now().to_rfc3339() };
        if let Some(completed) = request.completed {
            set.insert("completed", completed);
        }
        if let Some(pinned) = request.pinned {
            set.insert("pinned", pinned);
        }
        if let Some(liked) = request.liked {
            set.insert("liked", liked);
        }
        if let Some(contents_completed) = request.contents_completed {
            set.insert("contents_completed", contents_completed);
        }
        if let Some(total_contents) = request.total_contents {
            set.insert("total_contents", total_contents);
        }
        if let Some(progress_percentage) = request.progress_percentage {
            set.insert("progress_percentage", progress_percentage);
        }

        let collection = self.mongo.collection::<ModuleProgress>("module_progress");
        let filter = doc! { "user_id": user_id, "module_id": module_id };
        let result = collection
            .update_one(filter.clone(), doc! { "$set": set })
            .await?;
        if result.matched_count == 0 {
            return Err(EngineError::not_found(format!(
                "No progress for user {} in module {}",
                user_id, module_id
            )));
        }

        collection
            .find_one(filter)
            .await?
            .ok_or_else(|| EngineError::Internal(anyhow!("progress row missing after update")))
    }
}
