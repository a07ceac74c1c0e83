use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;

use crate::error::{is_duplicate_key, EngineError, EngineResult};
use crate::metrics::INTERACTIONS_TOTAL;
use crate::models::progress::{upvote_delta, ModuleProgress, SetInteractionResponse};
use crate::models::ModuleRecord;

use super::ensure_module_exists;

/// The module upvote counter must reflect exactly the set of users currently
/// liking it, so each transition is applied once: the progress-row update is
/// compare-and-set on the previously observed `liked` value, and only a
/// confirmed transition performs the atomic `$inc` on the module.
const CAS_MAX_ATTEMPTS: usize = 3;

pub struct InteractionService {
    mongo: Database,
}

impl InteractionService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn set_interaction(
        &self,
        user_id: &str,
        module_id: &str,
        liked: bool,
        pinned: bool,
    ) -> EngineResult<SetInteractionResponse> {
        ensure_module_exists(&self.mongo, module_id).await?;

        let collection = self.mongo.collection::<ModuleProgress>("module_progress");
        let filter = doc! { "user_id": user_id, "module_id": module_id };

        for attempt in 0..CAS_MAX_ATTEMPTS {
            match collection.find_one(filter.clone()).await? {
                None => {
                    let row =
                        ModuleProgress::interaction_stub(user_id, module_id, liked, pinned, Utc::now());
                    match collection.insert_one(&row).await {
                        Ok(_) => {
                            // Creation counts as a false -> liked transition.
                            let delta = upvote_delta(false, liked);
                            if delta != 0 {
                                self.bump_upvotes(module_id, delta).await?;
                            }
                            return self.respond(module_id, liked, pinned).await;
                        }
                        Err(err) if is_duplicate_key(&err) => {
                            // Lost the creation race; re-read and take the
                            // update path.
                            continue;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
                Some(row) => {
                    if row.liked == liked && row.pinned == pinned {
                        return self.respond(module_id, liked, pinned).await;
                    }

                    let delta = upvote_delta(row.liked, liked);
                    let guard = doc! {
                        "user_id": user_id,
                        "module_id": module_id,
                        "liked": row.liked,
                    };
                    let update = doc! {
                        "$set": {
                            "liked": liked,
                            "pinned": pinned,
                            "updated_at": Utc::now().to_rfc3339(),
                        },
                    };
                    let result = collection.update_one(guard, update).await?;
                    if result.modified_count == 0 {
                        tracing::warn!(
                            "Interaction CAS miss for user {} in module {} (attempt {})",
                            user_id,
                            module_id,
                            attempt + 1
                        );
                        continue;
                    }

                    if delta != 0 {
                        self.bump_upvotes(module_id, delta).await?;
                    }
                    return self.respond(module_id, liked, pinned).await;
                }
            }
        }

        Err(EngineError::conflict(format!(
            "Concurrent interaction updates for user {} in module {}",
            user_id, module_id
        )))
    }

    async fn bump_upvotes(&self, module_id: &str, delta: i64) -> EngineResult<()> {
        let modules = self.mongo.collection::<ModuleRecord>("modules");
        modules
            .update_one(
                doc! { "_id": module_id },
                doc! { "$inc": { "upvotes": delta } },
            )
            .await?;

        let action = if delta > 0 { "like" } else { "unlike" };
        INTERACTIONS_TOTAL.with_label_values(&[action]).inc();
        tracing::info!("Module {} upvotes {}", module_id, if delta > 0 { "+1" } else { "-1" });
        Ok(())
    }

    async fn respond(
        &self,
        module_id: &str,
        liked: bool,
        pinned: bool,
    ) -> EngineResult<SetInteractionResponse> {
        let modules = self.mongo.collection::<ModuleRecord>("modules");
        let module = modules
            .find_one(doc! { "_id": module_id })
            .await?
            .ok_or_else(|| EngineError::not_found(format!("Module {} not found", module_id)))?;

        Ok(SetInteractionResponse {
            module_id: module_id.to_string(),
            liked,
            pinned,
            upvotes: module.upvotes,
        })
    }
}
