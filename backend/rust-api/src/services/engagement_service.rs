use anyhow::anyhow;
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::Database;
use redis::aio::ConnectionManager;

use crate::error::{is_duplicate_key, EngineError, EngineResult};
use crate::metrics::{
    track_cache_operation, ACTIVE_SECONDS_RECORDED_TOTAL, PAGE_SESSIONS_ACTIVE,
    PAGE_SESSIONS_TOTAL,
};
use crate::models::session::{DailyTimeLog, PageViewSession};
use crate::utils::time::{date_key, is_valid_date_key};

use super::ensure_module_exists;

/// Redis TTL for an active session. Long enough to survive any realistic
/// browsing pause; refreshed on every ping.
const SESSION_TTL_SECONDS: u64 = 86_400;

fn session_key(session_id: &str) -> String {
    format!("page_session:{}", session_id)
}

/// Active-time session tracking plus the daily time ledger. Sessions live in
/// Redis while active and become durable `page_view_sessions` rows on end.
pub struct EngagementService {
    mongo: Database,
    redis: ConnectionManager,
}

impl EngagementService {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        module_id: &str,
    ) -> EngineResult<PageViewSession> {
        ensure_module_exists(&self.mongo, module_id).await?;

        let session = PageViewSession::begin(user_id, module_id, Utc::now());
        self.store(&session).await?;

        PAGE_SESSIONS_TOTAL.with_label_values(&["started"]).inc();
        PAGE_SESSIONS_ACTIVE.inc();
        tracing::info!(
            "Page session {} started for user {} in module {}",
            session.id,
            user_id,
            module_id
        );

        Ok(session)
    }

    /// Folds one activity ping into the session. Gaps at or above the idle
    /// threshold are excluded from the active total.
    pub async fn record_activity(&self, session_id: &str) -> EngineResult<PageViewSession> {
        let mut session = self.load(session_id).await?;
        let counted = session.apply_activity(Utc::now());
        self.store(&session).await?;

        if counted > 0 {
            ACTIVE_SECONDS_RECORDED_TOTAL.inc_by(counted as u64);
        }
        tracing::debug!(
            "Session {} activity: +{}s active (total {}s)",
            session_id,
            counted,
            session.total_active_seconds
        );

        Ok(session)
    }

    /// One final activity fold, then the session is frozen and its active
    /// total is added into the daily ledger. The durable insert happens before
    /// the ledger `$inc`: a retried end hits the duplicate `_id` and fails
    /// with `InvalidState` instead of double counting.
    pub async fn end_session(&self, session_id: &str) -> EngineResult<PageViewSession> {
        let mut session = self.load(session_id).await?;
        let counted = session.apply_activity(Utc::now());
        session.ended = true;

        let sessions = self.mongo.collection::<PageViewSession>("page_view_sessions");
        match sessions.insert_one(&session).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => {
                // A previous end already went durable; drop the stale cache copy.
                self.discard(session_id).await?;
                return Err(EngineError::invalid_state(format!(
                    "Session {} has already ended",
                    session_id
                )));
            }
            Err(err) => return Err(err.into()),
        }

        if session.total_active_seconds > 0 {
            if let Err(err) = self
                .add_time(
                    &session.user_id,
                    &date_key(session.last_activity),
                    &session.module_id,
                    session.total_active_seconds,
                )
                .await
            {
                // The durable insert already happened, so a retried end gets
                // InvalidState and these seconds cannot be folded again.
                tracing::error!(
                    "Session {} ended but {}s were not folded into the daily ledger \
                     for user {} in module {}: {}",
                    session.id,
                    session.total_active_seconds,
                    session.user_id,
                    session.module_id,
                    err
                );
                return Err(err);
            }
        }
        self.discard(session_id).await?;

        if counted > 0 {
            ACTIVE_SECONDS_RECORDED_TOTAL.inc_by(counted as u64);
        }
        PAGE_SESSIONS_TOTAL.with_label_values(&["ended"]).inc();
        PAGE_SESSIONS_ACTIVE.dec();
        tracing::info!(
            "Page session {} ended with {}s active for user {} in module {}",
            session.id,
            session.total_active_seconds,
            session.user_id,
            session.module_id
        );

        Ok(session)
    }

    /// `$inc` upsert into the daily ledger. Monotonic non-decreasing per
    /// (user, date, module); there is no decrement operation.
    pub async fn add_time(
        &self,
        user_id: &str,
        date: &str,
        module_id: &str,
        seconds: i64,
    ) -> EngineResult<DailyTimeLog> {
        if seconds < 0 {
            return Err(EngineError::invalid_argument(
                "seconds must be non-negative",
            ));
        }
        if !is_valid_date_key(date) {
            return Err(EngineError::invalid_argument(format!(
                "Malformed date key: {} (expected YYYY-MM-DD)",
                date
            )));
        }
        ensure_module_exists(&self.mongo, module_id).await?;

        let collection = self.mongo.collection::<DailyTimeLog>("daily_time_logs");
        let filter = doc! { "user_id": user_id, "date": date, "module_id": module_id };
        collection
            .update_one(filter.clone(), doc! { "$inc": { "time_seconds": seconds } })
            .upsert(true)
            .await?;

        collection
            .find_one(filter)
            .await?
            .ok_or_else(|| EngineError::Internal(anyhow!("time log missing after upsert")))
    }

    async fn store(&self, session: &PageViewSession) -> EngineResult<()> {
        let mut conn = self.redis.clone();
        let payload =
            serde_json::to_string(session).map_err(|e| EngineError::Internal(e.into()))?;

        track_cache_operation("setex", async {
            redis::cmd("SETEX")
                .arg(session_key(&session.id))
                .arg(SESSION_TTL_SECONDS)
                .arg(payload)
                .query_async::<()>(&mut conn)
                .await
                .map_err(EngineError::from)
        })
        .await
    }

    async fn load(&self, session_id: &str) -> EngineResult<PageViewSession> {
        let mut conn = self.redis.clone();
        let payload: Option<String> = track_cache_operation("get", async {
            redis::cmd("GET")
                .arg(session_key(session_id))
                .query_async(&mut conn)
                .await
                .map_err(EngineError::from)
        })
        .await?;

        match payload {
            Some(json) => serde_json::from_str(&json).map_err(|e| EngineError::Internal(e.into())),
            None => {
                // Distinguish "never existed" from "already ended" via the
                // durable store, so a retried call on an ended session gets
                // InvalidState rather than NotFound.
                let sessions = self.mongo.collection::<PageViewSession>("page_view_sessions");
                match sessions.find_one(doc! { "_id": session_id }).await? {
                    Some(session) if session.ended => Err(EngineError::invalid_state(format!(
                        "Session {} has already ended",
                        session_id
                    ))),
                    Some(_) => Err(EngineError::Internal(anyhow!(
                        "session {} evicted from cache before ending",
                        session_id
                    ))),
                    None => Err(EngineError::not_found(format!(
                        "Session {} not found",
                        session_id
                    ))),
                }
            }
        }
    }

    async fn discard(&self, session_id: &str) -> EngineResult<()> {
        let mut conn = self.redis.clone();
        track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(session_key(session_id))
                .query_async::<()>(&mut conn)
                .await
                .map_err(EngineError::from)
        })
        .await
    }
}
