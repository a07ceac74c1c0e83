use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::content::ContentKind;

/// Per-user, per-item view record. At most one per (user, kind, item) — the
/// unique index on `view_records` enforces it. `viewed` is one-way: the engine
/// never un-sets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewRecord {
    pub user_id: String,
    pub kind: ContentKind,
    pub item_id: String,
    pub viewed: bool,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

/// Per-user, per-module aggregate. One row per (user, module); counts and
/// percentage are always recomputed from scratch, never patched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleProgress {
    pub user_id: String,
    pub module_id: String,
    pub completed: bool,
    pub pinned: bool,
    pub liked: bool,
    pub contents_completed: i64,
    pub total_contents: i64,
    pub progress_percentage: f64,
    pub updated_at: DateTime<Utc>,
}

impl ModuleProgress {
    /// Row created when the first interaction arrives before any content was
    /// viewed: counts are zero until the next recompute.
    pub fn interaction_stub(
        user_id: &str,
        module_id: &str,
        liked: bool,
        pinned: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            module_id: module_id.to_string(),
            completed: false,
            pinned,
            liked,
            contents_completed: 0,
            total_contents: 0,
            progress_percentage: 0.0,
            updated_at: now,
        }
    }
}

/// Scan totals accumulated across all registered content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressTotals {
    pub contents_completed: i64,
    pub total_contents: i64,
}

impl ProgressTotals {
    pub fn percentage(&self) -> f64 {
        if self.total_contents > 0 {
            round2(100.0 * self.contents_completed as f64 / self.total_contents as f64)
        } else {
            0.0
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total_contents > 0 && self.contents_completed == self.total_contents
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Upvote counter change for a like-flag transition. Only real transitions
/// move the counter; repeats are no-ops.
pub fn upvote_delta(previous_liked: bool, liked: bool) -> i64 {
    match (previous_liked, liked) {
        (false, true) => 1,
        (true, false) => -1,
        _ => 0,
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkViewedRequest {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct MarkViewedResponse {
    pub module_id: String,
    pub completed: bool,
    pub contents_completed: i64,
    pub total_contents: i64,
    pub progress_percentage: f64,
    pub viewed_at: Option<DateTime<Utc>>,
}

impl MarkViewedResponse {
    pub fn from_progress(progress: &ModuleProgress, viewed_at: Option<DateTime<Utc>>) -> Self {
        Self {
            module_id: progress.module_id.clone(),
            completed: progress.completed,
            contents_completed: progress.contents_completed,
            total_contents: progress.total_contents,
            progress_percentage: progress.progress_percentage,
            viewed_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletedContentQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CompletedContentResponse {
    pub module_id: String,
    pub content_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecomputeRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetInteractionRequest {
    pub user_id: String,
    pub liked: bool,
    pub pinned: bool,
}

#[derive(Debug, Serialize)]
pub struct SetInteractionResponse {
    pub module_id: String,
    pub liked: bool,
    pub pinned: bool,
    pub upvotes: i64,
}

/// Administrative create of a progress row. Unlike the engine-driven path this
/// surfaces `Conflict` on duplicates instead of upserting.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProgressRequest {
    pub user_id: String,
    pub module_id: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub contents_completed: i64,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub total_contents: i64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub progress_percentage: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PatchProgressRequest {
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub pinned: Option<bool>,
    #[serde(default)]
    pub liked: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub contents_completed: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub total_contents: Option<i64>,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub progress_percentage: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::{upvote_delta, ProgressTotals};
    use validator::Validate;

    #[test]
    fn empty_module_is_zero_percent_and_never_complete() {
        let totals = ProgressTotals::default();
        assert_eq!(totals.percentage(), 0.0);
        assert!(!totals.is_complete());
    }

    #[test]
    fn percentage_is_rounded_to_two_decimals() {
        let one_of_three = ProgressTotals {
            contents_completed: 1,
            total_contents: 3,
        };
        assert_eq!(one_of_three.percentage(), 33.33);

        let two_of_three = ProgressTotals {
            contents_completed: 2,
            total_contents: 3,
        };
        assert_eq!(two_of_three.percentage(), 66.67);
    }

    #[test]
    fn full_module_is_complete() {
        let totals = ProgressTotals {
            contents_completed: 3,
            total_contents: 3,
        };
        assert_eq!(totals.percentage(), 100.0);
        assert!(totals.is_complete());
    }

    #[test]
    fn partial_module_is_not_complete() {
        let totals = ProgressTotals {
            contents_completed: 2,
            total_contents: 3,
        };
        assert!(!totals.is_complete());
    }

    #[test]
    fn upvote_delta_moves_only_on_transitions() {
        assert_eq!(upvote_delta(false, true), 1);
        assert_eq!(upvote_delta(true, false), -1);
        assert_eq!(upvote_delta(true, true), 0);
        assert_eq!(upvote_delta(false, false), 0);
    }

    #[test]
    fn admin_create_rejects_out_of_range_percentage() {
        let request = super::CreateProgressRequest {
            user_id: "u".into(),
            module_id: "m".into(),
            completed: false,
            pinned: false,
            liked: false,
            contents_completed: 0,
            total_contents: 0,
            progress_percentage: 120.0,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn admin_patch_accepts_boundary_percentages() {
        let request = super::PatchProgressRequest {
            completed: None,
            pinned: None,
            liked: None,
            contents_completed: None,
            total_contents: None,
            progress_percentage: Some(100.0),
        };
        assert!(request.validate().is_ok());
    }
}
