use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Gap between activity pings (in seconds) at or above which the gap is idle
/// time and excluded from the active total. Fixed, no configuration surface.
pub const IDLE_THRESHOLD_SECONDS: i64 = 300;

/// One active browsing session per (user, module) client tab. Lives in Redis
/// while active; written to `page_view_sessions` once ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageViewSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub module_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub total_active_seconds: i64,
    pub ended: bool,
}

impl PageViewSession {
    pub fn begin(user_id: &str, module_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            module_id: module_id.to_string(),
            start_time: now,
            last_activity: now,
            total_active_seconds: 0,
            ended: false,
        }
    }

    /// Folds one activity ping into the session. The gap since the previous
    /// ping counts as active time only when `0 <= gap < IDLE_THRESHOLD_SECONDS`;
    /// a gap at exactly the threshold is idle. `last_activity` always advances.
    /// Returns the seconds counted by this ping.
    pub fn apply_activity(&mut self, now: DateTime<Utc>) -> i64 {
        let delta = (now - self.last_activity).num_seconds();
        let counted = if (0..IDLE_THRESHOLD_SECONDS).contains(&delta) {
            delta
        } else {
            0
        };
        self.total_active_seconds += counted;
        self.last_activity = now;
        counted
    }
}

/// Per-user, per-day, per-module accumulation of active seconds. One row per
/// key; incremented, never decremented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTimeLog {
    pub user_id: String,
    pub date: String,
    pub module_id: String,
    pub time_seconds: i64,
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub user_id: String,
    pub module_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddTimeRequest {
    pub user_id: String,
    pub module_id: String,
    /// `YYYY-MM-DD`; defaults to today (UTC) when omitted.
    #[serde(default)]
    pub date: Option<String>,
    pub seconds: i64,
}

#[cfg(test)]
mod tests {
    use super::{PageViewSession, IDLE_THRESHOLD_SECONDS};
    use chrono::{Duration, TimeZone, Utc};

    fn start() -> chrono::DateTime<chrono::Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn short_gaps_accumulate_idle_gaps_do_not() {
        let t0 = start();
        let mut session = PageViewSession::begin("user-1", "module-1", t0);

        assert_eq!(session.apply_activity(t0 + Duration::seconds(100)), 100);
        // 100 -> 400 is a 300-second gap, at the threshold, so idle.
        assert_eq!(session.apply_activity(t0 + Duration::seconds(400)), 0);
        assert_eq!(session.total_active_seconds, 100);
        assert_eq!(session.last_activity, t0 + Duration::seconds(400));
    }

    #[test]
    fn gap_just_under_threshold_counts() {
        let t0 = start();
        let mut session = PageViewSession::begin("user-1", "module-1", t0);
        let gap = IDLE_THRESHOLD_SECONDS - 1;
        assert_eq!(session.apply_activity(t0 + Duration::seconds(gap)), gap);
        assert_eq!(session.total_active_seconds, gap);
    }

    #[test]
    fn backwards_clock_counts_nothing_but_still_advances() {
        let t0 = start();
        let mut session = PageViewSession::begin("user-1", "module-1", t0);
        let earlier = t0 - Duration::seconds(5);
        assert_eq!(session.apply_activity(earlier), 0);
        assert_eq!(session.total_active_seconds, 0);
        assert_eq!(session.last_activity, earlier);
    }

    #[test]
    fn begin_starts_fresh() {
        let t0 = start();
        let session = PageViewSession::begin("user-1", "module-1", t0);
        assert_eq!(session.total_active_seconds, 0);
        assert!(!session.ended);
        assert_eq!(session.start_time, session.last_activity);
    }
}
