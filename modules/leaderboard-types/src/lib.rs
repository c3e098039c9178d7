//! Shared types for the leaderboard service and its RPC clients.

use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// Current problem count for a tracked user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRecord {
    pub username: String,
    pub problems_solved: u64,
    pub added_at: String,
    pub updated_at: String,
}

/// Problem count recorded for a user in one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub username: String,
    pub problems_solved: u64,
    /// Calendar month, `YYYY-MM`
    pub period: String,
    pub recorded_at: String,
}

/// One row of a ranked leaderboard. Ranks start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: usize,
    pub username: String,
    pub problems_solved: u64,
}

/// Ranked snapshots for a single month
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period: String,
    pub entries: Vec<RankedEntry>,
}

// =====================================================
// Command Outcomes
// =====================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    Created {
        username: String,
        problems_solved: u64,
        /// False when the initial fetch failed and the count defaulted to 0
        fetched: bool,
    },
    AlreadyExists {
        username: String,
    },
    InvalidIdentity {
        username: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemoveOutcome {
    Removed { username: String },
    NotFound { username: String },
}

/// What happened to the month summary during a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryStatus {
    NotDue,
    Delivered { period: String },
    /// No snapshots existed for the period, nothing was sent
    Empty { period: String },
    DeliveryFailed { period: String, error: String },
}

/// Result of one update cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub period: String,
    pub started_at: String,
    pub finished_at: String,
    pub updated: usize,
    /// Users whose fetch failed and were handled by the degraded policy
    pub degraded: usize,
    /// Users whose store write failed
    pub failed: usize,
    pub summary: SummaryStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cycle", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was already running; this trigger was dropped
    Skipped,
}

// =====================================================
// RPC Request Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AddUserRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveUserRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeriodSummaryRequest {
    pub period: String,
}

/// Raw chat message text forwarded by a chat bridge
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandReply {
    pub reply: String,
}

// =====================================================
// RPC Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RpcResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> RpcResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// =====================================================
// Service Status
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub running: bool,
    pub uptime_secs: u64,
    pub tracked_users: usize,
    pub cycle_running: bool,
    pub last_tick_at: Option<String>,
    pub last_summary_period: Option<String>,
    pub update_interval_secs: u64,
    pub degraded_policy: String,
    pub last_cycle: Option<CycleReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_outcome_is_tagged() {
        let json = serde_json::to_value(AddOutcome::AlreadyExists {
            username: "alice".to_string(),
        })
        .unwrap();
        assert_eq!(json["outcome"], "already_exists");
        assert_eq!(json["username"], "alice");
    }

    #[test]
    fn test_rpc_response_err_omits_data() {
        let resp: RpcResponse<bool> = RpcResponse::err("nope");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"], "nope");
    }

    #[test]
    fn test_cycle_outcome_skipped() {
        let json = serde_json::to_value(CycleOutcome::Skipped).unwrap();
        assert_eq!(json["cycle"], "skipped");
    }
}
