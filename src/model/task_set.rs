use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::network::NetworkConfig;

/// How often a saved task set re-arms itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatSchedule {
    #[default]
    None,
    Hourly,
    Daily,
    Weekly,
}

impl RepeatSchedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatSchedule::None => "none",
            RepeatSchedule::Hourly => "hourly",
            RepeatSchedule::Daily => "daily",
            RepeatSchedule::Weekly => "weekly",
        }
    }
}

impl std::str::FromStr for RepeatSchedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(RepeatSchedule::None),
            "hourly" => Ok(RepeatSchedule::Hourly),
            "daily" => Ok(RepeatSchedule::Daily),
            "weekly" => Ok(RepeatSchedule::Weekly),
            other => Err(format!("unknown schedule `{other}`")),
        }
    }
}

/// A named, ordered list of free-text tasks bound to a frozen network
/// snapshot. The snapshot is a copy taken at save time; later edits to a
/// custom network do not retroactively change a saved task set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSet {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub network: Option<NetworkConfig>,
    pub tasks: Vec<String>,
    pub repeat: RepeatSchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// One normalized execution record. Append-only; forms the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_set_id: Option<String>,
    pub account_address: String,
    pub task_text: String,
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    pub executed_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn failure(account_address: impl Into<String>, task_text: impl Into<String>, message: impl Into<String>) -> TaskResult {
        TaskResult {
            task_set_id: None,
            account_address: account_address.into(),
            task_text: task_text.into(),
            success: false,
            message: message.into(),
            tx_id: None,
            executed_at: Utc::now(),
        }
    }
}
