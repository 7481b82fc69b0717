use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::exec::task::{classify, TaskKind};

/// A task list pulled out of free-form text, ready to save as a task set.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedTaskList {
    /// One imperative line per task, in execution order.
    pub tasks: Vec<String>,
    /// Network id mentioned in the text, when one was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
}

/// A swap spelled out in free-form text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwapIntent {
    pub from_asset: String,
    pub to_asset: String,
    /// Human decimal units.
    pub amount: String,
}

/// A funding cascade spelled out in free-form text.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FundingIntent {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    pub targets: Vec<String>,
}

/// Pulls structured intent out of free-form text. The production extractor
/// can sit on a language model returning JSON against the schemas above;
/// `None` always means "could not extract", never a guess.
#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract_tasks(&self, text: &str) -> Option<ExtractedTaskList>;
}

/// Fallback extractor: splits on line breaks and task separators and keeps
/// the lines that classify as a known task kind.
pub struct RuleBasedExtractor;

#[async_trait]
impl IntentExtractor for RuleBasedExtractor {
    async fn extract_tasks(&self, text: &str) -> Option<ExtractedTaskList> {
        let tasks: Vec<String> = text
            .split(['\n', ';'])
            .flat_map(|part| part.split(" then "))
            .map(str::trim)
            .filter(|line| !line.is_empty() && classify(line) != TaskKind::Unknown)
            .map(String::from)
            .collect();
        if tasks.is_empty() {
            return None;
        }
        Some(ExtractedTaskList { tasks, network_id: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_on_separators_and_drops_noise() {
        let list = RuleBasedExtractor
            .extract_tasks("check balance then swap 0.1 for 0xdead; good luck")
            .await
            .unwrap();
        assert_eq!(list.tasks, vec!["check balance", "swap 0.1 for 0xdead"]);
    }

    #[tokio::test]
    async fn nothing_recognizable_is_none() {
        assert!(RuleBasedExtractor.extract_tasks("hello there").await.is_none());
    }
}
