use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::adapter::AdapterFactory;
use crate::exec::scheduler::next_run;
use crate::exec::task::TaskExecutor;
use crate::model::{TaskResult, TaskSet};
use crate::notify::Notifier;
use crate::store::{Store, Vault};

/// Hard cap on accounts per run; extra accounts are skipped, not queued.
pub const ACCOUNT_CAP: usize = 5;

/// Randomized pause between consecutive actions.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Pacing {
    /// Organic-looking pacing for live runs.
    pub fn humanized() -> Pacing {
        Pacing { min_ms: 2_000, max_ms: 8_000 }
    }

    /// Zero delay, for tests and dry runs.
    pub fn none() -> Pacing {
        Pacing { min_ms: 0, max_ms: 0 }
    }

    async fn pause(&self) {
        if self.max_ms == 0 {
            return;
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    }
}

/// Runs a task set: every task for every account (accounts outer, tasks
/// inner), recording one history row per (account, task) pair. Individual
/// failures never stop the run; the single schedule update happens at the
/// end regardless of outcomes.
pub struct TaskSetRunner {
    pub store: Arc<Store>,
    pub vault: Vault,
    pub notifier: Arc<dyn Notifier>,
    pub adapters: AdapterFactory,
    pub pacing: Pacing,
}

impl TaskSetRunner {
    pub async fn run(&self, set: &TaskSet) -> Result<Vec<TaskResult>> {
        let Some(network) = set.network.as_ref() else {
            let result = TaskResult {
                task_set_id: Some(set.id.clone()),
                ..TaskResult::failure(
                    "",
                    set.tasks.join("; "),
                    "task set has no network snapshot; re-save it with a network",
                )
            };
            self.store.append_history(&set.owner, &result).await?;
            self.finish_schedule(set).await?;
            return Ok(vec![result]);
        };

        let accounts = self
            .store
            .accounts_for(&set.owner, Some(network.family))
            .await?;
        if accounts.is_empty() {
            let result = TaskResult {
                task_set_id: Some(set.id.clone()),
                ..TaskResult::failure(
                    "",
                    set.tasks.join("; "),
                    format!("no {} accounts saved for this owner", network.family),
                )
            };
            self.store.append_history(&set.owner, &result).await?;
            self.finish_schedule(set).await?;
            return Ok(vec![result]);
        }
        if accounts.len() > ACCOUNT_CAP {
            warn!(
                total = accounts.len(),
                cap = ACCOUNT_CAP,
                "task set has more accounts than the cap; extras skipped"
            );
        }

        self.notifier
            .notify(
                &set.owner,
                &format!(
                    "running task set `{}`: {} tasks across {} accounts on {}",
                    set.name,
                    set.tasks.len(),
                    accounts.len().min(ACCOUNT_CAP),
                    network.name
                ),
            )
            .await;

        let adapter = (self.adapters)(network);
        let executor = TaskExecutor {
            store: &self.store,
            network,
            owner: &set.owner,
            adapter,
        };

        let mut results = Vec::new();
        for account in accounts.iter().take(ACCOUNT_CAP) {
            let secret = match self.vault.unseal(&account.sealed_secret) {
                Ok(s) => s,
                Err(e) => {
                    // Wrong passphrase or corrupt row: skip the account, keep
                    // the run going.
                    for task in &set.tasks {
                        let result = TaskResult {
                            task_set_id: Some(set.id.clone()),
                            ..TaskResult::failure(
                                &account.address,
                                task,
                                format!("could not unseal account secret: {e:#}"),
                            )
                        };
                        self.store.append_history(&set.owner, &result).await?;
                        results.push(result);
                    }
                    continue;
                }
            };

            for task in &set.tasks {
                let action = executor.execute(task, &account.address, &secret).await;
                if action.needs_router_info {
                    // Parked until the owner saves a router; `save-router`
                    // drains and replays these.
                    self.store
                        .park_pending_task(&set.owner, &network.network_id, task)
                        .await?;
                }
                let result = TaskResult {
                    task_set_id: Some(set.id.clone()),
                    account_address: account.address.clone(),
                    task_text: task.clone(),
                    success: action.success,
                    message: action.message.clone(),
                    tx_id: action.tx_id.clone(),
                    executed_at: Utc::now(),
                };
                self.store.append_history(&set.owner, &result).await?;
                self.notifier
                    .notify(
                        &set.owner,
                        &format!(
                            "[{}] {}: {}",
                            account.short_address(),
                            task,
                            if action.success { "ok" } else { "failed" },
                        ),
                    )
                    .await;
                results.push(result);
                self.pacing.pause().await;
            }
        }

        let rearmed = self.finish_schedule(set).await?;

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            set = %set.name,
            succeeded,
            total = results.len(),
            "task set finished"
        );
        let next_hint = rearmed
            .map(|at| format!("; next run {}", at.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default();
        self.notifier
            .notify(
                &set.owner,
                &format!(
                    "task set `{}` finished: {}/{} succeeded{}",
                    set.name,
                    succeeded,
                    results.len(),
                    next_hint
                ),
            )
            .await;
        Ok(results)
    }

    /// The one mutation a run makes to its task set.
    async fn finish_schedule(&self, set: &TaskSet) -> Result<Option<DateTime<Utc>>> {
        let now = Utc::now();
        let at = next_run(set.repeat, now);
        self.store
            .update_task_set_schedule(&set.id, now, at)
            .await?;
        Ok(at)
    }
}
