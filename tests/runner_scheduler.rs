use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use taskchain::adapter::{AdapterError, AdapterFactory, ChainAdapter};
use taskchain::exec::runner::{ACCOUNT_CAP, Pacing, TaskSetRunner};
use taskchain::exec::scheduler::Scheduler;
use taskchain::model::{Account, NetworkConfig, NetworkFamily, RepeatSchedule, TaskSet};
use taskchain::notify::Notifier;
use taskchain::store::{Store, Vault, generate_salt};

struct CountingAdapter {
    calls: AtomicUsize,
}

#[async_trait]
impl ChainAdapter for CountingAdapter {
    fn family(&self) -> NetworkFamily {
        NetworkFamily::Evm
    }

    async fn read_balance(&self, _address: &str) -> Result<U256, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(1_000_000_000_000_000_000u64))
    }

    async fn submit_transfer(
        &self,
        _secret: &str,
        _to: &str,
        _amount: U256,
    ) -> Result<String, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("0xtx".into())
    }

    async fn read_fee_rate(&self) -> Result<U256, AdapterError> {
        Ok(U256::from(1u64))
    }

    async fn gas_funding_amount(&self) -> U256 {
        U256::from(1u64)
    }

    async fn request_faucet(&self, _address: &str) -> Result<Option<String>, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _owner: &str, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

struct Fixture {
    store: Arc<Store>,
    vault: Vault,
    adapter: Arc<CountingAdapter>,
    notifier: Arc<RecordingNotifier>,
}

impl Fixture {
    fn new() -> Fixture {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let vault = Vault::from_passphrase("test-passphrase", &generate_salt()).unwrap();
        Fixture {
            store,
            vault,
            adapter: Arc::new(CountingAdapter { calls: AtomicUsize::new(0) }),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    fn factory(&self) -> AdapterFactory {
        let adapter = Arc::clone(&self.adapter);
        Arc::new(move |_network: &NetworkConfig| adapter.clone() as Arc<dyn ChainAdapter>)
    }

    fn runner(&self) -> Arc<TaskSetRunner> {
        Arc::new(TaskSetRunner {
            store: Arc::clone(&self.store),
            vault: self.vault.clone(),
            notifier: self.notifier.clone(),
            adapters: self.factory(),
            pacing: Pacing::none(),
        })
    }

    async fn add_accounts(&self, n: usize) -> Vec<String> {
        let mut addresses = Vec::new();
        for i in 0..n {
            let address = format!("0x{i:040x}");
            self.store
                .add_account(&Account {
                    id: Uuid::new_v4().to_string(),
                    owner: "alice".into(),
                    family: NetworkFamily::Evm,
                    address: address.clone(),
                    sealed_secret: self.vault.seal(&format!("sk-{i}")).unwrap(),
                    sealed_seed_phrase: None,
                    label: format!("acct {i}"),
                    created_at: Utc::now() + ChronoDuration::seconds(i as i64),
                })
                .await
                .unwrap();
            addresses.push(address);
        }
        addresses
    }

    async fn save_set(&self, tasks: &[&str], repeat: RepeatSchedule) -> TaskSet {
        let set = TaskSet {
            id: Uuid::new_v4().to_string(),
            owner: "alice".into(),
            name: "daily chores".into(),
            network: NetworkConfig::builtin("1"),
            tasks: tasks.iter().map(|t| t.to_string()).collect(),
            repeat,
            next_run_at: Some(Utc::now() - ChronoDuration::minutes(1)),
            last_run_at: None,
            is_active: true,
        };
        self.store.save_task_set(&set).await.unwrap();
        set
    }
}

#[tokio::test]
async fn runs_every_task_for_every_account_in_order() {
    let fx = Fixture::new();
    let addresses = fx.add_accounts(2).await;
    let set = fx.save_set(&["check balance", "claim faucet"], RepeatSchedule::None).await;

    let results = fx.runner().run(&set).await.unwrap();

    // accounts outer, tasks inner
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].account_address, addresses[0]);
    assert_eq!(results[0].task_text, "check balance");
    assert_eq!(results[1].account_address, addresses[0]);
    assert_eq!(results[1].task_text, "claim faucet");
    assert_eq!(results[2].account_address, addresses[1]);
    assert!(results.iter().all(|r| r.success));

    // one history row per (account, task)
    assert_eq!(fx.store.history_count("alice").await.unwrap(), 4);
}

#[tokio::test]
async fn account_cap_limits_a_run_to_five() {
    let fx = Fixture::new();
    fx.add_accounts(ACCOUNT_CAP + 2).await;
    let set = fx.save_set(&["check balance"], RepeatSchedule::None).await;

    let results = fx.runner().run(&set).await.unwrap();

    assert_eq!(results.len(), ACCOUNT_CAP);
    assert_eq!(fx.adapter.calls.load(Ordering::SeqCst), ACCOUNT_CAP);
}

#[tokio::test]
async fn one_failing_task_does_not_stop_the_run() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    // the middle task cannot be parameterized and fails closed
    let set = fx
        .save_set(&["check balance", "send everything", "claim faucet"], RepeatSchedule::None)
        .await;

    let results = fx.runner().run(&set).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].success);
    assert!(!results[1].success);
    assert!(results[1].message.contains("no amount"));
    assert!(results[2].success);
}

#[tokio::test]
async fn schedule_updates_once_at_the_end() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    let set = fx.save_set(&["check balance"], RepeatSchedule::Hourly).await;
    let before = Utc::now();

    fx.runner().run(&set).await.unwrap();

    let stored = fx.store.task_set(&set.id).await.unwrap().unwrap();
    assert!(stored.last_run_at.unwrap() >= before - ChronoDuration::seconds(1));
    // hourly: next run roughly an hour out, anchored to completion time
    let next = stored.next_run_at.unwrap();
    assert!(next > before + ChronoDuration::minutes(59));
    assert!(next < before + ChronoDuration::minutes(61));
}

#[tokio::test]
async fn no_network_snapshot_is_a_recorded_aggregate_failure() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    let mut set = fx.save_set(&["check balance"], RepeatSchedule::None).await;
    set.network = None;
    fx.store.save_task_set(&set).await.unwrap();

    let results = fx.runner().run(&set).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert!(results[0].message.contains("no network snapshot"));
    assert_eq!(fx.adapter.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn swap_without_a_known_router_parks_the_task_for_replay() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    let mut set = fx.save_set(
        &["swap 0.1 for 0x3333333333333333333333333333333333333333"],
        RepeatSchedule::None,
    )
    .await;
    set.network = Some(NetworkConfig {
        network_id: "424242".into(),
        name: "Homechain".into(),
        rpc_url: "http://127.0.0.1:1".into(),
        native_symbol: "HOME".into(),
        decimals: 18,
        explorer_url: None,
        is_testnet: true,
        family: NetworkFamily::Evm,
    });
    fx.store.save_task_set(&set).await.unwrap();

    let results = fx.runner().run(&set).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    let parked = fx.store.take_pending_tasks("alice", "424242").await.unwrap();
    assert_eq!(parked.len(), 1);
    assert!(parked[0].starts_with("swap 0.1"));
    // taking drains the queue
    assert!(fx.store.take_pending_tasks("alice", "424242").await.unwrap().is_empty());
}

#[tokio::test]
async fn parked_tasks_are_capped_per_owner_and_oldest_first() {
    let fx = Fixture::new();
    for i in 0..10 {
        fx.store
            .park_pending_task("bob", "1", &format!("task {i}"))
            .await
            .unwrap();
    }
    assert_eq!(fx.store.pending_task_count("bob").await.unwrap(), 8);

    let tasks = fx.store.take_pending_tasks("bob", "1").await.unwrap();
    assert_eq!(tasks.first().map(String::as_str), Some("task 2"));
    assert_eq!(tasks.last().map(String::as_str), Some("task 9"));
    assert_eq!(fx.store.pending_task_count("bob").await.unwrap(), 0);
}

#[tokio::test]
async fn transfer_with_an_address_but_no_amount_fails_closed() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    let set = fx
        .save_set(
            &["send everything to 0x2222222222222222222222222222222222222222"],
            RepeatSchedule::None,
        )
        .await;

    let results = fx.runner().run(&set).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert!(results[0].message.contains("no amount"));
    // nothing was submitted: the address's leading zero is not an amount
    assert_eq!(fx.adapter.calls.load(Ordering::SeqCst), 0);
}

// ── Scheduler ───────────────────────────────────────────────────────

#[tokio::test]
async fn tick_with_nothing_due_touches_nothing() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    // active but not due for another hour
    let mut set = fx.save_set(&["check balance"], RepeatSchedule::Hourly).await;
    set.next_run_at = Some(Utc::now() + ChronoDuration::hours(1));
    fx.store.save_task_set(&set).await.unwrap();

    let scheduler = Scheduler::new(Arc::clone(&fx.store), fx.runner());
    let started = scheduler.tick(Utc::now()).await.unwrap();

    assert_eq!(started, 0);
    assert_eq!(fx.adapter.calls.load(Ordering::SeqCst), 0);
    assert!(fx.notifier.messages.lock().unwrap().is_empty());
}

#[tokio::test]
async fn tick_runs_due_sets_and_rearms_them() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    let set = fx.save_set(&["check balance"], RepeatSchedule::Hourly).await;

    let scheduler = Scheduler::new(Arc::clone(&fx.store), fx.runner());
    let now = Utc::now();
    let started = scheduler.tick(now).await.unwrap();

    assert_eq!(started, 1);
    assert_eq!(fx.adapter.calls.load(Ordering::SeqCst), 1);

    let stored = fx.store.task_set(&set.id).await.unwrap().unwrap();
    assert!(stored.next_run_at.unwrap() > now);

    // re-armed in the future means an immediate second tick is a no-op
    assert_eq!(scheduler.tick(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn null_snapshot_set_is_rearmed_instead_of_rerunning_every_tick() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    let mut set = fx.save_set(&["check balance"], RepeatSchedule::Hourly).await;
    set.network = None;
    fx.store.save_task_set(&set).await.unwrap();

    let scheduler = Scheduler::new(Arc::clone(&fx.store), fx.runner());
    assert_eq!(scheduler.tick(Utc::now()).await.unwrap(), 1);
    assert_eq!(fx.store.history_count("alice").await.unwrap(), 1);

    // the aggregate failure still re-arms the schedule an hour out
    let stored = fx.store.task_set(&set.id).await.unwrap().unwrap();
    assert!(stored.next_run_at.unwrap() > Utc::now());
    assert_eq!(scheduler.tick(Utc::now()).await.unwrap(), 0);
    assert_eq!(fx.store.history_count("alice").await.unwrap(), 1);
}

#[tokio::test]
async fn inactive_and_non_repeating_sets_are_never_due() {
    let fx = Fixture::new();
    fx.add_accounts(1).await;
    let once = fx.save_set(&["check balance"], RepeatSchedule::None).await;
    let mut paused = once.clone();
    paused.id = Uuid::new_v4().to_string();
    paused.name = "paused chores".into();
    paused.repeat = RepeatSchedule::Daily;
    paused.is_active = false;
    fx.store.save_task_set(&paused).await.unwrap();

    let scheduler = Scheduler::new(Arc::clone(&fx.store), fx.runner());
    assert_eq!(scheduler.tick(Utc::now()).await.unwrap(), 0);
}
