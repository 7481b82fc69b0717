use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use taskchain::adapter;
use taskchain::config::RuntimeConfig;
use taskchain::exec::funding::{self, DEFAULT_INTER_TRANSFER_DELAY};
use taskchain::exec::runner::{Pacing, TaskSetRunner};
use taskchain::exec::scheduler::{Scheduler, next_run};
use taskchain::exec::task::TaskExecutor;
use taskchain::intent::{IntentExtractor, RuleBasedExtractor};
use taskchain::model::amount::parse_units;
use taskchain::model::{
    Account, CascadeFundingRequest, FundingMode, NetworkConfig, NetworkFamily, RepeatSchedule,
    RouterConfig, TaskSet,
};
use taskchain::notify::{LogNotifier, Notifier, WebhookNotifier};
use taskchain::store::{NftContractConfig, Store, Vault};

#[derive(Parser)]
#[command(name = "taskchain", about = "Multi-chain task automation and execution engine")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler daemon (checks for due task sets every 15 minutes).
    Run,
    /// One scheduler pass, then exit.
    Tick,
    /// Run a saved task set by name, right now.
    RunSet { name: String },
    /// Run one task line against every saved account on a network.
    Exec {
        /// Network id ("1", "56", "solana-mainnet", ...).
        network: String,
        /// Task text, e.g. "swap 0.1 for 0x...".
        task: String,
    },
    /// Turn free-form text into a task set: recognized task lines are kept,
    /// the rest is dropped.
    Plan {
        /// Task-set name to save the extracted tasks under.
        name: String,
        #[arg(long)]
        network: String,
        /// Free text, e.g. "check balance then swap 0.1 for 0x...".
        text: String,
        #[arg(long, default_value = "none")]
        repeat: String,
    },
    /// Save (or replace) a named task set.
    SaveSet {
        name: String,
        /// Network id the set is bound to.
        #[arg(long)]
        network: String,
        /// Task lines, in execution order.
        #[arg(long = "task", required = true)]
        tasks: Vec<String>,
        /// none | hourly | daily | weekly
        #[arg(long, default_value = "none")]
        repeat: String,
    },
    /// Cascade-fund targets from a source account's balance.
    Fund {
        network: String,
        /// Source account address (must be saved).
        #[arg(long)]
        from: String,
        /// equal | fixed | gas_only
        #[arg(long)]
        mode: String,
        /// Human units: the total for equal mode, the per-target amount for
        /// fixed mode. Ignored by gas_only.
        #[arg(long)]
        amount: Option<String>,
        /// Target addresses, funded in order.
        #[arg(required = true)]
        targets: Vec<String>,
    },
    /// Seal and save an account secret.
    ImportAccount {
        /// evm | solana | aptos
        #[arg(long)]
        family: String,
        /// Raw secret; sealed before it touches the store.
        #[arg(long)]
        secret: String,
        /// Required for non-EVM families (the address is not derived here).
        #[arg(long)]
        address: Option<String>,
        #[arg(long, default_value = "imported")]
        label: String,
    },
    /// Relabel a saved account.
    Relabel {
        address: String,
        label: String,
    },
    /// Delete a saved account.
    RemoveAccount { address: String },
    /// List saved accounts.
    Accounts,
    /// Pause or resume a saved task set.
    SetActive {
        name: String,
        #[arg(long)]
        active: bool,
    },
    /// Save a custom network.
    SaveNetwork {
        /// Network id (decimal chain id for EVM, named id otherwise).
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        rpc_url: String,
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value_t = 18)]
        decimals: u8,
        /// evm | solana | aptos
        #[arg(long, default_value = "evm")]
        family: String,
        #[arg(long)]
        testnet: bool,
    },
    /// Save an NFT contract so mint tasks on that network skip probing.
    SaveNft {
        network: String,
        #[arg(long)]
        contract: String,
        /// collectible | multi_token | chain_native | name_registration
        #[arg(long, default_value = "collectible")]
        kind: String,
        /// Explicit mint entry point, e.g. "mint" or "publicMint".
        #[arg(long)]
        mint_function: Option<String>,
    },
    /// Save a custom router for a network without a built-in one.
    SaveRouter {
        network: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        router: String,
        #[arg(long)]
        wrapped_native: String,
    },
    /// Show recent execution history.
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = RuntimeConfig::from_env()?;

    let store = Arc::new(Store::open(&config.db_path)?);
    let salt = store.ensure_vault_salt().await?;
    let vault = Vault::from_passphrase(&config.passphrase, &salt)?;
    let notifier: Arc<dyn Notifier> = match &config.webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url)),
        None => Arc::new(LogNotifier),
    };
    let runner = Arc::new(TaskSetRunner {
        store: Arc::clone(&store),
        vault: vault.clone(),
        notifier,
        adapters: adapter::default_factory(),
        pacing: Pacing::humanized(),
    });

    match cli.command {
        Command::Run => {
            let scheduler = Scheduler::new(store, runner);
            scheduler.run_forever().await
        }
        Command::Tick => {
            let scheduler = Scheduler::new(store, runner);
            let started = scheduler.tick(Utc::now()).await?;
            println!("{started} task set(s) run");
            Ok(())
        }
        Command::RunSet { name } => {
            let Some(set) = store.task_set_by_name(&config.owner, &name).await? else {
                bail!("no task set named `{name}`");
            };
            let scheduler = Scheduler::new(Arc::clone(&store), Arc::clone(&runner));
            let results = scheduler.run_now(&set.id).await?;
            for r in &results {
                println!(
                    "[{}] {}: {}{}",
                    r.account_address,
                    r.task_text,
                    r.message,
                    r.tx_id.as_deref().map(|t| format!(" ({t})")).unwrap_or_default(),
                );
            }
            Ok(())
        }
        Command::Exec { network, task } => {
            let net = store
                .resolve_network(&config.owner, &network)
                .await?
                .with_context(|| format!("unknown network `{network}`"))?;
            let accounts = store.accounts_for(&config.owner, Some(net.family)).await?;
            if accounts.is_empty() {
                bail!("no {} accounts saved", net.family);
            }
            let adapter = adapter::for_network(&net);
            let executor = TaskExecutor {
                store: &store,
                network: &net,
                owner: &config.owner,
                adapter,
            };
            for account in accounts.iter().take(taskchain::exec::runner::ACCOUNT_CAP) {
                let secret = vault.unseal(&account.sealed_secret)?;
                let result = executor.execute(&task, &account.address, &secret).await;
                println!(
                    "[{}] {}{}",
                    account.short_address(),
                    result.message,
                    result.tx_id.as_deref().map(|t| format!(" ({t})")).unwrap_or_default(),
                );
            }
            Ok(())
        }
        Command::Plan { name, network, text, repeat } => {
            let Some(extracted) = RuleBasedExtractor.extract_tasks(&text).await else {
                bail!("no recognizable tasks in the given text");
            };
            let net = store
                .resolve_network(&config.owner, &network)
                .await?
                .with_context(|| format!("unknown network `{network}`"))?;
            let repeat = RepeatSchedule::from_str(&repeat).map_err(|e| anyhow::anyhow!(e))?;
            let now = Utc::now();
            let id = match store.task_set_by_name(&config.owner, &name).await? {
                Some(existing) => existing.id,
                None => Uuid::new_v4().to_string(),
            };
            let set = TaskSet {
                id,
                owner: config.owner.clone(),
                name: name.clone(),
                network: Some(net),
                tasks: extracted.tasks,
                repeat,
                next_run_at: next_run(repeat, now),
                last_run_at: None,
                is_active: true,
            };
            store.save_task_set(&set).await?;
            println!("saved task set `{name}`:");
            for task in &set.tasks {
                println!("  - {task}");
            }
            Ok(())
        }
        Command::SaveSet { name, network, tasks, repeat } => {
            let net = store
                .resolve_network(&config.owner, &network)
                .await?
                .with_context(|| format!("unknown network `{network}`"))?;
            let repeat = RepeatSchedule::from_str(&repeat).map_err(|e| anyhow::anyhow!(e))?;
            let now = Utc::now();
            // Keep the id stable across re-saves of the same name.
            let id = match store.task_set_by_name(&config.owner, &name).await? {
                Some(existing) => existing.id,
                None => Uuid::new_v4().to_string(),
            };
            let set = TaskSet {
                id,
                owner: config.owner.clone(),
                name: name.clone(),
                network: Some(net),
                tasks,
                repeat,
                next_run_at: next_run(repeat, now),
                last_run_at: None,
                is_active: true,
            };
            store.save_task_set(&set).await?;
            println!("saved task set `{name}` ({} tasks, repeat {})", set.tasks.len(), repeat.as_str());
            Ok(())
        }
        Command::Fund { network, from, mode, amount, targets } => {
            let net = store
                .resolve_network(&config.owner, &network)
                .await?
                .with_context(|| format!("unknown network `{network}`"))?;
            let mode = match mode.as_str() {
                "equal" => FundingMode::Equal,
                "fixed" => FundingMode::Fixed,
                "gas_only" => FundingMode::GasOnly,
                other => bail!("unknown funding mode `{other}`"),
            };
            let amount = amount
                .map(|a| parse_units(&a, net.decimals))
                .transpose()
                .context("parsing amount")?;
            let source = store
                .account_by_address(&config.owner, &from)
                .await?
                .with_context(|| format!("no saved account with address {from}"))?;
            if targets.iter().any(|t| t.eq_ignore_ascii_case(&from)) {
                bail!("the source address cannot also be a target");
            }

            let request = CascadeFundingRequest {
                owner: config.owner.clone(),
                source_address: from,
                mode,
                amount_per_target: matches!(mode, FundingMode::Fixed).then_some(amount).flatten(),
                total_amount: matches!(mode, FundingMode::Equal).then_some(amount).flatten(),
                targets,
            };
            let adapter = adapter::for_network(&net);
            let secret = vault.unseal(&source.sealed_secret)?;
            let results = funding::cascade_fund(
                adapter.as_ref(),
                &secret,
                &request,
                net.decimals,
                &net.native_symbol,
                DEFAULT_INTER_TRANSFER_DELAY,
            )
            .await;
            for r in &results {
                println!(
                    "{}: {}{}",
                    r.target_address.as_deref().unwrap_or("(batch)"),
                    r.message,
                    r.tx_id.as_deref().map(|t| format!(" ({t})")).unwrap_or_default(),
                );
            }
            Ok(())
        }
        Command::ImportAccount { family, secret, address, label } => {
            let family = NetworkFamily::from_str(&family).map_err(|e| anyhow::anyhow!(e))?;
            let address = match (family, address) {
                (_, Some(addr)) => addr,
                (NetworkFamily::Evm, None) => {
                    let signer: alloy::signers::local::PrivateKeySigner = secret
                        .parse()
                        .map_err(|e| anyhow::anyhow!("invalid EVM secret: {e}"))?;
                    format!("{:?}", signer.address())
                }
                _ => bail!("--address is required for {family} accounts"),
            };
            let account = Account {
                id: Uuid::new_v4().to_string(),
                owner: config.owner.clone(),
                family,
                address: address.clone(),
                sealed_secret: vault.seal(&secret)?,
                sealed_seed_phrase: None,
                label,
                created_at: Utc::now(),
            };
            store.add_account(&account).await?;
            println!("imported {family} account {address}");
            Ok(())
        }
        Command::Relabel { address, label } => {
            store.relabel_account(&config.owner, &address, &label).await?;
            println!("relabeled {address}");
            Ok(())
        }
        Command::RemoveAccount { address } => {
            if store.delete_account(&config.owner, &address).await? {
                println!("removed {address}");
            } else {
                println!("no saved account with address {address}");
            }
            Ok(())
        }
        Command::SetActive { name, active } => {
            let Some(set) = store.task_set_by_name(&config.owner, &name).await? else {
                bail!("no task set named `{name}`");
            };
            store.set_task_set_active(&set.id, active).await?;
            println!(
                "task set `{name}` is now {}",
                if active { "active" } else { "paused" }
            );
            Ok(())
        }
        Command::SaveNetwork { id, name, rpc_url, symbol, decimals, family, testnet } => {
            let family = NetworkFamily::from_str(&family).map_err(|e| anyhow::anyhow!(e))?;
            let network = NetworkConfig {
                network_id: id.clone(),
                name,
                rpc_url,
                native_symbol: symbol,
                decimals,
                explorer_url: None,
                is_testnet: testnet,
                family,
            };
            store.upsert_custom_network(&config.owner, &network).await?;
            println!("saved network {id}");
            Ok(())
        }
        Command::SaveNft { network, contract, kind, mint_function } => {
            store
                .upsert_nft_contract(&NftContractConfig {
                    owner: config.owner.clone(),
                    network_id: network.clone(),
                    contract_address: contract.clone(),
                    kind,
                    mint_function,
                })
                .await?;
            println!("saved NFT contract {contract} for network {network}");
            Ok(())
        }
        Command::Accounts => {
            for account in store.accounts_for(&config.owner, None).await? {
                println!(
                    "{}  {}  [{}]  {}",
                    account.family,
                    account.address,
                    account.label,
                    account.created_at.format("%Y-%m-%d"),
                );
            }
            Ok(())
        }
        Command::SaveRouter { network, name, router, wrapped_native } => {
            let cfg = RouterConfig {
                network_id: network.clone(),
                name: name.clone(),
                router_address: router,
                wrapped_native_address: wrapped_native,
                owner: Some(config.owner.clone()),
            };
            taskchain::exec::router::save_custom(&store, &config.owner, &cfg).await?;
            println!("saved router `{name}` for network {network}");

            // Tasks that stalled waiting on this router replay now.
            let parked = store.take_pending_tasks(&config.owner, &network).await?;
            if !parked.is_empty() {
                let net = store
                    .resolve_network(&config.owner, &network)
                    .await?
                    .with_context(|| format!("unknown network `{network}`"))?;
                let accounts = store.accounts_for(&config.owner, Some(net.family)).await?;
                let adapter = adapter::for_network(&net);
                let executor = TaskExecutor {
                    store: &store,
                    network: &net,
                    owner: &config.owner,
                    adapter,
                };
                println!("replaying {} task(s) that were waiting on router info", parked.len());
                for task in &parked {
                    for account in accounts.iter().take(taskchain::exec::runner::ACCOUNT_CAP) {
                        let secret = vault.unseal(&account.sealed_secret)?;
                        let result = executor.execute(task, &account.address, &secret).await;
                        println!(
                            "[{}] {}: {}{}",
                            account.short_address(),
                            task,
                            result.message,
                            result.tx_id.as_deref().map(|t| format!(" ({t})")).unwrap_or_default(),
                        );
                    }
                }
            }
            Ok(())
        }
        Command::History { limit } => {
            for r in store.history_for(&config.owner, limit).await? {
                println!(
                    "{}  [{}] {}  {}  {}",
                    r.executed_at.format("%Y-%m-%d %H:%M"),
                    r.account_address,
                    r.task_text,
                    if r.success { "ok" } else { "FAILED" },
                    r.message,
                );
            }
            Ok(())
        }
    }
}
