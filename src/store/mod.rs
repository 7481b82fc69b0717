pub mod seal;

pub use seal::{Vault, generate_salt};

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::model::{Account, NetworkConfig, NetworkFamily, RepeatSchedule, RouterConfig, TaskResult, TaskSet};

/// Per-owner cap on parked tasks; the oldest rows are dropped past it.
const PENDING_TASK_CAP: i64 = 8;

/// Explicit mint configuration for one NFT contract, saved after a
/// successful probe (or supplied by the owner) so later runs skip probing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NftContractConfig {
    pub owner: String,
    pub network_id: String,
    pub contract_address: String,
    /// "collectible" | "multi_token" | "chain_native" | "name_registration"
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mint_function: Option<String>,
}

/// Durable store for accounts, configurations, task sets and history.
///
/// One writer at a time by design; the connection sits behind an async
/// mutex like the rest of the engine's shared state.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Store> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("creating db directory")?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite at {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory()?;
        migrate(&conn)?;
        Ok(Store { conn: Mutex::new(conn) })
    }

    // ── Accounts ─────────────────────────────────────────────────────

    pub async fn add_account(&self, account: &Account) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO accounts (id, owner, family, address, sealed_secret, sealed_seed, label, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                account.id,
                account.owner,
                account.family.as_str(),
                account.address,
                account.sealed_secret,
                account.sealed_seed_phrase,
                account.label,
                account.created_at.timestamp(),
            ],
        )
        .context("inserting account")?;
        Ok(())
    }

    /// Accounts for an owner, oldest first, optionally filtered by family.
    pub async fn accounts_for(&self, owner: &str, family: Option<NetworkFamily>) -> Result<Vec<Account>> {
        let conn = self.conn.lock().await;
        let mut out = Vec::new();
        match family {
            Some(f) => {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, family, address, sealed_secret, sealed_seed, label, created_at
                     FROM accounts WHERE owner = ?1 AND family = ?2 ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map(params![owner, f.as_str()], account_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, owner, family, address, sealed_secret, sealed_seed, label, created_at
                     FROM accounts WHERE owner = ?1 ORDER BY created_at, id",
                )?;
                let rows = stmt.query_map(params![owner], account_from_row)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    pub async fn account_by_address(&self, owner: &str, address: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, owner, family, address, sealed_secret, sealed_seed, label, created_at
             FROM accounts WHERE owner = ?1 AND address = ?2",
            params![owner, address],
            account_from_row,
        )
        .optional()
        .context("querying account")
    }

    pub async fn relabel_account(&self, owner: &str, address: &str, label: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE accounts SET label = ?3 WHERE owner = ?1 AND address = ?2",
            params![owner, address, label],
        )?;
        Ok(())
    }

    pub async fn delete_account(&self, owner: &str, address: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let n = conn.execute(
            "DELETE FROM accounts WHERE owner = ?1 AND address = ?2",
            params![owner, address],
        )?;
        Ok(n > 0)
    }

    // ── Custom networks ──────────────────────────────────────────────

    pub async fn upsert_custom_network(&self, owner: &str, network: &NetworkConfig) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO networks (owner, network_id, config_json)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(owner, network_id) DO UPDATE SET config_json = excluded.config_json",
            params![owner, network.network_id, serde_json::to_string(network)?],
        )?;
        Ok(())
    }

    pub async fn custom_network(&self, owner: &str, network_id: &str) -> Result<Option<NetworkConfig>> {
        let conn = self.conn.lock().await;
        let json: Option<String> = conn
            .query_row(
                "SELECT config_json FROM networks WHERE owner = ?1 AND network_id = ?2",
                params![owner, network_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j).context("decoding network config")?)),
            None => Ok(None),
        }
    }

    /// Built-in table first, then the owner's custom entry.
    pub async fn resolve_network(&self, owner: &str, network_id: &str) -> Result<Option<NetworkConfig>> {
        if let Some(builtin) = NetworkConfig::builtin(network_id) {
            return Ok(Some(builtin));
        }
        self.custom_network(owner, network_id).await
    }

    // ── Custom routers ───────────────────────────────────────────────

    /// Saving again for the same (owner, network) replaces the prior entry.
    pub async fn upsert_custom_router(&self, owner: &str, router: &RouterConfig) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO routers (owner, network_id, name, router_address, wrapped_native_address)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(owner, network_id) DO UPDATE SET
                 name = excluded.name,
                 router_address = excluded.router_address,
                 wrapped_native_address = excluded.wrapped_native_address",
            params![
                owner,
                router.network_id,
                router.name,
                router.router_address,
                router.wrapped_native_address,
            ],
        )?;
        Ok(())
    }

    pub async fn custom_router(&self, owner: &str, network_id: &str) -> Result<Option<RouterConfig>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT network_id, name, router_address, wrapped_native_address, owner
             FROM routers WHERE owner = ?1 AND network_id = ?2",
            params![owner, network_id],
            |row| {
                Ok(RouterConfig {
                    network_id: row.get(0)?,
                    name: row.get(1)?,
                    router_address: row.get(2)?,
                    wrapped_native_address: row.get(3)?,
                    owner: Some(row.get(4)?),
                })
            },
        )
        .optional()
        .context("querying custom router")
    }

    // ── NFT contract configs ─────────────────────────────────────────

    pub async fn upsert_nft_contract(&self, cfg: &NftContractConfig) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO nft_contracts (owner, network_id, contract_address, kind, mint_function)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(owner, network_id, contract_address) DO UPDATE SET
                 kind = excluded.kind,
                 mint_function = excluded.mint_function",
            params![cfg.owner, cfg.network_id, cfg.contract_address, cfg.kind, cfg.mint_function],
        )?;
        Ok(())
    }

    /// The owner's saved contract for a network, when exactly one choice
    /// makes sense (most recent insert wins).
    pub async fn nft_contract_for_network(
        &self,
        owner: &str,
        network_id: &str,
    ) -> Result<Option<NftContractConfig>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT owner, network_id, contract_address, kind, mint_function
             FROM nft_contracts WHERE owner = ?1 AND network_id = ?2
             ORDER BY rowid DESC LIMIT 1",
            params![owner, network_id],
            |row| {
                Ok(NftContractConfig {
                    owner: row.get(0)?,
                    network_id: row.get(1)?,
                    contract_address: row.get(2)?,
                    kind: row.get(3)?,
                    mint_function: row.get(4)?,
                })
            },
        )
        .optional()
        .context("querying nft contract for network")
    }

    // ── Engine config ────────────────────────────────────────────────

    /// The vault salt, created on first use and stable afterwards so sealed
    /// secrets stay decryptable across restarts.
    pub async fn ensure_vault_salt(&self) -> Result<String> {
        let conn = self.conn.lock().await;
        let existing: Option<String> = conn
            .query_row(
                "SELECT value FROM config WHERE key = 'vault_salt'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(salt) = existing {
            return Ok(salt);
        }
        let salt = generate_salt();
        conn.execute(
            "INSERT INTO config (key, value) VALUES ('vault_salt', ?1)",
            params![salt],
        )?;
        Ok(salt)
    }

    // ── Task sets ────────────────────────────────────────────────────

    pub async fn save_task_set(&self, set: &TaskSet) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO task_sets (id, owner, name, network_json, tasks_json, repeat, next_run_at, last_run_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 network_json = excluded.network_json,
                 tasks_json = excluded.tasks_json,
                 repeat = excluded.repeat,
                 next_run_at = excluded.next_run_at,
                 last_run_at = excluded.last_run_at,
                 is_active = excluded.is_active",
            params![
                set.id,
                set.owner,
                set.name,
                set.network.as_ref().map(serde_json::to_string).transpose()?,
                serde_json::to_string(&set.tasks)?,
                set.repeat.as_str(),
                set.next_run_at.map(|t| t.timestamp()),
                set.last_run_at.map(|t| t.timestamp()),
                set.is_active,
            ],
        )?;
        Ok(())
    }

    pub async fn task_set(&self, id: &str) -> Result<Option<TaskSet>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, owner, name, network_json, tasks_json, repeat, next_run_at, last_run_at, is_active
             FROM task_sets WHERE id = ?1",
            params![id],
            task_set_from_row,
        )
        .optional()
        .context("querying task set")
    }

    pub async fn task_set_by_name(&self, owner: &str, name: &str) -> Result<Option<TaskSet>> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT id, owner, name, network_json, tasks_json, repeat, next_run_at, last_run_at, is_active
             FROM task_sets WHERE owner = ?1 AND name = ?2",
            params![owner, name],
            task_set_from_row,
        )
        .optional()
        .context("querying task set by name")
    }

    /// Active repeating task sets whose next-run time has elapsed.
    pub async fn due_task_sets(&self, now: DateTime<Utc>) -> Result<Vec<TaskSet>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, owner, name, network_json, tasks_json, repeat, next_run_at, last_run_at, is_active
             FROM task_sets
             WHERE is_active = 1 AND repeat != 'none'
               AND next_run_at IS NOT NULL AND next_run_at <= ?1
             ORDER BY next_run_at",
        )?;
        let rows = stmt.query_map(params![now.timestamp()], task_set_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Single post-run schedule update, the only mutation the runner makes.
    pub async fn update_task_set_schedule(
        &self,
        id: &str,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE task_sets SET last_run_at = ?2, next_run_at = ?3 WHERE id = ?1",
            params![id, last_run_at.timestamp(), next_run_at.map(|t| t.timestamp())],
        )?;
        Ok(())
    }

    pub async fn set_task_set_active(&self, id: &str, active: bool) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE task_sets SET is_active = ?2 WHERE id = ?1",
            params![id, active],
        )?;
        Ok(())
    }

    // ── Parked tasks ─────────────────────────────────────────────────

    /// Park a task that stalled on missing configuration (router details,
    /// most commonly) until the owner supplies it. Rows survive restarts;
    /// the oldest beyond the per-owner cap are dropped.
    pub async fn park_pending_task(
        &self,
        owner: &str,
        network_id: &str,
        task_text: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO pending_tasks (owner, network_id, task_text, created_at)
             VALUES (?1, ?2, ?3, unixepoch())",
            params![owner, network_id, task_text],
        )?;
        conn.execute(
            "DELETE FROM pending_tasks WHERE owner = ?1 AND id NOT IN (
                 SELECT id FROM pending_tasks WHERE owner = ?1 ORDER BY id DESC LIMIT ?2)",
            params![owner, PENDING_TASK_CAP],
        )?;
        Ok(())
    }

    /// All tasks parked for this owner and network, oldest first, removed
    /// as they are returned.
    pub async fn take_pending_tasks(&self, owner: &str, network_id: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT task_text FROM pending_tasks
             WHERE owner = ?1 AND network_id = ?2 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![owner, network_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        conn.execute(
            "DELETE FROM pending_tasks WHERE owner = ?1 AND network_id = ?2",
            params![owner, network_id],
        )?;
        Ok(out)
    }

    pub async fn pending_task_count(&self, owner: &str) -> Result<u64> {
        let conn = self.conn.lock().await;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pending_tasks WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }

    // ── History (append-only) ────────────────────────────────────────

    pub async fn append_history(&self, owner: &str, result: &TaskResult) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO task_history (owner, task_set_id, account_address, task_text, success, message, tx_id, executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                owner,
                result.task_set_id,
                result.account_address,
                result.task_text,
                result.success,
                result.message,
                result.tx_id,
                result.executed_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub async fn history_for(&self, owner: &str, limit: usize) -> Result<Vec<TaskResult>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT task_set_id, account_address, task_text, success, message, tx_id, executed_at
             FROM task_history WHERE owner = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![owner, limit as i64], |row| {
            Ok(TaskResult {
                task_set_id: row.get(0)?,
                account_address: row.get(1)?,
                task_text: row.get(2)?,
                success: row.get(3)?,
                message: row.get(4)?,
                tx_id: row.get(5)?,
                executed_at: timestamp(row.get(6)?),
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn history_count(&self, owner: &str) -> Result<u64> {
        let conn = self.conn.lock().await;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM task_history WHERE owner = ?1",
            params![owner],
            |row| row.get(0),
        )?;
        Ok(n as u64)
    }
}

// ── Schema ───────────────────────────────────────────────────────────

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            id             TEXT PRIMARY KEY,
            owner          TEXT NOT NULL,
            family         TEXT NOT NULL,
            address        TEXT NOT NULL,
            sealed_secret  TEXT NOT NULL,
            sealed_seed    TEXT,
            label          TEXT NOT NULL,
            created_at     INTEGER NOT NULL,
            UNIQUE(owner, address)
        );

        CREATE TABLE IF NOT EXISTS networks (
            owner        TEXT NOT NULL,
            network_id   TEXT NOT NULL,
            config_json  TEXT NOT NULL,
            PRIMARY KEY (owner, network_id)
        );

        CREATE TABLE IF NOT EXISTS routers (
            owner                   TEXT NOT NULL,
            network_id              TEXT NOT NULL,
            name                    TEXT NOT NULL,
            router_address          TEXT NOT NULL,
            wrapped_native_address  TEXT NOT NULL,
            PRIMARY KEY (owner, network_id)
        );

        CREATE TABLE IF NOT EXISTS nft_contracts (
            owner             TEXT NOT NULL,
            network_id        TEXT NOT NULL,
            contract_address  TEXT NOT NULL,
            kind              TEXT NOT NULL,
            mint_function     TEXT,
            PRIMARY KEY (owner, network_id, contract_address)
        );

        CREATE TABLE IF NOT EXISTS task_sets (
            id            TEXT PRIMARY KEY,
            owner         TEXT NOT NULL,
            name          TEXT NOT NULL,
            network_json  TEXT,
            tasks_json    TEXT NOT NULL,
            repeat        TEXT NOT NULL,
            next_run_at   INTEGER,
            last_run_at   INTEGER,
            is_active     INTEGER NOT NULL DEFAULT 1,
            UNIQUE(owner, name)
        );

        CREATE TABLE IF NOT EXISTS config (
            key    TEXT PRIMARY KEY,
            value  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pending_tasks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            owner       TEXT NOT NULL,
            network_id  TEXT NOT NULL,
            task_text   TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS task_history (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            owner            TEXT NOT NULL,
            task_set_id      TEXT,
            account_address  TEXT NOT NULL,
            task_text        TEXT NOT NULL,
            success          INTEGER NOT NULL,
            message          TEXT NOT NULL,
            tx_id            TEXT,
            executed_at      INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

// ── Row mapping ──────────────────────────────────────────────────────

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    let family: String = row.get(2)?;
    Ok(Account {
        id: row.get(0)?,
        owner: row.get(1)?,
        family: family.parse().unwrap_or(NetworkFamily::Evm),
        address: row.get(3)?,
        sealed_secret: row.get(4)?,
        sealed_seed_phrase: row.get(5)?,
        label: row.get(6)?,
        created_at: timestamp(row.get(7)?),
    })
}

fn task_set_from_row(row: &Row<'_>) -> rusqlite::Result<TaskSet> {
    let network_json: Option<String> = row.get(3)?;
    let tasks_json: String = row.get(4)?;
    let repeat: String = row.get(5)?;
    let next_run_at: Option<i64> = row.get(6)?;
    let last_run_at: Option<i64> = row.get(7)?;
    Ok(TaskSet {
        id: row.get(0)?,
        owner: row.get(1)?,
        name: row.get(2)?,
        network: network_json.and_then(|j| serde_json::from_str(&j).ok()),
        tasks: serde_json::from_str(&tasks_json).unwrap_or_default(),
        repeat: repeat.parse().unwrap_or(RepeatSchedule::None),
        next_run_at: next_run_at.map(timestamp),
        last_run_at: last_run_at.map(timestamp),
        is_active: row.get(8)?,
    })
}
