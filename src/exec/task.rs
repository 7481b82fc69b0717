use std::sync::Arc;

use tracing::debug;

use crate::adapter::ChainAdapter;
use crate::exec::mint::{EvmMintClient, EvmNameRegistrar, MintExecutor, MintKind};
use crate::exec::swap::{AssetRef, DEFAULT_SLIPPAGE_BPS, SwapExecutor, SwapRequest};
use crate::exec::ActionResult;
use crate::model::amount::{format_units, parse_units};
use crate::model::{NetworkConfig, NetworkFamily};
use crate::store::Store;

/// What a task's text asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Swap,
    Mint,
    Faucet,
    Balance,
    Transfer,
    Unknown,
}

/// Keyword rules, checked top to bottom; the first rule with any keyword
/// present in the lowercased task text wins. Order is part of the contract:
/// "swap and send the rest" is a swap.
const RULES: &[(TaskKind, &[&str])] = &[
    (TaskKind::Swap, &["swap"]),
    (TaskKind::Mint, &["mint", "nft"]),
    (TaskKind::Faucet, &["faucet", "claim"]),
    (TaskKind::Balance, &["balance", "check"]),
    (TaskKind::Transfer, &["send", "transfer"]),
];

/// Classify task text by the ordered keyword rules.
pub fn classify(text: &str) -> TaskKind {
    let lowered = text.to_lowercase();
    for (kind, keywords) in RULES {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return *kind;
        }
    }
    TaskKind::Unknown
}

/// First numeric literal in the text, as written (human decimal units).
/// Address-shaped words are skipped so the leading `0` of a `0x…` address
/// never reads as an amount.
pub fn extract_amount(text: &str) -> Option<String> {
    for word in text.split_whitespace() {
        if word.starts_with("0x") || looks_like_address(word) {
            continue;
        }
        let mut current = String::new();
        for ch in word.chars() {
            if ch.is_ascii_digit() || (ch == '.' && !current.is_empty() && !current.contains('.')) {
                current.push(ch);
            } else if !current.is_empty() {
                break;
            }
        }
        let current = current.trim_end_matches('.');
        if !current.is_empty() {
            return Some(current.to_string());
        }
    }
    None
}

fn looks_like_address(word: &str) -> bool {
    let word = word.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '_');
    if let Some(hex) = word.strip_prefix("0x") {
        return hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    // base58, Solana-length
    (32..=44).contains(&word.len())
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !"0OIl".contains(c))
}

/// Destination address in the text, preferring one that follows a "to" or
/// "for" keyword. `None` when nothing address-shaped appears.
pub fn extract_address(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for window in words.windows(2) {
        let lead = window[0].to_lowercase();
        if (lead == "to" || lead == "for") && looks_like_address(window[1]) {
            return Some(
                window[1]
                    .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '_')
                    .to_string(),
            );
        }
    }
    words
        .iter()
        .find(|w| looks_like_address(w))
        .map(|w| {
            w.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '_')
                .to_string()
        })
}

/// Name to register: the first dotted word (e.g. "alice.eth"), else the
/// word after "name".
pub fn extract_name(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if let Some(dotted) = words
        .iter()
        .find(|w| w.contains('.') && !w.starts_with("0x") && w.chars().any(|c| c.is_ascii_alphabetic()))
    {
        return Some(dotted.trim_matches(|c: char| c.is_ascii_punctuation() && c != '.').to_string());
    }
    words
        .windows(2)
        .find(|pair| pair[0].eq_ignore_ascii_case("name"))
        .map(|pair| pair[1].trim_matches(|c: char| c.is_ascii_punctuation()).to_string())
        .filter(|w| !w.is_empty())
}

/// Token contract addresses in order of appearance, for swap from/to.
fn extract_evm_addresses(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '_'))
        .filter(|w| {
            w.strip_prefix("0x")
                .map(|h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
                .unwrap_or(false)
        })
        .map(String::from)
        .collect()
}

// ── Executor ────────────────────────────────────────────────────────

/// Runs one task's text for one account. Parameter extraction fails closed:
/// a task whose parameters cannot be read produces a clarification failure,
/// never a submission with guessed values.
pub struct TaskExecutor<'a> {
    pub store: &'a Store,
    pub network: &'a NetworkConfig,
    pub owner: &'a str,
    pub adapter: Arc<dyn ChainAdapter>,
}

impl<'a> TaskExecutor<'a> {
    pub async fn execute(&self, text: &str, address: &str, secret: &str) -> ActionResult {
        let kind = classify(text);
        debug!(?kind, task = text, "dispatching task");
        match kind {
            TaskKind::Swap => self.run_swap(text, secret).await,
            TaskKind::Mint => self.run_mint(text, address, secret).await,
            TaskKind::Faucet => self.run_faucet(address).await,
            TaskKind::Balance => self.run_balance(address).await,
            TaskKind::Transfer => self.run_transfer(text, secret).await,
            TaskKind::Unknown => ActionResult::ok(format!(
                "task `{text}` is not yet automatable; skipped without side effects"
            )),
        }
    }

    async fn run_swap(&self, text: &str, secret: &str) -> ActionResult {
        let Some(amount) = extract_amount(text) else {
            return ActionResult::fail(
                "swap task has no amount; say e.g. `swap 0.1 native for 0x...`",
            );
        };
        let tokens = extract_evm_addresses(text);
        let (from, to) = match tokens.len() {
            0 => {
                return ActionResult::fail(
                    "swap task names no token address; say which token to swap to",
                );
            }
            // one token address reads as native → token
            1 => match AssetRef::parse(&tokens[0]) {
                Ok(to) => (AssetRef::Native, to),
                Err(_) => {
                    return ActionResult::fail("swap task has an unparseable token address");
                }
            },
            _ => match (AssetRef::parse(&tokens[0]), AssetRef::parse(&tokens[1])) {
                (Ok(from), Ok(to)) => (from, to),
                _ => {
                    return ActionResult::fail("swap task has an unparseable token address");
                }
            },
        };

        let request = SwapRequest {
            from,
            to,
            amount_in: amount,
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        };
        SwapExecutor::new(self.store, self.network, self.owner)
            .swap(secret, &request)
            .await
    }

    async fn run_mint(&self, text: &str, address: &str, secret: &str) -> ActionResult {
        if self.network.family != NetworkFamily::Evm {
            return ActionResult::fail(format!(
                "minting on the {} family is not automatable here yet",
                self.network.family
            ));
        }
        // Contract from the task text, or the owner's saved contract for
        // this network. A saved config also carries the mint kind.
        let contract = match extract_evm_addresses(text).into_iter().next() {
            Some(c) => Some((c, None, MintKind::Collectible)),
            None => match self
                .store
                .nft_contract_for_network(self.owner, &self.network.network_id)
                .await
            {
                Ok(Some(cfg)) => {
                    let kind = cfg.kind.parse().unwrap_or(MintKind::Collectible);
                    Some((cfg.contract_address, cfg.mint_function, kind))
                }
                Ok(None) => None,
                Err(e) => return ActionResult::fail(format!("contract lookup failed: {e:#}")),
            },
        };
        let Some((contract, mint_function, kind)) = contract else {
            return ActionResult::fail(
                "mint task names no contract and none is saved for this network; provide the NFT contract address",
            );
        };

        match kind {
            MintKind::Collectible | MintKind::MultiToken => {
                let quantity = extract_amount(text)
                    .and_then(|a| a.parse::<u64>().ok())
                    .unwrap_or(1);
                let client = match EvmMintClient::new(self.network, secret, &contract) {
                    Ok(c) => c,
                    Err(e) => return ActionResult::fail(format!("mint setup failed: {e:#}")),
                };
                MintExecutor::default()
                    .mint_collectible(&client, mint_function.as_deref(), quantity, self.network)
                    .await
            }
            MintKind::NameRegistration => {
                let Some(name) = extract_name(text) else {
                    return ActionResult::fail(
                        "name registration task names no name; say e.g. `mint name alice.eth`",
                    );
                };
                let registrar = match EvmNameRegistrar::new(self.network, secret, &contract) {
                    Ok(r) => r,
                    Err(e) => return ActionResult::fail(format!("registrar setup failed: {e:#}")),
                };
                MintExecutor::default().register_name(&registrar, &name, 1).await
            }
            MintKind::ChainNative => match crate::config::mint_api_url() {
                Some(api_url) => {
                    MintExecutor::default()
                        .mint_chain_native(&reqwest::Client::new(), &api_url, &contract, address)
                        .await
                }
                None => ActionResult::fail(
                    "chain-native minting needs the external minting API; set TASKCHAIN_MINT_API_URL",
                ),
            },
        }
    }

    async fn run_faucet(&self, address: &str) -> ActionResult {
        match self.adapter.request_faucet(address).await {
            Ok(Some(tx)) => ActionResult::ok_with_tx(tx, "faucet request confirmed"),
            Ok(None) => ActionResult::ok("faucet request accepted"),
            Err(e) => ActionResult::fail(format!("faucet request failed: {e}")),
        }
    }

    async fn run_balance(&self, address: &str) -> ActionResult {
        match self.adapter.read_balance(address).await {
            Ok(balance) => ActionResult::ok(format!(
                "balance: {} {}",
                format_units(balance, self.network.decimals),
                self.network.native_symbol
            )),
            Err(e) => ActionResult::fail(format!("balance read failed: {e}")),
        }
    }

    async fn run_transfer(&self, text: &str, secret: &str) -> ActionResult {
        let Some(amount) = extract_amount(text) else {
            return ActionResult::fail(
                "transfer task has no amount; say e.g. `send 0.5 to 0x...`",
            );
        };
        let Some(to) = extract_address(text) else {
            return ActionResult::fail("transfer task has no destination address");
        };
        let amount = match parse_units(&amount, self.network.decimals) {
            Ok(a) => a,
            Err(e) => return ActionResult::fail(format!("bad amount: {e}")),
        };
        match self.adapter.submit_transfer(secret, &to, amount).await {
            Ok(tx) => ActionResult::ok_with_tx(
                tx,
                format!(
                    "sent {} {} to {to}",
                    format_units(amount, self.network.decimals),
                    self.network.native_symbol
                ),
            ),
            Err(e) => ActionResult::fail(format!("transfer failed: {e}")),
        }
    }
}
