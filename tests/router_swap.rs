use taskchain::exec::router;
use taskchain::exec::swap::{DEFAULT_SLIPPAGE_BPS, AssetRef, SwapExecutor, SwapRequest};
use taskchain::model::{NetworkConfig, NetworkFamily, RouterConfig};
use taskchain::store::Store;

fn custom_router(network_id: &str, name: &str) -> RouterConfig {
    RouterConfig {
        network_id: network_id.into(),
        name: name.into(),
        router_address: "0x1111111111111111111111111111111111111111".into(),
        wrapped_native_address: "0x2222222222222222222222222222222222222222".into(),
        owner: Some("alice".into()),
    }
}

#[tokio::test]
async fn builtin_router_wins_over_a_custom_entry() {
    let store = Store::open_in_memory().unwrap();
    // a custom entry for mainnet exists, but the built-in table is canonical
    router::save_custom(&store, "alice", &custom_router("1", "Shadow Router"))
        .await
        .unwrap();

    let resolved = router::resolve(&store, "alice", "1").await.unwrap().unwrap();
    assert_eq!(resolved.name, "Uniswap V2");
    assert_eq!(
        resolved.router_address.to_lowercase(),
        "0x7a250d5630b4cf539739df2c5dacb4c659f2488d"
    );
}

#[tokio::test]
async fn custom_router_fills_in_for_unknown_networks() {
    let store = Store::open_in_memory().unwrap();
    assert!(router::resolve(&store, "alice", "424242").await.unwrap().is_none());

    router::save_custom(&store, "alice", &custom_router("424242", "HomeSwap"))
        .await
        .unwrap();
    let resolved = router::resolve(&store, "alice", "424242").await.unwrap().unwrap();
    assert_eq!(resolved.name, "HomeSwap");

    // re-saving replaces, not duplicates
    router::save_custom(&store, "alice", &custom_router("424242", "HomeSwap v2"))
        .await
        .unwrap();
    let resolved = router::resolve(&store, "alice", "424242").await.unwrap().unwrap();
    assert_eq!(resolved.name, "HomeSwap v2");
}

#[tokio::test]
async fn routers_are_scoped_per_owner() {
    let store = Store::open_in_memory().unwrap();
    router::save_custom(&store, "alice", &custom_router("424242", "HomeSwap"))
        .await
        .unwrap();
    assert!(router::resolve(&store, "bob", "424242").await.unwrap().is_none());
}

fn evm_network_without_builtin_router() -> NetworkConfig {
    NetworkConfig {
        network_id: "424242".into(),
        name: "Homechain".into(),
        rpc_url: "http://127.0.0.1:1".into(),
        native_symbol: "HOME".into(),
        decimals: 18,
        explorer_url: None,
        is_testnet: true,
        family: NetworkFamily::Evm,
    }
}

#[tokio::test]
async fn swap_without_a_router_asks_for_router_info() {
    let store = Store::open_in_memory().unwrap();
    let network = evm_network_without_builtin_router();
    let request = SwapRequest {
        from: AssetRef::Native,
        to: AssetRef::parse("0x3333333333333333333333333333333333333333").unwrap(),
        amount_in: "0.1".into(),
        slippage_bps: DEFAULT_SLIPPAGE_BPS,
    };

    let result = SwapExecutor::new(&store, &network, "alice")
        .swap("unused-secret", &request)
        .await;

    assert!(!result.success);
    assert!(result.needs_router_info);
    assert!(result.message.contains("424242"));
}

#[tokio::test]
async fn swap_on_a_non_evm_family_fails_without_submitting() {
    let store = Store::open_in_memory().unwrap();
    let network = NetworkConfig::builtin("solana-mainnet").unwrap();
    let request = SwapRequest {
        from: AssetRef::Native,
        to: AssetRef::Native,
        amount_in: "1".into(),
        slippage_bps: DEFAULT_SLIPPAGE_BPS,
    };

    let result = SwapExecutor::new(&store, &network, "alice")
        .swap("unused-secret", &request)
        .await;

    assert!(!result.success);
    assert!(!result.needs_router_info);
    assert!(result.message.contains("solana"));
}

#[test]
fn builtin_tables_cover_every_evm_mainnet() {
    for id in ["1", "56", "137", "42161", "8453", "10"] {
        let network = NetworkConfig::builtin(id).unwrap();
        assert_eq!(network.family, NetworkFamily::Evm);
        assert!(RouterConfig::builtin(id).is_some(), "no builtin router for chain {id}");
    }
    // non-EVM builtins have no V2 router
    assert!(RouterConfig::builtin("solana-mainnet").is_none());
}
