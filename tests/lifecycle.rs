//! Startup wiring and shutdown over the in-memory chain.

mod common;

use alloy::primitives::{Bytes, B256};
use alloy::sol_types::{SolCall, SolValue};
use std::sync::Arc;
use std::time::Duration;

use card_bridge::blockchain::contract::CardContract;
use card_bridge::blockchain::Receipt;
use card_bridge::crypto::ServerKey;
use card_bridge::lifecycle::{Bridge, Shutdown, StartupError};
use card_bridge::vault::TokenVault;
use card_bridge::BridgeConfig;

use common::{contract, sealed_card, token_request_event, FakeChain, FakeProcessor, Scripted};

fn config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.chain.contract_address = contract().to_string();
    config
}

fn bridge(chain: &Arc<FakeChain>, vault: &TokenVault, key: &Arc<ServerKey>) -> Bridge {
    Bridge::from_parts(
        config(),
        vault.clone(),
        chain.clone(),
        key.clone(),
        FakeProcessor::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_invalid_contract_address() {
    let mut config = config();
    config.chain.contract_address = "not-an-address".to_string();

    let err = Bridge::from_parts(
        config,
        TokenVault::temporary().unwrap(),
        FakeChain::new(1),
        Arc::new(ServerKey::random()),
        FakeProcessor::new(),
    )
    .unwrap_err();
    assert!(matches!(err, StartupError::InvalidContract(_)));
}

#[tokio::test]
async fn test_backend_key_verification() {
    let chain = FakeChain::new(1);
    let vault = TokenVault::temporary().unwrap();
    let key = Arc::new(ServerKey::random());
    let bridge = bridge(&chain, &vault, &key);

    let ours = (Bytes::from(key.public_key_bytes()),).abi_encode_params();
    chain.script(
        CardContract::getBackendPubKeyCall::SELECTOR,
        Scripted::Reply(Receipt::returned(ours)),
    );
    assert!(bridge.verify_backend_key().await);

    let theirs = (Bytes::from(ServerKey::random().public_key_bytes()),).abi_encode_params();
    chain.script(
        CardContract::getBackendPubKeyCall::SELECTOR,
        Scripted::Reply(Receipt::returned(theirs)),
    );
    assert!(!bridge.verify_backend_key().await);
}

#[tokio::test]
async fn test_start_tokenize_stop() {
    let chain = FakeChain::new(100);
    let vault = TokenVault::temporary().unwrap();
    let key = Arc::new(ServerKey::random());
    let shutdown = Shutdown::new();

    let running = bridge(&chain, &vault, &key).start(&shutdown).await.unwrap();
    assert_eq!(vault.load_checkpoint().unwrap(), Some(100));

    chain.push_log(token_request_event(sealed_card(&key), B256::repeat_byte(1), 101));
    chain.set_head(101);

    tokio::time::timeout(Duration::from_secs(10), async {
        while vault.token_count() == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .unwrap();

    running.stop().await.unwrap();
    assert_eq!(vault.token_count(), 1);
    assert_eq!(vault.load_checkpoint().unwrap(), Some(101));
    assert_eq!(chain.calls_to(CardContract::submitTokenCall::SELECTOR).len(), 1);
}

#[tokio::test]
async fn test_stop_handles_events_already_checkpointed() {
    let chain = FakeChain::new(100);
    let vault = TokenVault::temporary().unwrap();
    let key = Arc::new(ServerKey::random());
    let shutdown = Shutdown::new();

    for i in 0..10u8 {
        chain.script(
            CardContract::submitTokenCall::SELECTOR,
            Scripted::Slow(Duration::from_millis(200)),
        );
        chain.push_log(token_request_event(
            sealed_card(&key),
            B256::repeat_byte(i + 1),
            101 + u64::from(i),
        ));
    }

    let running = bridge(&chain, &vault, &key).start(&shutdown).await.unwrap();
    chain.set_head(110);

    tokio::time::timeout(Duration::from_secs(10), async {
        while vault.load_checkpoint().unwrap() != Some(110) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(vault.token_count() < 10);

    running.stop().await.unwrap();
    assert_eq!(vault.token_count(), 10);
    assert_eq!(chain.calls_to(CardContract::submitTokenCall::SELECTOR).len(), 10);
}
