//! HTTP processor client against a mock processor.

use alloy::primitives::{Address, U256};
use mockito::{Matcher, Server};
use serde_json::json;

use card_bridge::config::ProcessorConfig;
use card_bridge::processor::{
    charge_outcome, CardData, CardProcessor, ChargeOrder, ChargeOutcome, HttpProcessor,
    ProcessorError,
};

fn card() -> CardData {
    CardData::from_json(
        br#"{"cardNumber":"4111111111111111","expMonth":"3","expYear":"2030","cvv":"123"}"#,
    )
    .unwrap()
}

fn processor(server: &Server) -> HttpProcessor {
    HttpProcessor::new(ProcessorConfig {
        charge_url: format!("{}/transaction", server.url()),
        status_url: format!("{}/transaction/detail", server.url()),
        ..ProcessorConfig::default()
    })
    .unwrap()
}

fn order(amount: u64) -> ChargeOrder {
    let merchant: Address = "0x52908400098527886E0F7030069857D2E4169EE7".parse().unwrap();
    ChargeOrder::new(card(), U256::from(amount), merchant)
}

#[tokio::test]
async fn test_charge_sends_wire_payload() {
    let mut server = Server::new_async().await;
    let order = order(2500);
    let mock = server
        .mock("POST", "/transaction")
        .match_body(Matcher::Json(json!({
            "m_id": "pos123",
            "tx_id": order.tx_id,
            "card_number": "4111111111111111",
            "exp_date": "2030-03",
            "amount": 2500,
            "wallet_to": "52908400098527886E0F7030069857D2E4169EE7",
            "fee_payer": 1,
            "cvv": "123",
        })))
        .with_status(200)
        .with_body(r#"{"status":"success"}"#)
        .create_async()
        .await;

    let reply = processor(&server).charge(&order).await.unwrap();
    mock.assert_async().await;
    assert_eq!(charge_outcome(&reply), ChargeOutcome::Success);
    assert_eq!(reply.transaction_id, order.tx_id);
}

#[tokio::test]
async fn test_charge_declined() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/transaction")
        .with_status(400)
        .with_body(r#"{"message":"Card expired","status":"failed","transactionId":"tx_remote"}"#)
        .create_async()
        .await;

    let reply = processor(&server).charge(&order(10)).await.unwrap();
    assert_eq!(reply.transaction_id, "tx_remote");
    assert_eq!(
        charge_outcome(&reply),
        ChargeOutcome::Failed {
            reason: "Card expired".to_string()
        }
    );
}

#[tokio::test]
async fn test_server_error_is_inconclusive() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/transaction")
        .with_status(503)
        .with_body("upstream unavailable")
        .create_async()
        .await;

    let err = processor(&server).charge(&order(10)).await.unwrap_err();
    assert!(matches!(err, ProcessorError::Status { code: 503, .. }));
    assert!(err.is_inconclusive());
}

#[tokio::test]
async fn test_non_json_charge_reply_is_inconclusive() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/transaction")
        .with_status(200)
        .with_body("upstream gateway hiccup")
        .create_async()
        .await;

    let err = processor(&server).charge(&order(10)).await.unwrap_err();
    assert!(matches!(&err, ProcessorError::Parse(raw) if raw.contains("upstream gateway hiccup")));
    assert!(err.is_inconclusive());
}

#[tokio::test]
async fn test_invalid_card_is_not_sent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/transaction")
        .expect(0)
        .create_async()
        .await;

    let mut order = order(10);
    order.card = CardData::from_json(
        br#"{"cardNumber":"4111111111111111","expMonth":"3","expYear":"30","cvv":"123"}"#,
    )
    .unwrap();

    let err = processor(&server).charge(&order).await.unwrap_err();
    assert!(matches!(err, ProcessorError::InvalidCard(_)));
    assert!(!err.is_inconclusive());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_poll_status() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/transaction/detail")
        .match_body(Matcher::Json(json!({"tx_id": "tx_abc", "m_id": "pos123"})))
        .with_status(200)
        .with_body(r#"{"status":"transaction not exists"}"#)
        .create_async()
        .await;

    let status = processor(&server).poll_status("tx_abc").await.unwrap();
    mock.assert_async().await;
    assert_eq!(status, "transaction not exists");
}

#[tokio::test]
async fn test_poll_status_garbage_is_parse_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/transaction/detail")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = processor(&server).poll_status("tx_abc").await.unwrap_err();
    assert!(matches!(err, ProcessorError::Parse(_)));
}
