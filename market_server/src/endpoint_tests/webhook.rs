use actix_web::{http::StatusCode, test::TestRequest};
use invoice_gateway::PayloadSigner;
use market_common::Secret;
use order_engine::{db_types::OrderStatusType, SALE_CONFLICT_REASON};
use serde_json::{json, Map, Value};

use super::{
    helpers::{guest_purchase, json, send, signer, TestMarket},
    mocks::paying_gateway,
};

fn notification(order_id: &str, status: &str) -> Map<String, Value> {
    let body = json!({
        "type": "payment",
        "uuid": format!("inv-{order_id}"),
        "order_id": order_id,
        "amount": "100.00",
        "payment_amount": "100.00",
        "currency": "USD",
        "network": "tron",
        "status": status,
        "is_final": true,
        "txid": "0xabc123"
    });
    match body {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn signed(order_id: &str, status: &str) -> String {
    Value::Object(signer().sign_webhook(notification(order_id, status))).to_string()
}

async fn post_webhook(market: &TestMarket, body: String) -> (StatusCode, String) {
    let req = TestRequest::post()
        .uri("/webhook/payment")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(body);
    send(req, market.configure(paying_gateway(), paying_gateway())).await
}

async fn new_order(market: &TestMarket, listing_id: &str) -> String {
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase(listing_id, "guest@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)["id"].as_str().unwrap().to_string()
}

#[actix_web::test]
async fn paid_webhook_settles_the_order() {
    let market = TestMarket::new().await;
    let id = new_order(&market, "listing-1").await;
    let (status, body) = post_webhook(&market, signed(&id, "paid")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json(&body)["success"], true);
    let order = market.fetch(&id).await;
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_status.as_deref(), Some("paid"));
    let paid_at = order.paid_at;
    assert!(paid_at.is_some());

    // Redelivery is acknowledged and changes nothing
    let (status, _) = post_webhook(&market, signed(&id, "paid")).await;
    assert_eq!(status, StatusCode::OK);
    let order = market.fetch(&id).await;
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.paid_at, paid_at);
}

#[actix_web::test]
async fn tampered_webhooks_are_rejected() {
    let market = TestMarket::new().await;
    let id = new_order(&market, "listing-1").await;

    let mut body = signer().sign_webhook(notification(&id, "check"));
    body.insert("status".into(), json!("paid"));
    let (status, body) = post_webhook(&market, Value::Object(body).to_string()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(!body.contains(&id));
    assert_eq!(market.fetch(&id).await.status, OrderStatusType::Pending);

    let other_key = PayloadSigner::new(Secret::new("somebody-elses-key".to_string()));
    let forged = Value::Object(other_key.sign_webhook(notification(&id, "paid"))).to_string();
    let (status, _) = post_webhook(&market, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unsigned = Value::Object(notification(&id, "paid")).to_string();
    let (status, _) = post_webhook(&market, unsigned).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(market.fetch(&id).await.status, OrderStatusType::Pending);
}

#[actix_web::test]
async fn malformed_webhooks() {
    let market = TestMarket::new().await;
    let (status, _) = post_webhook(&market, "this is not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = post_webhook(&market, "[1,2,3]".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Correctly signed, but not a payment notification the gateway could have sent
    let mut body = notification("some-order", "paid");
    body.shift_remove("status");
    let body = Value::Object(signer().sign_webhook(body)).to_string();
    let (status, _) = post_webhook(&market, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_webhook(&market, signed("some-order", "on_the_moon")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_orders() {
    let market = TestMarket::new().await;
    let (status, _) = post_webhook(&market, signed("no-such-order", "paid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn dead_invoices_expire_the_order() {
    let market = TestMarket::new().await;
    let id = new_order(&market, "listing-1").await;
    let (status, _) = post_webhook(&market, signed(&id, "cancel")).await;
    assert_eq!(status, StatusCode::OK);
    let order = market.fetch(&id).await;
    assert_eq!(order.status, OrderStatusType::Expired);
    assert_eq!(order.payment_status.as_deref(), Some("cancel"));
}

#[actix_web::test]
async fn open_statuses_only_record_progress() {
    let market = TestMarket::new().await;
    let id = new_order(&market, "listing-1").await;
    let (status, _) = post_webhook(&market, signed(&id, "confirm_check")).await;
    assert_eq!(status, StatusCode::OK);
    let order = market.fetch(&id).await;
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment_status.as_deref(), Some("confirm_check"));
}

#[actix_web::test]
async fn second_payment_for_a_sold_listing() {
    let market = TestMarket::new().await;
    let first = new_order(&market, "listing-2").await;
    let second = new_order(&market, "listing-2").await;
    let (status, _) = post_webhook(&market, signed(&first, "paid")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post_webhook(&market, signed(&second, "paid")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(market.fetch(&first).await.status, OrderStatusType::Paid);
    let loser = market.fetch(&second).await;
    assert_eq!(loser.status, OrderStatusType::Cancelled);
    assert_eq!(loser.status_reason.as_deref(), Some(SALE_CONFLICT_REASON));

    // The listing is sold now
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase("listing-2", "late@example.com"));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
