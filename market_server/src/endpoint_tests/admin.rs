use actix_web::{http::StatusCode, test::TestRequest};
use order_engine::db_types::OrderStatusType;
use serde_json::{json, Value};

use super::{
    helpers::{admin_token, bearer, guest_purchase, json, send, signer, user_token, TestMarket},
    mocks::paying_gateway,
};

async fn new_order(market: &TestMarket, listing_id: &str) -> String {
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase(listing_id, "guest@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)["id"].as_str().unwrap().to_string()
}

async fn paid_order(market: &TestMarket, listing_id: &str) -> String {
    let id = new_order(market, listing_id).await;
    let body = json!({
        "type": "payment",
        "uuid": format!("inv-{id}"),
        "order_id": id,
        "amount": "100.00",
        "currency": "USD",
        "status": "paid",
        "is_final": true
    });
    let Value::Object(body) = body else { unreachable!() };
    let req = TestRequest::post()
        .uri("/webhook/payment")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(Value::Object(signer().sign_webhook(body)).to_string());
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    id
}

async fn admin_post(market: &TestMarket, path: &str, body: Value) -> (StatusCode, String) {
    let req = TestRequest::post().uri(path).insert_header(bearer(&admin_token())).set_json(body);
    send(req, market.configure(paying_gateway(), paying_gateway())).await
}

#[actix_web::test]
async fn admin_routes_need_the_admin_role() {
    let market = TestMarket::new().await;
    let req = TestRequest::get().uri("/api/admin/orders");
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get().uri("/api/admin/orders").insert_header(bearer(&user_token()));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json(&body)["error"].is_string());

    let req = TestRequest::post().uri("/api/admin/orders/expire").insert_header(bearer(&user_token()));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn admins_can_read_any_order() {
    let market = TestMarket::new().await;
    let id = new_order(&market, "listing-1").await;
    let req = TestRequest::get().uri(&format!("/api/orders/{id}")).insert_header(bearer(&admin_token()));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    // The full record, including the buyer's contact details
    assert_eq!(json(&body)["guest_email"], "guest@example.com");
}

#[actix_web::test]
async fn search_orders() {
    let market = TestMarket::new().await;
    let paid = paid_order(&market, "listing-1").await;
    let pending = new_order(&market, "listing-2").await;

    let req = TestRequest::get().uri("/api/admin/orders").insert_header(bearer(&admin_token()));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json(&body);
    let ids = orders.as_array().unwrap().iter().map(|o| o["id"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(ids, vec![paid.as_str(), pending.as_str()]);

    let req =
        TestRequest::get().uri("/api/admin/orders?status=paid,delivered").insert_header(bearer(&admin_token()));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    let orders = json(&body);
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["id"], paid.as_str());

    let req = TestRequest::get().uri("/api/admin/orders?listing_id=listing-2").insert_header(bearer(&admin_token()));
    let (_, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(json(&body)[0]["id"], pending.as_str());

    let req = TestRequest::get().uri("/api/admin/orders?status=shipped").insert_header(bearer(&admin_token()));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn deliver_and_complete() {
    let market = TestMarket::new().await;
    let pending = new_order(&market, "listing-2").await;
    let (status, _) =
        admin_post(&market, &format!("/api/admin/orders/{pending}/deliver"), json!({"details": "invite link"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(market.fetch(&pending).await.status, OrderStatusType::Pending);

    let id = paid_order(&market, "listing-1").await;
    let path = format!("/api/admin/orders/{id}/deliver");
    let (status, _) = admin_post(&market, &path, json!({"details": "  "})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        admin_post(&market, &path, json!({"details": "https://t.me/+invite", "notes": "Handed over by Sam"})).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order = market.fetch(&id).await;
    assert_eq!(order.status, OrderStatusType::Delivered);
    assert_eq!(order.delivery_details.as_deref(), Some("https://t.me/+invite"));
    assert_eq!(order.delivery_notes.as_deref(), Some("Handed over by Sam"));

    // The buyer sees the delivery details, but not the internal notes
    let req = TestRequest::get().uri(&format!("/api/orders/{id}?email=guest@example.com"));
    let (_, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    let view = json(&body);
    assert_eq!(view["deliveryDetails"], "https://t.me/+invite");
    assert!(!body.contains("Handed over by Sam"));

    let (status, _) = admin_post(&market, &format!("/api/admin/orders/{id}/complete"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(market.fetch(&id).await.status, OrderStatusType::Completed);

    // Terminal orders stay put
    let (status, _) =
        admin_post(&market, &format!("/api/admin/orders/{id}/cancel"), json!({"reason": "changed my mind"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(market.fetch(&id).await.status, OrderStatusType::Completed);
}

#[actix_web::test]
async fn complete_paid_orders_needs_details() {
    let market = TestMarket::new().await;
    let id = paid_order(&market, "listing-1").await;
    let path = format!("/api/admin/orders/{id}/complete");
    let (status, _) = admin_post(&market, &path, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = admin_post(&market, &path, json!({"details": "invite link"})).await;
    assert_eq!(status, StatusCode::OK);
    let order = market.fetch(&id).await;
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.delivery_details.as_deref(), Some("invite link"));
    assert!(order.delivered_at.is_some());
}

#[actix_web::test]
async fn cancel_orders() {
    let market = TestMarket::new().await;
    let id = paid_order(&market, "listing-1").await;
    let path = format!("/api/admin/orders/{id}/cancel");
    let (status, _) = admin_post(&market, &path, json!({"reason": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = admin_post(&market, &path, json!({"reason": "Buyer asked for a refund"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "cancelled");
    let order = market.fetch(&id).await;
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(order.status_reason.as_deref(), Some("Buyer asked for a refund"));

    // The listing can be bought again
    new_order(&market, "listing-1").await;

    let (status, _) =
        admin_post(&market, "/api/admin/orders/no-such-order/cancel", json!({"reason": "cleanup"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn on_demand_expiry() {
    let market = TestMarket::new().await;
    let id = new_order(&market, "listing-1").await;
    let (status, body) = admin_post(&market, "/api/admin/orders/expire", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["expired"], 0);
    assert_eq!(market.fetch(&id).await.status, OrderStatusType::Pending);
}
