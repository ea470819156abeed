use actix_web::{http::StatusCode, test::TestRequest};
use order_engine::db_types::OrderStatusType;
use serde_json::json;

use super::{
    helpers::{bearer, guest_purchase, issue_token, json, send, user_token, TestMarket},
    mocks::{paying_gateway, unreachable_gateway},
};
use crate::auth::Role;

async fn place_guest_order(market: &TestMarket, listing_id: &str, email: &str) -> String {
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase(listing_id, email));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    json(&body)["id"].as_str().expect("No order id").to_string()
}

#[actix_web::test]
async fn guest_purchase_opens_an_invoice() {
    let market = TestMarket::new().await;
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase("listing-1", "guest@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CREATED);
    let order = json(&body);
    let id = order["id"].as_str().unwrap();
    assert_eq!(order["status"], "pending");
    assert_eq!(order["amount"], 10_000);
    assert_eq!(order["currency"], "USD");
    assert_eq!(order["paymentUrl"], format!("https://pay.example/{id}"));
    assert!(order.get("guestEmail").is_none());
    assert!(order.get("deliveryNotes").is_none());
}

#[actix_web::test]
async fn foreign_currency_listings_are_converted() {
    let market = TestMarket::new().await;
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase("listing-3", "guest@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CREATED);
    let order = json(&body);
    assert_eq!(order["originalPrice"], 20_000);
    assert_eq!(order["originalCurrency"], "EUR");
    assert_eq!(order["amount"], 22_000);
    assert_eq!(order["currency"], "USD");
}

#[actix_web::test]
async fn guest_purchase_needs_contact_details() {
    let market = TestMarket::new().await;
    let mut request = guest_purchase("listing-1", "not-an-email");
    let req = TestRequest::post().uri("/api/orders").set_json(&request);
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    request.guest_email = Some("guest@example.com".into());
    request.guest_name = None;
    let req = TestRequest::post().uri("/api/orders").set_json(&request);
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unknown_and_withdrawn_listings() {
    let market = TestMarket::new().await;
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase("listing-404", "guest@example.com"));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase("listing-withdrawn", "guest@example.com"));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn gateway_outage_cancels_the_order() {
    let market = TestMarket::new().await;
    let req = TestRequest::post().uri("/api/orders").set_json(guest_purchase("listing-1", "guest@example.com"));
    let (status, body) = send(req, market.configure(unreachable_gateway(), unreachable_gateway())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json(&body)["error"].is_string());

    let orders = market.orders_for_listing("listing-1").await;
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatusType::Cancelled);
    assert!(orders[0].status_reason.as_deref().unwrap_or_default().starts_with("Invoice creation failed"));
}

#[actix_web::test]
async fn signed_in_buyers_see_only_their_orders() {
    let market = TestMarket::new().await;
    let request = json!({ "listingId": "listing-2", "channelAccessEmail": "channel-owner@example.com" });
    let req = TestRequest::post().uri("/api/orders").insert_header(bearer(&user_token())).set_json(&request);
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = json(&body)["id"].as_str().unwrap().to_string();
    let order = market.fetch(&id).await;
    assert_eq!(order.user_id.as_deref(), Some("alice"));
    assert!(order.guest_email.is_none());

    let path = format!("/api/orders/{id}");
    let req = TestRequest::get().uri(&path).insert_header(bearer(&user_token()));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["id"], id.as_str());

    let bob = issue_token("bob", "bob@example.com", vec![Role::User]);
    let req = TestRequest::get().uri(&path).insert_header(bearer(&bob));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri(&path);
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::get().uri("/api/orders").insert_header(bearer(&user_token()));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    let mine = json(&body);
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], id.as_str());
}

#[actix_web::test]
async fn my_orders_needs_a_token() {
    let market = TestMarket::new().await;
    let req = TestRequest::get().uri("/api/orders");
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn guests_prove_ownership_with_their_email() {
    let market = TestMarket::new().await;
    let id = place_guest_order(&market, "listing-1", "guest@example.com").await;

    let req = TestRequest::get().uri(&format!("/api/orders/{id}"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["emailRequired"], true);

    let req = TestRequest::get().uri(&format!("/api/orders/{id}?email=someone@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json(&body)["emailRequired"], true);

    let req = TestRequest::get().uri(&format!("/api/orders/{id}?email=guest@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "pending");

    let req = TestRequest::get().uri("/api/orders/no-such-order?email=guest@example.com");
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn polling_applies_the_gateway_status() {
    let market = TestMarket::new().await;
    let id = place_guest_order(&market, "listing-1", "guest@example.com").await;

    let req = TestRequest::post().uri(&format!("/api/orders/{id}/poll"));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(market.fetch(&id).await.status, OrderStatusType::Pending);

    let req = TestRequest::post().uri(&format!("/api/orders/{id}/poll?email=guest@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "paid");
    assert_eq!(json(&body)["paymentStatus"], "paid");
    assert_eq!(market.fetch(&id).await.status, OrderStatusType::Paid);
}

#[actix_web::test]
async fn polling_during_a_gateway_outage() {
    let market = TestMarket::new().await;
    let id = place_guest_order(&market, "listing-1", "guest@example.com").await;
    let req = TestRequest::post().uri(&format!("/api/orders/{id}/poll?email=guest@example.com"));
    let (status, body) = send(req, market.configure(paying_gateway(), unreachable_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "pending");
}

#[actix_web::test]
async fn invalid_tokens_are_rejected() {
    let market = TestMarket::new().await;
    let id = place_guest_order(&market, "listing-1", "guest@example.com").await;
    let forged = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &crate::auth::JwtClaims {
            sub: "alice".into(),
            email: "alice@example.com".into(),
            roles: vec![Role::Admin],
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        },
        &jsonwebtoken::EncodingKey::from_secret(b"not-the-server-secret-but-long-enough"),
    )
    .unwrap();
    let req = TestRequest::get().uri(&format!("/api/orders/{id}")).insert_header(bearer(&forged));
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json(&body)["error"].is_string());

    let req = TestRequest::get().uri(&format!("/api/orders/{id}")).insert_header(("Authorization", "Token abc"));
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn exchange_rates() {
    let market = TestMarket::new().await;
    let req = TestRequest::get().uri("/api/exchange_rate/eur");
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    let rate = json(&body);
    assert_eq!(rate["baseCurrency"], "EUR");
    assert_eq!(rate["quoteCurrency"], "USD");
    assert_eq!(rate["rate"], 1.1);

    // No live rate and nothing cached, so the configured fallback is used
    let req = TestRequest::get().uri("/api/exchange_rate/GBP");
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["rate"], 1.25);

    let req = TestRequest::get().uri("/api/exchange_rate/XYZ");
    let (status, _) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn health_check() {
    let market = TestMarket::new().await;
    let req = TestRequest::get().uri("/health");
    let (status, body) = send(req, market.configure(paying_gateway(), paying_gateway())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}
