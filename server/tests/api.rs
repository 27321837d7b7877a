use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use agora_ticketing::config::Config;
use agora_ticketing::routes::create_routes;
use agora_ticketing::state::AppState;
use agora_ticketing::store::MemoryStore;

fn app() -> Router {
    let state = AppState::new(Arc::new(MemoryStore::new()));
    create_routes(state, &Config::default())
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(body.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create(app: &Router, uri: &str, body: Value) -> Value {
    let (status, json) = call(app, Method::POST, uri, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "POST {uri} failed: {json}");
    json["data"].clone()
}

/// Organizer, event and one tier with `total` seats; returns the tier id.
async fn seed_tier(app: &Router, total: i32) -> (String, String, String) {
    let organizer = create(
        app,
        "/organizers",
        json!({"name": "Stellar India", "contact_email": "hi@stellar.in"}),
    )
    .await;
    let organizer_id = organizer["id"].as_str().unwrap().to_string();
    let event = create(
        app,
        "/events",
        json!({
            "organizer_id": organizer_id,
            "title": "Bengaluru Build Day",
            "location": "Bengaluru",
            "start_time": "2030-03-01T09:00:00Z",
            "end_time": "2030-03-01T18:00:00Z"
        }),
    )
    .await;
    let event_id = event["id"].as_str().unwrap().to_string();
    let tier = create(
        app,
        &format!("/events/{event_id}/tiers"),
        json!({"name": "General", "price": "15.00", "total_quantity": total}),
    )
    .await;
    (
        organizer_id,
        event_id,
        tier["id"].as_str().unwrap().to_string(),
    )
}

async fn seed_user(app: &Router, email: &str) -> String {
    let user = create(app, "/users", json!({"name": "Ada", "email": email})).await;
    user["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let (status, json) = call(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["store"], "memory");
}

#[tokio::test]
async fn test_security_headers_on_responses() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_featured_organizers_are_the_four_showcase_cards() {
    let app = app();
    let (status, json) = call(&app, Method::GET, "/organizers/featured", None).await;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|card| card["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "stellar-west-africa",
            "stellar-east-african-community",
            "stellar-india",
            "stellar-portugal",
        ]
    );
}

#[tokio::test]
async fn test_duplicate_email_is_a_conflict() {
    let app = app();
    seed_user(&app, "ada@example.com").await;

    let (status, json) = call(
        &app,
        Method::POST,
        "/users",
        Some(json!({"name": "Ada", "email": "ada@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_malformed_input_is_a_validation_error() {
    let app = app();

    let (status, json) = call(&app, Method::GET, "/users/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = call(&app, Method::POST, "/users", Some(json!({"name": "Ada"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/users",
        Some(json!({"name": "Ada", "email": "not-an-email"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_event_for_missing_organizer_is_rejected() {
    let app = app();
    let (status, json) = call(
        &app,
        Method::POST,
        "/events",
        Some(json!({
            "organizer_id": "00000000-0000-0000-0000-000000000000",
            "title": "Orphan",
            "location": "Nowhere",
            "start_time": "2030-01-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
}

#[tokio::test]
async fn test_tier_with_available_above_total_is_rejected() {
    let app = app();
    let (_, event_id, _) = seed_tier(&app, 1).await;
    let (status, json) = call(
        &app,
        Method::POST,
        &format!("/events/{event_id}/tiers"),
        Some(json!({
            "name": "Broken",
            "price": "1.00",
            "total_quantity": 10,
            "available_quantity": 12
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_purchase_until_sold_out() {
    let app = app();
    let (_, _, tier_id) = seed_tier(&app, 1).await;
    let user_id = seed_user(&app, "ada@example.com").await;
    let purchase_uri = format!("/tiers/{tier_id}/purchase");

    let purchase = create(&app, &purchase_uri, json!({"user_id": user_id})).await;
    assert_eq!(purchase["ticket"]["status"], "active");
    assert_eq!(purchase["transaction"]["status"], "pending");
    assert_eq!(purchase["transaction"]["currency"], "USDC");
    assert_eq!(purchase["transaction"]["amount"], "15.00");

    let (status, json) = call(
        &app,
        Method::POST,
        &purchase_uri,
        Some(json!({"user_id": user_id})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("sold out"));

    let (_, tier) = call(&app, Method::GET, &format!("/tiers/{tier_id}"), None).await;
    assert_eq!(tier["data"]["available_quantity"], 0);
}

#[tokio::test]
async fn test_payment_settlement_and_check_in() {
    let app = app();
    let (_, _, tier_id) = seed_tier(&app, 3).await;
    let user_id = seed_user(&app, "ada@example.com").await;
    let purchase = create(
        &app,
        &format!("/tiers/{tier_id}/purchase"),
        json!({"user_id": user_id, "currency": "XLM"}),
    )
    .await;
    let ticket_id = purchase["ticket"]["id"].as_str().unwrap();
    let transaction_id = purchase["transaction"]["id"].as_str().unwrap();

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/tickets/{ticket_id}/check-in"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, json) = call(
        &app,
        Method::POST,
        &format!("/transactions/{transaction_id}/confirm"),
        Some(json!({"transaction_hash": "9f2c"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "completed");
    assert_eq!(json["data"]["stellar_transaction_hash"], "9f2c");

    let (status, json) = call(
        &app,
        Method::POST,
        &format!("/tickets/{ticket_id}/check-in"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "used");

    let (_, json) = call(&app, Method::GET, &format!("/tickets/{ticket_id}"), None).await;
    assert_eq!(json["data"]["ticket"]["status"], "used");
    assert_eq!(json["data"]["transaction"]["currency"], "XLM");

    let (_, json) = call(
        &app,
        Method::GET,
        &format!("/users/{user_id}/tickets"),
        None,
    )
    .await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_payment_cancels_ticket_and_restocks() {
    let app = app();
    let (_, _, tier_id) = seed_tier(&app, 1).await;
    let user_id = seed_user(&app, "ada@example.com").await;
    let purchase = create(
        &app,
        &format!("/tiers/{tier_id}/purchase"),
        json!({"user_id": user_id}),
    )
    .await;
    let transaction_id = purchase["transaction"]["id"].as_str().unwrap();

    let (status, json) = call(
        &app,
        Method::POST,
        &format!("/transactions/{transaction_id}/fail"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["transaction"]["status"], "failed");
    assert_eq!(json["data"]["ticket"]["status"], "cancelled");

    let (_, tier) = call(&app, Method::GET, &format!("/tiers/{tier_id}"), None).await;
    assert_eq!(tier["data"]["available_quantity"], 1);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/transactions/{transaction_id}/confirm"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_deleting_organizer_cascades_over_http() {
    let app = app();
    let (organizer_id, event_id, tier_id) = seed_tier(&app, 2).await;
    let user_id = seed_user(&app, "ada@example.com").await;
    let purchase = create(
        &app,
        &format!("/tiers/{tier_id}/purchase"),
        json!({"user_id": user_id}),
    )
    .await;
    let ticket_id = purchase["ticket"]["id"].as_str().unwrap();

    let (status, _) = call(
        &app,
        Method::DELETE,
        &format!("/organizers/{organizer_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    for uri in [
        format!("/events/{event_id}"),
        format!("/tiers/{tier_id}"),
        format!("/tickets/{ticket_id}"),
    ] {
        let (status, _) = call(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri} survived the cascade");
    }

    let (status, _) = call(&app, Method::GET, &format!("/users/{user_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_events_can_be_filtered_by_organizer() {
    let app = app();
    let (organizer_id, _, _) = seed_tier(&app, 1).await;
    seed_tier(&app, 1).await;

    let (_, all) = call(&app, Method::GET, "/events", None).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);

    let (_, filtered) = call(
        &app,
        Method::GET,
        &format!("/events?organizer_id={organizer_id}"),
        None,
    )
    .await;
    let events = filtered["data"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["organizer_id"], organizer_id.as_str());
}

#[tokio::test]
async fn test_update_moves_updated_at_forward() {
    let app = app();
    let user_id = seed_user(&app, "ada@example.com").await;
    let (_, before) = call(&app, Method::GET, &format!("/users/{user_id}"), None).await;

    let (status, after) = call(
        &app,
        Method::PUT,
        &format!("/users/{user_id}"),
        Some(json!({"name": "Ada Lovelace"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["data"]["name"], "Ada Lovelace");

    let parse = |value: &Value| {
        value
            .as_str()
            .unwrap()
            .parse::<chrono::DateTime<chrono::Utc>>()
            .unwrap()
    };
    let updated_at = parse(&after["data"]["updated_at"]);
    assert!(updated_at >= parse(&before["data"]["updated_at"]));
    assert!(updated_at >= parse(&after["data"]["created_at"]));
}

#[tokio::test]
async fn test_malformed_confirmation_leaves_payment_pending() {
    let app = app();
    let (_, _, tier_id) = seed_tier(&app, 1).await;
    let user_id = seed_user(&app, "ada@example.com").await;
    let purchase = create(
        &app,
        &format!("/tiers/{tier_id}/purchase"),
        json!({"user_id": user_id}),
    )
    .await;
    let transaction_id = purchase["transaction"]["id"].as_str().unwrap();
    let confirm = format!("/transactions/{transaction_id}/confirm");

    let (status, json) = call(
        &app,
        Method::POST,
        &confirm,
        Some(json!({"transaction_hash": 12345})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (_, json) = call(
        &app,
        Method::GET,
        &format!("/transactions/{transaction_id}"),
        None,
    )
    .await;
    assert_eq!(json["data"]["status"], "pending");

    let (status, json) = call(
        &app,
        Method::POST,
        &confirm,
        Some(json!({"transaction_hash": "12345"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["stellar_transaction_hash"], "12345");
}

#[tokio::test]
async fn test_batch_purchase_over_http() {
    let app = app();
    let (_, _, tier_id) = seed_tier(&app, 4).await;
    let user_id = seed_user(&app, "ada@example.com").await;
    let uri = format!("/tiers/{tier_id}/purchases");

    let batch = create(&app, &uri, json!({"user_id": user_id, "quantity": 3})).await;
    assert_eq!(batch["purchases"].as_array().unwrap().len(), 3);
    assert_eq!(batch["total_amount"], "45.00");

    let (status, json) = call(
        &app,
        Method::POST,
        &uri,
        Some(json!({"user_id": user_id, "quantity": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["success"], false);

    let (_, json) = call(&app, Method::GET, &format!("/tiers/{tier_id}"), None).await;
    assert_eq!(json["data"]["available_quantity"], 1);
}

#[tokio::test]
async fn test_transfer_over_http() {
    let app = app();
    let (_, _, tier_id) = seed_tier(&app, 1).await;
    let buyer = seed_user(&app, "ada@example.com").await;
    let friend = seed_user(&app, "grace@example.com").await;
    let purchase = create(
        &app,
        &format!("/tiers/{tier_id}/purchase"),
        json!({"user_id": buyer}),
    )
    .await;
    let ticket_id = purchase["ticket"]["id"].as_str().unwrap();
    let transaction_id = purchase["transaction"]["id"].as_str().unwrap();
    let transfer = format!("/tickets/{ticket_id}/transfer");

    let (status, _) = call(
        &app,
        Method::POST,
        &transfer,
        Some(json!({"to_user_id": friend})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/transactions/{transaction_id}/confirm"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = call(
        &app,
        Method::POST,
        &transfer,
        Some(json!({"to_user_id": friend})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user_id"], friend.as_str());

    let (_, json) = call(&app, Method::GET, &format!("/users/{friend}/tickets"), None).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_event_end_time_can_be_cleared() {
    let app = app();
    let (_, event_id, _) = seed_tier(&app, 1).await;
    let uri = format!("/events/{event_id}");

    let (status, json) = call(
        &app,
        Method::PUT,
        &uri,
        Some(json!({"title": "Build Night"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["end_time"], "2030-03-01T18:00:00Z");

    let (status, json) = call(&app, Method::PUT, &uri, Some(json!({"end_time": null}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["end_time"], Value::Null);
    assert_eq!(json["data"]["title"], "Build Night");
}
