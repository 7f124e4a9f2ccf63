//! Customer API against a mocked Celcoin.
//!
//! Each test serves the real dashboard router on an ephemeral port; Celcoin
//! is an in-process mock, so nothing here needs network access.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use cadastro_integration_tests::{TestContext, customer_json, registration_json};
use httpmock::Method::{DELETE, GET, POST};
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn listing(ctx: &TestContext) -> Value {
    let resp = ctx
        .client
        .get(ctx.url("/api/customers"))
        .send()
        .await
        .expect("Failed to get customers list");
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.expect("Failed to parse customers list")
}

fn names(listing: &Value) -> Vec<&str> {
    listing["customers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect()
}

// ============================================================================
// Demo-mode fallback
// ============================================================================

#[tokio::test]
async fn test_create_falls_back_to_local_store_on_404() {
    let ctx = TestContext::start().await.unwrap();
    ctx.mock_token().await;
    let create = ctx
        .provider
        .mock_async(|when, then| {
            when.method(POST).path("/v2/customers");
            then.status(404).body("route not found");
        })
        .await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(GET).path("/v2/customers");
            then.status(200)
                .json_body(json!({ "items": [customer_json("c-9", "Cliente Remoto")] }));
        })
        .await;

    let resp = ctx
        .client
        .post(ctx.url("/api/customers"))
        .json(&registration_json("Ana Lima"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await.unwrap();
    create.assert_async().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Ana Lima");
    assert!(body["message"].as_str().unwrap().contains("demo mode"));

    // Celcoin answers the listing; local records it does not know ride along.
    let listing = listing(&ctx).await;
    assert_eq!(listing["demo_mode"], false);
    let names = names(&listing);
    assert!(names.contains(&"Cliente Remoto"));
    assert!(names.contains(&"Ana Lima"));
    assert!(names.contains(&"João Silva"));
}

#[tokio::test]
async fn test_create_reports_other_provider_errors() {
    let ctx = TestContext::start().await.unwrap();
    ctx.mock_token().await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(POST).path("/v2/customers");
            then.status(500).body("internal failure");
        })
        .await;

    let resp = ctx
        .client
        .post(ctx.url("/api/customers"))
        .json(&registration_json("Ana Lima"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: Value = resp.json().await.unwrap();
    assert!(!body["error"].as_str().unwrap().contains("internal failure"));
    assert_eq!(ctx.store.list().await.len(), 2);
}

#[tokio::test]
async fn test_invalid_registration_never_reaches_provider() {
    let ctx = TestContext::start().await.unwrap();
    ctx.mock_token().await;
    let create = ctx
        .provider
        .mock_async(|when, then| {
            when.method(POST).path("/v2/customers");
            then.status(201).json_body(customer_json("c-1", "Ana Lima"));
        })
        .await;

    let mut form = registration_json("Ana Lima");
    form["email"] = json!("not-an-email");

    let resp = ctx
        .client
        .post(ctx.url("/api/customers"))
        .json(&form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["field"], "email");
    create.assert_calls_async(0).await;
}

#[tokio::test]
async fn test_delete_unknown_customer_is_not_found() {
    let ctx = TestContext::start().await.unwrap();
    ctx.mock_token().await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(DELETE).path("/v2/customers/does-not-exist");
            then.status(404);
        })
        .await;

    let resp = ctx
        .client
        .delete(ctx.url("/api/customers/does-not-exist"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(ctx.store.list().await.len(), 2);
}

#[tokio::test]
async fn test_remote_delete_drops_local_copy() {
    let ctx = TestContext::start().await.unwrap();
    ctx.mock_token().await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(DELETE).path("/v2/customers/1");
            then.status(204);
        })
        .await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(GET).path("/v2/customers");
            then.status(200).json_body(json!([]));
        })
        .await;

    let resp = ctx
        .client
        .delete(ctx.url("/api/customers/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body.get("message").is_none());

    let listing = listing(&ctx).await;
    assert_eq!(names(&listing), vec!["Maria Santos"]);
}

// ============================================================================
// Addresses
// ============================================================================

#[tokio::test]
async fn test_address_edit_only_touches_target_address() {
    let ctx = TestContext::start().await.unwrap();
    ctx.mock_token().await;
    // No address routes are mocked: Celcoin answers 404 to all of them.

    let address = |street: &str, zipcode: &str| {
        json!({
            "street": street,
            "number": "10",
            "neighborhood": "Centro",
            "city": "Campinas",
            "state": "SP",
            "zipcode": zipcode
        })
    };

    for (street, zipcode) in [("Rua Um", "13010-000"), ("Rua Dois", "13015-000")] {
        let resp = ctx
            .client
            .post(ctx.url("/api/customers/2/addresses"))
            .json(&address(street, zipcode))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let customer = ctx
        .store
        .list()
        .await
        .into_iter()
        .find(|c| c.id.as_str() == "2")
        .unwrap();
    assert_eq!(customer.addresses.len(), 2);
    let target = customer.addresses[1].id.clone();

    let resp = ctx
        .client
        .put(ctx.url(&format!("/api/customers/2/addresses/{}", target.as_str())))
        .json(&json!({ "number": "42" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert!(body["message"].as_str().unwrap().contains("demo mode"));

    let addresses = body["data"]["addresses"].as_array().unwrap();
    assert_eq!(addresses[0]["street"], "Rua Um");
    assert_eq!(addresses[0]["number"], "10");
    assert_eq!(addresses[1]["street"], "Rua Dois");
    assert_eq!(addresses[1]["number"], "42");
}

// ============================================================================
// Listing cache and tokens
// ============================================================================

#[tokio::test]
async fn test_listing_is_cached_until_a_write() {
    let ctx = TestContext::start().await.unwrap();
    let token = ctx.mock_token().await;
    let list = ctx
        .provider
        .mock_async(|when, then| {
            when.method(GET).path("/v2/customers");
            then.status(200)
                .json_body(json!({ "items": [customer_json("1", "João Silva")] }));
        })
        .await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(POST).path("/v2/customers");
            then.status(201).json_body(customer_json("c-2", "Ana Lima"));
        })
        .await;

    listing(&ctx).await;
    listing(&ctx).await;
    list.assert_calls_async(1).await;

    let resp = ctx
        .client
        .post(ctx.url("/api/customers"))
        .json(&registration_json("Ana Lima"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    listing(&ctx).await;
    list.assert_calls_async(2).await;
    token.assert_calls_async(1).await;
}

#[tokio::test]
async fn test_rejected_token_is_requested_again() {
    let ctx = TestContext::start().await.unwrap();
    let token = ctx.mock_token().await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(GET).path("/v2/customers");
            then.status(401).body("invalid token");
        })
        .await;

    for _ in 0..2 {
        let resp = ctx
            .client
            .get(ctx.url("/api/customers"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    token.assert_calls_async(2).await;
}

#[tokio::test]
async fn test_listing_without_provider_serves_demo_records() {
    let ctx = TestContext::start().await.unwrap();
    ctx.mock_token().await;
    ctx.provider
        .mock_async(|when, then| {
            when.method(GET).path("/v2/customers");
            then.status(404);
        })
        .await;

    let resp = ctx
        .client
        .get(ctx.url("/api/customers?name=maria"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["demo_mode"], true);
    assert_eq!(body["total"], 2);
    assert_eq!(names(&body), vec!["Maria Santos"]);
}
