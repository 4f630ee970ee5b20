//! End-to-end tests against a running storefront.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database with at least one product in stock
//! - The storefront running (cargo run -p vitrine-storefront)
//! - SMTP settings that accept mail (registration sends a code)

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use vitrine_integration_tests::{session_client, storefront_url, unique_account};

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_health_endpoints() {
    let client = session_client();
    let base = storefront_url();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = client
        .get(format!("{base}/health/ready"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Catalog
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_product_listing_is_paginated() {
    let client = session_client();
    let base = storefront_url();

    let resp = client
        .get(format!("{base}/api/products?per_page=1&sort=price_asc"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["per_page"], 1);
    assert_eq!(page["page"], 1);
    assert!(page["items"].as_array().unwrap().len() <= 1);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_search_treats_wildcards_literally() {
    let client = session_client();
    let base = storefront_url();

    let page: Value = client
        .get(format!("{base}/api/products/search"))
        .query(&[("q", "%_%")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page["total"], 0);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_missing_product_is_404() {
    let client = session_client();
    let resp = client
        .get(format!("{}/api/products/2147483647", storefront_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Product not found" }));
}

// ============================================================================
// Cart
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and seeded catalog"]
async fn test_cart_add_increment_and_clear() {
    let client = session_client();
    let base = storefront_url();

    let page: Value = client
        .get(format!("{base}/api/products"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let product = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["in_stock"].as_i64().unwrap_or(0) >= 2)
        .cloned()
        .expect("seeded catalog needs a product with stock >= 2");

    let cart: Value = client
        .post(format!("{base}/api/cart/items"))
        .json(&json!({
            "product_id": product["id"],
            "color": product["images"][0]["color"],
            "quantity": 1,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["item_count"], 1);
    let line_id = cart["items"][0]["id"].as_str().unwrap().to_string();

    let cart: Value = client
        .post(format!("{base}/api/cart/items/{line_id}/increment"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"][0]["quantity"], 2);

    // Quantity above stock is clamped, never rejected.
    let cart: Value = client
        .patch(format!("{base}/api/cart/items/{line_id}"))
        .json(&json!({ "quantity": 1_000_000 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"][0]["quantity"], product["in_stock"]);

    let cart: Value = client
        .delete(format!("{base}/api/cart"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["items"], json!([]));
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_checkout_requires_login() {
    let client = session_client();
    let resp = client
        .post(format!("{}/api/checkout/payment-intent", storefront_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Accounts
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server and SMTP"]
async fn test_register_then_duplicate_is_conflict() {
    let client = session_client();
    let base = storefront_url();
    let (name, email) = unique_account();
    let body = json!({ "name": name, "email": email, "password": "segredo123" });

    let resp = client
        .post(format!("{base}/api/auth/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["status"], "pending");

    let resp = client
        .post(format!("{base}/api/auth/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Unverified accounts can still log in; the flag routes them to the code prompt.
    let user: Value = client
        .post(format!("{base}/api/auth/login"))
        .json(&json!({ "email": email, "password": "segredo123" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user["email_verified"], false);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_register_validation() {
    let client = session_client();
    let resp = client
        .post(format!("{}/api/auth/register", storefront_url()))
        .json(&json!({ "name": "x", "email": "x@vitrine.test", "password": "segredo123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_wrong_verification_code_for_unknown_user() {
    let client = session_client();
    let resp = client
        .post(format!("{}/api/auth/verify-email", storefront_url()))
        .json(&json!({ "user_id": 2_147_483_647, "code": "1234" }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Admin and webhooks
// ============================================================================

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_admin_requires_login() {
    let client = session_client();
    let resp = client
        .get(format!("{}/api/admin/summary", storefront_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running storefront server"]
async fn test_unsigned_webhook_is_rejected() {
    let client = session_client();
    let resp = client
        .post(format!("{}/api/webhooks/stripe", storefront_url()))
        .body(r#"{"id":"evt_1","type":"charge.succeeded","data":{"object":{}}}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
