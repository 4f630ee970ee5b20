//! Integration tests for Vitrine.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate and seed a database, then start the storefront
//! cargo run -p vitrine-cli -- migrate
//! cargo run -p vitrine-cli -- seed products --file catalog.yaml
//! cargo run -p vitrine-storefront
//!
//! # Run the ignored tests against it
//! cargo test -p vitrine-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_TEST_URL` overrides the server address
//! (default `http://localhost:3000`).

use reqwest::Client;

/// Base URL of the running storefront.
#[must_use]
pub fn storefront_url() -> String {
    std::env::var("STOREFRONT_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// A client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the TLS backend can't be initialised.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// A name and email no other test run has used.
#[must_use]
pub fn unique_account() -> (String, String) {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let short = suffix.get(..12).unwrap_or(&suffix);
    (format!("t{short}"), format!("test+{suffix}@vitrine.test"))
}
