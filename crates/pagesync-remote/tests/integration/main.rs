//! Integration tests for pagesync-remote
//!
//! Uses wiremock to simulate the wiki REST API and verifies end-to-end
//! behavior of the REST client: pagination, throttling retries and the
//! content, property, label and attachment endpoints.

mod common;
