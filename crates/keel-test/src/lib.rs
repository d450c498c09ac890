//! # Keel Test
//!
//! In-memory testing for Keel applications. Requests are handed straight to
//! a materialized router handler, so no socket is bound.
//!
//! - [`TestClient`] - sends requests, optionally following redirects
//! - [`TestRequest`] / [`TestRequestBuilder`] - request construction
//! - [`TestResponse`] - collected response with assertion helpers
//!
//! A request can also be cancelled mid-flight with
//! [`TestClientRequest::send_cancelled_after`], which behaves like a client
//! that hung up before the response was written.
//!
//! ## Example
//!
//! ```rust
//! use http::StatusCode;
//! use keel_controller::{Controller, Descriptor, Invocation, RouteConfig};
//! use keel_server::RouterManager;
//! use keel_test::TestClient;
//! use serde_json::json;
//!
//! #[derive(Clone, Default)]
//! struct Users;
//! impl Controller for Users {}
//!
//! # tokio_test::block_on(async {
//! let users = Descriptor::new(Users).sync_operation("Get", |inv: &mut Invocation<Users>| {
//!     let id = inv.param("id").unwrap_or_default().to_string();
//!     inv.set("id", id);
//! });
//!
//! let mut router = RouterManager::get("radix").unwrap();
//! router.public_route("/users/{id}", &users, RouteConfig::new("get:Get")).unwrap();
//!
//! let client = TestClient::from_router(&router).unwrap();
//! client
//!     .get("/users/42")
//!     .send()
//!     .await
//!     .unwrap()
//!     .assert_status(StatusCode::OK)
//!     .assert_json_eq(&json!({"id": "42"}));
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/keel-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest, DEFAULT_MAX_REDIRECTS};
pub use error::TestError;
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
