//! End-to-end request scenarios against a materialized router.

use std::fs;
use std::time::Duration;

use http::{Method, StatusCode};
use keel_controller::{Controller, Descriptor, Invocation, RouteConfig};
use keel_core::{handler_fn, text_response, Params};
use keel_middleware::param_middleware_fn;
use keel_server::RouterManager;
use keel_test::TestClient;
use serde_json::json;

#[derive(Clone, Default)]
struct Links;

impl Controller for Links {}

fn links() -> Descriptor<Links> {
    Descriptor::new(Links)
        .sync_operation("Get", |inv: &mut Invocation<Links>| {
            inv.redirect(StatusCode::TEMPORARY_REDIRECT, "/r");
            inv.set("link", "Get");
        })
        .sync_operation("RedirectFunc", |inv: &mut Invocation<Links>| {
            inv.set("link", "RedirectFunc");
        })
}

#[tokio::test]
async fn redirect_is_followed_to_the_target_body() {
    let links = links();
    let mut router = RouterManager::get("radix").unwrap();
    router
        .public_route("/", &links, RouteConfig::new("get:Get"))
        .unwrap()
        .public_route("/r", &links, RouteConfig::new("get:RedirectFunc"))
        .unwrap();

    let client = TestClient::from_router(&router).unwrap();
    let direct = client.get("/").send().await.unwrap();
    direct
        .assert_status(StatusCode::TEMPORARY_REDIRECT)
        .assert_header("location", "/r");

    let client = client.follow_redirects(true);
    client
        .get("/")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({"link": "RedirectFunc"}));
}

#[derive(Clone, Default)]
struct Sleeper;

impl Controller for Sleeper {}

#[tokio::test]
async fn cancelled_request_is_not_rendered() {
    let sleeper = Descriptor::new(Sleeper).operation("Sleep", |inv| {
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            inv.set("slept", true);
        })
    });
    let mut router = RouterManager::get("radix").unwrap();
    router
        .public_route("/sleep", &sleeper, RouteConfig::new("get:Sleep"))
        .unwrap();

    let client = TestClient::from_router(&router).unwrap();
    let response = client
        .get("/sleep")
        .send_cancelled_after(Duration::from_millis(20))
        .await
        .unwrap();

    assert_eq!(response.status_code(), 499);
    assert!(response.body().is_empty());
}

#[tokio::test]
async fn favicon_and_static_directory() {
    let dir = tempfile::tempdir().unwrap();
    let favicon = dir.path().join("fav.ico");
    fs::write(&favicon, [0u8, 0, 1, 0]).unwrap();
    let asserts = dir.path().join("asserts");
    fs::create_dir(&asserts).unwrap();
    fs::copy(&favicon, asserts.join("fav.ico")).unwrap();

    let mut router = RouterManager::get("radix").unwrap();
    router
        .favicon(&favicon)
        .public_dir("/asserts", &asserts)
        .not_found(handler_fn(|_req| async {
            text_response(StatusCode::NOT_FOUND, "nothing here")
        }));

    let client = TestClient::from_router(&router).unwrap();

    client
        .get("/favicon.ico")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "image/x-icon")
        .assert_body_eq([0u8, 0, 1, 0]);
    client
        .get("/asserts/fav.ico")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::OK);
    client
        .get("/asserts/")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND);
    client
        .get("/missing")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::NOT_FOUND)
        .assert_body_eq("nothing here");
}

#[tokio::test]
async fn unbound_method_is_not_allowed() {
    let links = links();
    let mut router = RouterManager::get("radix").unwrap();
    router
        .public_route("/", &links, RouteConfig::new("get:Get"))
        .unwrap();

    let client = TestClient::from_router(&router).unwrap();
    client
        .request(Method::PUT, "/")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::METHOD_NOT_ALLOWED)
        .assert_header("allow", "GET");
}

#[derive(Clone, Default)]
struct Account;

impl Controller for Account {}

#[tokio::test]
async fn protected_route_runs_guard_first() {
    let account = Descriptor::new(Account)
        .sync_operation("Get", |inv: &mut Invocation<Account>| inv.set("account", "ok"));

    let mut router = RouterManager::get("radix").unwrap();
    router
        .protect_with(param_middleware_fn(|next| {
            keel_core::param_handler_fn(move |req: keel_core::Request, params: Params| {
                let next = next.clone();
                async move {
                    if req.headers().contains_key("authorization") {
                        next(req, params).await
                    } else {
                        text_response(StatusCode::UNAUTHORIZED, "unauthorized")
                    }
                }
            })
        }))
        .protected_route("/account", &account, RouteConfig::new("get:Get"))
        .unwrap();

    let client = TestClient::from_router(&router).unwrap();
    client
        .get("/account")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::UNAUTHORIZED);
    client
        .get("/account")
        .header("authorization", "Bearer token")
        .send()
        .await
        .unwrap()
        .assert_status(StatusCode::OK)
        .assert_json_eq(&json!({"account": "ok"}));
}
