//! End-to-end tests driving `Client` through the real `HttpTransport`
//! against a local mock server.

use std::sync::Arc;

use duffel::reqwest::Method;
use duffel::{Client, Error, HttpTransport};
use futures_util::TryStreamExt;
use mockito::Matcher;
use serde_json::{Value, json};

fn test_client(server: &mockito::ServerGuard) -> Client {
    Client::with_base_url(
        Arc::new(HttpTransport::default()),
        "duffel_test_token",
        server.url(),
    )
}

#[test_log::test(tokio::test)]
async fn sends_auth_and_version_headers() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/air/airlines/arl_1")
        .match_header("authorization", "Bearer duffel_test_token")
        .match_header("duffel-version", "beta")
        .with_status(200)
        .with_body(r#"{"data": {"id": "arl_1", "name": "Duffel Airways"}}"#)
        .create_async()
        .await;

    let airline: Value = test_client(&server)
        .request(Method::GET, "/air/airlines/arl_1", &[], None, None)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(airline["name"], "Duffel Airways");
}

#[test_log::test(tokio::test)]
async fn envelopes_request_body_and_unwraps_response_data() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/air/offer_requests")
        .match_body(Matcher::Json(json!({
            "data": {"cabin_class": "economy", "passengers": [{"type": "adult"}]}
        })))
        .with_status(201)
        .with_body(r#"{"data": {"id": "orq_1", "cabin_class": "economy"}}"#)
        .create_async()
        .await;

    let created: Value = test_client(&server)
        .request(
            Method::POST,
            "/air/offer_requests",
            &[],
            Some(json!({"cabin_class": "economy", "passengers": [{"type": "adult"}]})),
            None,
        )
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(created["id"], "orq_1");
}

#[test_log::test(tokio::test)]
async fn classifies_client_errors_from_the_wire() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/air/offers/off_missing")
        .with_status(404)
        .with_body(r#"{"errors": [{"code": "not_found", "title": "Not found"}]}"#)
        .create_async()
        .await;

    let result: anyhow::Result<Value> = test_client(&server)
        .request(Method::GET, "/air/offers/off_missing", &[], None, None)
        .await;

    mock.assert_async().await;
    let err = result.unwrap_err();
    let err = err.downcast_ref::<Error>().unwrap();
    assert!(matches!(err, Error::Api { .. }));
    assert_eq!(err.errors().unwrap()[0]["code"], "not_found");
}

#[test_log::test(tokio::test)]
async fn classifies_server_errors_from_the_wire() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/air/orders")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("panic at the gateway")
        .create_async()
        .await;

    let result: anyhow::Result<Value> = test_client(&server)
        .request(Method::GET, "/air/orders", &[], None, None)
        .await;

    mock.assert_async().await;
    let err = result.unwrap_err();
    let err = err.downcast_ref::<Error>().unwrap();
    // Non-JSON 5xx body decodes to nothing.
    assert!(matches!(err, Error::Http { body: None, .. }));
}

#[test_log::test(tokio::test)]
async fn iterates_across_pages_following_cursors() {
    let mut server = mockito::Server::new_async().await;

    // The query strings differ per page, so each mock matches exactly one
    // fetch.
    let first = server
        .mock("GET", "/air/orders")
        .match_query(Matcher::Exact("limit=200".into()))
        .with_status(200)
        .with_body(
            json!({
                "data": [{"id": "ord_1"}, {"id": "ord_2"}],
                "meta": {"after": "c1"},
            })
            .to_string(),
        )
        .create_async()
        .await;
    let second = server
        .mock("GET", "/air/orders")
        .match_query(Matcher::Exact("limit=200&after=c1".into()))
        .with_status(200)
        .with_body(
            json!({
                "data": [{"id": "ord_3"}],
                "meta": {"after": null},
            })
            .to_string(),
        )
        .create_async()
        .await;

    let orders: Vec<Value> = test_client(&server)
        .iterate(Method::GET, "/air/orders", &[], None, None, None)
        .try_collect()
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(
        orders.iter().map(|o| o["id"].as_str().unwrap()).collect::<Vec<_>>(),
        vec!["ord_1", "ord_2", "ord_3"]
    );
}
