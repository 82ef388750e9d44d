mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::TestServer;

#[tokio::test]
async fn post_round_trip_creates_widget() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server
        .send(Method::POST, "/widgets", &json!({"data": {"type": "widgets", "name": "foo"}}))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["data"]["type"], json!("widgets"));
    assert_eq!(body["data"]["name"], json!("foo"));
    let id = body["data"]["id"].as_str().expect("id is a string").to_string();

    let (status, body) = server.get(&format!("/widgets/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("foo"));
    // guarded timestamps are never rendered
    assert!(body["data"].get("created_at").is_none());
    Ok(())
}

#[tokio::test]
async fn post_rejects_bad_payloads() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server.send(Method::POST, "/posts", &json!({"type": "posts"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    // posts carry error scope 65536; MalformedPayload is bit 64
    assert_eq!(body["errors"][0]["code"], json!(65536 | 64));
    assert_eq!(body["errors"][0]["status"], json!(400));

    let (status, _) = server.send(Method::POST, "/posts", &json!({"data": {"title": "x"}})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.send(Method::POST, "/posts", &json!({"data": {"type": "users"}})).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errors"][0]["expected"], json!("posts"));
    assert_eq!(body["errors"][0]["given"], json!("users"));
    Ok(())
}

#[tokio::test]
async fn put_and_patch_update_existing_records() -> Result<()> {
    let server = TestServer::start().await?;
    server.seed("widgets", json!({"name": "old", "color": "red"})).await?;

    let (status, body) = server
        .send(Method::PUT, "/widgets/1", &json!({"data": {"type": "widgets", "name": "new"}}))
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["name"], json!("new"));
    assert_eq!(body["data"]["color"], json!("red"));

    let (status, body) = server
        .send(Method::PATCH, "/widgets/1", &json!({"data": {"type": "widgets", "color": "blue"}}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["color"], json!("blue"));
    Ok(())
}

#[tokio::test]
async fn put_on_missing_id_is_not_found() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server
        .send(Method::PUT, "/widgets/42", &json!({"data": {"type": "widgets", "name": "x"}}))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"][0]["code"], json!(1));

    let (status, body) = server
        .send(Method::PUT, "/widgets", &json!({"data": {"type": "widgets", "name": "x"}}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["code"], json!(4));
    Ok(())
}

#[tokio::test]
async fn delete_returns_no_content_even_when_missing() -> Result<()> {
    let server = TestServer::start().await?;
    server.seed("widgets", json!({"name": "doomed"})).await?;

    let (status, body) = server.send(Method::DELETE, "/widgets/1", &Value::Null).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = server.get("/widgets/1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": null}));

    let (status, _) = server.send(Method::DELETE, "/widgets/1", &Value::Null).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn options_lists_enabled_verbs() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.request(Method::OPTIONS, server.url("/tags")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["allow"], "GET,OPTIONS");
    assert_eq!(res.headers()["content-type"], "application/vnd.api+json");
    assert!(res.text().await?.is_empty());

    let res = server.client.request(Method::OPTIONS, server.url("/widgets")).send().await?;
    assert_eq!(res.headers()["allow"], "GET,POST,PUT,PATCH,DELETE,OPTIONS");

    let res = server.client.request(Method::OPTIONS, server.url("/gadgets")).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // browser preflights still get CORS answers
    let res = server
        .client
        .request(Method::OPTIONS, server.url("/widgets"))
        .header("origin", "http://example.com")
        .header("access-control-request-method", "POST")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("access-control-allow-methods").is_some());
    assert!(res.headers().get("allow").is_none());
    Ok(())
}

#[tokio::test]
async fn undecodable_body_is_malformed_payload() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.client.post(server.url("/posts")).body(vec![0xffu8, 0xfe, 0x7b]).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(res.headers()["content-type"], "application/vnd.api+json");
    let body: Value = res.json().await?;
    assert_eq!(body["errors"][0]["code"], json!(65536 | 64));
    Ok(())
}

#[tokio::test]
async fn disabled_verbs_and_unknown_types_fail_closed() -> Result<()> {
    let server = TestServer::start().await?;

    let (status, body) = server.send(Method::POST, "/tags", &json!({"data": {"type": "tags"}})).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["errors"][0]["method"], json!("POST"));

    let (status, body) = server.get("/gadgets").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"][0]["type"], json!("gadgets"));
    Ok(())
}
