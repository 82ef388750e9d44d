mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use common::{seed_blog, TestServer};

fn keys(items: &Value) -> Vec<(String, String)> {
    items
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|i| (i["type"].as_str().unwrap_or_default().to_string(), i["id"].as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn pair(type_name: &str, id: &str) -> (String, String) {
    (type_name.to_string(), id.to_string())
}

#[tokio::test]
async fn resource_objects_carry_linkage_instead_of_foreign_keys() -> Result<()> {
    let server = TestServer::start().await?;
    seed_blog(&server).await?;

    let (status, body) = server.get("/posts/1").await?;
    assert_eq!(status, StatusCode::OK);
    let post = &body["data"];
    assert_eq!(post["id"], json!("1"));
    assert_eq!(post["type"], json!("posts"));
    assert!(post.get("author_id").is_none(), "foreign key leaked: {}", post);
    assert_eq!(post["links"]["author"]["linkage"], json!({"id": "1", "type": "users"}));
    assert_eq!(
        post["links"]["comments"]["linkage"],
        json!([{"id": "1", "type": "comments"}, {"id": "2", "type": "comments"}])
    );
    assert!(body.get("included").is_none());
    Ok(())
}

#[tokio::test]
async fn include_deduplicates_across_paths() -> Result<()> {
    let server = TestServer::start().await?;
    seed_blog(&server).await?;

    let (status, body) = server.get("/posts/1?include=author,comments.author").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        keys(&body["included"]),
        vec![pair("users", "1"), pair("comments", "1"), pair("users", "2"), pair("comments", "2")]
    );
    Ok(())
}

#[tokio::test]
async fn include_over_collections_and_unexposed_names() -> Result<()> {
    let server = TestServer::start().await?;
    seed_blog(&server).await?;

    let (_, body) = server.get("/posts?filter[status]=open&include=author,secrets").await?;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    // both open posts belong to ann
    assert_eq!(keys(&body["included"]), vec![pair("users", "1")]);

    let (_, body) = server.get("/posts?filter[status]=closed&include=secrets").await?;
    assert_eq!(body["included"], json!([]));
    Ok(())
}

#[tokio::test]
async fn relation_urls_return_related_records() -> Result<()> {
    let server = TestServer::start().await?;
    seed_blog(&server).await?;

    let (status, body) = server.get("/posts/1/links/comments").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys(&body["data"]), vec![pair("comments", "1"), pair("comments", "2")]);

    let (_, body) = server.get("/comments/3/author").await?;
    assert_eq!(body["data"]["name"], json!("bob"));

    // declared but unexposed or unknown names fail closed
    let (status, body) = server.get("/posts/1/links/secrets").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"data": null}));

    let (status, _) = server.send(Method::POST, "/posts/1/links/comments", &json!({})).await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn write_linkage_sets_foreign_keys() -> Result<()> {
    let server = TestServer::start().await?;
    seed_blog(&server).await?;

    let body = json!({"data": {
        "type": "comments",
        "body": "fourth",
        "links": {
            "post": {"linkage": {"id": 2, "type": "posts"}},
            "author": {"linkage": {"id": 1, "type": "users"}}
        }
    }});
    let (status, body) = server.send(Method::POST, "/comments", &body).await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["data"]["links"]["post"]["linkage"], json!({"id": "2", "type": "posts"}));

    let (_, body) = server.get("/posts/2").await?;
    assert_eq!(keys(&body["data"]["links"]["comments"]["linkage"]), vec![pair("comments", "4")]);

    // to-many linkage is accepted but not applied
    let update = json!({"data": {
        "type": "posts",
        "relationships": {"comments": {"data": [{"id": "1", "type": "comments"}]}}
    }});
    let (status, body) = server.send(Method::PATCH, "/posts/2", &update).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys(&body["data"]["links"]["comments"]["linkage"]), vec![pair("comments", "4")]);
    Ok(())
}
