#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use horizonte_storefront::Config;
use serde_json::Value;
use tower::ServiceExt;

pub fn test_config(database_url: &str) -> Config {
    Config {
        database_url: database_url.into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        token_ttl_hours: 1,
        upload_dir: std::env::temp_dir().join("horizonte-test-uploads"),
        max_upload_bytes: 1024,
        currency: "CLP".into(),
        nats_url: None,
        admin_email: None,
        admin_password: None,
    }
}

pub async fn send(app: axum::Router, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();
    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
