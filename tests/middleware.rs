#![cfg(feature = "middleware")]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use reqlog::memory_sink::MemorySink;
use reqlog::middleware::{attach_response_error, log_requests, RequestMiddleware};
use reqlog::{ErrorValue, Logger, LoggerConfig, OutputMode};
use serde_json::{json, Map, Value};
use tower::ServiceExt;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

fn logger(sink: &Arc<MemorySink>) -> Logger {
    Logger::new(
        LoggerConfig::default()
            .with_mode(OutputMode::Production)
            .with_sink(sink.clone()),
    )
}

async fn not_found() -> Result<String, ErrorValue> {
    Err(ErrorValue::from("Route not found: /missing")
        .with_trace(Vec::<String>::new())
        .with_code("ROUTE_NOT_FOUND")
        .with_name("NotFoundError")
        .with_status(404))
}

fn app(mw: RequestMiddleware) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello world!" }).post(|Json(body): Json<Value>| async move {
            (StatusCode::CREATED, Json(json!({"received": body, "success": true})))
        }))
        .route(
            "/echo-id",
            get(|headers: HeaderMap| async move {
                headers
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string()
            }),
        )
        .route("/missing", get(not_found))
        .layer(from_fn_with_state(mw, log_requests))
}

#[tokio::test]
async fn get_request_writes_one_record_after_body_completes() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder().logger(logger(&sink)).build();

    let response = app(mw)
        .oneshot(Request::get("/?id=12&fields=id&fields=title").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(sink.is_empty(), "record written before the body was sent");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Hello world!");

    let records = sink.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["type"], "req");
    assert!(record["timestamp"].is_string());
    assert!(record.get("id").is_none());
    assert_eq!(record["req"]["method"], "GET");
    assert_eq!(record["req"]["url"], "/?id=12&fields=id&fields=title");
    assert_eq!(record["req"]["path"], "/");
    assert_eq!(record["req"]["query"], json!({"id": "12", "fields": ["id", "title"]}));
    assert_eq!(record["req"]["body"], json!({}));
    assert_eq!(record["res"]["statusCode"], 200);
    assert_eq!(record["res"]["headers"]["content-type"], "text/plain; charset=utf-8");

    let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["timestamp", "type", "req", "res"]);
}

#[tokio::test]
async fn dropped_response_body_writes_no_record() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder().logger(logger(&sink)).build();

    let response = app(mw)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    drop(response);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn head_request_writes_one_record() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder().logger(logger(&sink)).build();

    let response = app(mw)
        .oneshot(Request::head("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["req"]["method"], "HEAD");
    assert_eq!(records[0]["res"]["statusCode"], 200);
}

#[tokio::test]
async fn panicking_request_snapshot_still_serves_the_request() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder()
        .logger(logger(&sink))
        .header(REQUEST_ID)
        .req(|_| panic!("bad req hook"))
        .build();

    let response = tokio::spawn(app(mw).oneshot(Request::get("/").body(Body::empty()).unwrap()))
        .await
        .expect("request task panicked")
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Hello world!");
    assert!(sink.is_empty());
}

#[tokio::test]
async fn correlation_id_is_shared_by_request_response_and_record() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder()
        .logger(logger(&sink))
        .header(REQUEST_ID)
        .build();

    let response = app(mw)
        .oneshot(Request::get("/echo-id").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let header_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let seen_by_handler = String::from_utf8(body.to_vec()).unwrap();

    let record = &sink.records()[0];
    assert_eq!(header_id.len(), 24);
    assert_eq!(seen_by_handler, header_id);
    assert_eq!(record["id"], header_id.as_str());
    assert_eq!(record["req"]["headers"]["x-request-id"], header_id.as_str());
    assert_eq!(record["res"]["headers"]["x-request-id"], header_id.as_str());

    let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["timestamp", "type", "id", "req", "res"]);
}

#[tokio::test]
async fn custom_id_generator_and_defaults() {
    let sink = Arc::new(MemorySink::new());
    let mut defaults = Map::new();
    defaults.insert("service".into(), json!("example"));
    let mw = RequestMiddleware::builder()
        .logger(logger(&sink))
        .defaults(defaults)
        .header(REQUEST_ID)
        .header_id(|| "fixed-id".to_string())
        .build();

    let response = app(mw)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "fixed-id");
    response.into_body().collect().await.unwrap();

    let record = &sink.records()[0];
    assert_eq!(record["id"], "fixed-id");
    assert_eq!(record["service"], "example");
    assert_eq!(record["type"], "req");
}

#[tokio::test]
async fn json_body_is_captured_and_still_reaches_handler() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder().logger(logger(&sink)).build();

    let response = app(mw)
        .oneshot(
            Request::post("/")
                .header("content-type", "application/json")
                .body(Body::from(r#"["example","post","data"]"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["received"], json!(["example", "post", "data"]));

    let record = &sink.records()[0];
    assert_eq!(record["req"]["method"], "POST");
    assert_eq!(record["req"]["body"], json!(["example", "post", "data"]));
    assert_eq!(record["res"]["statusCode"], 201);
}

#[tokio::test]
async fn format_hook_sees_both_snapshots_and_error_annotation() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder()
        .logger(logger(&sink))
        .format(|record, req, res| {
            attach_response_error(record, req, res);
            record.insert("route".into(), json!(req.path()));
            record.insert("ok".into(), json!(res.status.is_success()));
        })
        .build();

    let response = app(mw)
        .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["code"], "ROUTE_NOT_FOUND");
    assert_eq!(body["status"], 404);

    let record = &sink.records()[0];
    assert_eq!(record["res"]["statusCode"], 404);
    assert_eq!(record["route"], "/missing");
    assert_eq!(record["ok"], false);
    assert_eq!(record["res"]["error"]["name"], "NotFoundError");
    assert_eq!(
        record["res"]["error"]["stack"],
        json!(["NotFoundError: Route not found: /missing"])
    );
}

#[tokio::test]
async fn custom_snapshots_replace_defaults() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder()
        .logger(logger(&sink))
        .req(|req| json!({"m": req.method.as_str()}))
        .res(|res| json!({"s": res.status.as_u16()}))
        .build();

    let response = app(mw)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    response.into_body().collect().await.unwrap();

    let record = &sink.records()[0];
    assert_eq!(record["req"], json!({"m": "GET"}));
    assert_eq!(record["res"], json!({"s": 200}));
}

#[tokio::test]
async fn concurrent_requests_each_write_once() {
    let sink = Arc::new(MemorySink::new());
    let mw = RequestMiddleware::builder()
        .logger(logger(&sink))
        .header(REQUEST_ID)
        .build();
    let router = app(mw);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            let response = router
                .oneshot(Request::get("/").body(Body::empty()).unwrap())
                .await
                .unwrap();
            response.into_body().collect().await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let records = sink.records();
    assert_eq!(records.len(), 8);
    let mut ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
}
