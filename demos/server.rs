use std::collections::BTreeMap;

use axum::http::{HeaderName, StatusCode, Uri};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use rand::RngCore;
use serde_json::{json, Value};

use reqlog::middleware::{attach_response_error, log_requests, RequestMiddleware};
use reqlog::{ErrorValue, Logger, LoggerConfig};

fn sort_keys(value: &mut Value) {
    if let Value::Object(map) = value {
        let sorted: BTreeMap<String, Value> = std::mem::take(map).into_iter().collect();
        map.extend(sorted);
    }
}

async fn route_not_found(uri: Uri) -> ErrorValue {
    ErrorValue::from(format!("Route not found: {}", uri))
        .with_trace(Vec::<String>::new())
        .with_code("ROUTE_NOT_FOUND")
        .with_name("NotFoundError")
        .with_status(404)
}

#[tokio::main]
async fn main() {
    let logger = Logger::new(LoggerConfig::from_env());

    logger.debug("This is a lovely debug message!");
    logger.info(("Some information for you", json!({"this": "that"})));
    logger.warn("Important warning for you");
    logger.error(ErrorValue::from("Oh man, this errored").with_trace(Vec::<String>::new()));

    let mw = RequestMiddleware::builder()
        .logger(logger.clone())
        .header(HeaderName::from_static("x-request-id"))
        .format(|record, req, res| {
            if let Some(Value::Object(r)) = record.get_mut("req") {
                if let Some(headers) = r.get_mut("headers") {
                    sort_keys(headers);
                }
            }
            if let Some(Value::Object(r)) = record.get_mut("res") {
                if let Some(headers) = r.get_mut("headers") {
                    sort_keys(headers);
                }
            }
            attach_response_error(record, req, res);
        })
        .build();

    let app = Router::new()
        .route(
            "/",
            get(|| async { Json("Hello world!") }).post(|| async {
                let mut id = [0u8; 12];
                rand::thread_rng().fill_bytes(&mut id);
                (
                    StatusCode::CREATED,
                    Json(json!({"entry_id": hex::encode(id), "success": true})),
                )
            }),
        )
        .fallback(route_not_found)
        .layer(from_fn_with_state(mw, log_requests));

    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) => {
            logger.error(("Could not bind example server", ErrorValue::new(&e)));
            return;
        }
    };
    let base_url = match listener.local_addr() {
        Ok(addr) => format!("http://{}", addr),
        Err(e) => {
            logger.error(ErrorValue::new(&e));
            return;
        }
    };
    reqlog::info!(logger, "Example server started at", base_url.as_str());

    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let client = reqwest::Client::new();
    let requests = vec![
        client
            .get(format!("{}/", base_url))
            .query(&[("id", "12"), ("fields", "id"), ("fields", "title"), ("fields", "content")]),
        client.get(format!("{}/foobar", base_url)),
        client
            .post(format!("{}/", base_url))
            .json(&json!(["example", "post", "data"])),
    ];
    for request in requests {
        match request.send().await {
            Ok(response) => {
                let _ = response.bytes().await;
            }
            Err(e) => logger.error(ErrorValue::new(&e)),
        }
    }

    // Records are written when bodies finish; give the server a moment.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    server.abort();
    logger.flush();
}
