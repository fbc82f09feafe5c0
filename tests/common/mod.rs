#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-process stand-in for the upstream alert feed
#[derive(Debug, Default)]
pub struct FakeFeed {
    pub generation: String,
    pub messages: Vec<Value>,
    pub fail_with: Option<StatusCode>,
    pub malformed: bool,
    pub delay: Option<Duration>,
    /// (generationID, fromIndex, Authorization header) per request
    pub requests: Vec<(String, u64, Option<String>)>,
}

pub type SharedFeed = Arc<Mutex<FakeFeed>>;

impl FakeFeed {
    pub fn shared(generation: &str, messages: Vec<Value>) -> SharedFeed {
        Arc::new(Mutex::new(FakeFeed {
            generation: generation.to_string(),
            messages,
            ..Default::default()
        }))
    }
}

pub fn alert(name: &str, ignore: Option<&str>) -> Value {
    let mut annotations = json!({"message": name, "miqTarget": "ContainerNode"});
    if let Some(ignore) = ignore {
        annotations["miqIgnore"] = json!(ignore);
    }
    json!({
        "annotations": annotations,
        "labels": {"alertname": name},
        "startsAt": "2017-10-17T08:29:00Z",
        "endsAt": "0001-01-01T00:00:00Z",
        "status": "firing",
        "generatorURL": "http://prometheus.example.com/graph"
    })
}

pub fn message(index: u64, alerts: Vec<Value>) -> Value {
    json!({
        "index": index,
        "timestamp": "2017-10-17T08:30:00.466775417Z",
        "data": {"alerts": alerts}
    })
}

async fn serve_alerts(
    State(feed): State<SharedFeed>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let generation = params.get("generationID").cloned().unwrap_or_default();
    let from_index = params
        .get("fromIndex")
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let delay = {
        let mut feed = feed.lock().unwrap();
        feed.requests.push((generation.clone(), from_index, auth));
        feed.delay
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let feed = feed.lock().unwrap();
    if let Some(status) = feed.fail_with {
        return (status, "feed unavailable").into_response();
    }
    if feed.malformed {
        return (StatusCode::OK, "{\"generationID\": ").into_response();
    }

    let messages: Vec<Value> = feed
        .messages
        .iter()
        .filter(|m| generation != feed.generation || m["index"].as_u64().unwrap_or(0) >= from_index)
        .cloned()
        .collect();

    Json(json!({"generationID": feed.generation, "messages": messages})).into_response()
}

/// Serve the feed on an ephemeral local port; returns the alerts URL
pub async fn spawn_feed(feed: SharedFeed) -> String {
    let app = Router::new()
        .route("/topics/alerts", get(serve_alerts))
        .with_state(feed);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/topics/alerts", addr)
}

pub fn request_count(feed: &SharedFeed) -> usize {
    feed.lock().unwrap().requests.len()
}

/// Wait until the feed has seen at least `count` requests
pub async fn wait_for_requests(feed: &SharedFeed, count: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while request_count(feed) < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("feed did not receive enough requests");
}
