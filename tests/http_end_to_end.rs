//! HTTP requests through real workers and a coordinator backed by SQLite.

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use discard::config::AppConfig;
use discard::coordinator::Coordinator;
use discard::net::bind_shared;

mod common;
use common::{sqlite_executor, wait_for_addr, worker_config, InProcessLauncher, WAIT};

struct Cluster {
    base: String,
    client: Client,
    shutdown: tokio::sync::oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Cluster {
    async fn start(workers: usize) -> Self {
        let (launcher, addr) = InProcessLauncher::new();
        let coordinator = Coordinator::new(Arc::new(launcher), sqlite_executor().await, worker_config(workers));

        let (shutdown, stop) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            coordinator
                .run(async move {
                    let _ = stop.await;
                })
                .await
                .unwrap();
        });

        let addr: SocketAddr = wait_for_addr(&addr).await;
        Self {
            base: format!("http://{addr}"),
            client: Client::builder().no_proxy().timeout(WAIT).build().unwrap(),
            shutdown,
            task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap();
    }
}

#[tokio::test]
async fn index_returns_banner() {
    let cluster = Cluster::start(2).await;

    let response = cluster.client.get(cluster.url("/")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "DiscardApp");

    cluster.stop().await;
}

#[tokio::test]
async fn users_can_be_created_and_fetched() {
    let cluster = Cluster::start(2).await;
    let client = &cluster.client;

    let created = client
        .post(cluster.url("/users"))
        .json(&json!({ "username": "ferris" }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let user: Value = created.json().await.unwrap();
    assert_eq!(user["username"], "ferris");
    let id = user["id"].as_i64().unwrap();

    let duplicate = client
        .post(cluster.url("/users"))
        .json(&json!({ "username": "ferris" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    assert_eq!(duplicate.text().await.unwrap(), "Username already taken");

    let empty = client
        .post(cluster.url("/users"))
        .json(&json!({ "username": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    // Any worker can serve the read; they share one database.
    for _ in 0..4 {
        let shown = client.get(cluster.url(&format!("/users/{id}"))).send().await.unwrap();
        assert_eq!(shown.status(), StatusCode::OK);
        assert_eq!(shown.json::<Value>().await.unwrap(), json!({ "id": id, "username": "ferris" }));
    }

    let listed: Value = client
        .get(cluster.url("/users"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, json!([{ "id": id, "username": "ferris" }]));

    let missing = client.get(cluster.url("/users/999")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.text().await.unwrap(), "User not found");

    cluster.stop().await;
}

#[tokio::test]
async fn guilds_start_empty() {
    let cluster = Cluster::start(1).await;

    let response = cluster.client.get(cluster.url("/guilds")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.json::<Value>().await.unwrap(), json!([]));

    let missing = cluster.client.get(cluster.url("/guilds/1")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    cluster.stop().await;
}

#[tokio::test]
async fn method_and_route_errors() {
    let cluster = Cluster::start(1).await;
    let client = &cluster.client;

    let options = client
        .request(reqwest::Method::OPTIONS, cluster.url("/users"))
        .send()
        .await
        .unwrap();
    assert_eq!(options.status(), StatusCode::OK);
    assert_eq!(options.headers()["allow"], "OPTIONS, GET, POST");
    assert_eq!(options.headers()["access-control-allow-origin"], "*");

    let delete = client.delete(cluster.url("/users/1")).send().await.unwrap();
    assert_eq!(delete.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(delete.headers()["allow"], "OPTIONS, GET, POST");

    let unknown = client.get(cluster.url("/nope")).send().await.unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let malformed = client
        .post(cluster.url("/users"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    cluster.stop().await;
}

#[tokio::test]
async fn worker_stops_when_coordinator_link_closes() {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    let listener = bind_shared(&config.listener).unwrap();

    let (coordinator_end, worker_end) = tokio::io::duplex(1024);
    let (worker_read, worker_write) = tokio::io::split(worker_end);

    let worker = tokio::spawn(async move {
        discard::worker::serve(
            &config,
            0,
            listener,
            worker_read,
            worker_write,
            std::future::pending::<()>(),
        )
        .await
    });

    drop(coordinator_end);

    let result = tokio::time::timeout(WAIT, worker)
        .await
        .expect("worker kept running after the coordinator went away")
        .unwrap();
    assert!(result.is_ok());
}
