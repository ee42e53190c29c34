//! HTTP API tests against a live server on an ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use discovery_engine::db::Db;
use discovery_engine::source::ItemSummary;
use discovery_engine::{DiscoveryEngine, DiscoveryServer, StaticContentSource, TraversalSettings};
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestServer {
    _temp_dir: TempDir,
    base_url: String,
    client: reqwest::Client,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(node_delay: Duration) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = Db::new(temp_dir.path().join("api.db"));
        db.initialize().await.expect("Failed to initialize database");

        let source = StaticContentSource::new().with_item_search(
            "jazz",
            vec![
                ItemSummary { item_id: "j1".into(), title: "Modal jazz".into() },
                ItemSummary { item_id: "j2".into(), title: "Bebop history".into() },
            ],
        );
        let engine = DiscoveryEngine::new(db, Arc::new(source), TraversalSettings::default(), node_delay);
        let server = DiscoveryServer::new(engine, 10, vec![]);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            server
                .serve_with_shutdown(listener, async {
                    shutdown_rx.await.ok();
                })
                .await
        });

        Self {
            _temp_dir: temp_dir,
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn wait_terminal(&self, task_id: &str) -> Value {
        for _ in 0..500 {
            let task: Value = self
                .client
                .get(self.url(&format!("/discoveries/{}", task_id)))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if task["status"] != "running" {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {} never finished", task_id);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start(Duration::ZERO).await;
    let resp = server.client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_start_and_inspect_discovery() {
    let server = TestServer::start(Duration::ZERO).await;

    let resp = server
        .client
        .post(server.url("/discoveries"))
        .json(&json!({ "seed": "jazz", "seed_kind": "keyword" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 202);
    let body: Value = resp.json().await.unwrap();
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let task = server.wait_terminal(&task_id).await;
    assert_eq!(task["status"], "completed");
    assert_eq!(task["max_total_items"], 10);
    assert_eq!(task["mode"], "breadth_first");

    let nodes: Value = server
        .client
        .get(server.url(&format!("/discoveries/{}/nodes", task_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let nodes = nodes.as_array().unwrap();
    assert_eq!(nodes[0]["node_id"], "keyword_jazz");
    assert_eq!(nodes.len() as u64, task["processed_count"].as_u64().unwrap());

    let list: Value = server
        .client
        .get(server.url("/discoveries?limit=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_seed_kind_is_bad_request() {
    let server = TestServer::start(Duration::ZERO).await;

    let resp = server
        .client
        .post(server.url("/discoveries"))
        .json(&json!({ "seed": "x", "seed_kind": "playlist" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let list: Value = server
        .client
        .get(server.url("/discoveries"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_task_is_not_found() {
    let server = TestServer::start(Duration::ZERO).await;

    for (method, path) in [
        ("GET", "/discoveries/ghost"),
        ("GET", "/discoveries/ghost/nodes"),
        ("POST", "/discoveries/ghost/cancel"),
        ("POST", "/discoveries/ghost/resume"),
    ] {
        let request = match method {
            "GET" => server.client.get(server.url(path)),
            _ => server.client.post(server.url(path)),
        };
        let resp = request.send().await.unwrap();
        assert_eq!(resp.status(), 404, "{} {}", method, path);
    }
}

#[tokio::test]
async fn test_cancel_then_resume_conflicts() {
    let server = TestServer::start(Duration::from_millis(200)).await;

    let body: Value = server
        .client
        .post(server.url("/discoveries"))
        .json(&json!({ "seed": "jazz", "max_total_items": 50 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let task_id = body["task_id"].as_str().unwrap().to_string();

    let resp = server
        .client
        .post(server.url(&format!("/discoveries/{}/cancel", task_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["cancelled"], true);

    let task = server.wait_terminal(&task_id).await;
    assert_eq!(task["status"], "cancelled");

    let resp = server
        .client
        .post(server.url(&format!("/discoveries/{}/resume", task_id)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}
