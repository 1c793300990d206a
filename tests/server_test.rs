mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use clarity_topics::server::{self, HealthResponse, PredictResponse};
use clarity_topics::{
    ArtifactPaths, ClassifierError, Embedder, EmbeddingIdentity, HashingEmbedder, ServiceState, TopicPredictor,
    TrainConfig, Trainer,
};
use ndarray::Array1;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start(state: ServiceState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server::serve_on(listener, state, async {
            let _ = rx.await;
        }));
        Self { addr, shutdown: Some(tx), handle }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), self.handle).await;
        assert!(result.is_ok(), "server should stop after the shutdown signal");
    }
}

fn loaded_state() -> (ServiceState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let paths = ArtifactPaths::new(dir.path());
    Trainer::new(common::embedder(), TrainConfig::default().with_test_size(0.0))
        .run(&common::counseling_corpus(), &paths)
        .unwrap();
    let predictor = TopicPredictor::from_artifacts(common::embedder(), &paths).unwrap();
    (ServiceState::loaded(Arc::new(predictor)), dir)
}

/// Fails on any text containing "overload", like an encoder session that errors mid-request.
#[derive(Debug)]
struct FlakyEmbedder(HashingEmbedder);

impl Embedder for FlakyEmbedder {
    fn identity(&self) -> EmbeddingIdentity {
        self.0.identity()
    }

    fn embed(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        if text.contains("overload") {
            return Err(ClassifierError::ModelError("session run failed".into()));
        }
        self.0.embed(text)
    }
}

#[tokio::test]
async fn test_predict_topics() {
    common::init();
    let (state, _dir) = loaded_state();
    let server = TestServer::start(state).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/predict-topics"))
        .json(&json!({"text": "I am worried about my job interview", "top_k": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: PredictResponse = response.json().await.unwrap();
    assert_eq!(body.predictions.len(), 2);
    assert_eq!(body.predictions[0].topic, "anxiety");
    assert!(body.predictions[0].confidence >= body.predictions[1].confidence);

    // Default top_k is 5, capped by the three known topics
    let response = client
        .post(server.url("/api/predict-topics"))
        .json(&json!({"text": "I can't sleep"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: PredictResponse = response.json().await.unwrap();
    assert_eq!(body.predictions.len(), 3);

    server.stop().await;
}

#[tokio::test]
async fn test_bad_requests() {
    common::init();
    let (state, _dir) = loaded_state();
    let server = TestServer::start(state).await;
    let client = reqwest::Client::new();

    for body in [json!({}), json!({"text": ""}), json!({"text": "   "}), json!({"text": null})] {
        let response = client.post(server.url("/predict-topics")).json(&body).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
        let error: Value = response.json().await.unwrap();
        assert!(error["error"].is_string());
    }

    let response = client
        .post(server.url("/predict-topics"))
        .json(&json!({"text": "hello", "top_k": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(server.url("/predict-topics"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    server.stop().await;
}

#[tokio::test]
async fn test_unloaded_service() {
    common::init();
    let server = TestServer::start(ServiceState::unloaded()).await;
    let client = reqwest::Client::new();

    let health: HealthResponse = client.get(server.url("/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health.status, "healthy");
    assert!(!health.models_loaded);

    let response = client
        .post(server.url("/api/predict-topics"))
        .json(&json!({"text": "I feel anxious"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"], "Models not loaded");

    server.stop().await;
}

#[tokio::test]
async fn test_health_after_load() {
    common::init();
    let (state, _dir) = loaded_state();
    let server = TestServer::start(state).await;

    let response = reqwest::get(server.url("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health: HealthResponse = response.json().await.unwrap();
    assert!(health.models_loaded);

    server.stop().await;
}

#[tokio::test]
async fn test_model_failure_is_internal_error() {
    common::init();
    let trained = Trainer::new(common::embedder(), TrainConfig::default().with_test_size(0.0))
        .fit(&common::counseling_corpus())
        .unwrap();
    let embedder = Arc::new(FlakyEmbedder(HashingEmbedder::new(256).unwrap()));
    let predictor = TopicPredictor::new(embedder, trained.model, trained.encoder).unwrap();
    let server = TestServer::start(ServiceState::loaded(Arc::new(predictor))).await;
    let client = reqwest::Client::new();

    let response = client
        .post(server.url("/predict-topics"))
        .json(&json!({"text": "work overload is making me anxious"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["error"], "Model error: session run failed");

    // The failure is per request; the service keeps answering
    let response = client
        .post(server.url("/predict-topics"))
        .json(&json!({"text": "I am worried about my job interview", "top_k": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: PredictResponse = response.json().await.unwrap();
    assert_eq!(body.predictions[0].topic, "anxiety");

    let health: HealthResponse = client.get(server.url("/health")).send().await.unwrap().json().await.unwrap();
    assert!(health.models_loaded);

    server.stop().await;
}
