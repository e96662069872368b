use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use engine::{
    FailureKind, GenerationResult, HttpGateway, Model, ResilientInvoker, RetryPolicy,
    gateway::{Credential, Gateway, GatewayConfig},
    invoker::CallOptions,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const SECRET: &str = "sk-e2e-secret";

/// Scripted stand-in for the upstream image API.
#[derive(Default)]
struct Upstream {
    replies: Mutex<VecDeque<(StatusCode, Value)>>,
    calls: AtomicU32,
    bodies: Mutex<Vec<Value>>,
}

async fn upstream_handler(
    State(upstream): State<Arc<Upstream>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    upstream.calls.fetch_add(1, Ordering::SeqCst);
    upstream.bodies.lock().unwrap().push(body);

    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {SECRET}"));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "missing key").into_response();
    }

    let (status, body) = {
        let mut replies = upstream.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            replies.front().cloned().unwrap()
        }
    };
    (status, body.to_string()).into_response()
}

struct Harness {
    upstream: Arc<Upstream>,
    invoker: ResilientInvoker<HttpGateway>,
}

impl Harness {
    async fn start(replies: impl IntoIterator<Item = (StatusCode, Value)>) -> Self {
        let upstream = Arc::new(Upstream {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Default::default()
        });
        let upstream_app = Router::new()
            .route("/v1/images/generations", post(upstream_handler))
            .with_state(upstream.clone());
        let upstream_addr = spawn(upstream_app).await;

        let mut cfg = GatewayConfig::new(Credential::new(SECRET));
        cfg.upstream_url = format!("http://{upstream_addr}/v1/images/generations");
        let gateway_addr = spawn(Gateway::new(cfg).router()).await;

        let policy = RetryPolicy {
            base_delay: Duration::from_millis(10),
            max_jitter: Duration::from_millis(5),
            ..RetryPolicy::default().with_attempt_timeout(Duration::from_secs(5))
        };
        let invoker = ResilientInvoker::new(
            HttpGateway::new(&format!("http://{gateway_addr}")),
            policy,
        );

        Self { upstream, invoker }
    }

    fn calls(&self) -> u32 {
        self.upstream.calls.load(Ordering::SeqCst)
    }
}

async fn spawn(app: Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    addr
}

fn image(url: &str) -> (StatusCode, Value) {
    (StatusCode::OK, json!({"data": [{"url": url}]}))
}

#[tokio::test]
async fn scenario_a_first_try_success() {
    let h = Harness::start([image("http://x/img.png")]).await;
    let result = h.invoker.generate("a red fox", Model::Img3).await;

    assert_eq!(
        result,
        GenerationResult::Success {
            url: "http://x/img.png".into()
        }
    );
    assert_eq!(h.calls(), 1);
    assert_eq!(
        h.upstream.bodies.lock().unwrap()[0],
        json!({"model": "img3", "prompt": "a red fox", "n": 1, "size": "1024x1024"})
    );
}

#[tokio::test]
async fn scenario_b_recovers_on_third_attempt() {
    let busy = (StatusCode::SERVICE_UNAVAILABLE, json!({"message": "busy"}));
    let h = Harness::start([busy.clone(), busy, image("http://x/img.png")]).await;

    let report = h
        .invoker
        .generate_traced(
            "a red fox",
            Model::Img3,
            CallOptions::default(),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.result.url(), Some("http://x/img.png"));
    assert_eq!(h.calls(), 3);
    let slept: Vec<_> = report.attempts.iter().filter_map(|a| a.backoff).collect();
    assert_eq!(slept.len(), 2);
    assert!(slept[0] >= Duration::from_millis(20) && slept[0] <= Duration::from_millis(25));
    assert!(slept[1] >= Duration::from_millis(40) && slept[1] <= Duration::from_millis(45));
}

#[tokio::test]
async fn scenario_c_rate_limited_every_time() {
    let limited = (
        StatusCode::TOO_MANY_REQUESTS,
        json!({"error": format!("quota exceeded for {SECRET}")}),
    );
    let h = Harness::start([limited]).await;
    let result = h.invoker.generate("a red fox", Model::Img4).await;

    assert_eq!(h.calls(), 3);
    let GenerationResult::Failure { kind, message } = result else {
        panic!("expected failure");
    };
    assert_eq!(kind, FailureKind::UpstreamHttp);
    assert!(message.contains("429"), "{message}");
    assert!(message.contains("quota exceeded"), "{message}");
    assert!(!message.contains(SECRET), "{message}");
}

#[tokio::test]
async fn scenario_d_blank_prompt_never_reaches_upstream() {
    let h = Harness::start([image("http://x/img.png")]).await;
    let result = h.invoker.generate("   ", Model::Img3).await;

    assert!(matches!(
        result,
        GenerationResult::Failure {
            kind: FailureKind::Validation,
            ..
        }
    ));
    assert_eq!(h.calls(), 0);
}

#[tokio::test]
async fn scenario_e_missing_url_retried_then_fails() {
    let h = Harness::start([(StatusCode::OK, json!({"data": []}))]).await;
    let result = h.invoker.generate("a red fox", Model::Uncen).await;

    assert_eq!(h.calls(), 3);
    let GenerationResult::Failure { kind, message } = result else {
        panic!("expected failure");
    };
    assert_eq!(kind, FailureKind::UpstreamShape);
    assert!(message.contains("3 attempt"), "{message}");
    assert!(message.contains("No image URL returned."), "{message}");
}
