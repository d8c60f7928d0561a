//! Pipeline tests driven straight through the gatekeeper, no socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use bytes::Bytes;
use leadgate_lib::admission::RespBody;
use leadgate_lib::{
    Config, Gatekeeper, InMemoryRateStore, ManualClock, MemoryStore, SubmissionStore,
};
use serde_json::{json, Value};

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

struct TestGate {
    gate: Gatekeeper,
    store: Arc<MemoryStore>,
    clock: ManualClock,
}

fn build_gate(toml_str: &str) -> TestGate {
    let config: Config = toml::from_str(toml_str).expect("test config parses");
    let store = Arc::new(MemoryStore::new());
    let clock = ManualClock::new();
    let gate = Gatekeeper::new(
        &config,
        store.clone(),
        Arc::new(InMemoryRateStore::new()),
        Arc::new(clock.clone()),
        None,
    )
    .expect("gate builds");
    TestGate { gate, store, clock }
}

fn default_gate() -> TestGate {
    build_gate(
        r#"
        listen = "127.0.0.1:0"

        [security]
        allowed_origins = ["https://konverts.example"]
        "#,
    )
}

fn peer() -> Option<SocketAddr> {
    Some("9.9.9.9:41000".parse().expect("socket addr"))
}

fn post(path: &str, body: &Value) -> Request<Full<Bytes>> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("request builds")
}

fn empty(method: &str, path: &str) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Full::new(Bytes::new()))
        .expect("request builds")
}

async fn body_json(resp: Response<RespBody>) -> TestResult<Value> {
    let bytes = resp.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&bytes)?)
}

fn header<'a>(resp: &'a Response<RespBody>, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn health_answers_ok() -> TestResult<()> {
    let t = default_gate();
    let resp = t.gate.handle(empty("GET", "/api/health"), peer()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    // health carries no rate rule, so no usage headers
    assert!(header(&resp, "x-ratelimit-limit").is_none());
    assert_eq!(body_json(resp).await?["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn unknown_path_settles_404_with_policy_headers() -> TestResult<()> {
    let t = default_gate();
    let resp = t.gate.handle(empty("GET", "/api/nope"), peer()).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(header(&resp, "x-frame-options"), Some("DENY"));
    assert_eq!(header(&resp, "x-content-type-options"), Some("nosniff"));
    assert_eq!(header(&resp, "content-security-policy"), Some("default-src 'self'"));
    Ok(())
}

#[tokio::test]
async fn wrong_method_settles_405() -> TestResult<()> {
    let t = default_gate();
    let resp = t.gate.handle(empty("GET", "/api/newsletter"), peer()).await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn allowed_origin_is_echoed_with_vary() -> TestResult<()> {
    let t = default_gate();
    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("origin", "https://konverts.example")
        .body(Full::new(Bytes::new()))?;
    let resp = t.gate.handle(req, peer()).await;

    assert_eq!(
        header(&resp, "access-control-allow-origin"),
        Some("https://konverts.example")
    );
    assert_eq!(header(&resp, "vary"), Some("Origin"));
    Ok(())
}

#[tokio::test]
async fn unlisted_origin_gets_no_allow_origin_but_is_served() -> TestResult<()> {
    let t = default_gate();
    let req = Request::builder()
        .method("GET")
        .uri("/api/health")
        .header("origin", "https://evil.example")
        .body(Full::new(Bytes::new()))?;
    let resp = t.gate.handle(req, peer()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header(&resp, "access-control-allow-origin").is_none());
    Ok(())
}

#[tokio::test]
async fn absent_origin_gets_wildcard() -> TestResult<()> {
    let t = default_gate();
    let resp = t.gate.handle(empty("GET", "/api/health"), peer()).await;
    assert_eq!(header(&resp, "access-control-allow-origin"), Some("*"));
    Ok(())
}

#[tokio::test]
async fn submission_acks_and_carries_usage_headers() -> TestResult<()> {
    let t = default_gate();
    let resp = t
        .gate
        .handle(post("/api/newsletter", &json!({ "email": "ada@example.com" })), peer())
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-ratelimit-limit"), Some("50"));
    assert_eq!(header(&resp, "x-ratelimit-remaining"), Some("49"));
    assert_eq!(header(&resp, "x-ratelimit-reset"), Some("900"));

    let body = body_json(resp).await?;
    assert_eq!(body["status"], "subscribed");

    let stored = t.store.list("newsletter_subscribers").await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].email, "ada@example.com");
    Ok(())
}

#[tokio::test]
async fn exhausted_window_answers_429_and_recovers() -> TestResult<()> {
    let t = build_gate(
        r#"
        listen = "127.0.0.1:0"

        [endpoints.contact]
        rate = { max_requests = 2, window_secs = 60 }
        "#,
    );
    let msg = json!({ "name": "Ada", "email": "ada@example.com", "message": "hi" });

    assert_eq!(t.gate.handle(post("/api/contact", &msg), peer()).await.status(), StatusCode::OK);
    assert_eq!(t.gate.handle(post("/api/contact", &msg), peer()).await.status(), StatusCode::OK);

    let refused = t.gate.handle(post("/api/contact", &msg), peer()).await;
    assert_eq!(refused.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&refused, "retry-after"), Some("60"));
    assert_eq!(header(&refused, "x-ratelimit-remaining"), Some("0"));
    let body = body_json(refused).await?;
    assert_eq!(body["retryAfter"], 60);

    // the oldest stamp leaves the window exactly at +60s
    t.clock.advance(Duration::from_secs(60));
    assert_eq!(t.gate.handle(post("/api/contact", &msg), peer()).await.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn a_burst_is_admitted_exactly_to_the_ceiling() -> TestResult<()> {
    let t = default_gate();
    let msg = json!({ "name": "Ada", "email": "ada@example.com", "message": "hi" });

    // default contact rule: 50 per 15 minutes
    for n in 1..=50 {
        let resp = t.gate.handle(post("/api/contact", &msg), peer()).await;
        assert_eq!(resp.status(), StatusCode::OK, "request {n}");
    }

    let refused = t.gate.handle(post("/api/contact", &msg), peer()).await;
    assert_eq!(refused.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&refused, "retry-after"), Some("900"));
    Ok(())
}

#[tokio::test]
async fn refused_requests_do_not_extend_the_window() -> TestResult<()> {
    let t = build_gate(
        r#"
        listen = "127.0.0.1:0"

        [endpoints.contact]
        rate = { max_requests = 1, window_secs = 60 }
        "#,
    );
    let msg = json!({ "name": "Ada", "email": "ada@example.com", "message": "hi" });

    assert_eq!(t.gate.handle(post("/api/contact", &msg), peer()).await.status(), StatusCode::OK);

    t.clock.advance(Duration::from_secs(10));
    for _ in 0..3 {
        let resp = t.gate.handle(post("/api/contact", &msg), peer()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    // only the admitted stamp counts; +50s clears it no matter how many refusals followed
    t.clock.advance(Duration::from_secs(50));
    assert_eq!(t.gate.handle(post("/api/contact", &msg), peer()).await.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn preflight_bypasses_an_exhausted_window() -> TestResult<()> {
    let t = build_gate(
        r#"
        listen = "127.0.0.1:0"

        [endpoints.newsletter]
        rate = { max_requests = 1, window_secs = 60 }
        "#,
    );
    let sub = json!({ "email": "ada@example.com" });

    assert_eq!(t.gate.handle(post("/api/newsletter", &sub), peer()).await.status(), StatusCode::OK);
    assert_eq!(
        t.gate.handle(post("/api/newsletter", &sub), peer()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let preflight = t.gate.handle(empty("OPTIONS", "/api/newsletter"), peer()).await;
    assert_eq!(preflight.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        header(&preflight, "access-control-allow-methods"),
        Some("GET, POST, OPTIONS, DELETE")
    );
    assert!(header(&preflight, "x-ratelimit-limit").is_none());
    Ok(())
}

#[tokio::test]
async fn forwarded_clients_get_separate_windows() -> TestResult<()> {
    let t = build_gate(
        r#"
        listen = "127.0.0.1:0"

        [endpoints.newsletter]
        rate = { max_requests = 1, window_secs = 60 }
        "#,
    );

    let subscribe = |ip: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/newsletter")
            .header("x-forwarded-for", format!("{ip}, 10.0.0.1"))
            .body(Full::new(Bytes::from(
                json!({ "email": "ada@example.com" }).to_string(),
            )))
            .expect("request builds")
    };

    assert_eq!(t.gate.handle(subscribe("1.1.1.1"), peer()).await.status(), StatusCode::OK);
    // different leftmost hop, same peer socket: fresh window
    assert_eq!(t.gate.handle(subscribe("2.2.2.2"), peer()).await.status(), StatusCode::OK);
    assert_eq!(
        t.gate.handle(subscribe("1.1.1.1"), peer()).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    Ok(())
}

#[tokio::test]
async fn declared_oversize_is_refused_before_the_store() -> TestResult<()> {
    let t = default_gate();
    let req = Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header("content-length", "20000")
        .body(Full::new(Bytes::from_static(b"{}")))?;
    let resp = t.gate.handle(req, peer()).await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(header(&resp, "x-ratelimit-limit"), Some("50"));
    let body = body_json(resp).await?;
    assert_eq!(body["maxSize"], 10 * 1024);

    assert!(t.store.list("contact_messages").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn oversized_body_without_length_hits_the_streaming_cap() -> TestResult<()> {
    let t = default_gate();
    let huge = json!({
        "name": "Ada",
        "email": "ada@example.com",
        "message": "x".repeat(20_000),
    });
    let resp = t.gate.handle(post("/api/contact", &huge), peer()).await;

    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(t.store.list("contact_messages").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_json_settles_400() -> TestResult<()> {
    let t = default_gate();
    let req = Request::builder()
        .method("POST")
        .uri("/api/newsletter")
        .body(Full::new(Bytes::from_static(b"email=ada")))?;
    let resp = t.gate.handle(req, peer()).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await?["error"], "Request body must be valid JSON");
    Ok(())
}

#[tokio::test]
async fn missing_fields_settle_400_listing_them() -> TestResult<()> {
    let t = default_gate();
    let resp = t
        .gate
        .handle(post("/api/consultation", &json!({ "email": "ada@example.com" })), peer())
        .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await?;
    assert_eq!(body["required"], json!(["name", "email", "preferredDate"]));
    Ok(())
}

#[tokio::test]
async fn markup_is_stripped_before_persisting() -> TestResult<()> {
    let t = default_gate();
    let resp = t
        .gate
        .handle(
            post(
                "/api/contact",
                &json!({
                    "name": "Ada",
                    "email": "  ADA@Example.com ",
                    "message": "<script>alert(1)</script>hello there",
                }),
            ),
            peer(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = t.store.list("contact_messages").await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].fields["message"], "hello there");
    // dedup key normalization also applies to the persisted email column
    assert_eq!(stored[0].email, "ada@example.com");
    Ok(())
}

#[tokio::test]
async fn a_payload_that_is_only_markup_fails_validation() -> TestResult<()> {
    let t = default_gate();
    let resp = t
        .gate
        .handle(
            post(
                "/api/contact",
                &json!({
                    "name": "Ada",
                    "email": "ada@example.com",
                    "message": "<script>alert(1)</script>",
                }),
            ),
            peer(),
        )
        .await;

    // the sanitizer reduced message to the empty string
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(t.store.list("contact_messages").await?.is_empty());
    Ok(())
}
