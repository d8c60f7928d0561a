//! The admission pipeline.
//!
//! One struct owns every check a request passes before a business handler
//! runs: route match, admin visibility, rate window, body cap, JSON shape,
//! sanitization, duplicate guard. Stages settle in a fixed order and each
//! refusal short-circuits the rest; the security header set is applied to
//! every response on the way out, refusals included.

use std::net::SocketAddr;
use std::sync::Arc;

use http::header::{CONTENT_LENGTH, ORIGIN};
use http::{Request, Response, StatusCode};
use hyper::body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;
use tracing::{debug, warn};

use super::auth::bearer_token_valid;
use super::client_id::client_identity;
use super::handlers;
use super::rejection::{apply_rate_headers, empty_response, json_response, Rejection, RespBody};
use super::router::{resolve, Endpoint, Resolution};
use crate::clock::Clock;
use crate::config::{Config, DedupRule, EndpointsConfig, FailurePolicy};
use crate::dedup::{DedupVerdict, DuplicateGuard};
use crate::security::rate_limit::{RateDecision, RateWindowStore, SlidingWindowLimiter};
use crate::security::{SecurityPolicy, Sanitizer};
use crate::store::SubmissionStore;
use crate::telemetry::Metrics;

/// Everything a request passes through between the socket and a handler.
pub struct Gatekeeper {
    policy: SecurityPolicy,
    limiter: SlidingWindowLimiter,
    sanitizer: Sanitizer,
    guard: DuplicateGuard,
    store: Arc<dyn SubmissionStore>,
    endpoints: EndpointsConfig,
    admin_token: Option<String>,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
}

impl Gatekeeper {
    pub fn new(
        config: &Config,
        store: Arc<dyn SubmissionStore>,
        rate_store: Arc<dyn RateWindowStore>,
        clock: Arc<dyn Clock>,
        metrics: Option<Arc<Metrics>>,
    ) -> crate::error::Result<Self> {
        let policy = SecurityPolicy::from_config(&config.security)?;
        let sanitizer = Sanitizer::new(&config.sanitize);
        let limiter = SlidingWindowLimiter::new(rate_store, clock.clone());
        let guard = DuplicateGuard::new(store.clone());

        Ok(Self {
            policy,
            limiter,
            sanitizer,
            guard,
            store,
            endpoints: config.endpoints.clone(),
            admin_token: config.admin.token.clone(),
            clock,
            metrics,
        })
    }

    /// Settle one request into a response.
    ///
    /// Never returns an error: every failure mode inside the pipeline maps
    /// to a [`Rejection`] and settles as its response. The connection layer
    /// above only ever sees a well-formed answer.
    pub async fn handle<B>(&self, req: Request<B>, peer: Option<SocketAddr>) -> Response<RespBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let started = self.clock.now();
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let origin = req
            .headers()
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let client = client_identity(req.headers(), peer);

        let (scope, mut response) = match resolve(&method, &path) {
            Resolution::Found(endpoint) => {
                (endpoint.scope(), self.admit(endpoint, req, &client).await)
            }
            Resolution::Preflight => ("preflight", empty_response(StatusCode::NO_CONTENT)),
            Resolution::MethodNotAllowed => {
                let rejection = Rejection::MethodNotAllowed;
                self.record_rejection("unmatched", &rejection);
                ("unmatched", rejection.into_response())
            }
            Resolution::NotFound => {
                debug!(%path, "no route matched");
                ("unmatched", handlers::not_found())
            }
        };

        self.policy.apply(&mut response, origin.as_deref());

        let status = response.status().as_u16();
        let elapsed = self.clock.now().saturating_duration_since(started);
        if let Some(metrics) = &self.metrics {
            metrics.record_request(method.as_str(), status, scope);
            metrics.record_request_duration(elapsed.as_secs_f64(), method.as_str(), status, scope);
        }
        debug!(method = %method, %path, client = %client, status, "request settled");

        response
    }

    /// Run the per-endpoint stages for a matched route.
    async fn admit<B>(&self, endpoint: Endpoint, req: Request<B>, client: &str) -> Response<RespBody>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        // With no token configured the admin surface does not exist; a 404
        // here is indistinguishable from an unknown path.
        if endpoint.is_admin() && self.admin_token.is_none() {
            return handlers::not_found();
        }

        let decision = match self.check_rate(endpoint, client) {
            Ok(decision) => decision,
            Err(rejection) => {
                self.record_rejection(endpoint.scope(), &rejection);
                return rejection.into_response();
            }
        };

        let mut response = match self.dispatch(endpoint, req).await {
            Ok(response) => response,
            Err(rejection) => {
                self.record_rejection(endpoint.scope(), &rejection);
                rejection.into_response()
            }
        };

        // Usage headers ride on every post-admission answer, rejections
        // included, so clients can pace themselves before hitting 429.
        if let Some(decision) = decision {
            apply_rate_headers(
                response.headers_mut(),
                decision.limit(),
                decision.remaining(),
                decision.reset_after(),
            );
        }

        response
    }

    /// Rate stage. `None` means the endpoint carries no rate rule (health).
    fn check_rate(
        &self,
        endpoint: Endpoint,
        client: &str,
    ) -> Result<Option<RateDecision>, Rejection> {
        let Some(rule) = endpoint.config(&self.endpoints).map(|ep| ep.rate) else {
            return Ok(None);
        };

        match self.limiter.admit(endpoint.scope(), client, rule) {
            decision @ RateDecision::Admitted { .. } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rate_limit_allowed(endpoint.scope());
                }
                Ok(Some(decision))
            }
            RateDecision::Limited { limit, retry_after, reset_after } => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_rate_limit_rejected(endpoint.scope());
                }
                warn!(scope = endpoint.scope(), client = %client, "rate limit exceeded");
                Err(Rejection::RateLimited { limit, retry_after, reset_after })
            }
        }
    }

    async fn dispatch<B>(
        &self,
        endpoint: Endpoint,
        req: Request<B>,
    ) -> Result<Response<RespBody>, Rejection>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match endpoint {
            Endpoint::Health => Ok(handlers::health()),
            Endpoint::AdminList => {
                self.require_admin(req.headers())?;
                let query = req.uri().query().unwrap_or("").to_string();
                handlers::admin_list(self.store.as_ref(), &query).await
            }
            Endpoint::AdminDelete => {
                self.require_admin(req.headers())?;
                let query = req.uri().query().unwrap_or("").to_string();
                handlers::admin_delete(self.store.as_ref(), &query).await
            }
            _ => self.accept_submission(endpoint, req).await,
        }
    }

    /// Body stages for write endpoints: cap, parse, sanitize, dedup, persist.
    async fn accept_submission<B>(
        &self,
        endpoint: Endpoint,
        req: Request<B>,
    ) -> Result<Response<RespBody>, Rejection>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let limits = endpoint.config(&self.endpoints).ok_or(Rejection::Internal)?;
        let max_bytes = limits.max_body_bytes;
        let dedup = limits.dedup;

        let payload = read_payload(req, max_bytes).await?;
        let payload = self.sanitizer.clean(payload);

        if let (Some(rule), Some(collection)) = (dedup, endpoint.collection()) {
            if let Some(settled) = self.check_duplicate(endpoint, collection, rule, &payload).await?
            {
                return Ok(settled);
            }
        }

        let response =
            handlers::submit(endpoint, self.store.as_ref(), self.clock.unix_millis(), payload)
                .await?;

        if let Some(metrics) = &self.metrics {
            if let Some(collection) = endpoint.collection() {
                metrics.record_submission(collection);
            }
        }
        Ok(response)
    }

    /// Dedup stage. `Some(response)` settles the request without inserting.
    ///
    /// The key is the sanitized payload's email; submissions without one pass
    /// through, field validation downstream owns that refusal. A store
    /// failure degrades per the endpoint's configured policy.
    async fn check_duplicate(
        &self,
        endpoint: Endpoint,
        collection: &'static str,
        rule: DedupRule,
        payload: &Value,
    ) -> Result<Option<Response<RespBody>>, Rejection> {
        let key = payload.get("email").and_then(Value::as_str).unwrap_or("");
        let checked = self
            .guard
            .check(collection, key, rule.into(), self.clock.unix_millis())
            .await;

        match checked {
            Ok(DedupVerdict::Fresh) => Ok(None),
            Ok(DedupVerdict::Duplicate) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_dedup_hit(endpoint.scope());
                }
                match rule {
                    DedupRule::Permanent { .. } => Ok(Some(already_on_file(endpoint))),
                    DedupRule::Windowed { .. } => Err(Rejection::DuplicateSubmission),
                }
            }
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_dedup_failure(endpoint.scope());
                }
                match rule.failure_policy() {
                    FailurePolicy::Open => {
                        warn!(scope = endpoint.scope(), error = %err, "duplicate check failed, admitting");
                        Ok(None)
                    }
                    FailurePolicy::Closed => {
                        warn!(scope = endpoint.scope(), error = %err, "duplicate check failed, refusing");
                        Err(Rejection::StoreUnavailable)
                    }
                }
            }
        }
    }

    fn require_admin(&self, headers: &http::HeaderMap) -> Result<(), Rejection> {
        match self.admin_token.as_deref() {
            Some(token) if bearer_token_valid(headers, token) => Ok(()),
            _ => Err(Rejection::Unauthorized),
        }
    }

    fn record_rejection(&self, scope: &str, rejection: &Rejection) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(scope, rejection.reason());
        }
    }
}

/// Idempotent answer for a permanent-dedup hit. Success-shaped: the caller
/// already achieved the state they asked for.
fn already_on_file(endpoint: Endpoint) -> Response<RespBody> {
    let body = match endpoint {
        Endpoint::Newsletter => serde_json::json!({
            "message": "Already subscribed",
            "status": "already_subscribed",
        }),
        _ => serde_json::json!({
            "message": "Submission already recorded",
            "status": "duplicate",
        }),
    };
    json_response(StatusCode::OK, &body)
}

/// Read the request body under the endpoint's byte cap and parse it as JSON.
///
/// A `Content-Length` above the cap refuses before reading; bodies without
/// the header (or lying about it) hit the streaming cap instead, so chunked
/// uploads cannot sidestep the limit.
async fn read_payload<B>(req: Request<B>, max_bytes: usize) -> Result<Value, Rejection>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    if let Some(declared) = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if declared > max_bytes {
            return Err(Rejection::PayloadTooLarge { max_bytes });
        }
    }

    let collected = match Limited::new(req.into_body(), max_bytes).collect().await {
        Ok(collected) => collected,
        Err(err) => {
            if err.downcast_ref::<LengthLimitError>().is_some() {
                return Err(Rejection::PayloadTooLarge { max_bytes });
            }
            debug!(error = %err, "failed to read request body");
            return Err(Rejection::Internal);
        }
    };

    serde_json::from_slice(&collected.to_bytes()).map_err(|_| Rejection::InvalidBody)
}
