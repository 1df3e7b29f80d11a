//! End-to-end gate tests.
//!
//! Each test runs a fake upstream through [`TranspileGate::handle`] and
//! inspects what reached the real writer.

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG};
use http::{HeaderValue, Request as HttpRequest, StatusCode};
use http_body_util::{BodyExt, Full};
use kindle_config::GateConfig;
use kindle_core::{
    GateError, Report, TranspileError, TranspileOptions, TranspileResult, Transpiled,
    UpstreamError, IGNITION_MEDIA_TYPE,
};
use kindle_middleware::context::MiddlewareContext;
use kindle_middleware::stages::{RequestIdMiddleware, TranspileMiddleware};
use kindle_middleware::{
    BoxFuture, Outcome, Pipeline, Request, ResponseRecorder, ResponseWriter, TranspileGate,
    Upstream,
};
use kindle_transpiler::ContainerLinuxTranspiler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const CORE_USER_YAML: &str = "passwd:
  users:
    - name: core
      ssh_authorized_keys:
        - ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIIVloJO7jus6ib2Vl4diiTOGBE9gYoVyvXC9UopvSMKt
";

const CORE_USER_JSON: &str = r#"{"ignition":{"config":{},"security":{"tls":{}},"timeouts":{},"version":"2.3.0"},"networkd":{},"passwd":{"users":[{"name":"core","sshAuthorizedKeys":["ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIIVloJO7jus6ib2Vl4diiTOGBE9gYoVyvXC9UopvSMKt"]}]},"storage":{},"systemd":{}}"#;

/// Serves a fixed response and counts invocations.
struct FixedUpstream {
    status: StatusCode,
    content_type: Option<&'static str>,
    body: &'static [u8],
    failure: Option<StatusCode>,
    calls: AtomicUsize,
}

impl FixedUpstream {
    fn new(content_type: Option<&'static str>, body: &'static [u8]) -> Self {
        Self {
            status: StatusCode::OK,
            content_type,
            body,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn yaml(body: &'static [u8]) -> Self {
        Self::new(Some("application/x-yaml"), body)
    }

    fn failing(mut self, status: StatusCode) -> Self {
        self.failure = Some(status);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Upstream for FixedUpstream {
    fn serve<'a>(
        &'a self,
        sink: &'a mut dyn ResponseWriter,
        _request: &'a Request,
    ) -> BoxFuture<'a, Result<(), UpstreamError>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(content_type) = self.content_type {
                sink.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            }
            sink.headers_mut()
                .insert(ETAG, HeaderValue::from_static("\"v1\""));
            sink.write_header(self.status);
            sink.write_all(self.body)?;
            match self.failure {
                Some(status) => Err(UpstreamError::new(status, "upstream gave up")),
                None => Ok(()),
            }
        })
    }
}

fn request() -> Request {
    HttpRequest::builder()
        .uri("/ignition")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn warnings() -> Report {
    let mut report = Report::new();
    report.warn("Config has unrecognized key: extra", Some("extra"));
    report
}

fn succeed(_: &[u8], _: &TranspileOptions) -> TranspileResult {
    Ok(Transpiled::ignition(r#"{"ignition":{"version":"2.3.0"}}"#))
}

fn warn_with_output(_: &[u8], _: &TranspileOptions) -> TranspileResult {
    Err(TranspileError::warning(
        warnings(),
        Some(Transpiled::ignition("{\"partial\":true}")),
    ))
}

fn warn_without_output(_: &[u8], _: &TranspileOptions) -> TranspileResult {
    Err(TranspileError::warning(warnings(), None))
}

fn fatal(_: &[u8], _: &TranspileOptions) -> TranspileResult {
    Err(TranspileError::fatal_message("invalid YAML"))
}

fn gate(
    config: GateConfig,
    transpiler: fn(&[u8], &TranspileOptions) -> TranspileResult,
) -> TranspileGate {
    TranspileGate::new(config.provision().unwrap(), transpiler)
}

async fn run(
    gate: &TranspileGate,
    upstream: &FixedUpstream,
) -> (Result<Outcome, GateError>, ResponseRecorder) {
    let mut sink = ResponseRecorder::new();
    let result = gate.handle(&mut sink, &request(), upstream).await;
    (result, sink)
}

#[tokio::test]
async fn test_ineligible_response_passes_through_unchanged() {
    let gate = gate(GateConfig::new(), fatal);
    let upstream = FixedUpstream::new(Some("text/plain; charset=utf-8"), b"not yaml at all: [");

    let (result, sink) = run(&gate, &upstream).await;

    assert_eq!(result.unwrap(), Outcome::PassedThrough);
    let (status, headers, body) = sink.into_parts();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(headers[ETAG], "\"v1\"");
    assert_eq!(&body[..], b"not yaml at all: [");
}

#[tokio::test]
async fn test_missing_content_type_passes_through() {
    let gate = gate(GateConfig::new(), fatal);
    let upstream = FixedUpstream::new(None, b"a: 1\n");

    let (result, sink) = run(&gate, &upstream).await;

    assert_eq!(result.unwrap(), Outcome::PassedThrough);
    assert_eq!(sink.body(), b"a: 1\n");
}

#[tokio::test]
async fn test_parameters_do_not_affect_eligibility() {
    let gate = gate(GateConfig::new(), succeed);
    let upstream = FixedUpstream::new(Some("application/x-yaml; charset=utf-8"), b"a: 1\n");

    let (result, _) = run(&gate, &upstream).await;

    assert_eq!(result.unwrap(), Outcome::Transpiled);
}

#[tokio::test]
async fn test_custom_allow_list_replaces_default() {
    let gate = gate(GateConfig::new().mime("text/yaml"), succeed);

    let (yaml, _) = run(&gate, &FixedUpstream::yaml(b"a: 1\n")).await;
    assert_eq!(yaml.unwrap(), Outcome::PassedThrough);

    let upstream = FixedUpstream::new(Some("text/yaml"), b"a: 1\n");
    let (text, _) = run(&gate, &upstream).await;
    assert_eq!(text.unwrap(), Outcome::Transpiled);
}

#[tokio::test]
async fn test_success_replaces_type_and_length_only() {
    let gate = gate(GateConfig::new(), succeed);
    let upstream = FixedUpstream::yaml(b"passwd: {}\n");

    let (result, sink) = run(&gate, &upstream).await;

    assert_eq!(result.unwrap(), Outcome::Transpiled);
    let (status, headers, body) = sink.into_parts();
    let expected = br#"{"ignition":{"version":"2.3.0"}}"#;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], IGNITION_MEDIA_TYPE);
    assert_eq!(headers[CONTENT_LENGTH], expected.len().to_string().as_str());
    assert_eq!(headers[ETAG], "\"v1\"");
    assert_eq!(&body[..], expected);
}

#[tokio::test]
async fn test_upstream_runs_exactly_once() {
    for transpiler in [succeed, warn_with_output, warn_without_output, fatal] {
        let gate = gate(GateConfig::new(), transpiler);
        let upstream = FixedUpstream::yaml(b"a: 1\n");
        let _ = run(&gate, &upstream).await;
        assert_eq!(upstream.calls(), 1);
    }
}

#[tokio::test]
async fn test_non_strict_warning_serves_partial_output() {
    let gate = gate(GateConfig::new(), warn_with_output);

    let (result, sink) = run(&gate, &FixedUpstream::yaml(b"a: 1\n")).await;

    assert_eq!(result.unwrap(), Outcome::Degraded);
    assert_eq!(sink.body(), b"{\"partial\":true}");
    assert_eq!(sink.headers()[CONTENT_TYPE], IGNITION_MEDIA_TYPE);
    assert_eq!(sink.headers()[CONTENT_LENGTH], "16");
}

#[tokio::test]
async fn test_non_strict_warning_without_output_keeps_original() {
    let gate = gate(GateConfig::new(), warn_without_output);

    let (result, sink) = run(&gate, &FixedUpstream::yaml(b"a: 1\n")).await;

    assert_eq!(result.unwrap(), Outcome::KeptOriginal);
    assert_eq!(sink.body(), b"a: 1\n");
    assert_eq!(sink.headers()[CONTENT_TYPE], "application/x-yaml");
}

#[tokio::test]
async fn test_strict_warning_fails_without_writing() {
    let gate = gate(GateConfig::new().strict(), warn_with_output);

    let (result, sink) = run(&gate, &FixedUpstream::yaml(b"a: 1\n")).await;

    let err = result.unwrap_err();
    assert!(matches!(err, GateError::TranspileWarning(_)));
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    assert!(sink.body().is_empty());
    assert!(sink.headers().is_empty());
}

#[tokio::test]
async fn test_fatal_fails_in_both_modes() {
    for config in [GateConfig::new(), GateConfig::new().strict()] {
        let gate = gate(config, fatal);
        let (result, sink) = run(&gate, &FixedUpstream::yaml(b"a: 1\n")).await;

        let err = result.unwrap_err();
        assert!(matches!(err, GateError::TranspileFatal(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert!(sink.body().is_empty());
    }
}

#[tokio::test]
async fn test_upstream_error_propagates_unchanged() {
    let gate = gate(GateConfig::new(), succeed);
    let upstream = FixedUpstream::yaml(b"a: 1\n").failing(StatusCode::SERVICE_UNAVAILABLE);

    let (result, sink) = run(&gate, &upstream).await;

    let err = result.unwrap_err();
    assert!(matches!(err, GateError::Upstream(_)));
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(sink.body().is_empty());
}

#[tokio::test]
async fn test_oversized_upstream_is_resource_error() {
    let gate = gate(GateConfig::new(), succeed).with_body_limit(Some(4));
    let upstream = FixedUpstream::yaml(b"passwd: {}\n");

    let (result, sink) = run(&gate, &upstream).await;

    let err = result.unwrap_err();
    assert!(matches!(err, GateError::Resource { .. }));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(sink.body().is_empty());
}

#[tokio::test]
async fn test_oversized_ineligible_upstream_passes_through() {
    let gate = gate(GateConfig::new(), fatal).with_body_limit(Some(4));
    let upstream = FixedUpstream::new(Some("application/octet-stream"), b"\x7fELF binary blob");

    let (result, sink) = run(&gate, &upstream).await;

    assert_eq!(result.unwrap(), Outcome::PassedThrough);
    assert_eq!(sink.body(), b"\x7fELF binary blob");
    assert_eq!(sink.headers()[CONTENT_TYPE], "application/octet-stream");
}

#[tokio::test]
async fn test_core_user_config_end_to_end() {
    let config = GateConfig::new().strict().provision().unwrap();
    let gate = TranspileGate::new(config, ContainerLinuxTranspiler::new());
    let upstream = FixedUpstream::yaml(CORE_USER_YAML.as_bytes());

    let (result, sink) = run(&gate, &upstream).await;

    assert_eq!(result.unwrap(), Outcome::Transpiled);
    let (status, headers, body) = sink.into_parts();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], IGNITION_MEDIA_TYPE);
    assert_eq!(
        headers[CONTENT_LENGTH],
        CORE_USER_JSON.len().to_string().as_str()
    );
    assert_eq!(std::str::from_utf8(&body).unwrap(), CORE_USER_JSON);
}

#[tokio::test]
async fn test_strict_real_transpiler_rejects_unknown_keys() {
    let config = GateConfig::new().strict().provision().unwrap();
    let gate = TranspileGate::new(config, ContainerLinuxTranspiler::new());
    let upstream = FixedUpstream::yaml(b"passwd: {}\nextra: 1\n");

    let (result, _) = run(&gate, &upstream).await;

    assert!(matches!(result.unwrap_err(), GateError::TranspileWarning(_)));
}

#[tokio::test]
async fn test_non_strict_real_transpiler_serves_partial_output() {
    let config = GateConfig::new().provision().unwrap();
    let gate = TranspileGate::new(config, ContainerLinuxTranspiler::new());
    let upstream = FixedUpstream::yaml(b"passwd:\n  users:\n    - name: core\nextra: 1\n");

    let (result, sink) = run(&gate, &upstream).await;

    assert_eq!(result.unwrap(), Outcome::Degraded);
    let json: serde_json::Value = serde_json::from_slice(sink.body()).unwrap();
    assert_eq!(json["ignition"]["version"], "2.3.0");
    assert_eq!(json["passwd"]["users"][0]["name"], "core");
    assert!(json.get("extra").is_none());
}

#[tokio::test]
async fn test_pipeline_with_transpile_stage() {
    let gate = TranspileGate::new(
        GateConfig::new().provision().unwrap(),
        ContainerLinuxTranspiler::new(),
    );
    let pipeline = Pipeline::builder()
        .add_pre_handler_stage(RequestIdMiddleware::new())
        .add_post_handler_stage(TranspileMiddleware::new(gate))
        .build();
    let upstream = Arc::new(FixedUpstream::yaml(CORE_USER_YAML.as_bytes()));

    let handler_upstream = Arc::clone(&upstream);
    let mut ctx = MiddlewareContext::new();
    let response = pipeline
        .process_with(&mut ctx, request(), move |_ctx, req| {
            Box::pin(async move {
                let mut recorder = ResponseRecorder::new();
                let _ = handler_upstream.serve(&mut recorder, &req).await;
                recorder.into_response()
            })
        })
        .await;

    assert_eq!(upstream.calls(), 1);
    assert_eq!(ctx.outcome(), Some(Outcome::Transpiled));
    assert_eq!(response.headers()[CONTENT_TYPE], IGNITION_MEDIA_TYPE);
    assert!(response.headers().contains_key("x-request-id"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(std::str::from_utf8(&body).unwrap(), CORE_USER_JSON);
}
