//! HTTP server: the static file upstream behind the transpilation gate.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use kindle_config::KindleConfig;
use kindle_core::{GateError, RequestId};
use kindle_middleware::context::MiddlewareContext;
use kindle_middleware::stages::{RequestIdMiddleware, RequestIdPolicy};
use kindle_middleware::{Pipeline, Request, Response, ResponseExt, ResponseRecorder, TranspileGate};
use kindle_telemetry::{log_request_complete, log_request_error};
use kindle_transpiler::ContainerLinuxTranspiler;
use tokio::net::TcpListener;
use tracing::{debug, error, info, Instrument};

use crate::error::{ServerError, ServerResult};
use crate::static_files::StaticFiles;

/// Serves files from a directory, transpiling eligible ones.
///
/// # Example
///
/// ```
/// use kindle_config::KindleConfig;
/// use kindle_server::Server;
///
/// let server = Server::new(&KindleConfig::default()).unwrap();
/// assert_eq!(server.addr().to_string(), "127.0.0.1:8080");
/// ```
#[derive(Debug, Clone)]
pub struct Server {
    addr: SocketAddr,
    gate: TranspileGate,
    files: Arc<StaticFiles>,
    pipeline: Pipeline,
}

impl Server {
    /// Builds a server from the host configuration.
    ///
    /// Provisions the gate with the Container Linux transpiler.
    pub fn new(config: &KindleConfig) -> ServerResult<Self> {
        let addr: SocketAddr = config
            .server
            .listen
            .parse()
            .map_err(|e| ServerError::invalid_address(&config.server.listen, e))?;

        let gate_config = config.gate.clone().provision()?;
        let gate = TranspileGate::new(gate_config, ContainerLinuxTranspiler::new())
            .with_body_limit(config.server.max_body_bytes);
        let files = StaticFiles::new(&config.server.root);
        let policy = if config.server.trust_request_id {
            RequestIdPolicy::TrustIncoming
        } else {
            RequestIdPolicy::Generate
        };

        Ok(Self::from_parts(addr, gate, files, policy))
    }

    /// Assembles a server from prepared parts.
    ///
    /// Requests run through a pipeline that assigns the request ID before
    /// the gate serves the file.
    #[must_use]
    pub fn from_parts(
        addr: SocketAddr,
        gate: TranspileGate,
        files: StaticFiles,
        request_ids: RequestIdPolicy,
    ) -> Self {
        let pipeline = Pipeline::builder()
            .add_pre_handler_stage(RequestIdMiddleware::with_policy(request_ids))
            .build();
        Self {
            addr,
            gate,
            files: Arc::new(files),
            pipeline,
        }
    }

    /// Returns the configured listen address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the gate.
    #[must_use]
    pub fn gate(&self) -> &TranspileGate {
        &self.gate
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::bind(self.addr.to_string(), e))?;
        self.serve(listener, shutdown).await
    }

    /// Serves connections from `listener` until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        let local = listener.local_addr()?;
        info!(
            addr = %local,
            root = %self.files.root().display(),
            strict = self.gate.config().strict,
            "kindle listening"
        );

        let server = Arc::new(self);
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req: http::Request<Incoming>| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.handle(req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(peer = %peer, error = %e, "connection error");
                }
            });
        }
    }

    async fn handle(&self, req: http::Request<Incoming>) -> Response {
        let (parts, body) = req.into_parts();
        match body.collect().await {
            Ok(collected) => {
                let request = Request::from_parts(parts, Full::new(collected.to_bytes()));
                self.respond(request).await
            }
            Err(e) => {
                debug!(error = %e, "failed to read request body");
                Response::empty(StatusCode::BAD_REQUEST)
            }
        }
    }

    /// Produces the response for one request.
    ///
    /// A gate failure becomes an empty response carrying the error's
    /// status code.
    pub async fn respond(&self, request: Request) -> Response {
        let mut ctx = MiddlewareContext::new();
        let gate = self.gate.clone();
        let files = Arc::clone(&self.files);

        let response = self
            .pipeline
            .process_with(&mut ctx, request, move |ctx, request| {
                Box::pin(serve_file(gate, files, ctx.request_id(), request))
            })
            .await;

        let request_id = ctx.request_id();
        let duration_ms = u64::try_from(ctx.elapsed().as_millis()).unwrap_or(u64::MAX);
        log_request_complete!(request_id, response.status().as_u16(), duration_ms);
        response
    }
}

async fn serve_file(
    gate: TranspileGate,
    files: Arc<StaticFiles>,
    request_id: RequestId,
    request: Request,
) -> Response {
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let mut recorder = ResponseRecorder::new();
        match gate.handle(&mut recorder, &request, files.as_ref()).await {
            Ok(outcome) => {
                debug!(outcome = outcome.as_str(), "gate settled");
                recorder.into_response()
            }
            Err(err) => {
                if let GateError::Upstream(upstream) = &err {
                    debug!(status = %upstream.status(), error = %upstream, "upstream refused");
                } else {
                    log_request_error!(request_id, err.category(), err);
                }
                Response::empty(err.status_code())
            }
        }
    }
    .instrument(span)
    .await
}
