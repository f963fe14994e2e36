//! Read-only status HTTP API for the lot display
//!
//! `GET /api/parking/summary` → `{total, occupied, free}`
//! `GET /api/barriers` → `{"entry": "CLOSED", ...}` as last observed on the bus
//! `GET /health` → `ok`

use crate::services::availability::SharedView;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Status, content type and body for one request
#[derive(Debug, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn json<T: serde::Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status: StatusCode::OK, content_type: "application/json", body },
            Err(e) => Self::text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self { status, content_type: "text/plain; charset=utf-8", body: body.into() }
    }

    fn into_response(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = self.status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        response
    }
}

pub fn route(method: &Method, path: &str, view: &SharedView) -> Reply {
    match (method, path) {
        (&Method::GET, "/api/parking/summary") => Reply::json(&view.read().summary()),
        (&Method::GET, "/api/barriers") => {
            let view = view.read();
            let phases: BTreeMap<&str, &str> =
                view.barriers().iter().map(|(id, phase)| (id.as_str(), phase.as_str())).collect();
            Reply::json(&phases)
        }
        (&Method::GET, "/health") => Reply::text(StatusCode::OK, "ok"),
        _ => Reply::text(StatusCode::NOT_FOUND, "not found"),
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    view: SharedView,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.method(), req.uri().path(), &view).into_response())
}

pub async fn start_status_server(
    port: u16,
    view: SharedView,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, "status_api_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let view = view.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle_request(req, view.clone()));
                            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                error!(error = %e, "status_api_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "status_api_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("status_api_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
