//! HTTP Server Loop
//!
//! hyper http1 accept loop shared by the peer server and the API front end.

use std::convert::Infallible;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Response type produced by every handler
pub type HttpResponse = Response<Full<Bytes>>;

/// Request handler run by [`serve`]
///
/// Requests carry no body: every route is a `GET`.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: Request<()>) -> HttpResponse;
}

/// Accept connections on `listener` until `shutdown` fires
///
/// Open connections are asked to finish their in-flight request and close.
pub async fn serve<H>(listener: TcpListener, handler: Arc<H>, shutdown: CancellationToken) -> Result<()>
where
    H: Handler + ?Sized,
{
    let addr = listener
        .local_addr()
        .map_err(|e| Error::Internal(format!("Listener has no local address: {}", e)))?;
    info!("HTTP server listening on {}", addr);

    loop {
        let (stream, remote) = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("HTTP server on {} shutting down", addr);
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("HTTP server on {} accept error: {}", addr, e);
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let handler = Arc::clone(&handler);
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let handler = Arc::clone(&handler);
                async move { Ok::<_, Infallible>(handler.handle(req.map(|_| ())).await) }
            });

            let conn = http1::Builder::new().serve_connection(io, service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = shutdown.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };
            if let Err(e) = result {
                debug!(remote = %remote, error = %e, "connection error");
            }
        });
    }
}

/// Build a response with a body and content type
pub(crate) fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> HttpResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Plain-text response
pub(crate) fn text(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    respond(status, "text/plain; charset=utf-8", body)
}

/// Map a lookup failure to a status code
pub(crate) fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::EmptyKey => StatusCode::BAD_REQUEST,
        Error::GroupNotFound(_) => StatusCode::NOT_FOUND,
        Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// Tests
// =============================================================================
