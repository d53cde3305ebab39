//! HTTP server for Sonarr webhooks.
//!
//! Every path and method lands on [`relay_handler`]; [`Relay::handle`] decides
//! what the caller sees.

use std::io;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::Method,
    Router,
};
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ListenSpec;
use crate::relay::{Acknowledgment, Relay};

/// Largest inbound body processed. Bigger bodies are acknowledged and dropped.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Build the HTTP router.
pub fn build_router(relay: Relay) -> Router {
    Router::new()
        .fallback(relay_handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

async fn relay_handler(
    State(relay): State<Relay>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Acknowledgment {
    match body {
        Ok(body) => relay.handle(&method, body),
        Err(rejection) => {
            error!(error = %rejection, %method, "Dropping unreadable request body");
            Relay::acknowledge(&method)
        }
    }
}

/// Bind a listening socket for `spec`.
pub fn bind(spec: &ListenSpec) -> io::Result<TcpListener> {
    let socket = if spec.addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    #[cfg(unix)]
    socket.set_reuseaddr(true)?;

    socket.bind(spec.addr)?;
    socket.listen(spec.backlog)
}

/// Serve the relay until Ctrl+C or SIGTERM.
pub async fn run_server(relay: Relay, listener: TcpListener) -> io::Result<()> {
    let app = build_router(relay);

    info!(addr = %listener.local_addr()?, "Sonarr relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Forwarder;
    use crate::error::DispatchError;
    use crate::relay::{ACK_BODY, ACK_CONTENT_TYPE};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    #[derive(Default)]
    struct CountingForwarder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Forwarder for CountingForwarder {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn forward(&self, _body: Vec<u8>) -> Result<Bytes, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::new())
        }
    }

    fn router() -> (Router, Arc<CountingForwarder>) {
        let forwarder = Arc::new(CountingForwarder::default());
        (build_router(Relay::new(forwarder.clone())), forwarder)
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: &'static str,
    ) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        if status == StatusCode::OK {
            assert_eq!(response.headers()[header::CONTENT_TYPE], ACK_CONTENT_TYPE);
        }
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (app, forwarder) = router();
        assert_eq!(
            send(app, Method::GET, "/", "").await,
            (StatusCode::OK, ACK_BODY.to_string())
        );
        assert_eq!(forwarder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_any_path_is_served() {
        for uri in ["/", "/sonarr", "/a/b/c?x=1"] {
            let (app, _) = router();
            let (status, body) = send(app, Method::POST, uri, r#"{"EventType":"Rename"}"#).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, ACK_BODY);
        }
    }

    #[tokio::test]
    async fn test_malformed_body_still_acknowledged() {
        let (app, forwarder) = router();
        let (status, body) = send(app, Method::PUT, "/", "{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ACK_BODY);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(forwarder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_event_forwarded_once() {
        let (app, forwarder) = router();
        let (status, _) = send(
            app,
            Method::POST,
            "/",
            r#"{"EventType":"Test","Series":{"Title":"Test Title"},"Episodes":null}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        for _ in 0..100 {
            if forwarder.calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(forwarder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let (app, _) = router();
        let (status, _) = send(app, Method::DELETE, "/", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_oversized_body_acknowledged_and_dropped() {
        let (app, forwarder) = router();
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/")
                    .body(Body::from(vec![b' '; MAX_BODY_BYTES + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], ACK_CONTENT_TYPE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], ACK_BODY.as_bytes());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(forwarder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let spec: ListenSpec = "tcp:port=0:interface=127.0.0.1:backlog=8".parse().unwrap();
        let listener = bind(&spec).unwrap();
        let addr = listener.local_addr().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }
}
