//! Shared utilities for integration and load testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    routing::any,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use simple_lb::http::HttpServer;
use simple_lb::load_balancer::{Backend, HttpForwarder, ServerPool};

/// Start a mock backend that answers every request with a fixed body.
pub async fn start_mock_backend(response: &str) -> SocketAddr {
    start_raw_backend(format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.len(),
        response
    ))
    .await
}

/// Start a backend that promises 100 bytes, sends 10 and hangs up.
pub async fn start_truncating_backend() -> SocketAddr {
    start_raw_backend("HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n0123456789".to_string()).await
}

/// Start a backend that writes `response` verbatim on every connection.
pub async fn start_raw_backend(response: String) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let response = response.clone();
                    tokio::spawn(async move {
                        // Consume the request head before answering.
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }

                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a backend that describes the request it received.
///
/// The body is `METHOD URI|X-Forwarded-For|request body`.
pub async fn start_echo_backend() -> SocketAddr {
    async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> String {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        format!(
            "{} {}|{}|{}",
            method,
            uri,
            forwarded,
            String::from_utf8_lossy(&body)
        )
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A pool over `addrs`, in order, using the production forwarder.
pub fn build_pool(addrs: &[SocketAddr]) -> Arc<ServerPool> {
    build_pool_with_response_limit(addrs, 1024 * 1024)
}

pub fn build_pool_with_response_limit(addrs: &[SocketAddr], max_response_bytes: usize) -> Arc<ServerPool> {
    let forwarder = Arc::new(HttpForwarder::new(
        Duration::from_secs(1),
        Duration::from_secs(5),
        max_response_bytes,
    ));
    let mut pool = ServerPool::new();
    for addr in addrs {
        let url = Url::parse(&format!("http://{}", addr)).unwrap();
        pool.add_backend(Backend::new(url, forwarder.clone()).unwrap());
    }
    Arc::new(pool)
}

/// Serve the load balancer over `pool` on an ephemeral port.
pub async fn start_proxy(pool: Arc<ServerPool>) -> SocketAddr {
    start_proxy_with_limit(pool, 1024 * 1024).await
}

pub async fn start_proxy_with_limit(pool: Arc<ServerPool>, max_request_bytes: usize) -> SocketAddr {
    let server = HttpServer::from_pool(pool, max_request_bytes);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    addr
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// GET `path` through the proxy and return the status and body.
pub async fn get(client: &reqwest::Client, proxy: SocketAddr, path: &str) -> (u16, String) {
    let res = client
        .get(format!("http://{}{}", proxy, path))
        .send()
        .await
        .expect("Proxy unreachable");
    let status = res.status().as_u16();
    (status, res.text().await.unwrap())
}
