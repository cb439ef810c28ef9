//! Request handling and transformation.
//!
//! # Responsibilities
//! - Buffer the inbound body so a request can be replayed on retry/failover
//! - Enforce the request body limit
//! - Prepare the upstream request (URI rewrite, hop-by-hop headers, X-Forwarded-For)
//!
//! # Design Decisions
//! - The inbound method, headers and body are forwarded untouched otherwise
//! - Inbound Host header is kept, like a single-host reverse proxy
//! - Backend base path is joined in front of the request path

use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    http::{self, header, uri::InvalidUri, HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use hyper::body::Body as HttpBody;
use thiserror::Error;
use url::Url;

use crate::load_balancer::backend::host_port;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Header listing the client and any proxies in front of it.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Connection-scoped headers that a proxy must not forward.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Errors reading the inbound request body.
#[derive(Debug, Error)]
pub enum RequestBodyError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(#[source] axum::Error),
}

impl IntoResponse for RequestBodyError {
    fn into_response(self) -> Response {
        match self {
            RequestBodyError::TooLarge { .. } => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response()
            }
            RequestBodyError::Read(_) => {
                (StatusCode::BAD_REQUEST, "Failed to read request body").into_response()
            }
        }
    }
}

/// Why [`collect_body`] stopped.
#[derive(Debug)]
pub(crate) enum CollectError {
    TooLarge,
    Read(axum::Error),
}

/// Read a whole body into memory, stopping as soon as it passes `limit` bytes.
///
/// Works the same whether or not the length was declared up front.
pub(crate) async fn collect_body(body: Body, limit: usize) -> Result<Bytes, CollectError> {
    if HttpBody::size_hint(&body).lower() > limit as u64 {
        return Err(CollectError::TooLarge);
    }

    let mut buf = Vec::new();
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(CollectError::Read)?;
        if buf.len() + chunk.len() > limit {
            return Err(CollectError::TooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(buf))
}

/// An inbound request with its body held in memory.
///
/// Every forward (first try, retry, failover) builds a fresh upstream
/// request from this.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl BufferedRequest {
    /// Read the whole body of `request`, refusing bodies over `limit` bytes.
    pub async fn from_request(
        request: Request<Body>,
        client_addr: Option<SocketAddr>,
        limit: usize,
    ) -> Result<Self, RequestBodyError> {
        let declared = request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > limit as u64) {
            return Err(RequestBodyError::TooLarge { limit });
        }

        let (parts, body) = request.into_parts();
        let body = collect_body(body, limit).await.map_err(|e| match e {
            CollectError::TooLarge => RequestBodyError::TooLarge { limit },
            CollectError::Read(e) => RequestBodyError::Read(e),
        })?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            client_addr,
        })
    }

    /// URI of this request on the backend whose base URL is `target`.
    pub fn upstream_uri(&self, target: &Url) -> Result<Uri, InvalidUri> {
        let authority = host_port(target).unwrap_or_default();
        let path = join_paths(target.path(), self.uri.path());
        let query = [target.query(), self.uri.query()]
            .into_iter()
            .flatten()
            .filter(|q| !q.is_empty())
            .collect::<Vec<_>>()
            .join("&");

        let uri = if query.is_empty() {
            format!("http://{}{}", authority, path)
        } else {
            format!("http://{}{}?{}", authority, path, query)
        };
        uri.parse()
    }

    /// Headers sent upstream.
    pub fn upstream_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        strip_hop_by_hop(&mut headers);

        if let Some(addr) = self.client_addr {
            let client_ip = addr.ip().to_string();
            let prior: Vec<&str> = self
                .headers
                .get_all(&X_FORWARDED_FOR)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();
            let forwarded = if prior.is_empty() {
                client_ip
            } else {
                format!("{}, {}", prior.join(", "), client_ip)
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }
        headers
    }

    /// Build the request to send to the backend at `target`.
    pub fn to_upstream(&self, target: &Url) -> Result<Request<Body>, http::Error> {
        let uri = self.upstream_uri(target)?;
        let mut request = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .body(Body::from(self.body.clone()))?;
        *request.headers_mut() = self.upstream_headers();
        Ok(request)
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffered(uri: &str, headers: HeaderMap) -> BufferedRequest {
        BufferedRequest {
            method: Method::GET,
            uri: uri.parse().unwrap(),
            headers,
            body: Bytes::new(),
            client_addr: Some("10.0.0.7:51000".parse().unwrap()),
        }
    }

    #[test]
    fn joins_base_path_and_query() {
        let req = buffered("/users/42?verbose=1", HeaderMap::new());

        let root = Url::parse("http://127.0.0.1:3031").unwrap();
        assert_eq!(
            req.upstream_uri(&root).unwrap(),
            "http://127.0.0.1:3031/users/42?verbose=1"
        );

        let prefixed = Url::parse("http://backend.local:8000/api?key=abc").unwrap();
        assert_eq!(
            req.upstream_uri(&prefixed).unwrap(),
            "http://backend.local:8000/api/users/42?key=abc&verbose=1"
        );
    }

    #[test]
    fn default_port_is_filled_in() {
        let req = buffered("/", HeaderMap::new());
        let target = Url::parse("http://backend.local").unwrap();
        assert_eq!(req.upstream_uri(&target).unwrap(), "http://backend.local:80/");
    }

    #[test]
    fn strips_hop_by_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-internal"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-internal", HeaderValue::from_static("secret"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers[header::ACCEPT], "text/plain");
    }

    #[test]
    fn appends_client_to_forwarded_for() {
        let req = buffered("/", HeaderMap::new());
        assert_eq!(req.upstream_headers()[&X_FORWARDED_FOR], "10.0.0.7");

        let mut headers = HeaderMap::new();
        headers.insert(&X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.9"));
        let req = buffered("/", headers);
        assert_eq!(req.upstream_headers()[&X_FORWARDED_FOR], "203.0.113.9, 10.0.0.7");
    }

    #[tokio::test]
    async fn rejects_declared_oversized_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::CONTENT_LENGTH, "2048")
            .body(Body::from(vec![0u8; 2048]))
            .unwrap();

        let err = BufferedRequest::from_request(request, None, 1024).await.unwrap_err();
        assert!(matches!(err, RequestBodyError::TooLarge { limit: 1024 }));
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn rejects_oversized_streamed_body() {
        let chunks = vec![
            Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 1024])),
            Ok::<_, std::io::Error>(Bytes::from(vec![0u8; 1024])),
        ];
        let request = Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .body(Body::from_stream(futures_util::stream::iter(chunks)))
            .unwrap();

        let err = BufferedRequest::from_request(request, None, 1024).await.unwrap_err();
        assert!(matches!(err, RequestBodyError::TooLarge { limit: 1024 }));
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn buffers_body_for_replay() {
        let request = Request::builder()
            .method(Method::PUT)
            .uri("/items/1")
            .header("x-test", "yes")
            .body(Body::from("payload"))
            .unwrap();

        let buffered = BufferedRequest::from_request(request, None, 1024).await.unwrap();
        let target = Url::parse("http://127.0.0.1:9000").unwrap();

        for _ in 0..2 {
            let upstream = buffered.to_upstream(&target).unwrap();
            assert_eq!(upstream.method(), Method::PUT);
            assert_eq!(upstream.headers()["x-test"], "yes");
            let body = axum::body::to_bytes(upstream.into_body(), 1024).await.unwrap();
            assert_eq!(&body[..], b"payload");
        }
    }
}
