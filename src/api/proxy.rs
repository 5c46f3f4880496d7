//! Generic port proxy: `/proxy/{port}/{path}` to `http://{host}:{port}/{path}`.
//!
//! Bodies are streamed in both directions. The inbound body is pumped into
//! the upstream request through a bounded channel, so a slow provider pushes
//! back on the client instead of the body being buffered. Upstream response
//! headers must arrive within the request timeout; the response body is then
//! relayed for as long as the provider keeps sending.

use crate::api::disconnect::DisconnectStream;
use crate::api::handlers::{proxy_usage_not_found, AppState};
use crate::core::error::{AppError, Result};
use crate::core::logging::PROVIDER_CONTEXT;
use crate::core::metrics::get_metrics;
use crate::core::{CancelHandle, CancelOnDrop};
use crate::services::ProxyTarget;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::time::Instant;

/// Chunks buffered between the inbound body and the upstream request.
const BODY_CHANNEL_CAPACITY: usize = 8;

/// Connection-scoped headers that must not be forwarded in either direction.
const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name)
}

/// Inbound headers to send upstream. `host` is dropped so the client sets
/// it for the target.
fn forward_request_headers(headers: &HeaderMap) -> reqwest::header::HeaderMap {
    let mut forwarded = reqwest::header::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = name.as_str();
        if name == "host" || is_hop_by_hop(name) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            forwarded.append(name, value);
        }
    }
    forwarded
}

/// Upstream headers to relay. Upstream CORS headers are dropped; the CORS
/// layer sets its own on every response.
fn relay_response_headers(upstream: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut relayed = HeaderMap::with_capacity(upstream.len());
    for (name, value) in upstream {
        let name = name.as_str();
        if is_hop_by_hop(name) || name.starts_with("access-control-") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            relayed.append(name, value);
        }
    }
    relayed
}

/// Whether the inbound request carries a body worth streaming.
fn has_body(headers: &HeaderMap) -> bool {
    let declared_length = headers
        .get(axum::http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .is_some_and(|len| len > 0);
    declared_length || headers.contains_key(axum::http::header::TRANSFER_ENCODING)
}

/// Stream `body` into a channel feeding the upstream request body.
///
/// The pump stops as soon as `cancel` fires, which drops the sender and ends
/// the upstream body.
fn pump_body(body: Body, cancel: CancelHandle) -> mpsc::Receiver<std::io::Result<Bytes>> {
    let (mut tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(BODY_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let relay = async {
            let mut inbound = body.into_data_stream();
            while let Some(chunk) = inbound.next().await {
                let chunk = chunk.map_err(std::io::Error::other);
                let failed = chunk.is_err();
                if tx.send(chunk).await.is_err() || failed {
                    break;
                }
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => tracing::debug!("Request body pump cancelled"),
            _ = relay => {}
        }
    });

    rx
}

/// Relay any request under `/proxy/{port}/...` to the local provider.
pub async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let target = state
        .registry
        .parse_proxy_path(request.uri().path(), request.uri().query());

    let Some(target) = target else {
        return proxy_usage_not_found();
    };

    let provider = target.provider.clone();
    PROVIDER_CONTEXT
        .scope(provider, async move {
            match forward(&state, target, request).await {
                Ok(response) => response,
                Err(e) => e.into_response(),
            }
        })
        .await
}

async fn forward(state: &AppState, target: ProxyTarget, request: Request) -> Result<Response> {
    let url = state.registry.target_url(&target);
    let (parts, body) = request.into_parts();

    tracing::info!(
        method = %parts.method,
        url = %url,
        provider = %target.provider,
        "Proxying request"
    );

    let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
        .map_err(|e| AppError::bad_request_with("Unsupported method", e.to_string()))?;
    let headers = forward_request_headers(&parts.headers);

    // Cancels the body pump if this future is dropped before the relay
    // takes over, or if the relayed body is dropped before it ends.
    let guard: CancelOnDrop = CancelHandle::new().drop_guard();

    let timeout = state.config.request_timeout();
    let deadline = Instant::now() + timeout;
    let client = &state.http_client;

    let send = async {
        if has_body(&parts.headers) {
            let body = reqwest::Body::wrap_stream(pump_body(body, guard.handle().clone()));
            client
                .request(method, &url)
                .headers(headers)
                .body(body)
                .send()
                .await
        } else if method == reqwest::Method::GET || method == reqwest::Method::HEAD {
            state
                .proxy_retry
                .run(
                    deadline,
                    |_| {
                        client
                            .request(method.clone(), &url)
                            .headers(headers.clone())
                            .send()
                    },
                    |e: &reqwest::Error| e.is_connect(),
                )
                .await
        } else {
            client.request(method, &url).headers(headers).send().await
        }
    };

    let upstream = match tokio::time::timeout_at(deadline, send).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) if e.is_timeout() => return Err(AppError::Timeout),
        Ok(Err(e)) => {
            tracing::warn!(url = %url, error = %e, "Local provider not available");
            return Err(AppError::ProviderUnavailable(e.to_string()));
        }
        Err(_) => {
            tracing::warn!(
                url = %url,
                timeout_secs = timeout.as_secs(),
                "Upstream response headers timed out"
            );
            return Err(AppError::Timeout);
        }
    };

    let status =
        StatusCode::from_u16(upstream.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    get_metrics()
        .proxied_requests
        .with_label_values(&[&target.provider, status.as_str()])
        .inc();

    let headers = relay_response_headers(upstream.headers());
    let body = Body::from_stream(DisconnectStream {
        stream: Box::pin(upstream.bytes_stream()),
        guard,
        provider: target.provider,
    });

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_headers_drop_host_and_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("host", "localhost:3001".parse().unwrap());
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("authorization", "Bearer local".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());

        let forwarded = forward_request_headers(&headers);

        assert!(forwarded.get("host").is_none());
        assert!(forwarded.get("connection").is_none());
        assert!(forwarded.get("transfer-encoding").is_none());
        assert_eq!(forwarded.get("authorization").unwrap(), "Bearer local");
        assert_eq!(forwarded.get("content-type").unwrap(), "application/json");
    }

    #[test]
    fn test_response_headers_drop_upstream_cors() {
        let mut upstream = reqwest::header::HeaderMap::new();
        upstream.insert("access-control-allow-origin", "http://x".parse().unwrap());
        upstream.insert("content-type", "text/event-stream".parse().unwrap());
        upstream.insert("keep-alive", "timeout=5".parse().unwrap());

        let relayed = relay_response_headers(&upstream);

        assert!(relayed.get("access-control-allow-origin").is_none());
        assert!(relayed.get("keep-alive").is_none());
        assert_eq!(relayed.get("content-type").unwrap(), "text/event-stream");
    }

    #[test]
    fn test_has_body() {
        let mut headers = HeaderMap::new();
        assert!(!has_body(&headers));

        headers.insert("content-length", "0".parse().unwrap());
        assert!(!has_body(&headers));

        headers.insert("content-length", "12".parse().unwrap());
        assert!(has_body(&headers));

        let mut chunked = HeaderMap::new();
        chunked.insert("transfer-encoding", "chunked".parse().unwrap());
        assert!(has_body(&chunked));
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancel() {
        let handle = CancelHandle::new();
        let (mut inbound_tx, inbound_rx) = mpsc::channel::<std::io::Result<Bytes>>(1);

        let mut upstream = pump_body(Body::from_stream(inbound_rx), handle.clone());
        inbound_tx.send(Ok(Bytes::from("first"))).await.unwrap();
        handle.cancel();

        // The inbound sender stays open, so the stream can only end via cancel
        let relayed = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            let mut chunks = Vec::new();
            while let Some(chunk) = upstream.next().await {
                chunks.push(chunk.unwrap());
            }
            chunks
        })
        .await
        .expect("upstream body should end after cancel");

        assert!(relayed.len() <= 1);
        drop(inbound_tx);
    }

    #[tokio::test]
    async fn test_pump_relays_whole_body() {
        let body = Body::from("hello world");
        let upstream = pump_body(body, CancelHandle::new());

        let chunks: Vec<Bytes> = upstream.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks.concat(), b"hello world");
    }
}
