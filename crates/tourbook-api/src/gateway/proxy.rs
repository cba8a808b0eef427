//! Request forwarding to upstream services

use super::{authenticate, match_route};
use crate::error::AppError;
use crate::state::GatewayState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName},
    response::Response,
};
use std::sync::Arc;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn forwardable(name: &HeaderName) -> bool {
    !HOP_BY_HOP.contains(name) && *name != header::HOST && *name != header::CONTENT_LENGTH
}

fn copy_headers(from: &HeaderMap, to: &mut HeaderMap) {
    for (name, value) in from.iter().filter(|(name, _)| forwardable(name)) {
        to.append(name.clone(), value.clone());
    }
}

/// Fallback handler: every path not served by the gateway itself
pub async fn proxy_handler(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    let route = match_route(&state.routes, &path)
        .cloned()
        .ok_or_else(|| AppError::NotFound("Route".to_string()))?;

    if route.protected {
        authenticate(&state, request.headers_mut(), &path)?;
    } else {
        state.resolver.strip_identity_headers(request.headers_mut());
    }

    forward(&state, &route.upstream, request).await
}

/// Send `request` to `upstream` with the same method, path, query, headers
/// and body, and relay the answer
pub async fn forward(
    state: &GatewayState,
    upstream: &str,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{upstream}{path_and_query}");

    let body = axum::body::to_bytes(body, state.config.server.max_body_size)
        .await
        .map_err(|e| {
            tracing::debug!(url = %url, error = %e, "Request body rejected");
            AppError::PayloadTooLarge(format!(
                "Request body exceeds {} bytes",
                state.config.server.max_body_size
            ))
        })?;

    let mut upstream_headers = HeaderMap::new();
    copy_headers(&parts.headers, &mut upstream_headers);

    let upstream_response = state
        .http
        .request(parts.method.clone(), &url)
        .headers(upstream_headers)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Upstream request failed");
            AppError::ServiceUnavailable("Upstream service unavailable".to_string())
        })?;

    let status = upstream_response.status();
    let response_headers = upstream_response.headers().clone();
    let bytes = upstream_response.bytes().await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "Upstream response interrupted");
        AppError::ServiceUnavailable("Upstream service unavailable".to_string())
    })?;

    tracing::debug!(
        method = %parts.method,
        url = %url,
        status = status.as_u16(),
        "Proxied request"
    );

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    copy_headers(&response_headers, response.headers_mut());

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_headers_dropped() {
        let mut from = HeaderMap::new();
        from.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        from.insert(header::HOST, "gateway:4000".parse().unwrap());
        from.insert(header::CONTENT_LENGTH, "12".parse().unwrap());
        from.insert(header::COOKIE, "accessToken=abc".parse().unwrap());
        from.append(header::ACCEPT, "application/json".parse().unwrap());
        from.append(header::ACCEPT, "text/plain".parse().unwrap());

        let mut to = HeaderMap::new();
        copy_headers(&from, &mut to);

        assert!(to.get(header::CONNECTION).is_none());
        assert!(to.get(header::HOST).is_none());
        assert!(to.get(header::CONTENT_LENGTH).is_none());
        assert_eq!(to.get(header::COOKIE).unwrap(), "accessToken=abc");
        assert_eq!(to.get_all(header::ACCEPT).iter().count(), 2);
    }
}
