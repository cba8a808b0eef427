//! Gateway authentication
//!
//! Incoming identity headers are never trusted at the gateway: they are
//! removed before token verification and rebuilt from the verified token.

use crate::auth::middleware::reject;
use crate::error::AppError;
use crate::state::GatewayState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tourbook_core::Identity;

/// Strip client identity headers, verify the access token and inject the
/// verified identity into `headers`
pub fn authenticate(
    state: &GatewayState,
    headers: &mut HeaderMap,
    resource: &str,
) -> Result<Identity, AppError> {
    state.resolver.strip_identity_headers(headers);

    let resolved = match state.resolver.resolve_token(headers) {
        Ok(resolved) => resolved,
        Err(err) => return Err(reject(err, headers, resource)),
    };

    for (name, value) in state
        .resolver
        .identity_headers(&resolved.identity)
        .map_err(|e| AppError::Internal(format!("Identity headers: {e}")))?
    {
        headers.insert(name, value);
    }

    tracing::debug!(
        subject_id = %resolved.identity.subject_id,
        resource = %resource,
        "Gateway verified caller"
    );
    Ok(resolved.identity)
}

/// Route layer for gateway-local endpoints that need a caller
pub async fn require_gateway_identity(
    State(state): State<Arc<GatewayState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let resource = request.uri().path().to_string();
    let identity = authenticate(&state, request.headers_mut(), &resource)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
