/// Identity middleware for protecting routes
///
/// Resolves the caller with [`IdentityResolver`] and adds the [`Identity`]
/// to request extensions. Handlers take it with `Extension<Identity>`.
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use tourbook_api::auth::middleware::require_identity;
///
/// let app = Router::new()
///     .route("/api/v1/tour/:id", get(get_tour))
///     .route_layer(middleware::from_fn_with_state(resolver, require_identity));
/// ```
use super::identity::{AccessPolicy, IdentityError, IdentityResolver};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tourbook_core::Identity;

/// Audit a failed resolution and convert it to an HTTP error
pub fn reject(err: IdentityError, headers: &HeaderMap, resource: &str) -> AppError {
    let ctx = AuditContext::from_headers(headers);
    match &err {
        IdentityError::UntrustedHeaders(reason) => {
            audit_log(&AuditEvent::IdentityHeaderRejected {
                resource: resource.to_string(),
                reason: reason.clone(),
                ip_address: ctx.ip_address,
            });
        }
        IdentityError::MissingToken | IdentityError::InvalidToken(_) => {
            audit_log(&AuditEvent::InvalidToken {
                resource: resource.to_string(),
                reason: match &err {
                    IdentityError::InvalidToken(source) => source.to_string(),
                    other => other.to_string(),
                },
                ip_address: ctx.ip_address,
                user_agent: ctx.user_agent,
            });
        }
        IdentityError::Forbidden(_) => {}
    }
    AppError::from(err)
}

/// Check `policy` for `identity`, auditing any denial
pub fn authorize(
    identity: &Identity,
    policy: AccessPolicy<'_>,
    headers: &HeaderMap,
    resource: &str,
) -> Result<(), AppError> {
    policy.check(identity).map_err(|err| {
        let ctx = AuditContext::from_headers(headers);
        audit_log(&AuditEvent::AccessDenied {
            user_id: Some(identity.subject_id.clone()),
            resource: resource.to_string(),
            required_role: policy.required_role().map(str::to_string),
            ip_address: ctx.ip_address,
            user_agent: ctx.user_agent,
        });
        AppError::from(err)
    })
}

async fn guard(
    resolver: &IdentityResolver,
    policy: AccessPolicy<'_>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let resource = request.uri().path().to_string();
    let resolved = resolver
        .resolve(request.headers())
        .map_err(|err| reject(err, request.headers(), &resource))?;

    authorize(&resolved.identity, policy, request.headers(), &resource)?;

    tracing::debug!(
        subject_id = %resolved.identity.subject_id,
        source = ?resolved.source,
        "Caller identified"
    );
    request.extensions_mut().insert(resolved.identity);

    Ok(next.run(request).await)
}

/// Require any authenticated caller (USER or ADMIN)
pub async fn require_identity(
    State(resolver): State<IdentityResolver>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&resolver, AccessPolicy::Authenticated, request, next).await
}

/// Require an ADMIN caller
pub async fn require_admin(
    State(resolver): State<IdentityResolver>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&resolver, AccessPolicy::AdminOnly, request, next).await
}

/// Attach the identity when one resolves; never rejects
pub async fn optional_identity(
    State(resolver): State<IdentityResolver>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Ok(resolved) = resolver.resolve(request.headers()) {
        request.extensions_mut().insert(resolved.identity);
    }
    next.run(request).await
}
