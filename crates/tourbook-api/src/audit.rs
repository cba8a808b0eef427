//! Security audit logging for authentication events
//!
//! Structured audit records for logins, logouts, token refreshes,
//! registrations, access control failures and remote verification outages.
//!
//! All audit events are logged at INFO level with the "audit" target,
//! making them easy to filter and route to security monitoring systems.
//! Reasons that are hidden from clients (why a login failed, why an identity
//! header was refused) are recorded here and nowhere else.
//!
//! # Example
//!
//! ```ignore
//! use tourbook_api::audit::{audit_log, AuditContext, AuditEvent};
//!
//! let ctx = AuditContext::from_headers(&headers);
//! audit_log(&AuditEvent::LoginFailure {
//!     username: "alice".to_string(),
//!     reason: "wrong password".to_string(),
//!     ip_address: ctx.ip_address,
//!     user_agent: ctx.user_agent,
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::HeaderMap;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful login
    LoginSuccess {
        user_id: String,
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login; the client only ever sees "Invalid credentials"
    LoginFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Refresh token cleared
    Logout {
        user_id: String,
        ip_address: Option<String>,
    },

    /// New access token issued from a refresh token
    TokenRefresh {
        user_id: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Refresh token presented but not accepted
    RefreshRejected {
        user_id: Option<String>,
        reason: String,
        ip_address: Option<String>,
    },

    /// Successful user registration
    RegistrationSuccess {
        user_id: String,
        email: String,
        role: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Role or status changed by an admin
    AccountUpdated {
        user_id: String,
        updated_by: String,
        role: Option<String>,
        status: Option<String>,
    },

    /// Access denied due to insufficient role or ownership
    AccessDenied {
        user_id: Option<String>,
        resource: String,
        required_role: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Missing, invalid or expired token
    InvalidToken {
        resource: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Identity headers present but not trusted (bad signature, stale
    /// timestamp, unknown role)
    IdentityHeaderRejected {
        resource: String,
        reason: String,
        ip_address: Option<String>,
    },

    /// A remote existence check could not be completed
    RemoteVerificationUnavailable {
        service: String,
        resource_id: String,
        reason: String,
    },
}

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditContext {
    /// Client IP address (extracted from request headers)
    pub ip_address: Option<String>,
    /// User agent string (extracted from request headers)
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is also serialized to JSON in the `event` field for log
/// aggregators.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            user_id,
            username,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                username = %username,
                ip_address = ?ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            username,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "Login failed"
            );
        }
        AuditEvent::Logout {
            user_id,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                ip_address = ?ip_address,
                "User logout"
            );
        }
        AuditEvent::TokenRefresh {
            user_id,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                ip_address = ?ip_address,
                "Token refresh"
            );
        }
        AuditEvent::RefreshRejected {
            user_id,
            reason,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                reason = %reason,
                ip_address = ?ip_address,
                "Token refresh rejected"
            );
        }
        AuditEvent::RegistrationSuccess {
            user_id,
            email,
            role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                email = %email,
                role = %role,
                ip_address = ?ip_address,
                "Registration successful"
            );
        }
        AuditEvent::RegistrationFailure {
            email,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = ?ip_address,
                "Registration failed"
            );
        }
        AuditEvent::AccountUpdated {
            user_id,
            updated_by,
            role,
            status,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = %user_id,
                updated_by = %updated_by,
                role = ?role,
                status = ?status,
                "Account updated"
            );
        }
        AuditEvent::AccessDenied {
            user_id,
            resource,
            required_role,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                user_id = ?user_id,
                resource = %resource,
                required_role = ?required_role,
                ip_address = ?ip_address,
                "Access denied"
            );
        }
        AuditEvent::InvalidToken {
            resource,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                resource = %resource,
                reason = %reason,
                ip_address = ?ip_address,
                "Invalid token"
            );
        }
        AuditEvent::IdentityHeaderRejected {
            resource,
            reason,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                resource = %resource,
                reason = %reason,
                ip_address = ?ip_address,
                "Identity headers rejected"
            );
        }
        AuditEvent::RemoteVerificationUnavailable {
            service,
            resource_id,
            reason,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                service = %service,
                resource_id = %resource_id,
                reason = %reason,
                "Remote verification unavailable"
            );
        }
    }
}

/// Extract IP address from request headers
///
/// Checks X-Forwarded-For, then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    // Take the first IP in the chain (client IP)
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                return Some(first_ip.trim().to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            return Some(ip_str.to_string());
        }
    }

    None
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
