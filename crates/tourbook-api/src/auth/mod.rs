//! Authentication and authorization module
//!
//! - Token issuing and verification (separate access and refresh secrets)
//! - Password hashing with Argon2
//! - Session cookies
//! - Caller identity resolution and role gates
//! - Authentication service and credential storage

pub mod cookies;
pub mod identity;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;

pub use identity::{AccessPolicy, IdentityError, IdentityResolver, IdentitySource, ResolvedIdentity};
pub use jwt::{Claims, TokenError, TokenKind, TokenPair, TokenService};
pub use middleware::{authorize, optional_identity, require_admin, require_identity};
pub use models::{
    CredentialRecord, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    RegisterRequest, UpdateAccountRequest, UserView,
};
pub use repository::{CredentialStore, InMemoryCredentialStore, PgCredentialStore, StoreError};
pub use service::{AuthError, AuthService, LoginOutcome};
