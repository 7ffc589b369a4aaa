//! Core library for Rookery, an operations console for hosted community
//! platforms.
//!
//! Everything here serves the authenticated request pipeline:
//!
//! - [`api::ApiClient`] sends requests with the session credential attached,
//!   retries transient failures on idempotent requests, and recovers from
//!   credential expiry by renewing the session once and replaying the
//!   request.
//! - [`auth::RenewalCoordinator`] collapses concurrent renewals into a
//!   single exchange shared by every waiting request.
//! - [`auth::TokenStore`] owns the access/refresh pair and the signed-in
//!   principal, persisted through a pluggable [`auth::SessionStorage`].
//! - [`auth::AccessControl`] answers synchronous role/permission checks for
//!   UI gating.
//! - [`auth::SessionMonitor`] broadcasts sign-out so navigation can react.
//!
//! Rendering and business workflows live in the console binaries; they
//! consume this crate through the client and the monitor.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse};
pub use auth::{
    AccessControl, Permission, Principal, Role, SessionState, TokenPair, TokenStore,
};
pub use config::Config;
