//! Session, credential, and access-control machinery.
//!
//! This module provides:
//! - `TokenStore`: single owner of the token pair and principal, persisted
//!   through a pluggable `SessionStorage` backend
//! - `RenewalCoordinator`: single-flight credential renewal
//! - `AccessControl`: role normalization and permission checks
//! - `SessionMonitor`: the sign-out broadcast navigation code subscribes to

pub mod access;
pub mod principal;
pub mod renewal;
pub mod roles;
pub mod session;
pub mod storage;
pub mod store;

pub use access::AccessControl;
pub use principal::Principal;
pub use renewal::{RenewalCoordinator, RenewalError};
pub use roles::{permissions_of, Permission, Role};
pub use session::{SessionMonitor, SessionState};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageError};
pub use store::{PersistedSession, TokenPair, TokenStore};
