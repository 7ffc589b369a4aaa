//! Synchronous capability checks over the current session.
//!
//! Every gated action and hidden control in the console funnels through
//! [`AccessControl::has_permission`]. The check reads the store and
//! re-normalizes the raw role on each call, so it is always consistent with
//! the latest profile fetch and needs no cache invalidation.

use std::sync::Arc;

use super::roles::{permissions_of, Permission, Role};
use super::store::TokenStore;

/// Capability oracle bound to a token store.
/// Clone is cheap - the store is a shared handle.
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<TokenStore>,
}

impl AccessControl {
    pub fn new(store: Arc<TokenStore>) -> Self {
        Self { store }
    }

    /// Normalized role of the current principal, or `None` when nobody is
    /// signed in.
    pub fn current_role(&self) -> Option<Role> {
        self.store.principal().map(|p| Role::normalize(&p.role))
    }

    /// Whether the current principal holds `permission`.
    ///
    /// Always false with no principal; never an error. Cheap enough to call
    /// from render paths.
    pub fn has_permission(&self, permission: Permission) -> bool {
        match self.current_role() {
            Some(role) => permissions_of(role).contains(&permission),
            None => false,
        }
    }
}
