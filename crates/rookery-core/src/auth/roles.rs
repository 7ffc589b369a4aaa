//! Role normalization and the static role/permission table.
//!
//! The backend hands us a free-form role label on the principal. Everything
//! downstream works with the normalized [`Role`], re-derived from the raw
//! label on every query so a server-side role change takes effect on the
//! next profile fetch without any invalidation here.

use serde::{Deserialize, Serialize};

/// Labels that grant the administrator role, compared case-insensitively.
const SUPERADMIN_LABELS: [&str; 2] = ["superadmin", "admin"];

/// Normalized role for a signed-in principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Operator,
}

impl Role {
    /// Map a raw role label to a normalized role.
    ///
    /// Total over all inputs: anything that is not a recognized
    /// administrator label resolves to the lowest-privilege role, never to
    /// an error. Unknown labels therefore cannot escalate.
    pub fn normalize(raw: &str) -> Role {
        if SUPERADMIN_LABELS.iter().any(|l| raw.eq_ignore_ascii_case(l)) {
            Role::Superadmin
        } else {
            Role::Operator
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Operator => "operator",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tags checked at the console's decision points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    UserView,
    UserBan,
    ReportResolve,
    ContentRemove,
    SettingsManage,
    OperatorManage,
}

impl Permission {
    /// Every permission known to the system. The superadmin grant is defined
    /// as this array, so adding a variant here is the whole change.
    pub const ALL: [Permission; 6] = [
        Permission::UserView,
        Permission::UserBan,
        Permission::ReportResolve,
        Permission::ContentRemove,
        Permission::SettingsManage,
        Permission::OperatorManage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UserView => "user:view",
            Permission::UserBan => "user:ban",
            Permission::ReportResolve => "report:resolve",
            Permission::ContentRemove => "content:remove",
            Permission::SettingsManage => "settings:manage",
            Permission::OperatorManage => "operator:manage",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Day-to-day moderation capabilities granted to operators.
const OPERATOR_PERMISSIONS: &[Permission] = &[
    Permission::UserView,
    Permission::UserBan,
    Permission::ReportResolve,
    Permission::ContentRemove,
];

/// Static role to permission mapping.
///
/// Superadmin is the full permission universe by construction, not a second
/// list that could drift out of sync.
pub fn permissions_of(role: Role) -> &'static [Permission] {
    match role {
        Role::Superadmin => &Permission::ALL,
        Role::Operator => OPERATOR_PERMISSIONS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_superadmin_labels() {
        for raw in ["superadmin", "SuperAdmin", "SUPERADMIN", "admin", "Admin", "ADMIN"] {
            assert_eq!(Role::normalize(raw), Role::Superadmin, "label: {raw:?}");
        }
    }

    #[test]
    fn test_normalize_everything_else_to_operator() {
        // Includes surrounding whitespace: labels are not trimmed, so a
        // padded "admin " is unrecognized and demotes rather than escalates.
        for raw in ["", "operator", "mod", "moderator", "root", "superuser", "admin ", " admin"] {
            assert_eq!(Role::normalize(raw), Role::Operator, "label: {raw:?}");
        }
    }

    #[test]
    fn test_superadmin_holds_every_permission() {
        let granted = permissions_of(Role::Superadmin);
        assert_eq!(granted, &Permission::ALL[..]);
        for p in Permission::ALL {
            assert!(granted.contains(&p), "missing {p}");
        }
    }

    #[test]
    fn test_operator_is_a_strict_subset() {
        let granted = permissions_of(Role::Operator);
        for p in granted {
            assert!(Permission::ALL.contains(p), "unknown permission {p}");
        }
        assert!(granted.len() < Permission::ALL.len());
        assert!(granted.contains(&Permission::UserBan));
        assert!(!granted.contains(&Permission::SettingsManage));
        assert!(!granted.contains(&Permission::OperatorManage));
    }

    #[test]
    fn test_permission_tags_are_stable() {
        assert_eq!(Permission::UserBan.as_str(), "user:ban");
        assert_eq!(Permission::SettingsManage.as_str(), "settings:manage");
        assert_eq!(Role::Superadmin.to_string(), "superadmin");
    }
}
