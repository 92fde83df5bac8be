// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Role Hierarchy
///
/// - `Admin` - Catalog management, all orders and payments, account administration
/// - `Customer` - Normal shopper, can only access own orders and payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Registered shopper
    Customer,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::Customer, Role::Customer) => true,
            _ => false,
        }
    }
}

impl Default for Role {
    /// Newly registered accounts are customers.
    fn default() -> Self {
        Role::Customer
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Customer => write!(f, "customer"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_all_privileges() {
        assert!(Role::Admin.has_privilege(Role::Admin));
        assert!(Role::Admin.has_privilege(Role::Customer));
    }

    #[test]
    fn customer_only_has_customer_privilege() {
        assert!(!Role::Customer.has_privilege(Role::Admin));
        assert!(Role::Customer.has_privilege(Role::Customer));
    }

    #[test]
    fn default_role_is_customer() {
        assert_eq!(Role::default(), Role::Customer);
        assert_eq!(Role::Customer.to_string(), "customer");
    }
}
