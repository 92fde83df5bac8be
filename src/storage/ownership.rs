// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for account-scoped documents.
//!
//! Orders and payments belong to the account that created them. Every
//! read or mutation of one of those documents passes through
//! [`OwnershipEnforcer`]; admins are entitled to everything.

use crate::auth::{AuthenticatedUser, Role};

use super::{StorageError, StorageResult};

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Get the owner's account ID.
    fn owner_user_id(&self) -> &str;

    /// Human-readable resource kind used in denial messages.
    fn resource_kind(&self) -> &'static str {
        "resource"
    }
}

/// Trait for enforcing ownership on storage operations.
pub trait OwnershipEnforcer {
    /// Verify that the user owns this resource or is an admin.
    ///
    /// # Errors
    /// Returns `StorageError::PermissionDenied` otherwise.
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StorageResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StorageResult<()> {
        if self.owner_user_id() == user.user_id || user.role.has_privilege(Role::Admin) {
            Ok(())
        } else {
            Err(StorageError::PermissionDenied {
                user_id: user.user_id.clone(),
                resource: self.resource_kind().to_string(),
            })
        }
    }
}

/// Ownership check chained onto a repository lookup.
///
/// ```rust,ignore
/// let order = OrderRepository::new(storage).get(&id).verify_owner(&user)?;
/// ```
pub trait OwnershipCheck<T> {
    /// Verify ownership and return the resource if authorized.
    fn verify_owner(self, user: &AuthenticatedUser) -> StorageResult<T>;
}

impl<T: OwnedResource> OwnershipCheck<T> for StorageResult<T> {
    fn verify_owner(self, user: &AuthenticatedUser) -> StorageResult<T> {
        let resource = self?;
        resource.verify_ownership(user)?;
        Ok(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestResource {
        owner: String,
    }

    impl OwnedResource for TestResource {
        fn owner_user_id(&self) -> &str {
            &self.owner
        }

        fn resource_kind(&self) -> &'static str {
            "order"
        }
    }

    fn make_user(user_id: &str, role: Role) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: user_id.to_string(),
            name: "Test".to_string(),
            role,
            expires_at: 0,
        }
    }

    fn resource() -> TestResource {
        TestResource {
            owner: "user_123".to_string(),
        }
    }

    #[test]
    fn ownership_verification_passes_for_owner() {
        let user = make_user("user_123", Role::Customer);
        assert!(resource().verify_ownership(&user).is_ok());
    }

    #[test]
    fn ownership_verification_fails_for_non_owner() {
        let user = make_user("user_456", Role::Customer);

        let result = resource().verify_ownership(&user);
        assert!(matches!(
            result,
            Err(StorageError::PermissionDenied { ref resource, .. }) if resource == "order"
        ));
    }

    #[test]
    fn admins_pass_ownership_checks() {
        let admin = make_user("admin_1", Role::Admin);
        assert!(resource().verify_ownership(&admin).is_ok());
    }

    #[test]
    fn ownership_check_on_result_propagates_lookup_errors() {
        let user = make_user("user_123", Role::Customer);

        let found: StorageResult<TestResource> = Ok(resource());
        assert!(found.verify_owner(&user).is_ok());

        let missing: StorageResult<TestResource> = Err(StorageError::NotFound("Order".to_string()));
        assert!(matches!(missing.verify_owner(&user), Err(StorageError::NotFound(_))));
    }
}
