//! Caller classification and row scoping.
//!
//! Every booking and customer operation receives an [`Identity`] and derives
//! a [`Scope`] from it before touching storage, so customers only ever read
//! their own rows.

use crate::model::{Role, UserId};

/// Who is calling. The administrator is not a stored user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Identity {
    Admin,
    Customer(UserId),
}

impl Identity {
    pub fn role(&self) -> Role {
        match self {
            Identity::Admin => Role::Admin,
            Identity::Customer(_) => Role::Customer,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Identity::Admin => None,
            Identity::Customer(id) => Some(*id),
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Identity::Admin => Scope::All,
            Identity::Customer(id) => Scope::Owner(*id),
        }
    }
}

/// Which rows a caller may see or change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Owner(UserId),
}

impl Scope {
    /// Whether a row owned by `owner` is inside the scope. House rows
    /// (`owner == None`) are visible to the administrator only.
    pub fn permits(&self, owner: Option<UserId>) -> bool {
        match self {
            Scope::All => true,
            Scope::Owner(id) => owner == Some(*id),
        }
    }
}

/// Authenticated, but not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminRequired;

impl std::fmt::Display for AdminRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "admin access required")
    }
}

impl std::error::Error for AdminRequired {}

pub fn require_admin(identity: &Identity) -> Result<(), AdminRequired> {
    match identity {
        Identity::Admin => Ok(()),
        Identity::Customer(_) => Err(AdminRequired),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn admin_sees_everything() {
        let scope = Identity::Admin.scope();
        assert!(scope.permits(Some(Ulid::new())));
        assert!(scope.permits(None));
    }

    #[test]
    fn customer_sees_own_rows_only() {
        let me = Ulid::new();
        let scope = Identity::Customer(me).scope();
        assert!(scope.permits(Some(me)));
        assert!(!scope.permits(Some(Ulid::new())));
        assert!(!scope.permits(None));
    }

    #[test]
    fn require_admin_by_variant() {
        tokio_test::assert_ok!(require_admin(&Identity::Admin));
        let denied = tokio_test::assert_err!(require_admin(&Identity::Customer(Ulid::new())));
        assert_eq!(denied, AdminRequired);
    }

    #[test]
    fn roles_follow_identity() {
        let id = Ulid::new();
        assert_eq!(Identity::Admin.role(), Role::Admin);
        assert_eq!(Identity::Customer(id).role(), Role::Customer);
        assert_eq!(Identity::Customer(id).user_id(), Some(id));
        assert_eq!(Identity::Admin.user_id(), None);
    }
}
