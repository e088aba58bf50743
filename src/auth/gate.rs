//! Allow/deny decisions for owner and admin requirements.

use super::{Identity, Role};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement { Owner, Admin, OwnerOrAdmin }

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision { Allow, Deny }

impl Decision {
    pub fn is_allowed(self) -> bool { self == Self::Allow }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self { if allowed { Self::Allow } else { Self::Deny } }
}

/// Decides whether `identity` satisfies `requirement` for a resource owned by
/// `owner_id`. Guest resources (no owner) can only be reached by admins.
pub fn authorize(identity: Option<&Identity>, owner_id: Option<&str>, requirement: Requirement) -> Decision {
    let Some(identity) = identity else { return Decision::Deny };
    let is_admin = identity.role == Role::Admin;
    let is_owner = owner_id.is_some_and(|owner| owner == identity.subject_id);
    let allowed = match requirement {
        Requirement::Admin => is_admin,
        Requirement::Owner => is_owner,
        Requirement::OwnerOrAdmin => is_owner || is_admin,
    };
    allowed.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Role) -> Identity {
        Identity { subject_id: id.into(), email: format!("{id}@example.com"), role }
    }

    #[test]
    fn test_no_identity_is_always_denied() {
        for req in [Requirement::Owner, Requirement::Admin, Requirement::OwnerOrAdmin] {
            assert_eq!(authorize(None, Some("u1"), req), Decision::Deny);
            assert_eq!(authorize(None, None, req), Decision::Deny);
        }
    }

    #[test]
    fn test_user_never_passes_admin() {
        let u = user("u1", Role::User);
        assert_eq!(authorize(Some(&u), Some("u1"), Requirement::Admin), Decision::Deny);
        assert_eq!(authorize(Some(&u), None, Requirement::Admin), Decision::Deny);
    }

    #[test]
    fn test_owner_matches_subject() {
        let u = user("u1", Role::User);
        assert!(authorize(Some(&u), Some(u.subject_id.as_str()), Requirement::Owner).is_allowed());
        assert!(authorize(Some(&u), Some("u1"), Requirement::OwnerOrAdmin).is_allowed());
        assert_eq!(authorize(Some(&u), Some("u2"), Requirement::OwnerOrAdmin), Decision::Deny);
        assert_eq!(authorize(Some(&u), None, Requirement::Owner), Decision::Deny);
    }

    #[test]
    fn test_admin_is_not_implicitly_owner() {
        let a = user("a1", Role::Admin);
        assert_eq!(authorize(Some(&a), Some("u1"), Requirement::Owner), Decision::Deny);
        assert!(authorize(Some(&a), Some("u1"), Requirement::OwnerOrAdmin).is_allowed());
        assert!(authorize(Some(&a), None, Requirement::Admin).is_allowed());
        // admins own their own resources like anyone else
        assert!(authorize(Some(&a), Some("a1"), Requirement::Owner).is_allowed());
    }
}
