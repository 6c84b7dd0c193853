//! Role evaluator
//!
//! Pure functions deciding whether a user satisfies a role requirement.
//! No user means no access.

use crate::models::User;
use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "Administrador";
pub const ROLE_TECHNICIAN: &str = "Tecnico";
pub const ROLE_END_USER: &str = "Usuario Final";

/// Identity of a role: a stable id when known, plus its display name.
///
/// Two keys with ids compare by id, so renaming a role in the backend
/// does not change who passes a check. Without ids on both sides the
/// names must match exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleKey {
    pub id: Option<i64>,
    pub name: String,
}

impl RoleKey {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    pub fn with_id(id: i64, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
        }
    }

    pub fn matches(&self, other: &RoleKey) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name == other.name,
        }
    }
}

/// Roles allowed through a gate
#[derive(Debug, Clone)]
pub enum RoleRequirement {
    Single(RoleKey),
    AnyOf(Vec<RoleKey>),
}

impl RoleRequirement {
    pub fn role(name: &str) -> Self {
        RoleRequirement::Single(RoleKey::named(name))
    }

    pub fn any_of(names: &[&str]) -> Self {
        RoleRequirement::AnyOf(names.iter().map(|name| RoleKey::named(*name)).collect())
    }

    pub fn is_satisfied_by(&self, role: &RoleKey) -> bool {
        match self {
            RoleRequirement::Single(required) => required.matches(role),
            RoleRequirement::AnyOf(allowed) => allowed.iter().any(|key| key.matches(role)),
        }
    }
}

/// True when a user is present and their role satisfies the requirement
pub fn has_role(user: Option<&User>, requirement: &RoleRequirement) -> bool {
    match user {
        Some(user) => requirement.is_satisfied_by(&user.role_key()),
        None => false,
    }
}

pub fn is_admin(user: Option<&User>) -> bool {
    has_role(user, &RoleRequirement::role(ROLE_ADMIN))
}

pub fn is_technician(user: Option<&User>) -> bool {
    has_role(user, &RoleRequirement::role(ROLE_TECHNICIAN))
}

pub fn is_end_user(user: Option<&User>) -> bool {
    has_role(user, &RoleRequirement::role(ROLE_END_USER))
}

/// Outcome of an access check against a session that may still be loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Session not loaded yet; callers must not render or redirect
    Pending,
    Allowed,
    Denied,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str, role_id: Option<i64>) -> User {
        User {
            id: 1,
            email: "u@mefasa.com".to_string(),
            name: "U".to_string(),
            role: role.to_string(),
            role_id,
            floor_id: None,
            area_id: None,
            two_factor_enabled: false,
            created_at: None,
        }
    }

    #[test]
    fn test_no_user_is_always_denied() {
        let requirements = [
            RoleRequirement::role(ROLE_ADMIN),
            RoleRequirement::any_of(&[ROLE_ADMIN, ROLE_TECHNICIAN, ROLE_END_USER]),
            RoleRequirement::AnyOf(Vec::new()),
        ];
        for requirement in &requirements {
            assert!(!has_role(None, requirement));
        }
    }

    #[test]
    fn test_single_requirement_is_equality() {
        let tech = user(ROLE_TECHNICIAN, None);
        assert!(has_role(Some(&tech), &RoleRequirement::role(ROLE_TECHNICIAN)));
        assert!(!has_role(Some(&tech), &RoleRequirement::role(ROLE_ADMIN)));
        // Exact comparison, no case folding
        assert!(!has_role(Some(&tech), &RoleRequirement::role("tecnico")));
    }

    #[test]
    fn test_set_requirement_is_membership() {
        let staff = RoleRequirement::any_of(&[ROLE_ADMIN, ROLE_TECHNICIAN]);
        assert!(has_role(Some(&user(ROLE_ADMIN, None)), &staff));
        assert!(has_role(Some(&user(ROLE_TECHNICIAN, None)), &staff));
        assert!(!has_role(Some(&user(ROLE_END_USER, None)), &staff));
        assert!(!has_role(
            Some(&user(ROLE_ADMIN, None)),
            &RoleRequirement::AnyOf(Vec::new())
        ));
    }

    #[test]
    fn test_ids_take_precedence_over_names() {
        let renamed = user("Admin Global", Some(1));
        let requirement = RoleRequirement::Single(RoleKey::with_id(1, ROLE_ADMIN));
        assert!(has_role(Some(&renamed), &requirement));

        let impostor = user(ROLE_ADMIN, Some(3));
        assert!(!has_role(Some(&impostor), &requirement));
    }

    #[test]
    fn test_convenience_flags() {
        let admin = user(ROLE_ADMIN, None);
        assert!(is_admin(Some(&admin)));
        assert!(!is_technician(Some(&admin)));
        assert!(!is_end_user(Some(&admin)));
        assert!(!is_admin(None));
    }
}
