use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The closed set of roles an identity can hold. Page access rules are written
/// in terms of these variants only; the profile store persists them as the
/// lowercase strings produced by `as_str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Student,
    Parent,
    Teacher,
    Director,
    Superadmin,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Student,
        Role::Parent,
        Role::Teacher,
        Role::Director,
        Role::Superadmin,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Director => "director",
            Role::Superadmin => "superadmin",
        }
    }

    /// Staff roles run classes: grading, attendance and class rosters.
    pub const fn is_staff(self) -> bool {
        match self {
            Role::Teacher | Role::Director | Role::Superadmin => true,
            Role::Student | Role::Parent => false,
        }
    }

    /// Administrative roles manage users, the academic year and school settings.
    pub const fn is_administrative(self) -> bool {
        match self {
            Role::Director | Role::Superadmin => true,
            Role::Student | Role::Parent | Role::Teacher => false,
        }
    }

    const fn bit(self) -> u8 {
        match self {
            Role::Student => 1 << 0,
            Role::Parent => 1 << 1,
            Role::Teacher => 1 << 2,
            Role::Director => 1 << 3,
            Role::Superadmin => 1 << 4,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "parent" => Ok(Role::Parent),
            "teacher" => Ok(Role::Teacher),
            "director" => Ok(Role::Director),
            "superadmin" => Ok(Role::Superadmin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// RoleSet
///
/// A set of roles packed into a bitmask. An empty set carries no restriction of
/// its own: the guard reads it as "any authenticated identity".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet(0);

    /// Teacher, director and superadmin.
    pub const STAFF: RoleSet = RoleSet::of(&[Role::Teacher, Role::Director, Role::Superadmin]);

    /// Director and superadmin.
    pub const ADMINISTRATIVE: RoleSet = RoleSet::of(&[Role::Director, Role::Superadmin]);

    pub const fn of(roles: &[Role]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < roles.len() {
            bits |= roles[i].bit();
            i += 1;
        }
        RoleSet(bits)
    }

    pub const fn contains(self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn with(self, role: Role) -> Self {
        RoleSet(self.0 | role.bit())
    }

    pub fn iter(self) -> impl Iterator<Item = Role> {
        Role::ALL.into_iter().filter(move |role| self.contains(*role))
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl fmt::Debug for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        iter.into_iter().fold(RoleSet::EMPTY, RoleSet::with)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_from_their_stored_form() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert_eq!(" Director ".parse::<Role>(), Ok(Role::Director));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn capability_predicates_agree_with_named_sets() {
        for role in Role::ALL {
            assert_eq!(role.is_staff(), RoleSet::STAFF.contains(role));
            assert_eq!(role.is_administrative(), RoleSet::ADMINISTRATIVE.contains(role));
        }
    }

    #[test]
    fn role_set_membership() {
        let set: RoleSet = [Role::Student, Role::Parent].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.contains(Role::Parent));
        assert!(!set.contains(Role::Teacher));
        assert!(RoleSet::EMPTY.is_empty());
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Role::Student, Role::Parent]);
    }
}
