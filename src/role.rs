use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    pub fn permits(self, allowed: &[Role]) -> bool {
        allowed.contains(&self)
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Instructor => write!(f, "instructor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A set of roles allowed through an [`Authorized`](crate::resp::jwt::Authorized) guard.
pub trait RoleSet: Send + Sync + 'static {
    const ROLES: &'static [Role];
}

#[derive(Debug)]
pub struct AdminOnly;

impl RoleSet for AdminOnly {
    const ROLES: &'static [Role] = &[Role::Admin];
}

#[derive(Debug)]
pub struct InstructorOnly;

impl RoleSet for InstructorOnly {
    const ROLES: &'static [Role] = &[Role::Instructor];
}

/// Instructors and admins.
#[derive(Debug)]
pub struct Staff;

impl RoleSet for Staff {
    const ROLES: &'static [Role] = &[Role::Instructor, Role::Admin];
}
