//! Role model - the closed set of platform roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Platform roles, most privileged first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RoleName {
    SuperAdmin,
    Admin,
    SubAdmin,
    Instructor,
    Student,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl RoleName {
    pub const ALL: [RoleName; 5] = [
        RoleName::SuperAdmin,
        RoleName::Admin,
        RoleName::SubAdmin,
        RoleName::Instructor,
        RoleName::Student,
    ];

    /// Canonical wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "superAdmin",
            RoleName::Admin => "admin",
            RoleName::SubAdmin => "subAdmin",
            RoleName::Instructor => "instructor",
            RoleName::Student => "student",
        }
    }

    /// Canonicalize a role string from any ingress point.
    ///
    /// Legacy spellings resolve to their canonical role, so nothing past
    /// this function ever sees an alias.
    pub fn parse(raw: &str) -> Result<Self, UnknownRole> {
        match raw.trim() {
            "superAdmin" | "super_admin" | "superadmin" => Ok(RoleName::SuperAdmin),
            "admin" => Ok(RoleName::Admin),
            "subAdmin" | "sub_admin" | "subadmin" => Ok(RoleName::SubAdmin),
            "instructor" | "teacher" => Ok(RoleName::Instructor),
            "student" => Ok(RoleName::Student),
            other => Err(UnknownRole(other.to_string())),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            RoleName::SuperAdmin => "Super Admin",
            RoleName::Admin => "Admin",
            RoleName::SubAdmin => "Sub Admin",
            RoleName::Instructor => "Instructor",
            RoleName::Student => "Student",
        }
    }
}

impl FromStr for RoleName {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::parse(s)
    }
}

impl TryFrom<String> for RoleName {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoleName::parse(&value)
    }
}

impl From<RoleName> for String {
    fn from(role: RoleName) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
