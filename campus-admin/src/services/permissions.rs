//! Role and permission rules.
//!
//! Pure functions over the closed role set. Every table is an exhaustive
//! `match` so a new role cannot be added without deciding its grants.

use std::fmt;
use std::str::FromStr;

use crate::models::RoleName;

/// Console features gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Dashboard,
    Courses,
    ManageCourses,
    CreatorDashboard,
    LiveClasses,
    Analytics,
    ManageUsers,
    Invitations,
    OrganizationSettings,
    Billing,
    PlatformAdmin,
}

impl Feature {
    pub const ALL: [Feature; 11] = [
        Feature::Dashboard,
        Feature::Courses,
        Feature::ManageCourses,
        Feature::CreatorDashboard,
        Feature::LiveClasses,
        Feature::Analytics,
        Feature::ManageUsers,
        Feature::Invitations,
        Feature::OrganizationSettings,
        Feature::Billing,
        Feature::PlatformAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Dashboard => "dashboard",
            Feature::Courses => "courses",
            Feature::ManageCourses => "manageCourses",
            Feature::CreatorDashboard => "creatorDashboard",
            Feature::LiveClasses => "liveClasses",
            Feature::Analytics => "analytics",
            Feature::ManageUsers => "manageUsers",
            Feature::Invitations => "invitations",
            Feature::OrganizationSettings => "organizationSettings",
            Feature::Billing => "billing",
            Feature::PlatformAdmin => "platformAdmin",
        }
    }

    fn allowed_roles(&self) -> &'static [RoleName] {
        use RoleName::*;
        match self {
            Feature::Dashboard | Feature::Courses | Feature::LiveClasses => {
                &[SuperAdmin, Admin, SubAdmin, Instructor, Student]
            }
            Feature::ManageCourses | Feature::CreatorDashboard | Feature::Analytics => {
                &[SuperAdmin, Admin, SubAdmin, Instructor]
            }
            Feature::ManageUsers => &[SuperAdmin, Admin, SubAdmin],
            Feature::Invitations => &[SuperAdmin, Admin, SubAdmin, Instructor],
            Feature::OrganizationSettings | Feature::Billing => &[SuperAdmin, Admin],
            Feature::PlatformAdmin => &[SuperAdmin],
        }
    }
}

impl FromStr for Feature {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in the role hierarchy; larger is more privileged.
pub fn hierarchy_level(role: RoleName) -> u8 {
    match role {
        RoleName::SuperAdmin => 5,
        RoleName::Admin => 4,
        RoleName::SubAdmin => 3,
        RoleName::Instructor => 2,
        RoleName::Student => 1,
    }
}

pub fn has_min_role(current: RoleName, min: RoleName) -> bool {
    hierarchy_level(current) >= hierarchy_level(min)
}

/// Whether `current` may edit, suspend or reassign users holding `target`.
pub fn can_manage_role(current: RoleName, target: RoleName) -> bool {
    use RoleName::*;
    match current {
        SuperAdmin => matches!(target, Admin | SubAdmin | Instructor | Student),
        Admin => matches!(target, SubAdmin | Instructor | Student),
        SubAdmin => matches!(target, Instructor | Student),
        Instructor | Student => false,
    }
}

/// Whether `current` may issue invitations for `role_to_invite`.
///
/// Independent of [`can_manage_role`]: instructors enrol students by
/// invitation without gaining any management rights over them.
pub fn can_invite(current: RoleName, role_to_invite: RoleName) -> bool {
    use RoleName::*;
    match current {
        SuperAdmin => matches!(role_to_invite, Admin | SubAdmin | Instructor | Student),
        Admin => matches!(role_to_invite, SubAdmin | Instructor | Student),
        SubAdmin => matches!(role_to_invite, Instructor | Student),
        Instructor => matches!(role_to_invite, Student),
        Student => false,
    }
}

pub fn can_access_feature(current: RoleName, feature: Feature) -> bool {
    feature.allowed_roles().contains(&current)
}

/// Look up a feature by name. Unknown names are denied.
pub fn can_access(current: RoleName, feature_name: &str) -> bool {
    feature_name
        .parse::<Feature>()
        .map(|feature| can_access_feature(current, feature))
        .unwrap_or(false)
}

/// Roles `current` may invite, most privileged first.
pub fn invitable_roles(current: RoleName) -> Vec<RoleName> {
    RoleName::ALL
        .into_iter()
        .filter(|target| can_invite(current, *target))
        .collect()
}

/// Roles `current` may manage, most privileged first.
pub fn manageable_roles(current: RoleName) -> Vec<RoleName> {
    RoleName::ALL
        .into_iter()
        .filter(|target| can_manage_role(current, *target))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use RoleName::*;

    #[test]
    fn test_hierarchy_is_strictly_ordered() {
        let levels: Vec<u8> = RoleName::ALL.into_iter().map(hierarchy_level).collect();
        assert!(levels.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn test_hierarchy_monotonicity_for_every_pair() {
        for a in RoleName::ALL {
            for b in RoleName::ALL {
                if hierarchy_level(a) > hierarchy_level(b) {
                    assert!(has_min_role(a, b), "{a} should satisfy min {b}");
                    assert!(!has_min_role(b, a), "{b} should not satisfy min {a}");
                }
            }
            assert!(has_min_role(a, a));
        }
    }

    #[test]
    fn test_alias_produces_identical_answers() {
        let pairs = [
            ("sub_admin", "subAdmin"),
            ("super_admin", "superAdmin"),
            ("teacher", "instructor"),
        ];
        for (legacy, canonical) in pairs {
            let legacy = RoleName::parse(legacy).unwrap();
            let canonical = RoleName::parse(canonical).unwrap();
            assert_eq!(hierarchy_level(legacy), hierarchy_level(canonical));
            for other in RoleName::ALL {
                assert_eq!(can_manage_role(legacy, other), can_manage_role(canonical, other));
                assert_eq!(can_invite(legacy, other), can_invite(canonical, other));
            }
            for feature in Feature::ALL {
                assert_eq!(
                    can_access(legacy, feature.as_str()),
                    can_access(canonical, feature.as_str())
                );
            }
        }
    }

    #[test]
    fn test_sub_admin_invites_instructors_and_students_only() {
        assert!(!can_invite(SubAdmin, Admin));
        assert!(!can_invite(SubAdmin, SubAdmin));
        assert!(can_invite(SubAdmin, Instructor));
        assert!(can_invite(SubAdmin, Student));
        assert_eq!(invitable_roles(SubAdmin), vec![Instructor, Student]);
    }

    #[test]
    fn test_invite_and_manage_are_independent() {
        assert!(can_invite(Instructor, Student));
        assert!(!can_manage_role(Instructor, Student));
        assert!(manageable_roles(Instructor).is_empty());
    }

    #[test]
    fn test_peers_cannot_be_managed_or_invited() {
        assert!(!can_manage_role(SuperAdmin, SuperAdmin));
        assert!(!can_invite(SuperAdmin, SuperAdmin));
        assert!(!can_manage_role(Admin, Admin));
        assert!(!can_invite(Student, Student));
    }

    #[test]
    fn test_invitable_roles_round_trip() {
        for current in RoleName::ALL {
            let invitable = invitable_roles(current);
            for target in RoleName::ALL {
                assert_eq!(invitable.contains(&target), can_invite(current, target));
            }
        }
    }

    #[test]
    fn test_unknown_feature_is_denied() {
        assert!(!can_access(SuperAdmin, "teleportation"));
        assert!(!can_access(SuperAdmin, ""));
        assert!(!can_access(SuperAdmin, "Billing"));
    }

    #[test]
    fn test_feature_table() {
        assert!(can_access(Student, "dashboard"));
        assert!(!can_access(Student, "manageCourses"));
        assert!(can_access(Instructor, "invitations"));
        assert!(!can_access(SubAdmin, "billing"));
        assert!(can_access(Admin, "organizationSettings"));
        assert!(can_access(SuperAdmin, "platformAdmin"));
        assert!(!can_access(Admin, "platformAdmin"));
    }
}
