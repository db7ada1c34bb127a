use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    models::NavLink,
    roles::{Role, RoleSet},
};

/// Where the guard sends unauthenticated visitors.
pub const LOGIN_PATH: &str = "/login";
/// Where the guard sends visitors whose role does not grant the page.
pub const HOME_PATH: &str = "/";

/// PageId
///
/// Identifies the content module mounted for a route. Content loaders resolve
/// a page by its `slug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PageId {
    Login,
    FirstRunSetup,
    Dashboard,
    Messages,
    Announcements,
    Schedule,
    Homework,
    Resources,
    Grades,
    Attendance,
    Classes,
    TeacherBulletinGrades,
    StudentBulletin,
    UserManagement,
    DatabaseAdmin,
    Analytics,
    AdminSettings,
    AcademicYearConfig,
    BulletinDashboard,
    Profile,
    Settings,
}

impl PageId {
    pub const fn slug(self) -> &'static str {
        match self {
            PageId::Login => "login",
            PageId::FirstRunSetup => "first-run-setup",
            PageId::Dashboard => "dashboard",
            PageId::Messages => "messages",
            PageId::Announcements => "announcements",
            PageId::Schedule => "schedule",
            PageId::Homework => "homework",
            PageId::Resources => "resources",
            PageId::Grades => "grades",
            PageId::Attendance => "attendance",
            PageId::Classes => "classes",
            PageId::TeacherBulletinGrades => "teacher-bulletin-grades",
            PageId::StudentBulletin => "student-bulletin",
            PageId::UserManagement => "user-management",
            PageId::DatabaseAdmin => "database-admin",
            PageId::Analytics => "analytics",
            PageId::AdminSettings => "admin-settings",
            PageId::AcademicYearConfig => "academic-year-config",
            PageId::BulletinDashboard => "bulletin-dashboard",
            PageId::Profile => "profile",
            PageId::Settings => "settings",
        }
    }
}

/// Access
///
/// The access rule of a route. `Public` routes never reach the guard;
/// `Authenticated` is the same as an empty role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Roles(RoleSet),
}

impl Access {
    /// The role set handed to the guard, or `None` for public routes.
    pub const fn required_roles(self) -> Option<RoleSet> {
        match self {
            Access::Public => None,
            Access::Authenticated => Some(RoleSet::EMPTY),
            Access::Roles(roles) => Some(roles),
        }
    }

    pub const fn permits(self, role: Role) -> bool {
        match self {
            Access::Public | Access::Authenticated => true,
            Access::Roles(roles) => roles.is_empty() || roles.contains(role),
        }
    }
}

/// RouteEntry
///
/// A static path → page mapping with its access rule. `menu` holds the label
/// key for entries that appear in the sidebar, and `menu_roles` narrows who
/// sees the entry there (empty: everyone the access rule admits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    pub path: &'static str,
    pub page: PageId,
    pub access: Access,
    pub menu: Option<&'static str>,
    pub menu_roles: RoleSet,
}

impl RouteEntry {
    pub const fn new(path: &'static str, page: PageId, access: Access) -> Self {
        Self {
            path,
            page,
            access,
            menu: None,
            menu_roles: RoleSet::EMPTY,
        }
    }

    pub const fn in_menu(mut self, label_key: &'static str) -> Self {
        self.menu = Some(label_key);
        self
    }

    /// Lists the entry in the sidebar of `roles` only. The page itself stays
    /// reachable for everyone its access rule admits.
    pub const fn in_menu_for(mut self, label_key: &'static str, roles: RoleSet) -> Self {
        self.menu = Some(label_key);
        self.menu_roles = roles;
        self
    }

    /// Whether `role` sees this entry in its sidebar.
    pub const fn listed_for(&self, role: Role) -> bool {
        self.menu.is_some()
            && self.access.permits(role)
            && (self.menu_roles.is_empty() || self.menu_roles.contains(role))
    }
}

const TEACHING: Access = Access::Roles(RoleSet::STAFF);
const ADMINISTRATION: Access = Access::Roles(RoleSet::ADMINISTRATIVE);
const BULLETIN_READERS: Access = Access::Roles(RoleSet::of(&[
    Role::Student,
    Role::Parent,
    Role::Director,
    Role::Superadmin,
]));

const CLASSROOM: RoleSet = RoleSet::of(&[Role::Student, Role::Teacher]);
const HOMEWORK_READERS: RoleSet = RoleSet::of(&[Role::Student, Role::Parent, Role::Teacher]);
const FAMILY: RoleSet = RoleSet::of(&[Role::Student, Role::Parent]);
const TEACHERS: RoleSet = RoleSet::of(&[Role::Teacher]);

// Menu order follows table order: common pages first, profile and preferences last.
// Sidebar audiences are narrower than access on a few pages: directors reach
// the schedule and homework pages but do not get them in the menu, teachers
// reach class rosters but only administrators have the menu entry.
const SCHOOL_ROUTES: &[RouteEntry] = &[
    RouteEntry::new("/login", PageId::Login, Access::Public),
    RouteEntry::new("/setup", PageId::FirstRunSetup, Access::Public),
    RouteEntry::new("/", PageId::Dashboard, Access::Authenticated).in_menu("sidebar.dashboard"),
    RouteEntry::new("/messages", PageId::Messages, Access::Authenticated).in_menu("sidebar.messages"),
    RouteEntry::new("/announcements", PageId::Announcements, Access::Authenticated)
        .in_menu("sidebar.announcements"),
    RouteEntry::new("/schedule", PageId::Schedule, Access::Authenticated)
        .in_menu_for("sidebar.schedule", CLASSROOM),
    RouteEntry::new("/homework", PageId::Homework, Access::Authenticated)
        .in_menu_for("sidebar.homework", HOMEWORK_READERS),
    RouteEntry::new("/resources", PageId::Resources, Access::Authenticated),
    RouteEntry::new("/admin/analytics", PageId::Analytics, ADMINISTRATION).in_menu("sidebar.analytics"),
    RouteEntry::new("/users", PageId::UserManagement, ADMINISTRATION).in_menu("sidebar.users"),
    RouteEntry::new("/classes", PageId::Classes, TEACHING)
        .in_menu_for("sidebar.classes", RoleSet::ADMINISTRATIVE),
    RouteEntry::new("/grades", PageId::Grades, TEACHING).in_menu("sidebar.grades"),
    RouteEntry::new("/attendance", PageId::Attendance, TEACHING).in_menu("sidebar.attendance"),
    RouteEntry::new("/bulletins/grades", PageId::TeacherBulletinGrades, TEACHING)
        .in_menu_for("sidebar.bulletinGrades", TEACHERS),
    RouteEntry::new("/bulletins/view", PageId::StudentBulletin, BULLETIN_READERS)
        .in_menu_for("sidebar.bulletins", FAMILY),
    RouteEntry::new("/bulletins/config", PageId::AcademicYearConfig, ADMINISTRATION)
        .in_menu("sidebar.bulletinConfig"),
    RouteEntry::new("/bulletins/dashboard", PageId::BulletinDashboard, ADMINISTRATION)
        .in_menu("sidebar.bulletinDashboard"),
    RouteEntry::new("/admin/settings", PageId::AdminSettings, ADMINISTRATION)
        .in_menu("sidebar.settings"),
    RouteEntry::new("/admin/database", PageId::DatabaseAdmin, ADMINISTRATION),
    RouteEntry::new("/profile", PageId::Profile, Access::Authenticated).in_menu("sidebar.profile"),
    RouteEntry::new("/settings", PageId::Settings, Access::Authenticated)
        .in_menu("sidebar.preferences"),
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route path '{0}' must be absolute, without query, fragment or trailing slash")]
    InvalidPath(String),
    #[error("route path '{0}' is declared more than once (paths match case-insensitively)")]
    DuplicatePath(String),
    #[error("route table has no entry for '{0}'")]
    MissingRoute(&'static str),
    #[error("the login route must be public")]
    LoginNotPublic,
    #[error("the home route must be reachable by every authenticated identity")]
    HomeRestricted,
}

/// RouteTable
///
/// The single role-policy table. Both the in-process shell and the HTTP page
/// gate resolve paths through it.
#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Builds a table, rejecting any layout in which a guard redirect could
    /// land on a page the redirected visitor cannot reach.
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, RouteTableError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            let path = entry.path;
            let malformed = !path.starts_with('/')
                || path.contains(['?', '#'])
                || (path.len() > 1 && path.ends_with('/'));
            if malformed {
                return Err(RouteTableError::InvalidPath(path.to_string()));
            }
            if !seen.insert(path.to_ascii_lowercase()) {
                return Err(RouteTableError::DuplicatePath(path.to_string()));
            }
        }

        let find = |path: &str| entries.iter().find(|entry| entry.path.eq_ignore_ascii_case(path));

        match find(LOGIN_PATH) {
            None => return Err(RouteTableError::MissingRoute(LOGIN_PATH)),
            Some(login) if login.access != Access::Public => {
                return Err(RouteTableError::LoginNotPublic);
            }
            Some(_) => {}
        }

        match find(HOME_PATH) {
            None => return Err(RouteTableError::MissingRoute(HOME_PATH)),
            Some(home) if !Role::ALL.iter().all(|role| home.access.permits(*role)) => {
                return Err(RouteTableError::HomeRestricted);
            }
            Some(_) => {}
        }

        Ok(Self { entries })
    }

    /// The SmartMadrassa page table.
    pub fn school() -> Self {
        Self {
            entries: SCHOOL_ROUTES.to_vec(),
        }
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Looks up the entry for a location; query, fragment, trailing slash and
    /// ASCII case are ignored.
    pub fn find(&self, location: &str) -> Option<&RouteEntry> {
        let path = normalize_path(location);
        self.entries
            .iter()
            .find(|entry| entry.path.eq_ignore_ascii_case(path))
    }

    /// The sidebar menu for a role: menu entries listed for the role, in table order.
    pub fn navigation_for(&self, role: Role) -> Vec<NavLink> {
        self.entries
            .iter()
            .filter(|entry| entry.listed_for(role))
            .filter_map(|entry| {
                entry.menu.map(|label_key| NavLink {
                    path: entry.path.to_string(),
                    page: entry.page,
                    label_key: label_key.to_string(),
                })
            })
            .collect()
    }
}

/// Strips query and fragment and a trailing slash. The empty path is `/`.
pub fn normalize_path(location: &str) -> &str {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { HOME_PATH } else { trimmed }
}
