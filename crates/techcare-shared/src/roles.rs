//! Roles, permission bitmasks and the admin route guard.

use serde::{Deserialize, Serialize};

/// Individual capability. Discriminant is the bit index in `PermissionSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewDashboard = 1,
    RunDiagnostics = 2,
    RunRepairs = 3,
    ManageUsers = 4,
    ViewLogs = 5,
    AdminAccess = 6,
}

impl Permission {
    pub const ALL: [Permission; 6] = [
        Permission::ViewDashboard,
        Permission::RunDiagnostics,
        Permission::RunRepairs,
        Permission::ManageUsers,
        Permission::ViewLogs,
        Permission::AdminAccess,
    ];

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u32);

impl PermissionSet {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.0 & permission.bit() != 0
    }

    pub fn add(&mut self, permission: Permission) {
        self.0 |= permission.bit();
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0 &= !permission.bit();
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> {
        let set = *self;
        Permission::ALL.into_iter().filter(move |p| set.has(*p))
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        let mut set = PermissionSet::empty();
        for p in iter {
            set.add(p);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    AdminMaster,
    #[serde(alias = "admin_tecnico")]
    Technician,
    #[serde(alias = "visualizador")]
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AdminMaster => "admin_master",
            Role::Technician => "technician",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "admin_master" | "admin" => Some(Role::AdminMaster),
            "technician" | "admin_tecnico" | "tech" => Some(Role::Technician),
            "viewer" | "visualizador" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn permissions(&self) -> PermissionSet {
        match self {
            Role::Viewer => [Permission::ViewDashboard].into_iter().collect(),
            Role::Technician => [
                Permission::ViewDashboard,
                Permission::RunDiagnostics,
                Permission::RunRepairs,
                Permission::ViewLogs,
            ]
            .into_iter()
            .collect(),
            Role::AdminMaster => Permission::ALL.into_iter().collect(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions().has(permission)
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::AdminMaster => "/admin/dashboard",
            Role::Technician => "/technician/dashboard",
            Role::Viewer => "/viewer/dashboard",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access metadata attached to a route
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_guest: bool,
    /// Allowed roles; `None` means any authenticated role
    pub roles: Option<Vec<Role>>,
}

impl RouteMeta {
    pub fn guest() -> Self {
        Self {
            requires_guest: true,
            ..Default::default()
        }
    }

    pub fn authenticated(roles: &[Role]) -> Self {
        Self {
            requires_auth: true,
            requires_guest: false,
            roles: Some(roles.to_vec()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    Redirect(&'static str),
}

pub const LOGIN_PATH: &str = "/login";

pub struct RouteGuard;

impl RouteGuard {
    /// Decide navigation for a route given the current session role
    pub fn resolve(meta: &RouteMeta, session: Option<Role>) -> RouteDecision {
        if meta.requires_auth {
            let Some(role) = session else {
                return RouteDecision::Redirect(LOGIN_PATH);
            };
            if let Some(roles) = &meta.roles {
                if !roles.contains(&role) {
                    return RouteDecision::Redirect(LOGIN_PATH);
                }
            }
        }

        if meta.requires_guest {
            if let Some(role) = session {
                return RouteDecision::Redirect(role.dashboard_path());
            }
        }

        RouteDecision::Allow
    }

    /// Route table of the admin panel
    pub fn admin_routes() -> Vec<(&'static str, RouteMeta)> {
        vec![
            (LOGIN_PATH, RouteMeta::guest()),
            ("/admin/dashboard", RouteMeta::authenticated(&[Role::AdminMaster])),
            ("/admin/users", RouteMeta::authenticated(&[Role::AdminMaster])),
            (
                "/technician/dashboard",
                RouteMeta::authenticated(&[Role::AdminMaster, Role::Technician]),
            ),
            (
                "/viewer/dashboard",
                RouteMeta::authenticated(&[Role::AdminMaster, Role::Technician, Role::Viewer]),
            ),
        ]
    }

    /// Resolve a path against the admin route table; unknown paths go to login
    pub fn resolve_path(path: &str, session: Option<Role>) -> RouteDecision {
        match Self::admin_routes().into_iter().find(|(p, _)| *p == path) {
            Some((_, meta)) => Self::resolve(&meta, session),
            None => RouteDecision::Redirect(LOGIN_PATH),
        }
    }
}
