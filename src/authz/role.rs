use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Permission level a user holds on one task.
///
/// Absence of an assignment is `Role::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Collaborator,
    Viewer,
    #[default]
    None,
}

/// Something a principal asks to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// Grant or revoke roles on a task.
    ManageAccess,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Owner, Role::Collaborator, Role::Viewer, Role::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Collaborator => "collaborator",
            Role::Viewer => "viewer",
            Role::None => "none",
        }
    }

    /// The role/action matrix.
    pub fn permits(self, action: Action) -> bool {
        match (self, action) {
            (Role::Owner, _) => true,
            (Role::Collaborator, Action::Read | Action::Create | Action::Update) => true,
            (Role::Viewer, Action::Read) => true,
            _ => false,
        }
    }
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::ManageAccess,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Role::Owner),
            "collaborator" => Ok(Role::Collaborator),
            "viewer" => Ok(Role::Viewer),
            "none" => Ok(Role::None),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}
