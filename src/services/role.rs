//! Role gate — one permission table for every mutating action.
//!
//! DESIGN
//! ======
//! Handlers call `permits` before touching the surface or the store, even
//! when the browser already disabled the affordance. Enforcement is
//! advisory: nothing stops a client from writing the store directly.

use serde::{Deserialize, Serialize};

/// Permission tier of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Creator,
    Editor,
    Viewer,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "creator" => Some(Self::Creator),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    /// Whether this role may change slide content at all.
    #[must_use]
    pub fn can_edit(self) -> bool {
        permits(self, Action::Draw)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a participant can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Draw,
    AddShape,
    DeleteObject,
    ChangeStyle,
    AddSlide,
    RemoveSlide,
    ChangeRole,
    SelectSlide,
    Export,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Draw,
        Action::AddShape,
        Action::DeleteObject,
        Action::ChangeStyle,
        Action::AddSlide,
        Action::RemoveSlide,
        Action::ChangeRole,
        Action::SelectSlide,
        Action::Export,
    ];
}

/// Permission lookup.
#[must_use]
pub fn permits(role: Role, action: Action) -> bool {
    match (role, action) {
        (_, Action::SelectSlide | Action::Export) => true,
        (Role::Creator, _) => true,
        (Role::Editor, Action::ChangeRole) => false,
        (Role::Editor, _) => true,
        (Role::Viewer, _) => false,
    }
}
