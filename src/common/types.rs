//! Shared types used across the application.

use crate::common::resources::CharacterClass;

/// A character reported by the server's `who` roster dump.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    /// Free-form identity prefix (GM flags, guild tags).
    pub identity: String,
    /// State flags such as `ANON` or `RolePlay`.
    pub state: String,
    pub level: u32,
    pub class: String,
    pub race: String,
    pub zone: String,
    pub account_id: u32,
    pub account_name: String,
    pub login_server_id: u32,
    pub status: i32,
    pub online: bool,
}

impl Character {
    /// Anonymous and role-play characters are counted but never listed.
    pub fn is_hidden(&self) -> bool {
        self.state.contains("ANON") || self.state.contains("RolePlay")
    }
}

/// One member parsed out of a raid dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidMember {
    pub name: String,
    /// 0 when the dump line carried no level.
    pub level: u32,
    /// `None` when the dump line carried no class at all.
    pub class: Option<CharacterClass>,
    /// 0 when the dump line carried no group number.
    pub group_number: u32,
}

impl RaidMember {
    /// A member known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: 0,
            class: None,
            group_number: 0,
        }
    }
}
