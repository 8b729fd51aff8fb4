use serde::{Deserialize, Serialize};

/// Which identifier namespace a lookup string addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKey {
    /// Numeric legacy account number.
    Uin,
    /// Opaque platform-internal identifier.
    Uid,
}

/// Classify a lookup identifier: purely numeric strings address the uin
/// namespace, anything else (including the empty string) the uid namespace.
pub fn classify(identifier: &str) -> IdKey {
    if !identifier.is_empty() && identifier.bytes().all(|b| b.is_ascii_digit()) {
        IdKey::Uin
    } else {
        IdKey::Uid
    }
}

/// Anything addressable by uin and uid.
pub trait Identified {
    fn uin(&self) -> &str;
    fn uid(&self) -> &str;

    /// Match against `identifier` using the namespace selected by [`classify`].
    fn matches(&self, identifier: &str) -> bool {
        match classify(identifier) {
            IdKey::Uin => self.uin() == identifier,
            IdKey::Uid => self.uid() == identifier,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Friend {
    pub uin: String,
    pub uid: String,
    pub nick: String,
    #[serde(default)]
    pub remark: String,
}

impl Identified for Friend {
    fn uin(&self) -> &str {
        &self.uin
    }

    fn uid(&self) -> &str {
        &self.uid
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    #[default]
    Member,
    Admin,
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupMember {
    pub uin: String,
    pub uid: String,
    pub nick: String,
    /// Group-specific display name, empty when unset.
    #[serde(default)]
    pub card: String,
    #[serde(default)]
    pub role: MemberRole,
}

impl Identified for GroupMember {
    fn uin(&self) -> &str {
        &self.uin
    }

    fn uid(&self) -> &str {
        &self.uid
    }
}

/// A group chat. Groups are addressed by their numeric group code only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub group_code: String,
    pub group_name: String,
    #[serde(default)]
    pub member_count: u32,
    /// Members as last fetched; empty until the first member refresh.
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn member(&self, identifier: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.matches(identifier))
    }
}

/// The logged-in account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelfInfo {
    pub uin: String,
    pub uid: String,
    pub nick: String,
    pub online: bool,
}

/// What kind of entity a lookup targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Friend,
    Group,
    GroupMember { group_code: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Friend(Friend),
    Group(Group),
    GroupMember(GroupMember),
}
