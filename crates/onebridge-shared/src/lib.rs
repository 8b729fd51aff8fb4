// Data model and constants shared by every onebridge crate.

pub mod constants;
pub mod types;

pub use types::{
    classify, Entity, EntityKind, Friend, Group, GroupMember, IdKey, Identified, MemberRole,
    SelfInfo,
};
