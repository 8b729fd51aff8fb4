//! In-memory cache of friends, groups and group members.
//!
//! Lookups scan the cached entities first. A miss triggers exactly one bulk
//! refresh from the [`EntitySource`] followed by a second scan; a hit never
//! touches the source. Refresh failures during lookup are logged and read as
//! "not found". Concurrent misses are not coalesced: each one refreshes.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use onebridge_shared::{Entity, EntityKind, Friend, Group, GroupMember, Identified, SelfInfo};

use crate::error::CoreError;

/// Remote API the cache refreshes from.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn fetch_friends(&self, force_refresh: bool) -> anyhow::Result<Vec<Friend>>;
    async fn fetch_groups(&self, force_refresh: bool) -> anyhow::Result<Vec<Group>>;
    async fn fetch_group_members(&self, group_code: &str) -> anyhow::Result<Vec<GroupMember>>;
}

#[derive(Debug, Default)]
struct Store {
    friends: Vec<Friend>,
    groups: Vec<Group>,
    uid_to_uin: HashMap<String, String>,
    uin_to_uid: HashMap<String, String>,
    /// Temporary-chat peer uid -> group code it was reached through.
    temp_sessions: HashMap<String, String>,
    self_info: SelfInfo,
}

impl Store {
    /// Record `uin <-> uid` unless `uin` is already bound. Returns the uid
    /// that stays bound to `uin`.
    fn bind(&mut self, uin: &str, uid: &str) -> String {
        if uin.is_empty() || uid.is_empty() {
            return uid.to_string();
        }
        let bound = self
            .uin_to_uid
            .entry(uin.to_string())
            .or_insert_with(|| uid.to_string())
            .clone();
        self.uid_to_uin
            .entry(bound.clone())
            .or_insert_with(|| uin.to_string());
        bound
    }

    fn pin_members(&mut self, members: &mut [GroupMember]) {
        for member in members {
            member.uid = self.bind(&member.uin, &member.uid);
        }
    }

    fn find_friend(&self, identifier: &str) -> Option<&Friend> {
        self.friends.iter().find(|f| f.matches(identifier))
    }

    fn find_group(&self, group_code: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.group_code == group_code)
    }

    fn find_group_mut(&mut self, group_code: &str) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.group_code == group_code)
    }

    // uin and uid are fixed once seen; only the display fields move.
    fn merge_friends(&mut self, fetched: Vec<Friend>) {
        for friend in fetched {
            match self.friends.iter_mut().find(|f| f.uin == friend.uin) {
                Some(existing) => {
                    existing.nick = friend.nick;
                    existing.remark = friend.remark;
                }
                None => {
                    let mut friend = friend;
                    friend.uid = self.bind(&friend.uin, &friend.uid);
                    self.friends.push(friend);
                }
            }
        }
    }

    fn merge_groups(&mut self, fetched: Vec<Group>) {
        for mut group in fetched {
            self.pin_members(&mut group.members);
            match self.find_group_mut(&group.group_code) {
                Some(existing) => {
                    existing.group_name = group.group_name;
                    existing.member_count = group.member_count;
                    if !group.members.is_empty() {
                        existing.members = group.members;
                    }
                }
                None => self.groups.push(group),
            }
        }
    }

    fn set_members(&mut self, group_code: &str, mut members: Vec<GroupMember>) -> bool {
        self.pin_members(&mut members);
        match self.find_group_mut(group_code) {
            Some(group) => {
                group.members = members;
                true
            }
            None => false,
        }
    }
}

pub struct EntityCache {
    source: Arc<dyn EntitySource>,
    store: RwLock<Store>,
}

impl EntityCache {
    pub fn new(source: Arc<dyn EntitySource>) -> Self {
        Self {
            source,
            store: RwLock::new(Store::default()),
        }
    }

    /// Dispatch on `kind`; see [`friend`](Self::friend), [`group`](Self::group)
    /// and [`group_member`](Self::group_member).
    pub async fn resolve_entity(&self, kind: &EntityKind, identifier: &str) -> Option<Entity> {
        match kind {
            EntityKind::Friend => self.friend(identifier).await.map(Entity::Friend),
            EntityKind::Group => self.group(identifier).await.map(Entity::Group),
            EntityKind::GroupMember { group_code } => self
                .group_member(group_code, identifier)
                .await
                .map(Entity::GroupMember),
        }
    }

    /// Look a friend up by uin (numeric identifier) or uid (anything else).
    pub async fn friend(&self, identifier: &str) -> Option<Friend> {
        if let Some(friend) = self.store.read().await.find_friend(identifier) {
            return Some(friend.clone());
        }

        debug!(identifier, "Friend cache miss, refreshing");
        if let Err(e) = self.refresh_friends().await {
            warn!(identifier, error = %e, "Failed to refresh friend list");
        }

        self.store.read().await.find_friend(identifier).cloned()
    }

    /// Look a group up by its group code.
    pub async fn group(&self, group_code: &str) -> Option<Group> {
        if let Some(group) = self.store.read().await.find_group(group_code) {
            return Some(group.clone());
        }

        debug!(group_code, "Group cache miss, refreshing");
        if let Err(e) = self.refresh_groups().await {
            warn!(group_code, error = %e, "Failed to refresh group list");
        }

        self.store.read().await.find_group(group_code).cloned()
    }

    /// Resolve the group first, then the member within it. A member miss
    /// refreshes that one group's members; an empty fetch keeps the old list.
    pub async fn group_member(&self, group_code: &str, identifier: &str) -> Option<GroupMember> {
        let group = self.group(group_code).await?;
        if let Some(member) = group.member(identifier) {
            return Some(member.clone());
        }

        debug!(group_code, identifier, "Group member cache miss, refreshing");
        match self.source.fetch_group_members(group_code).await {
            Ok(members) if !members.is_empty() => {
                self.store.write().await.set_members(group_code, members);
            }
            Ok(_) => debug!(group_code, "Member refresh returned nothing"),
            Err(e) => warn!(group_code, error = %e, "Failed to refresh group members"),
        }

        let store = self.store.read().await;
        store
            .find_group(group_code)
            .and_then(|g| g.member(identifier))
            .cloned()
    }

    /// Fetch the full friend list unconditionally and merge it in.
    pub async fn refresh_friends(&self) -> Result<usize, CoreError> {
        let friends = self
            .source
            .fetch_friends(true)
            .await
            .map_err(CoreError::remote)?;
        let count = friends.len();
        self.store.write().await.merge_friends(friends);
        debug!(count, "Friend list refreshed");
        Ok(count)
    }

    /// Fetch the full group list unconditionally and merge it in.
    pub async fn refresh_groups(&self) -> Result<usize, CoreError> {
        let groups = self
            .source
            .fetch_groups(true)
            .await
            .map_err(CoreError::remote)?;
        let count = groups.len();
        self.store.write().await.merge_groups(groups);
        debug!(count, "Group list refreshed");
        Ok(count)
    }

    /// Replace a cached group's member list with a fresh fetch. Members of a
    /// group that is not cached only feed the uid index.
    pub async fn refresh_group_members(&self, group_code: &str) -> Result<(), CoreError> {
        let members = self
            .source
            .fetch_group_members(group_code)
            .await
            .map_err(CoreError::remote)?;
        let count = members.len();
        let applied = self.store.write().await.set_members(group_code, members);
        debug!(group_code, count, applied, "Group members refreshed");
        Ok(())
    }

    /// Drop a group from the cache. Returns whether it was present.
    pub async fn delete_group(&self, group_code: &str) -> bool {
        let mut store = self.store.write().await;
        let before = store.groups.len();
        store.groups.retain(|g| g.group_code != group_code);
        let removed = store.groups.len() != before;
        if removed {
            info!(group_code, "Removed group from cache");
        }
        removed
    }

    pub async fn uid_by_uin(&self, uin: &str) -> Option<String> {
        self.store.read().await.uin_to_uid.get(uin).cloned()
    }

    pub async fn uin_by_uid(&self, uid: &str) -> Option<String> {
        self.store.read().await.uid_to_uin.get(uid).cloned()
    }

    pub async fn remember_temp_session(&self, peer_uid: &str, group_code: &str) {
        self.store
            .write()
            .await
            .temp_sessions
            .insert(peer_uid.to_string(), group_code.to_string());
    }

    pub async fn temp_session_group(&self, peer_uid: &str) -> Option<String> {
        self.store.read().await.temp_sessions.get(peer_uid).cloned()
    }

    pub async fn set_self_info(&self, info: SelfInfo) {
        let mut store = self.store.write().await;
        store.bind(&info.uin, &info.uid);
        store.self_info = info;
    }

    pub async fn self_info(&self) -> SelfInfo {
        self.store.read().await.self_info.clone()
    }

    /// Snapshot of the cached friends.
    pub async fn friends(&self) -> Vec<Friend> {
        self.store.read().await.friends.clone()
    }

    /// Snapshot of the cached groups.
    pub async fn groups(&self) -> Vec<Group> {
        self.store.read().await.groups.clone()
    }
}
