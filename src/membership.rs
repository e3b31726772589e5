//! Bidirectional user↔channel membership graph ([C4]).

use std::collections::HashMap;

use crate::arena::Arena;
use crate::channel::{ChannelId, Membership, MembershipId, UserId};
use crate::store::ChannelStore;

/// Owns every live [`Membership`] and the user-side half of the graph
/// (the channel-side half — `Channel::members` — lives on the channel
/// itself so the store can walk it without borrowing this graph).
#[derive(Default)]
pub struct MembershipGraph {
    memberships: Arena<Membership>,
    by_user: HashMap<UserId, Vec<MembershipId>>,
}

impl MembershipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: MembershipId) -> Option<&Membership> {
        self.memberships.get(id)
    }

    pub fn get_mut(&mut self, id: MembershipId) -> Option<&mut Membership> {
        self.memberships.get_mut(id)
    }

    pub fn user_memberships(&self, user: UserId) -> &[MembershipId] {
        self.by_user.get(&user).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `find_member_link(channel, client)`. When a user's own channel
    /// list is shorter than the channel's member list, search that
    /// side instead — the optimisation the source applies for
    /// "service" users subscribed to very many channels, generalised
    /// here to whichever side happens to be shorter.
    pub fn find(&self, store: &ChannelStore, channel: ChannelId, user: UserId) -> Option<MembershipId> {
        let channel_members = store.channel(channel)?.members.as_slice();
        let user_channels = self.user_memberships(user);

        if user_channels.len() <= channel_members.len() {
            user_channels
                .iter()
                .copied()
                .find(|&id| self.memberships.get(id).map(|m| m.channel == channel).unwrap_or(false))
        } else {
            channel_members
                .iter()
                .copied()
                .find(|&id| self.memberships.get(id).map(|m| m.user == user).unwrap_or(false))
        }
    }

    /// Push a new membership onto both the channel's and the user's
    /// list.
    pub fn add(&mut self, store: &mut ChannelStore, channel: ChannelId, user: UserId) -> MembershipId {
        let membership = Membership::new(user, channel);
        let id = self.memberships.insert(membership);
        if let Some(c) = store.channel_mut(channel) {
            c.members.push(id);
        }
        self.by_user.entry(user).or_default().push(id);
        id
    }

    /// Unlink `id` from both lists, free it, and ask the store to tear
    /// down its channel if no non-zombie member remains. Returns
    /// `true` iff the channel still exists afterward.
    pub fn remove(&mut self, store: &mut ChannelStore, id: MembershipId) -> bool {
        let Some(membership) = self.memberships.remove(id) else {
            return false;
        };

        if let Some(c) = store.channel_mut(membership.channel) {
            c.members.retain(|&m| m != id);
        }
        if let Some(list) = self.by_user.get_mut(&membership.user) {
            list.retain(|&m| m != id);
            if list.is_empty() {
                self.by_user.remove(&membership.user);
            }
        }

        self.teardown_if_all_zombies(store, membership.channel)
    }

    /// If `channel` has no non-zombie member left, sweep the remaining
    /// zombies and tear it down. Called after every departure, whether
    /// the member was unlinked outright or just flagged zombie — a
    /// zombification can itself be the event that empties a channel.
    /// Returns `true` iff the channel still exists afterward.
    pub fn teardown_if_all_zombies(&mut self, store: &mut ChannelStore, channel: ChannelId) -> bool {
        let Some(c) = store.channel(channel) else {
            return false;
        };
        let any_active = c.members.iter().any(|&m| self.memberships.get(m).map(|m| !m.is_zombie()).unwrap_or(false));
        if !any_active {
            self.remove_all_zombies(store, channel);
            store.teardown(channel);
            false
        } else {
            true
        }
    }

    fn remove_all_zombies(&mut self, store: &mut ChannelStore, channel: ChannelId) {
        let Some(c) = store.channel(channel) else { return };
        let zombies: Vec<MembershipId> = c.members.clone();
        for id in zombies {
            if let Some(m) = self.memberships.remove(id) {
                if let Some(list) = self.by_user.get_mut(&m.user) {
                    list.retain(|&x| x != id);
                }
            }
        }
        if let Some(c) = store.channel_mut(channel) {
            c.members.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemberStatus;
    use crate::limits::Creation;

    #[test]
    fn add_then_find_round_trips() {
        let mut store = ChannelStore::new();
        let mut graph = MembershipGraph::new();
        let (chan, _) = store.get_or_create("#test", Creation::At(1));
        let mid = graph.add(&mut store, chan, 42);
        assert_eq!(graph.find(&store, chan, 42), Some(mid));
        assert_eq!(graph.find(&store, chan, 99), None);
    }

    #[test]
    fn last_non_zombie_departure_tears_down_the_channel() {
        let mut store = ChannelStore::new();
        let mut graph = MembershipGraph::new();
        let (chan, _) = store.get_or_create("#test", Creation::At(1));
        let mid = graph.add(&mut store, chan, 42);
        let still_exists = graph.remove(&mut store, mid);
        assert!(!still_exists);
        assert!(store.get("#test").is_none());
    }

    #[test]
    fn zombie_members_do_not_keep_a_channel_alive() {
        let mut store = ChannelStore::new();
        let mut graph = MembershipGraph::new();
        let (chan, _) = store.get_or_create("#test", Creation::At(1));
        let zombie_id = graph.add(&mut store, chan, 1);
        graph.get_mut(zombie_id).unwrap().status.insert(MemberStatus::ZOMBIE);
        let active_id = graph.add(&mut store, chan, 2);

        let still_exists = graph.remove(&mut store, active_id);
        assert!(!still_exists, "only zombies remain, channel should be torn down");
        assert!(store.get("#test").is_none());
    }
}
