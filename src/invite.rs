//! Bounded per-user and per-channel invite lists ([C6]).
//!
//! An invite is a (user, channel) edge living in both lists at once
//! (§4.6). The channel side lives on [`crate::channel::Channel::invites`]
//! since this crate owns `Channel`; the user side is a [`UserInvites`]
//! the caller holds per-client, since this crate has no client registry
//! of its own to keep one in.

use crate::channel::{Channel, ChannelId, UserId};
use crate::limits::Limits;

/// A pending (user, channel) invite edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invite {
    pub user: UserId,
    pub channel: ChannelId,
}

/// Add a (user, channel) edge to both lists (§4.6). A no-op if the
/// user is already invited. Returns the channel id evicted from the
/// user's own list, if the per-user cap forced one out; the caller
/// must remove the matching entry from *that* channel's invite list
/// itself, since this function is only handed the channel being
/// invited to.
pub fn add_invite(
    channel: &mut Channel,
    user_invites: &mut UserInvites,
    user: UserId,
    channel_id: ChannelId,
    limits: &Limits,
) -> Option<ChannelId> {
    if channel.invites.iter().any(|i| i.user == user) {
        return None;
    }
    let evicted = user_invites.add(channel_id, limits);
    channel.invites.push(Invite { user, channel: channel_id });
    evicted
}

/// Remove a (user, channel) edge from both lists, by scan (§4.6).
pub fn del_invite(channel: &mut Channel, user_invites: &mut UserInvites, user: UserId, channel_id: ChannelId) {
    channel.invites.retain(|i| i.user != user);
    user_invites.remove(channel_id);
}

/// True if `user` holds a pending invite to `channel`, consulted by
/// the caller before passing `has_invite` to [`crate::joinpart::can_join`].
pub fn has_invite(channel: &Channel, user: UserId) -> bool {
    channel.invites.iter().any(|i| i.user == user)
}

/// All pending invites for one user, oldest first.
#[derive(Debug, Default, Clone)]
pub struct UserInvites {
    entries: Vec<ChannelId>,
}

impl UserInvites {
    /// Record an invite to `channel`, evicting the oldest entry first
    /// if the user is already at `max_channels_per_user`. Returns the
    /// evicted channel, if any.
    pub fn add(&mut self, channel: ChannelId, limits: &Limits) -> Option<ChannelId> {
        let evicted = if self.entries.len() >= limits.max_channels_per_user {
            Some(self.entries.remove(0))
        } else {
            None
        };
        self.entries.push(channel);
        evicted
    }

    pub fn remove(&mut self, channel: ChannelId) -> bool {
        if let Some(idx) = self.entries.iter().position(|&c| c == channel) {
            self.entries.remove(idx);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, channel: ChannelId) -> bool {
        self.entries.contains(&channel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelId> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::limits::Creation;

    fn key(arena: &mut Arena<()>) -> ChannelId {
        arena.insert(())
    }

    #[test]
    fn add_invite_populates_both_sides_of_the_edge() {
        let mut arena = Arena::new();
        let chan_id = key(&mut arena);
        let mut channel = Channel::new("#x", Creation::At(1));
        let mut user_invites = UserInvites::default();

        let evicted = add_invite(&mut channel, &mut user_invites, 1, chan_id, &Limits::default());
        assert_eq!(evicted, None);
        assert!(has_invite(&channel, 1));
        assert!(user_invites.contains(chan_id));
    }

    #[test]
    fn add_invite_is_a_noop_if_already_invited() {
        let mut arena = Arena::new();
        let chan_id = key(&mut arena);
        let mut channel = Channel::new("#x", Creation::At(1));
        let mut user_invites = UserInvites::default();

        add_invite(&mut channel, &mut user_invites, 1, chan_id, &Limits::default());
        add_invite(&mut channel, &mut user_invites, 1, chan_id, &Limits::default());
        assert_eq!(channel.invites.len(), 1);
        assert_eq!(user_invites.len(), 1);
    }

    #[test]
    fn del_invite_removes_from_both_sides() {
        let mut arena = Arena::new();
        let chan_id = key(&mut arena);
        let mut channel = Channel::new("#x", Creation::At(1));
        let mut user_invites = UserInvites::default();

        add_invite(&mut channel, &mut user_invites, 1, chan_id, &Limits::default());
        del_invite(&mut channel, &mut user_invites, 1, chan_id);
        assert!(!has_invite(&channel, 1));
        assert!(!user_invites.contains(chan_id));
    }

    #[test]
    fn oldest_invite_evicted_on_overflow() {
        let mut arena = Arena::new();
        let limits = Limits { max_channels_per_user: 2, ..Limits::default() };
        let mut invites = UserInvites::default();

        let a = key(&mut arena);
        let b = key(&mut arena);
        let c = key(&mut arena);

        assert_eq!(invites.add(a, &limits), None);
        assert_eq!(invites.add(b, &limits), None);
        let evicted = invites.add(c, &limits);
        assert_eq!(evicted, Some(a));
        assert!(!invites.contains(a));
        assert!(invites.contains(b));
        assert!(invites.contains(c));
        assert_eq!(invites.len(), 2);
    }
}
