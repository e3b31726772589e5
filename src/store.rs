//! Global channel index ([C3]): case-folded lookup, creation, teardown.

use std::collections::HashMap;

use crate::arena::Arena;
use crate::channel::{Channel, ChannelId};
use crate::limits::Creation;

/// Associative index from case-folded channel name to [`Channel`], plus
/// the arena that owns every live channel.
#[derive(Default)]
pub struct ChannelStore {
    channels: Arena<Channel>,
    by_name: HashMap<String, ChannelId>,
    /// Channel a resumable LIST cursor currently points at, if any.
    /// Consulted and advanced by [`ChannelStore::teardown`].
    list_cursor: Option<ChannelId>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ChannelId> {
        let folded = slirc_proto::irc_to_lower(name);
        self.by_name.get(&folded).copied()
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.get_mut(id)
    }

    /// Look up `name`, creating it with `creation` if it doesn't exist.
    /// Returns `(id, created)`.
    pub fn get_or_create(&mut self, name: &str, creation: Creation) -> (ChannelId, bool) {
        if let Some(id) = self.get(name) {
            return (id, false);
        }
        let channel = Channel::new(name, creation);
        let folded = channel.folded_name.clone();
        let id = self.channels.insert(channel);
        self.by_name.insert(folded, id);
        (id, true)
    }

    /// Set (or advance) the channel the LIST cursor is currently
    /// resting on, per §4.12.
    pub fn set_list_cursor(&mut self, id: Option<ChannelId>) {
        self.list_cursor = id;
    }

    pub fn list_cursor(&self) -> Option<ChannelId> {
        self.list_cursor
    }

    /// The next channel after `id` in arena iteration order, used both
    /// by LIST to resume and by teardown to advance a cursor pointing
    /// at the channel being destroyed.
    pub fn next_after(&self, id: ChannelId) -> Option<ChannelId> {
        let mut found = false;
        for (key, _) in self.channels.iter() {
            if found {
                return Some(key);
            }
            if key == id {
                found = true;
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &Channel)> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Destroy a channel that has lost its last non-zombie member
    /// (§4.3, `sub1_from_channel`). If the LIST cursor references this
    /// channel, advance it one step first so a concurrent LIST scan
    /// doesn't stall on a freed entry. Frees the ban and invite lists
    /// (they're owned inline by `Channel`, so this is just drop) and
    /// unlinks from both the index and the arena.
    pub fn teardown(&mut self, id: ChannelId) {
        if self.list_cursor == Some(id) {
            self.list_cursor = self.next_after(id);
        }
        if let Some(channel) = self.channels.get(id) {
            tracing::debug!(channel = %channel.name, "destroying empty channel");
            self.by_name.remove(&channel.folded_name);
        }
        self.channels.remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent_on_name() {
        let mut store = ChannelStore::new();
        let (id1, created1) = store.get_or_create("#Test", Creation::At(100));
        assert!(created1);
        let (id2, created2) = store.get_or_create("#test", Creation::At(200));
        assert!(!created2);
        assert_eq!(id1, id2);
    }

    #[test]
    fn teardown_removes_from_index_and_arena() {
        let mut store = ChannelStore::new();
        let (id, _) = store.get_or_create("#chan", Creation::At(1));
        assert!(store.get("#chan").is_some());
        store.teardown(id);
        assert!(store.get("#chan").is_none());
        assert!(store.channel(id).is_none());
    }

    #[test]
    fn teardown_advances_a_cursor_pointing_at_the_destroyed_channel() {
        let mut store = ChannelStore::new();
        let (a, _) = store.get_or_create("#a", Creation::At(1));
        let (b, _) = store.get_or_create("#b", Creation::At(2));
        store.set_list_cursor(Some(a));
        store.teardown(a);
        assert_eq!(store.list_cursor(), Some(b));
    }
}
