//! Resumable LIST cursor ([C12]): §4.12.
//!
//! A single call advances a cursor over the channel store by up to
//! `nr` matching entries and leaves its position parked on
//! [`crate::channel::Channel::listed`] so that a channel the cursor is
//! about to visit next survives a concurrent teardown without losing
//! the caller's place (`ChannelStore::teardown` already advances past
//! whatever channel the cursor references).

use crate::channel::{Channel, ChannelId, UserId};
use crate::membership::MembershipGraph;
use crate::mode_state::SimpleModes;
use crate::store::ChannelStore;

/// Predicate bounds for one LIST invocation. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub min_members: Option<usize>,
    pub max_members: Option<usize>,
    pub min_creation: Option<i64>,
    pub max_creation: Option<i64>,
    pub min_topic_time: Option<i64>,
    pub max_topic_time: Option<i64>,
}

impl ListFilter {
    fn matches(&self, channel: &Channel, member_count: usize) -> bool {
        if let Some(min) = self.min_members {
            if member_count < min {
                return false;
            }
        }
        if let Some(max) = self.max_members {
            if member_count > max {
                return false;
            }
        }
        if let Some(min) = self.min_creation {
            if channel.creation.as_wire() < min {
                return false;
            }
        }
        if let Some(max) = self.max_creation {
            if channel.creation.as_wire() > max {
                return false;
            }
        }
        if self.min_topic_time.is_some() || self.max_topic_time.is_some() {
            let Some(topic) = &channel.topic else {
                return false;
            };
            if let Some(min) = self.min_topic_time {
                if topic.set_at < min {
                    return false;
                }
            }
            if let Some(max) = self.max_topic_time {
                if topic.set_at > max {
                    return false;
                }
            }
        }
        true
    }
}

/// One channel as it should appear on a LIST reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub channel: ChannelId,
    pub name: String,
    pub member_count: usize,
    pub topic: Option<String>,
}

/// A channel marked `+p` or `+s` is omitted from LIST for anyone not a
/// member of it.
fn visible_to(channel: &Channel, is_member: bool) -> bool {
    if channel.modes.intersects(SimpleModes::PRIVATE | SimpleModes::SECRET) {
        is_member
    } else {
        true
    }
}

/// Emit up to `nr` channels matching `filter`, resuming from wherever
/// the store's cursor was last left (or the start of the store, on a
/// fresh scan). Advances and re-parks the cursor before returning.
pub fn list_page(
    store: &mut ChannelStore,
    graph: &MembershipGraph,
    requester: UserId,
    filter: &ListFilter,
    nr: usize,
) -> Vec<ListEntry> {
    let previous_cursor = store.list_cursor();
    let mut current = previous_cursor.or_else(|| store.iter().next().map(|(id, _)| id));

    let mut entries = Vec::new();
    while let Some(id) = current {
        if entries.len() >= nr {
            break;
        }
        if let Some(c) = store.channel(id) {
            let count = c.active_member_count(graph);
            let is_member = graph.find(store, id, requester).is_some();
            if filter.matches(c, count) && visible_to(c, is_member) {
                entries.push(ListEntry {
                    channel: id,
                    name: c.name.clone(),
                    member_count: count,
                    topic: c.topic.as_ref().map(|t| t.text.clone()),
                });
            }
        }
        current = store.next_after(id);
    }

    if let Some(old) = previous_cursor {
        if Some(old) != current {
            if let Some(c) = store.channel_mut(old) {
                c.listed = false;
            }
        }
    }
    store.set_list_cursor(current);
    if let Some(next) = current {
        if let Some(c) = store.channel_mut(next) {
            c.listed = true;
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Creation;

    fn setup(names: &[&str]) -> ChannelStore {
        let mut store = ChannelStore::new();
        for (i, name) in names.iter().enumerate() {
            store.get_or_create(name, Creation::At(100 + i as i64));
        }
        store
    }

    #[test]
    fn scan_resumes_across_calls_and_exhausts_the_store() {
        let mut store = setup(&["#a", "#b", "#c"]);
        let graph = MembershipGraph::new();
        let filter = ListFilter::default();

        let page1 = list_page(&mut store, &graph, 1, &filter, 2);
        assert_eq!(page1.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["#a", "#b"]);
        assert!(store.list_cursor().is_some());

        let page2 = list_page(&mut store, &graph, 1, &filter, 2);
        assert_eq!(page2.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["#c"]);
        assert!(store.list_cursor().is_none(), "scan should be exhausted");
    }

    #[test]
    fn member_count_bounds_filter_out_non_matching_channels() {
        let mut store = setup(&["#empty", "#full"]);
        let mut graph = MembershipGraph::new();
        let full_id = store.get("#full").unwrap();
        graph.add(&mut store, full_id, 1);
        graph.add(&mut store, full_id, 2);

        let filter = ListFilter { min_members: Some(1), ..ListFilter::default() };
        let page = list_page(&mut store, &graph, 99, &filter, 10);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "#full");
    }

    #[test]
    fn secret_channel_is_hidden_from_a_non_member() {
        let mut store = setup(&["#open", "#hidden"]);
        let mut graph = MembershipGraph::new();
        let hidden_id = store.get("#hidden").unwrap();
        store.channel_mut(hidden_id).unwrap().modes.insert(SimpleModes::SECRET);
        let member_mid = graph.add(&mut store, hidden_id, 1);
        let _ = member_mid;

        let filter = ListFilter::default();
        let as_outsider = list_page(&mut store, &graph, 2, &filter, 10);
        assert_eq!(as_outsider.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec!["#open"]);
    }

    #[test]
    fn secret_channel_is_visible_to_one_of_its_members() {
        let mut store = setup(&["#hidden"]);
        let mut graph = MembershipGraph::new();
        let hidden_id = store.get("#hidden").unwrap();
        store.channel_mut(hidden_id).unwrap().modes.insert(SimpleModes::SECRET);
        graph.add(&mut store, hidden_id, 1);

        let filter = ListFilter::default();
        let as_member = list_page(&mut store, &graph, 1, &filter, 10);
        assert_eq!(as_member.len(), 1);
    }

    #[test]
    fn teardown_mid_scan_advances_the_cursor() {
        let mut store = setup(&["#a", "#b", "#c"]);
        let graph = MembershipGraph::new();
        let filter = ListFilter::default();

        let _ = list_page(&mut store, &graph, 1, &filter, 1);
        let cursor = store.list_cursor().unwrap();
        assert_eq!(store.channel(cursor).unwrap().name, "#b");

        store.teardown(cursor);
        assert_eq!(store.channel(store.list_cursor().unwrap()).unwrap().name, "#c");
    }
}
