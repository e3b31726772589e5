//! Join/Part/Kick engine ([C11]): `can_join` preconditions, the
//! `JoinBuf` batched fan-out, and zombification across a split (§4.11).

use crate::channel::{Channel, ChannelId, MemberStatus, MembershipId, UserId};
use crate::error::ChanError;
use crate::limits::{Creation, Limits};
use crate::membership::MembershipGraph;
use crate::mode_state::SimpleModes;
use crate::store::ChannelStore;
use crate::wire::{self, Dest, Frame};

/// `&`-prefixed channels never propagate past the local server.
pub fn is_local_channel_name(name: &str) -> bool {
    name.starts_with('&')
}

/// `+`-prefixed channels have no chanop concept; everyone on them is a
/// peon, so a creator never receives the automatic `+o`.
pub fn is_modeless_channel_name(name: &str) -> bool {
    name.starts_with('+')
}

/// Check every join precondition in the fixed order §4.11 specifies,
/// short-circuiting on the first failure. `has_invite` bypasses every
/// check below it. `key_ring` is the client's comma-separated key
/// argument; any element matching the channel key grants entry.
pub fn can_join(
    channel: &Channel,
    member_count: usize,
    has_invite: bool,
    is_banned: bool,
    key_ring: Option<&str>,
) -> Result<(), ChanError> {
    if has_invite {
        return Ok(());
    }
    if channel.modes.contains(SimpleModes::INVITE_ONLY) {
        return Err(ChanError::InviteOnly(channel.name.clone()));
    }
    if channel.modes.contains(SimpleModes::LIMIT_SET) && member_count as u32 >= channel.limit {
        return Err(ChanError::ChannelFull(channel.name.clone()));
    }
    if is_banned {
        return Err(ChanError::Banned(channel.name.clone()));
    }
    if channel.modes.contains(SimpleModes::KEY_SET) {
        let matches = match (channel.key.as_deref(), key_ring) {
            (Some(expected), Some(ring)) => ring.split(',').any(|k| k == expected),
            _ => false,
        };
        if !matches {
            return Err(ChanError::BadChannelKey(channel.name.clone()));
        }
    }
    Ok(())
}

/// What an entry queued on a [`JoinBuf`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Join,
    Create,
    Part,
}

struct Pending {
    kind: JoinKind,
    name: String,
}

/// Accumulates JOIN/CREATE/PART notifications for one source and fans
/// them out as comma-joined channel-name lists, analogous to
/// [`crate::modebuf::ModeBuf`] but for channel membership rather than
/// mode letters.
pub struct JoinBuf {
    source: String,
    comment: Option<String>,
    dest: Dest,
    limits: Limits,
    pending: Vec<Pending>,
}

impl JoinBuf {
    pub fn new(source: impl Into<String>, comment: Option<String>, dest: Dest, limits: Limits) -> Self {
        JoinBuf { source: source.into(), comment, dest, limits, pending: Vec::new() }
    }

    pub fn queue(&mut self, name: impl Into<String>, kind: JoinKind) {
        self.pending.push(Pending { kind, name: name.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Run the flush algorithm once. If `all`, keep flushing until the
    /// buffer is drained; otherwise flush one bounded batch and leave
    /// the rest queued.
    pub fn flush(&mut self, all: bool) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            let batch = self.take_batch();
            if batch.is_empty() {
                break;
            }
            frames.extend(self.emit_batch(&batch));
            if !all || self.pending.is_empty() {
                break;
            }
        }
        frames
    }

    /// Stop a batch at `MAX_JOIN_ARGS` entries or at the line-length
    /// budget, whichever comes first.
    fn take_batch(&mut self) -> Vec<Pending> {
        let budget = wire::line_budget(&self.limits);
        let mut running_len = self.source.len() + 16;
        let mut batch = Vec::new();
        while !self.pending.is_empty() {
            if batch.len() >= self.limits.max_join_args {
                break;
            }
            let tok_len = self.pending[0].name.len() + 1;
            if running_len + tok_len > budget {
                break;
            }
            running_len += tok_len;
            batch.push(self.pending.remove(0));
        }
        batch
    }

    fn emit_batch(&self, batch: &[Pending]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let names: Vec<&str> = batch.iter().map(|p| p.name.as_str()).collect();
        let is_part = batch.iter().all(|p| p.kind == JoinKind::Part);
        let verb = if is_part { "PART" } else { "JOIN" };

        let mut text = format!(":{} {} {}", self.source, verb, names.join(","));
        if is_part {
            if let Some(comment) = &self.comment {
                text.push_str(" :");
                text.push_str(comment);
            }
        }
        frames.push(Frame { dest: self.dest, text });

        // On create, hand the creator operator status unless the
        // channel has no mode concept at all.
        for p in batch {
            if p.kind == JoinKind::Create && !is_modeless_channel_name(&p.name) {
                frames.push(Frame {
                    dest: self.dest,
                    text: format!(":{} MODE {} +o {}", self.source, p.name, self.source),
                });
            }
        }
        frames
    }
}

/// `add_user_to_channel` (§4.4/§4.11): look up or create the channel and
/// link `user` to it. Returns the channel id, the new membership id, and
/// whether the channel was just created (the caller uses this to decide
/// whether to queue a [`JoinKind::Create`] rather than `Join`, and to
/// hand the creator ops).
pub fn add_user_to_channel(
    store: &mut ChannelStore,
    graph: &mut MembershipGraph,
    name: &str,
    creation: Creation,
    user: UserId,
) -> (ChannelId, MembershipId, bool) {
    let (channel_id, created) = store.get_or_create(name, creation);
    let membership_id = graph.add(store, channel_id, user);
    if created && !is_modeless_channel_name(name) {
        if let Some(m) = graph.get_mut(membership_id) {
            m.status.insert(MemberStatus::CHANOP);
        }
    }
    (channel_id, membership_id, created)
}

/// `remove_user_from_channel` (§4.4): a plain voluntary PART, never
/// zombified. Returns `true` iff the channel still exists afterward.
pub fn remove_user_from_channel(store: &mut ChannelStore, graph: &mut MembershipGraph, membership: MembershipId) -> bool {
    graph.remove(store, membership)
}

/// How a KICK/PART arriving from a peer should be resolved against a
/// possibly-partitioned membership (§4.11's zombification rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureKind {
    /// Target is a local client: apply the KICK directly.
    RemoveLocal,
    /// Target is remote but reachable through the same peer link the
    /// KICK arrived from: no partition is in play, unlink outright.
    RemoveRemote,
    /// Target is remote and reachable through a different peer: the
    /// link may be split, so tombstone instead of unlinking.
    Zombify,
}

/// Classify a departure per §4.11: local targets are always applied
/// directly; a remote target is only zombified if it's reachable
/// through a different peer link than the one the command arrived on.
pub fn classify_departure(target_is_local: bool, same_peer_as_origin: bool) -> DepartureKind {
    if target_is_local {
        DepartureKind::RemoveLocal
    } else if same_peer_as_origin {
        DepartureKind::RemoveRemote
    } else {
        DepartureKind::Zombify
    }
}

/// Apply a classified departure. Unlinking runs the usual
/// empty-channel teardown; zombifying doesn't unlink anything, but a
/// zombification can itself be the event that leaves a channel with no
/// non-zombie member, so the teardown check still runs. Returns `true`
/// iff the channel still exists afterward.
pub fn depart_user(
    store: &mut ChannelStore,
    graph: &mut MembershipGraph,
    channel: ChannelId,
    membership: MembershipId,
    kind: DepartureKind,
) -> bool {
    match kind {
        DepartureKind::RemoveLocal | DepartureKind::RemoveRemote => graph.remove(store, membership),
        DepartureKind::Zombify => {
            if let Some(m) = graph.get_mut(membership) {
                m.status.insert(MemberStatus::ZOMBIE);
            }
            graph.teardown_if_all_zombies(store, channel)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits::default()
    }

    #[test]
    fn invite_bypasses_every_other_check() {
        let mut channel = Channel::new("#x", Creation::At(1));
        channel.modes.insert(SimpleModes::INVITE_ONLY);
        channel.limit = 0;
        channel.modes.insert(SimpleModes::LIMIT_SET);
        assert!(can_join(&channel, 999, true, true, None).is_ok());
    }

    #[test]
    fn invite_only_rejects_without_an_invite() {
        let mut channel = Channel::new("#x", Creation::At(1));
        channel.modes.insert(SimpleModes::INVITE_ONLY);
        assert_eq!(can_join(&channel, 0, false, false, None), Err(ChanError::InviteOnly("#x".to_string())));
    }

    #[test]
    fn full_channel_rejects_before_checking_ban_or_key() {
        let mut channel = Channel::new("#x", Creation::At(1));
        channel.modes.insert(SimpleModes::LIMIT_SET);
        channel.limit = 2;
        assert_eq!(can_join(&channel, 2, false, true, None), Err(ChanError::ChannelFull("#x".to_string())));
    }

    #[test]
    fn banned_is_checked_before_the_key() {
        let mut channel = Channel::new("#x", Creation::At(1));
        channel.modes.insert(SimpleModes::KEY_SET);
        channel.key = Some("letmein".to_string());
        assert_eq!(can_join(&channel, 0, false, true, None), Err(ChanError::Banned("#x".to_string())));
    }

    #[test]
    fn key_ring_grants_entry_on_any_matching_element() {
        let mut channel = Channel::new("#x", Creation::At(1));
        channel.modes.insert(SimpleModes::KEY_SET);
        channel.key = Some("letmein".to_string());
        assert!(can_join(&channel, 0, false, false, Some("wrong,letmein,other")).is_ok());
        assert_eq!(
            can_join(&channel, 0, false, false, Some("wrong,stillwrong")),
            Err(ChanError::BadChannelKey("#x".to_string()))
        );
    }

    #[test]
    fn creating_a_channel_grants_chanop_unless_modeless() {
        let mut store = ChannelStore::new();
        let mut graph = MembershipGraph::new();
        let (_, mid, created) = add_user_to_channel(&mut store, &mut graph, "#x", Creation::At(1), 1);
        assert!(created);
        assert!(graph.get(mid).unwrap().is_chanop());

        let (_, mid2, created2) = add_user_to_channel(&mut store, &mut graph, "+announce", Creation::At(1), 2);
        assert!(created2);
        assert!(!graph.get(mid2).unwrap().is_chanop());
    }

    #[test]
    fn joining_an_existing_channel_grants_no_ops() {
        let mut store = ChannelStore::new();
        let mut graph = MembershipGraph::new();
        let (chan, _, _) = add_user_to_channel(&mut store, &mut graph, "#x", Creation::At(1), 1);
        let (_, mid2, created2) = add_user_to_channel(&mut store, &mut graph, "#x", Creation::At(1), 2);
        assert!(!created2);
        assert!(!graph.get(mid2).unwrap().is_chanop());
        assert_eq!(store.channel(chan).unwrap().members.len(), 2);
    }

    #[test]
    fn zombifying_the_last_active_member_tears_down_the_channel() {
        let mut store = ChannelStore::new();
        let mut graph = MembershipGraph::new();
        let (chan, mid, _) = add_user_to_channel(&mut store, &mut graph, "#x", Creation::At(1), 1);

        let still_exists = depart_user(&mut store, &mut graph, chan, mid, DepartureKind::Zombify);
        assert!(!still_exists, "a channel with only zombies left must be torn down");
        assert!(store.get("#x").is_none());
    }

    #[test]
    fn zombifying_one_of_two_members_keeps_the_channel_alive() {
        let mut store = ChannelStore::new();
        let mut graph = MembershipGraph::new();
        let (chan, mid1, _) = add_user_to_channel(&mut store, &mut graph, "#x", Creation::At(1), 1);
        let (_, _mid2, _) = add_user_to_channel(&mut store, &mut graph, "#x", Creation::At(1), 2);

        let still_exists = depart_user(&mut store, &mut graph, chan, mid1, DepartureKind::Zombify);
        assert!(still_exists);
        assert!(graph.get(mid1).unwrap().is_zombie());
    }

    #[test]
    fn join_buf_flushes_join_then_create_mode() {
        let mut buf = JoinBuf::new("nick", None, Dest::CHANNEL, limits());
        buf.queue("#x", JoinKind::Create);
        let frames = buf.flush(true);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].text.contains("JOIN #x"));
        assert!(frames[1].text.contains("MODE #x +o nick"));
    }

    #[test]
    fn join_buf_skips_the_op_frame_for_a_modeless_channel() {
        let mut buf = JoinBuf::new("nick", None, Dest::CHANNEL, limits());
        buf.queue("+announce", JoinKind::Create);
        let frames = buf.flush(true);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn join_buf_part_carries_the_comment() {
        let mut buf = JoinBuf::new("nick", Some("bye".to_string()), Dest::CHANNEL, limits());
        buf.queue("#x", JoinKind::Part);
        let frames = buf.flush(true);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].text.ends_with(":bye"));
    }

    #[test]
    fn join_buf_splits_after_max_join_args() {
        let limits = Limits { max_join_args: 1, ..Limits::default() };
        let mut buf = JoinBuf::new("nick", None, Dest::CHANNEL, limits);
        buf.queue("#a", JoinKind::Join);
        buf.queue("#b", JoinKind::Join);
        let first = buf.flush(false);
        assert_eq!(first.len(), 1);
        assert!(first[0].text.contains("#a"));
        assert!(!buf.is_empty());
        let second = buf.flush(false);
        assert!(second[0].text.contains("#b"));
        assert!(buf.is_empty());
    }
}
