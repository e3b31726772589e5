//! Channel and membership data model (§3).

use crate::ban::Ban;
use crate::invite::Invite;
use crate::limits::Creation;
use crate::mode_state::SimpleModes;

/// Opaque handle to a [`Channel`] inside a [`crate::store::ChannelStore`].
pub type ChannelId = crate::arena::Key;

/// Opaque handle to a [`Membership`] inside [`crate::membership::MembershipGraph`].
pub type MembershipId = crate::arena::Key;

/// Opaque handle to a user, owned by the external collaborator that
/// manages the client registry. The core never interprets this beyond
/// equality and using it as a map key.
pub type UserId = u32;

/// A named chat room. Owns its mode state, ban list, and invite list.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    /// Case-folded form of `name`, used as the store index key.
    pub folded_name: String,
    pub creation: Creation,
    pub topic: Option<Topic>,
    pub modes: SimpleModes,
    pub limit: u32,
    pub key: Option<String>,
    pub members: Vec<MembershipId>,
    pub bans: Vec<Ban>,
    pub invites: Vec<Invite>,
    /// Set by the LIST engine while a resumable scan references this
    /// channel as its next-cursor position; consulted by teardown.
    pub listed: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>, creation: Creation) -> Self {
        let name = name.into();
        let folded_name = slirc_proto::irc_to_lower(&name);
        Channel {
            name,
            folded_name,
            creation,
            topic: None,
            modes: SimpleModes::empty(),
            limit: 0,
            key: None,
            members: Vec::new(),
            bans: Vec::new(),
            invites: Vec::new(),
            listed: false,
        }
    }

    /// Number of non-zombie members currently on the channel.
    pub fn active_member_count(&self, graph: &crate::membership::MembershipGraph) -> usize {
        self.members
            .iter()
            .filter(|&&m| graph.get(m).map(|m| !m.is_zombie()).unwrap_or(false))
            .count()
    }
}

/// A channel topic together with who set it and when.
#[derive(Debug, Clone)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

bitflags::bitflags! {
    /// Per-membership status bits (§3, "Membership").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MemberStatus: u16 {
        const CHANOP           = 0x0001;
        const VOICE            = 0x0002;
        const DEOPPED          = 0x0004;
        const SERVER_OP_OK     = 0x0008;
        const ZOMBIE           = 0x0010;
        const BAN_VALID        = 0x0020;
        const BANNED           = 0x0040;
        const BURST_JOIN       = 0x0080;
        const BURST_BAN_WIPEOUT = 0x0100;
    }
}

/// An edge "user U is in channel C" (§3, "Membership").
#[derive(Debug, Clone)]
pub struct Membership {
    pub user: UserId,
    pub channel: ChannelId,
    pub status: MemberStatus,
}

impl Membership {
    pub fn new(user: UserId, channel: ChannelId) -> Self {
        Membership { user, channel, status: MemberStatus::empty() }
    }

    pub fn is_chanop(&self) -> bool {
        self.status.contains(MemberStatus::CHANOP)
    }

    pub fn is_voiced(&self) -> bool {
        self.status.contains(MemberStatus::VOICE)
    }

    pub fn is_zombie(&self) -> bool {
        self.status.contains(MemberStatus::ZOMBIE)
    }

    /// True if the cached ban bit can be trusted without a fresh
    /// `is_banned` recheck (invariant 3 in §3).
    pub fn ban_cache_valid(&self) -> bool {
        self.status.contains(MemberStatus::BAN_VALID)
    }

    pub fn cached_banned(&self) -> bool {
        self.status.contains(MemberStatus::BANNED)
    }

    pub fn invalidate_ban_cache(&mut self) {
        self.status.remove(MemberStatus::BAN_VALID);
    }

    pub fn set_ban_cache(&mut self, banned: bool) {
        self.status.insert(MemberStatus::BAN_VALID);
        self.status.set(MemberStatus::BANNED, banned);
    }
}
