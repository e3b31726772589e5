//! Size and count caps for channel state.
//!
//! These mirror the constants a classic ircd hardcodes in its headers
//! (`NICKLEN`, `MAXBANS`, ...), but here they are loaded from the
//! server's config file so an operator can retune them without a
//! rebuild. [`Limits::default`] matches the historical ircu defaults.

use serde::{Deserialize, Serialize};

/// Channel-subsystem size and count caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub nick_len: usize,
    pub user_len: usize,
    pub host_len: usize,
    pub key_len: usize,
    pub channel_len: usize,
    pub topic_len: usize,

    /// Maximum number of bans on a single channel.
    pub max_bans: usize,
    /// Maximum combined length (in bytes) of every ban mask on a channel.
    pub max_ban_length: usize,
    /// Maximum number of pending invites a single user may hold.
    pub max_channels_per_user: usize,
    /// Maximum number of parameterised mode changes batched per [`crate::modebuf::ModeBuf`] flush.
    pub max_mode_params: usize,
    /// Maximum number of channel names batched per [`crate::joinpart::JoinBuf`] flush.
    pub max_join_args: usize,

    /// Fuzz factor subtracted from the protocol's hard line length when
    /// deciding whether one more token fits in an outbound frame.
    pub buffer_fuzz: usize,
    /// Hard protocol line length (including the trailing CR-LF).
    pub max_line_len: usize,

    /// Window (in seconds) within which an incoming timestamp that is
    /// merely "a bit smaller" than ours is still accepted rather than
    /// treated as a hostile rewrite.
    pub ts_lag: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            nick_len: 15,
            user_len: 10,
            host_len: 63,
            key_len: 23,
            channel_len: 200,
            topic_len: 160,
            max_bans: 45,
            max_ban_length: 1024,
            max_channels_per_user: 15,
            max_mode_params: 6,
            max_join_args: 15,
            buffer_fuzz: 30,
            max_line_len: 512,
            ts_lag: 1,
        }
    }
}

/// Sentinel in-band creation-timestamp values, per the data model's
/// notes on `MAGIC_PENDING`/`MAGIC_OPER_OVERRIDE`. Modelled as an
/// explicit enum rather than riding on the timestamp itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creation {
    /// Timestamp not yet known; the first authoritative peer wins.
    Pending,
    /// A concrete creation time, in seconds since the epoch.
    At(i64),
}

impl Creation {
    /// The raw value as it would have appeared on the wire (0 for pending).
    pub fn as_wire(self) -> i64 {
        match self {
            Creation::Pending => 0,
            Creation::At(t) => t,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Creation::Pending)
    }
}
