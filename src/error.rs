//! Error classification for the channel subsystem.
//!
//! Every variant here corresponds to a row in the error handling table:
//! each carries the numeric reply the external send layer should emit to
//! the originating client, and nothing here is ever propagated as a hard
//! failure — callers match on the variant and decide locally whether to
//! drop the offending element, bounce it, or deny the command outright.

use thiserror::Error;

/// A channel-subsystem error, tagged with the legacy numeric reply code
/// so the (external) send layer can format the right line back to the
/// client without re-deriving it from the variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChanError {
    #[error("no such nick/channel: {0}")]
    NoSuchNick(String),

    #[error("{0} is not on channel {1}")]
    NotOnChannel(String, String),

    #[error("you're not a channel operator on {0}")]
    ChanOpsNeeded(String),

    #[error("channel key already set on {0}")]
    KeySet(String),

    #[error("channel ban list for {0} is full")]
    BanListFull(String, String),

    #[error("{0} is a network service")]
    ChannelService(String),

    #[error("{0} is a local channel operator on {1}")]
    OperOnLocalChan(String, String),

    #[error("can't join {0}: invite only")]
    InviteOnly(String),

    #[error("can't join {0}: channel is full")]
    ChannelFull(String),

    #[error("can't join {0}: you are banned")]
    Banned(String),

    #[error("can't join {0}: bad channel key")]
    BadChannelKey(String),

    #[error("hack suspected on {0} (severity {1})")]
    HackSuspected(String, u8),
}

impl ChanError {
    /// The legacy numeric reply this error maps to, where one exists.
    pub fn numeric(&self) -> Option<u16> {
        match self {
            ChanError::NoSuchNick(_) => Some(401),
            ChanError::NotOnChannel(..) => Some(441),
            ChanError::ChanOpsNeeded(_) => Some(482),
            ChanError::KeySet(_) => Some(467),
            ChanError::BanListFull(..) => Some(478),
            ChanError::ChannelService(_) => Some(484),
            ChanError::OperOnLocalChan(..) => None, // ERR_ISOPERLCHAN, network-specific
            ChanError::InviteOnly(_) => Some(473),
            ChanError::ChannelFull(_) => Some(471),
            ChanError::Banned(_) => Some(474),
            ChanError::BadChannelKey(_) => Some(475),
            ChanError::HackSuspected(..) => None,
        }
    }
}

/// Result alias used throughout the subsystem.
pub type ChanResult<T> = Result<T, ChanError>;
