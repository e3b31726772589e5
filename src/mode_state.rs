//! Simple channel mode bitmask ([C7]).
//!
//! `slirc_proto::ChannelMode` models the modern mode set used for
//! client-facing parsing of arbitrary mode letters, but it has no
//! `Private` variant and no notion of the classic `p`/`s` exclusion
//! rule this subsystem depends on, so the simple modes get their own
//! bitflags type here.

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SimpleModes: u16 {
        /// `p` - hidden from LIST/WHO unless a member; mutually exclusive with SECRET.
        const PRIVATE   = 0x0001;
        /// `s` - hidden from LIST/WHO and from WHOIS of non-members.
        const SECRET    = 0x0002;
        /// `m` - only voiced-or-above may send channel messages.
        const MODERATED = 0x0004;
        /// `t` - only chanops may change the topic.
        const TOPIC_LOCK = 0x0008;
        /// `i` - JOIN requires an invite or matching key.
        const INVITE_ONLY = 0x0010;
        /// `n` - messages from non-members are rejected.
        const NO_EXTERNAL = 0x0020;
        /// `k` - a key is set (the key text itself lives on [`crate::channel::Channel`]).
        const KEY_SET   = 0x0080;
        /// `l` - a user limit is set (the number itself lives on [`crate::channel::Channel`]).
        const LIMIT_SET = 0x0100;
    }
}

impl SimpleModes {
    /// Apply the `p`/`s` exclusion rule: setting one clears the other
    /// within the same transition (§4.7, invariant 4 in §3).
    pub fn set_private(&mut self) {
        self.insert(SimpleModes::PRIVATE);
        self.remove(SimpleModes::SECRET);
    }

    pub fn set_secret(&mut self) {
        self.insert(SimpleModes::SECRET);
        self.remove(SimpleModes::PRIVATE);
    }

    /// Render the set bits (minus KEY_SET/LIMIT_SET, which are
    /// rendered by the mode-string builder alongside their values) as
    /// a mode-letter string in canonical order.
    pub fn letters(&self) -> String {
        let mut s = String::new();
        if self.contains(SimpleModes::PRIVATE) {
            s.push('p');
        }
        if self.contains(SimpleModes::SECRET) {
            s.push('s');
        }
        if self.contains(SimpleModes::MODERATED) {
            s.push('m');
        }
        if self.contains(SimpleModes::TOPIC_LOCK) {
            s.push('t');
        }
        if self.contains(SimpleModes::INVITE_ONLY) {
            s.push('i');
        }
        if self.contains(SimpleModes::NO_EXTERNAL) {
            s.push('n');
        }
        s
    }
}
