//! Mode string parser ([C9]): per-character handling plus the
//! timestamp arbitration table that resolves conflicting concurrent
//! mode changes across a federated mesh (§4.9, §4.9.1).

use crate::ban::{self, AddBanOutcome, BanParseState};
use crate::channel::{Channel, MemberStatus, MembershipId, UserId};
use crate::error::ChanError;
use crate::limits::{Creation, Limits};
use crate::mode_state::SimpleModes;
use crate::modebuf::{ModeBuf, ModeDir};
use crate::wire::{Dest, Frame};

bitflags::bitflags! {
    /// Parse-wide flags threaded through from the command dispatcher.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ParseFlags: u16 {
        /// Source holds no channel-operator privilege.
        const NOT_OPER   = 0x0001;
        /// Source isn't even a member of the channel.
        const NOT_MEMBER = 0x0002;
        /// Apply changes, as opposed to a dry run (e.g. bare `+b` query).
        const SET        = 0x0004;
        /// Don't silently consume stray trailing arguments.
        const STRICT     = 0x0008;
        /// This parse is itself a bounce being replayed outbound.
        const BOUNCE     = 0x0010;
        /// Oper override: bypass channel-ops-needed and service checks.
        const FORCE      = 0x0020;
    }
}

/// External facts the parser needs but does not own the resolution
/// logic for (nick chase, numeric-nick lookup, split topology) — all
/// out of scope per the subsystem boundary.
pub trait TargetResolver {
    /// Resolve a mode argument naming a channel member to their user
    /// id and existing membership, if they're on the channel.
    fn resolve_member(&self, token: &str) -> Option<(UserId, MembershipId)>;
    /// True if `user` holds the "channel service" (+k-equivalent) flag.
    fn is_channel_service(&self, user: UserId) -> bool;
    /// True if `user` is a local IRC operator and `channel` is a
    /// locally-registered ("local") channel.
    fn is_local_oper_on_local_channel(&self, user: UserId, channel: &str) -> bool;
    /// True if `user` is reachable from the same peer link side as the
    /// parsing connection, i.e. not on the other side of a partition
    /// this parse just learned about.
    fn same_side_of_split(&self, user: UserId) -> bool;
    /// Peer-visible (numeric-nick) rendering of a resolved user.
    fn peer_name(&self, user: UserId) -> String;
    /// Client-visible (plain nick) rendering of a resolved user.
    fn client_name(&self, user: UserId) -> String;
}

/// `badop`/accept decision for a single creation-timestamp comparison
/// (§4.9.1). Kept as a plain struct rather than the source's bare
/// integer so every caller reads the fields by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TsArbitration {
    pub accept: bool,
    pub adopt: Option<i64>,
    pub badop: u8,
}

impl TsArbitration {
    pub fn should_bounce(&self, source_deopped: bool) -> bool {
        matches!(self.badop, 1 | 2) || source_deopped
    }

    pub fn hack_level(&self) -> Option<u8> {
        (self.badop >= 2).then_some(self.badop)
    }
}

/// Compare an incoming server-origin timestamp against the local
/// creation timestamp and decide whether to accept, adopt a new
/// value, or reject (§4.9.1's table).
pub fn arbitrate(
    t_in: i64,
    t_local: Creation,
    contains_deop: bool,
    contains_op: bool,
    from_uworld: bool,
) -> TsArbitration {
    let mut result = if t_in == 0 {
        TsArbitration { accept: true, adopt: None, badop: 2 }
    } else if t_local.is_pending() {
        TsArbitration { accept: true, adopt: Some(t_in), badop: 0 }
    } else {
        let local = t_local.as_wire();
        if t_in > local {
            if contains_deop {
                TsArbitration { accept: false, adopt: None, badop: 2 }
            } else if local == 0 && contains_op {
                TsArbitration { accept: true, adopt: Some(t_in), badop: 0 }
            } else {
                TsArbitration { accept: false, adopt: None, badop: 1 }
            }
        } else {
            TsArbitration { accept: true, adopt: Some(t_in.min(local)), badop: 0 }
        }
    };
    if from_uworld && result.badop >= 2 {
        result.badop = 4;
    }
    result
}

/// Everything that happened during one `mode_parse` call: whether an
/// oper override was used (the old `LocalChanOperMode` global, now a
/// plain return value per the design notes) and the frames produced.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub frames: Vec<Frame>,
    pub oper_override_used: bool,
    pub errors: Vec<ChanError>,
    /// Set if any ban was added or removed; the caller must then clear
    /// the ban-valid cache on every membership of this channel (§3,
    /// invariant 3 — `Channel` doesn't own the membership graph, so it
    /// can't do this itself).
    pub bans_changed: bool,
    /// Chanop/voice bit flips to apply to the membership graph, which
    /// this parser never touches directly (same reason as `bans_changed`).
    /// Emptied of its chanop entries if the trailing timestamp was
    /// rejected outright, so a bounced deop never takes local effect.
    pub status_changes: Vec<(MembershipId, MemberStatus, bool)>,
    /// Users whose invite to this channel was just dropped by `-i`
    /// (§4.7). The caller must remove the matching entry from each of
    /// these users' own `UserInvites`, since `Channel` only owns its
    /// side of the edge.
    pub invites_dropped: Vec<UserId>,
}

struct PendingBan {
    dir: ModeDir,
    mask: String,
}

/// Drives one MODE command against a channel's state.
pub struct ModeParser<'a, R: TargetResolver> {
    channel: &'a mut Channel,
    resolver: &'a R,
    limits: Limits,
    flags: ParseFlags,
    key_changed: bool,
    limit_changed: bool,
    pending_bans: Vec<PendingBan>,
    contains_op: bool,
    contains_deop: bool,
    now: i64,
}

impl<'a, R: TargetResolver> ModeParser<'a, R> {
    pub fn new(channel: &'a mut Channel, resolver: &'a R, limits: Limits, flags: ParseFlags, now: i64) -> Self {
        ModeParser {
            channel,
            resolver,
            limits,
            flags,
            key_changed: false,
            limit_changed: false,
            pending_bans: Vec::new(),
            contains_op: false,
            contains_deop: false,
            now,
        }
    }

    fn has_authority(&self) -> bool {
        if self.flags.contains(ParseFlags::FORCE) {
            return true;
        }
        if self.flags.contains(ParseFlags::NOT_MEMBER) {
            return false;
        }
        !self.flags.contains(ParseFlags::NOT_OPER)
    }

    /// Parse `mode_string` against `args`, applying changes directly
    /// to `self.channel` and accumulating output into `buf`. `server_ts`
    /// is the trailing creation-timestamp argument, if the source is a
    /// server and one was supplied.
    pub fn parse(
        &mut self,
        mode_string: &str,
        args: &[String],
        source: &str,
        server_ts: Option<i64>,
        from_uworld: bool,
        buf: &mut ModeBuf,
    ) -> ParseOutcome {
        let mut outcome = ParseOutcome::default();
        let mut arg_iter = args.iter();
        let mut dir = ModeDir::Plus;

        for ch in mode_string.chars() {
            match ch {
                '+' => dir = ModeDir::Plus,
                '-' => dir = ModeDir::Minus,
                'o' | 'v' => self.handle_prefix_mode(ch, dir, &mut arg_iter, buf, &mut outcome),
                'k' => self.handle_key(dir, &mut arg_iter, buf, &mut outcome),
                'l' => self.handle_limit(dir, &mut arg_iter, buf, &mut outcome),
                'b' => self.handle_ban(dir, &mut arg_iter, &mut outcome),
                'i' if dir == ModeDir::Minus => {
                    if !self.has_authority() {
                        outcome.errors.push(ChanError::ChanOpsNeeded(self.channel.name.clone()));
                    } else {
                        outcome.invites_dropped.extend(self.channel.invites.drain(..).map(|i| i.user));
                        buf.push_simple(dir, 'i');
                        self.channel.modes.remove(SimpleModes::INVITE_ONLY);
                    }
                }
                'p' | 's' | 'm' | 'n' | 't' | 'i' => {
                    self.handle_toggle(ch, dir, buf, &mut outcome);
                }
                _ => {} // unknown letters are ignored; the resolver layer never hands us them in STRICT mode
            }
        }

        if let Some(t_in) = server_ts {
            let arb = arbitrate(t_in, self.channel.creation, self.contains_deop, self.contains_op, from_uworld);
            if let Some(adopted) = arb.adopt {
                self.channel.creation = Creation::At(adopted);
            }
            if let Some(level) = arb.hack_level() {
                outcome.oper_override_used = level == 4;
            }
            if !arb.accept {
                outcome.status_changes.retain(|&(_, bit, _)| bit != MemberStatus::CHANOP);
            }
            if arb.should_bounce(false) {
                tracing::warn!(
                    channel = %self.channel.name,
                    badop = arb.badop,
                    t_in,
                    t_local = self.channel.creation.as_wire(),
                    "timestamp arbitration bounced incoming mode change"
                );
                outcome.errors.push(ChanError::HackSuspected(self.channel.name.clone(), arb.badop));
                let mut bounce_buf = ModeBuf::new(
                    "me",
                    buf.from_connection().map(str::to_owned),
                    self.channel.name.clone(),
                    Creation::At(0),
                    Dest::BOUNCE,
                    self.limits,
                );
                for change in buf.changes() {
                    match change.clone() {
                        crate::modebuf::ModeChange::Simple { dir, letter } => {
                            bounce_buf.push_simple(dir, letter);
                        }
                        crate::modebuf::ModeChange::Param { dir, letter, client_param, peer_param } => {
                            bounce_buf.push_param(dir, letter, client_param, peer_param);
                        }
                    }
                }
                outcome.frames.extend(bounce_buf.flush(true));
            }
        }

        self.resolve_ban_overlaps(buf, source, &mut outcome);
        outcome.frames.extend(buf.flush(true));
        outcome
    }

    fn handle_prefix_mode(
        &mut self,
        letter: char,
        dir: ModeDir,
        args: &mut std::slice::Iter<String>,
        buf: &mut ModeBuf,
        outcome: &mut ParseOutcome,
    ) {
        let Some(token) = args.next() else { return };
        let Some((user, membership_id)) = self.resolver.resolve_member(token) else {
            outcome.errors.push(ChanError::NotOnChannel(token.clone(), self.channel.name.clone()));
            return;
        };

        if letter == 'o' {
            if dir == ModeDir::Minus {
                if self.resolver.is_channel_service(user) && !self.flags.contains(ParseFlags::FORCE) {
                    outcome.errors.push(ChanError::ChannelService(token.clone()));
                    return;
                }
                if self.resolver.is_channel_service(user) {
                    outcome.oper_override_used = true;
                }
                if self.resolver.is_local_oper_on_local_channel(user, &self.channel.name) {
                    outcome.errors.push(ChanError::OperOnLocalChan(token.clone(), self.channel.name.clone()));
                    return;
                }
                self.contains_deop = true;
            } else {
                self.contains_op = true;
                if !self.resolver.same_side_of_split(user) {
                    outcome.errors.push(ChanError::HackSuspected(self.channel.name.clone(), 2));
                    return;
                }
            }
        }

        if !self.has_authority() {
            outcome.errors.push(ChanError::ChanOpsNeeded(self.channel.name.clone()));
            return;
        }

        buf.push_param(dir, letter, self.resolver.client_name(user), self.resolver.peer_name(user));
        let bit = if letter == 'o' { MemberStatus::CHANOP } else { MemberStatus::VOICE };
        outcome.status_changes.push((membership_id, bit, dir == ModeDir::Plus));
    }

    fn handle_key(&mut self, dir: ModeDir, args: &mut std::slice::Iter<String>, buf: &mut ModeBuf, outcome: &mut ParseOutcome) {
        if self.key_changed {
            return;
        }
        let Some(raw) = args.next() else { return };
        if !self.has_authority() {
            outcome.errors.push(ChanError::ChanOpsNeeded(self.channel.name.clone()));
            return;
        }
        let key: String = raw.chars().take_while(|&c| c != ' ' && c != ':').take(self.limits.key_len).collect();

        match dir {
            ModeDir::Plus => {
                if self.channel.key.is_some() && !self.flags.contains(ParseFlags::FORCE) {
                    outcome.errors.push(ChanError::KeySet(self.channel.name.clone()));
                    return;
                }
                self.channel.key = Some(key.clone());
                self.channel.modes.insert(SimpleModes::KEY_SET);
                buf.push_param(dir, 'k', key.clone(), key);
            }
            ModeDir::Minus => {
                if self.channel.key.as_deref() != Some(key.as_str()) && !self.flags.contains(ParseFlags::FORCE) {
                    return;
                }
                self.channel.key = None;
                self.channel.modes.remove(SimpleModes::KEY_SET);
                buf.push_param(dir, 'k', key.clone(), key);
            }
        }
        self.key_changed = true;
    }

    fn handle_limit(&mut self, dir: ModeDir, args: &mut std::slice::Iter<String>, buf: &mut ModeBuf, outcome: &mut ParseOutcome) {
        if self.limit_changed {
            return;
        }
        if !self.has_authority() {
            if dir == ModeDir::Plus {
                args.next();
            }
            outcome.errors.push(ChanError::ChanOpsNeeded(self.channel.name.clone()));
            return;
        }
        match dir {
            ModeDir::Minus => {
                self.channel.limit = 0;
                self.channel.modes.remove(SimpleModes::LIMIT_SET);
                buf.push_simple(dir, 'l');
            }
            ModeDir::Plus => {
                let Some(raw) = args.next() else { return };
                let Ok(n) = raw.parse::<u32>() else { return };
                self.channel.limit = n;
                self.channel.modes.insert(SimpleModes::LIMIT_SET);
                buf.push_param(dir, 'l', n.to_string(), n.to_string());
            }
        }
        self.limit_changed = true;
    }

    fn handle_ban(&mut self, dir: ModeDir, args: &mut std::slice::Iter<String>, outcome: &mut ParseOutcome) {
        // A bare `+b` with no argument is a list query every member,
        // op or not, may issue; the caller reads `channel.bans` for
        // that reply rather than going through this parser.
        let Some(token) = args.next().cloned() else { return };
        if !self.has_authority() {
            outcome.errors.push(ChanError::ChanOpsNeeded(self.channel.name.clone()));
            return;
        }
        self.pending_bans.push(PendingBan { dir, mask: token });
    }

    fn handle_toggle(&mut self, letter: char, dir: ModeDir, buf: &mut ModeBuf, outcome: &mut ParseOutcome) {
        if !self.has_authority() {
            outcome.errors.push(ChanError::ChanOpsNeeded(self.channel.name.clone()));
            return;
        }
        let bit = match letter {
            'p' | 's' => None, // handled specially below for exclusion
            'm' => Some(SimpleModes::MODERATED),
            'n' => Some(SimpleModes::NO_EXTERNAL),
            't' => Some(SimpleModes::TOPIC_LOCK),
            'i' => Some(SimpleModes::INVITE_ONLY),
            _ => return,
        };

        if letter == 'p' || letter == 's' {
            let already = if letter == 'p' {
                self.channel.modes.contains(SimpleModes::PRIVATE)
            } else {
                self.channel.modes.contains(SimpleModes::SECRET)
            };
            if dir == ModeDir::Plus && already {
                return;
            }
            match (letter, dir) {
                ('p', ModeDir::Plus) => {
                    let had_secret = self.channel.modes.contains(SimpleModes::SECRET);
                    self.channel.modes.set_private();
                    if had_secret {
                        buf.push_simple(ModeDir::Minus, 's');
                    }
                    buf.push_simple(ModeDir::Plus, 'p');
                }
                ('p', ModeDir::Minus) => {
                    self.channel.modes.remove(SimpleModes::PRIVATE);
                    buf.push_simple(ModeDir::Minus, 'p');
                }
                ('s', ModeDir::Plus) => {
                    let had_private = self.channel.modes.contains(SimpleModes::PRIVATE);
                    self.channel.modes.set_secret();
                    if had_private {
                        buf.push_simple(ModeDir::Minus, 'p');
                    }
                    buf.push_simple(ModeDir::Plus, 's');
                }
                ('s', ModeDir::Minus) => {
                    self.channel.modes.remove(SimpleModes::SECRET);
                    buf.push_simple(ModeDir::Minus, 's');
                }
                _ => unreachable!(),
            }
            return;
        }

        let Some(bit) = bit else { return };
        let was_set = self.channel.modes.contains(bit);
        if dir == ModeDir::Plus && was_set {
            return;
        }
        if dir == ModeDir::Minus && !was_set {
            return;
        }
        match dir {
            ModeDir::Plus => self.channel.modes.insert(bit),
            ModeDir::Minus => self.channel.modes.remove(bit),
        }
        buf.push_simple(dir, letter);
    }

    fn resolve_ban_overlaps(&mut self, buf: &mut ModeBuf, setter: &str, outcome: &mut ParseOutcome) {
        if self.pending_bans.is_empty() {
            return;
        }
        let mut state = BanParseState::default();
        let mut first = true;

        for pending in std::mem::take(&mut self.pending_bans) {
            match pending.dir {
                ModeDir::Plus => {
                    let add_outcome = ban::add_banid(
                        &mut self.channel.bans,
                        &mut state,
                        setter,
                        &pending.mask,
                        &self.limits,
                        true,
                        first,
                        true,
                        self.now,
                    );
                    first = false;
                    if add_outcome == AddBanOutcome::Added {
                        buf.push_param(ModeDir::Plus, 'b', pending.mask.clone(), pending.mask);
                        outcome.bans_changed = true;
                    }
                    for removed in state.take_removed() {
                        buf.push_param(ModeDir::Minus, 'b', removed.mask.clone(), removed.mask);
                        outcome.bans_changed = true;
                    }
                }
                ModeDir::Minus => {
                    if ban::del_banid(&mut self.channel.bans, &pending.mask, true).is_some() {
                        buf.push_param(ModeDir::Minus, 'b', pending.mask.clone(), pending.mask);
                        outcome.bans_changed = true;
                    }
                }
            }
        }
    }
}
