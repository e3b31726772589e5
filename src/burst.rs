//! Burst encoder/decoder ([C10]): serialises a channel's full state to
//! peer-link `B` frames on connect, and parses them back on receipt.
//!
//! Wire shape (§4.10):
//! `<srvnum> B <channel> <timestamp>[ <modes>[ <params>]][ <members>][ :%<bans>]`

use crate::ban::{self, Ban, BanParseState};
use crate::channel::{Channel, MemberStatus};
use crate::limits::{Creation, Limits};
use crate::mode_state::SimpleModes;
use crate::wire;

/// One member's wire-visible state for burst purposes.
#[derive(Debug, Clone, Copy)]
pub struct BurstMember<'a> {
    pub numeric_nick: &'a str,
    pub status: MemberStatus,
}

fn suffix(status: MemberStatus) -> &'static str {
    match (status.contains(MemberStatus::CHANOP), status.contains(MemberStatus::VOICE)) {
        (true, true) => ":ov",
        (true, false) => ":o",
        (false, true) => ":v",
        (false, false) => "",
    }
}

fn class_of(status: MemberStatus) -> MemberStatus {
    let mut class = MemberStatus::empty();
    if status.contains(MemberStatus::CHANOP) {
        class.insert(MemberStatus::CHANOP);
    }
    if status.contains(MemberStatus::VOICE) {
        class.insert(MemberStatus::VOICE);
    }
    class
}

fn mode_param_suffix(channel: &Channel) -> String {
    let letters = channel.modes.letters();
    if letters.is_empty() {
        return String::new();
    }
    let mut s = format!(" +{letters}");
    if channel.modes.contains(SimpleModes::KEY_SET) {
        if let Some(key) = &channel.key {
            s.push(' ');
            s.push_str(key);
        }
    }
    if channel.modes.contains(SimpleModes::LIMIT_SET) {
        s.push(' ');
        s.push_str(&channel.limit.to_string());
    }
    s
}

fn candidate_member_len(prefix_len: usize, tokens: &[String], next: &str) -> usize {
    let joined_len = if tokens.is_empty() {
        next.len()
    } else {
        tokens.iter().map(|t| t.len() + 1).sum::<usize>() + next.len()
    };
    prefix_len + 1 + joined_len
}

fn candidate_ban_len(prefix_len: usize, tokens: &[&str], next: &str) -> usize {
    let joined_len = if tokens.is_empty() {
        next.len()
    } else {
        tokens.iter().map(|t| t.len() + 1).sum::<usize>() + next.len()
    };
    prefix_len + 3 + joined_len // " :%"
}

/// Encode `channel`'s full state into one or more burst lines. `members`
/// need not be pre-grouped; the four equivalence-class passes — (op+voice),
/// (voice), (op), (neither) — are applied here so that a mode suffix is
/// only ever written at the start of a run.
pub fn encode_burst(srvnum: &str, channel: &Channel, members: &[BurstMember], limits: &Limits) -> Vec<String> {
    let budget = wire::line_budget(limits);
    let prefix = format!("{} B {} {}{}", srvnum, channel.name, channel.creation.as_wire(), mode_param_suffix(channel));

    let mut lines = Vec::new();
    let mut tokens: Vec<String> = Vec::new();

    let passes = [
        MemberStatus::CHANOP | MemberStatus::VOICE,
        MemberStatus::VOICE,
        MemberStatus::CHANOP,
        MemberStatus::empty(),
    ];

    for &class in &passes {
        let mut first_of_run = true;
        for m in members.iter().filter(|m| class_of(m.status) == class) {
            loop {
                let token = if first_of_run {
                    format!("{}{}", m.numeric_nick, suffix(m.status))
                } else {
                    m.numeric_nick.to_string()
                };
                if candidate_member_len(prefix.len(), &tokens, &token) > budget && !tokens.is_empty() {
                    lines.push(format!("{} {}", prefix, tokens.join(",")));
                    tokens.clear();
                    first_of_run = true;
                    continue;
                }
                tokens.push(token);
                first_of_run = false;
                break;
            }
        }
    }
    if !tokens.is_empty() {
        lines.push(format!("{} {}", prefix, tokens.join(",")));
        tokens.clear();
    }

    if !channel.bans.is_empty() {
        let mut ban_tokens: Vec<&str> = Vec::new();
        for ban in &channel.bans {
            loop {
                if candidate_ban_len(prefix.len(), &ban_tokens, &ban.mask) > budget && !ban_tokens.is_empty() {
                    lines.push(format!("{} :%{}", prefix, ban_tokens.join(" ")));
                    ban_tokens.clear();
                    continue;
                }
                ban_tokens.push(&ban.mask);
                break;
            }
        }
        if !ban_tokens.is_empty() {
            lines.push(format!("{} :%{}", prefix, ban_tokens.join(" ")));
        }
    }

    if lines.is_empty() {
        lines.push(prefix);
    }
    lines
}

/// A single decoded `B` line.
#[derive(Debug, Clone)]
pub struct BurstFrame {
    pub srvnum: String,
    pub channel: String,
    pub creation: Creation,
    pub modes: SimpleModes,
    pub key: Option<String>,
    pub limit: Option<u32>,
    /// `(numeric nick, op/voice bits)`, in wire order.
    pub members: Vec<(String, MemberStatus)>,
    pub bans: Vec<String>,
}

fn split_member_token(tok: &str) -> (&str, MemberStatus) {
    if let Some(nick) = tok.strip_suffix(":ov") {
        (nick, MemberStatus::CHANOP | MemberStatus::VOICE)
    } else if let Some(nick) = tok.strip_suffix(":o") {
        (nick, MemberStatus::CHANOP)
    } else if let Some(nick) = tok.strip_suffix(":v") {
        (nick, MemberStatus::VOICE)
    } else {
        (tok, MemberStatus::empty())
    }
}

/// Parse one burst line. Returns `None` on a malformed frame rather than
/// panicking — a peer link feeding garbage is an external-input problem,
/// not an invariant violation.
pub fn decode_burst(line: &str) -> Option<BurstFrame> {
    let mut fields = line.split(' ');
    let srvnum = fields.next()?.to_string();
    if fields.next()? != "B" {
        return None;
    }
    let channel = fields.next()?.to_string();
    let ts: i64 = fields.next()?.parse().ok()?;

    let rest: Vec<&str> = fields.collect();
    let mut idx = 0;
    let mut frame = BurstFrame {
        srvnum,
        channel,
        creation: Creation::At(ts),
        modes: SimpleModes::empty(),
        key: None,
        limit: None,
        members: Vec::new(),
        bans: Vec::new(),
    };

    if idx < rest.len() && rest[idx].starts_with('+') {
        for ch in rest[idx].chars().skip(1) {
            match ch {
                'p' => frame.modes.insert(SimpleModes::PRIVATE),
                's' => frame.modes.insert(SimpleModes::SECRET),
                'm' => frame.modes.insert(SimpleModes::MODERATED),
                't' => frame.modes.insert(SimpleModes::TOPIC_LOCK),
                'i' => frame.modes.insert(SimpleModes::INVITE_ONLY),
                'n' => frame.modes.insert(SimpleModes::NO_EXTERNAL),
                'k' => {
                    frame.modes.insert(SimpleModes::KEY_SET);
                    idx += 1;
                    if idx < rest.len() {
                        frame.key = Some(rest[idx].to_string());
                    } else {
                        idx -= 1;
                    }
                }
                'l' => {
                    frame.modes.insert(SimpleModes::LIMIT_SET);
                    idx += 1;
                    if idx < rest.len() {
                        if let Ok(n) = rest[idx].parse() {
                            frame.limit = Some(n);
                        } else {
                            idx -= 1;
                        }
                    } else {
                        idx -= 1;
                    }
                }
                _ => {}
            }
        }
        idx += 1;
    }

    while idx < rest.len() {
        let token = rest[idx];
        if let Some(first_ban) = token.strip_prefix(":%") {
            frame.bans.push(first_ban.to_string());
            idx += 1;
            while idx < rest.len() {
                frame.bans.push(rest[idx].to_string());
                idx += 1;
            }
            break;
        }
        for entry in token.split(',') {
            let (nick, status) = split_member_token(entry);
            frame.members.push((nick.to_string(), status));
        }
        idx += 1;
    }

    Some(frame)
}

/// Mark every existing ban on `channel` burst-wipeout before applying an
/// incoming burst's ban list (§4.10). Idempotent across the multiple `B`
/// lines a single channel may arrive as, since only the first should call
/// this — callers track that externally, same as [`ban::BanParseState`].
pub fn begin_channel_burst(channel: &mut Channel) {
    ban::mark_all_wipeout(&mut channel.bans);
}

/// Merge one burst line's ban masks into `channel`, reviving wipeout
/// entries that the peer re-asserts and resolving subsumption exactly as
/// a local `+b` would.
pub fn apply_burst_bans(channel: &mut Channel, setter: &str, masks: &[String], limits: &Limits, now: i64) {
    let mut state = BanParseState::default();
    let mut first = true;
    for mask in masks {
        ban::add_banid(&mut channel.bans, &mut state, setter, mask, limits, true, first, false, now);
        first = false;
    }
}

/// Drop every ban still flagged wipeout once every `B` line for this
/// channel has been processed, returning what was dropped for the audit
/// log.
pub fn finish_channel_burst(channel: &mut Channel) -> Vec<Ban> {
    let dropped = ban::sweep_wipeout(&mut channel.bans);
    if !dropped.is_empty() {
        tracing::debug!(channel = %channel.name, dropped = dropped.len(), "burst ban merge finished");
    }
    dropped
}
