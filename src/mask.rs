//! Ban mask canonicalisation ([C1]).
//!
//! Normalises whatever a user types after `+b` into a full
//! `nick!user@host` triple, truncating each component to its
//! configured maximum length and flagging IP-style host parts so the
//! match engine can compare against a target's literal address instead
//! of its resolved name.
//!
//! [C1]: crate (component C1 in the design doc)

use crate::limits::Limits;

/// A canonicalised ban mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMask {
    pub text: String,
    pub is_ip_mask: bool,
}

/// Canonicalise a free-form mask string into `nick!user@host` form.
///
/// Single left-to-right scan: the first `!` or `@` encountered decides
/// which of the five shapes in the design doc we're in. Never mutates
/// the input; always allocates a fresh output buffer.
pub fn canonicalize_mask(input: &str, limits: &Limits) -> CanonicalMask {
    let (nick, user, host) = split_mask(input);

    let nick = truncate_head(nick, limits.nick_len);
    let user = truncate_tail_with_star(user, limits.user_len);
    let host = truncate_tail_with_star(host, limits.host_len);

    let is_ip_mask = check_if_ipmask(&host);

    CanonicalMask {
        text: format!("{nick}!{user}@{host}"),
        is_ip_mask,
    }
}

/// Split a raw mask into (nick, user, host) components, filling
/// missing parts with `*` per the five shapes in §4.1.
fn split_mask(input: &str) -> (&str, &str, &str) {
    if let Some(bang) = input.find('!') {
        let nick = &input[..bang];
        let rest = &input[bang + 1..];
        if let Some(at) = rest.find('@') {
            (nick, &rest[..at], &rest[at + 1..])
        } else {
            (nick, rest, "*")
        }
    } else if let Some(at) = input.find('@') {
        ("*", &input[..at], &input[at + 1..])
    } else if input.contains('.') {
        // Looks like a bare hostname/IP with no nick!user part.
        ("*", "*", input)
    } else {
        (input, "*", "*")
    }
}

fn truncate_head(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Truncate `s` to at most `max` characters, keeping the *suffix* and
/// marking that something was cut off with a leading `*`, matching
/// ircu's left-truncation of user/host components.
fn truncate_tail_with_star(s: &str, max: usize) -> String {
    let char_count = s.chars().count();
    if max == 0 {
        return String::new();
    }
    if char_count <= max {
        return s.to_string();
    }
    let skip = char_count - (max - 1);
    let suffix: String = s.chars().skip(skip).collect();
    format!("*{suffix}")
}

/// True if the last label of `host` looks like a literal IPv4 address
/// or CIDR range rather than a name pattern (allowing for `*`/`?`
/// wildcards standing in for octets).
pub fn check_if_ipmask(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }
    let (addr_part, _cidr) = match host.split_once('/') {
        Some((a, c)) => (a, Some(c)),
        None => (host, None),
    };

    let mut octets = 0;
    for label in addr_part.split('.') {
        if label.is_empty() {
            return false;
        }
        if label.chars().all(|c| c == '*' || c == '?') {
            octets += 1;
            continue;
        }
        if !label.chars().all(|c| c.is_ascii_digit() || c == '*' || c == '?') {
            return false;
        }
        octets += 1;
    }
    octets >= 2
}
