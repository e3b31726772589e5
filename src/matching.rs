//! Wildcard match engine ([C2]): literal matching and pattern subsumption.
//!
//! `match_mask` answers "does this literal string satisfy this pattern".
//! `mmatch` answers the harder question the ban-overlap algorithm needs:
//! "is every string matched by `sub` also matched by `sup`", without
//! enumerating the (possibly infinite) set of strings `sub` matches.

use slirc_proto::{irc_lower_char, wildcard_match};

/// Case-insensitive wildcard match of `literal` against `pattern`.
/// `*` matches zero or more characters, `?` matches exactly one.
pub fn match_mask(pattern: &str, literal: &str) -> bool {
    wildcard_match(pattern, literal)
}

/// Pattern subsumption: true iff every literal string `sub` can match
/// is also matched by `sup`. Used to detect that a newly-added ban
/// mask makes an existing one (or vice versa) redundant.
///
/// This walks both patterns in lock-step rather than matching text,
/// since `sub` itself may contain wildcards denoting an unbounded set
/// of literals. A `*` in `sup` can always absorb one more unit of
/// `sub` (literal char, `?`, or `*`) because `sup`'s star matches any
/// concrete string those units could ever expand to; a `*` in `sub`
/// can only be absorbed this way — `sup` can never "shrink" to cover
/// the empty expansion of `sub`'s star unless `sup` has its own star
/// in the same position.
pub fn mmatch(sup: &str, sub: &str) -> bool {
    let sup: Vec<char> = sup.chars().map(irc_lower_char).collect();
    let sub: Vec<char> = sub.chars().map(irc_lower_char).collect();
    subsumes(&sup, &sub)
}

fn subsumes(sup: &[char], sub: &[char]) -> bool {
    match (sup.first(), sub.first()) {
        (None, None) => true,
        (None, Some(_)) => false,
        (Some('*'), _) => {
            // The star can absorb nothing more, or one more unit of `sub`.
            subsumes(&sup[1..], sub) || (!sub.is_empty() && subsumes(sup, &sub[1..]))
        }
        (Some(_), None) => false,
        (Some(sc), Some('*')) if *sc != '*' => {
            // `sub`'s star can expand to the empty string, which only a
            // star (or nothing) in `sup` could ever cover.
            false
        }
        (Some(sc), Some(tc)) => {
            if *sc == '?' || sc == tc {
                subsumes(&sup[1..], &sub[1..])
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match() {
        assert!(match_mask("*!*@*.example.com", "nick!user@host.example.com"));
        assert!(!match_mask("admin!*@*", "user!admin@host"));
    }

    #[test]
    fn subsumption_reflexive() {
        assert!(mmatch("*!*@foo.example", "*!*@foo.example"));
    }

    #[test]
    fn broader_mask_subsumes_narrower() {
        assert!(mmatch("*!*@*.example", "*!*@foo.example"));
        assert!(!mmatch("*!*@foo.example", "*!*@*.example"));
    }

    #[test]
    fn unrelated_masks_do_not_subsume() {
        assert!(!mmatch("nick1!*@*", "nick2!*@*"));
    }

    #[test]
    fn literal_does_not_subsume_wildcard() {
        assert!(!mmatch("abc", "a*"));
        assert!(mmatch("a*", "abc"));
    }

    #[test]
    fn no_bans_mutually_subsume_in_a_well_formed_list() {
        let bans = ["*!*@foo.example", "baduser!*@*", "*!evil@*"];
        for (i, a) in bans.iter().enumerate() {
            for (j, b) in bans.iter().enumerate() {
                if i != j {
                    assert!(!mmatch(a, b), "{a} should not subsume {b}");
                }
            }
        }
    }
}
