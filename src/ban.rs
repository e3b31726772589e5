//! Per-channel ban list ([C5]): add/delete, overlap detection, caps.

use crate::limits::Limits;
use crate::mask::canonicalize_mask;
use crate::matching::mmatch;

/// A single ban-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ban {
    pub mask: String,
    pub set_by: String,
    pub set_at: i64,
    pub is_ip_mask: bool,
    /// Set during burst receipt on bans already present locally; cleared
    /// if the burst re-asserts the identical mask, otherwise the ban is
    /// deleted once the burst completes (§4.10).
    pub burst_wipeout: bool,
    /// Set on a dry-run parse when a broader new mask subsumes this one,
    /// so the parser can re-assert it with `+b` if the parse bounces.
    pub overlapped: bool,
}

/// Outcome of a single `add_banid` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddBanOutcome {
    /// The mask was inserted (or would be, on a dry run).
    Added,
    /// An identical burst-wipeout-flagged ban was revived; nothing emitted.
    BurstRevive,
    /// An existing ban already covers this mask; nothing changed.
    Rejected,
    /// The channel's ban count or total ban-text length cap was hit.
    Full,
}

/// Per-parse scratch state for the overlap iterator (§5: "the ban
/// iterator state is scoped to a single parse call"). Must be reset by
/// passing `first = true` on the first `add_banid`/`del_banid` of each
/// parse; `reset` asserts no residue survived from a previous parse.
#[derive(Debug, Default)]
pub struct BanParseState {
    /// Bans physically removed because a broader mask subsumed them
    /// (`apply = true`); announced to local clients as `-b`.
    removed: Vec<Ban>,
    /// Mask of the first ban flagged `overlapped` on a dry run, kept for
    /// diagnostics; the flagged bans themselves live in the channel's list.
    overlap_head: Option<String>,
}

impl BanParseState {
    pub fn reset(&mut self) {
        debug_assert!(
            self.removed.is_empty() && self.overlap_head.is_none(),
            "ban parse state not reset between parses"
        );
        self.removed.clear();
        self.overlap_head = None;
    }

    /// Drains the bans removed by subsumption during this parse, for
    /// the caller to emit as `-b` to local listeners.
    pub fn take_removed(&mut self) -> Vec<Ban> {
        std::mem::take(&mut self.removed)
    }

    pub fn overlap_head(&self) -> Option<&str> {
        self.overlap_head.as_deref()
    }
}

/// Add `raw_mask` to `bans`, resolving overlap with every existing
/// entry in a single pass (§4.5).
#[allow(clippy::too_many_arguments)]
pub fn add_banid(
    bans: &mut Vec<Ban>,
    state: &mut BanParseState,
    setter: &str,
    raw_mask: &str,
    limits: &Limits,
    apply: bool,
    first: bool,
    is_local: bool,
    now: i64,
) -> AddBanOutcome {
    if first {
        state.reset();
    }

    let canon = canonicalize_mask(raw_mask, limits);

    let mut i = 0;
    while i < bans.len() {
        if bans[i].mask == canon.text && bans[i].burst_wipeout {
            bans[i].burst_wipeout = false;
            return AddBanOutcome::BurstRevive;
        }
        if mmatch(&bans[i].mask, &canon.text) {
            // Existing ban is equal to, or broader than, the new mask:
            // the new mask is redundant (this also covers plain
            // re-application of an identical mask, since subsumption
            // is reflexive).
            return AddBanOutcome::Rejected;
        }
        if mmatch(&canon.text, &bans[i].mask) {
            if apply {
                let removed = bans.remove(i);
                state.removed.push(removed);
                continue; // list shifted; re-check the new index i
            } else {
                bans[i].overlapped = true;
                if state.overlap_head.is_none() {
                    state.overlap_head = Some(bans[i].mask.clone());
                }
            }
        }
        i += 1;
    }

    if is_local {
        let would_be_len: usize =
            bans.iter().map(|b| b.mask.len()).sum::<usize>() + canon.text.len();
        if bans.len() >= limits.max_bans || would_be_len > limits.max_ban_length {
            tracing::debug!(mask = %canon.text, count = bans.len(), "ban list full, rejecting add");
            return AddBanOutcome::Full;
        }
    }

    if apply {
        bans.insert(
            0,
            Ban {
                mask: canon.text,
                set_by: setter.to_string(),
                set_at: now,
                is_ip_mask: canon.is_ip_mask,
                burst_wipeout: false,
                overlapped: false,
            },
        );
    }
    AddBanOutcome::Added
}

/// Remove an exact-match ban. Returns the removed (or, on a dry run,
/// the matched) ban so the caller can invalidate membership ban caches.
pub fn del_banid(bans: &mut Vec<Ban>, mask: &str, apply: bool) -> Option<Ban> {
    let idx = bans.iter().position(|b| b.mask == mask)?;
    if apply {
        Some(bans.remove(idx))
    } else {
        Some(bans[idx].clone())
    }
}

/// True if `full_mask` (already in canonical `nick!user@host` form)
/// matches any ban on the list.
pub fn is_banned(bans: &[Ban], full_mask: &str) -> bool {
    bans.iter().any(|b| mmatch(&b.mask, full_mask))
}

/// Mark every ban currently on the channel as burst-wipeout, ahead of
/// receiving a peer's burst frame for the same channel (§4.10).
pub fn mark_all_wipeout(bans: &mut [Ban]) {
    for b in bans.iter_mut() {
        b.burst_wipeout = true;
    }
}

/// Drop every ban still flagged burst-wipeout once a burst completes,
/// returning the dropped masks for diagnostics.
pub fn sweep_wipeout(bans: &mut Vec<Ban>) -> Vec<Ban> {
    let (keep, drop): (Vec<_>, Vec<_>) = bans.drain(..).partition(|b| !b.burst_wipeout);
    *bans = keep;
    if !drop.is_empty() {
        tracing::debug!(dropped = drop.len(), kept = bans.len(), "burst ban merge swept unconfirmed bans");
    }
    drop
}
