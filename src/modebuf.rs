//! Batched mode-change output builder ([C8]).

use crate::limits::{Creation, Limits};
use crate::wire::{self, Dest, Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeDir {
    Plus,
    Minus,
}

impl ModeDir {
    fn flipped(self) -> ModeDir {
        match self {
            ModeDir::Plus => ModeDir::Minus,
            ModeDir::Minus => ModeDir::Plus,
        }
    }

    fn sigil(self) -> char {
        match self {
            ModeDir::Plus => '+',
            ModeDir::Minus => '-',
        }
    }
}

/// One pending mode-letter change, queued until the next flush.
#[derive(Debug, Clone)]
pub enum ModeChange {
    /// A mode letter with no argument (`p`, `s`, `m`, `t`, `i`, `n`).
    Simple { dir: ModeDir, letter: char },
    /// A mode letter with an argument, carrying both the client-visible
    /// form (a plain nick or ban mask) and the peer-visible form
    /// (numeric-nick encoded where applicable).
    Param { dir: ModeDir, letter: char, client_param: String, peer_param: String },
}

/// Accumulates mode changes for one channel and fans them out to every
/// enabled destination on flush (§4.8).
pub struct ModeBuf {
    source: String,
    from_connection: Option<String>,
    channel: String,
    creation: Creation,
    dest: Dest,
    changes: Vec<ModeChange>,
    limits: Limits,
    /// Whether ops have already been stripped from the source this
    /// flush sequence (DEOP applies only to the first outbound frame).
    deopped_source: bool,
}

impl ModeBuf {
    pub fn new(
        source: impl Into<String>,
        from_connection: Option<String>,
        channel: impl Into<String>,
        creation: Creation,
        dest: Dest,
        limits: Limits,
    ) -> Self {
        ModeBuf {
            source: source.into(),
            from_connection,
            channel: channel.into(),
            creation,
            dest,
            changes: Vec::new(),
            limits,
            deopped_source: false,
        }
    }

    pub fn push_simple(&mut self, dir: ModeDir, letter: char) {
        self.changes.push(ModeChange::Simple { dir, letter });
    }

    pub fn push_param(&mut self, dir: ModeDir, letter: char, client_param: String, peer_param: String) {
        self.changes.push(ModeChange::Param { dir, letter, client_param, peer_param });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn from_connection(&self) -> Option<&str> {
        self.from_connection.as_deref()
    }

    /// Changes queued so far, for a caller that needs to replay them
    /// into a second buffer (e.g. building a timestamp-arbitration
    /// bounce before this buffer's own flush drains them).
    pub fn changes(&self) -> &[ModeChange] {
        &self.changes
    }

    /// Run the flush algorithm once. If `all`, keep flushing until the
    /// buffer is drained (step 5's tail recursion); otherwise flush one
    /// bounded batch and leave the rest queued.
    pub fn flush(&mut self, all: bool) -> Vec<Frame> {
        let mut frames = Vec::new();
        loop {
            let batch = self.take_batch();
            if batch.is_empty() {
                break;
            }
            frames.extend(self.emit_batch(&batch));
            if !all || self.changes.is_empty() {
                break;
            }
        }
        frames
    }

    /// Step 2: walk parameter slots, estimating length against the
    /// buffer-fuzz budget; anything that wouldn't fit (or exceeds
    /// `MAX_MODE_PARAMS` for this round) is left queued ("SAVE").
    /// Simple (argument-free) letters always ride along in the same
    /// round as whatever parameter slots fit.
    fn take_batch(&mut self) -> Vec<ModeChange> {
        let budget = wire::line_budget(&self.limits);
        let mut running_len = self.channel.len() + self.source.len() + 16;
        let mut param_count = 0usize;
        let mut batch = Vec::new();

        while !self.changes.is_empty() {
            let is_param = matches!(self.changes[0], ModeChange::Param { .. });
            if is_param {
                if param_count >= self.limits.max_mode_params {
                    break;
                }
                let ModeChange::Param { client_param, .. } = &self.changes[0] else { unreachable!() };
                let tok_len = client_param.len() + 1;
                if running_len + tok_len > budget {
                    break;
                }
                running_len += tok_len;
                param_count += 1;
            } else {
                running_len += 2; // sigil + letter
                if running_len > budget {
                    break;
                }
            }
            batch.push(self.changes.remove(0));
        }
        batch
    }

    fn emit_batch(&mut self, batch: &[ModeChange]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &dest_bit in &Dest::EMISSION_ORDER {
            if !self.dest.contains(dest_bit) {
                continue;
            }
            let bounce = dest_bit == Dest::BOUNCE;
            let use_peer = matches!(dest_bit, Dest::SERVER | Dest::OPMODE | Dest::BOUNCE);
            let (letters, params) = render(batch, bounce, use_peer);

            let strip_ops = self.dest.contains(Dest::DEOP) && !self.deopped_source;
            if strip_ops {
                self.deopped_source = true;
            }

            let ts = if bounce {
                Some(0)
            } else if dest_bit == Dest::HACK4 {
                Some(0)
            } else if matches!(dest_bit, Dest::SERVER | Dest::OPMODE) {
                Some(self.creation.as_wire())
            } else {
                None
            };

            let mut text = format!(":{} MODE {} {}", self.source, self.channel, letters);
            for p in &params {
                text.push(' ');
                text.push_str(p);
            }
            if let Some(t) = ts {
                text.push(' ');
                text.push_str(&t.to_string());
            }
            if matches!(dest_bit, Dest::HACK2 | Dest::HACK3 | Dest::HACK4) {
                text = format!(":me NOTICE {} :*** Notice -- HACK({}): {}", self.channel, hack_severity(dest_bit), text);
            }
            frames.push(Frame { dest: dest_bit, text });
        }
        frames
    }
}

fn hack_severity(dest: Dest) -> u8 {
    if dest.contains(Dest::HACK4) {
        4
    } else if dest.contains(Dest::HACK3) {
        3
    } else {
        2
    }
}

fn render(batch: &[ModeChange], swap: bool, use_peer: bool) -> (String, Vec<String>) {
    let mut letters = String::new();
    let mut params = Vec::new();
    let mut current_dir: Option<ModeDir> = None;

    for change in batch {
        let (mut dir, letter, param) = match change {
            ModeChange::Simple { dir, letter } => (*dir, *letter, None),
            ModeChange::Param { dir, letter, client_param, peer_param } => {
                let p = if use_peer { peer_param.clone() } else { client_param.clone() };
                (*dir, *letter, Some(p))
            }
        };
        if swap {
            dir = dir.flipped();
        }
        if current_dir != Some(dir) {
            letters.push(dir.sigil());
            current_dir = Some(dir);
        }
        letters.push(letter);
        if let Some(p) = param {
            params.push(p);
        }
    }
    (letters, params)
}
