//! The backtracking decision ledger.
//!
//! Every choice the matcher makes goes through `decide()`. An attempt replays
//! the ledger from the start; the first visit to a fresh decision position
//! appends a new choice at its first candidate. After a failed attempt,
//! `advance()` moves the ledger to the lexicographically next combination,
//! odometer style, so the search never revisits a rejected combination and
//! always terminates.

use tracing::trace;

/// One recorded decision: which candidate was taken out of how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    pub taken: usize,
    pub limit: usize,
}

/// Ordered append/truncate ledger of decisions for one matching site.
#[derive(Debug, Clone, Default)]
pub struct Conjecture {
    choices: Vec<Choice>,
    /// Replay position for the current pass.
    cursor: usize,
    /// High-water mark of positions actually reached this attempt. Entries
    /// beyond it are stale leftovers of a longer earlier attempt and are
    /// dropped before advancing.
    used: usize,
}

impl Conjecture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh attempt (keying pass).
    pub fn begin_attempt(&mut self) {
        self.cursor = 0;
        self.used = 0;
    }

    /// Replay the same decisions again (restricting pass).
    pub fn begin_replay(&mut self) {
        self.cursor = 0;
    }

    /// Take a decision among `candidates` options. `candidates` must be
    /// nonzero; callers turn an empty candidate set into an ordinary
    /// non-match.
    ///
    /// First visit to this position in the current attempt appends a choice
    /// at candidate 0; a replayed position returns the stored choice
    /// unchanged. Traversal order must be identical across retries, which the
    /// replay-from-root discipline guarantees.
    pub fn decide(&mut self, candidates: usize) -> usize {
        debug_assert!(candidates > 0, "decide() with no candidates");
        let taken = if self.cursor < self.choices.len() {
            let c = self.choices[self.cursor];
            debug_assert_eq!(
                c.limit, candidates,
                "decision position replayed with a different candidate count"
            );
            c.taken
        } else {
            self.choices.push(Choice { taken: 0, limit: candidates });
            0
        };
        self.cursor += 1;
        self.used = self.used.max(self.cursor);
        taken
    }

    /// Move to the next untried combination after a failed attempt.
    /// Returns `false` when the whole decision space is exhausted.
    pub fn advance(&mut self) -> bool {
        self.choices.truncate(self.used);
        while let Some(last) = self.choices.last_mut() {
            last.taken += 1;
            if last.taken < last.limit {
                trace!(depth = self.choices.len(), "conjecture advanced");
                return true;
            }
            self.choices.pop();
        }
        false
    }

    /// Number of recorded decisions.
    pub fn depth(&self) -> usize {
        self.choices.len()
    }
}
