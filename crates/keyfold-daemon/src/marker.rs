//! Ledger of keystrokes this process synthesized itself.
//!
//! The injector tags every key immediately before emitting it; the hook
//! callback consumes the matching tag when the OS reports the key back and
//! skips forwarding it. Tags expire after a TTL so a keystroke the OS never
//! echoes cannot swallow genuine input forever.

use rdev::Key as RdevKey;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tag {
    /// A key identified by its physical code (backspace, arrows, chords).
    Key(RdevKey),
    /// A character typed through text synthesis, identified by what it produces.
    Char(char),
}

#[derive(Debug)]
struct Pending {
    tag: Tag,
    expires: Instant,
}

#[derive(Debug)]
pub struct SyntheticMarker {
    pending: Mutex<VecDeque<Pending>>,
    ttl: Duration,
}

impl SyntheticMarker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            ttl,
        }
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<Pending>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record that `tag` is about to be synthesized.
    pub fn tag(&self, tag: Tag) {
        self.pending().push_back(Pending {
            tag,
            expires: Instant::now() + self.ttl,
        });
    }

    /// Withdraw the most recent `tag`, used when synthesis failed.
    pub fn untag(&self, tag: Tag) {
        let mut pending = self.pending();
        if let Some(index) = pending.iter().rposition(|p| p.tag == tag) {
            pending.remove(index);
        }
    }

    /// Consume the oldest live tag matching an observed key-down.
    ///
    /// Returns true when the event was synthesized by this process.
    pub fn take(&self, key: RdevKey, produced: Option<char>) -> bool {
        let now = Instant::now();
        let mut pending = self.pending();
        pending.retain(|p| p.expires > now);

        let found = pending.iter().position(|p| match p.tag {
            Tag::Key(k) => k == key,
            Tag::Char(c) => produced == Some(c),
        });

        match found {
            Some(index) => {
                pending.remove(index);
                trace!("Consumed synthetic tag for {:?}", key);
                true
            }
            None => false,
        }
    }

    /// Number of tags still waiting to be observed, expired ones included.
    pub fn outstanding(&self) -> usize {
        self.pending().len()
    }
}

impl Default for SyntheticMarker {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}
