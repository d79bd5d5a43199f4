//! Pairs platform utterance handles with the ids handed to the sequencer.
//!
//! Platform callbacks can fire before `speak` has recorded the handle it got
//! back, so progress for an unknown handle is parked in a small buffer and
//! replayed once the pairing lands. The table is never locked across a call
//! into the platform.

use std::collections::VecDeque;

use tracing::trace;

use crate::types::{SpeechEvent, UtteranceId};

/// Most parked callbacks kept; stop callbacks for flushed utterances never
/// get paired and would otherwise pile up.
const EARLY_CAPACITY: usize = 32;

/// Platform progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Begin,
    End,
    Stop,
}

impl Phase {
    fn event(self, id: UtteranceId) -> SpeechEvent {
        match self {
            Self::Begin => SpeechEvent::start(id),
            Self::End => SpeechEvent::end(id),
            Self::Stop => SpeechEvent::error(id),
        }
    }

    fn is_terminal(self) -> bool {
        !matches!(self, Self::Begin)
    }
}

#[derive(Debug)]
pub struct UtteranceTable<H> {
    paired: Vec<(H, UtteranceId)>,
    early: VecDeque<(H, Phase)>,
}

impl<H> Default for UtteranceTable<H> {
    fn default() -> Self {
        Self {
            paired: Vec::new(),
            early: VecDeque::new(),
        }
    }
}

impl<H: Copy + PartialEq> UtteranceTable<H> {
    /// Map a platform callback to an event, or park it until `track` sees
    /// the handle.
    pub fn resolve(&mut self, handle: H, phase: Phase) -> Option<SpeechEvent> {
        let Some(index) = self.paired.iter().position(|(h, _)| *h == handle) else {
            if self.early.len() == EARLY_CAPACITY {
                self.early.pop_front();
            }
            self.early.push_back((handle, phase));
            return None;
        };

        let id = self.paired[index].1;
        if phase.is_terminal() {
            self.paired.remove(index);
        }
        Some(phase.event(id))
    }

    /// Record what the platform returned for request `id` and return the
    /// events that are already due for it.
    ///
    /// Without a handle the platform cannot report progress, so the request
    /// is reported as played straight away.
    pub fn track(&mut self, handle: Option<H>, id: UtteranceId) -> Vec<SpeechEvent> {
        let Some(handle) = handle else {
            trace!(id = id.0, "Untracked utterance reported as finished");
            return vec![SpeechEvent::start(id), SpeechEvent::end(id)];
        };

        let mut due = Vec::new();
        let mut finished = false;
        self.early.retain(|&(h, phase)| {
            if h != handle || finished {
                return true;
            }
            due.push(phase.event(id));
            finished = phase.is_terminal();
            false
        });

        if !finished {
            self.paired.push((handle, id));
        }
        due
    }

    /// Forget every pairing and parked callback
    pub fn clear(&mut self) {
        self.paired.clear();
        self.early.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.paired.is_empty() && self.early.is_empty()
    }
}
