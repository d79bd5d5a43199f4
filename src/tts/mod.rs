//! Speech capability used by the sequencer.
//!
//! Two backends implement [`SpeechEngine`]:
//!
//! 1. **Native OS TTS** ([`native`], `native` feature) - system voices via the `tts` crate
//! 2. **Simulated** ([`simulated`]) - FIFO queue driven by tokio timers, no audio
//!
//! Engines never call back into the sequencer directly. Each one is handed an
//! unbounded sender at construction and publishes a [`SpeechEvent`] for every
//! start, end, or error of a queued request. The controller drains those
//! events on its own task.
//!
//! # Ordering
//!
//! Word highlighting assumes the engine plays requests strictly in the order
//! they were queued, fires `Start` before `End` for each request, and starts
//! request N only after request N-1 has ended. Neither backend can verify the
//! platform honours this; highlighting desyncs if it does not.

#[cfg(feature = "native")]
pub mod native;
#[cfg(any(feature = "native", test))]
pub(crate) mod pairing;
pub mod simulated;

use crate::types::{SpeechError, UtteranceId, UtteranceRequest, Voice};

/// Queue-based text-to-speech capability
pub trait SpeechEngine {
    /// Queue a request behind everything already queued
    fn speak(&mut self, request: UtteranceRequest) -> Result<UtteranceId, SpeechError>;

    /// Stop the current utterance and flush the whole queue
    fn cancel_all(&mut self) -> Result<(), SpeechError>;

    /// Voices currently offered by the platform
    fn voices(&self) -> Result<Vec<Voice>, SpeechError>;
}

impl<E: SpeechEngine + ?Sized> SpeechEngine for Box<E> {
    fn speak(&mut self, request: UtteranceRequest) -> Result<UtteranceId, SpeechError> {
        (**self).speak(request)
    }

    fn cancel_all(&mut self) -> Result<(), SpeechError> {
        (**self).cancel_all()
    }

    fn voices(&self) -> Result<Vec<Voice>, SpeechError> {
        (**self).voices()
    }
}
