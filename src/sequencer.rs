//! Utterance sequencer.
//!
//! Drives one speak operation at a time and keeps the visual state in step
//! with playback:
//!
//! ```text
//!            speak_natural                 end/error
//!   Idle ───────────────────▶ SpeakingNatural ─────────▶ Idle
//!     │
//!     │      speak_words        start(i)              end/error(last)
//!     └──────────────────▶ SpeakingWord(i) ──▶ ... ───────────────▶ Idle
//!
//!   any state ── cancel ──▶ (engine flushed, visuals reset) ──▶ Idle
//! ```
//!
//! Word mode queues every unit up front. Each unit's `Start` only moves the
//! highlight; the engine's FIFO queue serializes the audio, so highlights
//! follow playback order rather than issue order.

use tracing::{debug, trace, warn};

use crate::playback::PlaybackState;
use crate::tokenizer::speakable_units;
use crate::tts::SpeechEngine;
use crate::types::{
    Language, RowId, SpeechEvent, SpeechEventKind, UtteranceId, UtteranceRequest, Voice,
    VoicePrefs,
};
use crate::voices::VoiceCatalog;

pub const NATURAL_RATE: f32 = 0.9;
pub const WORD_RATE: f32 = 0.85;
pub const NEUTRAL_PITCH: f32 = 1.0;

/// Receives highlight updates as playback advances
pub trait HighlightSink {
    fn set_row_speaking(&mut self, row: RowId, speaking: bool);

    /// Mark one unit active, deactivating whichever unit was active before
    /// (in any row)
    fn activate_unit(&mut self, row: RowId, unit: usize);

    fn clear_active_units(&mut self);
}

/// Rate multipliers for the two speaking modes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechRates {
    pub natural: f32,
    pub word: f32,
}

impl Default for SpeechRates {
    fn default() -> Self {
        Self {
            natural: NATURAL_RATE,
            word: WORD_RATE,
        }
    }
}

/// Row being spoken and the language of its text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakTarget {
    pub row: RowId,
    pub language: Language,
}

/// Observable sequencer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    SpeakingNatural { row: RowId },
    /// `cursor` is the unit index currently sounding, if playback has begun
    SpeakingWord { row: RowId, cursor: Option<usize> },
}

#[derive(Debug)]
enum Mode {
    Natural,
    /// Queued requests paired with the unit index they speak
    Word {
        requests: Vec<(UtteranceId, usize)>,
        cursor: Option<usize>,
    },
}

#[derive(Debug)]
struct Session {
    target: SpeakTarget,
    mode: Mode,
    /// Completion of this request ends the session
    last: UtteranceId,
}

impl Session {
    fn owns(&self, id: UtteranceId) -> bool {
        match &self.mode {
            Mode::Natural => id == self.last,
            Mode::Word { requests, .. } => requests.iter().any(|(r, _)| *r == id),
        }
    }
}

pub struct Sequencer<E> {
    engine: E,
    rates: SpeechRates,
    playback: PlaybackState,
    session: Option<Session>,
}

impl<E: SpeechEngine> Sequencer<E> {
    pub fn new(engine: E, rates: SpeechRates) -> Self {
        Self {
            engine,
            rates,
            playback: PlaybackState::default(),
            session: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn state(&self) -> SequencerState {
        match &self.session {
            None => SequencerState::Idle,
            Some(session) => match &session.mode {
                Mode::Natural => SequencerState::SpeakingNatural {
                    row: session.target.row,
                },
                Mode::Word { cursor, .. } => SequencerState::SpeakingWord {
                    row: session.target.row,
                    cursor: *cursor,
                },
            },
        }
    }

    /// Speak `text` as one fluent utterance.
    pub fn speak_natural(
        &mut self,
        sink: &mut impl HighlightSink,
        catalog: &VoiceCatalog,
        prefs: &VoicePrefs,
        target: SpeakTarget,
        text: &str,
    ) {
        self.cancel(sink);

        let voice = resolve_voice(catalog, prefs, target.language);
        self.mark_speaking(sink, target.row);

        let request = self.request(text.to_string(), target.language, self.rates.natural, voice);
        match self.engine.speak(request) {
            Ok(id) => {
                debug!(row = target.row, language = %target.language, id = id.0, "Natural speech queued");
                self.session = Some(Session {
                    target,
                    mode: Mode::Natural,
                    last: id,
                });
            }
            Err(e) => {
                warn!(error = %e, "Speech request failed; treating as finished");
                self.finish(sink);
            }
        }
    }

    /// Speak a row unit by unit, highlighting each unit as it starts.
    ///
    /// Blank units are skipped. A row with nothing speakable leaves the
    /// sequencer idle.
    pub fn speak_words<S: AsRef<str>>(
        &mut self,
        sink: &mut impl HighlightSink,
        catalog: &VoiceCatalog,
        prefs: &VoicePrefs,
        target: SpeakTarget,
        units: &[S],
    ) {
        self.cancel(sink);

        let words = speakable_units(units);
        if words.is_empty() {
            debug!(row = target.row, "Nothing speakable in row");
            return;
        }

        let voice = resolve_voice(catalog, prefs, target.language);
        self.mark_speaking(sink, target.row);

        let mut requests = Vec::with_capacity(words.len());
        for (unit, text) in words {
            let request =
                self.request(text.to_string(), target.language, self.rates.word, voice.clone());
            match self.engine.speak(request) {
                Ok(id) => requests.push((id, unit)),
                Err(e) => warn!(unit, error = %e, "Skipping unit that could not be queued"),
            }
        }

        let Some(&(last, _)) = requests.last() else {
            self.finish(sink);
            return;
        };

        debug!(row = target.row, language = %target.language, units = requests.len(), "Word speech queued");
        self.session = Some(Session {
            target,
            mode: Mode::Word {
                requests,
                cursor: None,
            },
            last,
        });
    }

    /// Apply a start/end/error event from the engine.
    ///
    /// Events from requests outside the current session (for example ones
    /// flushed by an earlier cancel) are ignored.
    pub fn handle_event(&mut self, event: SpeechEvent, sink: &mut impl HighlightSink) {
        let Some(session) = self.session.as_mut() else {
            trace!(id = event.id.0, "Speech event with no active session");
            return;
        };
        if !session.owns(event.id) {
            trace!(id = event.id.0, "Ignoring stale speech event");
            return;
        }

        let row = session.target.row;
        match event.kind {
            SpeechEventKind::Start => {
                if let Mode::Word { requests, cursor } = &mut session.mode {
                    if let Some(&(_, unit)) = requests.iter().find(|(id, _)| *id == event.id) {
                        *cursor = Some(unit);
                        sink.activate_unit(row, unit);
                    }
                }
                sink.set_row_speaking(row, true);
            }
            SpeechEventKind::End | SpeechEventKind::Error => {
                if event.id == session.last {
                    debug!(row, kind = ?event.kind, "Speech finished");
                    self.finish(sink);
                }
            }
        }
    }

    /// Stop all speech and reset every highlight.
    pub fn cancel(&mut self, sink: &mut impl HighlightSink) {
        if let Err(e) = self.engine.cancel_all() {
            warn!(error = %e, "Failed to cancel speech");
        }
        if self.session.is_some() {
            debug!("Speech cancelled");
        }
        self.finish(sink);
    }

    fn mark_speaking(&mut self, sink: &mut impl HighlightSink, row: RowId) {
        self.playback.set(row);
        sink.set_row_speaking(row, true);
    }

    fn finish(&mut self, sink: &mut impl HighlightSink) {
        sink.clear_active_units();
        if let Some(row) = self.playback.take() {
            sink.set_row_speaking(row, false);
        }
        self.session = None;
    }

    fn request(
        &self,
        text: String,
        language: Language,
        rate: f32,
        voice: Option<Voice>,
    ) -> UtteranceRequest {
        UtteranceRequest {
            text,
            locale: language.locale().to_string(),
            rate,
            pitch: NEUTRAL_PITCH,
            voice,
        }
    }
}

fn resolve_voice(catalog: &VoiceCatalog, prefs: &VoicePrefs, language: Language) -> Option<Voice> {
    let voice = catalog.find_best_voice(language, prefs).cloned();
    match &voice {
        Some(v) => debug!(language = %language, voice = %v.name, "Voice resolved"),
        None => debug!(language = %language, "No matching voice; using platform default"),
    }
    voice
}
