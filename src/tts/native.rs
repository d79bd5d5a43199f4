//! Native OS text-to-speech via the `tts` crate.
//!
//! Utterance callbacks arrive on platform threads; they are translated into
//! [`SpeechEvent`]s and forwarded over the controller's channel.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use tts::{Features, Tts};

use super::pairing::{Phase, UtteranceTable};
use super::SpeechEngine;
use crate::types::{SpeechError, SpeechEvent, UtteranceId, UtteranceRequest, Voice};

type Pairings = Arc<Mutex<UtteranceTable<tts::UtteranceId>>>;

pub struct NativeSpeech {
    tts: Tts,
    features: Features,
    pairings: Pairings,
    events: UnboundedSender<SpeechEvent>,
    next_id: u64,
}

impl NativeSpeech {
    /// Initialize the platform engine and hook its utterance callbacks.
    ///
    /// Fails when the platform cannot report utterance progress, since a
    /// session would then never finish.
    pub fn new(events: UnboundedSender<SpeechEvent>) -> Result<Self, SpeechError> {
        let tts = Tts::default().map_err(|e| SpeechError::Unavailable(e.to_string()))?;
        let features = tts.supported_features();
        require_progress(features.utterance_callbacks)?;

        let pairings: Pairings = Arc::new(Mutex::new(UtteranceTable::default()));

        let (table, tx) = (Arc::clone(&pairings), events.clone());
        tts.on_utterance_begin(Some(Box::new(move |utterance| {
            forward(&table, &tx, utterance, Phase::Begin);
        })))
        .map_err(|e| SpeechError::Unavailable(e.to_string()))?;

        let (table, tx) = (Arc::clone(&pairings), events.clone());
        tts.on_utterance_end(Some(Box::new(move |utterance| {
            forward(&table, &tx, utterance, Phase::End);
        })))
        .map_err(|e| SpeechError::Unavailable(e.to_string()))?;

        let (table, tx) = (Arc::clone(&pairings), events.clone());
        tts.on_utterance_stop(Some(Box::new(move |utterance| {
            forward(&table, &tx, utterance, Phase::Stop);
        })))
        .map_err(|e| SpeechError::Unavailable(e.to_string()))?;

        debug!(
            rate = features.rate,
            pitch = features.pitch,
            voice = features.voice,
            "Native TTS initialized"
        );

        Ok(Self {
            tts,
            features,
            pairings,
            events,
            next_id: 0,
        })
    }

    fn apply_voice(&mut self, request: &UtteranceRequest) -> Result<(), SpeechError> {
        if !self.features.voice {
            return Ok(());
        }

        let voices = self
            .tts
            .voices()
            .map_err(|e| SpeechError::Voices(e.to_string()))?;

        let prefix = request.locale.split('-').next().unwrap_or(&request.locale);
        let target = match &request.voice {
            Some(wanted) => voices.into_iter().find(|v| v.name() == wanted.name),
            // Platform default for the locale
            None => voices
                .into_iter()
                .find(|v| v.language().to_string().starts_with(prefix)),
        };

        if let Some(voice) = target {
            self.tts
                .set_voice(&voice)
                .map_err(|e| SpeechError::Queue(format!("Failed to set voice: {}", e)))?;
        }
        Ok(())
    }

    fn apply_prosody(&mut self, request: &UtteranceRequest) -> Result<(), SpeechError> {
        if self.features.rate {
            let rate = (self.tts.normal_rate() * request.rate)
                .clamp(self.tts.min_rate(), self.tts.max_rate());
            self.tts
                .set_rate(rate)
                .map_err(|e| SpeechError::Queue(format!("Failed to set rate: {}", e)))?;
        }

        if self.features.pitch {
            let pitch = (self.tts.normal_pitch() * request.pitch)
                .clamp(self.tts.min_pitch(), self.tts.max_pitch());
            self.tts
                .set_pitch(pitch)
                .map_err(|e| SpeechError::Queue(format!("Failed to set pitch: {}", e)))?;
        }
        Ok(())
    }
}

impl SpeechEngine for NativeSpeech {
    fn speak(&mut self, request: UtteranceRequest) -> Result<UtteranceId, SpeechError> {
        self.apply_voice(&request)?;
        self.apply_prosody(&request)?;

        self.next_id += 1;
        let id = UtteranceId(self.next_id);

        // Platform callbacks take the table lock, so it must not be held here
        let handle = self
            .tts
            .speak(request.text, false)
            .map_err(|e| SpeechError::Queue(e.to_string()))?;
        if handle.is_none() {
            warn!(id = id.0, "Platform returned no utterance handle");
        }

        let due = self
            .pairings
            .lock()
            .map_err(|_| SpeechError::Queue("utterance table lock poisoned".to_string()))?
            .track(handle, id);
        for event in due {
            let _ = self.events.send(event);
        }

        Ok(id)
    }

    fn cancel_all(&mut self) -> Result<(), SpeechError> {
        self.tts
            .stop()
            .map_err(|e| SpeechError::Stop(e.to_string()))?;

        // Stop callbacks for flushed utterances no longer map to anything
        if let Ok(mut table) = self.pairings.lock() {
            table.clear();
        }
        Ok(())
    }

    fn voices(&self) -> Result<Vec<Voice>, SpeechError> {
        let voices = self
            .tts
            .voices()
            .map_err(|e| SpeechError::Voices(e.to_string()))?;

        Ok(voices
            .into_iter()
            // `tts` does not say whether a voice is network-backed
            .map(|v| Voice::new(v.name(), v.language().to_string(), true))
            .collect())
    }
}

fn require_progress(utterance_callbacks: bool) -> Result<(), SpeechError> {
    if utterance_callbacks {
        Ok(())
    } else {
        Err(SpeechError::Unavailable(
            "platform TTS reports no utterance progress".to_string(),
        ))
    }
}

fn forward(
    table: &Pairings,
    events: &UnboundedSender<SpeechEvent>,
    utterance: tts::UtteranceId,
    phase: Phase,
) {
    let event = match table.lock() {
        Ok(mut table) => table.resolve(utterance, phase),
        Err(_) => return,
    };
    if let Some(event) = event {
        let _ = events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_without_progress_is_unavailable() {
        assert!(require_progress(true).is_ok());
        assert!(matches!(
            require_progress(false),
            Err(SpeechError::Unavailable(_))
        ));
    }
}
