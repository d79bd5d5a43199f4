//! Timer-driven speech engine.
//!
//! Plays nothing; it walks its queue in FIFO order and reports `Start`/`End`
//! for each request after a delay proportional to the text length and rate.
//! Useful where no OS voices are available and for exercising the sequencer
//! against real asynchronous event timing.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use super::SpeechEngine;
use crate::types::{Language, SpeechError, SpeechEvent, UtteranceId, UtteranceRequest, Voice};

/// Default speaking time per character at rate 1.0
pub const DEFAULT_CHAR_DURATION: Duration = Duration::from_millis(60);

struct Queued {
    id: UtteranceId,
    chars: usize,
    rate: f32,
    generation: u64,
}

pub struct SimulatedSpeech {
    queue: mpsc::UnboundedSender<Queued>,
    generation: watch::Sender<u64>,
    voices: Vec<Voice>,
    next_id: u64,
}

impl SimulatedSpeech {
    /// Start the playback task. Must be called inside a tokio runtime.
    pub fn spawn(
        events: mpsc::UnboundedSender<SpeechEvent>,
        voices: Vec<Voice>,
        char_duration: Duration,
    ) -> Self {
        let (queue, queue_rx) = mpsc::unbounded_channel();
        let (generation, generation_rx) = watch::channel(0);

        tokio::spawn(run_queue(queue_rx, generation_rx, events, char_duration));

        Self {
            queue,
            generation,
            voices,
            next_id: 0,
        }
    }

    /// One voice per ranked name of every language, so voice pickers have
    /// something to offer without OS voices
    pub fn default_voices() -> Vec<Voice> {
        Language::ALL
            .iter()
            .flat_map(|language| {
                language
                    .preferred_voices()
                    .iter()
                    .map(move |name| {
                        Voice::new(*name, language.locale(), !name.starts_with("Google"))
                    })
            })
            .collect()
    }

    /// Swap the advertised voices; callers emit their own voices-changed event
    pub fn set_voices(&mut self, voices: Vec<Voice>) {
        self.voices = voices;
    }
}

impl SpeechEngine for SimulatedSpeech {
    fn speak(&mut self, request: UtteranceRequest) -> Result<UtteranceId, SpeechError> {
        self.next_id += 1;
        let id = UtteranceId(self.next_id);

        let queued = Queued {
            id,
            chars: request.text.chars().count(),
            rate: request.rate,
            generation: *self.generation.borrow(),
        };
        self.queue
            .send(queued)
            .map_err(|_| SpeechError::Queue("playback task stopped".to_string()))?;

        trace!(id = id.0, text = %request.text, "Queued simulated utterance");
        Ok(id)
    }

    fn cancel_all(&mut self) -> Result<(), SpeechError> {
        self.generation.send_modify(|g| *g += 1);
        debug!("Simulated speech cancelled");
        Ok(())
    }

    fn voices(&self) -> Result<Vec<Voice>, SpeechError> {
        Ok(self.voices.clone())
    }
}

async fn run_queue(
    mut queue: mpsc::UnboundedReceiver<Queued>,
    mut generation: watch::Receiver<u64>,
    events: mpsc::UnboundedSender<SpeechEvent>,
    char_duration: Duration,
) {
    while let Some(item) = queue.recv().await {
        let current = *generation.borrow_and_update();
        if item.generation != current {
            // Flushed before it could start
            let _ = events.send(SpeechEvent::error(item.id));
            continue;
        }

        let _ = events.send(SpeechEvent::start(item.id));

        let scale = item.chars.max(1) as f32 / item.rate.max(0.1);
        let duration = char_duration.mul_f32(scale);

        tokio::select! {
            _ = tokio::time::sleep(duration) => {
                let _ = events.send(SpeechEvent::end(item.id));
            }
            _ = generation.changed() => {
                let _ = events.send(SpeechEvent::error(item.id));
            }
        }
    }
}
