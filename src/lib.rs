//! Selection translator with synchronized speech.
//!
//! Selected text is translated into the other two configured languages and
//! shown as rows of a bubble. Any row can be spoken as one fluent utterance
//! or unit by unit, with the sounding unit highlighted in step with playback.

pub mod bubble;
pub mod client;
pub mod commands;
pub mod detect;
pub mod playback;
pub mod popup;
pub mod prefs;
pub mod sequencer;
pub mod settings;
pub mod tokenizer;
pub mod tts;
pub mod types;
pub mod voices;

pub use commands::{Assistant, AssistantEvent, Command};
pub use settings::Settings;
pub use types::{Language, Voice, VoicePrefs};
