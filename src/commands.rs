//! User commands and the controller that owns all speaking state.
//!
//! Every mutation happens inside [`Assistant::handle`], one event at a time.
//! Platform callbacks (speech progress, voice list changes, preference edits)
//! are funnelled into the same channel as user commands so they are applied in
//! arrival order on a single task.

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::bubble::Bubble;
use crate::client::Translator;
use crate::prefs::{prefs_from_change, PreferenceResolver, StorageChange};
use crate::sequencer::{SequencerState, SpeakTarget, Sequencer};
use crate::settings::Settings;
use crate::tts::SpeechEngine;
use crate::types::{RowId, SpeechEvent, VoicePrefs};
use crate::voices::VoiceCatalog;

/// Something the user did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Text selected on the page
    Select(String),
    SpeakNatural(RowId),
    SpeakWords(RowId),
    /// Close button
    Close,
    /// Pointer pressed outside the bubble
    ClickOutside,
}

/// Everything the controller reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantEvent {
    Command(Command),
    VoicesChanged,
    PrefsChanged(VoicePrefs),
    Speech(SpeechEvent),
}

pub struct Assistant<E> {
    sequencer: Sequencer<E>,
    catalog: VoiceCatalog,
    prefs: PreferenceResolver,
    bubble: Bubble,
}

impl<E: SpeechEngine> Assistant<E> {
    pub fn new(engine: E, prefs: PreferenceResolver, settings: &Settings) -> Self {
        let mut assistant = Self {
            sequencer: Sequencer::new(engine, settings.rates()),
            catalog: VoiceCatalog::default(),
            prefs,
            bubble: Bubble::new(settings.max_selection_chars),
        };
        assistant.refresh_voices();
        assistant
    }

    pub fn bubble(&self) -> &Bubble {
        &self.bubble
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    pub fn prefs(&self) -> &PreferenceResolver {
        &self.prefs
    }

    pub fn state(&self) -> SequencerState {
        self.sequencer.state()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.sequencer.engine_mut()
    }

    /// Reload the voice list from the engine, replacing the old snapshot
    pub fn refresh_voices(&mut self) {
        match self.sequencer.engine().voices() {
            Ok(voices) => self.catalog.refresh(voices),
            Err(e) => warn!(error = %e, "Failed to list voices; keeping previous catalog"),
        }
    }

    /// Apply one event. Selections need the translator, so they go through
    /// [`Assistant::handle_async`]; here they are ignored.
    pub fn handle(&mut self, event: AssistantEvent) {
        match event {
            AssistantEvent::Command(command) => self.execute(command),
            AssistantEvent::VoicesChanged => self.refresh_voices(),
            AssistantEvent::PrefsChanged(prefs) => self.prefs.on_external_change(prefs),
            AssistantEvent::Speech(event) => self.sequencer.handle_event(event, &mut self.bubble),
        }
    }

    /// Apply one event, translating selections with `translator`
    pub async fn handle_async<T: Translator>(&mut self, event: AssistantEvent, translator: &T) {
        match event {
            AssistantEvent::Command(Command::Select(text)) => {
                self.select(&text, translator).await;
            }
            other => self.handle(other),
        }
    }

    /// Show the bubble for a new selection. Any speech is cancelled first
    /// since row ids are about to be reused.
    pub async fn select<T: Translator>(&mut self, text: &str, translator: &T) -> bool {
        self.sequencer.cancel(&mut self.bubble);
        self.bubble.present(text, translator).await
    }

    /// Process events until every sender is dropped
    pub async fn run<T: Translator>(
        &mut self,
        mut events: mpsc::UnboundedReceiver<AssistantEvent>,
        translator: &T,
    ) {
        info!("Assistant event loop started");
        while let Some(event) = events.recv().await {
            self.handle_async(event, translator).await;
        }
        self.sequencer.cancel(&mut self.bubble);
        info!("Assistant event loop stopped");
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Select(_) => {
                debug!("Selection received without translator; ignored");
            }
            Command::SpeakNatural(row) => {
                let Some(r) = self.bubble.row(row) else {
                    warn!(row, "Speak requested for unknown row");
                    return;
                };
                let target = SpeakTarget {
                    row,
                    language: r.language,
                };
                let text = r.text.clone();
                self.sequencer.speak_natural(
                    &mut self.bubble,
                    &self.catalog,
                    self.prefs.prefs(),
                    target,
                    &text,
                );
            }
            Command::SpeakWords(row) => {
                let Some(r) = self.bubble.row(row) else {
                    warn!(row, "Speak requested for unknown row");
                    return;
                };
                let target = SpeakTarget {
                    row,
                    language: r.language,
                };
                let units = r.units.clone();
                self.sequencer.speak_words(
                    &mut self.bubble,
                    &self.catalog,
                    self.prefs.prefs(),
                    target,
                    &units,
                );
            }
            Command::Close | Command::ClickOutside => {
                self.sequencer.cancel(&mut self.bubble);
                self.bubble.hide();
            }
        }
    }
}

/// Forward engine progress into the controller's channel
pub fn forward_speech_events(
    mut speech: mpsc::UnboundedReceiver<SpeechEvent>,
    events: mpsc::UnboundedSender<AssistantEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = speech.recv().await {
            if events.send(AssistantEvent::Speech(event)).is_err() {
                break;
            }
        }
    })
}

/// Forward preference edits from the store into the controller's channel
pub fn forward_pref_changes(
    mut changes: broadcast::Receiver<StorageChange>,
    events: mpsc::UnboundedSender<AssistantEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    if let Some(prefs) = prefs_from_change(&change) {
                        if events.send(AssistantEvent::PrefsChanged(prefs)).is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed preference changes");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PROVIDER_FAILURE;
    use crate::prefs::{MemoryStore, PreferenceStore};
    use crate::tts::testing::RecordingEngine;
    use crate::types::{Language, Voice, VOICE_PREFS_KEY};

    struct FakeTranslator;

    impl Translator for FakeTranslator {
        async fn translate(&self, _text: &str, _from: Language, to: Language) -> String {
            match to {
                Language::Zh => "你好世界".to_string(),
                Language::En => "Hello world".to_string(),
                Language::Fr => PROVIDER_FAILURE.to_string(),
            }
        }
    }

    fn assistant() -> Assistant<RecordingEngine> {
        let engine = RecordingEngine::with_voices(vec![
            Voice::new("Samantha", "en-US", true),
            Voice::new("Karen", "en-AU", true),
            Voice::new("Thomas", "fr-FR", true),
        ]);
        Assistant::new(engine, PreferenceResolver::default(), &Settings::default())
    }

    async fn with_selection(text: &str) -> Assistant<RecordingEngine> {
        let mut assistant = assistant();
        assert!(assistant.select(text, &FakeTranslator).await);
        assistant
    }

    fn speech(event: SpeechEvent) -> AssistantEvent {
        AssistantEvent::Speech(event)
    }

    #[tokio::test]
    async fn test_natural_then_words_clears_first_row() {
        // Rows: 0 = fr source, 1 = zh, 2 = en
        let mut assistant = with_selection("Bonjour le monde").await;

        assistant.handle(AssistantEvent::Command(Command::SpeakNatural(0)));
        assert_eq!(assistant.bubble().speaking_rows(), vec![0]);

        assistant.handle(AssistantEvent::Command(Command::SpeakWords(2)));
        assert_eq!(assistant.bubble().speaking_rows(), vec![2]);
        assert_eq!(assistant.bubble().active_unit(), None);

        let ids = assistant.engine_mut().ids();
        // 1 natural + "Hello", "world"
        assert_eq!(ids.len(), 3);
        assistant.handle(speech(SpeechEvent::start(ids[1])));
        assert_eq!(assistant.bubble().active_unit(), Some((2, 0)));
    }

    #[tokio::test]
    async fn test_word_session_runs_to_completion() {
        let mut assistant = with_selection("Bonjour le monde").await;

        assistant.handle(AssistantEvent::Command(Command::SpeakWords(1)));
        let ids = assistant.engine_mut().ids();
        assert_eq!(assistant.engine_mut().texts(), vec!["你好", "世界"]);

        for id in &ids {
            assistant.handle(speech(SpeechEvent::start(*id)));
            let active = assistant
                .bubble()
                .rows()
                .iter()
                .filter(|r| r.active_unit.is_some())
                .count();
            assert_eq!(active, 1);
            assistant.handle(speech(SpeechEvent::end(*id)));
        }

        assert_eq!(assistant.state(), SequencerState::Idle);
        assert!(assistant.bubble().speaking_rows().is_empty());
        assert_eq!(assistant.bubble().active_unit(), None);
    }

    #[tokio::test]
    async fn test_click_outside_cancels_and_hides() {
        let mut assistant = with_selection("Bonjour le monde").await;
        assistant.handle(AssistantEvent::Command(Command::SpeakWords(0)));
        let ids = assistant.engine_mut().ids();
        assistant.handle(speech(SpeechEvent::start(ids[1])));

        assistant.handle(AssistantEvent::Command(Command::ClickOutside));

        assert!(!assistant.bubble().is_visible());
        assert_eq!(assistant.state(), SequencerState::Idle);
        assert!(assistant.bubble().speaking_rows().is_empty());
        assert_eq!(assistant.bubble().active_unit(), None);
    }

    #[tokio::test]
    async fn test_unknown_row_is_ignored() {
        let mut assistant = with_selection("Hello world").await;
        assistant.handle(AssistantEvent::Command(Command::SpeakNatural(9)));

        assert!(assistant.engine_mut().requests.is_empty());
        assert_eq!(assistant.state(), SequencerState::Idle);
    }

    #[tokio::test]
    async fn test_preference_change_applies_to_next_request() {
        let mut assistant = with_selection("Hello world").await;

        assistant.handle(AssistantEvent::Command(Command::SpeakNatural(0)));
        let first = assistant.engine_mut().requests[0].1.voice.clone().unwrap();
        assert_eq!(first.name, "Samantha");

        let mut prefs = VoicePrefs::new();
        prefs.insert(Language::En, "Karen");
        assistant.handle(AssistantEvent::PrefsChanged(prefs));

        assistant.handle(AssistantEvent::Command(Command::SpeakNatural(0)));
        let second = assistant.engine_mut().requests[1].1.voice.clone().unwrap();
        assert_eq!(second.name, "Karen");
    }

    #[tokio::test]
    async fn test_voices_changed_refreshes_catalog() {
        let mut assistant = assistant();
        assistant.engine_mut().voices = vec![Voice::new("Tingting", "zh-CN", true)];

        assistant.handle(AssistantEvent::VoicesChanged);

        assert_eq!(assistant.catalog().voices().len(), 1);
        assert!(assistant.catalog().find_by_name("Samantha").is_none());
    }

    #[tokio::test]
    async fn test_new_selection_cancels_speech() {
        let mut assistant = with_selection("Bonjour le monde").await;
        assistant.handle(AssistantEvent::Command(Command::SpeakNatural(0)));
        let cancels = assistant.engine_mut().cancels;

        assistant.select("Hello world", &FakeTranslator).await;

        assert_eq!(assistant.engine_mut().cancels, cancels + 1);
        assert_eq!(assistant.state(), SequencerState::Idle);
        assert_eq!(assistant.bubble().rows()[0].language, Language::En);
    }

    #[tokio::test]
    async fn test_run_loop_with_forwarded_store_changes() {
        let store = MemoryStore::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = forward_pref_changes(store.subscribe(), tx.clone());

        tx.send(AssistantEvent::Command(Command::Select("Hello world".to_string())))
            .unwrap();
        store
            .set(VOICE_PREFS_KEY, serde_json::json!({"en": "Karen"}))
            .unwrap();

        let mut assistant = assistant();
        let tx_for_close = tx.clone();
        drop(tx);

        let driver = async {
            // Let the forwarder deliver, then close the loop
            tokio::task::yield_now().await;
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            forwarder.abort();
            drop(tx_for_close);
        };
        tokio::join!(assistant.run(rx, &FakeTranslator), driver);

        assert!(assistant.bubble().is_visible());
        assert_eq!(assistant.prefs().get(Language::En), Some("Karen"));
    }
}
