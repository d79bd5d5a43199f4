use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use trilingo::bubble::Row;
use trilingo::client::TranslateClient;
use trilingo::commands::{forward_pref_changes, forward_speech_events};
use trilingo::popup;
use trilingo::prefs::{FileStore, MemoryStore, PreferenceResolver, PreferenceStore};
use trilingo::sequencer::SequencerState;
use trilingo::tts::simulated::{SimulatedSpeech, DEFAULT_CHAR_DURATION};
use trilingo::tts::SpeechEngine;
use trilingo::types::{SpeechEvent, SpeechEventKind};
use trilingo::voices::VoiceCatalog;
use trilingo::{Assistant, AssistantEvent, Command, Language, Settings};

const USAGE: &str = "usage:
  trilingo [--words | --natural] [--row N] <text...>
  trilingo voices
  trilingo set-voice <zh|en|fr> <voice name>
  trilingo preview <zh|en|fr>";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trilingo=info")),
        )
        .init();

    let settings = Settings::load_or_default().context("Failed to load settings")?;
    let store: Arc<dyn PreferenceStore> = match settings.storage_path() {
        Some(path) => Arc::new(FileStore::new(path)),
        None => Arc::new(MemoryStore::new()),
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (speech_tx, speech_rx) = mpsc::unbounded_channel();
    let engine = make_engine(speech_tx);

    match args.first().map(String::as_str) {
        None | Some("-h") | Some("--help") => {
            println!("{}", USAGE);
            Ok(())
        }
        Some("voices") => list_voices(engine.as_ref(), store.as_ref()),
        Some("set-voice") => set_voice(engine.as_ref(), store.as_ref(), &args[1..]),
        Some("preview") => preview(engine, speech_rx, store.as_ref(), &settings, &args[1..]).await,
        _ => translate_and_speak(engine, speech_rx, store, &settings, &args).await,
    }
}

fn make_engine(events: mpsc::UnboundedSender<SpeechEvent>) -> Box<dyn SpeechEngine> {
    #[cfg(feature = "native")]
    {
        match trilingo::tts::native::NativeSpeech::new(events.clone()) {
            Ok(engine) => return Box::new(engine),
            Err(e) => tracing::warn!(error = %e, "Native TTS unavailable; using simulated speech"),
        }
    }
    Box::new(SimulatedSpeech::spawn(
        events,
        SimulatedSpeech::default_voices(),
        DEFAULT_CHAR_DURATION,
    ))
}

fn parse_language(arg: Option<&String>) -> Result<Language> {
    let code = arg.context("missing language code")?;
    Language::from_code(code).with_context(|| format!("unknown language: {}", code))
}

fn list_voices(engine: &dyn SpeechEngine, store: &dyn PreferenceStore) -> Result<()> {
    let catalog = VoiceCatalog::new(engine.voices()?);
    let prefs = PreferenceResolver::load(store);

    for language in Language::ALL {
        let best = catalog
            .find_best_voice(language, prefs.prefs())
            .map(|v| v.name.as_str())
            .unwrap_or("(platform default)");
        println!("{} -> {}", language.label(), best);

        let options = popup::options(&catalog, language);
        if options.is_empty() {
            println!("    (no voices)");
        }
        for option in options {
            println!("    {:<28} {}", option.label, option.value);
        }
    }
    Ok(())
}

fn set_voice(engine: &dyn SpeechEngine, store: &dyn PreferenceStore, args: &[String]) -> Result<()> {
    let language = parse_language(args.first())?;
    let name = args[1..].join(" ");
    if name.is_empty() {
        bail!("missing voice name");
    }

    let catalog = VoiceCatalog::new(engine.voices()?);
    if catalog.find_by_name(&name).is_none() {
        tracing::warn!(voice = %name, "Voice is not installed; saving anyway");
    }

    let mut selections = popup::saved_selections(store);
    selections.insert(language, name);
    let prefs = popup::save(store, &selections)?;
    println!("saved {} voice preference(s)", prefs.len());
    Ok(())
}

async fn preview(
    mut engine: Box<dyn SpeechEngine>,
    mut speech: mpsc::UnboundedReceiver<SpeechEvent>,
    store: &dyn PreferenceStore,
    settings: &Settings,
    args: &[String],
) -> Result<()> {
    let language = parse_language(args.first())?;
    let catalog = VoiceCatalog::new(engine.voices()?);
    let selections = popup::saved_selections(store);
    let selected = selections.get(&language).map(String::as_str);

    let id = popup::preview(
        engine.as_mut(),
        &catalog,
        language,
        selected,
        settings.preview_rate,
    )?;
    println!("{}", language.sample_text());

    while let Some(event) = speech.recv().await {
        if event.id == id && event.kind != SpeechEventKind::Start {
            break;
        }
    }
    Ok(())
}

async fn translate_and_speak(
    engine: Box<dyn SpeechEngine>,
    speech: mpsc::UnboundedReceiver<SpeechEvent>,
    store: Arc<dyn PreferenceStore>,
    settings: &Settings,
    args: &[String],
) -> Result<()> {
    let mut mode = None;
    let mut row = 0;
    let mut words = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--words" => mode = Some(Command::SpeakWords as fn(usize) -> Command),
            "--natural" => mode = Some(Command::SpeakNatural as fn(usize) -> Command),
            "--row" => {
                row = iter
                    .next()
                    .context("--row needs a value")?
                    .parse()
                    .context("--row must be a number")?;
            }
            _ => words.push(arg.as_str()),
        }
    }
    let text = words.join(" ");

    let client = TranslateClient::new(settings)?;
    let prefs = PreferenceResolver::load(store.as_ref());
    let mut assistant = Assistant::new(engine, prefs, settings);

    if !assistant.select(&text, &client).await {
        bail!("selection is empty or longer than {} characters", settings.max_selection_chars);
    }
    for (i, r) in assistant.bubble().rows().iter().enumerate() {
        println!("{} [{}] {}", i, r.language.label(), r.text);
    }

    let Some(speak) = mode else {
        return Ok(());
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    forward_speech_events(speech, tx.clone());
    forward_pref_changes(store.subscribe(), tx.clone());

    assistant.handle(AssistantEvent::Command(speak(row)));
    let mut shown = None;
    while assistant.state() != SequencerState::Idle {
        let Some(event) = rx.recv().await else {
            break;
        };
        assistant.handle(event);

        let active = assistant.bubble().active_unit();
        if active != shown {
            if let Some((r, unit)) = active {
                if let Some(current) = assistant.bubble().row(r) {
                    println!("{}", render_highlight(current, unit));
                }
            }
            shown = active;
        }
    }
    Ok(())
}

fn render_highlight(row: &Row, active: usize) -> String {
    row.units
        .iter()
        .enumerate()
        .map(|(i, unit)| {
            if i == active {
                format!("[{}]", unit)
            } else {
                unit.clone()
            }
        })
        .collect()
}
