//! Dank Ditties host entry point.
//!
//! Wires a catalog, the playback worker and one voice listener per
//! configured participant, then reads chat commands from stdin until
//! Ctrl-C or EOF.

mod commands;
mod player;
mod settings;
mod sources;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ditties_core::{
    supervise, ClassifierFactory, CommandEvent, CommandInterpreter, EnergyTriggerClassifier,
    MemoryCatalog, PlaybackWorker, StopReason, VoiceAssistant, WakeWordClassifier, WitConfig,
    WitTranscriber,
};
use settings::{default_settings_path, load_settings, save_settings};
use sources::FileAudioSource;
use state::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use commands::ChatCommand;
use player::SimulatedSink;

const COMMAND_EVENT_CAP: usize = 64;
const CHAT_AUTHOR: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("ditties=info")),
        )
        .init();

    info!("Dank Ditties starting");

    let settings_path = default_settings_path();
    let settings = load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = save_settings(&settings_path, &settings) {
            warn!(path = %settings_path.display(), "could not write default settings: {e}");
        }
    }
    info!(
        settings_path = %settings_path.display(),
        participants = settings.participants.len(),
        resample_mode = ?settings.resample_mode,
        autoplay = settings.autoplay,
        "settings loaded"
    );

    // ── Catalog + playback ───────────────────────────────────────────────
    let catalog = match &settings.catalog_path {
        Some(path) => MemoryCatalog::from_json_file(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => MemoryCatalog::new(Vec::new()),
    };
    let catalog = Arc::new(catalog.ready_on_request(settings.instant_ready_requests));
    let sink = Arc::new(SimulatedSink::new(Duration::from_secs(settings.song_duration_secs)));
    let playback = Arc::new(PlaybackWorker::new(
        settings.playback_config(),
        catalog.clone(),
        sink,
    ));

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(settings.clone(), catalog.clone(), playback.clone()));

    {
        let playback = playback.clone();
        tokio::spawn(supervise(
            playback.subscribe_stopped(),
            settings.restart_delay(),
            shutdown.child_token(),
            move |_| {
                playback.try_ensure_started();
            },
        ));
    }

    let mut status_rx = playback.subscribe_status();
    tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(target: "ditties::status", "{json}"),
                    Err(e) => warn!("encode status event: {e}"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("status receiver lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // ── Voice listeners ──────────────────────────────────────────────────
    let (command_tx, mut command_rx) = broadcast::channel::<CommandEvent>(COMMAND_EVENT_CAP);
    tokio::spawn(async move {
        loop {
            match command_rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(target: "ditties::command", "{json}"),
                    Err(e) => warn!("encode command event: {e}"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("command receiver lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    match settings.wit_token.clone() {
        None if !settings.participants.is_empty() => {
            warn!("no wit.ai token configured; voice listeners disabled");
        }
        None => {}
        Some(token) => {
            let transcriber = Arc::new(WitTranscriber::new(WitConfig {
                endpoint: settings.wit_endpoint.clone(),
                token,
                capture: settings.capture_config(),
                ..WitConfig::default()
            })?);
            let classifier_config = settings.classifier.clone();
            let factory: ClassifierFactory =
                Arc::new(move || -> ditties_core::error::Result<Box<dyn WakeWordClassifier>> {
                    Ok(Box::new(EnergyTriggerClassifier::from_config(&classifier_config)?))
                });
            let interpreter = Arc::new(CommandInterpreter::new(catalog.clone()));

            for participant in &settings.participants {
                let source = Arc::new(FileAudioSource::new(
                    participant.name.clone(),
                    participant.audio_path.clone(),
                ));
                let assistant = VoiceAssistant::new(
                    settings.assistant_config(),
                    source,
                    factory.clone(),
                    transcriber.clone(),
                    interpreter.clone(),
                    playback.clone(),
                )
                .with_context(|| format!("listener for {}", participant.name))?
                .with_command_events(command_tx.clone());

                let listener = Arc::new(assistant.into_worker());
                {
                    let listener = listener.clone();
                    tokio::spawn(supervise(
                        listener.subscribe(),
                        settings.restart_delay(),
                        shutdown.child_token(),
                        move |event| {
                            // A file that simply ran out is not worth replaying.
                            if matches!(event.reason, StopReason::Failed(_)) {
                                if let Err(e) = listener.start() {
                                    warn!(worker = %event.worker, "restart failed: {e}");
                                }
                            }
                        },
                    ));
                }
                listener.start()?;
                state.add_listener(listener);
            }
        }
    }

    if settings.autoplay {
        playback.try_ensure_started();
    }

    // ── Chat loop ────────────────────────────────────────────────────────
    info!(prefix = %settings.command_prefix, "reading chat commands from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("stdin: {e}");
                break;
            }
        };
        if line.trim() == "diag" {
            match serde_json::to_string(&state.diagnostics_snapshot()) {
                Ok(json) => println!("{json}"),
                Err(e) => warn!("encode diagnostics: {e}"),
            }
            continue;
        }
        let Some(command) = ChatCommand::parse(&settings.command_prefix, &line) else {
            debug!("ignoring chat line");
            continue;
        };
        match commands::handle(&state, command, CHAT_AUTHOR).await {
            Ok(Some(reply)) => println!("{}: {reply}", settings.bot_name),
            Ok(None) => {}
            Err(e) => println!("{}: {e}", settings.bot_name),
        }
    }

    // ── Shutdown ─────────────────────────────────────────────────────────
    info!("shutting down");
    shutdown.cancel();
    let listeners: Vec<_> = state.listeners.lock().drain(..).collect();
    for listener in listeners {
        listener.stop().await;
    }
    playback.stop().await;
    info!("Dank Ditties stopped");
    Ok(())
}
