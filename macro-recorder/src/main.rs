//! Macro recorder command line
//!
//! - `record` captures input until the cancel key or Ctrl+C, then saves it
//! - `run` replays a saved timeline
//! - `watch` stays resident and reacts to the record and playback hotkeys

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use macro_recorder::{
    platforms::{InputController, InputHook, VirtualController, VirtualHook},
    FixedPath, HotkeyAction, HotkeyWatcher, MacroError, MacroRecorderConfig, PathPrompt,
    RecordingToggle, SessionController, SessionState, StdinPrompt, StopReason, TimestampedPath,
};
use std::{path::PathBuf, sync::Arc};
use tokio::{signal::ctrl_c, sync::mpsc};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Record mouse and keyboard input as a macro and play it back
#[derive(Parser, Debug)]
#[command(name = "macro-recorder")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record input until the cancel key (Esc by default) or Ctrl+C.
    ///
    /// Mouse buttons are only recorded once the pointer has moved, since button
    /// events do not carry a position.
    Record {
        /// Where to save the recording; asked for when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replay a recorded timeline
    Run {
        /// Timeline file; asked for when omitted
        file: Option<PathBuf>,

        /// Log the synthetic actions instead of performing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Wait for the record and playback hotkeys
    Watch {
        /// Directory for recordings started by hotkey
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Timeline the playback hotkey replays before anything is recorded
        #[arg(long)]
        last: Option<PathBuf>,
    },
}

type Backend = (Arc<dyn InputHook>, Arc<dyn InputController>);

#[cfg(feature = "rdev-backend")]
fn system_backend() -> Result<Backend> {
    use macro_recorder::platforms::{RdevController, RdevHook};

    let hook: Arc<dyn InputHook> = RdevHook::global();
    let controller: Arc<dyn InputController> = Arc::new(RdevController::new());
    Ok((hook, controller))
}

#[cfg(not(feature = "rdev-backend"))]
fn system_backend() -> Result<Backend> {
    anyhow::bail!("built without the rdev-backend feature; only `run --dry-run` is available")
}

fn virtual_backend() -> Backend {
    let hook: Arc<dyn InputHook> = Arc::new(VirtualHook::new());
    let controller: Arc<dyn InputController> = Arc::new(VirtualController::new());
    (hook, controller)
}

fn load_config(path: Option<&PathBuf>) -> Result<MacroRecorderConfig> {
    let config = match path {
        Some(path) => MacroRecorderConfig::load(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => MacroRecorderConfig::default(),
    };
    config.validate()?;
    debug!("Using configuration: {:?}", config);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Record { output } => record(config, output).await,
        Command::Run { file, dry_run } => run(config, file, dry_run).await,
        Command::Watch { output_dir, last } => watch(config, output_dir, last).await,
    }
}

async fn record(config: MacroRecorderConfig, output: Option<PathBuf>) -> Result<()> {
    let prompt: Box<dyn PathPrompt> = match (output, &config.output_dir) {
        (Some(path), _) => Box::new(FixedPath::new(path)),
        (None, Some(dir)) => Box::new(TimestampedPath::new(dir)),
        (None, None) => Box::new(StdinPrompt),
    };

    let (hook, controller) = system_backend()?;
    let cancel_key = config.cancel_key;
    let session = Arc::new(SessionController::new(config, hook, controller));

    let mut stopped = session.start_recording()?;
    let mut events = session.event_stream()?;
    info!(
        "Recording. Press key 0x{:02X} or Ctrl+C to stop.",
        cancel_key
    );

    loop {
        tokio::select! {
            Some(event) = events.next() => println!("{}", event),
            result = stopped.wait_for(Option::is_some) => {
                if let Ok(reason) = result {
                    debug!("Capture ended: {:?}", *reason);
                }
                break;
            }
            _ = ctrl_c() => {
                info!("Ctrl+C received");
                break;
            }
        }
    }

    let saved = tokio::task::spawn_blocking(move || session.stop_recording(prompt.as_ref()))
        .await
        .context("Save task panicked")??;
    match saved {
        Some(path) => info!("Saved {}", path.display()),
        None => info!("Recording discarded"),
    }
    Ok(())
}

async fn run(config: MacroRecorderConfig, file: Option<PathBuf>, dry_run: bool) -> Result<()> {
    let (hook, controller) = if dry_run {
        virtual_backend()
    } else {
        system_backend()?
    };
    let session = SessionController::new(config, hook, controller);

    let report = tokio::task::spawn_blocking(move || match file {
        Some(path) => session.play_file(&path).map(Some),
        None => session.play_with_prompt(&StdinPrompt),
    })
    .await
    .context("Playback task panicked")??;

    match report {
        Some(report) => info!(
            "Done: {} events performed, {} skipped",
            report.executed, report.skipped
        ),
        None => info!("Nothing to run"),
    }
    Ok(())
}

async fn watch(
    config: MacroRecorderConfig,
    output_dir: Option<PathBuf>,
    last: Option<PathBuf>,
) -> Result<()> {
    let output_dir = output_dir
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let prompt = Arc::new(TimestampedPath::new(output_dir));

    let (hook, controller) = system_backend()?;
    let session = Arc::new(SessionController::new(config, Arc::clone(&hook), controller));
    if let Some(last) = last {
        session.set_last_used(last);
    }

    let (tx, mut actions) = mpsc::unbounded_channel();
    let _watcher = HotkeyWatcher::start(hook.as_ref(), session.config(), tx)?;
    info!(
        "Watching hotkeys: record {}, play {}. Ctrl+C to quit.",
        describe_key(session.config().record_hotkey),
        describe_key(session.config().playback_hotkey)
    );

    loop {
        tokio::select! {
            Some(action) = actions.recv() => match action {
                HotkeyAction::ToggleRecording => {
                    toggle_recording(Arc::clone(&session), Arc::clone(&prompt)).await;
                }
                HotkeyAction::PlayLast => play_last(Arc::clone(&session)),
            },
            _ = ctrl_c() => {
                info!("Ctrl+C received, exiting");
                break;
            }
        }
    }

    if session.state() == SessionState::Recording {
        let saved = tokio::task::spawn_blocking(move || session.stop_recording(prompt.as_ref()))
            .await
            .context("Save task panicked")??;
        if let Some(path) = saved {
            info!("Saved {}", path.display());
        }
    }
    Ok(())
}

async fn toggle_recording(session: Arc<SessionController>, prompt: Arc<TimestampedPath>) {
    let toggled = {
        let session = Arc::clone(&session);
        let prompt = Arc::clone(&prompt);
        tokio::task::spawn_blocking(move || session.toggle_recording(prompt.as_ref())).await
    };

    match toggled {
        Ok(Ok(RecordingToggle::Started(mut stopped))) => {
            info!("Recording started");
            // The cancel key ends capture on the hook thread; save from here
            tokio::spawn(async move {
                let cancelled = stopped
                    .wait_for(|reason| *reason == Some(StopReason::CancelKey))
                    .await
                    .is_ok();
                if !cancelled {
                    return;
                }
                let result =
                    tokio::task::spawn_blocking(move || session.stop_recording(prompt.as_ref()))
                        .await;
                match result {
                    Ok(Ok(Some(path))) => info!("Saved {}", path.display()),
                    Ok(Ok(None)) => info!("Recording discarded"),
                    Ok(Err(MacroError::NotRecording)) => debug!("Recording already saved"),
                    Ok(Err(e)) => error!("Failed to save recording: {}", e),
                    Err(e) => error!("Save task panicked: {}", e),
                }
            });
        }
        Ok(Ok(RecordingToggle::Stopped(Some(path)))) => info!("Saved {}", path.display()),
        Ok(Ok(RecordingToggle::Stopped(None))) => info!("Recording discarded"),
        Ok(Err(e)) => warn!("{}", e),
        Err(e) => error!("Recording task panicked: {}", e),
    }
}

fn play_last(session: Arc<SessionController>) {
    // Detached so a second request while playing is rejected instead of queued
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || session.play_last()).await {
            Ok(Ok(Some(report))) => info!(
                "Playback done: {} events performed, {} skipped",
                report.executed, report.skipped
            ),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => warn!("{}", e),
            Err(e) => error!("Playback task panicked: {}", e),
        }
    });
}

fn describe_key(code: Option<u32>) -> String {
    match code {
        Some(code) => format!("0x{:02X}", code),
        None => "unbound".to_string(),
    }
}
