//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};
use uuid::Uuid;

use super::script::{GestureScript, GestureStream};
use super::{LibraryAction, PerformOptions};
use crate::capture::Artifact;
use crate::config::SessionConfig;
use crate::engine::decode_file;
use crate::input::SurfaceRect;
use crate::library::{Collection, FileStore, Library, PrintMeta, Privacy, SoundPrint};
use crate::session::{DiagnosticLevel, Session, SessionEvent, SessionState};

/// Render-loop frame length for headless performances
const FRAME: Duration = Duration::from_millis(16);

/// Surface used for random gestures
const DEFAULT_SURFACE: SurfaceRect = SurfaceRect {
    left: 0.0,
    top: 0.0,
    width: 1080.0,
    height: 1080.0,
};

/// Perform a ritual on a WAV file and save the resulting print.
pub fn perform(input: &Path, options: &PerformOptions) -> anyhow::Result<()> {
    info!("Performing ritual on: {}", input.display());

    let source = decode_file(input).with_context(|| format!("cannot decode {}", input.display()))?;
    let mut session = build_session(options)?;
    session.start(source)?;

    let artifact = run_to_completion(&mut session, options)?;
    save_artifact(&artifact, options)
}

/// Re-perform a stored print's audio through a new ritual.
pub fn alter(id: &Uuid, options: &PerformOptions) -> anyhow::Result<()> {
    info!("Altering print: {}", id);

    let library = open_library(&options.library)?;
    let print = library
        .get(id)?
        .with_context(|| format!("no print {} in {}", id, options.library.display()))?;
    let original = library.load_artifact(&print)?;
    if !original.has_audio() {
        bail!("print {} has no audio to alter", id);
    }

    let mut session = build_session(options)?;
    session.alter(&original)?;

    let artifact = run_to_completion(&mut session, options)?;
    save_artifact(&artifact, options)
}

/// Run a library subcommand.
pub fn library(root: &Path, action: LibraryAction) -> anyhow::Result<()> {
    let mut library = open_library(root)?;

    match action {
        LibraryAction::List { collection } => {
            let collections = match collection {
                Some(c) => vec![c],
                None => Collection::ALL.to_vec(),
            };
            for collection in collections {
                let prints = library.list(collection)?;
                println!("{} ({})", collection, prints.len());
                println!("{:-<60}", "");
                for print in &prints {
                    print_summary(print);
                }
                println!();
            }
        }
        LibraryAction::Toggle { id } => {
            let privacy = library.toggle_privacy(&id)?;
            println!("{} is now {}", id, privacy);
        }
        LibraryAction::Delete { id, from } => {
            library.delete(&id, from)?;
            match from {
                Collection::Trash => println!("{} permanently deleted", id),
                _ => println!("{} moved to trash", id),
            }
        }
        LibraryAction::Restore { id } => {
            library.restore(&id)?;
            println!("{} restored to public", id);
        }
        LibraryAction::Export { id, out } => {
            let print = library
                .get(&id)?
                .with_context(|| format!("no print {} in {}", id, root.display()))?;
            let (image, audio) = library.load_blobs(&print)?;

            fs::create_dir_all(&out).with_context(|| format!("cannot create {}", out.display()))?;
            let image_path = out.join(format!("{}.png", id));
            fs::write(&image_path, image)?;
            println!("Image: {}", image_path.display());
            if let Some(audio) = audio {
                let audio_path = out.join(format!("{}.wav", id));
                fs::write(&audio_path, audio)?;
                println!("Audio: {}", audio_path.display());
            }
        }
        LibraryAction::Prune => {
            let removed = library.prune_orphaned_blobs()?;
            println!("Removed {} orphaned blobs", removed);
        }
    }

    Ok(())
}

/// Write the default configuration file.
pub fn write_config(path: &Path) -> anyhow::Result<()> {
    SessionConfig::default()
        .save(path)
        .with_context(|| format!("cannot write {}", path.display()))?;
    println!("Configuration written: {}", path.display());
    Ok(())
}

fn build_session(options: &PerformOptions) -> anyhow::Result<Session> {
    let mut config = match &options.config {
        Some(path) => SessionConfig::load(path).with_context(|| format!("cannot load {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if options.seed.is_some() {
        config.rng_seed = options.seed;
    }
    Ok(Session::headless(config)?)
}

/// Drive the session frame by frame until it completes.
fn run_to_completion(session: &mut Session, options: &PerformOptions) -> anyhow::Result<Artifact> {
    let events = session.subscribe();
    let mut gestures = match &options.script {
        Some(path) => GestureStream::scripted(
            GestureScript::load(path).with_context(|| format!("cannot load script {}", path.display()))?,
        ),
        None => GestureStream::random(DEFAULT_SURFACE, options.gesture_rate, options.seed),
    };
    let surface = gestures.surface();
    let end_after = options
        .end_after
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64);

    println!("Ritual started: {:.1}s", session.duration_secs());
    let started = session.now();

    while session.state() != SessionState::Complete {
        let elapsed = session.now().saturating_sub(started);

        if session.state() == SessionState::Active {
            for contacts in gestures.due(elapsed) {
                session.pointer(&contacts, &surface);
            }
            if end_after.is_some_and(|limit| elapsed >= limit) {
                session.end_ritual();
            }
        }

        session.advance(FRAME);
        session.render_frame(FRAME);

        for event in events.try_iter() {
            report(&event);
        }
    }

    session
        .take_artifact()
        .context("session completed without an artifact")
}

fn save_artifact(artifact: &Artifact, options: &PerformOptions) -> anyhow::Result<()> {
    let mut library = open_library(&options.library)?;
    let privacy = if options.private { Privacy::Private } else { Privacy::Public };
    let meta = PrintMeta {
        name: options.name.clone(),
        tribe: options.tribe.clone(),
        title: options.title.clone(),
    };

    let print = library.ingest(artifact, meta, privacy)?;
    println!("Sound print saved: {} ({})", print.id, privacy);
    Ok(())
}

fn open_library(root: &Path) -> anyhow::Result<Library<FileStore>> {
    let store = FileStore::open(root).with_context(|| format!("cannot open library at {}", root.display()))?;
    Ok(Library::new(store))
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::HintShown { text, .. } => println!("  » {}", text),
        SessionEvent::FinalWindowEntered => println!("  Final window open"),
        SessionEvent::Countdown { remaining_secs } if remaining_secs % 10 == 0 => {
            println!("  {}s remaining", remaining_secs)
        }
        SessionEvent::Completed { reason, source, .. } => {
            println!("Ritual complete ({}, {})", reason, source)
        }
        SessionEvent::Diagnostic {
            level: DiagnosticLevel::Warning,
            message,
        } => warn!("{}", message),
        _ => {}
    }
}

fn print_summary(print: &SoundPrint) {
    let title = if print.title.is_empty() { "Untitled" } else { print.title.as_str() };
    println!(
        "{}  {:<24} {:>6.1}s  {}{}",
        print.id,
        title,
        print.duration_secs,
        print.timestamp.format("%Y-%m-%d %H:%M"),
        if print.audio_key.is_some() { "" } else { "  (no audio)" }
    );
}
