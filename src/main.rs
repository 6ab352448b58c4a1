//! Application entry point: the Phonaify practice console.
//!
//! A thin stand-in for a real host UI: it forwards typed commands to the
//! practice session as gestures and prints whatever the shared snapshot
//! says.  No pipeline logic lives here.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create [`tokio`] runtime (multi-thread, 2 workers).
//! 4. Create the gesture channel and the shared snapshot.
//! 5. Spawn the practice session (Gemini backend, cpal device, OS speech)
//!    on the tokio runtime, plus a watcher task that prints snapshot
//!    changes.
//! 6. Read commands from stdin on the main thread until `quit` or EOF.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;

use phonaify::{
    align::AlignmentResult,
    audio::CpalDevice,
    config::AppConfig,
    model::{DefinitionRecord, GeminiBackend, ScoringClient},
    session::{
        new_shared_snapshot, Gesture, PracticeSession, SessionSnapshot, SessionState,
        SharedSnapshot,
    },
    speech::SystemSpeech,
};

// ---------------------------------------------------------------------------
// Snapshot printing
// ---------------------------------------------------------------------------

/// Reference IPA with the symbols the learner missed wrapped in brackets:
/// `k[æ]t` means everything but the vowel came through.
fn fmt_alignment(alignment: &AlignmentResult) -> String {
    let mut out = String::new();
    for sym in alignment.symbols() {
        if sym.matched {
            out.push(sym.symbol);
        } else {
            out.push('[');
            out.push(sym.symbol);
            out.push(']');
        }
    }
    out
}

fn print_card(word: &str, card: &DefinitionRecord) {
    println!();
    println!("  {}  {}  ({})", word, card.phonetic, card.part_of_speech);
    println!("  {}", card.definition);
    if !card.example_sentence.is_empty() {
        println!("  \"{}\"", card.example_sentence);
    }
    if !card.synonyms.is_empty() {
        println!("  synonyms: {}", card.synonyms.join(", "));
    }
    println!();
}

/// Full snapshot dump for the `state` command.
fn print_snapshot(snap: &SessionSnapshot) {
    if snap.target_word.is_empty() {
        println!("  no word selected");
        return;
    }
    println!("  word:   {}  {}", snap.target_word, snap.target_phonetic);
    println!(
        "  state:  {}  ({:.1}s)",
        snap.state.label(),
        snap.elapsed_ms as f64 / 1000.0
    );
    if let Some(heard) = &snap.heard {
        println!("  heard:  {heard}");
    }
    if let Some(alignment) = &snap.alignment {
        println!("  match:  {}", fmt_alignment(alignment));
    }
    if let Some(feedback) = &snap.feedback {
        println!("  note:   {feedback}");
    }
    if let Some(error) = &snap.error {
        println!("  error:  {error}");
    }
}

/// Print whatever changed between two snapshots: new cards, state
/// transitions, verdicts, and error notices.
fn print_changes(last: &SessionSnapshot, current: &SessionSnapshot) {
    if current.definition != last.definition {
        if let Some(card) = &current.definition {
            print_card(&current.target_word, card);
        }
    }

    if current.state != last.state || current.generation != last.generation {
        match &current.state {
            SessionState::Scored(_) => {
                println!("  {}", current.state.label());
                if let Some(heard) = &current.heard {
                    println!("  heard:  {heard}");
                }
                if let Some(alignment) = &current.alignment {
                    println!("  match:  {}", fmt_alignment(alignment));
                }
                if let Some(feedback) = &current.feedback {
                    println!("  {feedback}");
                }
            }
            state => println!("  {}", state.label()),
        }
    }

    if current.error != last.error {
        if let Some(error) = &current.error {
            println!("  ! {error}");
        }
    }
}

/// Poll the shared snapshot and print every observable change.
async fn watch_snapshot(snapshot: SharedSnapshot) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(100));
    let mut last = SessionSnapshot::new();
    loop {
        ticker.tick().await;
        let current = snapshot.lock().unwrap().clone();
        print_changes(&last, &current);
        last = current;
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Phonaify starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if config.model.resolve_api_key().is_none() {
        log::warn!(
            "No API key configured and GEMINI_API_KEY is not set; model queries will fail"
        );
    }

    // 3. Tokio runtime (2 workers: the session loop and the model worker)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Channel + shared snapshot
    let (gestures, gesture_rx) = mpsc::channel::<Gesture>(16);
    let snapshot = new_shared_snapshot();

    // 5. Practice session + snapshot watcher on the tokio runtime
    let session_task = {
        let snapshot = Arc::clone(&snapshot);
        let config = config.clone();
        rt.spawn(async move {
            let client = ScoringClient::new(
                Arc::new(GeminiBackend::from_config(&config.model)),
                config.scoring.clone(),
            );
            let session = PracticeSession::new(
                &config,
                snapshot,
                client,
                Arc::new(CpalDevice::new()),
                Arc::new(SystemSpeech::new()),
            );
            session.run(gesture_rx).await;
        })
    };
    rt.spawn(watch_snapshot(Arc::clone(&snapshot)));

    // 6. stdin command loop; blocks the main thread until quit/EOF
    println!("commands: word <text> | start | stop | speak | state | quit");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let input = line.trim();
        let (command, rest) = match input.split_once(char::is_whitespace) {
            Some((head, tail)) => (head, tail.trim()),
            None => (input, ""),
        };

        let gesture = match command {
            "" => continue,
            "quit" | "exit" => break,
            "state" => {
                print_snapshot(&snapshot.lock().unwrap());
                continue;
            }
            "word" if !rest.is_empty() => Gesture::SelectWord(rest.to_string()),
            "start" => Gesture::Start,
            "stop" => Gesture::Stop,
            "speak" => Gesture::Speak,
            _ => {
                println!("commands: word <text> | start | stop | speak | state | quit");
                continue;
            }
        };

        if gestures.blocking_send(gesture).is_err() {
            log::error!("Practice session ended unexpectedly");
            break;
        }
    }

    // Closing the gesture channel winds the session down; wait for it so
    // the microphone is released before the process exits.
    drop(gestures);
    let _ = rt.block_on(session_task);
    log::info!("Phonaify shut down");
    Ok(())
}
