use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use phone_screen::config::ScreenConfig;
use phone_screen::core::audio::{
    AudioCaptureSource, ChannelCapture, PlaybackTarget, StreamPlayer, WavFileCapture,
};
use phone_screen::core::instructions::Difficulty;
use phone_screen::core::orchestrator::{SessionOrchestrator, SessionState};
use phone_screen::core::realtime::OpenAIRealtime;
use phone_screen::utils::format_elapsed;

/// Practice a technical phone screen with a realtime voice interviewer.
///
/// Lines typed on stdin are appended to the code editor and shared with the
/// interviewer once typing pauses. Commands: `:i` interrupts the interviewer,
/// `:clear` empties the editor, `:c` reconnects, `:d` disconnects, `:q` quits.
#[derive(Parser, Debug)]
#[command(name = "phone-screen")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// WAV file played into the session as the candidate's microphone
    #[arg(short = 'i', long = "input-wav", value_name = "FILE")]
    input_wav: Option<PathBuf>,

    /// Write the interviewer's audio to this WAV file
    #[arg(short = 'o', long = "output-wav", value_name = "FILE")]
    output_wav: Option<PathBuf>,

    /// Candidate name
    #[arg(long = "name")]
    name: Option<String>,

    /// Problem difficulty (easy, medium, hard)
    #[arg(long = "difficulty")]
    difficulty: Option<Difficulty>,

    /// Directory receiving a WAV file per completed conversation item
    #[arg(long = "archive-dir", value_name = "DIR")]
    archive_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Must be installed before the first TLS handshake
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let mut config = if let Some(config_path) = &cli.config {
        info!("Loading configuration from {}", config_path.display());
        ScreenConfig::from_file(config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ScreenConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };
    if let Some(name) = cli.name {
        config.candidate_name = name;
    }
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(dir) = cli.archive_dir {
        config.archive_dir = Some(dir);
    }

    // The feed keeps the channel source open for the lifetime of the program
    let (capture, _feed) = match cli.input_wav {
        Some(path) => (
            Box::new(WavFileCapture::new(path)) as Box<dyn AudioCaptureSource>,
            None,
        ),
        None => {
            warn!("No --input-wav given; the interviewer will not hear any speech");
            let (capture, feed) = ChannelCapture::new();
            (Box::new(capture) as Box<dyn AudioCaptureSource>, Some(feed))
        }
    };
    let target = cli
        .output_wav
        .map_or(PlaybackTarget::Null, PlaybackTarget::WavFile);

    let orchestrator = SessionOrchestrator::new(
        Box::new(OpenAIRealtime::new(config.realtime_config())),
        capture,
        Box::new(StreamPlayer::new(target)),
        config.settings(),
        config.tuning(),
    );
    drop(config);

    let (handle, task) = orchestrator.spawn();
    let elapsed = handle.subscribe_elapsed();

    let mut state = handle.subscribe_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            if current == SessionState::Idle {
                eprintln!("Session ended. Type :c to reconnect or :q to quit.");
            }
        }
    });

    handle.connect().await?;
    eprintln!("Connected. Type your solution; lines are shared as you pause.");

    let mut code = String::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("[{}] > ", format_elapsed(*elapsed.borrow()));
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            ":q" => break,
            ":i" => handle.key_released()?,
            ":c" => {
                if let Err(e) = handle.connect().await {
                    eprintln!("Connect failed: {}", e);
                }
            }
            ":d" => handle.disconnect().await?,
            ":clear" => {
                code.clear();
                handle.code_changed(code.clone())?;
            }
            _ => {
                code.push_str(&line);
                code.push('\n');
                handle.code_changed(code.trim_end())?;
            }
        }
    }

    handle.shutdown()?;
    task.await?;
    info!("Goodbye");
    Ok(())
}
