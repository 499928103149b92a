//! The session orchestrator.
//!
//! Owns the realtime client and both audio devices, and is the only place
//! that mutates them. Everything that happens asynchronously (capture frames,
//! session events) is funneled into a per-session inbox so it is handled on
//! the orchestrator's own task, in arrival order.

use std::collections::HashMap;
use std::future::pending;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::core::audio::{
    AudioBuffer, AudioCaptureSource, AudioPlaybackSink, DeviceError, SAMPLE_RATE, decode,
};
use crate::core::debounce::Debouncer;
use crate::core::realtime::{BaseRealtime, ConversationItem, EventKind, ItemDelta, RealtimeEvent};
use crate::utils::ElapsedTimer;

use super::errors::{OrchestratorError, OrchestratorResult};
use super::handle::Command;
use super::settings::{SessionState, SessionTuning, Settings, session_options};

/// Refresh interval of the elapsed clock.
pub const ELAPSED_TICK: Duration = Duration::from_millis(16);

/// Work queued for the orchestrator task by the devices and the client.
#[derive(Debug)]
enum Inbound {
    Frame(Vec<i16>),
    Session(RealtimeEvent),
}

enum Wake {
    Command(Option<Command>),
    Inbound(Option<Inbound>),
    Settled(String),
    Tick,
}

/// Resources acquired so far by a connect attempt.
#[derive(Debug, Default)]
struct Acquired {
    capture: bool,
    playback: bool,
    client: bool,
}

/// Wrap an editor snapshot the way it is shown to the agent.
pub fn fence_code(code: &str) -> String {
    format!("```\n{}\n```", code)
}

async fn recv_inbox(inbox: &mut Option<mpsc::UnboundedReceiver<Inbound>>) -> Option<Inbound> {
    match inbox {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn write_archive(dir: &Path, item_id: &str, buffer: &AudioBuffer) -> Result<(), DeviceError> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(format!("{}.wav", item_id)), &buffer.wav).await?;
    Ok(())
}

/// Drives one interview session at a time.
pub struct SessionOrchestrator {
    client: Box<dyn BaseRealtime>,
    capture: Box<dyn AudioCaptureSource>,
    playback: Box<dyn AudioPlaybackSink>,
    settings: Settings,
    tuning: SessionTuning,
    debouncer: Debouncer<String>,
    inbox: Option<mpsc::UnboundedReceiver<Inbound>>,
    /// Last snapshot delivered during the current session
    last_sent: Option<String>,
    /// Latest snapshot that survived the quiet interval
    latest_settled: Option<String>,
    archive: HashMap<String, AudioBuffer>,
    timer: ElapsedTimer,
    state_tx: watch::Sender<SessionState>,
    elapsed_tx: watch::Sender<u64>,
}

impl SessionOrchestrator {
    pub fn new(
        client: Box<dyn BaseRealtime>,
        capture: Box<dyn AudioCaptureSource>,
        playback: Box<dyn AudioPlaybackSink>,
        settings: Settings,
        tuning: SessionTuning,
    ) -> Self {
        let debouncer = Debouncer::new(tuning.debounce);
        Self {
            client,
            capture,
            playback,
            settings,
            tuning,
            debouncer,
            inbox: None,
            last_sent: None,
            latest_settled: None,
            archive: HashMap::new(),
            timer: ElapsedTimer::default(),
            state_tx: watch::channel(SessionState::Idle).0,
            elapsed_tx: watch::channel(0).0,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tuning(&self) -> &SessionTuning {
        &self.tuning
    }

    /// Decoded agent and user audio of completed items, keyed by item id.
    pub fn archive(&self) -> &HashMap<String, AudioBuffer> {
        &self.archive
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Whole seconds since the session became active.
    pub fn subscribe_elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed_tx.subscribe()
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!("Session state: {} -> {}", previous, state);
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open a session.
    ///
    /// On failure everything acquired by this attempt is released and the
    /// orchestrator is back in `Idle`.
    pub async fn connect(&mut self) -> OrchestratorResult<()> {
        if self.state() != SessionState::Idle {
            return Err(OrchestratorError::AlreadyActive);
        }
        if !self.settings.has_credential() {
            warn!("Cannot connect without an API key");
            return Err(OrchestratorError::MissingCredential);
        }

        info!("Connecting...");
        self.set_state(SessionState::Connecting);

        let mut acquired = Acquired::default();
        match self.open_session(&mut acquired).await {
            Ok(()) => {
                self.timer.start();
                self.elapsed_tx.send_replace(0);
                self.set_state(SessionState::Active);
                info!(
                    candidate = %self.settings.candidate_name,
                    difficulty = %self.settings.difficulty,
                    "Interview session active"
                );
                self.flush_settled().await;
                Ok(())
            }
            Err(e) => {
                error!("Failed to start session: {}", e);
                self.release(acquired).await;
                self.inbox = None;
                self.set_state(SessionState::Idle);
                Err(e)
            }
        }
    }

    async fn open_session(&mut self, acquired: &mut Acquired) -> OrchestratorResult<()> {
        self.client
            .update_session(session_options(&self.settings, &self.tuning))
            .await?;

        self.capture.begin().await?;
        acquired.capture = true;

        self.playback.connect().await?;
        acquired.playback = true;

        let (tx, rx) = mpsc::unbounded_channel();
        self.inbox = Some(rx);
        for kind in [
            EventKind::Error,
            EventKind::ConversationInterrupted,
            EventKind::ConversationUpdated,
        ] {
            let tx = tx.clone();
            self.client.on(
                kind,
                Arc::new(move |event| {
                    let _ = tx.send(Inbound::Session(event.clone()));
                }),
            );
        }
        acquired.client = true;
        self.client.connect(&self.settings.api_key).await?;

        self.client
            .wait_for_session_created(self.tuning.session_ready_timeout)
            .await?;

        self.capture
            .record(Box::new(move |frame| {
                let _ = tx.send(Inbound::Frame(frame.mono));
            }))
            .await?;

        self.client.create_response().await?;
        Ok(())
    }

    async fn release(&mut self, acquired: Acquired) {
        if acquired.client
            && let Err(e) = self.client.disconnect().await
        {
            warn!("Failed to disconnect realtime session: {}", e);
        }
        if acquired.playback
            && let Err(e) = self.playback.disconnect().await
        {
            warn!("Failed to disconnect playback: {}", e);
        }
        if acquired.capture
            && let Err(e) = self.capture.end().await
        {
            warn!("Failed to end capture: {}", e);
        }
    }

    /// End the session. Every step runs even if an earlier one fails.
    pub async fn disconnect(&mut self) {
        if self.state() == SessionState::Idle {
            return;
        }
        info!("Disconnecting...");
        self.set_state(SessionState::Disconnecting);

        if let Err(e) = self.client.disconnect().await {
            warn!("Failed to disconnect realtime session: {}", e);
        }
        if let Err(e) = self.capture.end().await {
            warn!("Failed to end capture: {}", e);
        }
        self.playback.interrupt();
        if let Err(e) = self.playback.disconnect().await {
            warn!("Failed to disconnect playback: {}", e);
        }

        self.inbox = None;
        self.last_sent = None;
        self.timer.stop();
        self.elapsed_tx.send_replace(0);
        self.set_state(SessionState::Idle);
    }

    /// Replace the settings. A new API key ends the live session.
    pub async fn update_settings(&mut self, settings: Settings) {
        let credential_changed = settings.api_key != self.settings.api_key;
        self.settings = settings;
        if credential_changed && self.state() != SessionState::Idle {
            info!("API key changed, ending current session");
            self.disconnect().await;
        }
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    /// Record new editor contents. They are sent once edits stop.
    pub fn code_changed(&mut self, code: impl Into<String>) {
        self.debouncer.push(code.into());
    }

    /// Manual barge-in.
    pub async fn key_released(&mut self) {
        if self.state() == SessionState::Active {
            self.interrupt_and_cancel().await;
        }
    }

    /// Handle a snapshot that survived the quiet interval.
    pub async fn snapshot_settled(&mut self, code: String) {
        self.latest_settled = Some(code);
        if self.state() == SessionState::Active {
            self.flush_settled().await;
        }
    }

    async fn flush_settled(&mut self) {
        let Some(code) = self.latest_settled.clone() else {
            return;
        };
        if code.is_empty() || self.last_sent.as_ref() == Some(&code) {
            return;
        }

        let message = fence_code(&code);
        debug!("Sending code: {}", message);
        match self.client.send_text(&message).await {
            Ok(()) => self.last_sent = Some(code),
            Err(e) => warn!("Failed to send code snapshot: {}", e),
        }
    }

    async fn interrupt_and_cancel(&mut self) {
        let Some(stopped) = self.playback.interrupt() else {
            return;
        };
        debug!(
            "Playback stopped at {} samples into {}",
            stopped.offset, stopped.track_id
        );
        if let Err(e) = self
            .client
            .cancel_response(&stopped.track_id, stopped.offset)
            .await
        {
            warn!("Failed to cancel response: {}", e);
        }
    }

    // =========================================================================
    // Session events
    // =========================================================================

    /// Handle everything already queued in the inbox without waiting.
    ///
    /// Returns how many entries were handled.
    pub async fn pump_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = match self.inbox.as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            let Some(inbound) = next else {
                break;
            };
            self.handle_inbound(inbound).await;
            handled += 1;
        }
        handled
    }

    async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Frame(samples) => {
                if let Err(e) = self.client.append_input_audio(&samples) {
                    debug!("Dropped capture frame: {}", e);
                }
            }
            Inbound::Session(RealtimeEvent::ConversationUpdated { item, delta }) => {
                self.handle_update(item, delta).await;
            }
            Inbound::Session(RealtimeEvent::ConversationInterrupted) => {
                info!("Conversation interrupted");
                self.interrupt_and_cancel().await;
            }
            Inbound::Session(RealtimeEvent::Error { message, fatal }) => {
                if fatal {
                    error!("Realtime session lost: {}", message);
                    self.disconnect().await;
                } else {
                    error!("Realtime error: {}", message);
                }
            }
        }
    }

    async fn handle_update(&mut self, item: ConversationItem, delta: Option<ItemDelta>) {
        if let Some(samples) = delta.as_ref().and_then(|d| d.audio.as_deref())
            && let Err(e) = self.playback.add_16bit_pcm(samples, &item.id)
        {
            warn!("Failed to queue agent audio: {}", e);
        }

        if !item.is_completed() {
            return;
        }
        if !item.formatted.audio.is_empty() && !self.is_archived(&item) {
            self.archive_item(&item).await;
        }
        if item.formatted.transcript.chars().count() > 1 {
            let speaker = item
                .role
                .map_or_else(|| item.item_type.clone(), |role| role.to_string());
            info!("{}: {}", speaker, item.formatted.transcript);
        }
    }

    /// Whether the archive already holds exactly this item's audio.
    fn is_archived(&self, item: &ConversationItem) -> bool {
        self.archive
            .get(&item.id)
            .is_some_and(|buffer| buffer.channel_data.len() == item.formatted.audio.len())
    }

    async fn archive_item(&mut self, item: &ConversationItem) {
        let buffer = match decode(&item.formatted.audio, SAMPLE_RATE, SAMPLE_RATE) {
            Ok(buffer) => buffer,
            Err(e) => {
                warn!("Failed to decode audio for {}: {}", item.id, e);
                return;
            }
        };
        if let Some(dir) = &self.tuning.archive_dir
            && let Err(e) = write_archive(dir, &item.id, &buffer).await
        {
            warn!("Failed to archive audio for {}: {}", item.id, e);
        }
        self.archive.insert(item.id.clone(), buffer);
    }

    fn tick_elapsed(&self) {
        let secs = self.timer.elapsed_secs();
        self.elapsed_tx.send_if_modified(|current| {
            if *current == secs {
                false
            } else {
                *current = secs;
                true
            }
        });
    }

    // =========================================================================
    // Task loop
    // =========================================================================

    /// Returns `false` when the loop should stop.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect(reply) => {
                let result = self.connect().await;
                let _ = reply.send(result);
            }
            Command::Disconnect(reply) => {
                self.disconnect().await;
                let _ = reply.send(());
            }
            Command::CodeChanged(code) => self.code_changed(code),
            Command::KeyReleased => self.key_released().await,
            Command::UpdateSettings(settings) => self.update_settings(settings).await,
            Command::Shutdown => return false,
        }
        true
    }

    /// Run until `Shutdown` or until every command sender is dropped.
    ///
    /// A live session is torn down on the way out.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        let mut ticker = interval(ELAPSED_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let active = self.state() == SessionState::Active;
            let wake = tokio::select! {
                command = commands.recv() => Wake::Command(command),
                inbound = recv_inbox(&mut self.inbox) => Wake::Inbound(inbound),
                code = self.debouncer.settled() => Wake::Settled(code),
                _ = ticker.tick(), if active => Wake::Tick,
            };

            match wake {
                Wake::Command(Some(command)) => {
                    if !self.handle_command(command).await {
                        break;
                    }
                }
                Wake::Command(None) => break,
                Wake::Inbound(Some(inbound)) => self.handle_inbound(inbound).await,
                // Every producer is gone
                Wake::Inbound(None) => self.inbox = None,
                Wake::Settled(code) => self.snapshot_settled(code).await,
                Wake::Tick => self.tick_elapsed(),
            }
        }

        self.disconnect().await;
        debug!("Orchestrator stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_code() {
        assert_eq!(fence_code("let x = 1;"), "```\nlet x = 1;\n```");
        assert_eq!(fence_code("a\nb"), "```\na\nb\n```");
    }
}
