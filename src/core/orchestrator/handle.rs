use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::errors::{OrchestratorError, OrchestratorResult};
use super::session::SessionOrchestrator;
use super::settings::{SessionState, Settings};

/// Requests accepted by a running orchestrator.
#[derive(Debug)]
pub enum Command {
    Connect(oneshot::Sender<OrchestratorResult<()>>),
    Disconnect(oneshot::Sender<()>),
    CodeChanged(String),
    KeyReleased,
    UpdateSettings(Settings),
    Shutdown,
}

/// Cloneable front end to an orchestrator running on its own task.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    elapsed: watch::Receiver<u64>,
}

impl OrchestratorHandle {
    fn send(&self, command: Command) -> OrchestratorResult<()> {
        self.commands
            .send(command)
            .map_err(|_| OrchestratorError::Stopped)
    }

    /// Open a session and wait for the outcome.
    pub async fn connect(&self) -> OrchestratorResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Connect(tx))?;
        rx.await.map_err(|_| OrchestratorError::Stopped)?
    }

    /// End the session and wait until teardown has finished.
    pub async fn disconnect(&self) -> OrchestratorResult<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Disconnect(tx))?;
        rx.await.map_err(|_| OrchestratorError::Stopped)
    }

    pub fn code_changed(&self, code: impl Into<String>) -> OrchestratorResult<()> {
        self.send(Command::CodeChanged(code.into()))
    }

    pub fn key_released(&self) -> OrchestratorResult<()> {
        self.send(Command::KeyReleased)
    }

    pub fn update_settings(&self, settings: Settings) -> OrchestratorResult<()> {
        self.send(Command::UpdateSettings(settings))
    }

    pub fn shutdown(&self) -> OrchestratorResult<()> {
        self.send(Command::Shutdown)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn subscribe_elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed.clone()
    }
}

impl SessionOrchestrator {
    /// Move the orchestrator onto its own task.
    pub fn spawn(self) -> (OrchestratorHandle, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let handle = OrchestratorHandle {
            commands,
            state: self.subscribe_state(),
            elapsed: self.subscribe_elapsed(),
        };
        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }
}
