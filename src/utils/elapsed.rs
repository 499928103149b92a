//! Session clock shown next to the editor.

use tokio::time::Instant;

/// Counts whole seconds since it was started.
#[derive(Debug, Default, Clone, Copy)]
pub struct ElapsedTimer {
    started: Option<Instant>,
}

impl ElapsedTimer {
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn stop(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Whole seconds since `start`, zero when stopped.
    pub fn elapsed_secs(&self) -> u64 {
        self.started.map_or(0, |t| t.elapsed().as_secs())
    }
}

/// Format seconds as `MM:SS`. Minutes keep counting past 59.
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
