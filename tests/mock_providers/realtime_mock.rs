//! In-process realtime client double.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;

use phone_screen::core::realtime::{
    BaseRealtime, ConnectionState, EventDispatcher, EventHandler, EventKind, RealtimeError,
    RealtimeEvent, RealtimeResult, SessionOptions, dispatch_event,
};

/// One recorded client call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    UpdateSession(SessionOptions),
    Connect(String),
    WaitForSession,
    AppendAudio(Vec<i16>),
    SendText(String),
    CreateResponse,
    CancelResponse { track_id: String, offset: usize },
    Disconnect,
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    connected: bool,
    fail_connect: bool,
    fail_wait: bool,
    fail_create_response: bool,
    fail_disconnect: bool,
}

/// Test-side view of a [`MockRealtime`].
#[derive(Clone)]
pub struct MockRealtimeHandle {
    state: Arc<Mutex<MockState>>,
    dispatcher: Arc<RwLock<EventDispatcher>>,
}

impl MockRealtimeHandle {
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Texts injected with `send_text`, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SendText(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn fail_connect(&self) {
        self.state.lock().fail_connect = true;
    }

    pub fn fail_wait_for_session(&self) {
        self.state.lock().fail_wait = true;
    }

    pub fn fail_create_response(&self) {
        self.state.lock().fail_create_response = true;
    }

    pub fn fail_disconnect(&self) {
        self.state.lock().fail_disconnect = true;
    }

    /// Deliver `event` to the registered handlers, as the socket task would.
    pub fn emit(&self, event: RealtimeEvent) {
        dispatch_event(&self.dispatcher, &event);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.dispatcher.read().handler_count(kind)
    }
}

/// Realtime client that records every call instead of talking to a server.
pub struct MockRealtime {
    handle: MockRealtimeHandle,
}

impl MockRealtime {
    pub fn new() -> (Self, MockRealtimeHandle) {
        let handle = MockRealtimeHandle {
            state: Arc::new(Mutex::new(MockState::default())),
            dispatcher: Arc::new(RwLock::new(EventDispatcher::new())),
        };
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }

    fn record(&self, call: Call) {
        self.handle.state.lock().calls.push(call);
    }
}

#[async_trait]
impl BaseRealtime for MockRealtime {
    async fn update_session(&mut self, options: SessionOptions) -> RealtimeResult<()> {
        self.record(Call::UpdateSession(options));
        Ok(())
    }

    async fn connect(&mut self, api_key: &str) -> RealtimeResult<()> {
        self.record(Call::Connect(api_key.to_string()));
        let mut state = self.handle.state.lock();
        if state.fail_connect {
            return Err(RealtimeError::AuthenticationFailed(
                "mock rejected key".to_string(),
            ));
        }
        state.connected = true;
        Ok(())
    }

    async fn wait_for_session_created(&mut self, timeout: Duration) -> RealtimeResult<()> {
        self.record(Call::WaitForSession);
        if self.handle.state.lock().fail_wait {
            return Err(RealtimeError::Timeout(format!(
                "session.created not received within {}ms",
                timeout.as_millis()
            )));
        }
        Ok(())
    }

    fn append_input_audio(&mut self, samples: &[i16]) -> RealtimeResult<()> {
        self.record(Call::AppendAudio(samples.to_vec()));
        Ok(())
    }

    async fn send_text(&mut self, text: &str) -> RealtimeResult<()> {
        if !self.handle.state.lock().connected {
            return Err(RealtimeError::NotConnected);
        }
        self.record(Call::SendText(text.to_string()));
        Ok(())
    }

    async fn create_response(&mut self) -> RealtimeResult<()> {
        self.record(Call::CreateResponse);
        if self.handle.state.lock().fail_create_response {
            return Err(RealtimeError::SessionError("mock refused".to_string()));
        }
        Ok(())
    }

    async fn cancel_response(
        &mut self,
        track_id: &str,
        sample_offset: usize,
    ) -> RealtimeResult<()> {
        self.record(Call::CancelResponse {
            track_id: track_id.to_string(),
            offset: sample_offset,
        });
        Ok(())
    }

    fn on(&mut self, kind: EventKind, handler: EventHandler) {
        self.handle.dispatcher.write().subscribe(kind, handler);
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.record(Call::Disconnect);
        self.handle.dispatcher.write().clear();
        let mut state = self.handle.state.lock();
        state.connected = false;
        if state.fail_disconnect {
            return Err(RealtimeError::WebSocketError("mock close failed".to_string()));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.handle.state.lock().connected
    }

    fn connection_state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }
}
