//! Mock providers for the phone screen tests
//!
//! - `websocket_mock`: a Realtime API server speaking the wire protocol
//! - `realtime_mock`: an in-process [`BaseRealtime`] that records calls
//! - `devices`: capture and playback doubles with failure injection
//!
//! [`BaseRealtime`]: phone_screen::core::realtime::BaseRealtime

// Each test binary uses a different subset
#![allow(dead_code)]

pub mod devices;
pub mod realtime_mock;
pub mod websocket_mock;

pub use devices::{DeviceLog, MockCapture, MockSink, mock_devices};
pub use realtime_mock::{Call, MockRealtime, MockRealtimeHandle};
pub use websocket_mock::{HandshakeBehavior, MockRealtimeServer};
