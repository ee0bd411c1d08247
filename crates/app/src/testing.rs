//! In-memory port fakes shared by the unit tests of this crate.

use std::sync::{Arc, Mutex};

use minido_domain::error::{BoxError, MinidoError};
use minido_domain::event::BusEvent;
use minido_domain::frame::{Decoded, Frame, decode_one};
use minido_domain::history::HistoryEntry;

use crate::ports::{EventPublisher, HistoryStore, TransportBridge};
use crate::registry::{ModuleRegistry, RegistryConfig};

#[derive(Default)]
pub struct RecordingHistory {
    pub entries: Mutex<Vec<HistoryEntry>>,
}

impl RecordingHistory {
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl HistoryStore for RecordingHistory {
    fn record(&self, entry: HistoryEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub fail: std::sync::atomic::AtomicBool,
}

impl RecordingTransport {
    pub fn frames(&self) -> Vec<Frame> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| match decode_one(bytes) {
                Decoded::Frame { frame, .. } => frame,
                other => panic!("transport received undecodable bytes: {other:?}"),
            })
            .collect()
    }

    pub fn fail_sends(&self) {
        self.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TransportBridge for RecordingTransport {
    fn send(&self, bytes: Vec<u8>) -> Result<(), MinidoError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            let err: BoxError = "connection closed".into();
            return Err(MinidoError::Transport(err));
        }
        self.sent.lock().unwrap().push(bytes);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<BusEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<BusEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: BusEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub type TestRegistry =
    ModuleRegistry<Arc<RecordingHistory>, Arc<RecordingTransport>, Arc<RecordingPublisher>>;

pub type TestRouter = crate::router::FrameRouter<
    Arc<RecordingHistory>,
    Arc<RecordingTransport>,
    Arc<RecordingPublisher>,
>;

pub struct Harness {
    pub registry: Arc<TestRegistry>,
    pub history: Arc<RecordingHistory>,
    pub transport: Arc<RecordingTransport>,
    pub events: Arc<RecordingPublisher>,
}

pub fn harness(config: RegistryConfig) -> Harness {
    let history = Arc::new(RecordingHistory::default());
    let transport = Arc::new(RecordingTransport::default());
    let events = Arc::new(RecordingPublisher::default());
    let registry = Arc::new(ModuleRegistry::new(
        config,
        Arc::clone(&history),
        Arc::clone(&transport),
        Arc::clone(&events),
    ));
    Harness {
        registry,
        history,
        transport,
        events,
    }
}
