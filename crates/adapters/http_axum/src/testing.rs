//! Fixture shared by the handler tests of this crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;

use minido_app::controller::ShadeTiming;
use minido_app::event_bus::InProcessEventBus;
use minido_app::ports::{HistoryStore, TransportBridge};
use minido_app::registry::{ModuleRegistry, RegistryConfig};
use minido_app::services::BusService;
use minido_domain::device::{ChannelRef, Device, DeviceKind, Role};
use minido_domain::error::{BoxError, MinidoError};
use minido_domain::history::HistoryEntry;
use minido_domain::id::{Channel, DeviceId, ModuleId};

use crate::state::AppState;

pub struct NoHistory;

impl HistoryStore for NoHistory {
    fn record(&self, _entry: HistoryEntry) {}
}

#[derive(Default)]
pub struct StubTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: AtomicBool,
}

impl StubTransport {
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }
}

impl TransportBridge for StubTransport {
    fn send(&self, bytes: Vec<u8>) -> Result<(), MinidoError> {
        if self.fail.load(Ordering::SeqCst) {
            let err: BoxError = "gateway unreachable".into();
            return Err(MinidoError::Transport(err));
        }
        self.sent.lock().unwrap().push(bytes);
        Ok(())
    }
}

pub type TestState = AppState<NoHistory, Arc<StubTransport>, Arc<InProcessEventBus>>;

pub struct Fixture {
    pub state: TestState,
    pub transport: Arc<StubTransport>,
}

fn channel_ref(module: u8, channel: u8) -> ChannelRef {
    ChannelRef::new(ModuleId::new(module).unwrap(), Channel::new(channel).unwrap())
}

/// Eager registry with a kitchen switch on `EXO-01/01` and a shade on `EXO-02/01..02`.
pub fn test_state() -> Fixture {
    let transport = Arc::new(StubTransport::default());
    let event_bus = Arc::new(InProcessEventBus::new(16));
    let registry = Arc::new(ModuleRegistry::new(
        RegistryConfig::default(),
        NoHistory,
        Arc::clone(&transport),
        Arc::clone(&event_bus),
    ));

    let mut service = BusService::new(registry);
    let light = Device::builder()
        .id(DeviceId::new(1))
        .kind(DeviceKind::Switch)
        .name("Kitchen light")
        .room(Some("kitchen".to_string()))
        .position(Some(3), Some(7))
        .bind(Role::Power, channel_ref(1, 1))
        .build()
        .unwrap();
    let shade = Device::builder()
        .id(DeviceId::new(2))
        .kind(DeviceKind::Shade)
        .name("Living room shade")
        .bind(Role::Up, channel_ref(2, 1))
        .bind(Role::Down, channel_ref(2, 2))
        .build()
        .unwrap();
    service.add_device(light, ShadeTiming::default()).unwrap();
    service.add_device(shade, ShadeTiming::default()).unwrap();

    Fixture {
        state: AppState::new(Arc::new(service), event_bus),
        transport,
    }
}

pub fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
