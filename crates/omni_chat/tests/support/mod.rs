#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use omni_api::{BrainCatalog, ExecuteRequest};
use omni_chat::app::{App, HostOps};
use omni_chat::backend::Backend;
use omni_chat::runtime::ConnectionManager;
use omni_transport::{FrameTransport, TurnId};

const PUMP_DEADLINE: Duration = Duration::from_secs(5);
const PUMP_STEP: Duration = Duration::from_millis(10);

/// Backend that is never reachable.
#[derive(Default)]
pub struct OfflineBackend;

impl Backend for OfflineBackend {
    fn brains(&mut self) -> Result<BrainCatalog, String> {
        Err("offline".to_string())
    }

    fn chat(&mut self, _message: &str, _brain: &str) -> Result<String, String> {
        Err("offline".to_string())
    }

    fn execute(&mut self, _request: &ExecuteRequest) -> Result<String, String> {
        Err("offline".to_string())
    }

    fn transcribe(&mut self, _audio: &Path) -> Result<String, String> {
        Err("offline".to_string())
    }

    fn describe_image(&mut self, _image: &Path, _prompt: &str) -> Result<String, String> {
        Err("offline".to_string())
    }

    fn speak_to_file(&mut self, _text: &str, _out: &Path) -> Result<usize, String> {
        Err("offline".to_string())
    }
}

/// Host that hands out sequential turn ids without opening anything.
#[derive(Default)]
pub struct HostStub {
    pub next_turn_id: TurnId,
    pub opened: Vec<(String, String)>,
    pub cancelled: Vec<TurnId>,
    pub stop_requests: usize,
}

impl HostStub {
    pub fn starting_at(next_turn_id: TurnId) -> Self {
        Self {
            next_turn_id,
            ..Self::default()
        }
    }
}

impl HostOps for HostStub {
    fn open_turn(&mut self, message: String, brain: String) -> Result<TurnId, String> {
        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;
        self.opened.push((message, brain));
        Ok(turn_id)
    }

    fn cancel_turn(&mut self, turn_id: TurnId) {
        self.cancelled.push(turn_id);
    }

    fn request_stop(&mut self) {
        self.stop_requests += 1;
    }
}

/// App plus a live connection manager driven by the test thread.
pub struct Harness {
    pub app: Arc<Mutex<App>>,
    pub host: Arc<ConnectionManager>,
    pub backend: OfflineBackend,
}

impl Harness {
    pub fn new(transport: Arc<dyn FrameTransport>, idle_timeout: Duration) -> Self {
        let app = Arc::new(Mutex::new(App::new()));
        let host = ConnectionManager::new(Arc::clone(&app), transport, idle_timeout);
        Self {
            app,
            host,
            backend: OfflineBackend,
        }
    }

    pub fn app(&self) -> MutexGuard<'_, App> {
        lock_unpoisoned(&self.app)
    }

    pub fn submit(&mut self, input: &str) {
        let mut app = lock_unpoisoned(&self.app);
        app.on_submit(input, &mut self.host, &mut self.backend);
    }

    pub fn cancel(&mut self) {
        let mut app = lock_unpoisoned(&self.app);
        app.on_cancel(&mut self.host);
    }

    /// Pumps events until `done` holds, panicking after a generous deadline.
    pub fn pump_until(&self, what: &str, done: impl Fn(&App, &ConnectionManager) -> bool) {
        let deadline = Instant::now() + PUMP_DEADLINE;
        loop {
            self.host.pump(PUMP_STEP);
            if done(&self.app(), &self.host) {
                return;
            }
            assert!(Instant::now() < deadline, "timed out waiting for {what}");
        }
    }

    pub fn pump_until_released(&self) {
        self.pump_until("connection release", |_, host| host.active_turn_id().is_none());
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
