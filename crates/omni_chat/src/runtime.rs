use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use omni_transport::{CancelSignal, FrameTransport, TransportEvent, TurnId, TurnRequest};
use tracing::{debug, info, warn};

use crate::app::{App, HostOps, ERROR_TURN_ALREADY_ACTIVE};

struct ActiveTurn {
    turn_id: TurnId,
    cancel: CancelSignal,
    last_activity: Instant,
    done_seen: bool,
    join_handle: Option<JoinHandle<()>>,
}

/// Owns the single live connection and feeds its events to [`App`].
///
/// Transports run on a worker thread per turn and push events into a channel.
/// [`ConnectionManager::pump`] drains that channel on the caller's thread, so
/// every frame reaches the interpreter in arrival order and nothing else
/// mutates the session concurrently.
pub struct ConnectionManager {
    app: Arc<Mutex<App>>,
    transport: Arc<dyn FrameTransport>,
    events_tx: Sender<TransportEvent>,
    events_rx: Mutex<Receiver<TransportEvent>>,
    next_turn_id: AtomicU64,
    active_turn: Mutex<Option<ActiveTurn>>,
    idle_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(
        app: Arc<Mutex<App>>,
        transport: Arc<dyn FrameTransport>,
        idle_timeout: Duration,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::channel();
        Arc::new(Self {
            app,
            transport,
            events_tx,
            events_rx: Mutex::new(events_rx),
            next_turn_id: AtomicU64::new(1),
            active_turn: Mutex::new(None),
            idle_timeout,
        })
    }

    pub fn active_turn_id(&self) -> Option<TurnId> {
        self.lock_active_turn().as_ref().map(|active| active.turn_id)
    }

    fn open_turn_internal(self: &Arc<Self>, message: String, brain: String) -> Result<TurnId, String> {
        let mut active_turn = self.lock_active_turn();
        if let Some(previous) = active_turn.as_mut() {
            if !previous.done_seen {
                return Err(ERROR_TURN_ALREADY_ACTIVE.to_string());
            }
            // The previous reply is complete; its worker is only closing the socket.
            if let Some(join_handle) = previous.join_handle.take() {
                let _ = join_handle.join();
            }
            *active_turn = None;
        }

        let turn_id = self.next_turn_id.fetch_add(1, Ordering::SeqCst);
        let cancel = Arc::new(AtomicBool::new(false));
        let request = TurnRequest {
            turn_id,
            message,
            brain,
        };
        let join_handle = self.spawn_worker(request, Arc::clone(&cancel))?;

        *active_turn = Some(ActiveTurn {
            turn_id,
            cancel,
            last_activity: Instant::now(),
            done_seen: false,
            join_handle: Some(join_handle),
        });
        debug!(turn_id, transport = %self.transport.profile().transport_id, "turn worker started");

        Ok(turn_id)
    }

    fn spawn_worker(&self, request: TurnRequest, cancel: CancelSignal) -> Result<JoinHandle<()>, String> {
        let turn_id = request.turn_id;
        let transport = Arc::clone(&self.transport);
        let events_tx = self.events_tx.clone();
        thread::Builder::new()
            .name(format!("omni-turn-{turn_id}"))
            .spawn(move || run_worker(transport, request, cancel, events_tx))
            .map_err(|error| format!("Failed to spawn turn worker: {error}"))
    }

    /// Waits up to `max_wait` for transport events and applies every event
    /// that is ready, then checks the idle timeout. Returns the number applied.
    pub fn pump(&self, max_wait: Duration) -> usize {
        let mut applied = 0usize;
        {
            let events_rx = lock_unpoisoned(&self.events_rx);
            match events_rx.recv_timeout(max_wait) {
                Ok(event) => {
                    self.apply_event(event);
                    applied += 1;
                    while let Ok(event) = events_rx.try_recv() {
                        self.apply_event(event);
                        applied += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }

        self.expire_idle_turn(Instant::now());
        applied
    }

    /// Fails the active turn when it has been silent for longer than the idle
    /// timeout as of `now`. Returns true when a turn was expired.
    pub fn expire_idle_turn(&self, now: Instant) -> bool {
        let expired = {
            let active_turn = self.lock_active_turn();
            match active_turn.as_ref() {
                Some(active)
                    if !active.done_seen
                        && !active.cancel.load(Ordering::SeqCst)
                        && now.saturating_duration_since(active.last_activity) >= self.idle_timeout =>
                {
                    active.cancel.store(true, Ordering::SeqCst);
                    Some(active.turn_id)
                }
                _ => None,
            }
        };

        let Some(turn_id) = expired else {
            return false;
        };

        warn!(turn_id, timeout = ?self.idle_timeout, "turn timed out waiting for the backend");
        lock_unpoisoned(&self.app).on_idle_timeout(turn_id, self.idle_timeout);
        true
    }

    fn apply_event(&self, event: TransportEvent) {
        let turn_id = event.turn_id();
        let terminal = event.is_terminal();
        let done = matches!(&event, TransportEvent::Frame { frame, .. } if frame.is_terminal());
        self.touch(turn_id, done);

        {
            let mut app = lock_unpoisoned(&self.app);
            match event {
                TransportEvent::Opened { turn_id } => app.on_turn_opened(turn_id),
                TransportEvent::Frame { turn_id, frame } => app.on_frame(turn_id, frame),
                TransportEvent::Malformed { turn_id, raw, error } => {
                    app.on_malformed(turn_id, &raw, &error)
                }
                TransportEvent::Closed { turn_id } => app.on_turn_closed(turn_id),
                TransportEvent::Failed { turn_id, error } => app.on_turn_failed(turn_id, &error),
                TransportEvent::Cancelled { turn_id } => app.on_turn_cancelled(turn_id),
            }
        }

        if terminal {
            self.clear_active_turn_if_matching(turn_id);
        }
    }

    fn touch(&self, turn_id: TurnId, done: bool) {
        let mut active_turn = self.lock_active_turn();
        if let Some(active) = active_turn.as_mut() {
            if active.turn_id == turn_id {
                active.last_activity = Instant::now();
                active.done_seen |= done;
            }
        }
    }

    fn clear_active_turn_if_matching(&self, turn_id: TurnId) {
        let mut active_turn = self.lock_active_turn();
        let matches = active_turn.as_ref().map(|active| active.turn_id) == Some(turn_id);
        if !matches {
            return;
        }

        let Some(mut completed) = active_turn.take() else {
            return;
        };

        if let Some(join_handle) = completed.join_handle.take() {
            if join_handle.is_finished() {
                let _ = join_handle.join();
            }
        }
        debug!(turn_id, "connection released");
    }

    fn cancel_turn_internal(&self, turn_id: TurnId) {
        let active_turn = self.lock_active_turn();
        if let Some(active) = active_turn.as_ref() {
            if active.turn_id == turn_id {
                active.cancel.store(true, Ordering::SeqCst);
                info!(turn_id, "cancellation requested");
            }
        }
    }

    fn lock_active_turn(&self) -> MutexGuard<'_, Option<ActiveTurn>> {
        lock_unpoisoned(&self.active_turn)
    }
}

fn run_worker(
    transport: Arc<dyn FrameTransport>,
    request: TurnRequest,
    cancel: CancelSignal,
    events_tx: Sender<TransportEvent>,
) {
    let turn_id = request.turn_id;
    let terminal_emitted = Cell::new(false);
    let mut emit = |event: TransportEvent| {
        if event.is_terminal() {
            if terminal_emitted.replace(true) {
                warn!(turn_id, "transport emitted more than one terminal event");
                return;
            }
        }
        let _ = events_tx.send(event);
    };

    let outcome = catch_unwind(AssertUnwindSafe(|| transport.run(request, cancel, &mut emit)));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(error)) => emit(TransportEvent::Failed { turn_id, error }),
        Err(_) => emit(TransportEvent::Failed {
            turn_id,
            error: "Transport panicked".to_string(),
        }),
    }

    if !terminal_emitted.get() {
        emit(TransportEvent::Failed {
            turn_id,
            error: "Transport exited without terminal event".to_string(),
        });
    }
}

impl HostOps for Arc<ConnectionManager> {
    fn open_turn(&mut self, message: String, brain: String) -> Result<TurnId, String> {
        self.open_turn_internal(message, brain)
    }

    fn cancel_turn(&mut self, turn_id: TurnId) {
        self.cancel_turn_internal(turn_id);
    }

    fn request_stop(&mut self) {
        if let Some(turn_id) = self.active_turn_id() {
            self.cancel_turn_internal(turn_id);
        }
    }
}

pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
