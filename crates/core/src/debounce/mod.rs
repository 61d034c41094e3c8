//! Turns bouncing button lines into clean press events.
//!
//! Every line owns a settle slot. The first raw transition claims it and
//! schedules a single re-read one debounce window later; transitions that
//! arrive while the slot is taken are ignored, so a burst of bounces yields
//! one evaluation per window. The re-read is compared with the level seen
//! before the window started and the configured [`EdgePolicy`] decides
//! whether that counts as a press.
//!
//! All scheduled re-reads run on one settle worker thread, so a noisy line
//! can never cause more than one pending timer per button.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{InputReader, JukeboxError, Level, Result};

/// Which settled transition counts as a press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    /// High to low. The right choice for buttons wired against a pull-up.
    #[default]
    Falling,
    Rising,
    Both,
}

impl EdgePolicy {
    /// Returns `true` when a line that moved from `before` to `after`
    /// represents a press.
    pub fn accepts(self, before: Level, after: Level) -> bool {
        match (before, after) {
            (Level::High, Level::Low) => matches!(self, EdgePolicy::Falling | EdgePolicy::Both),
            (Level::Low, Level::High) => matches!(self, EdgePolicy::Rising | EdgePolicy::Both),
            _ => false,
        }
    }
}

/// A debounced press of the button with the given index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPress {
    pub index: usize,
}

struct LineState {
    pin: u8,
    settling: AtomicBool,
    last_level: Mutex<Level>,
}

/// Ownership of a line's settle slot. Dropping it frees the slot.
struct SettleGuard {
    line: Arc<LineState>,
}

impl SettleGuard {
    fn try_acquire(line: &Arc<LineState>) -> Option<Self> {
        line.settling
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { line: line.clone() })
    }
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        self.line.settling.store(false, Ordering::Release);
    }
}

struct SettleRequest {
    index: usize,
    due: Instant,
    guard: SettleGuard,
}

/// Entry point for raw transitions coming from the GPIO driver.
///
/// Cheap to call from interrupt context: it never blocks and never allocates
/// beyond the settle request itself.
pub struct Debouncer {
    lines: Vec<Arc<LineState>>,
    window: Duration,
    requests: Sender<SettleRequest>,
}

impl Debouncer {
    /// Creates the debouncer for `pins` (one per button, in button order) and
    /// starts the settle worker that delivers presses to `presses`.
    pub fn start(
        pins: &[u8],
        reader: Arc<dyn InputReader>,
        window: Duration,
        policy: EdgePolicy,
        presses: Sender<ButtonPress>,
    ) -> Result<(Arc<Self>, SettleWorker)> {
        let lines: Vec<_> = pins
            .iter()
            .map(|&pin| {
                let level = reader.read(pin).unwrap_or_else(|err| {
                    tracing::warn!(pin, %err, "could not read initial level, assuming idle high");
                    Level::High
                });
                Arc::new(LineState {
                    pin,
                    settling: AtomicBool::new(false),
                    last_level: Mutex::new(level),
                })
            })
            .collect();

        // at most one request per line can be in flight
        let (requests, pending) = crossbeam_channel::bounded(lines.len().max(1));
        let (stop, stopped) = crossbeam_channel::bounded(1);

        let settler = Settler {
            lines: lines.clone(),
            reader,
            policy,
            presses,
        };
        let handle = thread::Builder::new()
            .name("debounce-settle".to_string())
            .spawn(move || settler.run(pending, stopped))
            .map_err(|err| JukeboxError::msg(format!("failed to start settle worker: {err}")))?;

        let debouncer = Arc::new(Self {
            lines,
            window,
            requests,
        });
        let worker = SettleWorker {
            stop: Some(stop),
            handle: Some(handle),
        };
        Ok((debouncer, worker))
    }

    /// Handles one raw transition of button `index`.
    pub fn on_transition(&self, index: usize, level: Level) {
        let Some(line) = self.lines.get(index) else {
            tracing::warn!(index, "transition for unknown button");
            return;
        };
        let Some(guard) = SettleGuard::try_acquire(line) else {
            tracing::trace!(index, %level, "settle pending, ignoring transition");
            return;
        };

        tracing::debug!(index, %level, "raw transition, settling");
        let request = SettleRequest {
            index,
            due: Instant::now() + self.window,
            guard,
        };
        if self.requests.try_send(request).is_err() {
            tracing::debug!(index, "settle worker gone, dropping transition");
        }
    }
}

struct Settler {
    lines: Vec<Arc<LineState>>,
    reader: Arc<dyn InputReader>,
    policy: EdgePolicy,
    presses: Sender<ButtonPress>,
}

impl Settler {
    fn run(self, requests: Receiver<SettleRequest>, stop: Receiver<()>) {
        let mut pending: Vec<SettleRequest> = Vec::with_capacity(self.lines.len());

        loop {
            let timer = match pending.iter().map(|request| request.due).min() {
                Some(due) => crossbeam_channel::at(due),
                None => crossbeam_channel::never(),
            };

            crossbeam_channel::select! {
                recv(requests) -> request => match request {
                    Ok(request) => pending.push(request),
                    Err(_) => break,
                },
                recv(stop) -> _ => break,
                recv(timer) -> _ => {
                    let now = Instant::now();
                    let (due, waiting): (Vec<_>, Vec<_>) =
                        pending.drain(..).partition(|request| request.due <= now);
                    pending = waiting;
                    for request in due {
                        self.settle(request);
                    }
                }
            }
        }

        tracing::debug!(dropped = pending.len(), "settle worker stopped");
    }

    fn settle(&self, request: SettleRequest) {
        let line = &request.guard.line;
        let level = match self.reader.read(line.pin) {
            Ok(level) => level,
            Err(err) => {
                tracing::debug!(index = request.index, %err, "read failed while settling");
                return;
            }
        };

        let before = std::mem::replace(&mut *line.last_level.lock(), level);
        if !self.policy.accepts(before, level) {
            tracing::trace!(index = request.index, %before, %level, "settled without press");
            return;
        }

        tracing::debug!(index = request.index, "button press");
        match self.presses.try_send(ButtonPress {
            index: request.index,
        }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(index = request.index, "press queue full, dropping press")
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!(index = request.index, "press receiver gone")
            }
        }
    }
}

/// Handle to the settle worker thread.
pub struct SettleWorker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SettleWorker {
    /// Stops the worker, discarding pending settles, and waits for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("settle worker panicked");
            }
        }
    }
}

impl Drop for SettleWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
