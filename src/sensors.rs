//! The sensor poller (component F) and its optional timer-driven
//! convenience wrapper (§4.7).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::controller::Controller;
use crate::dispatch::make_sensor_event;
use crate::frame::CanFrame;

/// Diffs the controller's triggered-sensor set on each tick and produces one
/// sensor-event frame per changed sensor. Owns the last-seen snapshot.
#[derive(Default)]
pub struct SensorPoller {
    last_triggered: HashSet<u32>,
}

impl SensorPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples `controller`, diffs against the last snapshot, and returns
    /// one frame per sensor that changed state since the previous call.
    pub fn poll_once(&mut self, controller: &dyn Controller) -> Vec<CanFrame> {
        let current: HashSet<u32> = controller.triggered_sensors().into_iter().collect();

        let mut events = Vec::new();
        for &sensor_id in current.difference(&self.last_triggered) {
            events.push(make_sensor_event(sensor_id, false, true));
        }
        for &sensor_id in self.last_triggered.difference(&current) {
            events.push(make_sensor_event(sensor_id, true, false));
        }

        self.last_triggered = current;
        events
    }
}

/// A thin `std::thread` wrapper that drives a closure at a fixed cadence
/// until told to stop. Not part of the core contract — a convenience for
/// callers that would otherwise write this loop themselves.
pub struct SensorPollTask {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SensorPollTask {
    /// Spawns a thread that calls `tick` every `interval` until `stop` is
    /// called.
    pub fn start<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop_flag = stop_flag.clone();

        let handle = std::thread::spawn(move || {
            while !thread_stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if thread_stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                tick();
            }
        });

        SensorPollTask {
            stop_flag,
            handle: Some(handle),
        }
    }

    /// Stops the poll thread and joins it. Idempotent: calling this twice
    /// (or on a task that never started ticking) is a no-op.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorPollTask {
    fn drop(&mut self) {
        self.stop();
    }
}
