//! Periodic copy of the audio loudness reading into the visualizer.

use crate::constants::{METER_SILENCE, UNIFORM_METER};
use crate::host::{Host, TimerHandle};
use crate::meter::LevelSource;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Receiver of named numeric inputs.
pub trait InputSink {
    fn set_input(&self, name: &str, value: f32);
}

/// Samples a `LevelSource` on a fixed period and writes it to an
/// `InputSink` as `meter`.
///
/// At most one sampling timer exists at a time. Stopping writes the silence
/// value exactly once so the visuals settle instead of freezing on the last
/// reading.
pub struct SamplingBridge {
    host: Rc<dyn Host>,
    sink: Rc<dyn InputSink>,
    period: Duration,
    timer: Option<TimerHandle>,
}

impl SamplingBridge {
    pub fn new(host: Rc<dyn Host>, sink: Rc<dyn InputSink>, period: Duration) -> Self {
        Self {
            host,
            sink,
            period,
            timer: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Begin sampling `meter`. Returns false if already running.
    pub fn start(&mut self, meter: Weak<dyn LevelSource>) -> bool {
        if self.timer.is_some() {
            return false;
        }
        let sink = self.sink.clone();
        let handle = self.host.set_interval(
            self.period,
            Box::new(move || {
                if let Some(meter) = meter.upgrade() {
                    sink.set_input(UNIFORM_METER, meter.level());
                }
            }),
        );
        self.timer = Some(handle);
        log::debug!("[bridge] sampling every {:?}", self.period);
        true
    }

    /// Write silence and cancel the timer. Returns false if not running.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.timer.take() else {
            return false;
        };
        self.sink.set_input(UNIFORM_METER, METER_SILENCE);
        self.host.clear_interval(handle);
        log::debug!("[bridge] stopped");
        true
    }
}

impl Drop for SamplingBridge {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.take() {
            self.host.clear_interval(handle);
        }
    }
}
