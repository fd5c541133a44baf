//! Global play/stop state and the mapping between transport time and the
//! audio clock.
//!
//! Transport time is logical: it starts at 0 on the first start and only
//! advances while started. The audio clock is whatever monotonic seconds
//! counter the synthesis engine schedules against (`AudioContext.currentTime`
//! on the web, a sample counter natively).

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Started,
}

impl TransportState {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportState::Stopped => "stopped",
            TransportState::Started => "started",
        }
    }
}

/// What a start after a stop does with the logical position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResumeMode {
    /// Pick up where the previous stop left off.
    #[default]
    Continue,
    /// Restart from position 0.
    Rewind,
}

#[derive(Clone, Debug)]
pub struct Transport {
    state: TransportState,
    resume: ResumeMode,
    bpm: f64,
    // transport time at `anchor`
    position: f64,
    // audio time at which the current run started
    anchor: f64,
}

impl Transport {
    pub fn new(bpm: f64, resume: ResumeMode) -> Self {
        Self {
            state: TransportState::Stopped,
            resume,
            bpm,
            position: 0.0,
            anchor: 0.0,
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Stopped → started. Returns false (and changes nothing) when already started.
    pub fn start(&mut self, audio_now: f64) -> bool {
        if self.state == TransportState::Started {
            return false;
        }
        if self.resume == ResumeMode::Rewind {
            self.position = 0.0;
        }
        self.anchor = audio_now;
        self.state = TransportState::Started;
        log::info!(
            "[transport] started at audio {:.3}s, position {:.3}s",
            audio_now,
            self.position
        );
        true
    }

    /// Started → stopped, freezing the position. Returns false when already stopped.
    pub fn stop(&mut self, audio_now: f64) -> bool {
        if self.state == TransportState::Stopped {
            return false;
        }
        self.position = self.position_at(audio_now);
        self.anchor = audio_now;
        self.state = TransportState::Stopped;
        log::info!("[transport] stopped at position {:.3}s", self.position);
        true
    }

    /// Logical position at `audio_now`; frozen while stopped.
    pub fn position_at(&self, audio_now: f64) -> f64 {
        match self.state {
            TransportState::Started => self.position + (audio_now - self.anchor).max(0.0),
            TransportState::Stopped => self.position,
        }
    }

    /// Audio clock time at which transport time `t` occurs in the current run.
    pub fn audio_time_of(&self, t: f64) -> f64 {
        self.anchor + (t - self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_mode_keeps_position_across_restart() {
        let mut t = Transport::new(120.0, ResumeMode::Continue);
        assert!(t.start(10.0));
        assert!(!t.start(11.0));
        assert!((t.position_at(13.0) - 3.0).abs() < 1e-12);
        assert!(t.stop(13.0));
        assert!((t.position_at(50.0) - 3.0).abs() < 1e-12);
        t.start(50.0);
        assert!((t.position_at(51.0) - 4.0).abs() < 1e-12);
        assert!((t.audio_time_of(6.0) - 53.0).abs() < 1e-12);
    }

    #[test]
    fn rewind_mode_restarts_at_zero() {
        let mut t = Transport::new(120.0, ResumeMode::Rewind);
        t.start(0.0);
        t.stop(5.0);
        t.start(8.0);
        assert!(t.position_at(8.0).abs() < 1e-12);
        assert!((t.audio_time_of(2.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn stop_when_stopped_is_a_no_op() {
        let mut t = Transport::new(120.0, ResumeMode::Continue);
        assert!(!t.stop(3.0));
        assert_eq!(t.state(), TransportState::Stopped);
        assert_eq!(t.position_at(3.0), 0.0);
    }
}
