//! Audio engine: owns the transport and sequences, builds the synthesis
//! graph on first start, and runs the lookahead scheduler and loudness
//! bridge while music is playing.

use crate::bridge::{InputSink, SamplingBridge};
use crate::constants::{
    DEFAULT_BPM, LOOKAHEAD_SEC, MASTER_GAIN, METER_SMOOTHING, NOISE_BUS_GAIN, SAMPLING_INTERVAL,
    SCHEDULER_INTERVAL,
};
use crate::error::{AudioError, MusicError};
use crate::host::{Host, TimerHandle};
use crate::meter::{LevelSource, MeterScale};
use crate::music::{NoteEvent, NoteValue, VoiceKind};
use crate::sequence::{Sequence, SequenceEngine};
use crate::transport::{ResumeMode, Transport, TransportState};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// One voice and the pattern that drives it.
#[derive(Clone, Debug)]
pub struct Track {
    pub name: String,
    pub voice: VoiceKind,
    /// Gain between the voice and the shared meter input.
    pub bus_gain: f32,
    pub sequence: Sequence,
}

/// Fixed signal topology: every track feeds the meter, the meter feeds the
/// master gain, the master gain feeds the output.
#[derive(Clone, Debug)]
pub struct Topology {
    pub tracks: Vec<Track>,
    pub master_gain: f32,
}

impl Topology {
    pub fn new(master_gain: f32) -> Self {
        Self {
            tracks: Vec::new(),
            master_gain,
        }
    }

    /// Append a track; its sequence is bound to the next voice index.
    pub fn with_track(
        mut self,
        name: &str,
        voice: VoiceKind,
        pattern: &str,
        subdivision_sec: f64,
        note_value: NoteValue,
        bus_gain: f32,
    ) -> Result<Self, MusicError> {
        let sequence =
            Sequence::from_pattern(pattern, subdivision_sec, self.tracks.len(), note_value)?;
        self.tracks.push(Track {
            name: name.to_owned(),
            voice,
            bus_gain,
            sequence,
        });
        Ok(self)
    }

    /// The three-voice piece: FM bass, noise pulse and AM arpeggio.
    pub fn digital_art() -> Result<Self, MusicError> {
        Self::new(MASTER_GAIN)
            .with_track("bass", VoiceKind::Fm, "C2 [D#2 D2] G#2 G2", 2.0, NoteValue::Whole, 1.0)?
            .with_track(
                "rhythm",
                VoiceKind::Noise,
                "x x x x",
                0.25,
                NoteValue::Sixteenth,
                NOISE_BUS_GAIN,
            )?
            .with_track(
                "arp",
                VoiceKind::Am,
                "C3 D#3 G3 C4 G4 C4 G3 D#3",
                0.25,
                NoteValue::Eighth,
                1.0,
            )
    }

    fn sequence_engine(&self) -> SequenceEngine {
        SequenceEngine::new(self.tracks.iter().map(|t| t.sequence.clone()).collect())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioConfig {
    pub bpm: f64,
    pub resume: ResumeMode,
    pub lookahead_sec: f64,
    pub scheduler_interval: Duration,
    pub sampling_interval: Duration,
    pub meter_smoothing: f32,
    pub meter_scale: MeterScale,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bpm: DEFAULT_BPM,
            resume: ResumeMode::default(),
            lookahead_sec: LOOKAHEAD_SEC,
            scheduler_interval: SCHEDULER_INTERVAL,
            sampling_interval: SAMPLING_INTERVAL,
            meter_smoothing: METER_SMOOTHING,
            meter_scale: MeterScale::default(),
        }
    }
}

/// A built synthesis graph.
pub trait AudioGraph {
    /// Current audio clock in seconds.
    fn now(&self) -> f64;
    fn schedule(&mut self, event: &NoteEvent);
    /// Silence everything scheduled to start at or after `time_sec` and
    /// release notes already sounding.
    fn cancel_from(&mut self, time_sec: f64);
    /// Loudness of the mixed signal before the master gain.
    fn meter(&self) -> Rc<dyn LevelSource>;
}

/// Builds the synthesis graph for a topology. May be asked again after a
/// failed build.
pub trait AudioBackend {
    type Graph: AudioGraph + 'static;

    fn build(&mut self, topology: &Topology, config: &AudioConfig)
        -> Result<Self::Graph, AudioError>;
}

enum GraphState<G> {
    Uninitialized,
    Ready { graph: G, meter: Rc<dyn LevelSource> },
}

struct EngineCore<G> {
    transport: Transport,
    sequences: SequenceEngine,
    graph: GraphState<G>,
    lookahead: f64,
    pending: Vec<NoteEvent>,
}

impl<G: AudioGraph> EngineCore<G> {
    /// Hand every step due within the lookahead window to the graph.
    fn pump(&mut self) -> usize {
        let GraphState::Ready { graph, .. } = &mut self.graph else {
            return 0;
        };
        let now = graph.now();
        self.pending.clear();
        self.sequences
            .pump(&self.transport, now, self.lookahead, &mut self.pending);
        for event in &self.pending {
            graph.schedule(event);
        }
        self.pending.len()
    }
}

/// Music playback with a start/stop lifecycle.
///
/// The graph is built lazily on the first `start`; if that fails the engine
/// stays uninitialized and the next `start` tries again. Once built, the
/// graph lives as long as the engine.
pub struct AudioEngine<B: AudioBackend> {
    core: Rc<RefCell<EngineCore<B::Graph>>>,
    backend: B,
    topology: Topology,
    config: AudioConfig,
    host: Rc<dyn Host>,
    bridge: SamplingBridge,
    ticker: Option<TimerHandle>,
}

impl<B: AudioBackend> AudioEngine<B> {
    pub fn new(
        backend: B,
        topology: Topology,
        config: AudioConfig,
        host: Rc<dyn Host>,
        sink: Rc<dyn InputSink>,
    ) -> Self {
        let bridge = SamplingBridge::new(host.clone(), sink, config.sampling_interval);
        Self {
            core: Rc::new(RefCell::new(EngineCore {
                transport: Transport::new(config.bpm, config.resume),
                sequences: SequenceEngine::default(),
                graph: GraphState::Uninitialized,
                lookahead: config.lookahead_sec,
                pending: Vec::new(),
            })),
            backend,
            topology,
            config,
            host,
            bridge,
            ticker: None,
        }
    }

    pub fn state(&self) -> TransportState {
        self.core.borrow().transport.state()
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.core.borrow().graph, GraphState::Ready { .. })
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn ensure_graph(&mut self) -> Result<Weak<dyn LevelSource>, AudioError> {
        let mut core = self.core.borrow_mut();
        if let GraphState::Ready { meter, .. } = &core.graph {
            return Ok(Rc::downgrade(meter));
        }
        let graph = self
            .backend
            .build(&self.topology, &self.config)
            .map_err(|e| {
                log::error!("[audio] graph build failed: {}", e);
                e
            })?;
        let meter = graph.meter();
        let weak = Rc::downgrade(&meter);
        core.sequences = self.topology.sequence_engine();
        core.graph = GraphState::Ready { graph, meter };
        log::info!(
            "[audio] graph ready: {} tracks at {} bpm",
            self.topology.tracks.len(),
            self.config.bpm
        );
        Ok(weak)
    }

    /// Start music and the loudness bridge. Starting while already started
    /// only makes sure the bridge is running.
    pub fn start(&mut self) -> Result<(), AudioError> {
        let meter = self.ensure_graph()?;
        let started = {
            let mut core = self.core.borrow_mut();
            let core = &mut *core;
            let now = match &core.graph {
                GraphState::Ready { graph, .. } => graph.now(),
                GraphState::Uninitialized => 0.0,
            };
            let started = core.transport.start(now);
            if started {
                core.sequences.seek(core.transport.position_at(now));
                core.pump();
            }
            started
        };
        if started && self.ticker.is_none() {
            let weak = Rc::downgrade(&self.core);
            self.ticker = Some(self.host.set_interval(
                self.config.scheduler_interval,
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        let n = core.borrow_mut().pump();
                        if n > 0 {
                            log::trace!("[audio] scheduled {} events", n);
                        }
                    }
                }),
            ));
        }
        self.bridge.start(meter);
        Ok(())
    }

    /// Stop music, cancel anything already scheduled and settle the meter.
    /// A stop before any start is a no-op.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            self.host.clear_interval(ticker);
        }
        {
            let mut core = self.core.borrow_mut();
            let core = &mut *core;
            if let GraphState::Ready { graph, .. } = &mut core.graph {
                let now = graph.now();
                if core.transport.stop(now) {
                    core.sequences.seek(core.transport.position_at(now));
                    graph.cancel_from(now);
                }
            }
        }
        self.bridge.stop();
    }

    /// Run one scheduler tick now instead of waiting for the interval.
    pub fn pump(&self) -> usize {
        self.core.borrow_mut().pump()
    }
}

impl<B: AudioBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            self.host.clear_interval(ticker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_topology_matches_the_piece() {
        let t = Topology::digital_art().unwrap();
        let names: Vec<_> = t.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["bass", "rhythm", "arp"]);
        assert_eq!(t.tracks[0].sequence.steps().len(), 4);
        assert_eq!(t.tracks[1].bus_gain, NOISE_BUS_GAIN);
        assert_eq!(t.tracks[2].sequence.voice_index(), 2);
        assert_eq!(t.master_gain, MASTER_GAIN);
    }

    #[test]
    fn bad_pattern_is_reported() {
        let err = Topology::new(1.0)
            .with_track("x", VoiceKind::Fm, "C4 [E4", 0.5, NoteValue::Quarter, 1.0)
            .unwrap_err();
        assert_eq!(err, MusicError::UnbalancedChord);
    }
}
