// Native audio (cpal): a small software synth for the three voice kinds,
// clocked by the number of frames the output stream has consumed.

use art_core::constants::METER_BLOCK_LEN;
use art_core::{
    white_noise, AudioBackend, AudioConfig, AudioError, AudioGraph, Envelope, LevelMeter,
    LevelSource, NoteEvent, SharedLevel, Topology, VoiceKind, AM_HARMONICITY, FM_HARMONICITY,
    FM_MODULATION_INDEX,
};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::f32::consts::TAU;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const NOISE_LEN_SEC: f32 = 1.0;
const NOISE_SEED: u64 = 0x5EED;
const CANCEL_FADE_SEC: f32 = 0.05;

#[derive(Clone, Copy)]
struct Bus {
    voice: VoiceKind,
    gain: f32,
}

struct PendingNote {
    start_frame: u64,
    bus: usize,
    hz: Option<f32>,
    velocity: f32,
    hold: f32,
}

struct SoundingNote {
    bus: Bus,
    envelope: Envelope,
    hz: f32,
    velocity: f32,
    hold: f32,
    t: f32,
    carrier_phase: f32,
    mod_phase: f32,
    noise_pos: usize,
    // (note time, gain) at which a cancel started fading the note out
    cut: Option<(f32, f32)>,
}

impl SoundingNote {
    fn gain(&self) -> f32 {
        match self.cut {
            Some((at, from)) => (from * (1.0 - (self.t - at) / CANCEL_FADE_SEC)).max(0.0),
            None => self.velocity * self.envelope.gain_at(self.t, self.hold),
        }
    }

    fn finished(&self) -> bool {
        match self.cut {
            Some((at, _)) => self.t - at >= CANCEL_FADE_SEC,
            None => self.t >= self.envelope.total_len(self.hold),
        }
    }

    fn next_sample(&mut self, sr: f32, noise: &[f32]) -> f32 {
        let raw = match self.bus.voice {
            VoiceKind::Fm => {
                let m = self.mod_phase.sin();
                let deviation = self.hz * FM_HARMONICITY * FM_MODULATION_INDEX;
                let s = self.carrier_phase.sin();
                self.carrier_phase =
                    (self.carrier_phase + TAU * (self.hz + m * deviation) / sr).rem_euclid(TAU);
                self.mod_phase = (self.mod_phase + TAU * self.hz * FM_HARMONICITY / sr) % TAU;
                s
            }
            VoiceKind::Am => {
                let square = if self.mod_phase.sin() >= 0.0 { 1.0 } else { -1.0 };
                let s = self.carrier_phase.sin() * (0.5 + 0.5 * square);
                self.carrier_phase = (self.carrier_phase + TAU * self.hz / sr) % TAU;
                self.mod_phase = (self.mod_phase + TAU * self.hz * AM_HARMONICITY / sr) % TAU;
                s
            }
            VoiceKind::Noise => {
                let s = noise.get(self.noise_pos).copied().unwrap_or(0.0);
                self.noise_pos = (self.noise_pos + 1) % noise.len().max(1);
                s
            }
        };
        let out = raw * self.gain() * self.bus.gain;
        self.t += 1.0 / sr;
        out
    }
}

struct SynthState {
    sample_rate: f32,
    buses: Vec<Bus>,
    master_gain: f32,
    noise: Vec<f32>,
    pending: Vec<PendingNote>,
    sounding: Vec<SoundingNote>,
    meter: LevelMeter,
    block: Vec<f32>,
    level: Arc<SharedLevel>,
}

impl SynthState {
    fn promote_due(&mut self, frame: u64) {
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].start_frame <= frame {
                let p = self.pending.swap_remove(i);
                let bus = self.buses[p.bus];
                self.sounding.push(SoundingNote {
                    bus,
                    envelope: bus.voice.envelope(),
                    hz: p.hz.unwrap_or(0.0),
                    velocity: p.velocity,
                    hold: p.hold,
                    t: 0.0,
                    carrier_phase: 0.0,
                    mod_phase: 0.0,
                    noise_pos: 0,
                    cut: None,
                });
            } else {
                i += 1;
            }
        }
    }

    /// Mix one frame. Returns the pre-master bus sum.
    fn mix(&mut self, frame: u64) -> f32 {
        if !self.pending.is_empty() {
            self.promote_due(frame);
        }
        let sr = self.sample_rate;
        let mut sum = 0.0;
        for note in &mut self.sounding {
            sum += note.next_sample(sr, &self.noise);
        }
        self.sounding.retain(|n| !n.finished());

        self.block.push(sum);
        if self.block.len() >= METER_BLOCK_LEN {
            let v = self.meter.update(&self.block);
            self.level.store(v);
            self.block.clear();
        }
        sum
    }
}

fn write_frames<T>(data: &mut [T], channels: usize, clock: &AtomicU64, state: &Mutex<SynthState>)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let frames = data.len() / channels.max(1);
    let start = clock.load(Ordering::Acquire);
    let Ok(mut synth) = state.lock() else {
        data.fill(T::EQUILIBRIUM);
        return;
    };
    for (i, frame) in data.chunks_mut(channels.max(1)).enumerate() {
        let s = synth.mix(start + i as u64);
        let out = (s * synth.master_gain).tanh();
        for sample in frame {
            *sample = T::from_sample(out);
        }
    }
    clock.fetch_add(frames as u64, Ordering::Release);
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    clock: Arc<AtomicU64>,
    state: Arc<Mutex<SynthState>>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    device.build_output_stream(
        config,
        move |data: &mut [T], _| write_frames(data, channels, &clock, &state),
        |err| log::error!("[audio] stream error: {}", err),
        None,
    )
}

fn init_err(e: impl std::fmt::Display) -> AudioError {
    AudioError::Initialization(e.to_string())
}

/// Opens the default output device on `build`.
#[derive(Default)]
pub struct CpalBackend;

impl AudioBackend for CpalBackend {
    type Graph = CpalGraph;

    fn build(&mut self, topology: &Topology, config: &AudioConfig) -> Result<CpalGraph, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Initialization("no output device".into()))?;
        let supported = device.default_output_config().map_err(init_err)?;
        let sample_rate = supported.sample_rate().0 as f32;

        let level = Arc::new(SharedLevel::new());
        let state = Arc::new(Mutex::new(SynthState {
            sample_rate,
            buses: topology
                .tracks
                .iter()
                .map(|t| Bus {
                    voice: t.voice,
                    gain: t.bus_gain,
                })
                .collect(),
            master_gain: topology.master_gain,
            noise: white_noise((sample_rate * NOISE_LEN_SEC) as usize, NOISE_SEED),
            pending: Vec::new(),
            sounding: Vec::new(),
            meter: LevelMeter::new(config.meter_smoothing, config.meter_scale),
            block: Vec::with_capacity(METER_BLOCK_LEN),
            level: level.clone(),
        }));
        let clock = Arc::new(AtomicU64::new(0));

        let stream_config: cpal::StreamConfig = supported.config();
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, clock.clone(), state.clone())
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, clock.clone(), state.clone())
            }
            cpal::SampleFormat::U16 => {
                build_stream::<u16>(&device, &stream_config, clock.clone(), state.clone())
            }
            other => {
                return Err(AudioError::Initialization(format!(
                    "unsupported sample format {:?}",
                    other
                )))
            }
        }
        .map_err(init_err)?;
        stream.play().map_err(init_err)?;

        log::info!(
            "[audio] output: {} @ {} Hz, {} ch",
            device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate,
            stream_config.channels
        );
        Ok(CpalGraph {
            _stream: stream,
            state,
            clock,
            sample_rate: sample_rate as f64,
            meter: Rc::new(level),
        })
    }
}

pub struct CpalGraph {
    _stream: cpal::Stream,
    state: Arc<Mutex<SynthState>>,
    clock: Arc<AtomicU64>,
    sample_rate: f64,
    meter: Rc<Arc<SharedLevel>>,
}

impl CpalGraph {
    fn frame_at(&self, time_sec: f64) -> u64 {
        (time_sec.max(0.0) * self.sample_rate).round() as u64
    }
}

impl AudioGraph for CpalGraph {
    fn now(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate
    }

    fn schedule(&mut self, event: &NoteEvent) {
        let Ok(mut synth) = self.state.lock() else {
            return;
        };
        let Some(bus) = synth.buses.get(event.voice_index) else {
            log::warn!("[audio] no bus for voice {}", event.voice_index);
            return;
        };
        if bus.voice != VoiceKind::Noise && event.frequency_hz.is_none() {
            log::debug!("[audio] pitched voice got a trigger step; skipped");
            return;
        }
        synth.pending.push(PendingNote {
            start_frame: self.frame_at(event.start_time_sec),
            bus: event.voice_index,
            hz: event.frequency_hz,
            velocity: event.velocity,
            hold: event.duration_sec.max(0.0),
        });
    }

    fn cancel_from(&mut self, time_sec: f64) {
        let cutoff = self.frame_at(time_sec);
        let Ok(mut synth) = self.state.lock() else {
            return;
        };
        let before = synth.pending.len();
        synth.pending.retain(|p| p.start_frame < cutoff);
        let dropped = before - synth.pending.len();
        for note in &mut synth.sounding {
            if note.cut.is_none() {
                note.cut = Some((note.t, note.gain()));
            }
        }
        log::debug!(
            "[audio] cancelled {} pending, fading {} sounding",
            dropped,
            synth.sounding.len()
        );
    }

    fn meter(&self) -> Rc<dyn LevelSource> {
        self.meter.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth(voice: VoiceKind) -> SynthState {
        SynthState {
            sample_rate: 1000.0,
            buses: vec![Bus { voice, gain: 1.0 }],
            master_gain: 1.0,
            noise: white_noise(1000, 1),
            pending: Vec::new(),
            sounding: Vec::new(),
            meter: LevelMeter::default(),
            block: Vec::new(),
            level: Arc::new(SharedLevel::new()),
        }
    }

    fn note(start_frame: u64, hold: f32) -> PendingNote {
        PendingNote {
            start_frame,
            bus: 0,
            hz: Some(50.0),
            velocity: 1.0,
            hold,
        }
    }

    #[test]
    fn notes_start_on_their_frame() {
        let mut s = synth(VoiceKind::Fm);
        s.pending.push(note(10, 0.1));
        for f in 0..10 {
            assert_eq!(s.mix(f), 0.0);
        }
        s.mix(10);
        assert_eq!(s.sounding.len(), 1);
        assert!(s.pending.is_empty());
    }

    #[test]
    fn notes_end_after_release() {
        let mut s = synth(VoiceKind::Am);
        s.pending.push(note(0, 0.1));
        // hold 0.1 s + release 0.5 s at 1 kHz
        for f in 0..610 {
            s.mix(f);
        }
        assert!(s.sounding.is_empty());
    }

    #[test]
    fn cut_fades_out_quickly() {
        let mut s = synth(VoiceKind::Noise);
        s.pending.push(note(0, 10.0));
        for f in 0..100 {
            s.mix(f);
        }
        let n = &mut s.sounding[0];
        n.cut = Some((n.t, n.gain()));
        for f in 100..(100 + (CANCEL_FADE_SEC * 1000.0) as u64 + 2) {
            s.mix(f);
        }
        assert!(s.sounding.is_empty());
    }

    #[test]
    fn meter_publishes_per_block() {
        let mut s = synth(VoiceKind::Noise);
        s.pending.push(note(0, 10.0));
        for f in 0..METER_BLOCK_LEN as u64 {
            s.mix(f);
        }
        assert!(s.level.load() > 0.0);
        assert!(s.block.is_empty());
    }
}
