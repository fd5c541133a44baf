use crate::error::MusicError;
use crate::music::{parse_pattern, NoteEvent, NoteValue, Step};
use crate::transport::{Transport, TransportState};

// Tolerance when locating the first step at or after a position.
const SEEK_EPSILON: f64 = 1e-9;

/// A fixed step pattern bound to one voice.
///
/// Step `k` is due at transport time `start_offset + k * subdivision`; the
/// time is computed from `k` directly rather than accumulated, so phase never
/// drifts however irregularly the sequence is pumped.
#[derive(Clone, Debug)]
pub struct Sequence {
    steps: Vec<Step>,
    subdivision_sec: f64,
    start_offset: f64,
    voice_index: usize,
    note_value: NoteValue,
    velocity: f32,
    next_step: u64,
}

impl Sequence {
    pub fn new(
        steps: Vec<Step>,
        subdivision_sec: f64,
        voice_index: usize,
        note_value: NoteValue,
    ) -> Result<Self, MusicError> {
        if steps.is_empty() {
            return Err(MusicError::EmptyPattern);
        }
        if !(subdivision_sec > 0.0) || !subdivision_sec.is_finite() {
            return Err(MusicError::InvalidSubdivision(subdivision_sec));
        }
        Ok(Self {
            steps,
            subdivision_sec,
            start_offset: 0.0,
            voice_index,
            note_value,
            velocity: crate::constants::DEFAULT_VELOCITY,
            next_step: 0,
        })
    }

    pub fn from_pattern(
        pattern: &str,
        subdivision_sec: f64,
        voice_index: usize,
        note_value: NoteValue,
    ) -> Result<Self, MusicError> {
        Self::new(parse_pattern(pattern)?, subdivision_sec, voice_index, note_value)
    }

    /// Transport time of step 0 (defaults to 0).
    pub fn with_start_offset(mut self, offset_sec: f64) -> Self {
        self.start_offset = offset_sec;
        self
    }

    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn subdivision_sec(&self) -> f64 {
        self.subdivision_sec
    }

    pub fn voice_index(&self) -> usize {
        self.voice_index
    }

    /// Index of the next step that has not been scheduled yet.
    pub fn next_step(&self) -> u64 {
        self.next_step
    }

    pub fn step_time(&self, k: u64) -> f64 {
        self.start_offset + k as f64 * self.subdivision_sec
    }

    fn seek(&mut self, position: f64) {
        let rel = (position - self.start_offset) / self.subdivision_sec;
        self.next_step = if rel <= 0.0 {
            0
        } else {
            (rel - SEEK_EPSILON).ceil().max(0.0) as u64
        };
    }

    fn emit(&self, k: u64, start_time_sec: f64, bpm: f64, out: &mut Vec<NoteEvent>) {
        let step = &self.steps[(k % self.steps.len() as u64) as usize];
        let duration_sec = self.note_value.seconds(bpm) as f32;
        let event = |frequency_hz| NoteEvent {
            voice_index: self.voice_index,
            frequency_hz,
            velocity: self.velocity,
            start_time_sec,
            duration_sec,
        };
        match step {
            Step::Note(p) => out.push(event(Some(p.hz()))),
            Step::Chord(pitches) => out.extend(pitches.iter().map(|p| event(Some(p.hz())))),
            Step::Trigger => out.push(event(None)),
        }
    }
}

/// The set of sequences advanced together by one transport.
#[derive(Clone, Debug, Default)]
pub struct SequenceEngine {
    sequences: Vec<Sequence>,
}

impl SequenceEngine {
    pub fn new(sequences: Vec<Sequence>) -> Self {
        Self { sequences }
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Emit every step due before `position(audio_now) + lookahead`, each
    /// stamped with the audio time of its exact boundary. Nothing advances
    /// while the transport is stopped.
    pub fn pump(
        &mut self,
        transport: &Transport,
        audio_now: f64,
        lookahead: f64,
        out: &mut Vec<NoteEvent>,
    ) {
        if transport.state() != TransportState::Started {
            return;
        }
        let horizon = transport.position_at(audio_now) + lookahead.max(0.0);
        let bpm = transport.bpm();
        for seq in &mut self.sequences {
            loop {
                let k = seq.next_step;
                let t = seq.step_time(k);
                if t >= horizon {
                    break;
                }
                seq.emit(k, transport.audio_time_of(t), bpm, out);
                seq.next_step = k + 1;
            }
        }
    }

    /// Point every sequence at its first step at or after `position`.
    /// Steps already handed out past that point must be cancelled by the
    /// caller.
    pub fn seek(&mut self, position: f64) {
        for seq in &mut self.sequences {
            seq.seek(position);
        }
    }
}
