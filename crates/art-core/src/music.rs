use crate::constants::BEATS_PER_BAR;
use crate::error::MusicError;
use rand::prelude::*;
use smallvec::SmallVec;

/// Sound source bound to one sequence. The hosts' synthesis engines decide
/// how each kind actually sounds; the core only carries the choice and its
/// envelope defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceKind {
    /// Sine carrier frequency-modulated by a sine at `FM_HARMONICITY`.
    Fm,
    /// Sine carrier amplitude-modulated by a square at `AM_HARMONICITY`.
    Am,
    /// Unpitched white noise; driven by trigger steps.
    Noise,
}

pub const FM_HARMONICITY: f32 = 3.0;
pub const FM_MODULATION_INDEX: f32 = 10.0;
pub const AM_HARMONICITY: f32 = 3.0;

impl VoiceKind {
    pub fn envelope(self) -> Envelope {
        match self {
            VoiceKind::Fm | VoiceKind::Am => Envelope {
                attack: 0.01,
                decay: 0.01,
                sustain: 1.0,
                release: 0.5,
            },
            VoiceKind::Noise => Envelope {
                attack: 0.005,
                decay: 0.1,
                sustain: 0.0,
                release: 0.1,
            },
        }
    }
}

/// Linear ADSR envelope, times in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Envelope {
    /// Gain at `t` seconds after note-on for a note held `hold` seconds.
    pub fn gain_at(&self, t: f32, hold: f32) -> f32 {
        if t < 0.0 {
            return 0.0;
        }
        if t < hold {
            return self.held_gain(t);
        }
        let from = self.held_gain(hold);
        let since = t - hold;
        if self.release <= 0.0 || since >= self.release {
            0.0
        } else {
            from * (1.0 - since / self.release)
        }
    }

    /// Seconds from note-on until the release has fully decayed.
    pub fn total_len(&self, hold: f32) -> f32 {
        hold.max(0.0) + self.release.max(0.0)
    }

    fn held_gain(&self, t: f32) -> f32 {
        if t < self.attack {
            return t / self.attack;
        }
        let t = t - self.attack;
        if t < self.decay {
            1.0 + (self.sustain - 1.0) * (t / self.decay)
        } else {
            self.sustain
        }
    }
}

/// A pitch on the equal-tempered MIDI grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pitch {
    pub midi: i32,
}

impl Pitch {
    pub fn from_midi(midi: i32) -> Self {
        Self { midi }
    }

    /// Parse scientific pitch notation: `C4` is MIDI 60, `D#2`, `Eb3`, `C-1`.
    pub fn parse(name: &str) -> Result<Self, MusicError> {
        let invalid = || MusicError::InvalidPitch(name.to_string());
        let mut chars = name.trim().chars().peekable();
        let letter = chars.next().ok_or_else(invalid)?;
        let mut semitone = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };
        while let Some(&c) = chars.peek() {
            match c {
                '#' => semitone += 1,
                'b' => semitone -= 1,
                _ => break,
            }
            chars.next();
        }
        let octave: String = chars.collect();
        let octave: i32 = octave.parse().map_err(|_| invalid())?;
        let midi = octave
            .checked_add(1)
            .and_then(|o| o.checked_mul(12))
            .and_then(|m| m.checked_add(semitone))
            .ok_or_else(invalid)?;
        Ok(Self { midi })
    }

    pub fn hz(self) -> f32 {
        midi_to_hz(self.midi as f32)
    }
}

/// One position in a step pattern.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Note(Pitch),
    /// Pitches sounded together on the same boundary.
    Chord(SmallVec<[Pitch; 4]>),
    /// Percussive trigger carrying no pitch.
    Trigger,
}

/// Parse a pattern such as `"C2 [D#2 D2] G#2 G2"` or `"x x x x"`.
///
/// Tokens are separated by whitespace or commas, `[...]` groups a chord and
/// `x` (or `.`) marks a percussive trigger.
pub fn parse_pattern(text: &str) -> Result<Vec<Step>, MusicError> {
    let mut steps = Vec::new();
    let mut chord: Option<SmallVec<[Pitch; 4]>> = None;
    let mut token = String::new();

    fn flush(
        token: &mut String,
        chord: &mut Option<SmallVec<[Pitch; 4]>>,
        steps: &mut Vec<Step>,
    ) -> Result<(), MusicError> {
        if token.is_empty() {
            return Ok(());
        }
        let is_trigger = token == "x" || token == "X" || token == ".";
        match chord {
            Some(pitches) => {
                if is_trigger {
                    return Err(MusicError::InvalidPitch(token.clone()));
                }
                pitches.push(Pitch::parse(token)?);
            }
            None if is_trigger => steps.push(Step::Trigger),
            None => steps.push(Step::Note(Pitch::parse(token)?)),
        }
        token.clear();
        Ok(())
    }

    for c in text.chars() {
        match c {
            '[' => {
                flush(&mut token, &mut chord, &mut steps)?;
                if chord.is_some() {
                    return Err(MusicError::UnbalancedChord);
                }
                chord = Some(SmallVec::new());
            }
            ']' => {
                flush(&mut token, &mut chord, &mut steps)?;
                let pitches = chord.take().ok_or(MusicError::UnbalancedChord)?;
                match pitches.len() {
                    0 => return Err(MusicError::EmptyPattern),
                    1 => steps.push(Step::Note(pitches[0])),
                    _ => steps.push(Step::Chord(pitches)),
                }
            }
            c if c.is_whitespace() || c == ',' => flush(&mut token, &mut chord, &mut steps)?,
            c => token.push(c),
        }
    }
    flush(&mut token, &mut chord, &mut steps)?;
    if chord.is_some() {
        return Err(MusicError::UnbalancedChord);
    }
    if steps.is_empty() {
        return Err(MusicError::EmptyPattern);
    }
    Ok(steps)
}

/// Musical duration relative to a 4/4 bar (`Whole` is `1n`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl NoteValue {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "1n" => Some(NoteValue::Whole),
            "2n" => Some(NoteValue::Half),
            "4n" => Some(NoteValue::Quarter),
            "8n" => Some(NoteValue::Eighth),
            "16n" => Some(NoteValue::Sixteenth),
            "32n" => Some(NoteValue::ThirtySecond),
            _ => None,
        }
    }

    fn divisor(self) -> f64 {
        match self {
            NoteValue::Whole => 1.0,
            NoteValue::Half => 2.0,
            NoteValue::Quarter => 4.0,
            NoteValue::Eighth => 8.0,
            NoteValue::Sixteenth => 16.0,
            NoteValue::ThirtySecond => 32.0,
        }
    }

    /// Length in seconds at `bpm`; at 120 bpm `1n` is 2 s.
    pub fn seconds(self, bpm: f64) -> f64 {
        let bar = BEATS_PER_BAR * 60.0 / bpm;
        bar / self.divisor()
    }
}

/// A scheduled musical event produced by the sequencer for playback.
///
/// Fields:
/// - `voice_index`: which voice (track) this event belongs to
/// - `frequency_hz`: target pitch in Hertz, `None` for a percussive trigger
/// - `velocity`: normalized loudness 0..1 (mapped to gain envelope)
/// - `start_time_sec`: absolute start time on the audio clock, in seconds
/// - `duration_sec`: nominal held duration in seconds (before release)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteEvent {
    pub voice_index: usize,
    pub frequency_hz: Option<f32>,
    pub velocity: f32,
    pub start_time_sec: f64,
    pub duration_sec: f32,
}

/// Convert a MIDI note number to Hertz (A4=440 Hz).
///
/// Monotonic and exhibits octave symmetry: +12 semitones doubles the frequency.
pub fn midi_to_hz(midi: f32) -> f32 {
    440.0 * (2.0_f32).powf((midi - 69.0) / 12.0)
}

/// Deterministic white noise in [-1, 1], used for noise voice buffers.
pub fn white_noise(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0_f32..=1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_releases_from_held_level() {
        let env = Envelope {
            attack: 0.1,
            decay: 0.1,
            sustain: 0.5,
            release: 0.2,
        };
        assert_eq!(env.gain_at(-0.1, 1.0), 0.0);
        assert!((env.gain_at(0.05, 1.0) - 0.5).abs() < 1e-6);
        assert!((env.gain_at(0.5, 1.0) - 0.5).abs() < 1e-6);
        assert!((env.gain_at(1.1, 1.0) - 0.25).abs() < 1e-6);
        assert_eq!(env.gain_at(1.3, 1.0), 0.0);
        assert!((env.total_len(1.0) - 1.2).abs() < 1e-6);
    }

    #[test]
    fn note_value_lengths_at_default_tempo() {
        assert!((NoteValue::Whole.seconds(120.0) - 2.0).abs() < 1e-9);
        assert!((NoteValue::Eighth.seconds(120.0) - 0.25).abs() < 1e-9);
        assert!((NoteValue::Sixteenth.seconds(120.0) - 0.125).abs() < 1e-9);
        assert_eq!(NoteValue::parse("16n"), Some(NoteValue::Sixteenth));
        assert_eq!(NoteValue::parse("3n"), None);
    }

    #[test]
    fn white_noise_is_bounded_and_seeded() {
        let a = white_noise(512, 7);
        let b = white_noise(512, 7);
        assert_eq!(a, b);
        assert!(a.iter().all(|s| (-1.0..=1.0).contains(s)));
    }
}
