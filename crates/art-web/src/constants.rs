// Page wiring and WebAudio tuning for the browser front-end.

// DOM
pub const BUTTON_SELECTOR: &str = "button";
pub const VERTEX_SCRIPT_SELECTOR: &str = "script[type=vert]";
pub const FRAGMENT_SCRIPT_SELECTOR: &str = "script[type=frag]";

// Analyser window; matches the meter block length used natively
pub const ANALYSER_FFT_SIZE: u32 = art_core::constants::METER_BLOCK_LEN as u32;

// Seconds of looped white noise feeding the noise voice
pub const NOISE_BUFFER_SEC: f32 = 1.0;
pub const NOISE_SEED: u64 = 0x5EED;

// Tail kept after the envelope ends before a source is stopped
pub const SOURCE_STOP_PAD_SEC: f64 = 0.05;
// Time constant for the fade applied to sounding notes on stop
pub const CANCEL_FADE_TAU_SEC: f64 = 0.05;
