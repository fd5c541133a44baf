use std::time::Duration;

// Shared audio/visual tuning constants used by both web and native hosts.

// Transport
pub const DEFAULT_BPM: f64 = 120.0;
pub const BEATS_PER_BAR: f64 = 4.0; // note values are resolved in 4/4
pub const LOOKAHEAD_SEC: f64 = 0.1; // how far past `now` steps are stamped
pub const SCHEDULER_INTERVAL: Duration = Duration::from_millis(50); // must stay below the lookahead

// Loudness bridge
pub const SAMPLING_INTERVAL: Duration = Duration::from_millis(10);
pub const METER_SILENCE: f32 = 0.0; // value written when audio stops
pub const METER_SMOOTHING: f32 = 0.8; // peak-hold decay per reading
pub const METER_BLOCK_LEN: usize = 1024; // analysis window in samples

// Mixing
pub const MASTER_GAIN: f32 = 0.2;
pub const NOISE_BUS_GAIN: f32 = 0.1;
pub const DEFAULT_VELOCITY: f32 = 1.0;

// Uniform names exposed to shader programs
pub const UNIFORM_TIME: &str = "time";
pub const UNIFORM_RESOLUTION: &str = "resolution";
pub const UNIFORM_METER: &str = "meter";
pub const UNIFORM_MOUSE_X: &str = "mouseX";
pub const UNIFORM_MOUSE_Y: &str = "mouseY";

// Visual defaults
pub const INITIAL_TIME: f32 = 1.0;
pub const FALLBACK_VIEWPORT: [u32; 2] = [427, 842]; // used until the host reports a size
pub const QUAD_SIZE: f32 = 2.0; // full clip-space quad

// Toggle labels
pub const LABEL_STOP: &str = "Stop Music";
pub const LABEL_RESTART: &str = "Restart Music";
