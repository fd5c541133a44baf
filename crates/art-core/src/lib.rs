pub mod app;
pub mod bridge;
pub mod constants;
pub mod engine;
pub mod error;
pub mod host;
pub mod meter;
pub mod music;
pub mod sequence;
pub mod transport;
pub mod visual;

pub static DEFAULT_VERTEX_WGSL: &str = include_str!("../shaders/quad.vert.wgsl");
pub static DEFAULT_FRAGMENT_WGSL: &str = include_str!("../shaders/glow.frag.wgsl");

pub use app::{toggle_label, App};
pub use bridge::{InputSink, SamplingBridge};
pub use engine::{AudioBackend, AudioConfig, AudioEngine, AudioGraph, Topology, Track};
pub use error::{AudioError, MusicError, ShaderStage, VisualError};
pub use host::{
    EventKind, FrameHandle, Host, HostEvent, ListenerHandle, LocalHost, Resolution, TimerHandle,
};
pub use meter::{LevelMeter, LevelSource, MeterScale, SharedLevel};
pub use music::*;
pub use sequence::{Sequence, SequenceEngine};
pub use transport::{ResumeMode, Transport, TransportState};
pub use visual::{
    RenderSurface, Renderer, ShaderSource, UniformValue, Uniforms, Visualizer, VisualizerInput,
};
