use std::fmt;

/// Failure to bring up the audio graph. Returned from `AudioEngine::start`;
/// the engine stays uninitialized so a later start re-attempts the build.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("audio initialization failed: {0}")]
    Initialization(String),
}

/// Which half of a shader program a source block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VisualError {
    /// Raised at construction; never at render time.
    #[error("missing {0} shader source")]
    MissingShaderSource(ShaderStage),
    #[error("render surface unavailable: {0}")]
    Surface(String),
    #[error("shader program failed to compile: {0}")]
    Compile(String),
    #[error("render failed: {0}")]
    Render(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MusicError {
    #[error("invalid pitch `{0}`")]
    InvalidPitch(String),
    #[error("pattern has no steps")]
    EmptyPattern,
    #[error("unbalanced chord brackets in pattern")]
    UnbalancedChord,
    #[error("subdivision must be positive, got {0}")]
    InvalidSubdivision(f64),
}
