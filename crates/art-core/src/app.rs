use crate::constants::{LABEL_RESTART, LABEL_STOP};
use crate::engine::{AudioBackend, AudioConfig, AudioEngine, Topology};
use crate::error::{AudioError, VisualError};
use crate::host::Host;
use crate::transport::TransportState;
use crate::visual::{RenderSurface, ShaderSource, Visualizer};
use std::rc::Rc;

/// Label for the play/stop control given the current state.
pub fn toggle_label(state: TransportState) -> &'static str {
    match state {
        TransportState::Started => LABEL_STOP,
        TransportState::Stopped => LABEL_RESTART,
    }
}

/// Explicit application context: one audio engine wired to one visualizer.
/// Hosts own an `App` instead of reaching for globals.
pub struct App<B: AudioBackend, S: RenderSurface> {
    pub audio: AudioEngine<B>,
    pub visualizer: Visualizer<S>,
}

impl<B: AudioBackend, S: RenderSurface> App<B, S> {
    pub fn new(
        backend: B,
        surface: S,
        shaders: ShaderSource,
        topology: Topology,
        config: AudioConfig,
        host: Rc<dyn Host>,
    ) -> Self {
        let visualizer = Visualizer::with_source(shaders, surface, host.clone());
        let sink = Rc::new(visualizer.input());
        let audio = AudioEngine::new(backend, topology, config, host, sink);
        Self { audio, visualizer }
    }

    /// Attach the visuals, then start the music.
    pub fn mount(&mut self) -> Result<(), VisualError> {
        self.visualizer.attach()?;
        if let Err(e) = self.audio.start() {
            // Visuals still run; the next toggle retries the audio build.
            log::warn!("[app] music unavailable: {}", e);
        }
        Ok(())
    }

    /// Stop the music and detach the visuals.
    pub fn unmount(&mut self) {
        self.audio.stop();
        self.visualizer.detach();
    }

    /// Flip between playing and stopped. Returns the new state.
    pub fn toggle(&mut self) -> Result<TransportState, AudioError> {
        match self.audio.state() {
            TransportState::Started => self.audio.stop(),
            TransportState::Stopped => self.audio.start()?,
        }
        let state = self.audio.state();
        log::info!("[app] music {}", state.as_str());
        Ok(state)
    }

    /// Stop the music if it is playing, e.g. when the output device refused
    /// to start after the graph was built.
    pub fn stop(&mut self) {
        if self.audio.state() == TransportState::Started {
            self.audio.stop();
            log::info!("[app] music stopped");
        }
    }

    pub fn label(&self) -> &'static str {
        toggle_label(self.audio.state())
    }
}
