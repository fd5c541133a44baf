// Shared fakes for host-side integration tests: a recording renderer, a
// scripted audio backend and a recording input sink.

#![allow(dead_code)]

use art_core::visual::{OrthoCamera, QuadGeometry, ResourceId, Scene};
use art_core::*;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum RenderCall {
    Created(Resolution),
    Resized(Resolution),
    Quad(ResourceId),
    Program(ResourceId),
    Rendered(Uniforms),
    Released(ResourceId),
    Disposed,
}

#[derive(Default)]
pub struct RenderLog {
    pub calls: RefCell<Vec<RenderCall>>,
    pub fail_compile: Cell<bool>,
    pub fail_render: Cell<bool>,
    next_id: Cell<u32>,
}

impl RenderLog {
    pub fn renders(&self) -> Vec<Uniforms> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                RenderCall::Rendered(u) => Some(*u),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&RenderCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn last(&self) -> Option<RenderCall> {
        self.calls.borrow().last().cloned()
    }

    fn issue(&self) -> ResourceId {
        self.next_id.set(self.next_id.get() + 1);
        ResourceId(self.next_id.get())
    }
}

pub struct RecordingRenderer {
    log: Rc<RenderLog>,
}

impl Renderer for RecordingRenderer {
    fn resize(&mut self, size: Resolution) {
        self.log.calls.borrow_mut().push(RenderCall::Resized(size));
    }

    fn create_quad(&mut self, _geometry: &QuadGeometry) -> Result<ResourceId, VisualError> {
        let id = self.log.issue();
        self.log.calls.borrow_mut().push(RenderCall::Quad(id));
        Ok(id)
    }

    fn compile_program(&mut self, _source: &ShaderSource) -> Result<ResourceId, VisualError> {
        if self.log.fail_compile.get() {
            return Err(VisualError::Compile("scripted failure".into()));
        }
        let id = self.log.issue();
        self.log.calls.borrow_mut().push(RenderCall::Program(id));
        Ok(id)
    }

    fn render(
        &mut self,
        _scene: &Scene,
        _camera: &OrthoCamera,
        uniforms: &Uniforms,
    ) -> Result<(), VisualError> {
        if self.log.fail_render.get() {
            return Err(VisualError::Render("scripted failure".into()));
        }
        self.log
            .calls
            .borrow_mut()
            .push(RenderCall::Rendered(*uniforms));
        Ok(())
    }

    fn release(&mut self, id: ResourceId) {
        self.log.calls.borrow_mut().push(RenderCall::Released(id));
    }

    fn dispose(&mut self) {
        self.log.calls.borrow_mut().push(RenderCall::Disposed);
    }
}

pub struct RecordingSurface {
    pub log: Rc<RenderLog>,
}

impl RenderSurface for RecordingSurface {
    type Renderer = RecordingRenderer;

    fn create_renderer(&mut self, size: Resolution) -> Result<RecordingRenderer, VisualError> {
        self.log.calls.borrow_mut().push(RenderCall::Created(size));
        Ok(RecordingRenderer {
            log: self.log.clone(),
        })
    }
}

#[derive(Default)]
pub struct FakeLevel(pub Cell<f32>);

impl LevelSource for FakeLevel {
    fn level(&self) -> f32 {
        self.0.get()
    }
}

/// Everything a `FakeGraph` does, visible to the test after the engine
/// has taken ownership of the graph.
#[derive(Default)]
pub struct GraphProbe {
    pub clock: Cell<f64>,
    pub builds: Cell<usize>,
    pub fail_builds: Cell<usize>,
    pub scheduled: RefCell<Vec<NoteEvent>>,
    pub cancelled: RefCell<Vec<f64>>,
    pub level: Rc<FakeLevel>,
}

impl GraphProbe {
    pub fn set_clock(&self, t: f64) {
        self.clock.set(t);
    }

    pub fn set_level(&self, v: f32) {
        self.level.0.set(v);
    }

    pub fn start_times(&self) -> Vec<f64> {
        self.scheduled
            .borrow()
            .iter()
            .map(|e| e.start_time_sec)
            .collect()
    }
}

pub struct FakeGraph {
    probe: Rc<GraphProbe>,
}

impl AudioGraph for FakeGraph {
    fn now(&self) -> f64 {
        self.probe.clock.get()
    }

    fn schedule(&mut self, event: &NoteEvent) {
        self.probe.scheduled.borrow_mut().push(event.clone());
    }

    fn cancel_from(&mut self, time_sec: f64) {
        self.probe.cancelled.borrow_mut().push(time_sec);
    }

    fn meter(&self) -> Rc<dyn LevelSource> {
        self.probe.level.clone()
    }
}

pub struct FakeBackend {
    pub probe: Rc<GraphProbe>,
}

impl AudioBackend for FakeBackend {
    type Graph = FakeGraph;

    fn build(&mut self, _topology: &Topology, _config: &AudioConfig) -> Result<FakeGraph, AudioError> {
        self.probe.builds.set(self.probe.builds.get() + 1);
        if self.probe.fail_builds.get() > 0 {
            self.probe.fail_builds.set(self.probe.fail_builds.get() - 1);
            return Err(AudioError::Initialization("permission denied".into()));
        }
        Ok(FakeGraph {
            probe: self.probe.clone(),
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub writes: RefCell<Vec<(String, f32)>>,
}

impl InputSink for RecordingSink {
    fn set_input(&self, name: &str, value: f32) {
        self.writes.borrow_mut().push((name.to_string(), value));
    }
}

pub fn host() -> Rc<LocalHost> {
    LocalHost::new(Resolution::new(1000, 500), Resolution::new(640, 480))
}

pub fn visualizer(host: &Rc<LocalHost>) -> (Visualizer<RecordingSurface>, Rc<RenderLog>) {
    let log = Rc::new(RenderLog::default());
    let vis = Visualizer::new(
        DEFAULT_VERTEX_WGSL,
        DEFAULT_FRAGMENT_WGSL,
        RecordingSurface { log: log.clone() },
        host.clone(),
    )
    .expect("bundled shaders are valid");
    (vis, log)
}

pub fn engine(
    host: &Rc<LocalHost>,
    topology: Topology,
    sink: Rc<dyn InputSink>,
) -> (AudioEngine<FakeBackend>, Rc<GraphProbe>) {
    let probe = Rc::new(GraphProbe::default());
    let engine = AudioEngine::new(
        FakeBackend {
            probe: probe.clone(),
        },
        topology,
        AudioConfig::default(),
        host.clone(),
        sink,
    );
    (engine, probe)
}

/// Move both clocks to `t`, running due intervals.
pub fn advance(host: &LocalHost, probe: &GraphProbe, t: f64) {
    probe.set_clock(t);
    host.advance_to(t);
}
