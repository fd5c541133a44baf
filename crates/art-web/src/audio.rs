use crate::constants::{
    ANALYSER_FFT_SIZE, CANCEL_FADE_TAU_SEC, NOISE_BUFFER_SEC, NOISE_SEED, SOURCE_STOP_PAD_SEC,
};
use art_core::{
    white_noise, AudioBackend, AudioConfig, AudioError, AudioGraph, LevelMeter, LevelSource,
    NoteEvent, Topology, VoiceKind, AM_HARMONICITY, FM_HARMONICITY, FM_MODULATION_INDEX,
};
use std::cell::RefCell;
use std::rc::Rc;
use web_sys as web;

fn init_err(what: &str, e: wasm_bindgen::JsValue) -> AudioError {
    AudioError::Initialization(format!("{}: {:?}", what, e))
}

fn create_gain(ctx: &web::AudioContext, value: f32, label: &str) -> Result<web::GainNode, AudioError> {
    let g = web::GainNode::new(ctx).map_err(|e| init_err(label, e))?;
    g.gain().set_value(value);
    Ok(g)
}

/// The context built by the last successful `build`, shared with the page so
/// a user gesture can resume it.
pub type ContextSlot = Rc<RefCell<Option<web::AudioContext>>>;

/// Builds one `AudioContext` per engine. The browser may leave it suspended;
/// the page resumes it through [`WebAudioBackend::context`] from a gesture.
#[derive(Default)]
pub struct WebAudioBackend {
    context: ContextSlot,
}

impl WebAudioBackend {
    pub fn context(&self) -> ContextSlot {
        self.context.clone()
    }
}

impl AudioBackend for WebAudioBackend {
    type Graph = WebAudioGraph;

    fn build(&mut self, topology: &Topology, config: &AudioConfig) -> Result<WebAudioGraph, AudioError> {
        let ctx = web::AudioContext::new().map_err(|e| init_err("AudioContext", e))?;
        match wire(&ctx, topology, config) {
            Ok(graph) => {
                *self.context.borrow_mut() = Some(ctx);
                Ok(graph)
            }
            Err(e) => {
                // A half-built graph must not keep the audio device open.
                let _ = ctx.close();
                Err(e)
            }
        }
    }
}

fn wire(ctx: &web::AudioContext, topology: &Topology, config: &AudioConfig) -> Result<WebAudioGraph, AudioError> {
    // buses -> meter_in -> master -> destination, with meter_in tapped by the analyser
    let master = create_gain(ctx, topology.master_gain, "master gain")?;
    master
        .connect_with_audio_node(&ctx.destination())
        .map_err(|e| init_err("master routing", e))?;
    let meter_in = create_gain(ctx, 1.0, "meter gain")?;
    meter_in
        .connect_with_audio_node(&master)
        .map_err(|e| init_err("meter routing", e))?;
    let analyser = web::AnalyserNode::new(ctx).map_err(|e| init_err("AnalyserNode", e))?;
    analyser.set_fft_size(ANALYSER_FFT_SIZE);
    meter_in
        .connect_with_audio_node(&analyser)
        .map_err(|e| init_err("analyser routing", e))?;

    let mut buses = Vec::with_capacity(topology.tracks.len());
    for track in &topology.tracks {
        let bus = create_gain(ctx, track.bus_gain, &track.name)?;
        bus.connect_with_audio_node(&meter_in)
            .map_err(|e| init_err(&track.name, e))?;
        buses.push((track.voice, bus));
    }

    let sr = ctx.sample_rate();
    let len = ((sr * NOISE_BUFFER_SEC) as u32).max(1);
    let noise = ctx
        .create_buffer(1, len, sr)
        .map_err(|e| init_err("noise buffer", e))?;
    let mut samples = white_noise(len as usize, NOISE_SEED);
    noise
        .copy_to_channel(&mut samples, 0)
        .map_err(|e| init_err("noise buffer", e))?;

    log::info!(
        "[audio] context ready: {} Hz, {} tracks",
        sr,
        topology.tracks.len()
    );
    Ok(WebAudioGraph {
        meter: Rc::new(AnalyserMeter {
            analyser,
            block: RefCell::new(vec![0.0; ANALYSER_FFT_SIZE as usize]),
            meter: RefCell::new(LevelMeter::new(config.meter_smoothing, config.meter_scale)),
        }),
        ctx: ctx.clone(),
        _master: master,
        buses,
        noise,
        active: Vec::new(),
    })
}

/// Reads the mixed signal through an `AnalyserNode` on every poll.
pub struct AnalyserMeter {
    analyser: web::AnalyserNode,
    block: RefCell<Vec<f32>>,
    meter: RefCell<LevelMeter>,
}

impl LevelSource for AnalyserMeter {
    fn level(&self) -> f32 {
        let mut block = self.block.borrow_mut();
        self.analyser.get_float_time_domain_data(&mut block);
        self.meter.borrow_mut().update(&block)
    }
}

struct ActiveNote {
    start: f64,
    end: f64,
    sources: Vec<web::AudioScheduledSourceNode>,
    env: web::GainNode,
}

impl ActiveNote {
    fn stop_at(&self, when: f64) {
        for src in &self.sources {
            let _ = src.stop_with_when(when);
        }
    }
}

pub struct WebAudioGraph {
    ctx: web::AudioContext,
    _master: web::GainNode,
    buses: Vec<(VoiceKind, web::GainNode)>,
    noise: web::AudioBuffer,
    meter: Rc<AnalyserMeter>,
    active: Vec<ActiveNote>,
}

impl WebAudioGraph {
    fn oscillator(&self, kind: web::OscillatorType, hz: f32) -> Option<web::OscillatorNode> {
        let osc = web::OscillatorNode::new(&self.ctx).ok()?;
        osc.set_type(kind);
        osc.frequency().set_value(hz);
        Some(osc)
    }

    /// Source nodes for one note, already wired into `env`.
    fn voice_sources(
        &self,
        voice: VoiceKind,
        hz: Option<f32>,
        env: &web::GainNode,
    ) -> Option<Vec<web::AudioScheduledSourceNode>> {
        match (voice, hz) {
            (VoiceKind::Fm, Some(f)) => {
                let carrier = self.oscillator(web::OscillatorType::Sine, f)?;
                let modulator = self.oscillator(web::OscillatorType::Sine, f * FM_HARMONICITY)?;
                let depth =
                    create_gain(&self.ctx, f * FM_HARMONICITY * FM_MODULATION_INDEX, "fm depth")
                        .ok()?;
                modulator.connect_with_audio_node(&depth).ok()?;
                depth.connect_with_audio_param(&carrier.frequency()).ok()?;
                carrier.connect_with_audio_node(env).ok()?;
                Some(vec![carrier.into(), modulator.into()])
            }
            (VoiceKind::Am, Some(f)) => {
                let carrier = self.oscillator(web::OscillatorType::Sine, f)?;
                let modulator = self.oscillator(web::OscillatorType::Square, f * AM_HARMONICITY)?;
                // square in [-1, 1] scaled to swing the carrier gain over [0, 1]
                let am = create_gain(&self.ctx, 0.5, "am gain").ok()?;
                let scale = create_gain(&self.ctx, 0.5, "am depth").ok()?;
                modulator.connect_with_audio_node(&scale).ok()?;
                scale.connect_with_audio_param(&am.gain()).ok()?;
                carrier.connect_with_audio_node(&am).ok()?;
                am.connect_with_audio_node(env).ok()?;
                Some(vec![carrier.into(), modulator.into()])
            }
            (VoiceKind::Noise, _) => {
                let src = web::AudioBufferSourceNode::new(&self.ctx).ok()?;
                src.set_buffer(Some(&self.noise));
                src.set_loop(true);
                src.connect_with_audio_node(env).ok()?;
                Some(vec![src.into()])
            }
            (_, None) => {
                log::debug!("[audio] pitched voice got a trigger step; skipped");
                None
            }
        }
    }
}

impl AudioGraph for WebAudioGraph {
    fn now(&self) -> f64 {
        self.ctx.current_time()
    }

    fn schedule(&mut self, event: &NoteEvent) {
        let now = self.now();
        self.active.retain(|n| n.end > now);

        let Some((voice, bus)) = self.buses.get(event.voice_index) else {
            log::warn!("[audio] no bus for voice {}", event.voice_index);
            return;
        };
        let voice = *voice;
        let Ok(env) = web::GainNode::new(&self.ctx) else {
            return;
        };
        let Some(sources) = self.voice_sources(voice, event.frequency_hz, &env) else {
            return;
        };

        let shape = voice.envelope();
        let hold = event.duration_sec.max(0.0);
        let t0 = event.start_time_sec.max(now);
        let gain = env.gain();
        let _ = gain.set_value_at_time(0.0, t0);
        let mut breakpoints = vec![shape.attack, shape.attack + shape.decay];
        breakpoints.retain(|t| *t < hold);
        breakpoints.push(hold);
        breakpoints.push(shape.total_len(hold));
        for t in breakpoints {
            let _ = gain.linear_ramp_to_value_at_time(
                event.velocity * shape.gain_at(t, hold),
                t0 + t as f64,
            );
        }
        if env.connect_with_audio_node(bus).is_err() {
            return;
        }

        let end = t0 + shape.total_len(hold) as f64 + SOURCE_STOP_PAD_SEC;
        for src in &sources {
            let _ = src.start_with_when(t0);
            let _ = src.stop_with_when(end);
        }
        self.active.push(ActiveNote {
            start: t0,
            end,
            sources,
            env,
        });
    }

    fn cancel_from(&mut self, time_sec: f64) {
        let mut cancelled = 0;
        for note in self.active.drain(..) {
            if note.end <= time_sec {
                continue;
            }
            cancelled += 1;
            if note.start >= time_sec {
                note.stop_at(time_sec);
            } else {
                let gain = note.env.gain();
                let _ = gain.cancel_scheduled_values(time_sec);
                let _ = gain.set_target_at_time(0.0, time_sec, CANCEL_FADE_TAU_SEC);
                note.stop_at(time_sec + CANCEL_FADE_TAU_SEC * 5.0);
            }
        }
        log::debug!("[audio] cancelled {} notes from {:.3}", cancelled, time_sec);
    }

    fn meter(&self) -> Rc<dyn LevelSource> {
        self.meter.clone()
    }
}

impl Drop for WebAudioGraph {
    fn drop(&mut self) {
        let _ = self.ctx.close();
    }
}
