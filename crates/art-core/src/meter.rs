use crate::constants::METER_SMOOTHING;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Unit the meter reports in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MeterScale {
    /// RMS gain, 0 for silence.
    #[default]
    Linear,
    /// 20·log10(RMS); silence reads as negative infinity.
    Decibels,
}

/// Loudness follower over blocks of the mixed signal.
///
/// Each block's RMS is combined with the previous reading as
/// `max(rms, previous * smoothing)`, so peaks register immediately and fall
/// off geometrically.
#[derive(Clone, Debug)]
pub struct LevelMeter {
    smoothing: f32,
    scale: MeterScale,
    rms: f32,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(METER_SMOOTHING, MeterScale::Linear)
    }
}

impl LevelMeter {
    pub fn new(smoothing: f32, scale: MeterScale) -> Self {
        Self {
            smoothing: smoothing.clamp(0.0, 1.0),
            scale,
            rms: 0.0,
        }
    }

    /// Fold in one block of samples and return the new reading.
    pub fn update(&mut self, block: &[f32]) -> f32 {
        let rms = if block.is_empty() {
            0.0
        } else {
            let sum: f32 = block.iter().map(|s| s * s).sum();
            (sum / block.len() as f32).sqrt()
        };
        self.rms = rms.max(self.rms * self.smoothing);
        self.value()
    }

    pub fn value(&self) -> f32 {
        match self.scale {
            MeterScale::Linear => self.rms,
            MeterScale::Decibels => 20.0 * self.rms.log10(),
        }
    }

    pub fn reset(&mut self) {
        self.rms = 0.0;
    }
}

/// Read side of the loudness signal. The audio graph is the only writer;
/// the sampling bridge is the only reader.
pub trait LevelSource {
    fn level(&self) -> f32;
}

impl<T: LevelSource + ?Sized> LevelSource for Arc<T> {
    fn level(&self) -> f32 {
        (**self).level()
    }
}

/// Lock-free f32 cell for handing the meter reading from a real-time audio
/// thread to the reader.
#[derive(Debug, Default)]
pub struct SharedLevel {
    bits: AtomicU32,
}

impl SharedLevel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

impl LevelSource for SharedLevel {
    fn level(&self) -> f32 {
        self.load()
    }
}
