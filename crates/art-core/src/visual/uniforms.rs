use crate::constants::{
    INITIAL_TIME, UNIFORM_METER, UNIFORM_MOUSE_X, UNIFORM_MOUSE_Y, UNIFORM_RESOLUTION,
    UNIFORM_TIME,
};
use crate::host::Resolution;
use glam::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
}

impl UniformValue {
    pub fn as_f32(self) -> Option<f32> {
        match self {
            UniformValue::Float(v) => Some(v),
            UniformValue::Vec2(_) => None,
        }
    }

    pub fn as_vec2(self) -> Option<Vec2> {
        match self {
            UniformValue::Vec2(v) => Some(v),
            UniformValue::Float(_) => None,
        }
    }
}

/// Current values fed to the shader program each frame.
///
/// Each field has exactly one writer: the frame loop owns `time`, the resize
/// listener owns `resolution`, the pointer listener owns `mouse_x`/`mouse_y`
/// and the loudness input owns `meter`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Uniforms {
    pub time: f32,
    pub resolution: Vec2,
    pub meter: f32,
    pub mouse_x: f32,
    pub mouse_y: f32,
}

impl Uniforms {
    pub const NAMES: [&'static str; 5] = [
        UNIFORM_TIME,
        UNIFORM_RESOLUTION,
        UNIFORM_METER,
        UNIFORM_MOUSE_X,
        UNIFORM_MOUSE_Y,
    ];

    pub fn new(resolution: Resolution) -> Self {
        Self {
            time: INITIAL_TIME,
            resolution: resolution.as_vec2(),
            meter: 0.0,
            mouse_x: 0.0,
            mouse_y: 0.0,
        }
    }

    /// Look a uniform up by the name the shader program uses.
    pub fn get(&self, name: &str) -> Option<UniformValue> {
        match name {
            UNIFORM_TIME => Some(UniformValue::Float(self.time)),
            UNIFORM_RESOLUTION => Some(UniformValue::Vec2(self.resolution)),
            UNIFORM_METER => Some(UniformValue::Float(self.meter)),
            UNIFORM_MOUSE_X => Some(UniformValue::Float(self.mouse_x)),
            UNIFORM_MOUSE_Y => Some(UniformValue::Float(self.mouse_y)),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, UniformValue)> + '_ {
        Self::NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }

    /// Pointer position in window pixels to roughly [-0.5, 0.5] per axis.
    pub fn set_pointer(&mut self, x: f32, y: f32, window: Resolution) {
        if window.width > 0 {
            self.mouse_x = x / window.width as f32 - 0.5;
        }
        if window.height > 0 {
            self.mouse_y = y / window.height as f32 - 0.5;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_is_centered_on_the_window() {
        let mut u = Uniforms::new(Resolution::new(800, 600));
        u.set_pointer(400.0, 150.0, Resolution::new(800, 600));
        assert_eq!(u.mouse_x, 0.0);
        assert_eq!(u.mouse_y, -0.25);
        u.set_pointer(10.0, 10.0, Resolution::new(0, 0));
        assert_eq!((u.mouse_x, u.mouse_y), (0.0, -0.25));
    }

    #[test]
    fn every_name_resolves() {
        let u = Uniforms::new(Resolution::new(4, 2));
        assert_eq!(u.iter().count(), 5);
        assert_eq!(
            u.get("resolution").and_then(UniformValue::as_vec2),
            Some(Vec2::new(4.0, 2.0))
        );
        assert_eq!(u.get("meter").and_then(UniformValue::as_f32), Some(0.0));
        assert!(u.get("colour").is_none());
    }
}
