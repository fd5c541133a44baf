use art_core::visual::OrthoCamera;
use art_core::Uniforms;

/// GPU mirror of `Uniforms` plus the camera matrix, laid out to match the
/// `Uniforms` struct in the bundled WGSL (96 bytes, 16-byte aligned).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UniformBlock {
    pub view_proj: [[f32; 4]; 4],
    pub resolution: [f32; 2],
    pub time: f32,
    pub meter: f32,
    pub mouse_x: f32,
    pub mouse_y: f32,
    pub _pad: [f32; 2],
}

impl UniformBlock {
    pub fn new(camera: &OrthoCamera, u: &Uniforms) -> Self {
        Self {
            view_proj: camera.projection_matrix().to_cols_array_2d(),
            resolution: u.resolution.to_array(),
            time: u.time,
            meter: u.meter,
            mouse_x: u.mouse_x,
            mouse_y: u.mouse_y,
            _pad: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use art_core::Resolution;

    #[test]
    fn block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<UniformBlock>(), 96);
        assert_eq!(std::mem::size_of::<UniformBlock>() % 16, 0);
    }

    #[test]
    fn block_copies_uniform_values() {
        let mut u = Uniforms::new(Resolution::new(800, 600));
        u.meter = 0.73;
        u.time = 4.5;
        let b = UniformBlock::new(&OrthoCamera::default(), &u);
        assert_eq!(b.resolution, [800.0, 600.0]);
        assert_eq!((b.time, b.meter), (4.5, 0.73));
        let bytes = bytemuck::bytes_of(&b);
        let meter = f32::from_le_bytes(bytes[76..80].try_into().unwrap());
        assert_eq!(meter, 0.73);
    }
}
