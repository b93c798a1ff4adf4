use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Local forward axis. An unrotated camera looks down +Z.
pub const FORWARD: Vec3 = Vec3::Z;
/// Local right axis.
pub const RIGHT: Vec3 = Vec3::X;
/// World up axis.
pub const UP: Vec3 = Vec3::Y;

/// Raw world-space position of an entity.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Position(pub Vec3);

impl Position {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

/// Orientation of an entity.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Rotation(pub Quat);

impl Default for Rotation {
    fn default() -> Self {
        Self(Quat::IDENTITY)
    }
}

/// Local-to-world matrix, recomputed every frame from position and rotation.
///
/// Uploaded verbatim as a per-instance attribute, so the layout must stay
/// a bare column-major `Mat4`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct LocalToWorld(pub Mat4);

impl LocalToWorld {
    pub fn translation(&self) -> Vec3 {
        self.0.w_axis.truncate()
    }
}

/// Linear RGB color, three floats per instance on the GPU.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct ColorRgb(pub Vec3);

impl ColorRgb {
    pub const RED: Self = Self(Vec3::X);
    pub const GREEN: Self = Self(Vec3::Y);
    pub const BLUE: Self = Self(Vec3::Z);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self(Vec3::new(r, g, b))
    }
}

/// Camera projection parameters and the matrices derived from them.
///
/// `projection` and `view` are written by the camera update each frame and
/// read by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraData {
    pub projection: Mat4,
    pub view: Mat4,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near_clip: f32,
    pub far_clip: f32,
    pub aspect_ratio: f32,
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            fov_degrees: 90.0,
            near_clip: 0.1,
            far_clip: 1000.0,
            aspect_ratio: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_element_sizes() {
        assert_eq!(std::mem::size_of::<ColorRgb>(), 12);
        assert_eq!(std::mem::size_of::<Position>(), 12);
        assert_eq!(std::mem::size_of::<LocalToWorld>(), 64);
    }

    #[test]
    fn local_to_world_default_is_identity() {
        assert_eq!(LocalToWorld::default().0, Mat4::IDENTITY);
        assert_eq!(Rotation::default().0, Quat::IDENTITY);
    }

    #[test]
    fn translation_reads_last_column() {
        let m = LocalToWorld(Mat4::from_translation(Vec3::new(1.25, 0.5, -2.0)));
        assert_eq!(m.translation(), Vec3::new(1.25, 0.5, -2.0));
    }

    #[test]
    fn color_bytes_are_packed_floats() {
        let colors = [ColorRgb::RED, ColorRgb::BLUE];
        let floats: &[f32] = bytemuck::cast_slice(&colors);
        assert_eq!(floats, &[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
    }
}
