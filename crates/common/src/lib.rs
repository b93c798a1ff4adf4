//! Shared component and value types for the cubefield demo.
//!
//! One matrix type (`glam::Mat4`) is used everywhere: transforms, camera
//! matrices and GPU uploads all share the same column-major layout.

mod types;

pub use types::{CameraData, ColorRgb, FORWARD, LocalToWorld, Position, RIGHT, Rotation, UP};
