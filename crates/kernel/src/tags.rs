use cubefield_ecs::Tags;

/// Entities drawn by the instanced cube renderer.
pub const CUBE: Tags = Tags::bit(0);
/// Cameras driven by the free-fly controller.
pub const FREE_CAM: Tags = Tags::bit(1);
