//! Instanced rendering core.
//!
//! Owns the GPU side of drawing many copies of one mesh: buffer lifetime,
//! per-instance attribute streams, the static mesh and a device-resident
//! draw descriptor. Everything is written against [`GraphicsContext`], a
//! bind-to-edit API surface implemented by the wgpu backend and by the
//! in-memory [`RecordingContext`].
//!
//! # Invariants
//! - Every per-instance stream and the draw descriptor are sized for the
//!   same instance count before any instance data is written in a frame.
//! - All instance data is re-streamed every frame; nothing survives a
//!   resize.
//! - Resources are released when their wrapper is dropped.

mod buffer;
mod context;
mod error;
mod indirect;
mod instance;
mod mesh;
mod program;
mod recording;
mod renderer;
pub mod shaders;

pub use buffer::GpuBuffer;
pub use context::{
    BufferId, BufferTarget, BufferUsage, FRAGMENT_ENTRY, GraphicsContext, ProgramId, ProgramSource,
    VERTEX_ENTRY, VertexArrayId, VertexAttribute,
};
pub use error::{RenderError, ShaderStage};
pub use indirect::{DrawIndirectBuffer, DrawIndirectCommand};
pub use instance::{InstanceAttributeBuffer, LANE_WIDTH, instance_attribute_lanes};
pub use mesh::{CUBE_INDICES, CUBE_VERTICES, Mesh, POSITION_SLOT};
pub use program::ShaderProgram;
pub use recording::{DrawRecord, RecordingContext, UNINITIALISED};
pub use renderer::{
    COLOR_SLOT, CameraUniforms, FrameStats, InstanceChunk, InstanceQuery, InstancedRenderer,
    TRANSFORM_SLOT,
};
