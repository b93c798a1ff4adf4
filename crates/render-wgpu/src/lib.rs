//! wgpu implementation of the cubefield [`GraphicsContext`].
//!
//! Buffer edits are applied to the queue immediately; draws are captured
//! and replayed in one render pass by [`WgpuContext::end_frame`].
//!
//! # Invariants
//! - A captured draw keeps the exact buffers that were bound when it was
//!   issued, even if they are reallocated later in the frame.
//! - Queue writes made during a frame land before that frame's pass runs.
//!
//! [`GraphicsContext`]: cubefield_render::GraphicsContext

mod context;
mod layout;

pub use context::{DEPTH_FORMAT, WgpuContext};
pub use layout::{StreamLayout, group_streams};
