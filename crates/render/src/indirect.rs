use std::rc::Rc;

use bytemuck::{Pod, Zeroable};

use crate::buffer::GpuBuffer;
use crate::context::{BufferTarget, GraphicsContext};

/// Parameters of one indexed, instanced draw as laid out in device memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectCommand {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub base_instance: u32,
}

impl DrawIndirectCommand {
    /// Draw `index_count` indices from the start of the index buffer for
    /// `instance_count` instances.
    pub const fn instanced(index_count: u32, instance_count: u32) -> Self {
        Self {
            index_count,
            instance_count,
            first_index: 0,
            base_vertex: 0,
            base_instance: 0,
        }
    }
}

/// Device-resident draw descriptor.
///
/// The draw reads the descriptor when the device executes it, so
/// [`update`](Self::update) must be submitted before [`draw`](Self::draw).
pub struct DrawIndirectBuffer {
    buffer: GpuBuffer<DrawIndirectCommand>,
    command: Option<DrawIndirectCommand>,
}

impl DrawIndirectBuffer {
    pub fn new(ctx: Rc<dyn GraphicsContext>) -> Self {
        let mut buffer = GpuBuffer::new(ctx, BufferTarget::DrawIndirect);
        buffer.resize(1);
        Self {
            buffer,
            command: None,
        }
    }

    pub fn update(&mut self, command: DrawIndirectCommand) {
        self.buffer.write(0, &[command]);
        self.command = Some(command);
    }

    pub fn draw(&self) {
        debug_assert!(
            self.command.is_some(),
            "indirect draw issued before its descriptor was written"
        );
        self.buffer.bind();
        self.buffer.context().draw_elements_indirect(0);
    }

    /// Last descriptor written, if any.
    pub fn command(&self) -> Option<DrawIndirectCommand> {
        self.command
    }

    pub fn buffer(&self) -> &GpuBuffer<DrawIndirectCommand> {
        &self.buffer
    }
}
