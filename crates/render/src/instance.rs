use std::mem::size_of;
use std::rc::Rc;

use bytemuck::Pod;

use crate::buffer::GpuBuffer;
use crate::context::{BufferTarget, GraphicsContext, VertexAttribute};

/// Widest attribute a single slot can carry, in `f32` components.
pub const LANE_WIDTH: u32 = 4;

/// Split one per-instance element of `components` floats into attribute
/// slots of at most four components each.
///
/// Lane `i` lands at `start_slot + i`, is `min(4, components - 4 * i)` wide
/// and starts `16 * i` bytes into the element. Every lane advances once per
/// instance.
pub fn instance_attribute_lanes(start_slot: u32, components: u32, stride: u32) -> Vec<VertexAttribute> {
    let lanes = components.div_ceil(LANE_WIDTH);
    (0..lanes)
        .map(|i| VertexAttribute {
            location: start_slot + i,
            components: (components - LANE_WIDTH * i).min(LANE_WIDTH),
            stride,
            offset: LANE_WIDTH * 4 * i,
            divisor: 1,
        })
        .collect()
}

/// Per-instance vertex stream backed by its own [`GpuBuffer`].
///
/// `T` must consist only of `f32` components: a `Vec3` color is one
/// 3-wide slot, a `Mat4` transform spans four 4-wide slots.
pub struct InstanceAttributeBuffer<T: Pod> {
    buffer: GpuBuffer<T>,
    start_slot: u32,
}

impl<T: Pod> InstanceAttributeBuffer<T> {
    /// Scalar components per element.
    pub const COMPONENTS: u32 = (size_of::<T>() / 4) as u32;

    pub fn new(ctx: Rc<dyn GraphicsContext>, start_slot: u32) -> Self {
        const {
            assert!(
                size_of::<T>() > 0 && size_of::<T>() % 4 == 0,
                "instance attributes must be built from f32 components"
            )
        };
        Self {
            buffer: GpuBuffer::new(ctx, BufferTarget::Array),
            start_slot,
        }
    }

    pub fn resize(&mut self, len: usize) -> bool {
        self.buffer.resize(len)
    }

    pub fn write(&mut self, offset: usize, elements: &[T]) {
        self.buffer.write(offset, elements);
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn start_slot(&self) -> u32 {
        self.start_slot
    }

    /// Attribute slots this stream occupies.
    pub fn lanes(&self) -> Vec<VertexAttribute> {
        instance_attribute_lanes(self.start_slot, Self::COMPONENTS, GpuBuffer::<T>::STRIDE as u32)
    }

    /// Attach the stream to the bound vertex array. Binding an empty buffer
    /// is valid and yields an empty stream.
    pub fn bind(&self) {
        self.buffer.bind();
        let ctx = self.buffer.context();
        for lane in self.lanes() {
            ctx.vertex_attribute(&lane);
        }
    }

    pub fn buffer(&self) -> &GpuBuffer<T> {
        &self.buffer
    }
}
