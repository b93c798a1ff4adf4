use std::rc::Rc;

use glam::Vec3;

use crate::buffer::GpuBuffer;
use crate::context::{BufferTarget, GraphicsContext, VertexArrayId, VertexAttribute};

/// Attribute slot carrying per-vertex positions.
pub const POSITION_SLOT: u32 = 0;

/// Unit cube centred on the origin.
pub const CUBE_VERTICES: [Vec3; 8] = [
    Vec3::new(-0.5, -0.5, -0.5),
    Vec3::new(0.5, -0.5, -0.5),
    Vec3::new(0.5, 0.5, -0.5),
    Vec3::new(-0.5, 0.5, -0.5),
    Vec3::new(-0.5, -0.5, 0.5),
    Vec3::new(0.5, -0.5, 0.5),
    Vec3::new(0.5, 0.5, 0.5),
    Vec3::new(-0.5, 0.5, 0.5),
];

/// Triangle list over [`CUBE_VERTICES`]: back, front, left, right, top,
/// bottom.
pub const CUBE_INDICES: [u32; 36] = [
    0, 1, 2, 2, 3, 0, //
    4, 5, 6, 6, 7, 4, //
    0, 4, 7, 7, 3, 0, //
    1, 5, 6, 6, 2, 1, //
    3, 2, 6, 6, 7, 3, //
    0, 1, 5, 5, 4, 0,
];

/// Immutable indexed geometry plus the vertex array that describes it.
///
/// The vertex array also receives the per-instance streams bound after
/// [`bind`](Self::bind), so one mesh serves one instanced pipeline.
pub struct Mesh {
    ctx: Rc<dyn GraphicsContext>,
    vertex_array: VertexArrayId,
    vertices: GpuBuffer<Vec3>,
    indices: GpuBuffer<u32>,
}

impl Mesh {
    pub fn new(ctx: Rc<dyn GraphicsContext>, vertices: &[Vec3], indices: &[u32]) -> Self {
        let vertex_array = ctx.create_vertex_array();
        ctx.bind_vertex_array(Some(vertex_array));

        let vertex_buffer = GpuBuffer::with_contents(ctx.clone(), BufferTarget::Array, vertices);
        let index_buffer = GpuBuffer::with_contents(ctx.clone(), BufferTarget::ElementArray, indices);

        ctx.vertex_attribute(&VertexAttribute {
            location: POSITION_SLOT,
            components: 3,
            stride: GpuBuffer::<Vec3>::STRIDE as u32,
            offset: 0,
            divisor: 0,
        });
        ctx.bind_vertex_array(None);

        Self {
            ctx,
            vertex_array,
            vertices: vertex_buffer,
            indices: index_buffer,
        }
    }

    pub fn cube(ctx: Rc<dyn GraphicsContext>) -> Self {
        Self::new(ctx, &CUBE_VERTICES, &CUBE_INDICES)
    }

    pub fn bind(&self) {
        self.ctx.bind_vertex_array(Some(self.vertex_array));
    }

    pub fn unbind(&self) {
        self.ctx.bind_vertex_array(None);
    }

    pub fn index_count(&self) -> u32 {
        self.indices.capacity() as u32
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.capacity()
    }

    pub fn vertex_array(&self) -> VertexArrayId {
        self.vertex_array
    }
}

impl Drop for Mesh {
    fn drop(&mut self) {
        self.ctx.delete_vertex_array(self.vertex_array);
    }
}
