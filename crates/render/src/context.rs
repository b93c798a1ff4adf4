//! The low-level graphics API surface the rendering core is written against.
//!
//! The shape follows classic bind-to-edit GPU APIs: buffers are created as
//! bare handles, bound to a target, then (re)allocated or partially updated
//! through that target. Vertex-attribute configuration is captured by the
//! bound vertex array. Everything runs on the one thread that owns the
//! context, which is why methods take `&self` and wrappers share the context
//! through `Rc`.

use glam::Mat4;

use crate::error::RenderError;

/// Opaque device buffer handle. Zero is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Opaque vertex array (attribute layout + index buffer binding) handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexArrayId(pub u32);

/// Opaque linked shader program handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Binding point a buffer is attached to for editing or drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    /// Vertex and per-instance attribute data.
    Array,
    /// Index data. The binding is stored in the bound vertex array.
    ElementArray,
    /// Draw descriptors consumed by indirect draws.
    DrawIndirect,
}

/// Allocation hint passed with every (re)allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Uploaded once, drawn many times.
    StaticDraw,
    /// Rewritten every frame.
    DynamicDraw,
}

/// One vertex-attribute slot sourced from the currently bound array buffer.
///
/// All attributes are 32-bit floats. `divisor` 0 advances per vertex; 1
/// advances once per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub stride: u32,
    pub offset: u32,
    pub divisor: u32,
}

/// Name of the vertex stage entry point every program must define.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Name of the fragment stage entry point every program must define.
pub const FRAGMENT_ENTRY: &str = "fs_main";

/// Source text for a two-stage program.
///
/// `uniforms` lists the `mat4` uniforms in declaration order; backends that
/// pack uniforms into a block lay them out in this order.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource<'a> {
    pub label: &'a str,
    pub vertex: &'a str,
    pub fragment: &'a str,
    pub uniforms: &'a [&'a str],
}

impl ProgramSource<'_> {
    /// Link-time check shared by backends: each stage must declare its entry
    /// point as a function outside line comments.
    ///
    /// This only covers entry points. On wgpu, a mismatch between the vertex
    /// outputs and the fragment inputs is caught when the pipeline is built
    /// for the first draw and reported as [`RenderError::Pipeline`].
    pub fn check_entry_points(&self) -> Result<(), RenderError> {
        for (source, entry) in [(self.vertex, VERTEX_ENTRY), (self.fragment, FRAGMENT_ENTRY)] {
            if !declares_function(source, entry) {
                return Err(RenderError::ProgramLink {
                    label: self.label.to_string(),
                    log: format!("entry point `{entry}` not found"),
                });
            }
        }
        Ok(())
    }
}

fn declares_function(source: &str, name: &str) -> bool {
    source
        .lines()
        .map(|line| line.split("//").next().unwrap_or_default())
        .any(|line| {
            let tokens: Vec<&str> = line
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .filter(|token| !token.is_empty())
                .collect();
            tokens.windows(2).any(|pair| pair[0] == "fn" && pair[1] == name)
        })
}

/// Low-level graphics API. Implementations must only be driven from the
/// thread that created them.
pub trait GraphicsContext {
    fn create_buffer(&self) -> BufferId;

    /// Free a buffer. Any binding point holding it becomes unbound.
    fn delete_buffer(&self, buffer: BufferId);

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>);

    /// (Re)allocate the buffer bound to `target` with exactly `size` bytes.
    /// Contents are undefined unless `data` is given.
    fn buffer_data(&self, target: BufferTarget, size: usize, data: Option<&[u8]>, usage: BufferUsage);

    /// Overwrite `data.len()` bytes at `offset` in the buffer bound to
    /// `target` without reallocating.
    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]);

    fn create_vertex_array(&self) -> VertexArrayId;

    fn delete_vertex_array(&self, vertex_array: VertexArrayId);

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayId>);

    /// Describe one attribute slot of the bound vertex array, sourced from
    /// the buffer currently bound to [`BufferTarget::Array`].
    fn vertex_attribute(&self, attribute: &VertexAttribute);

    fn create_program(&self, source: &ProgramSource<'_>) -> Result<ProgramId, RenderError>;

    fn delete_program(&self, program: ProgramId);

    fn use_program(&self, program: Option<ProgramId>);

    /// Set a `mat4` uniform. Names the program does not declare are ignored.
    fn set_uniform_mat4(&self, program: ProgramId, name: &str, value: &Mat4);

    /// Indexed, instanced triangle-list draw with `u32` indices. Parameters
    /// are read from the buffer bound to [`BufferTarget::DrawIndirect`] at
    /// `offset` when the command executes.
    fn draw_elements_indirect(&self, offset: usize);
}
