//! In-memory [`GraphicsContext`] that records device state instead of
//! driving a GPU.
//!
//! Used by tests and the headless CLI. Buffer contents, attribute tables and
//! uniforms are kept exactly as a driver would see them, and every indirect
//! draw is captured together with the descriptor it read and the streams it
//! would have fetched from.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use glam::Mat4;

use crate::context::{
    BufferId, BufferTarget, BufferUsage, GraphicsContext, ProgramId, ProgramSource, VertexArrayId,
    VertexAttribute,
};
use crate::error::{RenderError, ShaderStage};
use crate::indirect::DrawIndirectCommand;

/// Fill pattern for freshly allocated, uninitialised storage.
pub const UNINITIALISED: u8 = 0xCD;

const INDEX_SIZE: usize = 4;

/// One captured indirect draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: Option<ProgramId>,
    pub vertex_array: Option<VertexArrayId>,
    /// Descriptor as read from the indirect buffer when the draw executed.
    pub command: DrawIndirectCommand,
    /// Attribute table of the bound vertex array, ordered by location.
    pub attributes: Vec<(VertexAttribute, BufferId)>,
    /// Locations of per-instance streams too small for `instance_count`.
    pub overruns: Vec<u32>,
    /// The index range reaches past the end of the element buffer.
    pub index_overrun: bool,
}

impl DrawRecord {
    pub fn is_in_bounds(&self) -> bool {
        self.overruns.is_empty() && !self.index_overrun
    }
}

#[derive(Debug, Default)]
struct BufferState {
    bytes: Vec<u8>,
    allocations: usize,
}

#[derive(Debug, Default)]
struct VertexArrayState {
    attributes: BTreeMap<u32, (VertexAttribute, BufferId)>,
    elements: Option<BufferId>,
}

#[derive(Debug)]
struct ProgramState {
    label: String,
    uniforms: HashMap<String, Option<Mat4>>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    buffers: HashMap<BufferId, BufferState>,
    bindings: HashMap<BufferTarget, BufferId>,
    vertex_arrays: HashMap<VertexArrayId, VertexArrayState>,
    bound_vertex_array: Option<VertexArrayId>,
    programs: HashMap<ProgramId, ProgramState>,
    current_program: Option<ProgramId>,
    draws: Vec<DrawRecord>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Buffer bound to `target`. The element binding belongs to the bound
    /// vertex array when there is one.
    fn bound(&self, target: BufferTarget) -> Option<BufferId> {
        if target == BufferTarget::ElementArray {
            if let Some(vao) = self.bound_vertex_array {
                return self.vertex_arrays.get(&vao).and_then(|state| state.elements);
            }
        }
        self.bindings.get(&target).copied()
    }

    fn bound_buffer_mut(&mut self, target: BufferTarget) -> &mut BufferState {
        let Some(id) = self.bound(target) else {
            panic!("no buffer bound to {target:?}");
        };
        match self.buffers.get_mut(&id) {
            Some(buffer) => buffer,
            None => panic!("buffer {id:?} bound to {target:?} was deleted"),
        }
    }

    fn buffer_len(&self, id: BufferId) -> usize {
        self.buffers.get(&id).map_or(0, |buffer| buffer.bytes.len())
    }
}

/// Software graphics context. Not `Sync`; share it through `Rc`.
#[derive(Debug, Default)]
pub struct RecordingContext {
    state: RefCell<State>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_bytes(&self, buffer: BufferId) -> Option<Vec<u8>> {
        self.state
            .borrow()
            .buffers
            .get(&buffer)
            .map(|state| state.bytes.clone())
    }

    pub fn buffer_size(&self, buffer: BufferId) -> Option<usize> {
        self.state
            .borrow()
            .buffers
            .get(&buffer)
            .map(|state| state.bytes.len())
    }

    /// Number of `buffer_data` calls the buffer has seen.
    pub fn allocation_count(&self, buffer: BufferId) -> usize {
        self.state
            .borrow()
            .buffers
            .get(&buffer)
            .map_or(0, |state| state.allocations)
    }

    pub fn live_buffers(&self) -> usize {
        self.state.borrow().buffers.len()
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> Option<BufferId> {
        self.state.borrow().bound(target)
    }

    pub fn bound_vertex_array(&self) -> Option<VertexArrayId> {
        self.state.borrow().bound_vertex_array
    }

    /// Attribute table of `vertex_array`, ordered by location, with the
    /// buffer each slot sources from.
    pub fn attributes(&self, vertex_array: VertexArrayId) -> Vec<(VertexAttribute, BufferId)> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .map(|state| state.attributes.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn vertex_array_elements(&self, vertex_array: VertexArrayId) -> Option<BufferId> {
        self.state
            .borrow()
            .vertex_arrays
            .get(&vertex_array)
            .and_then(|state| state.elements)
    }

    pub fn current_program(&self) -> Option<ProgramId> {
        self.state.borrow().current_program
    }

    pub fn program_label(&self, program: ProgramId) -> Option<String> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|state| state.label.clone())
    }

    /// Last value set for a declared uniform.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<Mat4> {
        self.state
            .borrow()
            .programs
            .get(&program)
            .and_then(|state| state.uniforms.get(name).copied().flatten())
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.state.borrow().draws.clone()
    }

    pub fn last_draw(&self) -> Option<DrawRecord> {
        self.state.borrow().draws.last().cloned()
    }

    pub fn clear_draws(&self) {
        self.state.borrow_mut().draws.clear();
    }
}

impl GraphicsContext for RecordingContext {
    fn create_buffer(&self) -> BufferId {
        let mut state = self.state.borrow_mut();
        let id = BufferId(state.next_id());
        state.buffers.insert(id, BufferState::default());
        id
    }

    fn delete_buffer(&self, buffer: BufferId) {
        let mut state = self.state.borrow_mut();
        state.buffers.remove(&buffer);
        state.bindings.retain(|_, bound| *bound != buffer);
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<BufferId>) {
        let mut state = self.state.borrow_mut();
        if target == BufferTarget::ElementArray {
            if let Some(vao) = state.bound_vertex_array {
                if let Some(vertex_array) = state.vertex_arrays.get_mut(&vao) {
                    vertex_array.elements = buffer;
                }
                return;
            }
        }
        match buffer {
            Some(id) => state.bindings.insert(target, id),
            None => state.bindings.remove(&target),
        };
    }

    fn buffer_data(&self, target: BufferTarget, size: usize, data: Option<&[u8]>, _usage: BufferUsage) {
        let mut state = self.state.borrow_mut();
        let buffer = state.bound_buffer_mut(target);
        buffer.bytes = match data {
            Some(bytes) => {
                assert_eq!(bytes.len(), size, "initial data does not match allocation size");
                bytes.to_vec()
            }
            None => vec![UNINITIALISED; size],
        };
        buffer.allocations += 1;
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        let buffer = state.bound_buffer_mut(target);
        let end = offset + data.len();
        assert!(
            end <= buffer.bytes.len(),
            "sub-data range {offset}..{end} exceeds buffer of {} bytes",
            buffer.bytes.len()
        );
        buffer.bytes[offset..end].copy_from_slice(data);
    }

    fn create_vertex_array(&self) -> VertexArrayId {
        let mut state = self.state.borrow_mut();
        let id = VertexArrayId(state.next_id());
        state.vertex_arrays.insert(id, VertexArrayState::default());
        id
    }

    fn delete_vertex_array(&self, vertex_array: VertexArrayId) {
        let mut state = self.state.borrow_mut();
        state.vertex_arrays.remove(&vertex_array);
        if state.bound_vertex_array == Some(vertex_array) {
            state.bound_vertex_array = None;
        }
    }

    fn bind_vertex_array(&self, vertex_array: Option<VertexArrayId>) {
        self.state.borrow_mut().bound_vertex_array = vertex_array;
    }

    fn vertex_attribute(&self, attribute: &VertexAttribute) {
        let mut state = self.state.borrow_mut();
        let Some(source) = state.bindings.get(&BufferTarget::Array).copied() else {
            panic!("vertex attribute {} set with no array buffer bound", attribute.location);
        };
        let Some(vao) = state.bound_vertex_array else {
            panic!("vertex attribute {} set with no vertex array bound", attribute.location);
        };
        if let Some(vertex_array) = state.vertex_arrays.get_mut(&vao) {
            vertex_array
                .attributes
                .insert(attribute.location, (*attribute, source));
        }
    }

    fn create_program(&self, source: &ProgramSource<'_>) -> Result<ProgramId, RenderError> {
        for (stage, text) in [
            (ShaderStage::Vertex, source.vertex),
            (ShaderStage::Fragment, source.fragment),
        ] {
            if text.trim().is_empty() {
                return Err(RenderError::ShaderCompile {
                    label: source.label.to_string(),
                    stage,
                    log: "empty shader source".to_string(),
                });
            }
        }
        source.check_entry_points()?;

        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next_id());
        state.programs.insert(
            id,
            ProgramState {
                label: source.label.to_string(),
                uniforms: source.uniforms.iter().map(|name| (name.to_string(), None)).collect(),
            },
        );
        Ok(id)
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        self.state.borrow_mut().current_program = program;
    }

    fn set_uniform_mat4(&self, program: ProgramId, name: &str, value: &Mat4) {
        let mut state = self.state.borrow_mut();
        match state
            .programs
            .get_mut(&program)
            .and_then(|declared| declared.uniforms.get_mut(name))
        {
            Some(slot) => *slot = Some(*value),
            None => tracing::debug!(?program, uniform = name, "ignoring undeclared uniform"),
        }
    }

    fn draw_elements_indirect(&self, offset: usize) {
        let mut state = self.state.borrow_mut();
        let Some(indirect) = state.bound(BufferTarget::DrawIndirect) else {
            panic!("indirect draw with no draw-indirect buffer bound");
        };
        let size = std::mem::size_of::<DrawIndirectCommand>();
        let command = state
            .buffers
            .get(&indirect)
            .and_then(|buffer| buffer.bytes.get(offset..offset + size))
            .map(bytemuck::pod_read_unaligned::<DrawIndirectCommand>);
        let Some(command) = command else {
            panic!("indirect descriptor at {offset} lies outside buffer {indirect:?}");
        };

        let program = state.current_program;
        let vertex_array = state.bound_vertex_array;
        let (attributes, elements) = vertex_array
            .and_then(|vao| state.vertex_arrays.get(&vao))
            .map(|vao| (vao.attributes.values().copied().collect::<Vec<_>>(), vao.elements))
            .unwrap_or_default();

        let overruns = attributes
            .iter()
            .filter(|(attribute, _)| attribute.divisor > 0 && command.instance_count > 0)
            .filter(|(attribute, buffer)| {
                let last = (command.instance_count as usize - 1) / attribute.divisor as usize;
                let required = last * attribute.stride as usize
                    + attribute.offset as usize
                    + attribute.components as usize * 4;
                state.buffer_len(*buffer) < required
            })
            .map(|(attribute, _)| attribute.location)
            .collect();
        let index_end = (command.first_index as usize + command.index_count as usize) * INDEX_SIZE;
        let index_overrun =
            command.index_count > 0 && elements.is_none_or(|id| state.buffer_len(id) < index_end);

        state.draws.push(DrawRecord {
            program,
            vertex_array,
            command,
            attributes,
            overruns,
            index_overrun,
        });
    }
}
