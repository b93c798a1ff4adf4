use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use cubefield_render::{
    BufferId, BufferTarget, BufferUsage, FRAGMENT_ENTRY, GraphicsContext, ProgramId, ProgramSource,
    RenderError, ShaderStage, VERTEX_ENTRY, VertexArrayId, VertexAttribute,
};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::layout::{StreamLayout, group_streams};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const MAT4_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;

const BUFFER_USAGES: wgpu::BufferUsages = wgpu::BufferUsages::VERTEX
    .union(wgpu::BufferUsages::INDEX)
    .union(wgpu::BufferUsages::INDIRECT)
    .union(wgpu::BufferUsages::COPY_DST);

struct Allocation {
    buffer: Rc<wgpu::Buffer>,
    size: usize,
}

#[derive(Default)]
struct VertexArray {
    attributes: BTreeMap<u32, (VertexAttribute, BufferId)>,
    elements: Option<BufferId>,
}

struct Program {
    label: String,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    // One mat4 slot per name, in declaration order.
    uniforms: Vec<String>,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    layout: wgpu::PipelineLayout,
}

/// Everything a draw needs, captured when it is issued.
struct DrawCall {
    program: ProgramId,
    streams: Vec<(Rc<wgpu::Buffer>, StreamLayout)>,
    indices: Rc<wgpu::Buffer>,
    indirect: Rc<wgpu::Buffer>,
    indirect_offset: u64,
}

type PipelineKey = (ProgramId, Vec<StreamLayout>);

#[derive(Default)]
struct State {
    next_id: u32,
    buffers: HashMap<BufferId, Option<Allocation>>,
    bindings: HashMap<BufferTarget, BufferId>,
    vertex_arrays: HashMap<VertexArrayId, VertexArray>,
    bound_vertex_array: Option<VertexArrayId>,
    programs: HashMap<ProgramId, Rc<Program>>,
    current_program: Option<ProgramId>,
    draws: Vec<DrawCall>,
    pipelines: HashMap<PipelineKey, Rc<wgpu::RenderPipeline>>,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn bound(&self, target: BufferTarget) -> Option<BufferId> {
        if target == BufferTarget::ElementArray {
            if let Some(vao) = self.bound_vertex_array {
                return self.vertex_arrays.get(&vao).and_then(|state| state.elements);
            }
        }
        self.bindings.get(&target).copied()
    }

    fn allocation(&self, buffer: BufferId) -> Option<&Allocation> {
        self.buffers.get(&buffer).and_then(Option::as_ref)
    }

    fn device_buffer(&self, buffer: BufferId) -> Option<Rc<wgpu::Buffer>> {
        self.allocation(buffer).map(|allocation| allocation.buffer.clone())
    }

    fn capture_draw(&self, offset: usize) -> Option<DrawCall> {
        let program = self.current_program?;
        let vertex_array = self.vertex_arrays.get(&self.bound_vertex_array?)?;
        let table: Vec<_> = vertex_array.attributes.values().copied().collect();
        let streams = group_streams(&table)
            .into_iter()
            .map(|(id, layout)| Some((self.device_buffer(id)?, layout)))
            .collect::<Option<Vec<_>>>()?;
        Some(DrawCall {
            program,
            streams,
            indices: self.device_buffer(vertex_array.elements?)?,
            indirect: self.device_buffer(self.bound(BufferTarget::DrawIndirect)?)?,
            indirect_offset: offset as u64,
        })
    }
}

/// [`GraphicsContext`] over a wgpu device.
///
/// Draws issued between [`begin_frame`](Self::begin_frame) and
/// [`end_frame`](Self::end_frame) are replayed into one render pass with
/// depth testing. Uniform values are per program, so the last value set in
/// a frame is the one every draw of that program sees.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    uniform_layout: wgpu::BindGroupLayout,
    depth: RefCell<wgpu::TextureView>,
    clear: Cell<wgpu::Color>,
    state: RefCell<State>,
}

impl WgpuContext {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let depth = create_depth_texture(&device, width, height);

        Self {
            device,
            queue,
            surface_format,
            uniform_layout,
            depth: RefCell::new(depth),
            clear: Cell::new(wgpu::Color::BLACK),
            state: RefCell::new(State::default()),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Recreate the depth target for a new surface size.
    pub fn resize(&self, width: u32, height: u32) {
        *self.depth.borrow_mut() = create_depth_texture(&self.device, width, height);
    }

    /// Start capturing a frame that clears to `clear`.
    pub fn begin_frame(&self, clear: wgpu::Color) {
        self.clear.set(clear);
        self.state.borrow_mut().draws.clear();
    }

    /// Encode and submit every draw captured since
    /// [`begin_frame`](Self::begin_frame) into `target`.
    pub fn end_frame(&self, target: &wgpu::TextureView) -> Result<(), RenderError> {
        let draws = std::mem::take(&mut self.state.borrow_mut().draws);

        let mut prepared = Vec::with_capacity(draws.len());
        for draw in &draws {
            let program = self.state.borrow().programs.get(&draw.program).cloned();
            let Some(program) = program else {
                tracing::warn!(program = ?draw.program, "dropping draw for deleted program");
                continue;
            };
            let pipeline = self.pipeline(draw, &program)?;
            prepared.push((pipeline, program, draw));
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let depth = self.depth.borrow();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear.get()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            for (pipeline, program, draw) in &prepared {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &program.bind_group, &[]);
                for (slot, (buffer, _)) in draw.streams.iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                pass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed_indirect(&draw.indirect, draw.indirect_offset);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn pipeline(&self, draw: &DrawCall, program: &Program) -> Result<Rc<wgpu::RenderPipeline>, RenderError> {
        let layouts: Vec<StreamLayout> = draw.streams.iter().map(|(_, layout)| layout.clone()).collect();
        let key = (draw.program, layouts);
        if let Some(pipeline) = self.state.borrow().pipelines.get(&key) {
            return Ok(pipeline.clone());
        }

        let attributes: Vec<Vec<wgpu::VertexAttribute>> =
            key.1.iter().map(StreamLayout::wgpu_attributes).collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = key
            .1
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.stride as u64,
                step_mode: layout.step_mode(),
                attributes,
            })
            .collect();

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(program.label.as_str()),
                layout: Some(&program.layout),
                vertex: wgpu::VertexState {
                    module: &program.vertex,
                    entry_point: Some(VERTEX_ENTRY),
                    compilation_options: Default::default(),
                    buffers: &buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.fragment,
                    entry_point: Some(FRAGMENT_ENTRY),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.surface_format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
                cache: None,
            });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Pipeline {
                label: program.label.clone(),
                log: err.to_string(),
            });
        }

        tracing::debug!(label = %program.label, streams = key.1.len(), "render pipeline created");
        let pipeline = Rc::new(pipeline);
        self.state.borrow_mut().pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    fn compile(&self, label: &str, stage: ShaderStage, source: &str) -> Result<wgpu::ShaderModule, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(RenderError::ShaderCompile {
                label: label.to_string(),
                stage,
                log: err.to_string(),
            }),
            None => Ok(module),
        }
    }
}

impl GraphicsContext for WgpuContext {
    fn create_buffer(&self) -> BufferId {
        let mut state = self.state.borrow_mut();
        let id = BufferId(state.next_id());
        state.buffers.insert(id, None);
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

    fn buffer_data(&self, target: BufferTarget, size: usize, data: Option<&[u8]>, usage: BufferUsage) {
        let mut state = self.state.borrow_mut();
        let Some(id) = state.bound(target) else {
            panic!("no buffer bound to {target:?}");
        };
        let label = format!("{target:?}:{}", id.0);
        let buffer = match data {
            Some(contents) if !contents.is_empty() => {
                assert_eq!(contents.len(), size, "initial data does not match allocation size");
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label.as_str()),
                    contents,
                    usage: BUFFER_USAGES,
                })
            }
            _ => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label.as_str()),
                size: padded_size(size),
                usage: BUFFER_USAGES,
                mapped_at_creation: false,
            }),
        };
        tracing::trace!(buffer = id.0, size, ?usage, "buffer allocated");
        state.buffers.insert(
            id,
            Some(Allocation {
                buffer: Rc::new(buffer),
                size,
            }),
        );
    }

    fn buffer_sub_data(&self, target: BufferTarget, offset: usize, data: &[u8]) {
        let state = self.state.borrow();
        let Some(allocation) = state.bound(target).and_then(|id| state.allocation(id)) else {
            panic!("no allocated buffer bound to {target:?}");
        };
        let end = offset + data.len();
        assert!(
            end <= allocation.size,
            "sub-data range {offset}..{end} exceeds buffer of {} bytes",
            allocation.size
        );
        assert!(
            offset % 4 == 0 && data.len() % 4 == 0,
            "sub-data writes must be 4-byte aligned"
        );
        self.queue.write_buffer(&allocation.buffer, offset as u64, data);
    }

    fn create_vertex_array(&self) -> VertexArrayId {
        let mut state = self.state.borrow_mut();
        let id = VertexArrayId(state.next_id());
        state.vertex_arrays.insert(id, VertexArray::default());
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
        let (Some(source), Some(vao)) = (
            state.bindings.get(&BufferTarget::Array).copied(),
            state.bound_vertex_array,
        ) else {
            panic!(
                "vertex attribute {} needs a bound array buffer and vertex array",
                attribute.location
            );
        };
        if let Some(vertex_array) = state.vertex_arrays.get_mut(&vao) {
            vertex_array
                .attributes
                .insert(attribute.location, (*attribute, source));
        }
    }

    fn create_program(&self, source: &ProgramSource<'_>) -> Result<ProgramId, RenderError> {
        let vertex = self.compile(source.label, ShaderStage::Vertex, source.vertex)?;
        let fragment = self.compile(source.label, ShaderStage::Fragment, source.fragment)?;
        source.check_entry_points()?;

        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(source.label),
            size: MAT4_SIZE * source.uniforms.len().max(1) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(source.label),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(source.label),
            bind_group_layouts: &[&self.uniform_layout],
            push_constant_ranges: &[],
        });

        let mut state = self.state.borrow_mut();
        let id = ProgramId(state.next_id());
        state.programs.insert(
            id,
            Rc::new(Program {
                label: source.label.to_string(),
                vertex,
                fragment,
                uniforms: source.uniforms.iter().map(|name| name.to_string()).collect(),
                uniform_buffer,
                bind_group,
                layout,
            }),
        );
        tracing::info!(label = source.label, "shader program compiled");
        Ok(id)
    }

    fn delete_program(&self, program: ProgramId) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        state.pipelines.retain(|(owner, _), _| *owner != program);
        if state.current_program == Some(program) {
            state.current_program = None;
        }
    }

    fn use_program(&self, program: Option<ProgramId>) {
        self.state.borrow_mut().current_program = program;
    }

    fn set_uniform_mat4(&self, program: ProgramId, name: &str, value: &Mat4) {
        let state = self.state.borrow();
        let Some(target) = state.programs.get(&program) else {
            tracing::debug!(?program, "uniform set on unknown program");
            return;
        };
        match target.uniforms.iter().position(|declared| declared == name) {
            Some(slot) => self.queue.write_buffer(
                &target.uniform_buffer,
                slot as u64 * MAT4_SIZE,
                bytemuck::bytes_of(value),
            ),
            None => tracing::debug!(?program, uniform = name, "ignoring undeclared uniform"),
        }
    }

    fn draw_elements_indirect(&self, offset: usize) {
        let draw = self.state.borrow().capture_draw(offset);
        match draw {
            Some(draw) => self.state.borrow_mut().draws.push(draw),
            None => tracing::warn!("draw skipped: program, vertex array or buffers missing"),
        }
    }
}

/// Device buffers are at least 4 bytes and a multiple of 4.
fn padded_size(size: usize) -> u64 {
    (size as u64).div_ceil(4).max(1) * 4
}

fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_sizes() {
        assert_eq!(padded_size(0), 4);
        assert_eq!(padded_size(3), 4);
        assert_eq!(padded_size(20), 20);
        assert_eq!(padded_size(21), 24);
    }

    #[test]
    fn buffer_usages_cover_every_target() {
        assert!(BUFFER_USAGES.contains(wgpu::BufferUsages::INDIRECT));
        assert!(BUFFER_USAGES.contains(wgpu::BufferUsages::INDEX));
        assert!(BUFFER_USAGES.contains(wgpu::BufferUsages::VERTEX));
        assert!(BUFFER_USAGES.contains(wgpu::BufferUsages::COPY_DST));
    }
}
