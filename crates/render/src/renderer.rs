use std::rc::Rc;

use cubefield_common::{CameraData, ColorRgb, LocalToWorld};
use cubefield_ecs::Query;
use glam::Mat4;

use crate::context::GraphicsContext;
use crate::error::RenderError;
use crate::indirect::{DrawIndirectBuffer, DrawIndirectCommand};
use crate::instance::InstanceAttributeBuffer;
use crate::mesh::Mesh;
use crate::program::ShaderProgram;
use crate::shaders;

/// First attribute slot of the per-instance color stream.
pub const COLOR_SLOT: u32 = 1;
/// First attribute slot of the per-instance transform stream (spans four).
pub const TRANSFORM_SLOT: u32 = 2;

/// One contiguous batch of instance data. Both slices have the same length.
#[derive(Debug, Clone, Copy)]
pub struct InstanceChunk<'a> {
    pub transforms: &'a [LocalToWorld],
    pub colors: &'a [ColorRgb],
}

impl InstanceChunk<'_> {
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Source of the instances drawn in one frame.
///
/// `count` must be cheap and must equal the summed length of `chunks`.
/// Chunk order has to be stable for the duration of a frame.
pub trait InstanceQuery {
    fn count(&self) -> usize;

    fn chunks(&self) -> impl Iterator<Item = InstanceChunk<'_>>;
}

impl InstanceQuery for Query<'_, LocalToWorld, ColorRgb> {
    fn count(&self) -> usize {
        Query::count(self)
    }

    fn chunks(&self) -> impl Iterator<Item = InstanceChunk<'_>> {
        Query::chunks(self).map(|chunk| InstanceChunk {
            transforms: chunk.first(),
            colors: chunk.second(),
        })
    }
}

/// Camera matrices fed to the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraUniforms {
    pub projection: Mat4,
    pub view: Mat4,
}

impl Default for CameraUniforms {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
        }
    }
}

impl From<&CameraData> for CameraUniforms {
    fn from(camera: &CameraData) -> Self {
        Self {
            projection: camera.projection,
            view: camera.view,
        }
    }
}

/// What one [`InstancedRenderer::draw`] call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub instance_count: usize,
    /// Instance buffers were reallocated this frame.
    pub resized: bool,
    pub chunks_streamed: usize,
}

/// Draws every instance of a query as a cube with a single indirect call.
///
/// Per frame, strictly in this order: size the instance streams and the
/// draw descriptor to the current count, re-stream all instance data,
/// bind camera uniforms, bind geometry and streams, draw.
pub struct InstancedRenderer {
    program: ShaderProgram,
    mesh: Mesh,
    colors: InstanceAttributeBuffer<ColorRgb>,
    transforms: InstanceAttributeBuffer<LocalToWorld>,
    draw_buffer: DrawIndirectBuffer,
    // Empty until the first frame so the descriptor is always written once.
    instance_count: Option<usize>,
}

impl InstancedRenderer {
    pub fn new(ctx: Rc<dyn GraphicsContext>) -> Result<Self, RenderError> {
        let program = ShaderProgram::new(ctx.clone(), &shaders::INSTANCED_CUBE)?;
        let renderer = Self {
            program,
            mesh: Mesh::cube(ctx.clone()),
            colors: InstanceAttributeBuffer::new(ctx.clone(), COLOR_SLOT),
            transforms: InstanceAttributeBuffer::new(ctx.clone(), TRANSFORM_SLOT),
            draw_buffer: DrawIndirectBuffer::new(ctx),
            instance_count: None,
        };
        tracing::info!(
            indices = renderer.mesh.index_count(),
            "instanced cube renderer ready"
        );
        Ok(renderer)
    }

    pub fn draw(&mut self, query: &impl InstanceQuery, camera: &CameraUniforms) -> FrameStats {
        let _span = tracing::debug_span!("instanced_draw").entered();

        let count = query.count();
        let resized = self.resize_if_needed(count);

        let mut offset = 0;
        let mut chunks_streamed = 0;
        for chunk in query.chunks() {
            assert_eq!(
                chunk.transforms.len(),
                chunk.colors.len(),
                "chunk {chunks_streamed} has {} transforms but {} colors",
                chunk.transforms.len(),
                chunk.colors.len()
            );
            self.transforms.write(offset, chunk.transforms);
            self.colors.write(offset, chunk.colors);
            offset += chunk.len();
            chunks_streamed += 1;
        }
        assert_eq!(
            offset, count,
            "streamed {offset} instances but the query reported {count}"
        );

        self.program.use_program();
        self.program.set_uniform_mat4("projection", &camera.projection);
        self.program.set_uniform_mat4("view", &camera.view);

        self.mesh.bind();
        self.colors.bind();
        self.transforms.bind();

        self.draw_buffer.draw();
        self.mesh.unbind();

        FrameStats {
            instance_count: count,
            resized,
            chunks_streamed,
        }
    }

    fn resize_if_needed(&mut self, count: usize) -> bool {
        if self.instance_count == Some(count) {
            return false;
        }
        let Ok(instance_count) = u32::try_from(count) else {
            panic!("{count} instances do not fit the indirect draw descriptor");
        };
        self.transforms.resize(count);
        self.colors.resize(count);
        self.draw_buffer.update(DrawIndirectCommand::instanced(
            self.mesh.index_count(),
            instance_count,
        ));
        tracing::debug!(
            from = ?self.instance_count,
            to = count,
            "resized instance buffers"
        );
        self.instance_count = Some(count);
        true
    }

    /// Instance count the buffers are currently sized for.
    pub fn instance_count(&self) -> Option<usize> {
        self.instance_count
    }

    pub fn draw_command(&self) -> Option<DrawIndirectCommand> {
        self.draw_buffer.command()
    }

    pub fn colors(&self) -> &InstanceAttributeBuffer<ColorRgb> {
        &self.colors
    }

    pub fn transforms(&self) -> &InstanceAttributeBuffer<LocalToWorld> {
        &self.transforms
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingContext;
    use glam::Vec3;

    /// Instances held in plain vectors and handed out in fixed-size chunks.
    struct VecQuery {
        transforms: Vec<LocalToWorld>,
        colors: Vec<ColorRgb>,
        chunk_lengths: Vec<usize>,
    }

    impl VecQuery {
        fn new(instances: &[(Vec3, ColorRgb)], chunk_lengths: &[usize]) -> Self {
            assert_eq!(chunk_lengths.iter().sum::<usize>(), instances.len());
            Self {
                transforms: instances
                    .iter()
                    .map(|(position, _)| LocalToWorld(Mat4::from_translation(*position)))
                    .collect(),
                colors: instances.iter().map(|(_, color)| *color).collect(),
                chunk_lengths: chunk_lengths.to_vec(),
            }
        }

        fn grid(count: usize, chunk: usize) -> Self {
            let instances: Vec<_> = (0..count)
                .map(|i| (Vec3::new(i as f32, 0.0, 0.0), ColorRgb::new(i as f32, 1.0, 0.5)))
                .collect();
            let mut lengths = vec![chunk; count / chunk];
            if count % chunk != 0 {
                lengths.push(count % chunk);
            }
            Self::new(&instances, &lengths)
        }
    }

    impl InstanceQuery for VecQuery {
        fn count(&self) -> usize {
            self.transforms.len()
        }

        fn chunks(&self) -> impl Iterator<Item = InstanceChunk<'_>> {
            let mut start = 0;
            self.chunk_lengths.iter().map(move |&len| {
                let range = start..start + len;
                start += len;
                InstanceChunk {
                    transforms: &self.transforms[range.clone()],
                    colors: &self.colors[range],
                }
            })
        }
    }

    fn setup() -> (Rc<RecordingContext>, InstancedRenderer) {
        let rec = Rc::new(RecordingContext::new());
        let renderer = InstancedRenderer::new(rec.clone()).unwrap();
        (rec, renderer)
    }

    fn scenario_b() -> VecQuery {
        VecQuery::new(
            &[
                (Vec3::new(-1.25, 0.0, 0.0), ColorRgb::RED),
                (Vec3::new(0.0, 0.25, 0.0), ColorRgb::GREEN),
                (Vec3::new(1.25, 0.5, 0.0), ColorRgb::BLUE),
            ],
            &[3],
        )
    }

    #[test]
    fn capacity_and_descriptor_track_instance_count() {
        for count in [0, 1, 2, 7, 64] {
            let (rec, mut renderer) = setup();
            let stats = renderer.draw(&VecQuery::grid(count, 5), &CameraUniforms::default());

            assert_eq!(stats.instance_count, count);
            assert_eq!(renderer.colors().capacity(), count);
            assert_eq!(renderer.transforms().capacity(), count);
            assert_eq!(rec.buffer_size(renderer.colors().buffer().id()), Some(count * 12));
            assert_eq!(rec.buffer_size(renderer.transforms().buffer().id()), Some(count * 64));

            let draw = rec.last_draw().unwrap();
            assert_eq!(draw.command.instance_count as usize, count);
            assert_eq!(draw.command.index_count, 36);
            assert!(draw.is_in_bounds());
        }
    }

    #[test]
    fn chunks_are_concatenated_in_order() {
        let (rec, mut renderer) = setup();
        let query = VecQuery::grid(10, 3);
        let stats = renderer.draw(&query, &CameraUniforms::default());
        assert_eq!(stats.chunks_streamed, 4);

        let colors = rec.buffer_bytes(renderer.colors().buffer().id()).unwrap();
        assert_eq!(colors, bytemuck::cast_slice::<ColorRgb, u8>(&query.colors));
        let transforms = rec.buffer_bytes(renderer.transforms().buffer().id()).unwrap();
        assert_eq!(transforms, bytemuck::cast_slice::<LocalToWorld, u8>(&query.transforms));
    }

    #[test]
    fn stable_count_does_not_reallocate() {
        let (rec, mut renderer) = setup();
        let query = scenario_b();
        let first = renderer.draw(&query, &CameraUniforms::default());
        let allocations = rec.allocation_count(renderer.colors().buffer().id());
        let second = renderer.draw(&query, &CameraUniforms::default());

        assert!(first.resized);
        assert!(!second.resized);
        assert_eq!(rec.allocation_count(renderer.colors().buffer().id()), allocations);
        assert_eq!(rec.draws().len(), 2);
    }

    #[test]
    fn empty_scene_draws_nothing() {
        let (rec, mut renderer) = setup();
        let stats = renderer.draw(&VecQuery::new(&[], &[]), &CameraUniforms::default());

        assert!(stats.resized);
        assert_eq!(stats.chunks_streamed, 0);
        assert_eq!(
            renderer.draw_command(),
            Some(DrawIndirectCommand::instanced(36, 0))
        );
        let draw = rec.last_draw().unwrap();
        assert_eq!(draw.command.instance_count, 0);
        assert!(draw.is_in_bounds());
    }

    #[test]
    fn three_cubes_in_one_chunk() {
        let (rec, mut renderer) = setup();
        renderer.draw(&scenario_b(), &CameraUniforms::default());

        let colors = rec.buffer_bytes(renderer.colors().buffer().id()).unwrap();
        let colors: &[[f32; 3]] = bytemuck::cast_slice(&colors);
        assert_eq!(colors, &[[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

        let transforms = rec.buffer_bytes(renderer.transforms().buffer().id()).unwrap();
        let transforms: &[Mat4] = bytemuck::cast_slice(&transforms);
        let positions: Vec<Vec3> = transforms.iter().map(|m| m.w_axis.truncate()).collect();
        assert_eq!(
            positions,
            vec![
                Vec3::new(-1.25, 0.0, 0.0),
                Vec3::new(0.0, 0.25, 0.0),
                Vec3::new(1.25, 0.5, 0.0)
            ]
        );
        assert_eq!(rec.last_draw().unwrap().command.instance_count, 3);
    }

    #[test]
    fn growth_reallocates_before_streaming() {
        let (rec, mut renderer) = setup();
        renderer.draw(&scenario_b(), &CameraUniforms::default());
        let grown = VecQuery::grid(5, 2);
        let stats = renderer.draw(&grown, &CameraUniforms::default());

        assert!(stats.resized);
        assert_eq!(renderer.colors().capacity(), 5);
        let colors = rec.buffer_bytes(renderer.colors().buffer().id()).unwrap();
        assert_eq!(colors, bytemuck::cast_slice::<ColorRgb, u8>(&grown.colors));
        assert!(!colors.contains(&crate::recording::UNINITIALISED));

        let draw = rec.last_draw().unwrap();
        assert_eq!(draw.command.instance_count, 5);
        assert!(draw.is_in_bounds());
    }

    #[test]
    fn transform_stream_occupies_slots_two_to_five() {
        let (rec, mut renderer) = setup();
        renderer.draw(&scenario_b(), &CameraUniforms::default());

        let draw = rec.last_draw().unwrap();
        let transform_id = renderer.transforms().buffer().id();
        let lanes: Vec<_> = draw
            .attributes
            .iter()
            .filter(|(_, buffer)| *buffer == transform_id)
            .map(|(attribute, _)| (attribute.location, attribute.components, attribute.offset))
            .collect();
        assert_eq!(lanes, vec![(2, 4, 0), (3, 4, 16), (4, 4, 32), (5, 4, 48)]);

        let locations: Vec<_> = draw.attributes.iter().map(|(a, _)| a.location).collect();
        assert_eq!(locations, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn camera_uniforms_reach_the_program() {
        let (rec, mut renderer) = setup();
        let camera = CameraUniforms {
            projection: Mat4::perspective_lh(1.0, 1.5, 0.1, 100.0),
            view: Mat4::from_translation(Vec3::new(0.0, 0.0, 3.0)),
        };
        renderer.draw(&scenario_b(), &camera);

        let program = renderer.program().id();
        assert_eq!(rec.uniform(program, "projection"), Some(camera.projection));
        assert_eq!(rec.uniform(program, "view"), Some(camera.view));
        assert_eq!(rec.last_draw().unwrap().program, Some(program));
    }

    #[test]
    #[should_panic(expected = "query reported")]
    fn diverging_count_is_a_programming_error() {
        struct Lying(VecQuery);
        impl InstanceQuery for Lying {
            fn count(&self) -> usize {
                self.0.count() + 1
            }
            fn chunks(&self) -> impl Iterator<Item = InstanceChunk<'_>> {
                self.0.chunks()
            }
        }

        let (_rec, mut renderer) = setup();
        renderer.draw(&Lying(scenario_b()), &CameraUniforms::default());
    }

    #[test]
    #[should_panic(expected = "transforms but")]
    fn unequal_chunk_columns_are_a_programming_error() {
        struct Ragged(VecQuery);
        impl InstanceQuery for Ragged {
            fn count(&self) -> usize {
                self.0.count()
            }
            fn chunks(&self) -> impl Iterator<Item = InstanceChunk<'_>> {
                std::iter::once(InstanceChunk {
                    transforms: &self.0.transforms[..],
                    colors: &self.0.colors[..1],
                })
            }
        }
        let (_rec, mut renderer) = setup();
        renderer.draw(&Ragged(scenario_b()), &CameraUniforms::default());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    #[should_panic(expected = "do not fit the indirect draw descriptor")]
    fn instance_count_beyond_u32_is_rejected_before_resizing() {
        struct Huge;
        impl InstanceQuery for Huge {
            fn count(&self) -> usize {
                u32::MAX as usize + 1
            }
            fn chunks(&self) -> impl Iterator<Item = InstanceChunk<'_>> {
                std::iter::empty()
            }
        }
        let (_rec, mut renderer) = setup();
        renderer.draw(&Huge, &CameraUniforms::default());
    }

    #[test]
    fn shader_failure_aborts_construction() {
        struct BrokenCompiler(RecordingContext);
        impl GraphicsContext for BrokenCompiler {
            fn create_buffer(&self) -> crate::context::BufferId {
                self.0.create_buffer()
            }
            fn delete_buffer(&self, buffer: crate::context::BufferId) {
                self.0.delete_buffer(buffer)
            }
            fn bind_buffer(&self, target: crate::context::BufferTarget, buffer: Option<crate::context::BufferId>) {
                self.0.bind_buffer(target, buffer)
            }
            fn buffer_data(
                &self,
                target: crate::context::BufferTarget,
                size: usize,
                data: Option<&[u8]>,
                usage: crate::context::BufferUsage,
            ) {
                self.0.buffer_data(target, size, data, usage)
            }
            fn buffer_sub_data(&self, target: crate::context::BufferTarget, offset: usize, data: &[u8]) {
                self.0.buffer_sub_data(target, offset, data)
            }
            fn create_vertex_array(&self) -> crate::context::VertexArrayId {
                self.0.create_vertex_array()
            }
            fn delete_vertex_array(&self, vertex_array: crate::context::VertexArrayId) {
                self.0.delete_vertex_array(vertex_array)
            }
            fn bind_vertex_array(&self, vertex_array: Option<crate::context::VertexArrayId>) {
                self.0.bind_vertex_array(vertex_array)
            }
            fn vertex_attribute(&self, attribute: &crate::context::VertexAttribute) {
                self.0.vertex_attribute(attribute)
            }
            fn create_program(
                &self,
                source: &crate::context::ProgramSource<'_>,
            ) -> Result<crate::context::ProgramId, RenderError> {
                Err(RenderError::ShaderCompile {
                    label: source.label.to_string(),
                    stage: crate::error::ShaderStage::Vertex,
                    log: "0:12: syntax error".to_string(),
                })
            }
            fn delete_program(&self, program: crate::context::ProgramId) {
                self.0.delete_program(program)
            }
            fn use_program(&self, program: Option<crate::context::ProgramId>) {
                self.0.use_program(program)
            }
            fn set_uniform_mat4(&self, program: crate::context::ProgramId, name: &str, value: &Mat4) {
                self.0.set_uniform_mat4(program, name, value)
            }
            fn draw_elements_indirect(&self, offset: usize) {
                self.0.draw_elements_indirect(offset)
            }
        }

        let ctx = Rc::new(BrokenCompiler(RecordingContext::new()));
        let err = InstancedRenderer::new(ctx.clone()).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("vertex"), "{message}");
        assert!(message.contains("syntax error"), "{message}");
        assert_eq!(ctx.0.live_buffers(), 0);
    }
}
