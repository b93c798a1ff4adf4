use crate::context::ProgramSource;

/// Vertex stage for instanced cubes: per-vertex position at slot 0, color at
/// slot 1 and the local-to-world matrix split over slots 2..=5.
pub const INSTANCED_CUBE_VERTEX: &str = r#"
struct Camera {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;

struct VertexInput {
    @location(0) position: vec3<f32>,
};

struct InstanceInput {
    @location(1) color: vec3<f32>,
    @location(2) world_0: vec4<f32>,
    @location(3) world_1: vec4<f32>,
    @location(4) world_2: vec4<f32>,
    @location(5) world_3: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let world = mat4x4<f32>(
        instance.world_0,
        instance.world_1,
        instance.world_2,
        instance.world_3,
    );

    var out: VertexOutput;
    out.clip_position = camera.projection * camera.view * world * vec4<f32>(vertex.position, 1.0);
    out.color = instance.color;
    return out;
}
"#;

pub const INSTANCED_CUBE_FRAGMENT: &str = r#"
@fragment
fn fs_main(@location(0) color: vec3<f32>) -> @location(0) vec4<f32> {
    return vec4<f32>(color, 1.0);
}
"#;

/// Flat-colored instanced cube program. Uniforms are declared in the order
/// of the `Camera` block.
pub const INSTANCED_CUBE: ProgramSource<'static> = ProgramSource {
    label: "instanced-cube",
    vertex: INSTANCED_CUBE_VERTEX,
    fragment: INSTANCED_CUBE_FRAGMENT,
    uniforms: &["projection", "view"],
};
