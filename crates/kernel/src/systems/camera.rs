use cubefield_common::{CameraData, FORWARD, LocalToWorld, UP};
use cubefield_ecs::{EntityStore, Filter};
use glam::Mat4;

/// Left-handed look-at from the transform's origin along its rotated
/// forward axis.
pub fn view_matrix(local_to_world: &Mat4) -> Mat4 {
    let (_, rotation, position) = local_to_world.to_scale_rotation_translation();
    let front = (rotation * FORWARD).normalize();
    Mat4::look_at_lh(position, position + front, UP)
}

pub fn projection_matrix(camera: &CameraData) -> Mat4 {
    Mat4::perspective_lh(
        camera.fov_degrees.to_radians(),
        camera.aspect_ratio,
        camera.near_clip,
        camera.far_clip,
    )
}

/// Refresh view and projection of every camera from its current transform.
pub fn update_camera_data(store: &mut EntityStore) {
    store.for_each_chunk_mut::<LocalToWorld, CameraData, _>(Filter::default(), |transforms, cameras| {
        for (transform, camera) in transforms.iter().zip(cameras.iter_mut()) {
            camera.view = view_matrix(&transform.0);
            camera.projection = projection_matrix(camera);
        }
    });
}
