use cubefield_common::{LocalToWorld, Position, Rotation};
use cubefield_ecs::{EntityStore, Filter};
use glam::{Mat4, Quat, Vec3};

/// `T * R`; entities carry no scale.
pub fn local_to_world(position: Vec3, rotation: Quat) -> Mat4 {
    Mat4::from_translation(position) * Mat4::from_quat(rotation)
}

/// Recompute `LocalToWorld` for every entity with a position and rotation.
///
/// Chunks are processed on the rayon pool; the function returns once all of
/// them are written.
pub fn update_local_to_world(store: &mut EntityStore) {
    let _span = tracing::debug_span!("local_to_world").entered();
    store.par_for_each_chunk::<Position, Rotation, LocalToWorld, _>(
        Filter::default(),
        |positions, rotations, transforms| {
            for ((position, rotation), transform) in positions.iter().zip(rotations).zip(transforms) {
                transform.0 = local_to_world(position.0, rotation.0);
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubefield_common::ColorRgb;
    use cubefield_ecs::Tags;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn rotation_applies_before_translation() {
        let matrix = local_to_world(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(FRAC_PI_2));
        let point = matrix.transform_point3(Vec3::X);
        assert!(point.abs_diff_eq(Vec3::new(1.0, 2.0, 2.0), 1e-5), "{point}");
    }

    #[test]
    fn updates_every_chunk() {
        let mut store = EntityStore::with_chunk_size(4);
        let ids: Vec<_> = (0..37)
            .map(|i| {
                store.spawn(
                    (
                        Position::new(i as f32, 0.0, 0.0),
                        Rotation::default(),
                        LocalToWorld::default(),
                        ColorRgb::RED,
                    ),
                    Tags::NONE,
                )
            })
            .collect();

        update_local_to_world(&mut store);

        for (i, id) in ids.iter().enumerate() {
            let transform = store.get::<LocalToWorld>(*id).unwrap();
            assert_eq!(transform.translation(), Vec3::new(i as f32, 0.0, 0.0));
        }
    }
}
