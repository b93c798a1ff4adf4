use cubefield_common::{CameraData, ColorRgb, FORWARD, LocalToWorld, Position, Rotation};
use cubefield_ecs::{DEFAULT_CHUNK_SIZE, EcsError, EntityId, EntityStore, Filter, Query};
use cubefield_input::Action;
use glam::{Quat, Vec3};

use crate::frame::FrameContext;
use crate::scene::SceneConfig;
use crate::systems::camera::update_camera_data;
use crate::systems::free_cam::FreeCamController;
use crate::systems::transforms::{local_to_world, update_local_to_world};
use crate::tags::{CUBE, FREE_CAM};

/// Distance in front of the camera at which interactive cubes appear.
const SPAWN_DISTANCE: f32 = 3.0;

const SPAWN_PALETTE: [ColorRgb; 6] = [
    ColorRgb::new(1.0, 0.85, 0.1),
    ColorRgb::new(0.1, 0.85, 1.0),
    ColorRgb::new(1.0, 0.2, 0.8),
    ColorRgb::new(0.6, 1.0, 0.2),
    ColorRgb::new(1.0, 0.5, 0.1),
    ColorRgb::new(0.7, 0.5, 1.0),
];

/// The world and the systems that advance it.
pub struct Game {
    store: EntityStore,
    camera: EntityId,
    controller: FreeCamController,
    cubes: Vec<EntityId>,
    spawned: usize,
}

impl Game {
    pub fn new(scene: &SceneConfig) -> Self {
        Self::with_chunk_size(scene, DEFAULT_CHUNK_SIZE)
    }

    /// Like [`new`](Self::new) with queries chunked at `chunk_size` rows.
    pub fn with_chunk_size(scene: &SceneConfig, chunk_size: usize) -> Self {
        let mut store = EntityStore::with_chunk_size(chunk_size);
        let cubes: Vec<EntityId> = scene
            .all_cubes()
            .into_iter()
            .map(|cube| spawn_cube_entity(&mut store, cube.position.0, cube.color))
            .collect();

        let camera_position = scene.camera.position;
        let camera = store.spawn(
            (
                camera_position,
                Rotation::default(),
                LocalToWorld(local_to_world(camera_position.0, Quat::IDENTITY)),
                CameraData {
                    fov_degrees: scene.camera.fov_degrees,
                    near_clip: scene.camera.near_clip,
                    far_clip: scene.camera.far_clip,
                    ..CameraData::default()
                },
            ),
            FREE_CAM,
        );
        tracing::info!(cubes = cubes.len(), chunk_size, "scene created");

        let mut game = Self {
            store,
            camera,
            controller: FreeCamController::new(scene.free_cam),
            cubes,
            spawned: 0,
        };
        update_camera_data(&mut game.store);
        game
    }

    /// Advance one frame: scene edits, free camera, transforms, camera
    /// matrices.
    pub fn update(&mut self, frame: &FrameContext<'_>) {
        let _span = tracing::debug_span!("game_update", dt = frame.delta_time).entered();

        for action in frame.input.triggered() {
            match action {
                Action::SpawnCube => {
                    self.spawn_cube();
                }
                Action::RemoveCube => {
                    self.despawn_cube();
                }
                _ => {}
            }
        }

        self.controller.update(&mut self.store, frame);
        update_local_to_world(&mut self.store);
        update_camera_data(&mut self.store);
    }

    /// Instances for the renderer: every cube's transform and color.
    pub fn instances(&self) -> Query<'_, LocalToWorld, ColorRgb> {
        self.store.query(Filter::all(CUBE))
    }

    pub fn camera_data(&self) -> Result<CameraData, EcsError> {
        self.store.get::<CameraData>(self.camera).copied()
    }

    /// Place a new cube in front of the camera.
    pub fn spawn_cube(&mut self) -> EntityId {
        let (origin, rotation) = match (
            self.store.get::<Position>(self.camera),
            self.store.get::<Rotation>(self.camera),
        ) {
            (Ok(position), Ok(rotation)) => (position.0, rotation.0),
            _ => (Vec3::ZERO, Quat::IDENTITY),
        };
        let position = origin + rotation * FORWARD * SPAWN_DISTANCE;
        let color = SPAWN_PALETTE[self.spawned % SPAWN_PALETTE.len()];
        self.spawned += 1;

        let id = spawn_cube_entity(&mut self.store, position, color);
        self.cubes.push(id);
        tracing::debug!(%id, %position, total = self.cubes.len(), "cube spawned");
        id
    }

    /// Remove the most recently created cube, if any remain.
    pub fn despawn_cube(&mut self) -> Option<EntityId> {
        let id = self.cubes.pop()?;
        match self.store.despawn(id) {
            Ok(()) => {
                tracing::debug!(%id, total = self.cubes.len(), "cube removed");
                Some(id)
            }
            Err(err) => {
                tracing::warn!(%err, "cube already gone");
                None
            }
        }
    }

    /// Update the camera aspect ratio after a surface resize. Degenerate
    /// sizes (a minimised window) are ignored.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        if !(aspect_ratio.is_finite() && aspect_ratio > 0.0) {
            return;
        }
        if let Ok(camera) = self.store.get_mut::<CameraData>(self.camera) {
            camera.aspect_ratio = aspect_ratio;
        }
        update_camera_data(&mut self.store);
    }

    pub fn cube_count(&self) -> usize {
        self.cubes.len()
    }

    pub fn controller(&self) -> &FreeCamController {
        &self.controller
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }
}

fn spawn_cube_entity(store: &mut EntityStore, position: Vec3, color: ColorRgb) -> EntityId {
    store.spawn(
        (
            Position(position),
            Rotation::default(),
            LocalToWorld(local_to_world(position, Quat::IDENTITY)),
            color,
        ),
        CUBE,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::GridSpec;
    use cubefield_input::InputState;

    fn translations(game: &Game) -> Vec<Vec3> {
        game.instances()
            .chunks()
            .flat_map(|chunk| chunk.first().iter().map(LocalToWorld::translation))
            .collect()
    }

    #[test]
    fn default_scene_instances() {
        let game = Game::new(&SceneConfig::default());
        let instances = game.instances();
        assert_eq!(instances.count(), 3);
        assert_eq!(
            translations(&game),
            vec![
                Vec3::new(-1.25, 0.0, 0.0),
                Vec3::new(0.0, 0.25, 0.0),
                Vec3::new(1.25, 0.5, 0.0)
            ]
        );
        let colors: Vec<_> = instances
            .chunks()
            .flat_map(|chunk| chunk.second().to_vec())
            .collect();
        assert_eq!(colors, vec![ColorRgb::RED, ColorRgb::GREEN, ColorRgb::BLUE]);
    }

    #[test]
    fn camera_matrices_ready_before_first_update() {
        let game = Game::new(&SceneConfig::default());
        let camera = game.camera_data().unwrap();
        let origin = camera.view.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(0.0, 0.0, 3.0), 1e-5));
        assert_ne!(camera.projection, glam::Mat4::IDENTITY);
    }

    #[test]
    fn update_moves_camera_and_refreshes_view() {
        let mut game = Game::new(&SceneConfig::default());
        let mut input = InputState::new();
        input.press(Action::MoveForward);
        game.update(&FrameContext::new(0.2, &input));

        let camera = game.camera_data().unwrap();
        let origin = camera.view.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5), "{origin}");
    }

    #[test]
    fn triggers_grow_and_shrink_the_scene() {
        let mut game = Game::new(&SceneConfig::default());
        let mut input = InputState::new();
        input.press(Action::SpawnCube);
        game.update(&FrameContext::new(0.016, &input));
        assert_eq!(game.instances().count(), 4);
        let spawned = translations(&game)[3];
        assert!(spawned.abs_diff_eq(Vec3::ZERO, 1e-5), "{spawned}");

        input.end_frame();
        input.release(Action::SpawnCube);
        input.press(Action::RemoveCube);
        game.update(&FrameContext::new(0.016, &input));
        input.end_frame();
        game.update(&FrameContext::new(0.016, &input));
        assert_eq!(game.instances().count(), 3);
    }

    #[test]
    fn despawn_drains_to_empty() {
        let mut game = Game::new(&SceneConfig::default());
        while game.despawn_cube().is_some() {}
        assert_eq!(game.cube_count(), 0);
        assert!(game.instances().is_empty());
        assert!(game.camera_data().is_ok());
    }

    #[test]
    fn grid_scene_spans_chunks() {
        let scene = SceneConfig {
            grid: Some(GridSpec {
                columns: 10,
                rows: 10,
                spacing: 1.0,
                origin: Vec3::ZERO,
            }),
            ..SceneConfig::default()
        };
        let game = Game::with_chunk_size(&scene, 16);
        let instances = game.instances();
        assert_eq!(instances.count(), 103);
        assert_eq!(instances.chunks().count(), 7);
        assert_eq!(instances.chunks().map(|c| c.len()).sum::<usize>(), 103);
    }

    #[test]
    fn aspect_ratio_reaches_projection() {
        let mut game = Game::new(&SceneConfig::default());
        game.set_aspect_ratio(2.0);
        let camera = game.camera_data().unwrap();
        assert_eq!(camera.aspect_ratio, 2.0);
        assert!((camera.projection.x_axis.x - 0.5).abs() < 1e-5);

        game.set_aspect_ratio(0.0);
        assert_eq!(game.camera_data().unwrap().aspect_ratio, 2.0);
    }
}
