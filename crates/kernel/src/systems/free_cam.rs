use std::f32::consts::FRAC_PI_2;

use cubefield_common::{FORWARD, Position, RIGHT, Rotation, UP};
use cubefield_ecs::{EntityStore, Filter};
use cubefield_input::{Action, InputState};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::frame::FrameContext;
use crate::tags::FREE_CAM;

/// Accumulated pitch stays within this many radians of the horizon.
pub const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreeCamSettings {
    /// Units per second.
    pub move_speed: f32,
    /// Degrees of rotation per pixel of mouse motion.
    pub sensitivity: f32,
}

impl Default for FreeCamSettings {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            sensitivity: 0.1,
        }
    }
}

/// WASD movement along the camera's local axes plus mouse look while the
/// look button is held.
#[derive(Debug, Clone, Default)]
pub struct FreeCamController {
    settings: FreeCamSettings,
    pitch: f32,
}

impl FreeCamController {
    pub fn new(settings: FreeCamSettings) -> Self {
        Self {
            settings,
            pitch: 0.0,
        }
    }

    pub fn settings(&self) -> FreeCamSettings {
        self.settings
    }

    /// Accumulated pitch in radians, positive looking down.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn update(&mut self, store: &mut EntityStore, frame: &FrameContext<'_>) {
        let step = self.settings.move_speed * frame.delta_time;
        let (yaw, pitch) = self.look_angles(frame.input);
        let input = frame.input;

        store.for_each_chunk_mut::<Position, Rotation, _>(Filter::all(FREE_CAM), |positions, rotations| {
            for (position, rotation) in positions.iter_mut().zip(rotations.iter_mut()) {
                position.0 += movement(rotation.0, input) * step;
                if input.look_held() {
                    rotation.0 = apply_look(rotation.0, yaw, pitch);
                }
            }
        });
    }

    /// Yaw and pitch to apply this frame. The pitch is trimmed so the
    /// accumulated angle stays inside [`PITCH_LIMIT`].
    fn look_angles(&mut self, input: &InputState) -> (f32, f32) {
        if !input.look_held() {
            return (0.0, 0.0);
        }
        let delta = input.mouse_delta() * self.settings.sensitivity;
        let yaw = delta.x.to_radians();
        let target = (self.pitch + delta.y.to_radians()).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let pitch = target - self.pitch;
        self.pitch = target;
        (yaw, pitch)
    }
}

/// Unscaled movement direction for the held actions.
fn movement(rotation: Quat, input: &InputState) -> Vec3 {
    let forward = rotation * FORWARD;
    let right = rotation * RIGHT;
    let mut direction = Vec3::ZERO;
    if input.is_held(Action::MoveForward) {
        direction += forward;
    }
    if input.is_held(Action::MoveBackward) {
        direction -= forward;
    }
    if input.is_held(Action::StrafeLeft) {
        direction -= right;
    }
    if input.is_held(Action::StrafeRight) {
        direction += right;
    }
    direction
}

/// Yaw about world up, then pitch about the yawed local right axis.
fn apply_look(rotation: Quat, yaw: f32, pitch: f32) -> Quat {
    let rotation = (Quat::from_axis_angle(UP, yaw) * rotation).normalize();
    let right = rotation * RIGHT;
    (Quat::from_axis_angle(right, pitch) * rotation).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubefield_ecs::Tags;

    fn camera_store() -> (EntityStore, cubefield_ecs::EntityId) {
        let mut store = EntityStore::new();
        let camera = store.spawn(
            (Position::new(0.0, 0.0, -3.0), Rotation::default()),
            FREE_CAM,
        );
        (store, camera)
    }

    #[test]
    fn forward_moves_along_local_z() {
        let (mut store, camera) = camera_store();
        let mut input = InputState::new();
        input.press(Action::MoveForward);

        let mut controller = FreeCamController::default();
        controller.update(&mut store, &FrameContext::new(0.5, &input));

        let position = store.get::<Position>(camera).unwrap();
        assert!(position.0.abs_diff_eq(Vec3::new(0.0, 0.0, -0.5), 1e-5));
    }

    #[test]
    fn opposite_actions_cancel() {
        let mut input = InputState::new();
        input.press(Action::StrafeLeft);
        input.press(Action::StrafeRight);
        assert_eq!(movement(Quat::IDENTITY, &input), Vec3::ZERO);
    }

    #[test]
    fn look_requires_button() {
        let (mut store, camera) = camera_store();
        let mut input = InputState::new();
        input.add_mouse_delta(200.0, 50.0);

        let mut controller = FreeCamController::default();
        controller.update(&mut store, &FrameContext::new(0.016, &input));
        assert_eq!(*store.get::<Rotation>(camera).unwrap(), Rotation::default());

        input.set_look_held(true);
        controller.update(&mut store, &FrameContext::new(0.016, &input));
        assert_ne!(*store.get::<Rotation>(camera).unwrap(), Rotation::default());
    }

    #[test]
    fn positive_yaw_turns_right() {
        let rotation = apply_look(Quat::IDENTITY, 90f32.to_radians(), 0.0);
        assert!((rotation * FORWARD).abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn positive_pitch_looks_down() {
        let rotation = apply_look(Quat::IDENTITY, 0.0, 0.3);
        assert!((rotation * FORWARD).y < 0.0);
    }

    #[test]
    fn pitch_is_clamped() {
        let (mut store, camera) = camera_store();
        let mut input = InputState::new();
        input.set_look_held(true);
        input.add_mouse_delta(0.0, 5000.0);

        let mut controller = FreeCamController::default();
        controller.update(&mut store, &FrameContext::new(0.016, &input));
        controller.update(&mut store, &FrameContext::new(0.016, &input));
        assert_eq!(controller.pitch(), PITCH_LIMIT);

        let forward = store.get::<Rotation>(camera).unwrap().0 * FORWARD;
        let elevation = (-forward.y).asin();
        assert!((elevation - PITCH_LIMIT).abs() < 1e-3, "{elevation}");
    }

    #[test]
    fn only_free_cams_move() {
        let mut store = EntityStore::new();
        let prop = store.spawn((Position::default(), Rotation::default()), Tags::NONE);
        let mut input = InputState::new();
        input.press(Action::MoveForward);

        FreeCamController::default().update(&mut store, &FrameContext::new(1.0, &input));
        assert_eq!(*store.get::<Position>(prop).unwrap(), Position::default());
    }
}
