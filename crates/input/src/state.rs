use std::collections::HashSet;

use glam::Vec2;

use crate::action::Action;

/// Input gathered between two frames.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: HashSet<Action>,
    triggered: Vec<Action>,
    mouse_delta: Vec2,
    look_held: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key press. Repeated presses of a held action are ignored,
    /// so OS key repeat does not fire triggers twice.
    pub fn press(&mut self, action: Action) {
        if !self.held.insert(action) {
            return;
        }
        if action.is_trigger() {
            tracing::trace!(?action, "triggered");
            self.triggered.push(action);
        }
    }

    pub fn release(&mut self, action: Action) {
        self.held.remove(&action);
    }

    pub fn is_held(&self, action: Action) -> bool {
        self.held.contains(&action)
    }

    /// Accumulate raw mouse motion, in pixels.
    pub fn add_mouse_delta(&mut self, dx: f32, dy: f32) {
        self.mouse_delta += Vec2::new(dx, dy);
    }

    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn set_look_held(&mut self, held: bool) {
        self.look_held = held;
    }

    /// Mouse look is only applied while the look button is down.
    pub fn look_held(&self) -> bool {
        self.look_held
    }

    /// Triggers fired during the current frame, in press order.
    pub fn triggered(&self) -> &[Action] {
        &self.triggered
    }

    /// Reset per-frame accumulators. Held keys survive.
    pub fn end_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
        self.triggered.clear();
    }
}
