use cubefield_input::Action;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

pub fn action_for_key(key: KeyCode) -> Option<Action> {
    match key {
        KeyCode::KeyW => Some(Action::MoveForward),
        KeyCode::KeyS => Some(Action::MoveBackward),
        KeyCode::KeyA => Some(Action::StrafeLeft),
        KeyCode::KeyD => Some(Action::StrafeRight),
        KeyCode::KeyN => Some(Action::SpawnCube),
        KeyCode::Delete | KeyCode::Backspace => Some(Action::RemoveCube),
        _ => None,
    }
}

/// Either main button enables mouse look while held.
pub fn is_look_button(button: MouseButton) -> bool {
    matches!(button, MouseButton::Left | MouseButton::Right)
}
