/// A high-level action produced by the keyboard mapping.
///
/// Movement actions are held (active while the key is down); the scene
/// edits fire once per key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveForward,
    MoveBackward,
    StrafeLeft,
    StrafeRight,
    /// Spawn a cube in front of the camera.
    SpawnCube,
    /// Remove the most recently spawned cube.
    RemoveCube,
}

impl Action {
    /// True for actions that fire once on press instead of while held.
    pub fn is_trigger(&self) -> bool {
        matches!(self, Action::SpawnCube | Action::RemoveCube)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_is_held_edits_are_triggers() {
        assert!(!Action::MoveForward.is_trigger());
        assert!(!Action::StrafeLeft.is_trigger());
        assert!(Action::SpawnCube.is_trigger());
        assert!(Action::RemoveCube.is_trigger());
    }
}
