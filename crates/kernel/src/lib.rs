//! Frame kernel: scene setup and the systems that run once per frame.
//!
//! # Invariants
//! - Systems receive everything they read through [`FrameContext`]; there is
//!   no global game state.
//! - [`Game::update`] runs the free camera, then the local-to-world update,
//!   then the camera matrices. The parallel transform pass is joined before
//!   the camera pass reads its output.

mod frame;
mod game;
mod scene;
pub mod systems;
mod tags;

pub use frame::FrameContext;
pub use game::Game;
pub use scene::{CameraSpec, CubeSpec, GridSpec, SceneConfig, SceneError};
pub use systems::free_cam::{FreeCamController, FreeCamSettings};
pub use tags::{CUBE, FREE_CAM};
