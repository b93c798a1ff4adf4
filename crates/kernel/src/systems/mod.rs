//! Per-frame systems, in the order [`Game::update`](crate::Game::update)
//! runs them.

pub mod camera;
pub mod free_cam;
pub mod transforms;
