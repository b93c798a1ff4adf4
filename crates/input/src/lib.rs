//! Input state decoupled from the windowing library.
//!
//! The desktop app translates raw key and mouse events into [`Action`]s and
//! mouse deltas; systems only ever read an [`InputState`].

pub mod action;
pub mod state;

pub use action::Action;
pub use state::InputState;
