use cubefield_input::InputState;

/// Per-frame inputs threaded into every system.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Seconds since the previous frame.
    pub delta_time: f32,
    pub input: &'a InputState,
}

impl<'a> FrameContext<'a> {
    pub fn new(delta_time: f32, input: &'a InputState) -> Self {
        Self { delta_time, input }
    }
}
