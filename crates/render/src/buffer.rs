use std::marker::PhantomData;
use std::mem::size_of;
use std::rc::Rc;

use bytemuck::Pod;

use crate::context::{BufferId, BufferTarget, BufferUsage, GraphicsContext};

/// One device allocation holding elements of `T`.
///
/// Capacity is tracked in elements. Both `resize` and `write` leave the
/// buffer bound to its target.
pub struct GpuBuffer<T: Pod> {
    ctx: Rc<dyn GraphicsContext>,
    id: BufferId,
    target: BufferTarget,
    usage: BufferUsage,
    capacity: usize,
    allocations: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuBuffer<T> {
    /// Byte size of one element.
    pub const STRIDE: usize = size_of::<T>();

    /// Empty dynamic buffer. Call [`resize`](Self::resize) before writing.
    pub fn new(ctx: Rc<dyn GraphicsContext>, target: BufferTarget) -> Self {
        let id = ctx.create_buffer();
        ctx.bind_buffer(target, Some(id));
        ctx.buffer_data(target, 0, None, BufferUsage::DynamicDraw);
        Self {
            ctx,
            id,
            target,
            usage: BufferUsage::DynamicDraw,
            capacity: 0,
            allocations: 1,
            _marker: PhantomData,
        }
    }

    /// Immutable buffer initialised with `contents`.
    pub fn with_contents(ctx: Rc<dyn GraphicsContext>, target: BufferTarget, contents: &[T]) -> Self {
        let id = ctx.create_buffer();
        let bytes: &[u8] = bytemuck::cast_slice(contents);
        ctx.bind_buffer(target, Some(id));
        ctx.buffer_data(target, bytes.len(), Some(bytes), BufferUsage::StaticDraw);
        Self {
            ctx,
            id,
            target,
            usage: BufferUsage::StaticDraw,
            capacity: contents.len(),
            allocations: 1,
            _marker: PhantomData,
        }
    }

    /// Reallocate to exactly `len` elements. Contents are undefined
    /// afterwards. Returns `false` without touching the device when the
    /// capacity already matches.
    pub fn resize(&mut self, len: usize) -> bool {
        if len == self.capacity {
            return false;
        }
        self.bind();
        self.ctx
            .buffer_data(self.target, len * Self::STRIDE, None, self.usage);
        self.capacity = len;
        self.allocations += 1;
        true
    }

    /// Copy `elements` in starting at element `offset`.
    ///
    /// # Panics
    /// When the range does not fit inside the current capacity.
    pub fn write(&mut self, offset: usize, elements: &[T]) {
        assert!(
            offset + elements.len() <= self.capacity,
            "write of {} elements at {} overruns buffer of {}",
            elements.len(),
            offset,
            self.capacity
        );
        self.bind();
        if elements.is_empty() {
            return;
        }
        self.ctx.buffer_sub_data(
            self.target,
            offset * Self::STRIDE,
            bytemuck::cast_slice(elements),
        );
    }

    pub fn bind(&self) {
        self.ctx.bind_buffer(self.target, Some(self.id));
    }

    /// Capacity in elements.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stride(&self) -> usize {
        Self::STRIDE
    }

    /// Device allocations made so far, including the initial one.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn target(&self) -> BufferTarget {
        self.target
    }

    /// Free the device allocation now instead of at end of scope.
    pub fn release(self) {}

    pub(crate) fn context(&self) -> &Rc<dyn GraphicsContext> {
        &self.ctx
    }
}

impl<T: Pod> Drop for GpuBuffer<T> {
    fn drop(&mut self) {
        self.ctx.delete_buffer(self.id);
    }
}

impl<T: Pod> std::fmt::Debug for GpuBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingContext;

    fn setup() -> (Rc<RecordingContext>, Rc<dyn GraphicsContext>) {
        let recording = Rc::new(RecordingContext::new());
        let ctx: Rc<dyn GraphicsContext> = recording.clone();
        (recording, ctx)
    }

    #[test]
    fn resize_reallocates_exactly() {
        let (rec, ctx) = setup();
        let mut buffer = GpuBuffer::<[f32; 3]>::new(ctx, BufferTarget::Array);
        assert_eq!(buffer.capacity(), 0);

        assert!(buffer.resize(5));
        assert_eq!(buffer.capacity(), 5);
        assert_eq!(rec.buffer_size(buffer.id()), Some(60));
    }

    #[test]
    fn resize_same_size_is_noop() {
        let (rec, ctx) = setup();
        let mut buffer = GpuBuffer::<u32>::new(ctx, BufferTarget::Array);
        assert!(buffer.resize(4));
        let before = rec.allocation_count(buffer.id());

        assert!(!buffer.resize(4));
        assert_eq!(rec.allocation_count(buffer.id()), before);
        assert_eq!(buffer.allocations(), 2);
    }

    #[test]
    fn write_preserves_other_regions() {
        let (rec, ctx) = setup();
        let mut buffer = GpuBuffer::<u32>::new(ctx, BufferTarget::Array);
        buffer.resize(4);
        buffer.write(0, &[1, 2, 3, 4]);
        buffer.write(2, &[9]);

        let bytes = rec.buffer_bytes(buffer.id()).unwrap();
        let words: &[u32] = bytemuck::cast_slice(&bytes);
        assert_eq!(words, &[1, 2, 9, 4]);
    }

    #[test]
    #[should_panic(expected = "overruns")]
    fn write_past_capacity_panics() {
        let (_rec, ctx) = setup();
        let mut buffer = GpuBuffer::<u32>::new(ctx, BufferTarget::Array);
        buffer.resize(2);
        buffer.write(1, &[1, 2]);
    }

    #[test]
    fn static_contents_uploaded_once() {
        let (rec, ctx) = setup();
        let buffer = GpuBuffer::with_contents(ctx, BufferTarget::ElementArray, &[0u32, 1, 2]);
        assert_eq!(buffer.capacity(), 3);
        assert_eq!(rec.allocation_count(buffer.id()), 1);
        assert_eq!(rec.buffer_bytes(buffer.id()).unwrap().len(), 12);
    }

    #[test]
    fn drop_and_release_free_the_buffer() {
        let (rec, ctx) = setup();
        let kept = GpuBuffer::<u32>::new(ctx.clone(), BufferTarget::Array);
        {
            let _scoped = GpuBuffer::<u32>::new(ctx.clone(), BufferTarget::Array);
            assert_eq!(rec.live_buffers(), 2);
        }
        assert_eq!(rec.live_buffers(), 1);
        kept.release();
        assert_eq!(rec.live_buffers(), 0);
    }
}
