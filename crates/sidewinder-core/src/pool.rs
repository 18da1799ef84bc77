//! Process-wide pool of frame scratch buffers.
//!
//! Protocol handlers marshal payloads into a fixed-size scratch buffer
//! before copying the used prefix into the outbound frame. Buffers are
//! recycled through a shared pool; the [`PooledBuffer`] guard returns its
//! buffer on drop, so every exit path releases, including early `?`
//! returns during marshalling.

use std::sync::{Mutex, OnceLock};

use crate::wire::MAX_FRAME_SIZE;

/// Buffers retained by the pool when idle; excess buffers are freed.
const POOL_KEEP: usize = 32;

/// A pool of `MAX_FRAME_SIZE` scratch buffers.
pub struct FrameBufferPool {
    free: Mutex<Vec<Box<[u8; MAX_FRAME_SIZE]>>>,
}

impl FrameBufferPool {
    pub const fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Take a buffer from the pool, allocating if none is free.
    pub fn get(&self) -> PooledBuffer<'_> {
        let buf = self
            .free
            .lock()
            .expect("frame pool poisoned")
            .pop()
            .unwrap_or_else(|| Box::new([0u8; MAX_FRAME_SIZE]));
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn put(&self, buf: Box<[u8; MAX_FRAME_SIZE]>) {
        let mut free = self.free.lock().expect("frame pool poisoned");
        if free.len() < POOL_KEEP {
            free.push(buf);
        }
    }

    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().expect("frame pool poisoned").len()
    }
}

impl Default for FrameBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// The process-wide pool shared by all frame builders.
pub fn frame_pool() -> &'static FrameBufferPool {
    static POOL: OnceLock<FrameBufferPool> = OnceLock::new();
    POOL.get_or_init(FrameBufferPool::new)
}

/// A scratch buffer on loan from a [`FrameBufferPool`].
///
/// Dereferences to the full `[u8; MAX_FRAME_SIZE]` array and returns
/// itself to the pool when dropped.
pub struct PooledBuffer<'a> {
    pool: &'a FrameBufferPool,
    buf: Option<Box<[u8; MAX_FRAME_SIZE]>>,
}

impl std::ops::Deref for PooledBuffer<'_> {
    type Target = [u8; MAX_FRAME_SIZE];

    fn deref(&self) -> &Self::Target {
        self.buf.as_ref().expect("buffer present until drop")
    }
}

impl std::ops::DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.buf.as_mut().expect("buffer present until drop")
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.put(buf);
        }
    }
}
