/// Reusable block buffers for one worker's scan.
///
/// Each decoded block is handed to the consumer as an exclusively-owned
/// `Vec<u8>`; ownership transfers with the row batch that references it, so
/// a buffer can never be overwritten while rows still point into it. When
/// the consumer finalizes a batch it can hand the vectors back through
/// [`BufferPool::release`] (the decoder exposes this as `recycle`) so the
/// allocation is reused for a later block instead of dropped.
///
/// The pool is single-owner state inside one decoder; nothing here is
/// shared between workers.
pub struct BufferPool {
    free: Vec<Vec<u8>>,
}

impl BufferPool {
    /// Buffers retained beyond this count are dropped rather than pooled.
    const MAX_POOLED: usize = 8;

    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Take a cleared buffer with at least `capacity` bytes reserved.
    pub fn acquire(&mut self, capacity: usize) -> Vec<u8> {
        match self.free.pop() {
            Some(mut buf) => {
                buf.clear();
                buf.reserve(capacity);
                buf
            }
            None => Vec::with_capacity(capacity),
        }
    }

    /// Return a buffer whose consumer is done with it.
    pub fn release(&mut self, buf: Vec<u8>) {
        if self.free.len() < Self::MAX_POOLED {
            self.free.push(buf);
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
