use core::ops::{Deref, DerefMut};
use parking_lot::Mutex;

/// Process-wide pool of reusable buffers
pub(crate) struct BufferPool<T: 'static> {
    buffers: Mutex<Vec<Vec<T>>>,
    max_retained: usize,
}

impl<T: 'static> BufferPool<T> {
    #[must_use]
    pub(crate) const fn new(max_retained: usize) -> Self {
        Self {
            buffers: parking_lot::const_mutex(Vec::new()),
            max_retained,
        }
    }

    #[must_use]
    pub(crate) fn rent(&'static self, capacity: usize) -> Rented<T> {
        let mut buffer = self.buffers.lock().pop().unwrap_or_default();
        buffer.reserve(capacity);
        Rented { buffer, pool: self }
    }

    fn give_back(&self, mut buffer: Vec<T>) {
        buffer.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_retained {
            buffers.push(buffer);
        }
    }

    #[cfg(test)]
    fn retained(&self) -> usize {
        self.buffers.lock().len()
    }
}

/// Buffer rented from a [`BufferPool`], cleared and returned on drop
pub(crate) struct Rented<T: 'static> {
    buffer: Vec<T>,
    pool: &'static BufferPool<T>,
}

impl<T> Deref for Rented<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.buffer
    }
}

impl<T> DerefMut for Rented<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl<T> Drop for Rented<T> {
    fn drop(&mut self) {
        self.pool.give_back(core::mem::take(&mut self.buffer));
    }
}
