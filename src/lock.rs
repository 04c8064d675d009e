use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// Serializes instance creation within one scope.
///
/// Reentrant, so a thread creating an instance can create its dependencies in the same scope.
/// A thread holding the lock of a scope only ever waits for the locks of its ancestors.
pub(crate) struct CreationLock(ReentrantMutex<()>);

impl CreationLock {
    #[inline]
    #[must_use]
    pub(crate) fn new() -> Self {
        Self(ReentrantMutex::new(()))
    }

    #[inline]
    #[must_use]
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.0.lock()
    }
}

impl Default for CreationLock {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::CreationLock;

    #[test]
    fn test_reentrant() {
        let lock = CreationLock::new();
        let _outer = lock.lock();
        let _inner = lock.lock();
    }
}
