//! Instance locks for wrapper bookkeeping.
//!
//! With the `thread-safe` feature each `Context` and `ContextGroup` carries
//! its own reentrant lock. Reentrancy matters because a class callback may
//! call back into the context that is currently evaluating on this thread.
//! Without the feature the lock is a zero-sized no-op.

#[cfg(feature = "thread-safe")]
mod imp {
    use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

    #[derive(Default)]
    pub struct InstanceLock(ReentrantMutex<()>);

    pub type InstanceGuard<'a> = ReentrantMutexGuard<'a, ()>;

    impl InstanceLock {
        #[inline]
        pub fn lock(&self) -> InstanceGuard<'_> {
            self.0.lock()
        }
    }
}

#[cfg(not(feature = "thread-safe"))]
mod imp {
    #[derive(Default)]
    pub struct InstanceLock;

    pub type InstanceGuard<'a> = std::marker::PhantomData<&'a ()>;

    impl InstanceLock {
        #[inline]
        pub fn lock(&self) -> InstanceGuard<'_> {
            std::marker::PhantomData
        }
    }
}

pub(crate) use imp::InstanceLock;

impl std::fmt::Debug for InstanceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InstanceLock")
    }
}
