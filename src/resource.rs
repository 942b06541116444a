//! Scoped ownership of externally allocated resources
//!
//! FFmpeg contexts, scratch frames, the window and GPU objects are each held
//! in a [`ResourceHandle`]. A handle owns at most one resource, releases it
//! exactly once, and releases the old resource before taking a new one.

/// A resource kind with its own release behavior
pub trait Releasable {
    /// Release the resource. Consumes it, so it cannot be released twice.
    fn release(self);
}

/// Unique owner of one releasable resource
///
/// Not `Clone`: ownership is never shared.
pub struct ResourceHandle<T: Releasable> {
    inner: Option<T>,
}

impl<T: Releasable> ResourceHandle<T> {
    /// An empty handle
    pub fn empty() -> Self {
        Self { inner: None }
    }

    /// A handle holding `value`
    pub fn new(value: T) -> Self {
        Self { inner: Some(value) }
    }

    /// Take ownership of `value`, releasing any resource held before
    pub fn assign(&mut self, value: T) {
        self.reset();
        self.inner = Some(value);
    }

    /// Release the held resource. No-op on an empty handle.
    pub fn reset(&mut self) {
        if let Some(value) = self.inner.take() {
            value.release();
        }
    }

    /// Give up ownership without releasing
    pub fn take(&mut self) -> Option<T> {
        self.inner.take()
    }

    pub fn get(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.inner.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }
}

impl<T: Releasable> Default for ResourceHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Releasable> Drop for ResourceHandle<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: Releasable> std::fmt::Debug for ResourceHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("type", &std::any::type_name::<T>())
            .field("held", &self.inner.is_some())
            .finish()
    }
}

// FFmpeg resources free themselves on drop

impl Releasable for ffmpeg_next::format::context::Input {
    fn release(self) {
        tracing::trace!("closing container input");
        drop(self);
    }
}

impl Releasable for ffmpeg_next::decoder::Video {
    fn release(self) {
        tracing::trace!("closing codec context");
        drop(self);
    }
}

impl Releasable for ffmpeg_next::software::scaling::Context {
    fn release(self) {
        tracing::trace!("freeing scaler context");
        drop(self);
    }
}

impl Releasable for ffmpeg_next::frame::Video {
    fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records its id into a shared log when released
    struct Tracked {
        id: u32,
        log: Rc<RefCell<Vec<u32>>>,
    }

    impl Releasable for Tracked {
        fn release(self) {
            self.log.borrow_mut().push(self.id);
        }
    }

    fn tracked(id: u32, log: &Rc<RefCell<Vec<u32>>>) -> Tracked {
        Tracked {
            id,
            log: Rc::clone(log),
        }
    }

    #[test]
    fn test_empty_handle_release_is_noop() {
        let mut handle: ResourceHandle<Tracked> = ResourceHandle::empty();
        handle.reset();
        handle.reset();
        assert!(handle.is_empty());
    }

    #[test]
    fn test_assign_releases_previous_exactly_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handle = ResourceHandle::new(tracked(1, &log));
        handle.assign(tracked(2, &log));
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(handle.get().map(|t| t.id), Some(2));

        handle.assign(tracked(3, &log));
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_drop_releases_once() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let mut handle = ResourceHandle::new(tracked(7, &log));
            handle.reset();
            handle.reset();
        }
        assert_eq!(*log.borrow(), vec![7]);

        {
            let _handle = ResourceHandle::new(tracked(8, &log));
        }
        assert_eq!(*log.borrow(), vec![7, 8]);
    }

    #[test]
    fn test_take_transfers_without_release() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut handle = ResourceHandle::new(tracked(4, &log));
        let taken = handle.take();
        drop(handle);
        assert!(log.borrow().is_empty());
        assert_eq!(taken.map(|t| t.id), Some(4));
    }
}
