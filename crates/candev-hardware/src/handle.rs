//! Owning wrapper around a native device instance.
//!
//! A [`NativeHandle`] is created by calling the driver's `init` and is the
//! only owner of the resulting [`RawHandle`]. It moves through two observable
//! states, `Active` and `Released`; before `acquire` returns there is no
//! handle at all. The `Active -> Released` transition is a single atomic
//! compare-and-swap, so `free` reaches the driver exactly once no matter how
//! many times (or from how many threads) release is requested. Dropping the
//! handle releases it as a backstop.

use crate::driver::{HandleDriver, RawHandle};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tracing::debug;

const ACTIVE: u8 = 1;
const RELEASED: u8 = 2;

/// Lifecycle state of a [`NativeHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// The native instance is allocated and usable.
    Active,

    /// `free` has been called; the token must not be used again.
    Released,
}

/// Exclusive owner of one native device instance.
///
/// Not `Clone`: a handle belongs to exactly one proxy.
pub struct NativeHandle<D: ?Sized + HandleDriver> {
    driver: Arc<D>,
    raw: RawHandle,
    can_id: u8,
    state: AtomicU8,
}

impl<D: ?Sized + HandleDriver> NativeHandle<D> {
    /// Allocate a native instance for `can_id`.
    pub fn acquire(driver: Arc<D>, can_id: u8) -> Self {
        let raw = driver.init(can_id);
        debug!(can_id, handle = %raw, "Native handle acquired");

        Self {
            driver,
            raw,
            can_id,
            state: AtomicU8::new(ACTIVE),
        }
    }

    /// The driver that issued this handle.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The native token.
    ///
    /// # Panics
    ///
    /// Panics if the handle has been released. Using a released handle is a
    /// programming error and is never forwarded to the driver.
    pub fn raw(&self) -> RawHandle {
        assert!(
            self.is_active(),
            "native handle {} (CAN id {}) used after release",
            self.raw,
            self.can_id
        );
        self.raw
    }

    /// CAN id the handle was allocated for.
    pub fn can_id(&self) -> u8 {
        self.can_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> HandleState {
        match self.state.load(Ordering::Acquire) {
            ACTIVE => HandleState::Active,
            _ => HandleState::Released,
        }
    }

    /// Whether the handle can still be used.
    pub fn is_active(&self) -> bool {
        self.state() == HandleState::Active
    }

    /// Free the native instance.
    ///
    /// Returns `true` if this call performed the release and `false` if the
    /// handle was already released, in which case nothing happens.
    pub fn release(&self) -> bool {
        if self
            .state
            .compare_exchange(ACTIVE, RELEASED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.driver.free(self.raw);
        debug!(can_id = self.can_id, handle = %self.raw, "Native handle released");
        true
    }
}

impl<D: ?Sized + HandleDriver> Drop for NativeHandle<D> {
    fn drop(&mut self) {
        if self.release() {
            debug!(
                can_id = self.can_id,
                "Native handle released on drop without an explicit close"
            );
        }
    }
}

impl<D: ?Sized + HandleDriver> fmt::Debug for NativeHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("raw", &self.raw)
            .field("can_id", &self.can_id)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingDriver {
        next: Mutex<u64>,
        freed: Mutex<Vec<RawHandle>>,
    }

    impl HandleDriver for CountingDriver {
        fn init(&self, _can_id: u8) -> RawHandle {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            RawHandle::new(*next)
        }

        fn free(&self, handle: RawHandle) {
            self.freed.lock().unwrap().push(handle);
        }
    }

    #[test]
    fn test_acquire_is_active() {
        let driver = Arc::new(CountingDriver::default());
        let handle = NativeHandle::acquire(Arc::clone(&driver), 3);

        assert_eq!(handle.state(), HandleState::Active);
        assert_eq!(handle.raw(), RawHandle::new(1));
        assert_eq!(handle.can_id(), 3);
    }

    #[test]
    fn test_release_is_idempotent() {
        let driver = Arc::new(CountingDriver::default());
        let handle = NativeHandle::acquire(Arc::clone(&driver), 3);

        assert!(handle.release());
        assert!(!handle.release());
        assert_eq!(handle.state(), HandleState::Released);

        drop(handle);
        assert_eq!(*driver.freed.lock().unwrap(), vec![RawHandle::new(1)]);
    }

    #[test]
    fn test_drop_releases() {
        let driver = Arc::new(CountingDriver::default());
        {
            let _handle = NativeHandle::acquire(Arc::clone(&driver), 9);
        }
        assert_eq!(driver.freed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_release_frees_once() {
        let driver = Arc::new(CountingDriver::default());
        let handle = NativeHandle::acquire(Arc::clone(&driver), 1);

        let released: usize = std::thread::scope(|s| {
            let workers: Vec<_> = (0..8).map(|_| s.spawn(|| handle.release())).collect();
            workers
                .into_iter()
                .map(|w| usize::from(w.join().unwrap()))
                .sum()
        });

        assert_eq!(released, 1);
        drop(handle);
        assert_eq!(driver.freed.lock().unwrap().len(), 1);
    }

    #[test]
    #[should_panic(expected = "used after release")]
    fn test_raw_after_release_panics() {
        let driver = Arc::new(CountingDriver::default());
        let handle = NativeHandle::acquire(driver, 1);
        handle.release();
        let _ = handle.raw();
    }

    #[test]
    fn test_handle_as_trait_object() {
        let driver: Arc<dyn HandleDriver> = Arc::new(CountingDriver::default());
        let handle = NativeHandle::acquire(driver, 2);
        assert!(handle.is_active());
        assert!(format!("{:?}", handle).contains("Active"));
    }
}
