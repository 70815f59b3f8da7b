//! Handle Pool
//!
//! Bounded, per-path pool of reusable open handles.
//!
//! ## Concurrency:
//! - `state`: Protected by Mutex (borrow/return are mutually exclusive)
//! - `returned`: Condvar signalled whenever a handle goes back or the pool closes
//! - Borrowing from an exhausted pool blocks until a handle is returned

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, StrataError};

type Opener<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// Bounded pool of open handles for one path
///
/// Handles are opened lazily, at most `capacity` exist at any time, and idle
/// ones are reused most-recently-returned first.
pub struct HandlePool<T> {
    path: PathBuf,
    capacity: usize,
    /// Creates a new handle when the pool has room for one
    opener: Opener<T>,
    state: Mutex<PoolState<T>>,
    returned: Condvar,
}

struct PoolState<T> {
    /// Open handles not currently lent out
    idle: Vec<T>,
    /// Handles currently lent out
    in_use: usize,
    closed: bool,
}

impl<T: Send> HandlePool<T> {
    /// Create an empty pool; nothing is opened until the first borrow
    pub fn new<F>(path: &Path, capacity: usize, opener: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        assert!(capacity > 0, "handle pool capacity must be > 0");
        Self {
            path: path.to_path_buf(),
            capacity,
            opener: Box::new(opener),
            state: Mutex::new(PoolState {
                idle: Vec::with_capacity(capacity),
                in_use: 0,
                closed: false,
            }),
            returned: Condvar::new(),
        }
    }

    /// Borrow a handle, blocking while all `capacity` handles are lent out
    pub fn borrow(&self) -> Result<PoolGuard<'_, T>> {
        let mut state = self.state.lock();
        loop {
            if let Some(guard) = self.take_or_reserve(&mut state)? {
                return Ok(guard);
            }
            if state.in_use < self.capacity {
                break;
            }
            tracing::trace!(
                path = %self.path.display(),
                capacity = self.capacity,
                "Handle pool exhausted, waiting for a return"
            );
            self.returned.wait(&mut state);
        }

        // Room for a new handle: reserve the slot, open outside the lock
        state.in_use += 1;
        drop(state);
        self.open_reserved()
    }

    /// Borrow without blocking; `Ok(None)` when the pool is exhausted
    pub fn try_borrow(&self) -> Result<Option<PoolGuard<'_, T>>> {
        let mut state = self.state.lock();
        if let Some(guard) = self.take_or_reserve(&mut state)? {
            return Ok(Some(guard));
        }
        if state.in_use >= self.capacity {
            return Ok(None);
        }
        state.in_use += 1;
        drop(state);
        self.open_reserved().map(Some)
    }

    /// Close the pool: idle handles are dropped, blocked and future borrowers
    /// fail with `Closed`, and handles still lent out are dropped on return.
    pub fn close(&self) {
        let idle = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.returned.notify_all();

        tracing::debug!(
            path = %self.path.display(),
            released = idle.len(),
            "Handle pool closed"
        );
        drop(idle);
    }

    /// Pop an idle handle, if any; errors once closed
    fn take_or_reserve(&self, state: &mut PoolState<T>) -> Result<Option<PoolGuard<'_, T>>> {
        if state.closed {
            return Err(StrataError::closed(&self.path));
        }
        Ok(state.idle.pop().map(|handle| {
            state.in_use += 1;
            PoolGuard::new(self, handle)
        }))
    }

    /// Open a handle for a slot already counted in `in_use`
    fn open_reserved(&self) -> Result<PoolGuard<'_, T>> {
        match (self.opener)() {
            Ok(handle) => Ok(PoolGuard::new(self, handle)),
            Err(e) => {
                self.state.lock().in_use -= 1;
                self.returned.notify_one();
                Err(e)
            }
        }
    }

    fn give_back(&self, handle: T) {
        let discarded = {
            let mut state = self.state.lock();
            state.in_use -= 1;
            if state.closed {
                Some(handle)
            } else {
                state.idle.push(handle);
                None
            }
        };
        self.returned.notify_one();
        drop(discarded);
    }
}

impl<T> HandlePool<T> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Open handles waiting to be borrowed
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Handles currently lent out
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl<T> fmt::Debug for HandlePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HandlePool")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("idle", &state.idle.len())
            .field("in_use", &state.in_use)
            .field("closed", &state.closed)
            .finish()
    }
}

// =============================================================================
// Guard
// =============================================================================

/// A borrowed handle; goes back to its pool on `release()` or drop
pub struct PoolGuard<'a, T: Send> {
    pool: &'a HandlePool<T>,
    handle: Option<T>,
}

impl<'a, T: Send> PoolGuard<'a, T> {
    fn new(pool: &'a HandlePool<T>, handle: T) -> Self {
        Self {
            pool,
            handle: Some(handle),
        }
    }

    /// Return the handle to the pool. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.give_back(handle);
        }
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }
}

impl<T: Send> Deref for PoolGuard<'_, T> {
    type Target = T;

    /// # Panics
    /// If the handle was already released.
    fn deref(&self) -> &T {
        self.handle
            .as_ref()
            .expect("pooled handle used after release")
    }
}

impl<T: Send> DerefMut for PoolGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.handle
            .as_mut()
            .expect("pooled handle used after release")
    }
}

impl<T: Send> Drop for PoolGuard<'_, T> {
    fn drop(&mut self) {
        self.release();
    }
}
