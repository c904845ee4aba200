use super::{Core, CoreId, StackSize, Workload};
use crate::error::CoreError;

use std::sync::Mutex;
use std::thread::{self, JoinHandle};

const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Core backed by an OS thread.
///
/// # Examples
///
/// ```rust,ignore
/// let core = ThreadCore::new(CoreId(0))
///     .name("io")
///     .stack_size(512 * 1024);
/// ```
pub struct ThreadCore {
    id: CoreId,
    name: String,
    stack_size: usize,

    /// Handle of the running workload thread.
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadCore {
    pub fn new(id: CoreId) -> Self {
        Self {
            id,
            name: format!("orbit-core-{id}"),
            stack_size: DEFAULT_STACK_SIZE,
            handle: Mutex::new(None),
        }
    }

    /// Sets the name of the spawned thread.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the stack size of the spawned thread.
    ///
    /// # Panics
    ///
    /// Panics if `size == 0`.
    pub fn stack_size(mut self, size: usize) -> Self {
        assert!(size > 0, "stack_size must be > 0");

        self.stack_size = size;
        self
    }
}

impl Core for ThreadCore {
    fn start(&self, workload: Workload) -> Result<(), CoreError> {
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            return Err(CoreError::AlreadyStarted);
        }

        let id = self.id;
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .stack_size(self.stack_size)
            .spawn(move || workload(id))?;

        *handle = Some(spawned);
        Ok(())
    }

    fn stop(&self) -> Result<(), CoreError> {
        let handle = self
            .handle
            .lock()
            .unwrap()
            .take()
            .ok_or(CoreError::NotStarted)?;

        handle
            .join()
            .map_err(|_| CoreError::Panicked { id: self.id })
    }

    /// Reports the configured stack size; usage is not measured.
    fn stack_usage(&self) -> StackSize {
        StackSize {
            used: 0,
            total: self.stack_size,
        }
    }

    fn id(&self) -> CoreId {
        self.id
    }
}
