use super::{Core, CoreId, StackSize, Workload};
use crate::error::CoreError;

use std::alloc::{self, Layout};
use std::mem::MaybeUninit;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fill pattern used to detect the stack high-water mark.
const TAINT: u8 = 0xA5;
const MIN_STACK_SIZE: usize = 64 * 1024;

/// Page-aligned stack owned by a [`PosixCore`].
struct Stack {
    base: NonNull<u8>,
    layout: Layout,
}

// Safety: the stack is plain memory handed to exactly one thread at a time.
unsafe impl Send for Stack {}

impl Stack {
    fn allocate(size: usize) -> Result<Self, CoreError> {
        let page = page_size();
        let size = size.max(MIN_STACK_SIZE).next_multiple_of(page);

        let layout = Layout::from_size_align(size, page).map_err(|_| CoreError::Os {
            call: "stack layout",
            code: libc::EINVAL,
        })?;

        let base = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(CoreError::Os {
            call: "stack allocation",
            code: libc::ENOMEM,
        })?;

        unsafe { ptr::write_bytes(base.as_ptr(), TAINT, size) };

        Ok(Self { base, layout })
    }

    /// Bytes written since allocation, assuming a downward-growing stack.
    ///
    /// Only meaningful once the thread using the stack has exited.
    fn high_water(&self) -> usize {
        let bytes = unsafe { slice::from_raw_parts(self.base.as_ptr(), self.layout.size()) };
        let untouched = bytes.iter().take_while(|&&byte| byte == TAINT).count();

        self.layout.size() - untouched
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
    }
}

fn page_size() -> usize {
    match unsafe { libc::sysconf(libc::_SC_PAGESIZE) } {
        size if size > 0 => size as usize,
        _ => 4096,
    }
}

struct Running {
    thread: libc::pthread_t,
    stack: Stack,
}

/// Arguments moved into the new thread.
struct Launch {
    id: CoreId,
    workload: Workload,
    panicked: Arc<AtomicBool>,
}

extern "C" fn trampoline(argument: *mut libc::c_void) -> *mut libc::c_void {
    // Safety: `argument` comes from `Box::into_raw` in `PosixCore::start`.
    let launch = unsafe { Box::from_raw(argument as *mut Launch) };
    let Launch {
        id,
        workload,
        panicked,
    } = *launch;

    // Unwinding out of an `extern "C"` function aborts the process.
    if panic::catch_unwind(AssertUnwindSafe(|| workload(id))).is_err() {
        tracing::warn!(core = %id, "workload panicked");
        panicked.store(true, Ordering::Release);
    }

    ptr::null_mut()
}

/// Core backed by a raw POSIX thread running on a stack it allocates.
///
/// The stack is pre-filled with a taint pattern, so once the thread is
/// joined the core reports how deep the workload went.
pub struct PosixCore {
    id: CoreId,
    stack_size: usize,
    running: Mutex<Option<Running>>,
    panicked: Arc<AtomicBool>,

    /// High-water mark measured at the last stop.
    used: AtomicUsize,
}

impl PosixCore {
    /// Creates a core whose thread runs on a `stack_size`-byte stack.
    ///
    /// The size is rounded up to whole pages, with a 64 KiB minimum.
    pub fn new(id: CoreId, stack_size: usize) -> Self {
        Self {
            id,
            stack_size: stack_size.max(MIN_STACK_SIZE).next_multiple_of(page_size()),
            running: Mutex::new(None),
            panicked: Arc::new(AtomicBool::new(false)),
            used: AtomicUsize::new(0),
        }
    }
}

fn check(call: &'static str, code: libc::c_int) -> Result<(), CoreError> {
    match code {
        0 => Ok(()),
        code => Err(CoreError::Os { call, code }),
    }
}

impl Core for PosixCore {
    fn start(&self, workload: Workload) -> Result<(), CoreError> {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            return Err(CoreError::AlreadyStarted);
        }

        let stack = Stack::allocate(self.stack_size)?;
        let launch = Box::into_raw(Box::new(Launch {
            id: self.id,
            workload,
            panicked: self.panicked.clone(),
        }));

        let mut attr = MaybeUninit::<libc::pthread_attr_t>::uninit();
        let mut thread = MaybeUninit::<libc::pthread_t>::uninit();

        // Safety: `attr` is initialized before use and destroyed exactly once;
        // the stack outlives the thread because `stop` joins before freeing it.
        let created = unsafe {
            match check("pthread_attr_init", libc::pthread_attr_init(attr.as_mut_ptr())) {
                Err(error) => Err(error),
                Ok(()) => {
                    let mut created = check(
                        "pthread_attr_setstack",
                        libc::pthread_attr_setstack(
                            attr.as_mut_ptr(),
                            stack.base.as_ptr().cast(),
                            stack.layout.size(),
                        ),
                    );

                    if created.is_ok() {
                        created = check(
                            "pthread_create",
                            libc::pthread_create(
                                thread.as_mut_ptr(),
                                attr.as_ptr(),
                                trampoline,
                                launch.cast(),
                            ),
                        );
                    }

                    libc::pthread_attr_destroy(attr.as_mut_ptr());
                    created
                }
            }
        };

        if let Err(error) = created {
            // Safety: the thread was never created, so we still own `launch`.
            drop(unsafe { Box::from_raw(launch) });
            return Err(error);
        }

        *running = Some(Running {
            thread: unsafe { thread.assume_init() },
            stack,
        });

        Ok(())
    }

    fn stop(&self) -> Result<(), CoreError> {
        let Running { thread, stack } = self
            .running
            .lock()
            .unwrap()
            .take()
            .ok_or(CoreError::NotStarted)?;

        let code = unsafe { libc::pthread_join(thread, ptr::null_mut()) };
        if code != 0 {
            // The thread may still use its stack.
            std::mem::forget(stack);
            return Err(CoreError::Os {
                call: "pthread_join",
                code,
            });
        }

        self.used.store(stack.high_water(), Ordering::Relaxed);

        if self.panicked.swap(false, Ordering::AcqRel) {
            return Err(CoreError::Panicked { id: self.id });
        }

        Ok(())
    }

    /// High-water mark measured at the last [`stop`](Core::stop).
    fn stack_usage(&self) -> StackSize {
        StackSize {
            used: self.used.load(Ordering::Relaxed),
            total: self.stack_size,
        }
    }

    fn id(&self) -> CoreId {
        self.id
    }
}

impl Drop for PosixCore {
    fn drop(&mut self) {
        if self.running.get_mut().map(|r| r.is_some()).unwrap_or(false) {
            let _ = self.stop();
        }
    }
}
