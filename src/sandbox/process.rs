// SPDX-License-Identifier: MIT

//! Owned handle pair for a launched child.

use std::sync::Arc;

use windows::Win32::Foundation::{CloseHandle, HANDLE, STILL_ACTIVE};
use windows::Win32::System::Threading::{
    GetExitCodeProcess, GetProcessId, ResumeThread, TerminateProcess,
};

/// The process and primary-thread handles returned by process creation,
/// released together.
///
/// Cloning shares ownership, so a clone held by an observer keeps the
/// handles alive regardless of drop order; the OS objects close when the
/// last clone goes away.
#[derive(Clone)]
pub struct ProcessHandle {
    inner: Arc<RawHandles>,
}

struct RawHandles {
    process: HANDLE,
    thread: HANDLE,
}

// HANDLEs are kernel object references, freely usable across threads; the
// wrapped calls are all thread-safe.
unsafe impl Send for RawHandles {}
unsafe impl Sync for RawHandles {}

impl ProcessHandle {
    pub(crate) fn new(process: HANDLE, thread: HANDLE) -> Self {
        Self {
            inner: Arc::new(RawHandles { process, thread }),
        }
    }

    pub fn process_id(&self) -> u32 {
        unsafe { GetProcessId(self.inner.process) }
    }

    /// Exit code of the child, or None while it is still running.
    pub fn exit_code(&self) -> windows::core::Result<Option<u32>> {
        let mut code = 0u32;
        unsafe { GetExitCodeProcess(self.inner.process, &mut code) }?;
        if code == STILL_ACTIVE.0 as u32 {
            Ok(None)
        } else {
            Ok(Some(code))
        }
    }

    /// Let a CREATE_SUSPENDED child start running.
    pub fn resume_main_thread(&self) -> windows::core::Result<()> {
        let prior = unsafe { ResumeThread(self.inner.thread) };
        if prior == u32::MAX {
            Err(windows::core::Error::from_win32())
        } else {
            Ok(())
        }
    }

    /// Hard-stop the child.  No drop path calls this; when the process dies
    /// is the caller's decision, not the handle's.
    pub fn terminate(&self, exit_code: u32) -> windows::core::Result<()> {
        unsafe { TerminateProcess(self.inner.process, exit_code) }
    }

    pub(crate) fn raw_process(&self) -> HANDLE {
        self.inner.process
    }
}

impl Drop for RawHandles {
    fn drop(&mut self) {
        // Both handles go together; neither is individually transferable.
        unsafe {
            if !self.thread.is_invalid() {
                let _ = CloseHandle(self.thread);
            }
            if !self.process.is_invalid() {
                let _ = CloseHandle(self.process);
            }
        }
    }
}
