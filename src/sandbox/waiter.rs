// SPDX-License-Identifier: MIT

//! Cancellable observation of a child's lifetime.
//!
//! The only exit notification the OS offers here is a blocking wait, so
//! each waiter owns a thread parked in WaitForMultipleObjects on the process
//! handle and an internal cancel event.  Completion is published through a
//! watch channel that resolves every current and future `wait_async` call.

use std::future::Future;
use std::sync::Arc;
use std::thread;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::error;
use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_FAILED};
use windows::Win32::System::Threading::{
    CreateEventW, INFINITE, SetEvent, WaitForMultipleObjects,
};
use windows::core::PCWSTR;

use super::error::WaitError;
use super::process::ProcessHandle;

/// Manual-reset event used purely as a cancellation latch for the observer.
struct CancelEvent(HANDLE);

unsafe impl Send for CancelEvent {}
unsafe impl Sync for CancelEvent {}

impl CancelEvent {
    fn new() -> windows::core::Result<Self> {
        let handle = unsafe {
            CreateEventW(
                None,           // default security
                true,           // manual reset: once set, stays set
                false,          // initially unsignaled
                PCWSTR::null(), // unnamed
            )
        }?;
        Ok(Self(handle))
    }

    fn set(&self) {
        let _ = unsafe { SetEvent(self.0) };
    }
}

impl Drop for CancelEvent {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// Watches one process handle and signals exactly once, either because the
/// process exited or because the waiter was dropped.
///
/// Dropping the waiter cancels the watch, never the process, and never
/// closes a handle the waiter does not own: the observer holds its own
/// clones of the process handle and the cancel event, so the owner dropping
/// either cannot race the blocking wait.
pub struct ProcessWaiter {
    cancel: Arc<CancelEvent>,
    done: watch::Receiver<bool>,
}

impl ProcessWaiter {
    /// Spawn the observer thread for `process`.
    pub fn new(process: &ProcessHandle) -> Result<Self, WaitError> {
        let cancel = Arc::new(CancelEvent::new().map_err(WaitError)?);
        let (tx, rx) = watch::channel(false);

        let observer_process = process.clone();
        let observer_cancel = Arc::clone(&cancel);
        thread::spawn(move || observe(observer_process, observer_cancel, tx));

        Ok(Self { cancel, done: rx })
    }

    /// Resolves when the waiter signals, or earlier when `cancel` fires.
    ///
    /// Cancelling the token detaches only this await; the observer keeps
    /// running and other concurrent waits are unaffected.  After the waiter
    /// has signaled, every call resolves immediately.
    // use<>: the future owns its receiver clone and must not capture the
    // waiter's lifetime, so it can outlive the waiter it came from.
    pub fn wait_async(&self, cancel: CancellationToken) -> impl Future<Output = ()> + Send + use<> {
        let mut done = self.done.clone();
        async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                // A receive error means the observer is gone; it always
                // publishes before exiting, so either way nobody should stay
                // parked here.
                _ = done.wait_for(|signaled| *signaled) => {}
            }
        }
    }
}

impl Drop for ProcessWaiter {
    fn drop(&mut self) {
        // Races the observer out of its blocking wait.  The process itself
        // is untouched.
        self.cancel.set();
    }
}

fn observe(process: ProcessHandle, cancel: Arc<CancelEvent>, done: watch::Sender<bool>) {
    let handles = [process.raw_process(), cancel.0];
    let status = unsafe {
        WaitForMultipleObjects(
            &handles, // process exit or cancellation, whichever first
            false,    // any one handle unblocks
            INFINITE,
        )
    };
    if status == WAIT_FAILED {
        // Fatal for the waiter only.  Report once and fall through to the
        // signal so no caller is left blocked forever.
        error!(
            pid = process.process_id(),
            error = %windows::core::Error::from_win32(),
            "wait on process handles failed",
        );
    }
    // Release the holds regardless of which handle fired, then publish.
    drop(process);
    drop(cancel);
    let _ = done.send(true);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::context::ProcessLaunchContext;
    use crate::sandbox::launch;
    use std::ffi::OsString;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::time::timeout;

    fn ping_exe() -> PathBuf {
        let root = std::env::var("SystemRoot").unwrap_or_else(|_| r"C:\Windows".into());
        PathBuf::from(root).join(r"System32\PING.EXE")
    }

    fn spawn_ping(args: &[&str]) -> ProcessHandle {
        let mut context = ProcessLaunchContext::new(ping_exe());
        context.args = args.iter().map(OsString::from).collect();
        launch::start(&context).expect("spawn should succeed")
    }

    /// Keeps a child busy long enough for cancellation tests to observe it
    /// still running.
    fn spawn_long_lived() -> ProcessHandle {
        spawn_ping(&["-n", "60", "127.0.0.1"])
    }

    #[tokio::test]
    async fn signals_on_process_exit() {
        let child = spawn_ping(&["-n", "1", "127.0.0.1"]);
        let waiter = ProcessWaiter::new(&child).expect("waiter should start");

        timeout(
            Duration::from_secs(10),
            waiter.wait_async(CancellationToken::new()),
        )
        .await
        .expect("wait should resolve after the child exits");

        // Already signaled: a second wait resolves immediately.
        timeout(
            Duration::from_millis(250),
            waiter.wait_async(CancellationToken::new()),
        )
        .await
        .expect("second wait should resolve immediately");

        assert_eq!(child.exit_code().expect("exit code query"), Some(0));
    }

    #[tokio::test]
    async fn drop_resolves_pending_wait_without_touching_process() {
        let child = spawn_long_lived();
        let waiter = ProcessWaiter::new(&child).expect("waiter should start");

        let pending = tokio::spawn(waiter.wait_async(CancellationToken::new()));
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(waiter);

        timeout(Duration::from_secs(5), pending)
            .await
            .expect("pending wait should resolve after drop")
            .expect("wait task should not panic");

        // The waiter never owned the handle; the child is still alive and
        // the handle still answers.
        assert_eq!(child.exit_code().expect("exit code query"), None);
        child.terminate(1).expect("cleanup terminate");
    }

    #[tokio::test]
    async fn token_cancels_one_await_only() {
        let child = spawn_long_lived();
        let waiter = ProcessWaiter::new(&child).expect("waiter should start");

        let token = CancellationToken::new();
        let cancelled_wait = waiter.wait_async(token.clone());
        token.cancel();
        timeout(Duration::from_secs(1), cancelled_wait)
            .await
            .expect("cancelled wait should resolve");

        // The waiter itself has not signaled; a fresh wait still blocks.
        let still_waiting = timeout(
            Duration::from_millis(250),
            waiter.wait_async(CancellationToken::new()),
        )
        .await;
        assert!(still_waiting.is_err(), "waiter signaled unexpectedly");

        child.terminate(1).expect("cleanup terminate");
        timeout(
            Duration::from_secs(10),
            waiter.wait_async(CancellationToken::new()),
        )
        .await
        .expect("wait should resolve once the child is gone");
    }
}
