// SPDX-License-Identifier: MIT

//! # appjail
//!
//! Launches child processes inside a Windows app container and observes
//! their lifetime.  The sandbox identity, its filesystem reach, and its
//! declared capabilities are all explicit; nothing is granted by default.
//!
//! This is a library consumed by a host process; the host decides what to
//! launch and with which arguments, this crate only encodes, spawns, and
//! watches.

#[cfg(target_os = "windows")]
pub mod sandbox;

#[cfg(target_os = "windows")]
pub use sandbox::{
    AppContainer, Capability, ProcessHandle, ProcessLaunchContext, ProcessWaiter,
    SidAndAttributeList, add_directory_ace, add_file_ace, set_integrity_level, start,
};
